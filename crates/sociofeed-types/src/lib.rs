//! Wire types shared by the REST handlers, the gateway and the tests.

pub mod api;
pub mod events;
pub mod models;
