//! HTTP API for fund search, lookup, and price history.

pub mod error;
pub mod funds;
pub mod middleware;
pub mod routes;
pub mod status;

pub use routes::*;
