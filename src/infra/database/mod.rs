//! Database implementations.

pub mod postgres;

pub use postgres::{PostgresConfig, PostgresLedger};
