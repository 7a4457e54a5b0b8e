//! Watchledger: tokenized luxury watch marketplace backend.
//!
//! Layered as domain (types, traits, errors, role policy), app (business
//! logic and shared state), api (axum handlers and router), and infra
//! (PostgreSQL ledger plus payment, blockchain, and notification adapters).

pub mod api;
pub mod app;
pub mod domain;
pub mod infra;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
