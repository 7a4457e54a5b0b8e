//! Infrastructure layer implementations.

pub mod blockchain;
pub mod database;
pub mod notification;
pub mod payment;

pub use blockchain::{HorizonBlockchainAdapter, HorizonConfig, SimulatedBlockchainAdapter};
pub use database::{PostgresConfig, PostgresLedger};
pub use notification::StoredNotifier;
pub use payment::SimulatedPaymentProcessor;
