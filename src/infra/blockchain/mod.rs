//! Blockchain adapter implementations.

pub mod horizon;
pub mod simulated;

pub use horizon::{HorizonBlockchainAdapter, HorizonConfig};
pub use simulated::SimulatedBlockchainAdapter;
