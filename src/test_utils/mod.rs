//! Test support: in-memory mock implementations of the domain traits.

pub mod mocks;

pub use mocks::{
    MockBlockchainAdapter, MockConfig, MockLedger, MockPaymentAdapter, RecordingNotifier,
};
