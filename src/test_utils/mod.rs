//! Test doubles for the domain traits.

pub mod mocks;

pub use mocks::{
    CallLog, MockCache, MockConfig, MockDeliveryLog, MockDonationRepository, MockExplorerClient,
    MockNameResolver, RecordingErrorReporter,
};
