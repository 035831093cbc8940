//! Test doubles for code that depends on [`crate::ModelProvider`].

mod provider;

pub use provider::{MockImageResult, MockProvider, MockStreamResult};
