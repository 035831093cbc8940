mod accumulator;
mod client_utils;
mod errors;
pub mod google;
pub mod openai;
mod provider;
pub mod sdk_test;
mod telemetry;
mod types;

pub use accumulator::StreamAccumulator;
pub use errors::*;
pub use provider::{ChatStream, ModelProvider};
pub use types::*;
