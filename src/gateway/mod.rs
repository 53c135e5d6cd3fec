pub mod client;
pub mod errors;
pub mod types;

#[cfg(test)]
pub mod mocks;

pub use client::{HttpGateway, WorkflowGateway};
pub use errors::GatewayError;
pub use types::*;
