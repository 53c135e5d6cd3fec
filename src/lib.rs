// DeskFlow Library - workflow transitions for DeskFlow tickets
// This exposes the coordinator components for the CLI, tests and embedding

pub mod cli;
pub mod config;
pub mod gateway;
pub mod http;
pub mod observability;
pub mod priority;
pub mod telemetry;
pub mod workflow;

// Re-export key types for easy access
pub use config::DeskFlowConfig;
pub use gateway::{GatewayError, HttpGateway, Ticket, TransitionQueryResult, WorkflowGateway};
pub use http::RateLimitedHttpClient;
pub use observability::{gateway_metrics, GatewayMetrics, OperationTimer};
pub use priority::Priority;
pub use telemetry::{create_ticket_span, generate_correlation_id, init_telemetry};
pub use workflow::{
    ComposerError,
    DecisionForm,
    ResponseComposer,
    SubmitOutcome,
    TransitionQueryService,
    TransitionViewModel,
    Viewer,
};
