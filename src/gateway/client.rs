use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::errors::GatewayError;
use super::types::*;
use crate::config::GatewayConfig;
use crate::http::RateLimitedHttpClient;

/// Operations the workflow coordinator needs from the DeskFlow backend.
///
/// The backend owns every workflow decision; implementations only carry
/// requests and decode answers.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait WorkflowGateway: Send + Sync {
    async fn get_ticket(&self, ticket_id: u64) -> Result<Ticket, GatewayError>;

    async fn ticket_history(&self, ticket_id: u64) -> Result<Vec<TimelineEntry>, GatewayError>;

    /// Ask what can happen next for the ticket
    async fn check_next_step(&self, ticket_id: u64) -> Result<TransitionQueryResult, GatewayError>;

    /// Commit a transition. Attachments switch the request to multipart.
    async fn transition_ticket(
        &self,
        request: &TransitionRequest,
        files: &[Attachment],
    ) -> Result<Ticket, GatewayError>;

    async fn parallel_tasks(&self, ticket_id: u64) -> Result<Vec<ParallelTask>, GatewayError>;

    async fn sign_parallel_task(
        &self,
        request: &SignParallelTaskRequest,
    ) -> Result<SignParallelTaskResponse, GatewayError>;

    async fn create_novelty(&self, ticket_id: u64, request: &NoveltyRequest) -> Result<Ticket, GatewayError>;

    async fn resolve_novelty(
        &self,
        ticket_id: u64,
        request: &ResolveNoveltyRequest,
    ) -> Result<Ticket, GatewayError>;

    async fn close_ticket(&self, ticket_id: u64, request: &CloseTicketRequest) -> Result<Ticket, GatewayError>;

    /// The signature stored on the user's profile, if any
    async fn stored_signature(&self, user_id: u64) -> Result<Option<String>, GatewayError>;
}

/// [`WorkflowGateway`] over the DeskFlow REST API
#[derive(Debug, Clone)]
pub struct HttpGateway {
    http: Arc<RateLimitedHttpClient>,
}

impl HttpGateway {
    pub fn new(settings: &GatewayConfig) -> Result<Self, GatewayError> {
        let http = RateLimitedHttpClient::new(settings)?;
        Ok(Self { http: Arc::new(http) })
    }

    pub fn with_client(http: Arc<RateLimitedHttpClient>) -> Self {
        Self { http }
    }

    /// Drop cached reads for a ticket after any write to it, accepted or not.
    /// A rejection such as 409 usually means the cached copy is already stale.
    async fn invalidate_ticket(&self, ticket_id: u64) {
        self.http.invalidate_cache_prefix(&format!("tickets/{ticket_id}")).await;
    }

    fn multipart_form(request: &TransitionRequest, files: &[Attachment]) -> Result<Form, GatewayError> {
        let payload = serde_json::to_string(request)?;
        let mut form = Form::new().text("payload", payload);
        for file in files {
            let part = Part::bytes(file.bytes.clone())
                .file_name(file.file_name.clone())
                .mime_str(&file.content_type)?;
            form = form.part("files", part);
        }
        Ok(form)
    }
}

#[async_trait]
impl WorkflowGateway for HttpGateway {
    #[instrument(skip(self))]
    async fn get_ticket(&self, ticket_id: u64) -> Result<Ticket, GatewayError> {
        self.http.get_json(&format!("tickets/{ticket_id}"), true).await
    }

    #[instrument(skip(self))]
    async fn ticket_history(&self, ticket_id: u64) -> Result<Vec<TimelineEntry>, GatewayError> {
        self.http.get_json(&format!("tickets/{ticket_id}/history"), true).await
    }

    #[instrument(skip(self))]
    async fn check_next_step(&self, ticket_id: u64) -> Result<TransitionQueryResult, GatewayError> {
        let value = self
            .http
            .get_value(&format!("workflows/check-next-step/{ticket_id}"))
            .await?;
        let raw: RawTransitionQuery = serde_json::from_value(value)?;
        let result = TransitionQueryResult::try_from(raw).map_err(GatewayError::InvalidResponse)?;
        debug!(transition_type = %result.transition_type(), "Next step resolved");
        Ok(result)
    }

    #[instrument(skip(self, request, files), fields(ticket_id = request.ticket_id, files = files.len()))]
    async fn transition_ticket(
        &self,
        request: &TransitionRequest,
        files: &[Attachment],
    ) -> Result<Ticket, GatewayError> {
        let sent: Result<Ticket, GatewayError> = if files.is_empty() {
            self.http
                .send_json(Method::POST, "workflows/transition", request)
                .await
        } else {
            let form = Self::multipart_form(request, files)?;
            self.http.send_multipart("workflows/transition", form).await
        };
        self.invalidate_ticket(request.ticket_id).await;
        let ticket = sent?;
        info!(
            ticket_id = request.ticket_id,
            transition_key = %request.transition_key,
            "Transition accepted"
        );
        Ok(ticket)
    }

    #[instrument(skip(self))]
    async fn parallel_tasks(&self, ticket_id: u64) -> Result<Vec<ParallelTask>, GatewayError> {
        self.http
            .get_json(&format!("tickets/{ticket_id}/parallel-tasks"), true)
            .await
    }

    #[instrument(skip(self, request), fields(ticket_id = request.ticket_id))]
    async fn sign_parallel_task(
        &self,
        request: &SignParallelTaskRequest,
    ) -> Result<SignParallelTaskResponse, GatewayError> {
        let sent: Result<SignParallelTaskResponse, GatewayError> = self
            .http
            .send_json(Method::POST, "workflows/sign-parallel-task", request)
            .await;
        self.invalidate_ticket(request.ticket_id).await;
        let response = sent?;
        info!(
            ticket_id = request.ticket_id,
            auto_advanced = response.auto_advanced,
            "Parallel task signed"
        );
        Ok(response)
    }

    #[instrument(skip(self, request))]
    async fn create_novelty(&self, ticket_id: u64, request: &NoveltyRequest) -> Result<Ticket, GatewayError> {
        let sent = self
            .http
            .send_json(Method::POST, &format!("tickets/{ticket_id}/novelties"), request)
            .await;
        self.invalidate_ticket(ticket_id).await;
        sent
    }

    #[instrument(skip(self, request))]
    async fn resolve_novelty(
        &self,
        ticket_id: u64,
        request: &ResolveNoveltyRequest,
    ) -> Result<Ticket, GatewayError> {
        let sent = self
            .http
            .send_json(Method::PUT, &format!("tickets/{ticket_id}/novelties/resolve"), request)
            .await;
        self.invalidate_ticket(ticket_id).await;
        sent
    }

    #[instrument(skip(self, request))]
    async fn close_ticket(&self, ticket_id: u64, request: &CloseTicketRequest) -> Result<Ticket, GatewayError> {
        let sent = self
            .http
            .send_json(Method::POST, &format!("tickets/{ticket_id}/close"), request)
            .await;
        self.invalidate_ticket(ticket_id).await;
        sent
    }

    #[instrument(skip(self))]
    async fn stored_signature(&self, user_id: u64) -> Result<Option<String>, GatewayError> {
        match self
            .http
            .get_json::<StoredSignature>(&format!("users/{user_id}/signature"), true)
            .await
        {
            Ok(stored) => Ok(stored.signature.filter(|s| !s.trim().is_empty())),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}
