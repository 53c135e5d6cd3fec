use std::sync::Arc;
use tracing::{info, instrument, warn, Instrument};

use crate::gateway::*;
use crate::observability::OperationTimer;
use crate::telemetry::{create_ticket_span, generate_correlation_id};

/// Ticket and timeline as they stand after a write
#[derive(Debug, Clone, PartialEq)]
pub struct TicketSnapshot {
    pub ticket: Ticket,
    pub history: Vec<TimelineEntry>,
}

/// Reads next-step options and commits workflow writes.
///
/// Every write is followed by a re-read of the ticket and its timeline so
/// callers never render the pre-write state.
#[derive(Clone)]
pub struct TransitionQueryService {
    gateway: Arc<dyn WorkflowGateway>,
}

impl std::fmt::Debug for TransitionQueryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionQueryService").finish_non_exhaustive()
    }
}

impl TransitionQueryService {
    pub fn new(gateway: Arc<dyn WorkflowGateway>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Arc<dyn WorkflowGateway> {
        &self.gateway
    }

    /// Parallel steps, paused tickets and closed tickets are never queried
    pub fn should_check_next_step(ticket: &Ticket) -> bool {
        !ticket.is_parallel_step() && !ticket.is_paused() && !ticket.is_closed()
    }

    #[instrument(skip(self))]
    pub async fn check_next_step(&self, ticket_id: u64) -> Result<TransitionQueryResult, GatewayError> {
        let result = self.gateway.check_next_step(ticket_id).await?;
        info!(ticket_id, transition_type = %result.transition_type(), "Next step resolved");
        Ok(result)
    }

    pub async fn load(&self, ticket_id: u64) -> Result<TicketSnapshot, GatewayError> {
        let ticket = self.gateway.get_ticket(ticket_id).await?;
        let history = self.gateway.ticket_history(ticket_id).await?;
        Ok(TicketSnapshot { ticket, history })
    }

    pub async fn parallel_tasks(&self, ticket_id: u64) -> Result<Vec<ParallelTask>, GatewayError> {
        self.gateway.parallel_tasks(ticket_id).await
    }

    pub async fn stored_signature(&self, user_id: u64) -> Result<Option<String>, GatewayError> {
        self.gateway.stored_signature(user_id).await
    }

    /// Re-read after a committed write. The write already happened, so a
    /// failed re-read degrades to what the write returned.
    async fn refresh(&self, written: Ticket) -> TicketSnapshot {
        let ticket_id = written.id;
        let ticket = match self.gateway.get_ticket(ticket_id).await {
            Ok(ticket) => ticket,
            Err(e) => {
                warn!(ticket_id, error = %e, "Ticket refresh failed after write");
                written
            }
        };
        let history = match self.gateway.ticket_history(ticket_id).await {
            Ok(history) => history,
            Err(e) => {
                warn!(ticket_id, error = %e, "Timeline refresh failed after write");
                Vec::new()
            }
        };
        TicketSnapshot { ticket, history }
    }

    pub async fn transition(
        &self,
        request: &TransitionRequest,
        files: &[Attachment],
    ) -> Result<TicketSnapshot, GatewayError> {
        let correlation_id = generate_correlation_id();
        let span = create_ticket_span("transition", request.ticket_id, &correlation_id);
        async {
            let timer = OperationTimer::new("transition");
            let written = self.gateway.transition_ticket(request, files).await?;
            info!(
                ticket_id = request.ticket_id,
                transition_key = %request.transition_key,
                attachments = files.len(),
                "Ticket transitioned"
            );
            let snapshot = self.refresh(written).await;
            timer.finish();
            Ok(snapshot)
        }
        .instrument(span)
        .await
    }

    pub async fn sign_parallel_task(
        &self,
        request: &SignParallelTaskRequest,
    ) -> Result<(SignParallelTaskResponse, Option<TicketSnapshot>), GatewayError> {
        let correlation_id = generate_correlation_id();
        let span = create_ticket_span("sign_parallel_task", request.ticket_id, &correlation_id);
        async {
            let response = self.gateway.sign_parallel_task(request).await?;
            info!(
                ticket_id = request.ticket_id,
                auto_advanced = response.auto_advanced,
                "Parallel part signed"
            );
            // The signature is committed; a failed re-read leaves the caller's copy in place
            let snapshot = match self.load(request.ticket_id).await {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    warn!(ticket_id = request.ticket_id, error = %e, "Ticket reload failed after signing");
                    None
                }
            };
            Ok((response, snapshot))
        }
        .instrument(span)
        .await
    }

    #[instrument(skip(self, reason))]
    pub async fn raise_novelty(&self, ticket_id: u64, reason: String) -> Result<TicketSnapshot, GatewayError> {
        let written = self.gateway.create_novelty(ticket_id, &NoveltyRequest { reason }).await?;
        info!(ticket_id, "Novelty raised, ticket paused");
        Ok(self.refresh(written).await)
    }

    #[instrument(skip(self, comment))]
    pub async fn resolve_novelty(&self, ticket_id: u64, comment: String) -> Result<TicketSnapshot, GatewayError> {
        let written = self
            .gateway
            .resolve_novelty(ticket_id, &ResolveNoveltyRequest { comment })
            .await?;
        info!(ticket_id, "Novelty resolved, ticket reopened");
        Ok(self.refresh(written).await)
    }

    #[instrument(skip(self, request))]
    pub async fn close(&self, ticket_id: u64, request: &CloseTicketRequest) -> Result<TicketSnapshot, GatewayError> {
        let written = self.gateway.close_ticket(ticket_id, request).await?;
        info!(ticket_id, "Ticket closed");
        Ok(self.refresh(written).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::client::MockWorkflowGateway;
    use crate::gateway::mocks::{step, ticket_on, GatewayCall, RecordingGateway};
    use std::collections::BTreeMap;

    fn request() -> TransitionRequest {
        TransitionRequest {
            ticket_id: 42,
            transition_key: "7".to_string(),
            target_user_id: None,
            manual_assignments: BTreeMap::new(),
            template_values: Vec::new(),
            signature: None,
            boss_id: None,
            comment: "<p>Listo</p>".to_string(),
        }
    }

    #[test]
    fn test_skip_rules() {
        let linear = ticket_on(step(3, StepKind::Linear));
        assert!(TransitionQueryService::should_check_next_step(&linear));

        let parallel = ticket_on(step(3, StepKind::Parallel));
        assert!(!TransitionQueryService::should_check_next_step(&parallel));

        let mut paused = linear.clone();
        paused.status = TicketStatus::Paused;
        assert!(!TransitionQueryService::should_check_next_step(&paused));

        let mut closed = linear;
        closed.status = TicketStatus::Closed;
        assert!(!TransitionQueryService::should_check_next_step(&closed));
    }

    #[tokio::test]
    async fn test_transition_refreshes_ticket_and_timeline() {
        let gateway = Arc::new(RecordingGateway::new(ticket_on(step(3, StepKind::Linear))));
        gateway.set_ticket_after_transition(ticket_on(step(7, StepKind::Linear)));
        let service = TransitionQueryService::new(gateway.clone());

        let snapshot = service.transition(&request(), &[]).await.unwrap();
        assert_eq!(snapshot.ticket.current_step.unwrap().id, 7);

        let calls = gateway.calls();
        assert!(matches!(calls[0], GatewayCall::Transition { .. }));
        assert_eq!(calls[1], GatewayCall::GetTicket(42));
        assert_eq!(calls[2], GatewayCall::History(42));
    }

    #[tokio::test]
    async fn test_failed_write_skips_refresh() {
        let gateway = Arc::new(RecordingGateway::new(ticket_on(step(3, StepKind::Linear))));
        gateway.fail_writes_with(403, "Sin permiso");
        let service = TransitionQueryService::new(gateway.clone());

        let err = service.transition(&request(), &[]).await.unwrap_err();
        assert_eq!(err.status(), Some(403));
        assert_eq!(gateway.count_calls(|c| matches!(c, GatewayCall::GetTicket(_))), 0);
    }

    #[tokio::test]
    async fn test_signature_stands_when_reload_fails() {
        let mut mock = MockWorkflowGateway::new();
        mock.expect_sign_parallel_task().times(1).returning(|_| {
            Ok(SignParallelTaskResponse {
                auto_advanced: false,
                message: "Firma registrada".to_string(),
            })
        });
        mock.expect_get_ticket().returning(|_| {
            Err(GatewayError::Http {
                status: 502,
                message: "bad gateway".to_string(),
            })
        });
        let service = TransitionQueryService::new(Arc::new(mock));

        let request = SignParallelTaskRequest {
            ticket_id: 42,
            comment: "Revisado".to_string(),
            signature: None,
        };
        let (response, snapshot) = service.sign_parallel_task(&request).await.unwrap();
        assert_eq!(response.message, "Firma registrada");
        assert!(snapshot.is_none());
    }

    #[tokio::test]
    async fn test_novelty_round_trip_updates_status() {
        let gateway = Arc::new(RecordingGateway::new(ticket_on(step(3, StepKind::Linear))));
        let service = TransitionQueryService::new(gateway.clone());

        let paused = service.raise_novelty(42, "Falta equipo".to_string()).await.unwrap();
        assert!(paused.ticket.is_paused());

        let reopened = service.resolve_novelty(42, "Equipo recibido".to_string()).await.unwrap();
        assert_eq!(reopened.ticket.status, TicketStatus::Open);
    }
}
