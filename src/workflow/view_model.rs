use statig::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::query::TransitionQueryService;
use crate::gateway::{FinalStepInfo, GatewayError, ParallelPendingInfo, TransitionQueryResult};
use crate::observability::gateway_metrics;

/// What a next-step check resolved to, as seen by the view-model
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    Options(TransitionQueryResult),
    Blocked(ParallelPendingInfo),
    CloseOnly(FinalStepInfo),
    Failed(String),
}

impl From<Result<TransitionQueryResult, GatewayError>> for CheckOutcome {
    fn from(result: Result<TransitionQueryResult, GatewayError>) -> Self {
        match result {
            Ok(TransitionQueryResult::ParallelPending(info)) => CheckOutcome::Blocked(info),
            Ok(TransitionQueryResult::Final(info)) => CheckOutcome::CloseOnly(info),
            Ok(options) => CheckOutcome::Options(options),
            Err(e) => CheckOutcome::Failed(e.toast_message()),
        }
    }
}

impl CheckOutcome {
    /// What to show for an answer that does not open the modal
    pub fn notice(&self) -> Option<Notice> {
        match self {
            CheckOutcome::Options(_) => None,
            CheckOutcome::Blocked(info) => {
                let message = if info.message.trim().is_empty() {
                    format!(
                        "Waiting for parallel approvals ({}/{} completed)",
                        info.completed, info.total
                    )
                } else {
                    info.message.clone()
                };
                Some(Notice::BlockingWarning(message))
            }
            CheckOutcome::CloseOnly(info) => Some(Notice::CloseOnly {
                step_name: info.step_name.clone(),
            }),
            CheckOutcome::Failed(message) => Some(Notice::Error(message.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlowEvent {
    CheckRequested { seq: u64 },
    CheckResolved { seq: u64, outcome: CheckOutcome },
    CloseModal,
    SubmitStarted,
    SubmitFinished { error: Option<String> },
}

/// Message the view shows outside the transition modal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Parallel approvals still outstanding; advancing is blocked
    BlockingWarning(String),
    /// The ticket sits on a final step; the only way forward is closing it
    CloseOnly { step_name: String },
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Checking,
    ModalOpen,
    Submitting,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlowError {
    #[error("Another operation is still running ({0:?})")]
    Busy(Phase),
    #[error("No transition modal is open")]
    ModalClosed,
}

/// Shared storage behind the transition state machine
#[derive(Debug, Default)]
pub struct TransitionFlow {
    pub ticket_id: u64,
    options: Option<TransitionQueryResult>,
    notice: Option<Notice>,
    discarded_responses: u64,
}

impl TransitionFlow {
    pub fn new(ticket_id: u64) -> Self {
        Self {
            ticket_id,
            ..Default::default()
        }
    }

    pub fn options(&self) -> Option<&TransitionQueryResult> {
        self.options.as_ref()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn discarded_responses(&self) -> u64 {
        self.discarded_responses
    }

    fn discard(&mut self, seq: u64) {
        self.discarded_responses += 1;
        gateway_metrics().record_stale_response();
        debug!(ticket_id = self.ticket_id, seq, "Discarding superseded next-step response");
    }

    fn apply(&mut self, outcome: &CheckOutcome) -> Outcome<State> {
        match outcome {
            CheckOutcome::Options(options) => {
                info!(
                    ticket_id = self.ticket_id,
                    transition_type = %options.transition_type(),
                    "Opening transition modal"
                );
                self.options = Some(options.clone());
                Transition(State::modal_open())
            }
            other => {
                if let CheckOutcome::Failed(message) = other {
                    warn!(ticket_id = self.ticket_id, error = %message, "Next-step check failed");
                }
                self.notice = other.notice();
                Transition(State::idle())
            }
        }
    }
}

#[state_machine(initial = "State::idle()")]
impl TransitionFlow {
    #[state]
    fn idle(&mut self, event: &FlowEvent) -> Outcome<State> {
        match event {
            FlowEvent::CheckRequested { seq } => {
                self.notice = None;
                Transition(State::checking(*seq))
            }
            FlowEvent::SubmitStarted => {
                self.notice = None;
                Transition(State::submitting(false))
            }
            FlowEvent::CheckResolved { seq, .. } => {
                self.discard(*seq);
                Handled
            }
            _ => Handled,
        }
    }

    #[state]
    fn checking(&mut self, seq: &mut u64, event: &FlowEvent) -> Outcome<State> {
        match event {
            // A newer request supersedes the one in flight
            FlowEvent::CheckRequested { seq: newer } => {
                *seq = *newer;
                Handled
            }
            FlowEvent::CheckResolved { seq: answered, outcome } if *answered == *seq => self.apply(outcome),
            FlowEvent::CheckResolved { seq: answered, .. } => {
                self.discard(*answered);
                Handled
            }
            _ => Handled,
        }
    }

    #[state]
    fn modal_open(&mut self, event: &FlowEvent) -> Outcome<State> {
        match event {
            FlowEvent::CheckRequested { seq } => {
                self.options = None;
                self.notice = None;
                Transition(State::checking(*seq))
            }
            FlowEvent::CloseModal => {
                self.options = None;
                Transition(State::idle())
            }
            FlowEvent::SubmitStarted => Transition(State::submitting(true)),
            FlowEvent::CheckResolved { seq, .. } => {
                self.discard(*seq);
                Handled
            }
            _ => Handled,
        }
    }

    #[state]
    fn submitting(&mut self, from_modal: &mut bool, event: &FlowEvent) -> Outcome<State> {
        match event {
            FlowEvent::SubmitFinished { error: None } => {
                self.options = None;
                Transition(State::idle())
            }
            FlowEvent::SubmitFinished { error: Some(message) } => {
                self.notice = Some(Notice::Error(message.clone()));
                if *from_modal {
                    Transition(State::modal_open())
                } else {
                    Transition(State::idle())
                }
            }
            FlowEvent::CheckResolved { seq, .. } => {
                self.discard(*seq);
                Handled
            }
            _ => Handled,
        }
    }
}

/// Drives the "advance ticket" interaction for one ticket.
///
/// Every next-step request is tagged with a sequence number; only the answer
/// to the most recent request is applied.
pub struct TransitionViewModel {
    machine: StateMachine<TransitionFlow>,
    next_seq: u64,
}

impl std::fmt::Debug for TransitionViewModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionViewModel")
            .field("phase", &self.phase())
            .field("flow", self.machine.inner())
            .field("next_seq", &self.next_seq)
            .finish()
    }
}

impl TransitionViewModel {
    pub fn new(ticket_id: u64) -> Self {
        Self {
            machine: TransitionFlow::new(ticket_id).state_machine(),
            next_seq: 0,
        }
    }

    pub fn ticket_id(&self) -> u64 {
        self.machine.inner().ticket_id
    }

    pub fn phase(&self) -> Phase {
        match self.machine.state() {
            State::Idle { .. } => Phase::Idle,
            State::Checking { .. } => Phase::Checking,
            State::ModalOpen { .. } => Phase::ModalOpen,
            State::Submitting { .. } => Phase::Submitting,
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.phase(), Phase::Checking | Phase::Submitting)
    }

    pub fn is_modal_open(&self) -> bool {
        self.phase() == Phase::ModalOpen
    }

    pub fn options(&self) -> Option<&TransitionQueryResult> {
        self.machine.inner().options()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.machine.inner().notice()
    }

    pub fn discarded_responses(&self) -> u64 {
        self.machine.inner().discarded_responses()
    }

    /// Start a check and return the sequence number its answer must carry
    pub fn begin_check(&mut self) -> Result<u64, FlowError> {
        if self.phase() == Phase::Submitting {
            return Err(FlowError::Busy(Phase::Submitting));
        }
        self.next_seq += 1;
        let seq = self.next_seq;
        self.machine.handle(&FlowEvent::CheckRequested { seq });
        Ok(seq)
    }

    /// Feed back the answer for request `seq`; returns false when it was stale
    pub fn resolve_check(&mut self, seq: u64, result: Result<TransitionQueryResult, GatewayError>) -> bool {
        let discarded_before = self.discarded_responses();
        self.machine.handle(&FlowEvent::CheckResolved {
            seq,
            outcome: CheckOutcome::from(result),
        });
        self.discarded_responses() == discarded_before
    }

    /// Issue a check and apply its answer
    pub async fn check_transition(&mut self, service: &TransitionQueryService) -> Result<Phase, FlowError> {
        let seq = self.begin_check()?;
        let result = service.check_next_step(self.ticket_id()).await;
        self.resolve_check(seq, result);
        Ok(self.phase())
    }

    /// Dismiss the modal, dropping whatever was selected in it
    pub fn close_modal(&mut self) {
        self.machine.handle(&FlowEvent::CloseModal);
    }

    pub fn begin_submit(&mut self) -> Result<(), FlowError> {
        match self.phase() {
            phase @ (Phase::Checking | Phase::Submitting) => Err(FlowError::Busy(phase)),
            _ => {
                self.machine.handle(&FlowEvent::SubmitStarted);
                Ok(())
            }
        }
    }

    /// Finish a submission. On failure the pre-submit state is restored.
    pub fn finish_submit(&mut self, error: Option<String>) {
        self.machine.handle(&FlowEvent::SubmitFinished { error });
    }
}
