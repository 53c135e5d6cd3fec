// In-memory gateway for coordinator tests - records every call, no network

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::client::WorkflowGateway;
use super::errors::GatewayError;
use super::types::*;
use crate::priority::Priority;

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    GetTicket(u64),
    History(u64),
    CheckNextStep(u64),
    Transition { request: TransitionRequest, files: usize },
    ParallelTasks(u64),
    SignParallelTask(SignParallelTaskRequest),
    CreateNovelty(u64, NoveltyRequest),
    ResolveNovelty(u64, ResolveNoveltyRequest),
    Close(u64, CloseTicketRequest),
    StoredSignature(u64),
}

/// Scripted gateway: next-step answers are queued, writes mutate a single ticket
#[derive(Debug)]
pub struct RecordingGateway {
    pub ticket: Mutex<Ticket>,
    pub ticket_after_transition: Mutex<Option<Ticket>>,
    pub next_steps: Mutex<VecDeque<Result<TransitionQueryResult, GatewayError>>>,
    pub parallel_tasks: Mutex<Vec<ParallelTask>>,
    pub history: Mutex<Vec<TimelineEntry>>,
    pub sign_response: Mutex<SignParallelTaskResponse>,
    pub stored_signature: Mutex<Option<String>>,
    pub write_failure: Mutex<Option<(u16, String)>>,
    pub calls: Mutex<Vec<GatewayCall>>,
}

impl RecordingGateway {
    pub fn new(ticket: Ticket) -> Self {
        Self {
            ticket: Mutex::new(ticket),
            ticket_after_transition: Mutex::new(None),
            next_steps: Mutex::new(VecDeque::new()),
            parallel_tasks: Mutex::new(Vec::new()),
            history: Mutex::new(Vec::new()),
            sign_response: Mutex::new(SignParallelTaskResponse {
                auto_advanced: false,
                message: "Firma registrada".to_string(),
            }),
            stored_signature: Mutex::new(None),
            write_failure: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn push_next_step(&self, result: Result<TransitionQueryResult, GatewayError>) -> &Self {
        self.next_steps.lock().unwrap().push_back(result);
        self
    }

    pub fn set_ticket_after_transition(&self, ticket: Ticket) -> &Self {
        *self.ticket_after_transition.lock().unwrap() = Some(ticket);
        self
    }

    pub fn set_parallel_tasks(&self, tasks: Vec<ParallelTask>) -> &Self {
        *self.parallel_tasks.lock().unwrap() = tasks;
        self
    }

    pub fn set_stored_signature(&self, signature: Option<String>) -> &Self {
        *self.stored_signature.lock().unwrap() = signature;
        self
    }

    pub fn fail_writes_with(&self, status: u16, message: &str) -> &Self {
        *self.write_failure.lock().unwrap() = Some((status, message.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, predicate: impl Fn(&GatewayCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|call| predicate(call)).count()
    }

    pub fn transition_requests(&self) -> Vec<TransitionRequest> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|call| match call {
                GatewayCall::Transition { request, .. } => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: GatewayCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_write(&self) -> Result<(), GatewayError> {
        match self.write_failure.lock().unwrap().clone() {
            Some((status, message)) => Err(GatewayError::Http { status, message }),
            None => Ok(()),
        }
    }

    fn set_status(&self, status: TicketStatus) -> Ticket {
        let mut ticket = self.ticket.lock().unwrap();
        ticket.status = status;
        ticket.clone()
    }
}

#[async_trait]
impl WorkflowGateway for RecordingGateway {
    async fn get_ticket(&self, ticket_id: u64) -> Result<Ticket, GatewayError> {
        self.record(GatewayCall::GetTicket(ticket_id));
        Ok(self.ticket.lock().unwrap().clone())
    }

    async fn ticket_history(&self, ticket_id: u64) -> Result<Vec<TimelineEntry>, GatewayError> {
        self.record(GatewayCall::History(ticket_id));
        Ok(self.history.lock().unwrap().clone())
    }

    async fn check_next_step(&self, ticket_id: u64) -> Result<TransitionQueryResult, GatewayError> {
        self.record(GatewayCall::CheckNextStep(ticket_id));
        self.next_steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::InvalidResponse("no scripted next step".to_string())))
    }

    async fn transition_ticket(
        &self,
        request: &TransitionRequest,
        files: &[Attachment],
    ) -> Result<Ticket, GatewayError> {
        self.record(GatewayCall::Transition {
            request: request.clone(),
            files: files.len(),
        });
        self.check_write()?;
        if let Some(next) = self.ticket_after_transition.lock().unwrap().take() {
            *self.ticket.lock().unwrap() = next;
        }
        Ok(self.ticket.lock().unwrap().clone())
    }

    async fn parallel_tasks(&self, ticket_id: u64) -> Result<Vec<ParallelTask>, GatewayError> {
        self.record(GatewayCall::ParallelTasks(ticket_id));
        Ok(self.parallel_tasks.lock().unwrap().clone())
    }

    async fn sign_parallel_task(
        &self,
        request: &SignParallelTaskRequest,
    ) -> Result<SignParallelTaskResponse, GatewayError> {
        self.record(GatewayCall::SignParallelTask(request.clone()));
        self.check_write()?;
        Ok(self.sign_response.lock().unwrap().clone())
    }

    async fn create_novelty(&self, ticket_id: u64, request: &NoveltyRequest) -> Result<Ticket, GatewayError> {
        self.record(GatewayCall::CreateNovelty(ticket_id, request.clone()));
        self.check_write()?;
        Ok(self.set_status(TicketStatus::Paused))
    }

    async fn resolve_novelty(
        &self,
        ticket_id: u64,
        request: &ResolveNoveltyRequest,
    ) -> Result<Ticket, GatewayError> {
        self.record(GatewayCall::ResolveNovelty(ticket_id, request.clone()));
        self.check_write()?;
        Ok(self.set_status(TicketStatus::Open))
    }

    async fn close_ticket(&self, ticket_id: u64, request: &CloseTicketRequest) -> Result<Ticket, GatewayError> {
        self.record(GatewayCall::Close(ticket_id, request.clone()));
        self.check_write()?;
        Ok(self.set_status(TicketStatus::Closed))
    }

    async fn stored_signature(&self, user_id: u64) -> Result<Option<String>, GatewayError> {
        self.record(GatewayCall::StoredSignature(user_id));
        Ok(self.stored_signature.lock().unwrap().clone())
    }
}

/// A linear step with no guards
pub fn step(id: u64, kind: StepKind) -> StepRef {
    StepRef {
        id,
        name: format!("Paso {id}"),
        kind,
        is_final: false,
        forced_close: false,
        step_requires_signature: false,
        template_description: None,
        template_fields: Vec::new(),
    }
}

/// Open ticket 42 on `step`, assigned to user 5 and created by user 1
pub fn ticket_on(step: StepRef) -> Ticket {
    Ticket {
        id: 42,
        subject: "Solicitud de acceso".to_string(),
        description: String::new(),
        status: TicketStatus::Open,
        priority: Priority::Medium,
        current_step: Some(step),
        assignee_id: Some(5),
        parallel_assignee_ids: Vec::new(),
        creator_id: 1,
    }
}

pub fn candidate(id: u64) -> UserCandidate {
    UserCandidate {
        id,
        name: format!("Usuario {id}"),
    }
}

pub fn parallel_task(user_id: u64, state: ParallelTaskState) -> ParallelTask {
    ParallelTask {
        id: user_id * 10,
        ticket_id: 42,
        step_id: 3,
        user_id,
        user_name: format!("Usuario {user_id}"),
        state,
        comment: None,
    }
}
