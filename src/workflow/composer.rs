//! The response composer: comment editor state, pre-submit guards and the
//! action buttons a viewer gets for the ticket in front of them.

use chrono::Utc;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::decision_form::{DecisionForm, FormError};
use super::query::{TicketSnapshot, TransitionQueryService};
use super::signature::{Signature, SignatureError, SignatureSource};
use super::template_fields::{collect_values, PresetContext, TemplateFieldError};
use super::text;
use super::view_model::{CheckOutcome, FlowError, Notice, Phase, TransitionViewModel};
use crate::gateway::*;

/// The person operating the composer, injected by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub user_id: u64,
    pub display_name: String,
}

/// How the viewer relates to the ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Assignee,
    ParallelAssignee,
    Creator,
    ReadOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ResolveNovelty,
    MandatoryClose,
    SignParallelPart { enabled: bool },
    FinalizeAndClose,
    SubmitAndAdvance,
    RaiseNovelty,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Action::ResolveNovelty => "Resolve novelty",
            Action::MandatoryClose => "Close ticket (mandatory)",
            Action::SignParallelPart { .. } => "Sign my part",
            Action::FinalizeAndClose => "Finalize and close",
            Action::SubmitAndAdvance => "Submit and advance",
            Action::RaiseNovelty => "Raise novelty",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum ComposerError {
    #[error("Write a comment before continuing")]
    EmptyComment,
    #[error("The comment still matches the step template; describe what was done")]
    UnchangedTemplate,
    #[error("This step requires a signature")]
    SignatureRequired,
    #[error("You are not allowed to act on this ticket")]
    NotPermitted,
    #[error("'{0}' is not available right now")]
    ActionUnavailable(String),
    #[error("Another action is still in progress")]
    Busy,
    #[error(transparent)]
    IncompleteSelection(#[from] FormError),
    #[error(transparent)]
    InvalidTemplateField(#[from] TemplateFieldError),
    #[error(transparent)]
    InvalidSignature(#[from] SignatureError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl From<FlowError> for ComposerError {
    fn from(err: FlowError) -> Self {
        match err {
            FlowError::Busy(_) => ComposerError::Busy,
            FlowError::ModalClosed => ComposerError::ActionUnavailable("confirm transition".to_string()),
        }
    }
}

impl ComposerError {
    pub fn toast_message(&self) -> String {
        match self {
            ComposerError::Gateway(e) => e.toast_message(),
            other => other.to_string(),
        }
    }
}

/// Where "submit and advance" landed
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Options are on screen; fill the form and call `confirm_transition`
    DecisionRequired(DecisionForm),
    /// Parallel approvals are outstanding
    Blocked(String),
    /// The step is final; the close confirmation dialog is now open
    CloseDialogOpened,
    /// The next-step check failed; the message is the toast text
    Failed(String),
}

pub struct ResponseComposer {
    service: TransitionQueryService,
    view_model: TransitionViewModel,
    viewer: Viewer,
    ticket: Ticket,
    history: Vec<TimelineEntry>,
    parallel_tasks: Vec<ParallelTask>,
    next_step: Option<TransitionQueryResult>,
    next_step_notice: Option<Notice>,
    comment: String,
    attachments: Vec<Attachment>,
    signature: Option<Signature>,
    template_inputs: BTreeMap<u64, String>,
    signature_dialog_open: bool,
    close_dialog_open: bool,
}

impl fmt::Debug for ResponseComposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseComposer")
            .field("ticket_id", &self.ticket.id)
            .field("viewer", &self.viewer.user_id)
            .field("view_model", &self.view_model)
            .field("attachments", &self.attachments.len())
            .field("has_signature", &self.signature.is_some())
            .finish()
    }
}

impl ResponseComposer {
    pub fn new(service: TransitionQueryService, viewer: Viewer, ticket: Ticket) -> Self {
        let comment = ticket.template_description().unwrap_or_default().to_string();
        Self {
            view_model: TransitionViewModel::new(ticket.id),
            service,
            viewer,
            ticket,
            history: Vec::new(),
            parallel_tasks: Vec::new(),
            next_step: None,
            next_step_notice: None,
            comment,
            attachments: Vec::new(),
            signature: None,
            template_inputs: BTreeMap::new(),
            signature_dialog_open: false,
            close_dialog_open: false,
        }
    }

    /// Load the ticket and its timeline, then look ahead at the next step
    pub async fn open(
        service: TransitionQueryService,
        viewer: Viewer,
        ticket_id: u64,
    ) -> Result<Self, ComposerError> {
        let snapshot = service.load(ticket_id).await?;
        let mut composer = Self::new(service, viewer, snapshot.ticket);
        composer.history = snapshot.history;
        composer.mount().await;
        Ok(composer)
    }

    /// Fetch parallel tasks for parallel steps and look up the next-step
    /// shape when the ticket is eligible. The transition modal stays closed;
    /// only `submit_and_advance` opens it.
    pub async fn mount(&mut self) {
        self.refresh_parallel_tasks().await;
        self.next_step = None;
        self.next_step_notice = None;
        if !TransitionQueryService::should_check_next_step(&self.ticket) {
            return;
        }
        match self.service.check_next_step(self.ticket.id).await {
            Ok(next) => {
                self.next_step_notice = CheckOutcome::from(Ok(next.clone())).notice();
                self.next_step = Some(next);
            }
            Err(e) => {
                debug!(ticket_id = self.ticket.id, error = %e, "Next-step lookup failed");
                self.next_step_notice = Some(Notice::Error(e.toast_message()));
            }
        }
    }

    pub fn ticket(&self) -> &Ticket {
        &self.ticket
    }

    pub fn history(&self) -> &[TimelineEntry] {
        &self.history
    }

    pub fn parallel_tasks(&self) -> &[ParallelTask] {
        &self.parallel_tasks
    }

    pub fn view_model(&self) -> &TransitionViewModel {
        &self.view_model
    }

    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    pub fn is_busy(&self) -> bool {
        self.view_model.is_busy()
    }

    /// What the last mount learned about the next step
    pub fn next_step(&self) -> Option<&TransitionQueryResult> {
        self.next_step.as_ref()
    }

    /// The view-model's notice, else whatever the mount lookup reported
    pub fn notice(&self) -> Option<&Notice> {
        self.view_model.notice().or(self.next_step_notice.as_ref())
    }

    pub fn access(&self) -> Access {
        let me = self.viewer.user_id;
        if self.ticket.assignee_id == Some(me) {
            Access::Assignee
        } else if self.ticket.parallel_assignee_ids.contains(&me) {
            Access::ParallelAssignee
        } else if self.ticket.creator_id == me {
            Access::Creator
        } else {
            Access::ReadOnly
        }
    }

    /// The viewer's own task on the current parallel step
    pub fn my_parallel_task(&self) -> Option<&ParallelTask> {
        let step_id = self.ticket.current_step.as_ref()?.id;
        self.parallel_tasks
            .iter()
            .find(|task| task.user_id == self.viewer.user_id && task.step_id == step_id)
    }

    pub fn primary_action(&self) -> Option<Action> {
        if self.ticket.is_closed() || self.access() == Access::ReadOnly {
            return None;
        }
        let action = if self.ticket.is_paused() {
            Action::ResolveNovelty
        } else if self.ticket.is_forced_close_step() {
            Action::MandatoryClose
        } else if self.ticket.is_parallel_step() {
            let enabled = self
                .my_parallel_task()
                .is_some_and(|task| task.state == ParallelTaskState::Pending);
            Action::SignParallelPart { enabled }
        } else if self.ticket.is_final_step() {
            Action::FinalizeAndClose
        } else {
            Action::SubmitAndAdvance
        };
        Some(action)
    }

    /// Every button the viewer sees, primary first
    pub fn rendered_actions(&self) -> Vec<Action> {
        let mut actions: Vec<Action> = self.primary_action().into_iter().collect();
        if !actions.is_empty() && self.ticket.status == TicketStatus::Open {
            actions.push(Action::RaiseNovelty);
        }
        actions
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn set_comment(&mut self, html: impl Into<String>) {
        self.comment = html.into();
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn attach(&mut self, attachment: Attachment) {
        self.attachments.push(attachment);
    }

    pub fn remove_attachment(&mut self, file_name: &str) -> bool {
        let before = self.attachments.len();
        self.attachments.retain(|a| a.file_name != file_name);
        self.attachments.len() != before
    }

    pub fn set_template_value(&mut self, field_id: u64, value: impl Into<String>) -> Result<(), ComposerError> {
        let editable = self
            .ticket
            .template_fields()
            .iter()
            .any(|field| field.id == field_id && field.is_user_editable());
        if !editable {
            return Err(TemplateFieldError::UnknownField(field_id).into());
        }
        self.template_inputs.insert(field_id, value.into());
        Ok(())
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    pub fn signature_dialog_open(&self) -> bool {
        self.signature_dialog_open
    }

    pub fn close_dialog_open(&self) -> bool {
        self.close_dialog_open
    }

    /// Store a drawn or uploaded signature and dismiss the dialog
    pub fn capture_signature(&mut self, signature: Signature) {
        debug!(ticket_id = self.ticket.id, source = ?signature.source(), "Signature captured");
        self.signature = Some(signature);
        self.signature_dialog_open = false;
    }

    pub fn dismiss_signature_dialog(&mut self) {
        self.signature_dialog_open = false;
    }

    /// Use the signature stored on the viewer's profile. Returns false when none is stored.
    pub async fn use_profile_signature(&mut self) -> Result<bool, ComposerError> {
        match self.service.stored_signature(self.viewer.user_id).await? {
            Some(payload) => {
                self.capture_signature(Signature::new(payload, SignatureSource::Profile)?);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn ensure_can_act(&self) -> Result<(), ComposerError> {
        if self.access() == Access::ReadOnly {
            return Err(ComposerError::NotPermitted);
        }
        if self.view_model.is_busy() {
            return Err(ComposerError::Busy);
        }
        Ok(())
    }

    fn ensure_primary(&self, wanted: impl Fn(Action) -> bool, label: &str) -> Result<Action, ComposerError> {
        match self.primary_action() {
            Some(action) if wanted(action) => Ok(action),
            _ => Err(ComposerError::ActionUnavailable(label.to_string())),
        }
    }

    /// Opens the signature dialog when the step needs one and none is captured
    fn ensure_signature(&mut self) -> Result<(), ComposerError> {
        if self.ticket.step_requires_signature() && self.signature.is_none() {
            self.signature_dialog_open = true;
            return Err(ComposerError::SignatureRequired);
        }
        Ok(())
    }

    fn validate_comment(&self) -> Result<(), ComposerError> {
        if text::is_blank(&self.comment) {
            return Err(ComposerError::EmptyComment);
        }
        if let Some(template) = self.ticket.template_description() {
            if text::matches_template(&self.comment, template) {
                return Err(ComposerError::UnchangedTemplate);
            }
        }
        Ok(())
    }

    fn template_values(&self) -> Result<Vec<TemplateValue>, ComposerError> {
        let ctx = PresetContext {
            user_name: &self.viewer.display_name,
            ticket_id: self.ticket.id,
            today: Utc::now().date_naive(),
        };
        Ok(collect_values(self.ticket.template_fields(), &self.template_inputs, &ctx)?)
    }

    fn signature_payload(&self) -> Option<String> {
        self.signature.as_ref().map(|s| s.payload().to_string())
    }

    fn apply_snapshot(&mut self, snapshot: &TicketSnapshot) {
        self.ticket = snapshot.ticket.clone();
        self.history = snapshot.history.clone();
    }

    /// Back to a fresh editor for whatever step the ticket is on now
    fn reset_editor(&mut self) {
        self.comment = self.ticket.template_description().unwrap_or_default().to_string();
        self.attachments.clear();
        self.signature = None;
        self.template_inputs.clear();
        self.signature_dialog_open = false;
        self.close_dialog_open = false;
    }

    async fn refresh_parallel_tasks(&mut self) {
        if !self.ticket.is_parallel_step() {
            self.parallel_tasks.clear();
            return;
        }
        match self.service.parallel_tasks(self.ticket.id).await {
            Ok(tasks) => self.parallel_tasks = tasks,
            Err(e) => warn!(ticket_id = self.ticket.id, error = %e, "Could not load parallel tasks"),
        }
    }

    /// Run the guards, then ask the server what comes next
    pub async fn submit_and_advance(&mut self) -> Result<SubmitOutcome, ComposerError> {
        self.ensure_can_act()?;
        self.ensure_primary(|a| a == Action::SubmitAndAdvance, "submit and advance")?;
        self.ensure_signature()?;
        self.validate_comment()?;
        self.template_values()?;

        let phase = self.view_model.check_transition(&self.service).await?;
        if phase == Phase::ModalOpen {
            let viewer_is_assignee = self.ticket.assignee_id == Some(self.viewer.user_id);
            return self
                .view_model
                .options()
                .and_then(|options| DecisionForm::new(options, viewer_is_assignee))
                .map(SubmitOutcome::DecisionRequired)
                .ok_or_else(|| ComposerError::ActionUnavailable("submit and advance".to_string()));
        }

        Ok(match self.view_model.notice().cloned() {
            Some(Notice::BlockingWarning(message)) => SubmitOutcome::Blocked(message),
            Some(Notice::CloseOnly { .. }) => {
                self.close_dialog_open = true;
                SubmitOutcome::CloseDialogOpened
            }
            Some(Notice::Error(message)) => SubmitOutcome::Failed(message),
            None => SubmitOutcome::Failed("The server returned no next step".to_string()),
        })
    }

    /// Dismiss the transition modal without committing
    pub fn cancel_transition(&mut self) {
        self.view_model.close_modal();
    }

    /// Commit the transition chosen in `form`
    pub async fn confirm_transition(&mut self, form: &DecisionForm) -> Result<TicketSnapshot, ComposerError> {
        self.ensure_can_act()?;
        self.ensure_primary(|a| a == Action::SubmitAndAdvance, "submit and advance")?;
        if !self.view_model.is_modal_open() {
            return Err(FlowError::ModalClosed.into());
        }
        let selection = form.build_selection()?;
        self.ensure_signature()?;
        self.validate_comment()?;

        let request = TransitionRequest {
            ticket_id: self.ticket.id,
            transition_key: selection.transition_key,
            target_user_id: selection.target_user_id,
            manual_assignments: selection.manual_assignments,
            template_values: self.template_values()?,
            signature: self.signature_payload(),
            boss_id: selection.boss_id,
            comment: self.comment.clone(),
        };

        self.view_model.begin_submit()?;
        match self.service.transition(&request, &self.attachments).await {
            Ok(snapshot) => {
                self.view_model.finish_submit(None);
                self.apply_snapshot(&snapshot);
                self.reset_editor();
                self.mount().await;
                Ok(snapshot)
            }
            Err(e) => {
                self.view_model.finish_submit(Some(e.toast_message()));
                Err(e.into())
            }
        }
    }

    /// Sign the viewer's part of a parallel step
    pub async fn sign_parallel_part(&mut self) -> Result<SignParallelTaskResponse, ComposerError> {
        self.ensure_can_act()?;
        self.ensure_primary(
            |a| a == Action::SignParallelPart { enabled: true },
            "sign my part",
        )?;
        self.ensure_signature()?;
        self.validate_comment()?;

        let request = SignParallelTaskRequest {
            ticket_id: self.ticket.id,
            comment: self.comment.clone(),
            signature: self.signature_payload(),
        };

        self.view_model.begin_submit()?;
        match self.service.sign_parallel_task(&request).await {
            Ok((response, snapshot)) => {
                self.view_model.finish_submit(None);
                info!(
                    ticket_id = self.ticket.id,
                    auto_advanced = response.auto_advanced,
                    "{}",
                    response.message
                );
                self.mark_my_part_signed();
                if let Some(snapshot) = &snapshot {
                    self.apply_snapshot(snapshot);
                }
                self.reset_editor();
                self.mount().await;
                Ok(response)
            }
            Err(e) => {
                self.view_model.finish_submit(Some(e.toast_message()));
                Err(e.into())
            }
        }
    }

    /// The server accepted the signature; keep the button disabled even if
    /// the task list cannot be re-read
    fn mark_my_part_signed(&mut self) {
        let me = self.viewer.user_id;
        for task in self.parallel_tasks.iter_mut().filter(|task| task.user_id == me) {
            task.state = ParallelTaskState::Completed;
        }
    }

    /// Open the close confirmation for final and forced-close steps
    pub fn open_close_dialog(&mut self) -> Result<(), ComposerError> {
        self.ensure_can_act()?;
        self.ensure_primary(
            |a| matches!(a, Action::FinalizeAndClose | Action::MandatoryClose),
            "close ticket",
        )?;
        self.close_dialog_open = true;
        Ok(())
    }

    pub fn dismiss_close_dialog(&mut self) {
        self.close_dialog_open = false;
    }

    pub async fn confirm_close(&mut self, comment_html: &str) -> Result<TicketSnapshot, ComposerError> {
        if !self.close_dialog_open {
            return Err(ComposerError::ActionUnavailable("close confirmation".to_string()));
        }
        self.ensure_can_act()?;
        if text::is_blank(comment_html) {
            return Err(ComposerError::EmptyComment);
        }
        self.ensure_signature()?;

        let request = CloseTicketRequest {
            comment: comment_html.to_string(),
            signature: self.signature_payload(),
        };
        self.view_model.begin_submit()?;
        match self.service.close(self.ticket.id, &request).await {
            Ok(snapshot) => {
                self.view_model.finish_submit(None);
                self.apply_snapshot(&snapshot);
                self.reset_editor();
                Ok(snapshot)
            }
            Err(e) => {
                self.view_model.finish_submit(Some(e.toast_message()));
                Err(e.into())
            }
        }
    }

    /// Pause the ticket with a reason
    pub async fn raise_novelty(&mut self, reason_html: &str) -> Result<TicketSnapshot, ComposerError> {
        self.ensure_can_act()?;
        if !self.rendered_actions().contains(&Action::RaiseNovelty) {
            return Err(ComposerError::ActionUnavailable(Action::RaiseNovelty.to_string()));
        }
        if text::is_blank(reason_html) {
            return Err(ComposerError::EmptyComment);
        }

        self.view_model.begin_submit()?;
        match self.service.raise_novelty(self.ticket.id, reason_html.to_string()).await {
            Ok(snapshot) => {
                self.view_model.finish_submit(None);
                self.apply_snapshot(&snapshot);
                Ok(snapshot)
            }
            Err(e) => {
                self.view_model.finish_submit(Some(e.toast_message()));
                Err(e.into())
            }
        }
    }

    /// Reopen a paused ticket
    pub async fn resolve_novelty(&mut self, comment_html: &str) -> Result<TicketSnapshot, ComposerError> {
        self.ensure_can_act()?;
        self.ensure_primary(|a| a == Action::ResolveNovelty, "resolve novelty")?;
        if text::is_blank(comment_html) {
            return Err(ComposerError::EmptyComment);
        }

        self.view_model.begin_submit()?;
        match self.service.resolve_novelty(self.ticket.id, comment_html.to_string()).await {
            Ok(snapshot) => {
                self.view_model.finish_submit(None);
                self.apply_snapshot(&snapshot);
                self.mount().await;
                Ok(snapshot)
            }
            Err(e) => {
                self.view_model.finish_submit(Some(e.toast_message()));
                Err(e.into())
            }
        }
    }
}
