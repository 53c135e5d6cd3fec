// Wire types for the DeskFlow ticket/workflow REST API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::priority::Priority;
use crate::workflow::template_fields::TemplateField;

/// Ticket lifecycle status. The backend vocabulary is exactly these three words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TicketStatus {
    #[serde(rename = "Abierto")]
    Open,
    #[serde(rename = "Pausado")]
    Paused,
    #[serde(rename = "Cerrado")]
    Closed,
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TicketStatus::Open => "Abierto",
            TicketStatus::Paused => "Pausado",
            TicketStatus::Closed => "Cerrado",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Linear,
    Decision,
    Parallel,
}

/// The workflow step a ticket currently sits on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRef {
    pub id: u64,
    pub name: String,
    pub kind: StepKind,
    #[serde(default)]
    pub is_final: bool,
    /// The step only allows a mandatory close
    #[serde(default)]
    pub forced_close: bool,
    #[serde(default)]
    pub step_requires_signature: bool,
    /// Boilerplate the editor is pre-filled with for this step
    #[serde(default)]
    pub template_description: Option<String>,
    #[serde(default)]
    pub template_fields: Vec<TemplateField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: u64,
    pub subject: String,
    #[serde(default)]
    pub description: String,
    pub status: TicketStatus,
    pub priority: Priority,
    #[serde(default)]
    pub current_step: Option<StepRef>,
    #[serde(default)]
    pub assignee_id: Option<u64>,
    #[serde(default)]
    pub parallel_assignee_ids: Vec<u64>,
    pub creator_id: u64,
}

impl Ticket {
    pub fn is_paused(&self) -> bool {
        self.status == TicketStatus::Paused
    }

    pub fn is_closed(&self) -> bool {
        self.status == TicketStatus::Closed
    }

    pub fn is_parallel_step(&self) -> bool {
        self.current_step
            .as_ref()
            .is_some_and(|step| step.kind == StepKind::Parallel)
    }

    pub fn is_final_step(&self) -> bool {
        self.current_step.as_ref().is_some_and(|step| step.is_final)
    }

    pub fn is_forced_close_step(&self) -> bool {
        self.current_step.as_ref().is_some_and(|step| step.forced_close)
    }

    pub fn step_requires_signature(&self) -> bool {
        self.current_step
            .as_ref()
            .is_some_and(|step| step.step_requires_signature)
    }

    pub fn template_description(&self) -> Option<&str> {
        self.current_step
            .as_ref()
            .and_then(|step| step.template_description.as_deref())
    }

    pub fn template_fields(&self) -> &[TemplateField] {
        self.current_step
            .as_ref()
            .map(|step| step.template_fields.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCandidate {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

/// A step-required approver role for which no user could be resolved automatically
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingRole {
    pub role_id: u64,
    #[serde(default)]
    pub role_name: String,
    #[serde(default)]
    pub candidates: Vec<UserCandidate>,
    #[serde(default)]
    pub allow_skip: bool,
}

/// Everything the server says about moving into one target step
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOption {
    pub target_step_id: u64,
    #[serde(default)]
    pub target_step_name: String,
    #[serde(default)]
    pub requires_manual_assignment: bool,
    #[serde(default)]
    pub candidates: Vec<UserCandidate>,
    #[serde(default)]
    pub missing_roles: Vec<MissingRole>,
    #[serde(default)]
    pub boss_candidates: Vec<UserCandidate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionOption {
    pub decision_id: String,
    #[serde(default)]
    pub label: String,
    #[serde(flatten)]
    pub step: StepOption,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParallelPendingInfo {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub completed: u32,
    #[serde(default)]
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalStepInfo {
    #[serde(default)]
    pub step_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionType {
    Linear,
    Decision,
    ParallelPending,
    Final,
}

impl fmt::Display for TransitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransitionType::Linear => "linear",
            TransitionType::Decision => "decision",
            TransitionType::ParallelPending => "parallel_pending",
            TransitionType::Final => "final",
        };
        write!(f, "{label}")
    }
}

/// `checkNextStep` response as it appears on the wire: a discriminant plus
/// one payload field per variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransitionQuery {
    pub transition_type: TransitionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linear: Option<StepOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decisions: Option<Vec<DecisionOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_pending: Option<ParallelPendingInfo>,
    #[serde(rename = "final", default, skip_serializing_if = "Option::is_none")]
    pub final_step: Option<FinalStepInfo>,
}

/// What the server says can happen next for a ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTransitionQuery", into = "RawTransitionQuery")]
pub enum TransitionQueryResult {
    Linear(StepOption),
    Decision(Vec<DecisionOption>),
    ParallelPending(ParallelPendingInfo),
    Final(FinalStepInfo),
}

impl TransitionQueryResult {
    pub fn transition_type(&self) -> TransitionType {
        match self {
            TransitionQueryResult::Linear(_) => TransitionType::Linear,
            TransitionQueryResult::Decision(_) => TransitionType::Decision,
            TransitionQueryResult::ParallelPending(_) => TransitionType::ParallelPending,
            TransitionQueryResult::Final(_) => TransitionType::Final,
        }
    }
}

impl TryFrom<RawTransitionQuery> for TransitionQueryResult {
    type Error = String;

    fn try_from(raw: RawTransitionQuery) -> Result<Self, Self::Error> {
        let populated = [
            raw.linear.is_some(),
            raw.decisions.is_some(),
            raw.parallel_pending.is_some(),
            raw.final_step.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count();

        if populated > 1 {
            return Err(format!(
                "transitionType '{}' response carries {populated} payload fields, expected exactly one",
                raw.transition_type
            ));
        }

        let missing = || format!("transitionType '{}' response is missing its payload", raw.transition_type);
        match raw.transition_type {
            TransitionType::Linear => raw.linear.map(Self::Linear).ok_or_else(missing),
            TransitionType::Decision => match raw.decisions {
                Some(decisions) if !decisions.is_empty() => Ok(Self::Decision(decisions)),
                Some(_) => Err("decision response offers no decision options".to_string()),
                None => Err(missing()),
            },
            TransitionType::ParallelPending => raw
                .parallel_pending
                .map(Self::ParallelPending)
                .ok_or_else(missing),
            TransitionType::Final => raw.final_step.map(Self::Final).ok_or_else(missing),
        }
    }
}

impl From<TransitionQueryResult> for RawTransitionQuery {
    fn from(result: TransitionQueryResult) -> Self {
        let mut raw = RawTransitionQuery {
            transition_type: result.transition_type(),
            linear: None,
            decisions: None,
            parallel_pending: None,
            final_step: None,
        };
        match result {
            TransitionQueryResult::Linear(option) => raw.linear = Some(option),
            TransitionQueryResult::Decision(options) => raw.decisions = Some(options),
            TransitionQueryResult::ParallelPending(info) => raw.parallel_pending = Some(info),
            TransitionQueryResult::Final(info) => raw.final_step = Some(info),
        }
        raw
    }
}

/// One filled-in dynamic template field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateValue {
    pub field_id: u64,
    pub value: String,
}

/// Body of `POST /workflows/transition`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    pub ticket_id: u64,
    /// Decision key, or the stringified target step id for linear moves
    pub transition_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_user_id: Option<u64>,
    /// Role id to user id; `-1` marks a role that was explicitly skipped
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub manual_assignments: BTreeMap<u64, i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub template_values: Vec<TemplateValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(
        rename = "usuarioJefeAprobadorId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub boss_id: Option<u64>,
    pub comment: String,
}

/// A file attached to a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParallelTaskState {
    #[serde(rename = "Pendiente")]
    Pending,
    #[serde(rename = "Completado")]
    Completed,
    #[serde(rename = "Aprobado")]
    Approved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParallelTask {
    pub id: u64,
    pub ticket_id: u64,
    pub step_id: u64,
    pub user_id: u64,
    #[serde(default)]
    pub user_name: String,
    pub state: ParallelTaskState,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignParallelTaskRequest {
    pub ticket_id: u64,
    pub comment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignParallelTaskResponse {
    /// Every participant has signed and the server advanced the ticket
    pub auto_advanced: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoveltyRequest {
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveNoveltyRequest {
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseTicketRequest {
    pub comment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// One row of a ticket's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub id: u64,
    pub ticket_id: u64,
    pub action: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub author_id: Option<u64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSignature {
    #[serde(default)]
    pub signature: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ticket_json(status: &str) -> serde_json::Value {
        json!({
            "id": 42,
            "subject": "Printer on fire",
            "status": status,
            "priority": "Alta",
            "currentStep": {
                "id": 3,
                "name": "Revisión",
                "kind": "parallel",
                "stepRequiresSignature": true
            },
            "parallelAssigneeIds": [5, 6],
            "creatorId": 1
        })
    }

    #[test]
    fn test_ticket_decodes_backend_vocabulary() {
        let ticket: Ticket = serde_json::from_value(ticket_json("Pausado")).unwrap();
        assert_eq!(ticket.status, TicketStatus::Paused);
        assert_eq!(ticket.priority, Priority::High);
        assert!(ticket.is_paused());
        assert!(ticket.is_parallel_step());
        assert!(ticket.step_requires_signature());
        assert!(!ticket.is_final_step());
        assert_eq!(ticket.assignee_id, None);
        assert_eq!(ticket.parallel_assignee_ids, vec![5, 6]);
    }

    #[test]
    fn test_ticket_rejects_legacy_status() {
        let result = serde_json::from_value::<Ticket>(ticket_json("In Progress"));
        assert!(result.is_err());
    }

    #[test]
    fn test_decision_query_decodes() {
        let body = json!({
            "transitionType": "decision",
            "decisions": [
                {
                    "decisionId": "route_b",
                    "label": "Escalate",
                    "targetStepId": 9,
                    "targetStepName": "Gerencia",
                    "bossCandidates": [{"id": 7}]
                }
            ]
        });

        let result: TransitionQueryResult = serde_json::from_value(body).unwrap();
        match result {
            TransitionQueryResult::Decision(options) => {
                assert_eq!(options.len(), 1);
                assert_eq!(options[0].decision_id, "route_b");
                assert_eq!(options[0].step.target_step_id, 9);
                assert_eq!(options[0].step.boss_candidates[0].id, 7);
                assert!(options[0].step.missing_roles.is_empty());
            }
            other => panic!("expected decision, got {other:?}"),
        }
    }

    #[test]
    fn test_query_with_mismatched_payload_is_rejected() {
        let body = json!({
            "transitionType": "linear",
            "final": {"stepName": "Cierre"}
        });
        let err = serde_json::from_value::<TransitionQueryResult>(body).unwrap_err();
        assert!(err.to_string().contains("missing its payload"));
    }

    #[test]
    fn test_query_with_two_payloads_is_rejected() {
        let raw = RawTransitionQuery {
            transition_type: TransitionType::Linear,
            linear: Some(StepOption::default()),
            decisions: None,
            parallel_pending: Some(ParallelPendingInfo::default()),
            final_step: None,
        };
        let err = TransitionQueryResult::try_from(raw).unwrap_err();
        assert!(err.contains("expected exactly one"));
    }

    #[test]
    fn test_transition_request_wire_shape() {
        let mut manual_assignments = BTreeMap::new();
        manual_assignments.insert(3, -1);
        manual_assignments.insert(4, 12);

        let request = TransitionRequest {
            ticket_id: 42,
            transition_key: "route_b".to_string(),
            target_user_id: None,
            manual_assignments,
            template_values: vec![],
            signature: None,
            boss_id: Some(7),
            comment: "<p>ok</p>".to_string(),
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["usuarioJefeAprobadorId"], json!(7));
        assert_eq!(value["manualAssignments"]["3"], json!(-1));
        assert_eq!(value["manualAssignments"]["4"], json!(12));
        assert!(value.get("targetUserId").is_none());
        assert!(value.get("templateValues").is_none());
    }

    #[test]
    fn test_parallel_task_state_vocabulary() {
        let task: ParallelTask = serde_json::from_value(json!({
            "id": 1,
            "ticketId": 42,
            "stepId": 3,
            "userId": 5,
            "state": "Aprobado"
        }))
        .unwrap();
        assert_eq!(task.state, ParallelTaskState::Approved);
    }
}
