//! Selections gathered before committing a linear or decision transition.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::gateway::{DecisionOption, StepOption, TransitionQueryResult, UserCandidate};

/// Value a skipped role is submitted as
pub const SKIPPED_ROLE: i64 = -1;

/// What was chosen for one missing role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleSelection {
    User(u64),
    /// Explicitly left unassigned; only valid for roles that allow skipping
    Skip,
}

impl RoleSelection {
    pub const SKIP_SENTINEL: &'static str = "SKIP";

    pub fn encode(self) -> i64 {
        match self {
            RoleSelection::User(id) => id as i64,
            RoleSelection::Skip => SKIPPED_ROLE,
        }
    }
}

impl FromStr for RoleSelection {
    type Err = FormError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        if input.eq_ignore_ascii_case(Self::SKIP_SENTINEL) {
            return Ok(RoleSelection::Skip);
        }
        input
            .parse::<u64>()
            .map(RoleSelection::User)
            .map_err(|_| FormError::InvalidSelection(input.to_string()))
    }
}

/// Something still missing before the transition can be confirmed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Decision,
    Role { role_id: u64, role_name: String },
    Assignee,
    Supervisor,
    Verification,
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Decision => write!(f, "choose a decision"),
            Requirement::Role { role_id, role_name } => {
                write!(f, "assign someone to role '{role_name}' ({role_id})")
            }
            Requirement::Assignee => write!(f, "choose who receives the ticket"),
            Requirement::Supervisor => write!(f, "choose the approving supervisor"),
            Requirement::Verification => write!(f, "confirm you verified the work"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("Unknown decision '{0}'")]
    UnknownDecision(String),
    #[error("Choose a decision first")]
    NoDecisionSelected,
    #[error("User {user_id} is not a candidate for {slot}")]
    CandidateNotOffered { slot: String, user_id: u64 },
    #[error("Role {0} is not requested by this transition")]
    UnknownRole(u64),
    #[error("Role {0} cannot be skipped")]
    SkipNotAllowed(u64),
    #[error("This transition does not ask for {0}")]
    NotApplicable(&'static str),
    #[error("Cannot parse selection '{0}'")]
    InvalidSelection(String),
    #[error("Missing: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))]
    Incomplete(Vec<Requirement>),
}

/// The flat payload the form produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionSelection {
    pub transition_key: String,
    pub target_user_id: Option<u64>,
    pub manual_assignments: BTreeMap<u64, i64>,
    pub boss_id: Option<u64>,
}

#[derive(Debug, Clone)]
enum FormOptions {
    Linear(StepOption),
    Decision(Vec<DecisionOption>),
}

#[derive(Debug, Clone)]
pub struct DecisionForm {
    options: FormOptions,
    selected_decision: Option<usize>,
    target_user: Option<u64>,
    role_selections: BTreeMap<u64, RoleSelection>,
    supervisor: Option<u64>,
    verified: bool,
    viewer_is_assignee: bool,
}

fn offers(candidates: &[UserCandidate], user_id: u64) -> bool {
    candidates.iter().any(|c| c.id == user_id)
}

impl DecisionForm {
    /// Build the form for a next-step answer. Parallel-pending and final
    /// answers have nothing to fill in and yield `None`.
    pub fn new(result: &TransitionQueryResult, viewer_is_assignee: bool) -> Option<Self> {
        let options = match result {
            TransitionQueryResult::Linear(option) => FormOptions::Linear(option.clone()),
            TransitionQueryResult::Decision(decisions) => FormOptions::Decision(decisions.clone()),
            TransitionQueryResult::ParallelPending(_) | TransitionQueryResult::Final(_) => return None,
        };
        Some(Self {
            options,
            selected_decision: None,
            target_user: None,
            role_selections: BTreeMap::new(),
            supervisor: None,
            verified: false,
            viewer_is_assignee,
        })
    }

    pub fn is_decision(&self) -> bool {
        matches!(self.options, FormOptions::Decision(_))
    }

    pub fn decisions(&self) -> &[DecisionOption] {
        match &self.options {
            FormOptions::Decision(decisions) => decisions,
            FormOptions::Linear(_) => &[],
        }
    }

    pub fn selected_decision(&self) -> Option<&DecisionOption> {
        self.selected_decision.map(|index| &self.decisions()[index])
    }

    /// The option whose candidates and roles are currently shown
    pub fn active_option(&self) -> Option<&StepOption> {
        match &self.options {
            FormOptions::Linear(option) => Some(option),
            FormOptions::Decision(decisions) => self.selected_decision.map(|index| &decisions[index].step),
        }
    }

    /// Pick a decision. Any selection made under a previous decision is dropped.
    pub fn select_decision(&mut self, decision_id: &str) -> Result<(), FormError> {
        let index = self
            .decisions()
            .iter()
            .position(|d| d.decision_id == decision_id)
            .ok_or_else(|| FormError::UnknownDecision(decision_id.to_string()))?;

        if self.selected_decision != Some(index) {
            self.selected_decision = Some(index);
            self.target_user = None;
            self.role_selections.clear();
            self.supervisor = None;
        }
        Ok(())
    }

    /// One selector per missing role replaces the single assignee selector
    pub fn requires_assignee_selector(&self) -> bool {
        self.active_option()
            .is_some_and(|o| o.missing_roles.is_empty() && o.requires_manual_assignment)
    }

    pub fn requires_supervisor(&self) -> bool {
        self.active_option().is_some_and(|o| !o.boss_candidates.is_empty())
    }

    pub fn requires_verification(&self) -> bool {
        self.viewer_is_assignee
    }

    fn active_or_err(&self) -> Result<&StepOption, FormError> {
        self.active_option().ok_or(FormError::NoDecisionSelected)
    }

    pub fn select_target_user(&mut self, user_id: u64) -> Result<(), FormError> {
        if !self.requires_assignee_selector() {
            self.active_or_err()?;
            return Err(FormError::NotApplicable("a single assignee"));
        }
        let option = self.active_or_err()?;
        if !offers(&option.candidates, user_id) {
            return Err(FormError::CandidateNotOffered {
                slot: "assignee".to_string(),
                user_id,
            });
        }
        self.target_user = Some(user_id);
        Ok(())
    }

    pub fn assign_role(&mut self, role_id: u64, selection: RoleSelection) -> Result<(), FormError> {
        let option = self.active_or_err()?;
        let role = option
            .missing_roles
            .iter()
            .find(|r| r.role_id == role_id)
            .ok_or(FormError::UnknownRole(role_id))?;

        match selection {
            RoleSelection::Skip if !role.allow_skip => return Err(FormError::SkipNotAllowed(role_id)),
            RoleSelection::User(user_id) if !offers(&role.candidates, user_id) => {
                return Err(FormError::CandidateNotOffered {
                    slot: format!("role '{}'", role.role_name),
                    user_id,
                })
            }
            _ => {}
        }

        self.role_selections.insert(role_id, selection);
        Ok(())
    }

    pub fn select_supervisor(&mut self, user_id: u64) -> Result<(), FormError> {
        let option = self.active_or_err()?;
        if option.boss_candidates.is_empty() {
            return Err(FormError::NotApplicable("a supervisor"));
        }
        if !offers(&option.boss_candidates, user_id) {
            return Err(FormError::CandidateNotOffered {
                slot: "supervisor".to_string(),
                user_id,
            });
        }
        self.supervisor = Some(user_id);
        Ok(())
    }

    pub fn set_verified(&mut self, verified: bool) {
        self.verified = verified;
    }

    /// Everything still blocking "confirm", in display order
    pub fn missing_requirements(&self) -> Vec<Requirement> {
        let mut missing = Vec::new();

        match self.active_option() {
            None => missing.push(Requirement::Decision),
            Some(option) => {
                for role in &option.missing_roles {
                    // Skippable roles left untouched are submitted as skipped
                    if !self.role_selections.contains_key(&role.role_id) && !role.allow_skip {
                        missing.push(Requirement::Role {
                            role_id: role.role_id,
                            role_name: role.role_name.clone(),
                        });
                    }
                }
                if self.requires_assignee_selector() && self.target_user.is_none() {
                    missing.push(Requirement::Assignee);
                }
                if self.requires_supervisor() && self.supervisor.is_none() {
                    missing.push(Requirement::Supervisor);
                }
            }
        }

        if self.requires_verification() && !self.verified {
            missing.push(Requirement::Verification);
        }
        missing
    }

    pub fn can_confirm(&self) -> bool {
        self.missing_requirements().is_empty()
    }

    /// Map the selections to the submitted payload.
    ///
    /// Skippable roles left untouched are submitted as skipped.
    pub fn build_selection(&self) -> Result<TransitionSelection, FormError> {
        let missing = self.missing_requirements();
        if !missing.is_empty() {
            return Err(FormError::Incomplete(missing));
        }
        let option = self.active_or_err()?;

        let transition_key = match self.selected_decision() {
            Some(decision) => decision.decision_id.clone(),
            None => option.target_step_id.to_string(),
        };

        let manual_assignments = option
            .missing_roles
            .iter()
            .map(|role| {
                let selection = self
                    .role_selections
                    .get(&role.role_id)
                    .copied()
                    .unwrap_or(RoleSelection::Skip);
                (role.role_id, selection.encode())
            })
            .collect();

        Ok(TransitionSelection {
            transition_key,
            target_user_id: if self.requires_assignee_selector() {
                self.target_user
            } else {
                None
            },
            manual_assignments,
            boss_id: if self.requires_supervisor() { self.supervisor } else { None },
        })
    }
}
