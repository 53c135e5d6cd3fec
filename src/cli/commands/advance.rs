use anyhow::{anyhow, bail, Result};
use std::path::PathBuf;

use super::{apply_signature, print_options, print_ticket, read_attachment, CommandContext};
use crate::cli::SignatureArgs;
use crate::workflow::{ComposerError, DecisionForm, RoleSelection, SubmitOutcome};

/// Selections given on the command line for the transition modal
#[derive(Debug, Clone, Default)]
pub struct AdvanceSelections {
    pub decision: Option<String>,
    pub target_user: Option<u64>,
    pub assignments: Vec<(u64, RoleSelection)>,
    pub supervisor: Option<u64>,
    pub verified: bool,
}

impl AdvanceSelections {
    /// Fill the form in the order a person would: decision first
    pub fn fill(&self, form: &mut DecisionForm) -> Result<()> {
        if let Some(decision) = &self.decision {
            form.select_decision(decision)?;
        }
        if let Some(user) = self.target_user {
            form.select_target_user(user)?;
        }
        for (role_id, selection) in &self.assignments {
            form.assign_role(*role_id, *selection)?;
        }
        if let Some(supervisor) = self.supervisor {
            form.select_supervisor(supervisor)?;
        }
        form.set_verified(self.verified);
        Ok(())
    }
}

pub struct AdvanceCommand {
    pub ticket_id: u64,
    pub comment: String,
    pub selections: AdvanceSelections,
    pub fields: Vec<(u64, String)>,
    pub signature: SignatureArgs,
    pub attachments: Vec<PathBuf>,
}

impl AdvanceCommand {
    pub fn new(ticket_id: u64, comment: String) -> Self {
        Self {
            ticket_id,
            comment,
            selections: AdvanceSelections::default(),
            fields: Vec::new(),
            signature: SignatureArgs::default(),
            attachments: Vec::new(),
        }
    }

    pub fn with_selections(mut self, selections: AdvanceSelections) -> Self {
        self.selections = selections;
        self
    }

    pub fn with_fields(mut self, fields: Vec<(u64, String)>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_signature(mut self, signature: SignatureArgs) -> Self {
        self.signature = signature;
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<PathBuf>) -> Self {
        self.attachments = attachments;
        self
    }

    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let mut composer = ctx.composer(self.ticket_id).await?;

        composer.set_comment(self.comment.clone());
        for (field_id, value) in &self.fields {
            composer.set_template_value(*field_id, value.clone())?;
        }
        apply_signature(&mut composer, &self.signature).await?;
        for path in &self.attachments {
            composer.attach(read_attachment(path).await?);
        }

        let mut form = match composer.submit_and_advance().await {
            Ok(SubmitOutcome::DecisionRequired(form)) => form,
            Ok(SubmitOutcome::Blocked(message)) => {
                println!("⏸️  {message}");
                return Ok(());
            }
            Ok(SubmitOutcome::CloseDialogOpened) => {
                println!("🏁 Ticket #{} is on its final step", self.ticket_id);
                println!("💡 Close it with: deskflow close {} -m \"...\"", self.ticket_id);
                return Ok(());
            }
            Ok(SubmitOutcome::Failed(message)) => bail!(message),
            Err(ComposerError::SignatureRequired) => {
                bail!("This step requires a signature: pass --signature-file or --profile-signature")
            }
            Err(e) => return Err(anyhow!(e.toast_message())),
        };

        self.selections.fill(&mut form)?;
        if !form.can_confirm() {
            println!("📝 The transition needs more input:");
            for requirement in form.missing_requirements() {
                println!("   • {requirement}");
            }
            if let Some(options) = composer.view_model().options() {
                println!();
                print_options(options);
            }
            composer.cancel_transition();
            bail!("transition not confirmed");
        }

        let snapshot = composer
            .confirm_transition(&form)
            .await
            .map_err(|e| anyhow!(e.toast_message()))?;

        println!("✅ Ticket advanced");
        println!();
        print_ticket(&snapshot.ticket);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::mocks::candidate;
    use crate::gateway::{DecisionOption, StepOption, TransitionQueryResult};

    #[test]
    fn test_fill_applies_decision_before_its_selections() {
        let result = TransitionQueryResult::Decision(vec![DecisionOption {
            decision_id: "route_b".to_string(),
            label: "Ruta B".to_string(),
            step: StepOption {
                target_step_id: 9,
                boss_candidates: vec![candidate(7)],
                ..Default::default()
            },
        }]);
        let mut form = DecisionForm::new(&result, true).unwrap();
        let selections = AdvanceSelections {
            decision: Some("route_b".to_string()),
            supervisor: Some(7),
            verified: true,
            ..Default::default()
        };

        selections.fill(&mut form).unwrap();
        assert!(form.can_confirm());
    }

    #[test]
    fn test_fill_reports_candidates_not_offered() {
        let result = TransitionQueryResult::Linear(StepOption {
            target_step_id: 3,
            requires_manual_assignment: true,
            candidates: vec![candidate(30)],
            ..Default::default()
        });
        let mut form = DecisionForm::new(&result, false).unwrap();
        let selections = AdvanceSelections {
            target_user: Some(99),
            ..Default::default()
        };
        assert!(selections.fill(&mut form).is_err());
    }
}
