use anyhow::Result;

use super::{print_options, with_progress, CommandContext};
use crate::workflow::TransitionQueryService;

pub struct NextStepCommand {
    pub ticket_id: u64,
}

impl NextStepCommand {
    pub fn new(ticket_id: u64) -> Self {
        Self { ticket_id }
    }

    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let service = ctx.service()?;
        let ticket = with_progress(&format!("Loading ticket #{}", self.ticket_id), async {
            Ok(service.load(self.ticket_id).await?.ticket)
        })
        .await?;

        if !TransitionQueryService::should_check_next_step(&ticket) {
            println!(
                "⏭️  Ticket #{} is {} on step {}; there is no next step to query",
                ticket.id,
                ticket.status,
                ticket.current_step.as_ref().map(|s| s.name.as_str()).unwrap_or("-")
            );
            return Ok(());
        }

        let result = service.check_next_step(self.ticket_id).await?;
        println!();
        print_options(&result);
        Ok(())
    }
}
