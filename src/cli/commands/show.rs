use anyhow::Result;

use super::{print_notice, print_options, print_ticket, CommandContext};
use crate::gateway::TransitionQueryResult;
use crate::workflow::Access;

pub struct ShowCommand {
    pub ticket_id: u64,
}

impl ShowCommand {
    pub fn new(ticket_id: u64) -> Self {
        Self { ticket_id }
    }

    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let composer = ctx.composer(self.ticket_id).await?;
        println!();
        print_ticket(composer.ticket());
        println!();

        match composer.access() {
            Access::ReadOnly => {
                println!("👁️  Read-only: you are not the assignee, a parallel assignee or the creator");
                return Ok(());
            }
            access => println!("🔑 Access: {access:?}"),
        }

        let actions = composer.rendered_actions();
        if actions.is_empty() {
            println!("📭 No actions available");
        } else {
            println!("🎯 AVAILABLE ACTIONS:");
            for action in actions {
                match action {
                    crate::workflow::Action::SignParallelPart { enabled: false } => {
                        println!("   • {action} (disabled: your part is not pending)")
                    }
                    _ => println!("   • {action}"),
                }
            }
        }

        // Blocked and final answers come through the notice below
        if let Some(next @ (TransitionQueryResult::Linear(_) | TransitionQueryResult::Decision(_))) =
            composer.next_step()
        {
            println!();
            print_options(next);
        }
        print_notice(composer.notice());
        Ok(())
    }
}
