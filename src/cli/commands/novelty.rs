use anyhow::{anyhow, Result};

use super::{print_ticket, CommandContext};

pub enum NoveltyCommand {
    Raise { ticket_id: u64, reason: String },
    Resolve { ticket_id: u64, comment: String },
}

impl NoveltyCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let snapshot = match self {
            NoveltyCommand::Raise { ticket_id, reason } => {
                let mut composer = ctx.composer(*ticket_id).await?;
                let snapshot = composer
                    .raise_novelty(reason)
                    .await
                    .map_err(|e| anyhow!(e.toast_message()))?;
                println!("⏸️  Novelty raised; the ticket is paused");
                snapshot
            }
            NoveltyCommand::Resolve { ticket_id, comment } => {
                let mut composer = ctx.composer(*ticket_id).await?;
                let snapshot = composer
                    .resolve_novelty(comment)
                    .await
                    .map_err(|e| anyhow!(e.toast_message()))?;
                println!("▶️  Novelty resolved; the ticket is open again");
                snapshot
            }
        };
        println!();
        print_ticket(&snapshot.ticket);
        Ok(())
    }
}
