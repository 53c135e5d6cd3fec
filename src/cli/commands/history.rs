use anyhow::Result;

use super::{with_progress, CommandContext};
use crate::workflow::text::clean_comment;

pub struct HistoryCommand {
    pub ticket_id: u64,
}

impl HistoryCommand {
    pub fn new(ticket_id: u64) -> Self {
        Self { ticket_id }
    }

    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let service = ctx.service()?;
        let snapshot = with_progress(&format!("Loading timeline for #{}", self.ticket_id), async {
            Ok(service.load(self.ticket_id).await?)
        })
        .await?;

        println!();
        if snapshot.history.is_empty() {
            println!("📜 No timeline entries yet");
            return Ok(());
        }

        println!("📜 TIMELINE ({} entries):", snapshot.history.len());
        for entry in &snapshot.history {
            let author = entry
                .author_id
                .map(|id| format!("user {id}"))
                .unwrap_or_else(|| "system".to_string());
            println!(
                "   {} • {} by {}",
                entry.created_at.format("%Y-%m-%d %H:%M"),
                entry.action,
                author
            );
            if let Some(comment) = entry.comment.as_deref().map(clean_comment).filter(|c| !c.is_empty()) {
                println!("     💬 {comment}");
            }
        }
        Ok(())
    }
}
