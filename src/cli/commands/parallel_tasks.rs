use anyhow::Result;

use super::{with_progress, CommandContext};
use crate::gateway::ParallelTaskState;

pub struct ParallelTasksCommand {
    pub ticket_id: u64,
}

impl ParallelTasksCommand {
    pub fn new(ticket_id: u64) -> Self {
        Self { ticket_id }
    }

    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let service = ctx.service()?;
        let tasks = with_progress(&format!("Loading parallel tasks for #{}", self.ticket_id), async {
            Ok(service.parallel_tasks(self.ticket_id).await?)
        })
        .await?;

        println!();
        if tasks.is_empty() {
            println!("📋 No parallel tasks on this ticket");
            return Ok(());
        }

        let done = tasks
            .iter()
            .filter(|t| t.state != ParallelTaskState::Pending)
            .count();
        println!("👥 PARALLEL TASKS ({done}/{} done):", tasks.len());
        for task in &tasks {
            let marker = match task.state {
                ParallelTaskState::Pending => "⏳",
                ParallelTaskState::Completed => "✅",
                ParallelTaskState::Approved => "🟢",
            };
            let me = if task.user_id == ctx.viewer.user_id { " (you)" } else { "" };
            println!("   {marker} {} ({}){me}: {:?}", task.user_name, task.user_id, task.state);
        }
        Ok(())
    }
}
