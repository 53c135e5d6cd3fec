use anyhow::Result;
use clap::Parser;

use deskflow::cli::commands::advance::{AdvanceCommand, AdvanceSelections};
use deskflow::cli::commands::close::CloseCommand;
use deskflow::cli::commands::history::HistoryCommand;
use deskflow::cli::commands::next_step::NextStepCommand;
use deskflow::cli::commands::novelty::NoveltyCommand;
use deskflow::cli::commands::parallel_tasks::ParallelTasksCommand;
use deskflow::cli::commands::show::ShowCommand;
use deskflow::cli::commands::sign::SignCommand;
use deskflow::cli::commands::{show_usage, CommandContext};
use deskflow::cli::{Cli, Commands, NoveltyAction};
use deskflow::{gateway_metrics, init_telemetry, DeskFlowConfig};

fn main() -> Result<()> {
    let cli = Cli::parse();

    DeskFlowConfig::load_env_file()?;
    let config = DeskFlowConfig::load()?;
    init_telemetry(&config.observability)?;

    let ctx = CommandContext::new(config, cli.as_user);

    let result = tokio::runtime::Runtime::new()?.block_on(async {
        match cli.command {
            // No subcommand: explain what the tool does
            None => show_usage(),
            Some(Commands::Show { ticket_id }) => ShowCommand::new(ticket_id).execute(&ctx).await,
            Some(Commands::NextStep { ticket_id }) => NextStepCommand::new(ticket_id).execute(&ctx).await,
            Some(Commands::Advance {
                ticket_id,
                comment,
                decision,
                target_user,
                assignments,
                supervisor,
                verified,
                fields,
                signature,
                attachments,
            }) => {
                AdvanceCommand::new(ticket_id, comment)
                    .with_selections(AdvanceSelections {
                        decision,
                        target_user,
                        assignments,
                        supervisor,
                        verified,
                    })
                    .with_fields(fields)
                    .with_signature(signature)
                    .with_attachments(attachments)
                    .execute(&ctx)
                    .await
            }
            Some(Commands::Sign {
                ticket_id,
                comment,
                signature,
            }) => SignCommand::new(ticket_id, comment, signature).execute(&ctx).await,
            Some(Commands::ParallelTasks { ticket_id }) => {
                ParallelTasksCommand::new(ticket_id).execute(&ctx).await
            }
            Some(Commands::Novelty { action }) => {
                let command = match action {
                    NoveltyAction::Raise { ticket_id, reason } => NoveltyCommand::Raise { ticket_id, reason },
                    NoveltyAction::Resolve { ticket_id, comment } => {
                        NoveltyCommand::Resolve { ticket_id, comment }
                    }
                };
                command.execute(&ctx).await
            }
            Some(Commands::Close {
                ticket_id,
                comment,
                signature,
            }) => CloseCommand::new(ticket_id, comment, signature).execute(&ctx).await,
            Some(Commands::History { ticket_id }) => HistoryCommand::new(ticket_id).execute(&ctx).await,
        }
    });

    gateway_metrics().log_stats();
    result
}
