use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;

use crate::cli::SignatureArgs;
use crate::config::DeskFlowConfig;
use crate::gateway::{Attachment, HttpGateway, Ticket, TransitionQueryResult};
use crate::workflow::{Notice, ResponseComposer, Signature, TransitionQueryService, Viewer};

pub mod advance;
pub mod close;
pub mod history;
pub mod next_step;
pub mod novelty;
pub mod parallel_tasks;
pub mod show;
pub mod sign;

/// Settings and identity shared by every command
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub config: DeskFlowConfig,
    pub viewer: Viewer,
}

impl CommandContext {
    pub fn new(config: DeskFlowConfig, as_user: Option<u64>) -> Self {
        let viewer = Viewer {
            user_id: as_user.unwrap_or(config.session.user_id),
            display_name: config.session.display_name.clone(),
        };
        Self { config, viewer }
    }

    pub fn service(&self) -> Result<TransitionQueryService> {
        let gateway = HttpGateway::new(&self.config.gateway)?;
        Ok(TransitionQueryService::new(Arc::new(gateway)))
    }

    pub async fn composer(&self, ticket_id: u64) -> Result<ResponseComposer> {
        if self.viewer.user_id == 0 {
            bail!("No user configured: set session.user_id in deskflow.toml or DESKFLOW_SESSION__USER_ID");
        }
        let service = self.service()?;
        with_progress(&format!("Loading ticket #{ticket_id}"), async {
            Ok(ResponseComposer::open(service, self.viewer.clone(), ticket_id).await?)
        })
        .await
    }
}

/// Print a progress line around an async step
pub async fn with_progress<Fut, R>(label: &str, fut: Fut) -> Result<R>
where
    Fut: std::future::Future<Output = Result<R>>,
{
    print!("🔄 {label}... ");
    std::io::Write::flush(&mut std::io::stdout())?;

    match fut.await {
        Ok(value) => {
            println!("✅");
            Ok(value)
        }
        Err(e) => {
            println!("❌");
            Err(e)
        }
    }
}

pub fn guess_content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "application/octet-stream",
    }
}

pub async fn read_attachment(path: &Path) -> Result<Attachment> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading attachment {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("attachment")
        .to_string();
    Ok(Attachment {
        file_name,
        content_type: guess_content_type(path).to_string(),
        bytes,
    })
}

/// Capture whichever signature source the user asked for
pub async fn apply_signature(composer: &mut ResponseComposer, args: &SignatureArgs) -> Result<()> {
    if let Some(path) = &args.signature_file {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading signature {}", path.display()))?;
        composer.capture_signature(Signature::from_image_bytes(&bytes, guess_content_type(path))?);
    } else if args.profile_signature && !composer.use_profile_signature().await? {
        bail!("No signature is stored on your profile; pass --signature-file instead");
    }
    Ok(())
}

pub fn print_ticket(ticket: &Ticket) {
    println!("🎫 Ticket #{}: {}", ticket.id, ticket.subject);
    println!("   📌 Status: {}", ticket.status);
    println!("   🏷️  Priority: {} ({})", ticket.priority, ticket.priority.value());
    match &ticket.current_step {
        Some(step) => {
            let mut flags = Vec::new();
            if step.is_final {
                flags.push("final");
            }
            if step.forced_close {
                flags.push("forced close");
            }
            if step.step_requires_signature {
                flags.push("signature required");
            }
            let flags = if flags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", flags.join(", "))
            };
            println!("   🪜 Step: {} ({:?}){}", step.name, step.kind, flags);
        }
        None => println!("   🪜 Step: none"),
    }
    if let Some(assignee) = ticket.assignee_id {
        println!("   👤 Assignee: {assignee}");
    }
    if !ticket.parallel_assignee_ids.is_empty() {
        let ids: Vec<String> = ticket.parallel_assignee_ids.iter().map(ToString::to_string).collect();
        println!("   👥 Parallel assignees: {}", ids.join(", "));
    }
}

pub fn print_options(result: &TransitionQueryResult) {
    match result {
        TransitionQueryResult::Linear(option) => {
            println!("➡️  Next step: {} (#{})", option.target_step_name, option.target_step_id);
            print_step_option(option);
        }
        TransitionQueryResult::Decision(decisions) => {
            println!("🔀 Choose a decision (--decision):");
            for decision in decisions {
                println!(
                    "   • {} → {} (#{})  [{}]",
                    decision.label, decision.step.target_step_name, decision.step.target_step_id, decision.decision_id
                );
                print_step_option(&decision.step);
            }
        }
        TransitionQueryResult::ParallelPending(info) => {
            println!("⏸️  {} ({}/{})", info.message, info.completed, info.total);
        }
        TransitionQueryResult::Final(info) => {
            println!("🏁 Final step '{}': only closing is available", info.step_name);
        }
    }
}

fn print_step_option(option: &crate::gateway::StepOption) {
    let names = |candidates: &[crate::gateway::UserCandidate]| {
        candidates
            .iter()
            .map(|c| format!("{} ({})", c.name, c.id))
            .collect::<Vec<_>>()
            .join(", ")
    };
    if option.missing_roles.is_empty() && option.requires_manual_assignment {
        println!("     👤 Assignee (--target-user): {}", names(&option.candidates));
    }
    for role in &option.missing_roles {
        let skip = if role.allow_skip { ", or SKIP" } else { "" };
        println!(
            "     🧩 Role {} '{}' (--assign {}=USER{skip}): {}",
            role.role_id,
            role.role_name,
            role.role_id,
            names(&role.candidates)
        );
    }
    if !option.boss_candidates.is_empty() {
        println!("     🧑‍💼 Supervisor (--supervisor): {}", names(&option.boss_candidates));
    }
}

pub fn print_notice(notice: Option<&Notice>) {
    match notice {
        Some(Notice::BlockingWarning(message)) => println!("⏸️  {message}"),
        Some(Notice::CloseOnly { step_name }) => {
            println!("🏁 Final step '{step_name}': only closing is available")
        }
        Some(Notice::Error(message)) => println!("❌ {message}"),
        None => {}
    }
}

pub fn show_usage() -> Result<()> {
    println!("🎫 DeskFlow - ticket workflow client");
    println!();
    println!("To get started:");
    println!("  🔎 deskflow show <ticket>          # Ticket, step and your actions");
    println!("  ➡️  deskflow next-step <ticket>     # What can happen next");
    println!("  🚀 deskflow advance <ticket> -m .. # Comment and advance");
    println!();
    println!("Other commands:");
    println!("  ✍️  deskflow sign <ticket> -m ..    # Sign your parallel part");
    println!("  ⏸️  deskflow novelty raise|resolve  # Pause or resume");
    println!("  🏁 deskflow close <ticket> -m ..   # Close on a final step");
    println!("  📜 deskflow history <ticket>       # Timeline");
    Ok(())
}
