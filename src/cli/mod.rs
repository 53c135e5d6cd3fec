use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::workflow::RoleSelection;

pub mod commands;

#[derive(Parser)]
#[command(name = "deskflow")]
#[command(about = "Move DeskFlow tickets through their workflow from the terminal")]
#[command(long_about = "DeskFlow asks the backend what can happen next for a ticket, collects the \
                       selections the step needs, and commits the transition. Start with \
                       'deskflow show <ticket>' to see the actions available to you.")]
pub struct Cli {
    /// Act as another user id instead of session.user_id
    #[arg(long, global = true, help = "Override the configured session user id")]
    pub as_user: Option<u64>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SignatureArgs {
    /// Signature image to attach (png, jpg)
    #[arg(long, help = "Path to a signature image")]
    pub signature_file: Option<PathBuf>,
    /// Use the signature stored on your profile
    #[arg(long, conflicts_with = "signature_file", help = "Sign with your stored profile signature")]
    pub profile_signature: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show a ticket, its current step and the actions available to you
    Show { ticket_id: u64 },
    /// Ask the backend what can happen next for a ticket
    NextStep { ticket_id: u64 },
    /// Comment on a ticket and move it to its next step
    Advance {
        ticket_id: u64,
        /// Comment (HTML allowed)
        #[arg(long, short = 'm')]
        comment: String,
        /// Decision to take on decision steps
        #[arg(long, help = "Decision id, required on decision steps")]
        decision: Option<String>,
        /// Receiver when the step asks for a single assignee
        #[arg(long)]
        target_user: Option<u64>,
        /// Role assignment as ROLE=USER, or ROLE=SKIP for skippable roles
        #[arg(long = "assign", value_parser = parse_role_assignment)]
        assignments: Vec<(u64, RoleSelection)>,
        /// Approving supervisor
        #[arg(long)]
        supervisor: Option<u64>,
        /// Confirm you verified the work (required when you are the assignee)
        #[arg(long)]
        verified: bool,
        /// Template field value as FIELD=VALUE
        #[arg(long = "field", value_parser = parse_field_value)]
        fields: Vec<(u64, String)>,
        #[command(flatten)]
        signature: SignatureArgs,
        /// File to attach; repeatable
        #[arg(long = "attach")]
        attachments: Vec<PathBuf>,
    },
    /// Sign your part of a parallel step
    Sign {
        ticket_id: u64,
        #[arg(long, short = 'm')]
        comment: String,
        #[command(flatten)]
        signature: SignatureArgs,
    },
    /// List the parallel tasks on a ticket's current step
    ParallelTasks { ticket_id: u64 },
    /// Pause a ticket with a novelty, or resume it
    Novelty {
        #[command(subcommand)]
        action: NoveltyAction,
    },
    /// Close a ticket sitting on a final or forced-close step
    Close {
        ticket_id: u64,
        #[arg(long, short = 'm')]
        comment: String,
        #[command(flatten)]
        signature: SignatureArgs,
    },
    /// Print a ticket's timeline
    History { ticket_id: u64 },
}

#[derive(Subcommand)]
pub enum NoveltyAction {
    /// Pause the ticket
    Raise {
        ticket_id: u64,
        #[arg(long)]
        reason: String,
    },
    /// Resume a paused ticket
    Resolve {
        ticket_id: u64,
        #[arg(long, short = 'm')]
        comment: String,
    },
}

pub fn parse_role_assignment(input: &str) -> Result<(u64, RoleSelection), String> {
    let (role, user) = input
        .split_once('=')
        .ok_or_else(|| format!("expected ROLE=USER or ROLE=SKIP, got '{input}'"))?;
    let role_id = role
        .trim()
        .parse::<u64>()
        .map_err(|_| format!("role id '{role}' is not a number"))?;
    let selection = user.parse::<RoleSelection>().map_err(|e| e.to_string())?;
    Ok((role_id, selection))
}

pub fn parse_field_value(input: &str) -> Result<(u64, String), String> {
    let (field, value) = input
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{input}'"))?;
    let field_id = field
        .trim()
        .parse::<u64>()
        .map_err(|_| format!("field id '{field}' is not a number"))?;
    Ok((field_id, value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_assignment_parsing() {
        assert_eq!(parse_role_assignment("10=21"), Ok((10, RoleSelection::User(21))));
        assert_eq!(parse_role_assignment("11=SKIP"), Ok((11, RoleSelection::Skip)));
        assert!(parse_role_assignment("11").is_err());
        assert!(parse_role_assignment("x=1").is_err());
    }

    #[test]
    fn test_field_value_keeps_everything_after_first_equals() {
        assert_eq!(parse_field_value("3=a=b"), Ok((3, "a=b".to_string())));
    }

    #[test]
    fn test_advance_arguments() {
        let cli = Cli::try_parse_from([
            "deskflow",
            "advance",
            "42",
            "-m",
            "<p>Listo</p>",
            "--decision",
            "route_b",
            "--assign",
            "10=SKIP",
            "--assign",
            "11=7",
            "--supervisor",
            "7",
            "--profile-signature",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Advance {
                ticket_id,
                decision,
                assignments,
                supervisor,
                signature,
                ..
            }) => {
                assert_eq!(ticket_id, 42);
                assert_eq!(decision.as_deref(), Some("route_b"));
                assert_eq!(assignments, vec![(10, RoleSelection::Skip), (11, RoleSelection::User(7))]);
                assert_eq!(supervisor, Some(7));
                assert!(signature.profile_signature);
            }
            _ => panic!("expected advance"),
        }
    }

    #[test]
    fn test_signature_sources_conflict() {
        let result = Cli::try_parse_from([
            "deskflow",
            "sign",
            "42",
            "-m",
            "ok",
            "--signature-file",
            "firma.png",
            "--profile-signature",
        ]);
        assert!(result.is_err());
    }
}
