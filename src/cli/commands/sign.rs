use anyhow::{anyhow, bail, Result};

use super::{apply_signature, print_ticket, CommandContext};
use crate::cli::SignatureArgs;
use crate::workflow::ComposerError;

pub struct SignCommand {
    pub ticket_id: u64,
    pub comment: String,
    pub signature: SignatureArgs,
}

impl SignCommand {
    pub fn new(ticket_id: u64, comment: String, signature: SignatureArgs) -> Self {
        Self {
            ticket_id,
            comment,
            signature,
        }
    }

    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let mut composer = ctx.composer(self.ticket_id).await?;
        composer.set_comment(self.comment.clone());
        apply_signature(&mut composer, &self.signature).await?;

        let response = match composer.sign_parallel_part().await {
            Ok(response) => response,
            Err(ComposerError::SignatureRequired) => {
                bail!("This step requires a signature: pass --signature-file or --profile-signature")
            }
            Err(e) => return Err(anyhow!(e.toast_message())),
        };

        println!("✍️  {}", response.message);
        if response.auto_advanced {
            println!("🚀 All parts signed; the ticket moved on");
        }
        println!();
        print_ticket(composer.ticket());
        Ok(())
    }
}
