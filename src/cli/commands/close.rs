use anyhow::{anyhow, bail, Result};

use super::{apply_signature, print_ticket, CommandContext};
use crate::cli::SignatureArgs;
use crate::workflow::ComposerError;

pub struct CloseCommand {
    pub ticket_id: u64,
    pub comment: String,
    pub signature: SignatureArgs,
}

impl CloseCommand {
    pub fn new(ticket_id: u64, comment: String, signature: SignatureArgs) -> Self {
        Self {
            ticket_id,
            comment,
            signature,
        }
    }

    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let mut composer = ctx.composer(self.ticket_id).await?;
        apply_signature(&mut composer, &self.signature).await?;

        composer
            .open_close_dialog()
            .map_err(|e| anyhow!(e.toast_message()))?;
        let snapshot = match composer.confirm_close(&self.comment).await {
            Ok(snapshot) => snapshot,
            Err(ComposerError::SignatureRequired) => {
                bail!("Closing this step requires a signature: pass --signature-file or --profile-signature")
            }
            Err(e) => return Err(anyhow!(e.toast_message())),
        };

        println!("🏁 Ticket closed");
        println!();
        print_ticket(&snapshot.ticket);
        Ok(())
    }
}
