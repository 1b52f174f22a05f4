pub mod echo;

use crate::{Context, Data, Error};
use tracing::{error, warn};

/// Every slash command the bot registers.
pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![echo::echo()]
}

/// Command check: only user ids listed in `DEV_USER_IDS` pass.
pub async fn dev_only(ctx: Context<'_>) -> Result<bool, Error> {
    if ctx.data().config.is_dev(ctx.author().id.get()) {
        return Ok(true);
    }

    ctx.send(
        poise::CreateReply::default()
            .content("This command is only available to developers.")
            .ephemeral(true),
    )
    .await?;
    Ok(false)
}

/// Logs command failures and answers the user with a generic ephemeral reply.
pub async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("Command '{}' failed: {}", ctx.command().name, error);
            let reply = poise::CreateReply::default()
                .content("Something went wrong while running this command!")
                .ephemeral(true);
            if let Err(e) = ctx.send(reply).await {
                error!("Failed to send error reply: {}", e);
            }
        }
        // dev_only already answered the user.
        poise::FrameworkError::CommandCheckFailed { error: None, .. } => {}
        other => {
            warn!("Framework error: {}", other);
            if let Err(e) = poise::builtins::on_error(other).await {
                error!("Error while handling framework error: {}", e);
            }
        }
    }
}
