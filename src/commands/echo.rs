use crate::commands::dev_only;
use crate::config::DISCORD_MESSAGE_LIMIT;
use crate::{Context, Error};
use tracing::info;

/// Post a message in this channel as the bot (developers only)
#[poise::command(slash_command, check = "dev_only")]
pub async fn echo(
    ctx: Context<'_>,
    #[description = "The message to post"]
    #[max_length = 2000]
    text: String,
) -> Result<(), Error> {
    if text.trim().is_empty() || text.chars().count() > DISCORD_MESSAGE_LIMIT {
        ctx.send(
            poise::CreateReply::default()
                .content("❌ The message must be between 1 and 2000 characters.")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    ctx.channel_id().say(ctx.http(), &text).await?;
    info!("Echo by {} in channel {}", ctx.author().name, ctx.channel_id());

    ctx.send(
        poise::CreateReply::default()
            .content("Message sent!")
            .ephemeral(true),
    )
    .await?;
    Ok(())
}
