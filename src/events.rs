use crate::greetings::{self, Greeting};
use crate::{Data, Error};
use poise::serenity_prelude as serenity;
use tracing::{debug, error, info};

/// Gateway events the bot cares about beyond slash commands.
pub async fn handle_event(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::GuildCreate { guild, .. } => {
            let (id, name) = (guild.id.to_string(), guild.name.clone());
            if let Err(e) = data.db.run_blocking(move |db| db.upsert_guild(&id, &name)).await {
                error!("Failed to record guild {}: {}", guild.id, e);
            }
        }
        serenity::FullEvent::GuildDelete { incomplete, .. } => {
            // Outages also produce GuildDelete; only forget guilds we actually left.
            if !incomplete.unavailable {
                let id = incomplete.id.to_string();
                info!("Removed from guild {}", incomplete.id);
                if let Err(e) = data.db.run_blocking(move |db| db.remove_guild(&id)).await {
                    error!("Failed to forget guild {}: {}", incomplete.id, e);
                }
            }
        }
        serenity::FullEvent::GuildMemberAddition { new_member } => {
            if new_member.user.bot {
                return Ok(());
            }
            let guild_name = guild_name(ctx, new_member.guild_id);
            if let Err(e) = greetings::send_greeting(
                &ctx.http,
                &data.db,
                Greeting::Welcome,
                new_member.guild_id,
                &guild_name,
                &new_member.user,
            )
            .await
            {
                error!("Welcome failed: {:#}", e);
            }
        }
        serenity::FullEvent::GuildMemberRemoval { guild_id, user, .. } => {
            if user.bot {
                return Ok(());
            }
            let guild_name = guild_name(ctx, *guild_id);
            if let Err(e) = greetings::send_greeting(
                &ctx.http,
                &data.db,
                Greeting::Farewell,
                *guild_id,
                &guild_name,
                user,
            )
            .await
            {
                error!("Farewell failed: {:#}", e);
            }
        }
        _ => {}
    }
    Ok(())
}

fn guild_name(ctx: &serenity::Context, guild_id: serenity::GuildId) -> String {
    guild_id.name(&ctx.cache).unwrap_or_else(|| {
        debug!("Guild {} not in cache, using id as name", guild_id);
        guild_id.to_string()
    })
}
