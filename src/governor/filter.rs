use serenity::model::id::GuildId;
use std::collections::HashSet;

use crate::discord::{BotGuild, UserGuild};

/// Guilds the user can manage (Manage Server bit set) and that the bot is in,
/// in the user's original order.
pub fn filter_manageable(user_guilds: Vec<UserGuild>, bot_guilds: &[BotGuild]) -> Vec<UserGuild> {
    let bot_ids: HashSet<GuildId> = bot_guilds.iter().map(|g| g.id).collect();
    user_guilds
        .into_iter()
        .filter(|g| g.can_manage() && bot_ids.contains(&g.id))
        .collect()
}
