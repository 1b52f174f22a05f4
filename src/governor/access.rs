use serenity::model::id::GuildId;

use crate::discord::{BotGuild, UserGuild};

/// Outcome of a guild-scoped access check. Denials are ordinary values, not
/// errors: upstream failures are reported separately by the governor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Granted(UserGuild),
    /// The user is not a member of the guild (or Discord hid it from them).
    NotFound,
    /// Member, but without the Manage Server permission.
    MissingManageGuild,
    /// The user could manage it, but the bot is not in the guild.
    BotAbsent,
}

impl AccessDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessDecision::Granted(_))
    }

    pub fn reason(&self) -> &'static str {
        match self {
            AccessDecision::Granted(_) => "Access granted",
            AccessDecision::NotFound => "Guild not found or no access",
            AccessDecision::MissingManageGuild => "No MANAGE_SERVER permission",
            AccessDecision::BotAbsent => "Bot is not in this guild",
        }
    }
}

/// Checks membership, then the Manage Server bit, then bot presence; the first
/// failing check decides the outcome.
pub fn decide_access(
    user_guilds: Vec<UserGuild>,
    bot_guilds: &[BotGuild],
    guild_id: GuildId,
) -> AccessDecision {
    let Some(guild) = user_guilds.into_iter().find(|g| g.id == guild_id) else {
        return AccessDecision::NotFound;
    };

    if !guild.can_manage() {
        return AccessDecision::MissingManageGuild;
    }

    if !bot_guilds.iter().any(|g| g.id == guild_id) {
        return AccessDecision::BotAbsent;
    }

    AccessDecision::Granted(guild)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serenity::model::Permissions;

    fn user_guild(id: u64, bits: u64) -> UserGuild {
        UserGuild {
            id: GuildId::new(id),
            name: format!("guild-{}", id),
            permissions: Permissions::from_bits_retain(bits),
            icon: None,
            owner: false,
        }
    }

    fn bot_guild(id: u64) -> BotGuild {
        BotGuild { id: GuildId::new(id), name: String::new(), icon: None }
    }

    #[test]
    fn test_unknown_guild() {
        let decision = decide_access(vec![user_guild(1, 0x20)], &[bot_guild(1)], GuildId::new(42));
        assert_eq!(decision, AccessDecision::NotFound);
        assert_eq!(decision.reason(), "Guild not found or no access");
    }

    #[test]
    fn test_missing_permission_checked_before_bot() {
        let decision = decide_access(vec![user_guild(1, 0x08)], &[], GuildId::new(1));
        assert_eq!(decision, AccessDecision::MissingManageGuild);
    }

    #[test]
    fn test_bot_absent() {
        let decision = decide_access(vec![user_guild(1, 0x20)], &[bot_guild(2)], GuildId::new(1));
        assert_eq!(decision, AccessDecision::BotAbsent);
        assert!(!decision.is_granted());
    }

    #[test]
    fn test_granted_returns_user_view() {
        let decision = decide_access(
            vec![user_guild(1, 0x08), user_guild(2, 0x80_0000_0020)],
            &[bot_guild(2)],
            GuildId::new(2),
        );
        match decision {
            AccessDecision::Granted(guild) => {
                assert_eq!(guild.id, GuildId::new(2));
                assert_eq!(guild.permissions.bits(), 0x80_0000_0020);
            }
            other => panic!("expected access, got {:?}", other),
        }
    }
}
