use anyhow::Context as AnyhowContext;
use serenity::all::{ChannelId, CreateAllowedMentions, CreateMessage, GuildId, User};
use serenity::http::Http;
use tracing::{debug, info};

use crate::db::{Database, ServerSettings};

pub const DEFAULT_WELCOME: &str = "Welcome {user} to {server}!";
pub const DEFAULT_FAREWELL: &str = "{username} has left {server}.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Greeting {
    Welcome,
    Farewell,
}

impl Greeting {
    fn enabled(self, settings: &ServerSettings) -> bool {
        match self {
            Greeting::Welcome => settings.welcome_enabled,
            Greeting::Farewell => settings.farewell_enabled,
        }
    }

    fn template(self, settings: &ServerSettings) -> &str {
        let (custom, default) = match self {
            Greeting::Welcome => (&settings.welcome_message, DEFAULT_WELCOME),
            Greeting::Farewell => (&settings.farewell_message, DEFAULT_FAREWELL),
        };
        custom
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(default)
    }
}

/// Fills `{user}`, `{username}` and `{server}` in a greeting template.
pub fn render(template: &str, user_id: u64, username: &str, server: &str) -> String {
    template
        .replace("{user}", &format!("<@{}>", user_id))
        .replace("{username}", username)
        .replace("{server}", server)
}

/// The channel and text to post, if this guild wants the greeting at all.
pub fn plan(
    kind: Greeting,
    settings: &ServerSettings,
    user_id: u64,
    username: &str,
    server: &str,
) -> Option<(u64, String)> {
    if !kind.enabled(settings) {
        return None;
    }
    let channel_id = settings.channel_id.as_deref()?.trim().parse::<u64>().ok()?;
    if channel_id == 0 {
        return None;
    }
    Some((channel_id, render(kind.template(settings), user_id, username, server)))
}

pub async fn send_greeting(
    http: &Http,
    db: &Database,
    kind: Greeting,
    guild_id: GuildId,
    guild_name: &str,
    user: &User,
) -> anyhow::Result<()> {
    let server_id = guild_id.to_string();
    let Some(settings) = db
        .run_blocking(move |db| db.get_server_settings(&server_id))
        .await?
    else {
        return Ok(());
    };

    let Some((channel_id, content)) = plan(kind, &settings, user.id.get(), &user.name, guild_name)
    else {
        debug!("{:?} disabled or unconfigured for guild {}", kind, guild_id);
        return Ok(());
    };

    let builder = CreateMessage::new()
        .content(content)
        .allowed_mentions(CreateAllowedMentions::new().users(vec![user.id]));

    ChannelId::new(channel_id)
        .send_message(http, builder)
        .await
        .with_context(|| format!("Failed to send {:?} to channel {}", kind, channel_id))?;

    info!("Sent {:?} for {} in guild {}", kind, user.name, guild_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ServerSettings {
        ServerSettings {
            server_id: "1".to_string(),
            channel_id: Some("200".to_string()),
            welcome_enabled: true,
            farewell_enabled: false,
            welcome_message: Some("Hello {user}, enjoy {server}! ({username})".to_string()),
            farewell_message: None,
        }
    }

    #[test]
    fn test_render_placeholders() {
        assert_eq!(
            render("Hello {user}, enjoy {server}! ({username})", 7, "bob", "Rustaceans"),
            "Hello <@7>, enjoy Rustaceans! (bob)"
        );
        assert_eq!(render("no placeholders", 7, "bob", "x"), "no placeholders");
    }

    #[test]
    fn test_plan_welcome() {
        let planned = plan(Greeting::Welcome, &settings(), 7, "bob", "Rustaceans");
        assert_eq!(
            planned,
            Some((200, "Hello <@7>, enjoy Rustaceans! (bob)".to_string()))
        );
    }

    #[test]
    fn test_plan_disabled() {
        assert_eq!(plan(Greeting::Farewell, &settings(), 7, "bob", "R"), None);
    }

    #[test]
    fn test_plan_default_template() {
        let mut s = settings();
        s.farewell_enabled = true;
        s.welcome_message = Some("   ".to_string());
        assert_eq!(
            plan(Greeting::Farewell, &s, 7, "bob", "R"),
            Some((200, "bob has left R.".to_string()))
        );
        assert_eq!(
            plan(Greeting::Welcome, &s, 7, "bob", "R"),
            Some((200, "Welcome <@7> to R!".to_string()))
        );
    }

    #[test]
    fn test_plan_requires_valid_channel() {
        let mut s = settings();
        s.channel_id = None;
        assert_eq!(plan(Greeting::Welcome, &s, 7, "bob", "R"), None);
        s.channel_id = Some("general".to_string());
        assert_eq!(plan(Greeting::Welcome, &s, 7, "bob", "R"), None);
        s.channel_id = Some("0".to_string());
        assert_eq!(plan(Greeting::Welcome, &s, 7, "bob", "R"), None);
    }
}
