//! Dashboard and guild-scoped API handlers.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use serenity::all::{Cache, Channel, ChannelId, ChannelType, GuildId};
use tower_sessions::Session;
use tracing::{error, info};

use crate::config::DISCORD_MESSAGE_LIMIT;
use crate::db::ServerSettings;
use crate::discord::UserGuild;
use crate::governor::AccessDecision;
use crate::web::error::WebError;
use crate::web::session::DashboardSession;
use crate::web::WebState;

const FOREIGN_CHANNEL: &str = "Channel does not belong to this guild";

/// `GET /api/dashboard`: refreshes the session's guild list, then returns it.
/// A failed refresh is logged and the previous list served instead.
pub async fn dashboard(
    State(state): State<WebState>,
    session: Session,
) -> Result<Json<Value>, WebError> {
    let dashboard = DashboardSession::new(&session);
    let Some(login) = dashboard.logged_in().await? else {
        return Ok(Json(json!({ "user": null })));
    };

    match state
        .governor
        .guilds_with_dedup(login.user.id, &login.access_token)
        .await
    {
        Ok(guilds) => dashboard.store_guilds(&guilds).await?,
        Err(e) => error!("Guild refresh for {} failed: {}", login.user.id, e),
    }

    Ok(Json(json!({
        "user": login.user,
        "guilds": dashboard.guilds().await?,
        "client_id": state.config.client_id.to_string(),
        "bot_permissions": state.config.bot_invite_permissions,
    })))
}

/// `POST /api/refresh-guilds`
pub async fn refresh_guilds(
    State(state): State<WebState>,
    session: Session,
) -> Result<Json<Value>, WebError> {
    let dashboard = DashboardSession::new(&session);
    let login = dashboard.require_login().await?;

    let guilds = state
        .governor
        .guilds_with_dedup(login.user.id, &login.access_token)
        .await?;
    dashboard.store_guilds(&guilds).await?;

    Ok(Json(json!({ "success": true, "guilds": guilds })))
}

/// Live access check for every guild-scoped route.
async fn authorize_guild(
    state: &WebState,
    session: &Session,
    guild_id: u64,
) -> Result<UserGuild, WebError> {
    let login = DashboardSession::new(session).require_login().await?;
    let guild_id = GuildId::new(non_zero(guild_id, "guild")?);

    let decision = state
        .governor
        .validate_guild_access(&login.access_token, guild_id)
        .await?;
    match decision {
        AccessDecision::Granted(guild) => Ok(guild),
        denied => {
            info!(
                "Denied {} access to guild {}: {}",
                login.user.id,
                guild_id,
                denied.reason()
            );
            Err(WebError::Forbidden(denied.reason()))
        }
    }
}

/// `GET /api/guild/{guild_id}/check-permission`
pub async fn check_permission(
    State(state): State<WebState>,
    session: Session,
    Path(guild_id): Path<u64>,
) -> Result<Json<Value>, WebError> {
    authorize_guild(&state, &session, guild_id).await?;
    Ok(Json(json!({ "hasManageServer": true })))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelSummary {
    pub id: String,
    pub name: String,
    pub position: u16,
}

/// `GET /api/guild/{guild_id}/channels`: text channels the bot can post in.
pub async fn channels(
    State(state): State<WebState>,
    session: Session,
    Path(guild_id): Path<u64>,
) -> Result<Json<Vec<ChannelSummary>>, WebError> {
    let guild = authorize_guild(&state, &session, guild_id).await?;
    let cache = state.bot_guilds.cache().ok_or(WebError::BotNotReady)?;
    Ok(Json(writable_channels(cache, guild.id)))
}

fn writable_channels(cache: &Cache, guild_id: GuildId) -> Vec<ChannelSummary> {
    let Some(guild) = cache.guild(guild_id) else {
        return Vec::new();
    };
    let bot_id = cache.current_user().id;
    let bot_member = guild.members.get(&bot_id);

    let mut channels: Vec<ChannelSummary> = guild
        .channels
        .values()
        .filter(|c| matches!(c.kind, ChannelType::Text | ChannelType::News))
        .filter(|c| {
            bot_member.map_or(true, |member| {
                let permissions = guild.user_permissions_in(c, member);
                permissions.view_channel() && permissions.send_messages()
            })
        })
        .map(|c| ChannelSummary {
            id: c.id.to_string(),
            name: c.name.clone(),
            position: c.position,
        })
        .collect();
    channels.sort_by_key(|c| c.position);
    channels
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub channel_id: Option<String>,
    pub message: Option<String>,
}

/// `POST /api/guild/{guild_id}/send-message`
pub async fn send_message(
    State(state): State<WebState>,
    session: Session,
    Path(guild_id): Path<u64>,
    Json(body): Json<SendMessageRequest>,
) -> Result<Json<Value>, WebError> {
    let guild = authorize_guild(&state, &session, guild_id).await?;

    let (Some(channel_id), Some(message)) = (body.channel_id, body.message) else {
        return Err(WebError::BadRequest("Missing channel or message".to_string()));
    };
    let message = validate_message(&message)?;
    let channel_id = ChannelId::new(parse_snowflake(&channel_id, "channel")?);
    ensure_guild_channel(&state, guild.id, channel_id).await?;

    let sent = channel_id.say(&*state.discord_http, message).await?;
    info!("Dashboard message sent to channel {} in guild {}", channel_id, guild.id);

    Ok(Json(json!({ "success": true, "messageId": sent.id.to_string() })))
}

/// The bot only posts into channels of the guild the user was checked against.
/// Uses the gateway cache once attached, the REST API before that.
async fn ensure_guild_channel(
    state: &WebState,
    guild_id: GuildId,
    channel_id: ChannelId,
) -> Result<(), WebError> {
    let owner = match state.bot_guilds.cache() {
        Some(cache) => cached_channel_owner(cache, guild_id, channel_id),
        None => match channel_id.to_channel(&*state.discord_http).await {
            Ok(Channel::Guild(channel)) => Some(channel.guild_id),
            Ok(_) => None,
            Err(e) => return Err(channel_lookup_error(http_status(&e), e)),
        },
    };
    check_channel_owner(owner, guild_id)
}

fn cached_channel_owner(cache: &Cache, guild_id: GuildId, channel_id: ChannelId) -> Option<GuildId> {
    let guild = cache.guild(guild_id)?;
    guild.channels.contains_key(&channel_id).then_some(guild_id)
}

fn check_channel_owner(owner: Option<GuildId>, guild_id: GuildId) -> Result<(), WebError> {
    match owner {
        Some(owner) if owner == guild_id => Ok(()),
        _ => Err(WebError::BadRequest(FOREIGN_CHANNEL.to_string())),
    }
}

fn http_status(err: &serenity::Error) -> Option<u16> {
    match err {
        serenity::Error::Http(e) => e.status_code().map(|status| status.as_u16()),
        _ => None,
    }
}

/// Unknown channels and channels hidden from the bot are the caller's mistake.
fn channel_lookup_error(status: Option<u16>, err: serenity::Error) -> WebError {
    match status {
        Some(403 | 404) => WebError::BadRequest(FOREIGN_CHANNEL.to_string()),
        _ => err.into(),
    }
}

/// `GET /api/guild/{guild_id}/settings` and `GET /api/server-settings/{guild_id}`
pub async fn get_settings(
    State(state): State<WebState>,
    session: Session,
    Path(guild_id): Path<u64>,
) -> Result<Json<ServerSettings>, WebError> {
    let guild = authorize_guild(&state, &session, guild_id).await?;
    let server_id = guild.id.to_string();
    let settings = state
        .db
        .run_blocking(move |db| {
            Ok(db
                .get_server_settings(&server_id)?
                .unwrap_or_else(|| ServerSettings::defaults_for(&server_id)))
        })
        .await?;
    Ok(Json(settings))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub channel_id: Option<String>,
    #[serde(default)]
    pub welcome_enabled: bool,
    #[serde(default)]
    pub farewell_enabled: bool,
    pub welcome_message: Option<String>,
    pub farewell_message: Option<String>,
}

impl SettingsUpdate {
    fn into_settings(self, server_id: String) -> Result<ServerSettings, WebError> {
        let channel_id = match self.channel_id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(id) => Some(parse_snowflake(id, "channel")?.to_string()),
        };
        if (self.welcome_enabled || self.farewell_enabled) && channel_id.is_none() {
            return Err(WebError::BadRequest(
                "A channel is required to enable greetings".to_string(),
            ));
        }

        let optional_message = |message: Option<String>| -> Result<Option<String>, WebError> {
            match message {
                Some(m) if !m.trim().is_empty() => Ok(Some(validate_message(&m)?.to_string())),
                _ => Ok(None),
            }
        };

        Ok(ServerSettings {
            server_id,
            channel_id,
            welcome_enabled: self.welcome_enabled,
            farewell_enabled: self.farewell_enabled,
            welcome_message: optional_message(self.welcome_message)?,
            farewell_message: optional_message(self.farewell_message)?,
        })
    }
}

/// `PUT /api/guild/{guild_id}/settings` and `POST /api/server-settings/{guild_id}`
pub async fn update_settings(
    State(state): State<WebState>,
    session: Session,
    Path(guild_id): Path<u64>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<ServerSettings>, WebError> {
    let guild = authorize_guild(&state, &session, guild_id).await?;
    let settings = update.into_settings(guild.id.to_string())?;
    if let Some(channel_id) = settings.channel_id.as_deref() {
        let channel_id = ChannelId::new(parse_snowflake(channel_id, "channel")?);
        ensure_guild_channel(&state, guild.id, channel_id).await?;
    }

    let to_store = settings.clone();
    state
        .db
        .run_blocking(move |db| db.upsert_server_settings(&to_store))
        .await?;
    info!("Updated greeting settings for guild {}", guild.id);

    Ok(Json(settings))
}

fn validate_message(message: &str) -> Result<&str, WebError> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(WebError::BadRequest("Missing channel or message".to_string()));
    }
    if trimmed.chars().count() > DISCORD_MESSAGE_LIMIT {
        return Err(WebError::BadRequest(format!(
            "Message is longer than {} characters",
            DISCORD_MESSAGE_LIMIT
        )));
    }
    Ok(trimmed)
}

/// Discord ids are non-zero u64 snowflakes; serenity id types panic on zero.
fn parse_snowflake(raw: &str, what: &str) -> Result<u64, WebError> {
    let id = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| WebError::BadRequest(format!("Invalid {} id", what)))?;
    non_zero(id, what)
}

fn non_zero(id: u64, what: &str) -> Result<u64, WebError> {
    if id == 0 {
        return Err(WebError::BadRequest(format!("Invalid {} id", what)));
    }
    Ok(id)
}
