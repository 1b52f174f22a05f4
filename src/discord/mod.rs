//! Discord REST models as seen from a user's OAuth2 token, plus the transport
//! used to fetch them.

pub mod transport;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serenity::model::id::{GuildId, UserId};
use serenity::model::Permissions;

pub use transport::{ApiRequest, ApiResponse, ApiTransport, ReqwestTransport};

pub const CURRENT_USER_ENDPOINT: &str = "/users/@me";
pub const CURRENT_USER_GUILDS_ENDPOINT: &str = "/users/@me/guilds";

/// A guild as returned by `GET /users/@me/guilds`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGuild {
    pub id: GuildId,
    pub name: String,
    /// The requesting user's permissions in this guild.
    #[serde(
        serialize_with = "serialize_permissions",
        deserialize_with = "deserialize_permissions"
    )]
    pub permissions: Permissions,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub owner: bool,
}

impl UserGuild {
    pub fn can_manage(&self) -> bool {
        has_manage_guild(self.permissions)
    }
}

/// A guild the bot account is currently a member of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotGuild {
    pub id: GuildId,
    pub name: String,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscordUser {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// Exact 64-bit test of the Manage Server (0x20) bit.
pub fn has_manage_guild(permissions: Permissions) -> bool {
    permissions.contains(Permissions::MANAGE_GUILD)
}

fn serialize_permissions<S>(permissions: &Permissions, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&permissions.bits().to_string())
}

/// Discord sends permissions as a decimal string so that values above 2^53
/// survive JavaScript. Accept that, or a bare integer, and parse straight into
/// a `u64`.
fn deserialize_permissions<'de, D>(deserializer: D) -> Result<Permissions, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StrOrInt {
        Str(String),
        Int(u64),
    }

    let bits = match StrOrInt::deserialize(deserializer)? {
        StrOrInt::Str(s) => s.trim().parse::<u64>().map_err(serde::de::Error::custom)?,
        StrOrInt::Int(n) => n,
    };
    Ok(Permissions::from_bits_retain(bits))
}
