//! Typed access to the dashboard's session values.

use tower_sessions::Session;

use crate::discord::{DiscordUser, UserGuild};
use crate::web::error::WebError;

const SESSION_USER: &str = "dashboard:user";
const SESSION_ACCESS_TOKEN: &str = "dashboard:access_token";
const SESSION_GUILDS: &str = "dashboard:guilds";
const SESSION_CSRF_TOKEN: &str = "oauth:csrf_token";

pub struct DashboardSession<'a> {
    session: &'a Session,
}

/// A logged-in user together with the OAuth2 token used for Discord calls.
pub struct LoggedIn {
    pub user: DiscordUser,
    pub access_token: String,
}

impl<'a> DashboardSession<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    pub async fn logged_in(&self) -> Result<Option<LoggedIn>, WebError> {
        let user: Option<DiscordUser> = self.session.get(SESSION_USER).await?;
        let access_token: Option<String> = self.session.get(SESSION_ACCESS_TOKEN).await?;
        Ok(match (user, access_token) {
            (Some(user), Some(access_token)) => Some(LoggedIn { user, access_token }),
            _ => None,
        })
    }

    /// Like `logged_in`, but a missing login is a 401.
    pub async fn require_login(&self) -> Result<LoggedIn, WebError> {
        self.logged_in().await?.ok_or(WebError::Unauthenticated)
    }

    pub async fn store_login(
        &self,
        user: &DiscordUser,
        access_token: &str,
        guilds: &[UserGuild],
    ) -> Result<(), WebError> {
        // New identity, new session id.
        self.session.cycle_id().await?;
        self.session.insert(SESSION_USER, user).await?;
        self.session.insert(SESSION_ACCESS_TOKEN, access_token).await?;
        self.store_guilds(guilds).await
    }

    pub async fn guilds(&self) -> Result<Vec<UserGuild>, WebError> {
        Ok(self.session.get(SESSION_GUILDS).await?.unwrap_or_default())
    }

    pub async fn store_guilds(&self, guilds: &[UserGuild]) -> Result<(), WebError> {
        self.session.insert(SESSION_GUILDS, guilds).await?;
        Ok(())
    }

    pub async fn set_csrf_token(&self, token: &str) -> Result<(), WebError> {
        self.session.insert(SESSION_CSRF_TOKEN, token).await?;
        Ok(())
    }

    /// Consumes the stored CSRF token; it only ever validates one callback.
    pub async fn take_csrf_token(&self) -> Result<Option<String>, WebError> {
        Ok(self.session.remove(SESSION_CSRF_TOKEN).await?)
    }

    pub async fn clear(&self) -> Result<(), WebError> {
        self.session.flush().await?;
        Ok(())
    }
}
