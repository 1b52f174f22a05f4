//! Discord OAuth2 login flow.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect},
};
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, warn};

use crate::config::Config;
use crate::web::error::WebError;
use crate::web::session::DashboardSession;
use crate::web::WebState;

const DISCORD_AUTH_URL: &str = "https://discord.com/oauth2/authorize";
const DISCORD_TOKEN_URL: &str = "https://discord.com/api/oauth2/token";
const SCOPES: [&str; 3] = ["identify", "guilds", "guilds.members.read"];

/// OAuth2 client with the authorize and token endpoints configured.
pub type OAuthClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

pub fn oauth_client(config: &Config) -> anyhow::Result<OAuthClient> {
    Ok(BasicClient::new(ClientId::new(config.client_id.to_string()))
        .set_client_secret(ClientSecret::new(config.client_secret.clone()))
        .set_auth_uri(AuthUrl::new(DISCORD_AUTH_URL.to_string())?)
        .set_token_uri(TokenUrl::new(DISCORD_TOKEN_URL.to_string())?)
        .set_redirect_uri(RedirectUrl::new(config.redirect_uri.clone())?))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
}

pub async fn login(
    State(state): State<WebState>,
    session: Session,
) -> Result<impl IntoResponse, WebError> {
    let (url, csrf_token) = state
        .oauth_client
        .authorize_url(CsrfToken::new_random)
        .add_scopes(SCOPES.iter().map(|s| Scope::new(s.to_string())))
        .url();

    DashboardSession::new(&session)
        .set_csrf_token(csrf_token.secret())
        .await?;

    Ok(Redirect::to(url.as_str()))
}

pub async fn callback(
    State(state): State<WebState>,
    session: Session,
    Query(params): Query<CallbackParams>,
) -> Result<impl IntoResponse, WebError> {
    let dashboard = DashboardSession::new(&session);

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        warn!("OAuth2 callback without a code");
        return Err(WebError::BadRequest("No code provided".to_string()));
    };

    let expected = dashboard.take_csrf_token().await?;
    if expected.is_none() || expected != params.state {
        warn!("OAuth2 callback with mismatched state");
        return Err(WebError::BadRequest("Invalid OAuth2 state".to_string()));
    }

    let token = state
        .oauth_client
        .exchange_code(AuthorizationCode::new(code))
        .request_async(&state.http_client)
        .await
        .map_err(|e| WebError::OAuth(e.to_string()))?;
    let access_token = token.access_token().secret().to_string();

    let user = state.governor.current_user(&access_token).await?;
    let guilds = state
        .governor
        .guilds_with_dedup(user.id, &access_token)
        .await?;

    dashboard.store_login(&user, &access_token, &guilds).await?;

    let (user_id, username) = (user.id.to_string(), user.username.clone());
    state
        .db
        .run_blocking(move |db| db.upsert_user(&user_id, &username))
        .await?;

    info!(
        "Dashboard login: {} ({}) with {} manageable guilds",
        user.username,
        user.id,
        guilds.len()
    );

    Ok(Redirect::to("/dashboard"))
}

pub async fn logout(session: Session) -> Result<impl IntoResponse, WebError> {
    DashboardSession::new(&session).clear().await?;
    Ok(Redirect::to("/"))
}
