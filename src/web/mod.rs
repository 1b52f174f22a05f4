//! Dashboard web server: OAuth2 login, guild management API and the SPA.

pub mod auth;
pub mod error;
pub mod guild;
pub mod session;

use axum::{
    routing::{get, post},
    Router,
};
use serenity::http::Http;
use std::path::Path;
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tower_sessions::{MemoryStore, SessionManagerLayer};
use tracing::{info, warn};

use crate::bot_guilds::CacheGuildSource;
use crate::config::Config;
use crate::db::Database;
use crate::governor::DiscordGovernor;

#[derive(Clone)]
pub struct WebState {
    pub config: Arc<Config>,
    pub governor: Arc<DiscordGovernor>,
    pub oauth_client: auth::OAuthClient,
    /// Token exchange client; must not follow redirects.
    pub http_client: reqwest::Client,
    pub db: Database,
    /// The bot's own REST client, for posting messages.
    pub discord_http: Arc<Http>,
    pub bot_guilds: Arc<CacheGuildSource>,
}

impl WebState {
    pub fn new(
        config: Arc<Config>,
        governor: Arc<DiscordGovernor>,
        db: Database,
        discord_http: Arc<Http>,
        bot_guilds: Arc<CacheGuildSource>,
    ) -> anyhow::Result<Self> {
        let oauth_client = auth::oauth_client(&config)?;
        let http_client = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(config.api_timeout())
            .build()?;
        Ok(Self {
            config,
            governor,
            oauth_client,
            http_client,
            db,
            discord_http,
            bot_guilds,
        })
    }
}

pub fn router(state: WebState) -> Router {
    let app = routes(&state.config);
    with_layers(app, state)
}

fn routes(config: &Config) -> Router<WebState> {
    let api_routes = Router::new()
        .route("/dashboard", get(guild::dashboard))
        .route("/refresh-guilds", post(guild::refresh_guilds))
        .route(
            "/guild/{guild_id}/check-permission",
            get(guild::check_permission),
        )
        .route("/guild/{guild_id}/channels", get(guild::channels))
        .route("/guild/{guild_id}/send-message", post(guild::send_message))
        .route(
            "/guild/{guild_id}/settings",
            get(guild::get_settings).put(guild::update_settings),
        )
        // Shape used by the bundled client's settings page.
        .route(
            "/server-settings/{guild_id}",
            get(guild::get_settings).post(guild::update_settings),
        );

    let app = Router::new()
        .route("/login", get(auth::login))
        .route("/callback", get(auth::callback))
        .route("/logout", get(auth::logout))
        .nest("/api", api_routes);

    // Unmatched paths serve the SPA's index.html.
    let build_dir = Path::new(&config.client_build_dir);
    if build_dir.is_dir() {
        app.fallback_service(
            ServeDir::new(build_dir).fallback(ServeFile::new(build_dir.join("index.html"))),
        )
    } else {
        warn!(
            "Client build directory {} not found, serving the API only",
            build_dir.display()
        );
        app
    }
}

fn with_layers(app: Router<WebState>, state: WebState) -> Router {
    // Local development runs over plain http.
    let sessions = SessionManagerLayer::new(MemoryStore::default()).with_secure(false);

    app.layer(sessions)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: WebState, port: u16) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Dashboard listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot_guilds::StaticGuildSource;
    use crate::discord::{
        ApiRequest, ApiResponse, ApiTransport, BotGuild, DiscordUser, CURRENT_USER_ENDPOINT,
        CURRENT_USER_GUILDS_ENDPOINT,
    };
    use crate::error::ApiError;
    use crate::web::error::WebError;
    use crate::web::session::DashboardSession;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::extract::Path as UrlPath;
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use serenity::all::{Cache, GuildId, UserId};
    use tower::ServiceExt;
    use tower_sessions::Session;

    const GUILDS: &str = r#"[
        {"id":"1","name":"Managed","permissions":"32","icon":null},
        {"id":"2","name":"Admin only","permissions":"8","icon":null},
        {"id":"3","name":"No bot","permissions":"32","icon":null}
    ]"#;

    /// Answers by token: "expired" gets a 401, "flaky" a 503 on every attempt.
    struct FakeDiscord;

    #[async_trait]
    impl ApiTransport for FakeDiscord {
        async fn get(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
            let status = |status: u16| ApiError::Status { status, body: String::new() };
            match request.authorization.as_str() {
                "Bearer expired" => return Err(status(401)),
                "Bearer flaky" => return Err(status(503)),
                _ => {}
            }
            let body = match request.endpoint.as_str() {
                CURRENT_USER_GUILDS_ENDPOINT => GUILDS,
                CURRENT_USER_ENDPOINT => r#"{"id":"500","username":"alice"}"#,
                _ => return Err(status(404)),
            };
            Ok(ApiResponse { status: 200, body: body.to_string() })
        }
    }

    /// The bot is in guilds 1 and 2.
    fn state() -> WebState {
        let config = Arc::new(Config::for_tests());
        let bot_guilds = StaticGuildSource(
            [1, 2]
                .into_iter()
                .map(|id| BotGuild { id: GuildId::new(id), name: format!("guild-{}", id), icon: None })
                .collect(),
        );
        let governor = Arc::new(DiscordGovernor::new(
            Arc::new(FakeDiscord),
            Arc::new(bot_guilds),
            config.governor(),
        ));
        let db = Database::new(&config).expect("db");
        db.execute_init().expect("init");
        let cache_source = Arc::new(CacheGuildSource::new());
        WebState::new(config, governor, db, Arc::new(Http::new("")), cache_source).expect("state")
    }

    async fn seed_login(session: Session, UrlPath(token): UrlPath<String>) -> Result<(), WebError> {
        let user = DiscordUser {
            id: UserId::new(500),
            username: "alice".to_string(),
            global_name: None,
            avatar: None,
        };
        DashboardSession::new(&session).store_login(&user, &token, &[]).await
    }

    /// The real router plus a route that logs a session in with a given token.
    fn app(state: WebState) -> Router {
        let app = routes(&state.config).route("/test/login/{token}", get(seed_login));
        with_layers(app, state)
    }

    async fn login(app: &Router, token: &str) -> String {
        let response = app
            .clone()
            .oneshot(get_request(&format!("/test/login/{}", token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    fn authed(method: &str, uri: &str, cookie: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::COOKIE, cookie);
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_dashboard_without_session() {
        let response = router(state())
            .oneshot(get_request("/api/dashboard"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "user": null }));
    }

    #[tokio::test]
    async fn test_refresh_requires_login() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/refresh-guilds")
            .body(Body::empty())
            .unwrap();
        let response = router(state()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "Not authenticated");
    }

    #[tokio::test]
    async fn test_guild_routes_require_login() {
        for uri in [
            "/api/guild/123/channels",
            "/api/guild/123/check-permission",
            "/api/guild/123/settings",
            "/api/server-settings/123",
        ] {
            let response = router(state()).oneshot(get_request(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_callback_without_code() {
        let response = router(state())
            .oneshot(get_request("/callback"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "No code provided");
    }

    #[tokio::test]
    async fn test_callback_rejects_unknown_state() {
        let response = router(state())
            .oneshot(get_request("/callback?code=abc&state=forged"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Invalid OAuth2 state");
    }

    #[tokio::test]
    async fn test_login_redirects_to_discord() {
        let response = router(state())
            .oneshot(get_request("/login"))
            .await
            .unwrap();
        assert!(response.status().is_redirection());

        let location = response.headers()[header::LOCATION].to_str().unwrap();
        assert!(location.starts_with("https://discord.com/oauth2/authorize"));
        assert!(location.contains("client_id=1"));
        assert!(location.contains("guilds.members.read"));
        assert!(response.headers().contains_key(header::SET_COOKIE));
    }

    #[tokio::test]
    async fn test_unknown_path_without_client_build() {
        let response = router(state())
            .oneshot(get_request("/some/spa/route"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_check_permission_granted() {
        let app = app(state());
        let cookie = login(&app, "token").await;

        let response = app
            .oneshot(authed("GET", "/api/guild/1/check-permission", &cookie, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "hasManageServer": true }));
    }

    #[tokio::test]
    async fn test_guild_denials_carry_reason() {
        let app = app(state());
        let cookie = login(&app, "token").await;

        for (guild, reason) in [
            (2, "No MANAGE_SERVER permission"),
            (3, "Bot is not in this guild"),
            (99, "Guild not found or no access"),
        ] {
            let uri = format!("/api/guild/{}/check-permission", guild);
            let response = app.clone().oneshot(authed("GET", &uri, &cookie, None)).await.unwrap();
            assert_eq!(response.status(), StatusCode::FORBIDDEN, "{}", uri);
            assert_eq!(body_json(response).await["error"], reason);
        }
    }

    #[tokio::test]
    async fn test_zero_guild_id_rejected() {
        let app = app(state());
        let cookie = login(&app, "token").await;

        let response = app
            .oneshot(authed("GET", "/api/guild/0/channels", &cookie, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_expired_token_is_unauthorized() {
        let app = app(state());
        let cookie = login(&app, "expired").await;

        let response = app
            .oneshot(authed("GET", "/api/guild/1/check-permission", &cookie, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "Discord API request failed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_are_bad_gateway() {
        let app = app(state());
        let cookie = login(&app, "flaky").await;

        let response = app
            .oneshot(authed("GET", "/api/guild/1/settings", &cookie, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Discord API request failed");
        assert!(body["details"].as_str().unwrap().contains("503"));
    }

    #[tokio::test]
    async fn test_settings_reject_channel_from_another_guild() {
        let state = state();
        state.bot_guilds.attach(Arc::new(Cache::new()));
        let app = app(state);
        let cookie = login(&app, "token").await;

        let update = json!({ "channelId": "999", "welcomeEnabled": true });
        for (method, uri) in [("PUT", "/api/guild/1/settings"), ("POST", "/api/server-settings/1")] {
            let response = app
                .clone()
                .oneshot(authed(method, uri, &cookie, Some(update.clone())))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(body_json(response).await["error"], "Channel does not belong to this guild");
        }

        let response = app
            .oneshot(authed("GET", "/api/server-settings/1", &cookie, None))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["channel_id"], Value::Null);
    }

    #[tokio::test]
    async fn test_server_settings_client_shape() {
        let app = app(state());
        let cookie = login(&app, "token").await;

        let update = json!({
            "channelId": "",
            "welcomeEnabled": false,
            "farewellEnabled": false,
            "welcomeMessage": "Hi {user}",
            "farewellMessage": "",
        });
        let response = app
            .clone()
            .oneshot(authed("POST", "/api/server-settings/1", &cookie, Some(update)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(authed("GET", "/api/server-settings/1", &cookie, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let settings = body_json(response).await;
        assert_eq!(settings["server_id"], "1");
        assert_eq!(settings["welcome_enabled"], false);
        assert_eq!(settings["welcome_message"], "Hi {user}");
        assert_eq!(settings["farewell_message"], Value::Null);
    }
}
