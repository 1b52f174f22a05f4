use crate::governor::GovernorConfig;
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

#[derive(Clone)]
pub struct Config {
    pub discord_token: String,
    /// OAuth2 application id; also the bot's application id.
    pub client_id: u64,
    pub client_secret: String,
    pub redirect_uri: String,
    pub web_port: u16,
    pub bot_invite_permissions: String,
    pub dev_user_ids: Vec<u64>,
    pub database_url: String,
    pub status_message: String,
    pub client_build_dir: String,

    // Discord REST governor
    pub discord_api_base: String,
    pub api_request_delay_ms: u64,
    pub api_max_retries: u32,
    pub api_retry_base_ms: u64,
    pub api_retry_max_delay_ms: u64,
    pub api_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        Self::build()
    }

    fn build() -> anyhow::Result<Self> {
        Ok(Config {
            discord_token: env::var("DISCORD_TOKEN")
                .map_err(|_| anyhow::anyhow!("DISCORD_TOKEN must be set"))?,
            client_id: env::var("CLIENT_ID")
                .map_err(|_| anyhow::anyhow!("CLIENT_ID must be set"))?
                .parse()
                .map_err(|_| anyhow::anyhow!("CLIENT_ID must be a valid u64"))?,
            client_secret: env::var("CLIENT_SECRET").unwrap_or_default(),
            redirect_uri: env::var("REDIRECT_URI")
                .unwrap_or_else(|_| "http://localhost:3000/callback".to_string()),
            web_port: env::var("WEB_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
            bot_invite_permissions: env::var("BOT_INVITE_PERMISSIONS")
                .unwrap_or_else(|_| "8".to_string()),
            dev_user_ids: env::var("DEV_USER_IDS")
                .map(|ids| parse_id_list(&ids))
                .unwrap_or_default(),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "data/dashbot.db".to_string()),
            status_message: env::var("STATUS_MESSAGE")
                .unwrap_or_else(|_| "Manage me from the dashboard".to_string()),
            client_build_dir: env::var("CLIENT_BUILD_DIR")
                .unwrap_or_else(|_| "web/client/build".to_string()),
            discord_api_base: env::var("DISCORD_API_BASE")
                .unwrap_or_else(|_| "https://discord.com/api".to_string()),
            api_request_delay_ms: env::var("API_REQUEST_DELAY_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap_or(1000),
            api_max_retries: env::var("API_MAX_RETRIES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .unwrap_or(3),
            api_retry_base_ms: env::var("API_RETRY_BASE_MS")
                .unwrap_or_else(|_| "200".to_string())
                .parse()
                .unwrap_or(200),
            api_retry_max_delay_ms: env::var("API_RETRY_MAX_DELAY_MS")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()
                .unwrap_or(10000),
            api_timeout_secs: env::var("API_TIMEOUT_SECS")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .unwrap_or(15),
        })
    }

    pub fn governor(&self) -> GovernorConfig {
        GovernorConfig {
            request_delay: Duration::from_millis(self.api_request_delay_ms),
            max_retries: self.api_max_retries,
            retry_base: Duration::from_millis(self.api_retry_base_ms),
            retry_max_delay: Duration::from_millis(self.api_retry_max_delay_ms),
        }
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    pub fn is_dev(&self, user_id: u64) -> bool {
        self.dev_user_ids.contains(&user_id)
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Config {
            discord_token: "test".to_string(),
            client_id: 1,
            client_secret: "secret".to_string(),
            redirect_uri: "http://localhost:3000/callback".to_string(),
            web_port: 3000,
            bot_invite_permissions: "8".to_string(),
            dev_user_ids: vec![42],
            database_url: ":memory:".to_string(),
            status_message: "test".to_string(),
            client_build_dir: "/nonexistent/build".to_string(),
            discord_api_base: "http://127.0.0.1:9/api".to_string(),
            api_request_delay_ms: 0,
            api_max_retries: 3,
            api_retry_base_ms: 200,
            api_retry_max_delay_ms: 10000,
            api_timeout_secs: 1,
        }
    }
}

fn parse_id_list(raw: &str) -> Vec<u64> {
    raw.split(',')
        .filter_map(|id| id.trim().parse().ok())
        .collect()
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("discord_token", &"[REDACTED]")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("redirect_uri", &self.redirect_uri)
            .field("web_port", &self.web_port)
            .field("bot_invite_permissions", &self.bot_invite_permissions)
            .field("dev_user_ids", &self.dev_user_ids)
            .field("database_url", &self.database_url)
            .field("status_message", &self.status_message)
            .field("client_build_dir", &self.client_build_dir)
            .field("discord_api_base", &self.discord_api_base)
            .field("api_request_delay_ms", &self.api_request_delay_ms)
            .field("api_max_retries", &self.api_max_retries)
            .field("api_retry_base_ms", &self.api_retry_base_ms)
            .field("api_retry_max_delay_ms", &self.api_retry_max_delay_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

/// Discord message limit is 2000 characters
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_config_logic() {
        // 1. Test missing vars
        env::remove_var("DISCORD_TOKEN");
        env::remove_var("CLIENT_ID");
        let result = Config::build();
        assert!(
            result.is_err(),
            "Should fail when required vars are missing"
        );

        // 2. Test defaults
        env::set_var("DISCORD_TOKEN", "test_token");
        env::set_var("CLIENT_ID", "12345");
        env::set_var("CLIENT_SECRET", "oauth_secret");
        env::set_var("DEV_USER_IDS", "1, 2,nope,3");
        let config = Config::build().unwrap();
        assert_eq!(config.discord_token, "test_token");
        assert_eq!(config.client_id, 12345);
        assert_eq!(config.dev_user_ids, vec![1, 2, 3]);
        assert!(config.is_dev(2));
        assert!(!config.is_dev(4));

        let governor = config.governor();
        assert_eq!(governor.max_retries, 3);
        assert_eq!(governor.request_delay, Duration::from_secs(1));
        assert_eq!(governor.retry_base, Duration::from_millis(200));

        // 3. Test debug redaction
        let debug_output = format!("{:?}", config);
        assert!(!debug_output.contains("test_token"));
        assert!(!debug_output.contains("oauth_secret"));
        assert!(debug_output.contains("[REDACTED]"));

        // Cleanup
        env::remove_var("DISCORD_TOKEN");
        env::remove_var("CLIENT_ID");
        env::remove_var("CLIENT_SECRET");
        env::remove_var("DEV_USER_IDS");
    }

    #[test]
    fn test_parse_id_list() {
        assert_eq!(parse_id_list(""), Vec::<u64>::new());
        assert_eq!(parse_id_list("10,20"), vec![10, 20]);
    }
}
