use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use anyhow::Context;
use crate::config::Config;
use tracing::{info, debug};

/// Welcome / farewell configuration for one guild.
/// Serialized with the column names, which is what the dashboard client reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    pub server_id: String,
    pub channel_id: Option<String>,
    pub welcome_enabled: bool,
    pub farewell_enabled: bool,
    pub welcome_message: Option<String>,
    pub farewell_message: Option<String>,
}

impl ServerSettings {
    pub fn defaults_for(server_id: &str) -> Self {
        Self {
            server_id: server_id.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        if let Some(parent) = std::path::Path::new(&config.database_url).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory {}", parent.display())
                })?;
            }
        }
        let conn = Connection::open(&config.database_url)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs a synchronous database call on the blocking pool.
    pub async fn run_blocking<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db)).await?
    }

    pub fn execute_init(&self) -> anyhow::Result<()> {
        info!("Database: Initializing schema...");
        let sql = "
            CREATE TABLE IF NOT EXISTS guilds (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL,
                guild_id TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (guild_id) REFERENCES guilds (id)
            );

            CREATE TABLE IF NOT EXISTS server_settings (
                server_id TEXT PRIMARY KEY,
                channel_id TEXT,
                welcome_enabled BOOLEAN DEFAULT FALSE,
                farewell_enabled BOOLEAN DEFAULT FALSE,
                welcome_message TEXT,
                farewell_message TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );
        ";
        let conn = self.conn();
        conn.execute_batch(sql)?;
        debug!("Database: Schema initialized successfully");
        Ok(())
    }

    // --- Guilds ---

    pub fn upsert_guild(&self, guild_id: &str, name: &str) -> anyhow::Result<()> {
        debug!("Database: Upserting guild {} ({})", guild_id, name);
        let conn = self.conn();
        conn.execute(
            "INSERT INTO guilds (id, name) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET name = ?2",
            (guild_id, name),
        )?;
        Ok(())
    }

    pub fn remove_guild(&self, guild_id: &str) -> anyhow::Result<usize> {
        let conn = self.conn();
        let count = conn.execute("DELETE FROM guilds WHERE id = ?1", (guild_id,))?;
        Ok(count)
    }

    // --- Users ---

    pub fn upsert_user(&self, user_id: &str, username: &str) -> anyhow::Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO users (id, username) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET username = ?2",
            (user_id, username),
        )?;
        Ok(())
    }

    // --- Server Settings ---

    pub fn get_server_settings(&self, server_id: &str) -> anyhow::Result<Option<ServerSettings>> {
        let conn = self.conn();
        let settings = conn
            .query_row(
                "SELECT server_id, channel_id, welcome_enabled, farewell_enabled,
                        welcome_message, farewell_message
                 FROM server_settings WHERE server_id = ?1",
                [server_id],
                |row| {
                    Ok(ServerSettings {
                        server_id: row.get(0)?,
                        channel_id: row.get(1)?,
                        welcome_enabled: row.get::<_, Option<bool>>(2)?.unwrap_or(false),
                        farewell_enabled: row.get::<_, Option<bool>>(3)?.unwrap_or(false),
                        welcome_message: row.get(4)?,
                        farewell_message: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(settings)
    }

    pub fn upsert_server_settings(&self, settings: &ServerSettings) -> anyhow::Result<()> {
        debug!("Database: Saving server settings for {}", settings.server_id);
        let conn = self.conn();
        conn.execute(
            "INSERT INTO server_settings (server_id, channel_id, welcome_enabled, farewell_enabled,
                                          welcome_message, farewell_message, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, CURRENT_TIMESTAMP)
             ON CONFLICT(server_id) DO UPDATE SET
                channel_id = ?2,
                welcome_enabled = ?3,
                farewell_enabled = ?4,
                welcome_message = ?5,
                farewell_message = ?6,
                updated_at = CURRENT_TIMESTAMP",
            (
                &settings.server_id,
                &settings.channel_id,
                settings.welcome_enabled,
                settings.farewell_enabled,
                &settings.welcome_message,
                &settings.farewell_message,
            ),
        )?;
        Ok(())
    }
}
