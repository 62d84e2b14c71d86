use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
    pub remote: RemoteConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// offline→online 遷移で自動的に同期パスを起動するか
    pub auto_sync_on_reconnect: bool,
    /// 親レコードが見つからない署名を破棄するまでの試行回数
    pub max_signature_attempts: u32,
    pub event_buffer: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub notes_collection: String,
    pub signature_path_prefix: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite:data/delivery_notes.db?mode=rwc".to_string(),
                max_connections: 5,
            },
            sync: SyncConfig::default(),
            remote: RemoteConfig::default(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_sync_on_reconnect: true,
            max_signature_attempts: 3,
            event_buffer: 64,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            notes_collection: "deliveryNotes".to_string(),
            signature_path_prefix: "signatures".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("DELIVERY_SYNC_DATABASE_URL") {
            let trimmed = v.trim();
            if !trimmed.is_empty() {
                cfg.database.url = trimmed.to_string();
            }
        }
        if let Ok(v) = std::env::var("DELIVERY_SYNC_DATABASE_MAX_CONNECTIONS") {
            if let Some(value) = parse_u32(&v) {
                cfg.database.max_connections = value.max(1);
            }
        }
        if let Ok(v) = std::env::var("DELIVERY_SYNC_AUTO_SYNC") {
            cfg.sync.auto_sync_on_reconnect = parse_bool(&v, cfg.sync.auto_sync_on_reconnect);
        }
        if let Ok(v) = std::env::var("DELIVERY_SYNC_MAX_SIGNATURE_ATTEMPTS") {
            if let Some(value) = parse_u32(&v) {
                cfg.sync.max_signature_attempts = value.max(1);
            }
        }
        if let Ok(v) = std::env::var("DELIVERY_SYNC_EVENT_BUFFER") {
            if let Some(value) = parse_u32(&v) {
                cfg.sync.event_buffer = (value as usize).max(1);
            }
        }
        if let Ok(v) = std::env::var("DELIVERY_SYNC_NOTES_COLLECTION") {
            let trimmed = v.trim();
            if !trimmed.is_empty() {
                cfg.remote.notes_collection = trimmed.to_string();
            }
        }
        if let Ok(v) = std::env::var("DELIVERY_SYNC_SIGNATURE_PREFIX") {
            let trimmed = v.trim().trim_matches('/');
            if !trimmed.is_empty() {
                cfg.remote.signature_path_prefix = trimmed.to_string();
            }
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database.url.trim().is_empty() {
            return Err("Database url must not be empty".to_string());
        }
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }
        if self.sync.max_signature_attempts == 0 {
            return Err("Sync max_signature_attempts must be greater than 0".to_string());
        }
        if self.sync.event_buffer == 0 {
            return Err("Sync event_buffer must be greater than 0".to_string());
        }
        if self.remote.notes_collection.trim().is_empty() {
            return Err("Remote notes_collection must not be empty".to_string());
        }
        if self.remote.signature_path_prefix.trim().is_empty() {
            return Err("Remote signature_path_prefix must not be empty".to_string());
        }
        Ok(())
    }
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_u32(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok()
}
