use std::{env, fmt, path::Path, str::FromStr};

use anyhow::{anyhow, Context, Result};
use config::{Config as config_config, File as config_file, FileFormat};
use serde::{Deserialize, Serialize};
use sqlx::mysql::MySqlConnectOptions;

pub const DEFAULT_CONFIG_PATH: &str = "poller.json";

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct App {
    #[serde(default)]
    pub poll: Poll,
    #[serde(default, rename = "DB", alias = "db")]
    pub database: Database,
}

const POLL_URI: &str = "POLL_URI";
const POLL_INTERVAL_SEC: &str = "POLL_INTERVAL_SEC";

/// Where and how often to fetch the ticker.
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct Poll {
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub interval_sec: u64,
}

const DB_HOST: &str = "DB_HOST";
const DB_PORT: &str = "DB_PORT";
const DB_USER: &str = "DB_USER";
const DB_PASSWORD: &str = "DB_PASSWORD";
const DB_NAME: &str = "DB_NAME";

#[derive(Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Database {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub dbname: String,
}

impl App {
    /// Reads the JSON config file at `path`, applies env overrides and validates the result.
    ///
    /// # Errors
    /// Fails when the file can't be read or parsed, or when any required setting is missing.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read the config file {}", path.display()))?;

        Self::parse(&text)?.override_with_env().validate()
    }

    /// Parses and validates config text already in memory, env vars are not consulted.
    pub fn from_json(text: &str) -> Result<Self> {
        Self::parse(text)?.validate()
    }

    fn parse(text: &str) -> Result<Self> {
        config_config::builder()
            .add_source(config_file::from_str(text, FileFormat::Json))
            .build()?
            .try_deserialize()
            .context("Failed to deserialize the config")
    }

    /// Env vars take precedence over the values in the json file.
    fn override_with_env(mut self) -> Self {
        if let Ok(uri) = env::var(POLL_URI) {
            self.poll.uri = uri;
        }

        if let Ok(interval_sec) = env::var(POLL_INTERVAL_SEC) {
            self.poll.interval_sec = u64::from_str(&interval_sec).unwrap_or_default();
        }

        if let Ok(host) = env::var(DB_HOST) {
            self.database.host = host;
        }

        if let Ok(port) = env::var(DB_PORT) {
            self.database.port = u16::from_str(&port).unwrap_or_default();
        }

        if let Ok(user) = env::var(DB_USER) {
            self.database.user = user;
        }

        if let Ok(password) = env::var(DB_PASSWORD) {
            self.database.password = password;
        }

        if let Ok(dbname) = env::var(DB_NAME) {
            self.database.dbname = dbname;
        }

        self
    }

    /// Accepts the config only when every required setting is present.
    fn validate(self) -> Result<Self> {
        let missing: Vec<&str> = [
            ("DB.host", self.database.host.is_empty()),
            ("DB.port", self.database.port == 0),
            ("DB.user", self.database.user.is_empty()),
            ("DB.password", self.database.password.is_empty()),
            ("DB.dbname", self.database.dbname.is_empty()),
            ("poll.interval_sec", self.poll.interval_sec == 0),
            ("poll.uri", self.poll.uri.is_empty()),
        ]
        .into_iter()
        .filter_map(|(name, is_missing)| is_missing.then_some(name))
        .collect();

        if missing.is_empty() {
            Ok(self)
        } else {
            Err(anyhow!("Missing required settings: {}", missing.join(", ")))
        }
    }
}

impl Database {
    /// MySQL connection options built field by field, so credentials never go through URL parsing.
    ///
    /// The statement cache is off: the insert is prepared anew on every poll.
    pub fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.dbname)
            .statement_cache_capacity(0)
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("dbname", &self.dbname)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    fn full_config() -> Value {
        json!({
            "poll": { "uri": "https://api.example.com/btc-usd", "interval_sec": 30 },
            "DB": {
                "host": "127.0.0.1",
                "port": 3306,
                "user": "poller",
                "password": "secret",
                "dbname": "market"
            }
        })
    }

    #[test]
    fn test_from_json_accepts_full_config() {
        let app = App::from_json(&full_config().to_string()).unwrap();

        assert_eq!(app.poll.uri, "https://api.example.com/btc-usd");
        assert_eq!(app.poll.interval_sec, 30);
        assert_eq!(app.database.host, "127.0.0.1");
        assert_eq!(app.database.port, 3306);
        assert_eq!(app.database.user, "poller");
        assert_eq!(app.database.password, "secret");
        assert_eq!(app.database.dbname, "market");
    }

    #[test]
    fn test_from_json_rejects_each_missing_field() {
        let required = [
            ("poll", "uri"),
            ("poll", "interval_sec"),
            ("DB", "host"),
            ("DB", "port"),
            ("DB", "user"),
            ("DB", "password"),
            ("DB", "dbname"),
        ];

        for (section, field) in required {
            let mut config = full_config();
            config[section].as_object_mut().unwrap().remove(field);

            let result = App::from_json(&config.to_string());
            assert!(
                result.is_err(),
                "config without {}.{} should be rejected",
                section,
                field
            );
        }
    }

    #[test]
    fn test_from_json_rejects_zero_values() {
        let mut config = full_config();
        config["poll"]["interval_sec"] = json!(0);
        assert!(App::from_json(&config.to_string()).is_err());

        let mut config = full_config();
        config["DB"]["port"] = json!(0);
        assert!(App::from_json(&config.to_string()).is_err());
    }

    #[test]
    fn test_from_json_rejects_malformed_json() {
        assert!(App::from_json("{ \"poll\": ").is_err());
        assert!(App::from_json("").is_err());
    }

    #[test]
    fn test_load_rejects_missing_file() {
        assert!(App::load("does/not/exist/poller.json").is_err());
    }

    #[test]
    fn test_debug_hides_password() {
        let app = App::from_json(&full_config().to_string()).unwrap();

        assert!(!format!("{:?}", app).contains("secret"));
    }

    #[test]
    fn test_connect_options_keep_reserved_characters_in_credentials() {
        let mut config = full_config();
        config["DB"]["host"] = json!("db.internal");
        config["DB"]["user"] = json!("poll@er");
        config["DB"]["password"] = json!("p@ss/w#rd:?x");
        let app = App::from_json(&config.to_string()).unwrap();

        let options = app.database.connect_options();

        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 3306);
        assert_eq!(options.get_username(), "poll@er");
        assert_eq!(options.get_database(), Some("market"));
        assert!(format!("{:?}", options).contains("statement_cache_capacity: 0"));
    }

    #[test]
    fn test_env_overrides_apply_to_load_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("poller.json");
        std::fs::write(&path, full_config().to_string()).unwrap();

        env::set_var(POLL_URI, "https://override.example.com/eth-usd");
        let from_text = App::from_json(&full_config().to_string());
        let from_file = App::load(&path);
        env::remove_var(POLL_URI);

        assert_eq!(
            from_text.unwrap().poll.uri,
            "https://api.example.com/btc-usd"
        );
        assert_eq!(
            from_file.unwrap().poll.uri,
            "https://override.example.com/eth-usd"
        );
    }
}
