//! Runtime configuration.
//!
//! Settings are layered: built-in defaults, then `PERSONA_CHAT_`-prefixed
//! environment variables, then CLI flags (which carry their own `env =`
//! fallbacks via clap).

use clap::Parser;
use config::{Config, Environment};
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Persona to chat with (e.g. lara-ai, mike-ai)
    #[arg(short, long, env = "PERSONA")]
    pub persona: Option<String>,

    /// Directory for persisted conversations
    #[arg(long, env = "DATA_DIR")]
    pub data_dir: Option<String>,

    /// Override the persona's webhook endpoint
    #[arg(long, env = "CHAT_ENDPOINT")]
    pub endpoint: Option<String>,

    /// How many conversations the sidebar lists
    #[arg(long, env = "HISTORY_LIMIT")]
    pub history_limit: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Id of the persona to talk to.
    pub persona: String,
    /// Directory where conversation state is stored.
    pub data_dir: String,
    /// Webhook endpoint override; the persona's own endpoint when unset.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Sidebar listing size.
    pub history_limit: usize,
}

impl AppConfig {
    /// Load configuration from process args and environment.
    ///
    /// # Errors
    ///
    /// Returns an error if argument parsing or deserialization fails.
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    /// Load configuration from an explicit argument list.
    ///
    /// # Errors
    ///
    /// Returns an error if argument parsing or deserialization fails.
    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder()
            .set_default("persona", "alex-ai")?
            .set_default("data_dir", "./data")?
            .set_default("history_limit", 10)?;

        // Environment variables, e.g. PERSONA_CHAT_DATA_DIR=/var/lib/chat.
        builder = builder.add_source(
            Environment::with_prefix("PERSONA_CHAT")
                .separator("__")
                .try_parsing(true),
        );

        // CLI flags (and their clap-level env fallbacks) win.
        if let Some(persona) = cli.persona {
            builder = builder.set_override("persona", persona)?;
        }
        if let Some(data_dir) = cli.data_dir {
            builder = builder.set_override("data_dir", data_dir)?;
        }
        if let Some(endpoint) = cli.endpoint {
            builder = builder.set_override("endpoint", endpoint)?;
        }
        if let Some(limit) = cli.history_limit {
            builder = builder.set_override("history_limit", limit as i64)?;
        }

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::load_from_args(["persona-chat"]).unwrap();
        assert_eq!(cfg.persona, "alex-ai");
        assert_eq!(cfg.data_dir, "./data");
        assert_eq!(cfg.endpoint, None);
        assert_eq!(cfg.history_limit, 10);
    }

    #[test]
    fn test_cli_overrides() {
        let cfg = AppConfig::load_from_args([
            "persona-chat",
            "--persona",
            "lara-ai",
            "--data-dir",
            "/tmp/chat",
            "--endpoint",
            "http://localhost:5678/webhook/test/chat",
            "--history-limit",
            "3",
        ])
        .unwrap();
        assert_eq!(cfg.persona, "lara-ai");
        assert_eq!(cfg.data_dir, "/tmp/chat");
        assert_eq!(
            cfg.endpoint.as_deref(),
            Some("http://localhost:5678/webhook/test/chat")
        );
        assert_eq!(cfg.history_limit, 3);
    }

    #[test]
    fn test_rejects_unknown_flags() {
        assert!(AppConfig::load_from_args(["persona-chat", "--no-such-flag"]).is_err());
    }
}
