use std::{path::PathBuf, time::Duration};

use crate::error::{Result, TutorError};

const DEFAULT_MODEL: &str = "gpt-4-turbo";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_USERS_FILE: &str = "users.json";

/// Runtime settings read from the environment (after `.env` is loaded).
///
/// The Telegram token is not part of this struct: teloxide picks up
/// `TELOXIDE_TOKEN` itself in `Bot::from_env`.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub model: String,
    pub completion_timeout: Duration,
    pub users_file: PathBuf,
    /// When set, dialogues are kept in this SQLite file instead of in memory.
    pub dialogue_db: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let openai_api_key = lookup("OPENAI_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| TutorError::Config("OPENAI_API_KEY is not set".to_string()))?;

        let model = lookup("OPENAI_MODEL")
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let timeout_secs = match lookup("COMPLETION_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                TutorError::Config(format!("COMPLETION_TIMEOUT_SECS must be a number, got '{}'", raw))
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        if timeout_secs == 0 {
            return Err(TutorError::Config(
                "COMPLETION_TIMEOUT_SECS cannot be 0".to_string(),
            ));
        }

        let users_file = lookup("USERS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_USERS_FILE));

        Ok(Self {
            openai_api_key,
            model,
            completion_timeout: Duration::from_secs(timeout_secs),
            users_file,
            dialogue_db: lookup("DIALOGUE_DB").filter(|p| !p.trim().is_empty()),
        })
    }
}
