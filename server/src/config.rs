use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Close connections that never send a valid first message. Off by default.
    pub admission_timeout: Option<Duration>,
    pub create_attempts: usize,
    /// Largest websocket frame or reassembled message accepted, in bytes.
    pub max_frame_size: usize,
}

pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
            admission_timeout: None,
            create_attempts: 8,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();
        let admission_timeout_secs = parse_or(&lookup, "ADMISSION_TIMEOUT_SECS", 0u64);
        Self {
            host: lookup("HOST").unwrap_or(default.host),
            port: parse_or(&lookup, "PORT", default.port),
            admission_timeout: if admission_timeout_secs == 0 {
                None
            } else {
                Some(Duration::from_secs(admission_timeout_secs))
            },
            create_attempts: parse_or(&lookup, "CREATE_RETRIES", default.create_attempts).max(1),
            max_frame_size: parse_or(&lookup, "MAX_FRAME_SIZE", default.max_frame_size).max(1),
        }
    }

    pub fn bind_address(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }
}

/// Loads `.env` from the working directory or its parents, if there is one.
pub fn load_env_file() -> Option<PathBuf> {
    dotenv::dotenv().ok()
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|err| {
            log::warn!("Ignoring {}={:?}: {}", key, raw, err);
            default
        }),
        None => default,
    }
}
