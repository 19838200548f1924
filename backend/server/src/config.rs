use std::{env, fmt::Display, fs::read_to_string, path::PathBuf, str::FromStr};

use tracing::{info, warn};

pub struct Config {
    pub port: u16,
    pub db_dir: PathBuf,
    pub static_dir: PathBuf,
    pub allowed_origin: String,
    pub openai_url: String,
    pub openai_model: String,
    pub openai_key: Option<String>,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("RUST_PORT", "5000"),
            db_dir: try_load("DB_DIR", "databases"),
            static_dir: try_load("STATIC_DIR", "static"),
            allowed_origin: try_load("FRONTEND_URL", "https://flashvocab.benclason.com"),
            openai_url: try_load("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            openai_model: try_load("OPENAI_MODEL", "gpt-4o-mini"),
            openai_key: read_secret("OPENAI_API_KEY"),
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}

/// Secrets come from the mounted secrets directory first, then the plain
/// environment. A missing secret only disables the feature that needs it.
fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            info!("Failed to read {secret_name} from file: {e}");
        })
        .or_else(|_| var(secret_name))
        .ok()
        .filter(|s| !s.is_empty())
}
