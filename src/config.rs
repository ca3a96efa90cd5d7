//! Service configuration
//!
//! Every recognized environment variable is read exactly once at boot; the
//! resulting value is immutable and passed explicitly to the components that
//! need it.

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Source URL used when `MODEL_URL` is not set.
pub const DEFAULT_MODEL_URL: &str =
    "https://huggingface.co/Qwen/Qwen2.5-3B-Instruct-GGUF/resolve/main/qwen2.5-3b-instruct-q4_k_m.gguf";

/// File name of the default model artifact.
pub const DEFAULT_MODEL_FILENAME: &str = "qwen2.5-3b-instruct-q4_k_m.gguf";

const DEFAULT_N_CTX: u32 = 2048;
const DEFAULT_N_THREADS: i32 = 1;
const DEFAULT_PORT: u16 = 8080;

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Local model override; wins only if the file actually exists
    pub local_model_path: Option<String>,
    /// Configured model path, existing or not
    pub model_path: Option<String>,
    /// URL the artifact is fetched from when absent
    pub model_url: String,
    /// Context window size
    pub n_ctx: u32,
    /// Number of inference threads
    pub n_threads: i32,
    /// Listen port
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            local_model_path: None,
            model_path: None,
            model_url: DEFAULT_MODEL_URL.to_string(),
            n_ctx: DEFAULT_N_CTX,
            n_threads: DEFAULT_N_THREADS,
            port: DEFAULT_PORT,
        }
    }
}

impl Config {
    /// Read configuration from the environment.
    pub fn from_env() -> Self {
        Self {
            local_model_path: env_nonempty("LOCAL_MODEL_PATH"),
            model_path: env_nonempty("MODEL_PATH"),
            model_url: env_nonempty("MODEL_URL").unwrap_or_else(|| DEFAULT_MODEL_URL.to_string()),
            n_ctx: parse_or_default("N_CTX", env_nonempty("N_CTX"), DEFAULT_N_CTX),
            n_threads: parse_or_default("N_THREADS", env_nonempty("N_THREADS"), DEFAULT_N_THREADS),
            port: parse_or_default("PORT", env_nonempty("PORT"), DEFAULT_PORT),
        }
    }
}

/// Read an environment variable, treating empty/whitespace values as unset
fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a numeric variable, falling back to the default instead of aborting boot
fn parse_or_default<T>(name: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr + Display + Copy,
{
    match raw {
        None => default,
        Some(s) => match s.parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Ignoring unparsable {}={:?}, using {}", name, s, default);
                default
            }
        },
    }
}
