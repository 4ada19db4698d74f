use std::path::PathBuf;
use std::time::Duration;

/// Fallback comparison service settings. Present only when a service URL is
/// configured; without one the daemon runs on the local model alone.
#[derive(Clone)]
pub struct FallbackConfig {
    pub base_url: String,
    pub api_key: String,
    pub api_secret: String,
    pub timeout: Duration,
}

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Listen address for the HTTP gateway.
    pub listen_addr: String,
    /// Local working directory (dataset cache, model cache).
    pub data_dir: PathBuf,
    /// Root of the mirror volume the filesystem store backend writes to.
    pub store_root: PathBuf,
    /// LBPH distance below which a probe face is accepted.
    pub distance_threshold: f32,
    /// Fallback similarity above which the comparison service's verdict is
    /// accepted (its own 0–100 scale).
    pub fallback_threshold: f32,
    /// Fallback comparison service, if configured.
    pub fallback: Option<FallbackConfig>,
    /// Whether training augments crops with flips and rotations.
    pub augment: bool,
    /// Bound on one enrollment/training/recognition request end to end.
    pub request_timeout: Duration,
}

impl Config {
    /// Load configuration from `FACEGATE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("FACEGATE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let base = std::env::var("XDG_DATA_HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| {
                        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                        PathBuf::from(home).join(".local/share")
                    });
                base.join("facegate")
            });

        let store_root = std::env::var("FACEGATE_STORE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("mirror"));

        let fallback = std::env::var("FACEGATE_FALLBACK_URL")
            .ok()
            .filter(|url| !url.is_empty())
            .map(|base_url| FallbackConfig {
                base_url,
                api_key: std::env::var("FACEGATE_FALLBACK_KEY").unwrap_or_default(),
                api_secret: std::env::var("FACEGATE_FALLBACK_SECRET").unwrap_or_default(),
                timeout: Duration::from_secs(env_u64("FACEGATE_FALLBACK_TIMEOUT_SECS", 10)),
            });

        Self {
            listen_addr: std::env::var("FACEGATE_LISTEN_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:8090".to_string()),
            data_dir,
            store_root,
            distance_threshold: env_f32("FACEGATE_THRESHOLD", 50.0),
            fallback_threshold: env_f32("FACEGATE_FALLBACK_THRESHOLD", 80.0),
            fallback,
            augment: std::env::var("FACEGATE_AUGMENT")
                .map(|v| v != "0")
                .unwrap_or(true),
            request_timeout: Duration::from_secs(env_u64("FACEGATE_REQUEST_TIMEOUT_SECS", 30)),
        }
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
