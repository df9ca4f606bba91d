use std::path::PathBuf;

use facet_core::oracle::FACE_MESH_MODEL;

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Optional TOML file overriding analyzer thresholds.
    pub tuning_file: Option<PathBuf>,
    /// Budget for an oracle-enabled analysis before falling back to heuristics.
    pub oracle_timeout_ms: u64,
    /// Number of analyses kept in the in-memory history.
    pub history_limit: usize,
    /// Whether to load the learned oracles at all.
    pub use_oracles: bool,
    /// Analyses allowed to run at once, including ones abandoned by the timeout.
    pub max_concurrent: usize,
}

impl Config {
    /// Load configuration from `FACET_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("FACET_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_dir().join("models"));

        Self {
            model_dir,
            tuning_file: std::env::var("FACET_TUNING_FILE").ok().map(PathBuf::from),
            oracle_timeout_ms: env_u64("FACET_ORACLE_TIMEOUT_MS", 5_000),
            history_limit: env_usize("FACET_HISTORY_LIMIT", 100),
            use_oracles: env_bool("FACET_USE_ORACLES", true),
            max_concurrent: env_usize("FACET_MAX_CONCURRENT", default_concurrency()),
        }
    }

    /// Path to the face-mesh landmark model.
    pub fn face_mesh_model_path(&self) -> PathBuf {
        self.model_dir.join(FACE_MESH_MODEL)
    }
}

fn default_data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facet")
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(2)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key).map(|v| v != "0").unwrap_or(default)
}
