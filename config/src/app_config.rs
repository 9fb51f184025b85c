use directories::ProjectDirs;
use serde::Deserialize;
use std::{
    env,
    path::{
        Path,
        PathBuf,
    },
};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub config_dir: PathBuf,
}

lazy_static::lazy_static! {
    static ref DATA_FOLDER: Option<PathBuf> = env::var(override_variable("DATA")).ok().map(PathBuf::from);
    static ref CONFIG_FOLDER: Option<PathBuf> = env::var(override_variable("CONFIG")).ok().map(PathBuf::from);
}

/// `SUBREDDIT_STATS_CONFIG_<KIND>`, the environment variable replacing a directory.
fn override_variable(kind: &str) -> String {
    format!("{}_{kind}", env!("CARGO_CRATE_NAME").to_uppercase())
}

pub fn get_data_dir() -> PathBuf {
    resolve_dir(DATA_FOLDER.as_deref(), ProjectDirs::data_local_dir, ".data")
}

pub fn get_config_dir() -> PathBuf {
    resolve_dir(CONFIG_FOLDER.as_deref(), ProjectDirs::config_local_dir, ".config")
}

/// The override if set, else the platform directory, else `./<fallback>`.
fn resolve_dir(overridden: Option<&Path>, platform_dir: fn(&ProjectDirs) -> &Path, fallback: &str) -> PathBuf {
    overridden
        .map(Path::to_path_buf)
        .or_else(|| ProjectDirs::from("video", "hyper", "subreddit-stats").map(|dirs| platform_dir(&dirs).to_path_buf()))
        .unwrap_or_else(|| PathBuf::from(".").join(fallback))
}
