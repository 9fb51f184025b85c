use clap::Parser;
use std::{
    net::SocketAddr,
    path::PathBuf,
};

/// Subreddit stats service
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version = version(), about, long_about = None)]
pub struct Args {
    /// Directory holding the `r-<name>-subscribers.txt` history files.
    #[clap(long, value_name = "DIR", env = "SUBREDDIT_STATS_HISTORY_DIR")]
    pub history_dir: Option<PathBuf>,

    /// Address the HTTP server listens on.
    #[clap(long, value_name = "ADDR", env = "SUBREDDIT_STATS_LISTEN_ADDRESS")]
    pub listen_address: Option<SocketAddr>,

    /// Subreddit to track even if no history file exists yet. Can be repeated.
    #[clap(long = "subreddit", value_name = "NAME")]
    pub subreddits: Vec<String>,

    /// Milliseconds between two polls of the same subreddit.
    #[clap(long, value_name = "MS")]
    pub refresh_interval_ms: Option<u64>,

    /// Enables debug logging.
    #[clap(long = "verbose", action)]
    pub verbose: bool,
}

mod config_ext {
    use super::*;
    use config::{
        Map,
        Source,
        Value,
    };
    use std::collections::HashMap;

    impl Source for Args {
        fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
            Box::new((*self).clone())
        }

        fn collect(&self) -> Result<Map<String, Value>, config::ConfigError> {
            let mut cache = HashMap::<String, Value>::new();
            if let Some(history_dir) = &self.history_dir {
                cache.insert("history_dir".to_string(), history_dir.display().to_string().into());
            }
            if let Some(listen_address) = &self.listen_address {
                cache.insert("listen_address".to_string(), listen_address.to_string().into());
            }
            if !self.subreddits.is_empty() {
                cache.insert("subreddits".to_string(), self.subreddits.clone().into());
            }
            if let Some(interval) = self.refresh_interval_ms {
                cache.insert("refresh_interval_ms".to_string(), interval.into());
            }
            if self.verbose {
                cache.insert("verbose".to_string(), true.into());
            }
            Ok(cache)
        }
    }
}

pub fn version() -> String {
    let author = clap::crate_authors!();
    let config_dir_path = crate::get_config_dir().display().to_string();
    let data_dir_path = crate::get_data_dir().display().to_string();

    format!(
        "\
Authors: {author}

Config directory: {config_dir_path}
Data directory: {data_dir_path}"
    )
}
