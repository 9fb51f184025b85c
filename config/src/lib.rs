#[macro_use]
extern crate tracing;

mod app_config;
mod args;

pub use app_config::{
    get_config_dir,
    get_data_dir,
    AppConfig,
};
pub use args::Args;
use eyre::{
    eyre,
    Result,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    net::SocketAddr,
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};

/// Placeholder substituted with the subreddit name in [`ApiConfig::url_template`].
pub const NAME_PLACEHOLDER: &str = "{name}";

/// Subreddit names are ASCII letters, digits, `_` and `-`. Anything else could change
/// the meaning of the API URL it is substituted into.
pub fn is_valid_subreddit_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiConfig {
    pub url_template: String,
    pub user_agent: String,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(flatten, skip_serializing)]
    pub app_config: AppConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_dir: Option<PathBuf>,
    pub listen_address: SocketAddr,
    pub default_subreddit: String,
    #[serde(default)]
    pub subreddits: Vec<String>,
    pub refresh_interval_ms: u64,
    pub history_max: usize,
    pub api: ApiConfig,
    #[serde(default)]
    pub verbose: bool,
}

const DEFAULT_CONFIG: &str = include_str!("default-config.yaml");

impl Default for Config {
    fn default() -> Self {
        let mut config: Self = serde_yml::from_str(DEFAULT_CONFIG).expect("Failed to parse default config");
        config.app_config = AppConfig {
            data_dir: get_data_dir(),
            config_dir: get_config_dir(),
        };
        config
    }
}

impl Config {
    pub fn new(args: Args) -> Result<Self, config::ConfigError> {
        Self::with_dirs(args, get_data_dir(), get_config_dir())
    }

    /// Layers the embedded defaults, an optional `config.yaml` inside `config_dir` and
    /// the command-line arguments, in that order.
    pub fn with_dirs(
        args: Args,
        data_dir: impl AsRef<Path>,
        config_dir: impl AsRef<Path>,
    ) -> Result<Self, config::ConfigError> {
        let data_dir = data_dir.as_ref();
        let config_dir = config_dir.as_ref();
        let mut builder = config::Config::builder()
            .set_default("data_dir", data_dir.display().to_string())?
            .set_default("config_dir", config_dir.display().to_string())?
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Yaml));

        let config_files = [("config.yaml", config::FileFormat::Yaml)];

        for (file, format) in &config_files {
            let source = config::File::from(config_dir.join(file))
                .format(*format)
                .required(false);
            builder = builder.add_source(source);
        }

        builder = builder.add_source(args);

        let cfg: Self = builder.build()?.try_deserialize()?;
        debug!(?cfg, "Configuration loaded");

        Ok(cfg)
    }

    pub fn data_dir(&self) -> &Path {
        &self.app_config.data_dir
    }

    /// Directory scanned for history files. Falls back to `<data_dir>/history`.
    pub fn history_dir(&self) -> PathBuf {
        self.history_dir
            .clone()
            .unwrap_or_else(|| self.app_config.data_dir.join("history"))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.api.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.api.read_timeout_ms)
    }

    /// The remote endpoint for one subreddit.
    pub fn api_url(&self, name: &str) -> Result<url::Url> {
        if !is_valid_subreddit_name(name) {
            return Err(eyre!("Invalid subreddit name {name:?}"));
        }
        let text = self.api.url_template.replace(NAME_PLACEHOLDER, name);
        url::Url::parse(&text).map_err(|err| eyre!("Invalid API URL {text:?}: {err}"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.history_max == 0 {
            return Err(eyre!("history_max must be greater than zero"));
        }
        if self.refresh_interval_ms == 0 {
            return Err(eyre!("refresh_interval_ms must be greater than zero"));
        }
        if !self.api.url_template.contains(NAME_PLACEHOLDER) {
            return Err(eyre!(
                "api.url_template {:?} does not contain {NAME_PLACEHOLDER}",
                self.api.url_template
            ));
        }
        self.api_url(&self.default_subreddit)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use temp_dir::TempDir;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.default_subreddit, "arduino");
        assert_eq!(config.subreddits, vec!["arduino".to_string()]);
        assert_eq!(config.refresh_interval(), Duration::from_secs(60));
        assert_eq!(config.history_max, 1460);
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.read_timeout(), Duration::from_secs(5));
        assert_eq!(config.api.user_agent, "statsMon/0.0.1");
        assert_eq!(config.history_dir(), config.data_dir().join("history"));
        config.validate().unwrap();
    }

    #[test]
    fn api_url_substitutes_name() {
        let config = Config::default();
        assert_eq!(
            config.api_url("Arduino").unwrap().as_str(),
            "https://www.reddit.com/r/Arduino/about.json"
        );
    }

    #[test]
    fn api_url_rejects_names_that_alter_the_url() {
        let config = Config::default();
        for name in ["foo?x", "foo#x", "../about", "a b", ""] {
            assert!(config.api_url(name).is_err(), "{name:?} was accepted");
        }
        assert!(config.api_url("esp_32-dev").is_ok());
    }

    #[test]
    fn validate_rejects_template_without_placeholder() {
        let mut config = Config::default();
        config.api.url_template = "https://www.reddit.com/r/arduino/about.json".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.history_max = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn layers_file_and_args() {
        let data_dir = TempDir::new().unwrap();
        let config_dir = TempDir::new().unwrap();
        std::fs::write(
            config_dir.path().join("config.yaml"),
            "refresh_interval_ms: 1000\nsubreddits: [arduino, esp32]\n",
        )
        .unwrap();

        let args = Args {
            history_dir: Some(PathBuf::from("/var/lib/subreddit-stats")),
            refresh_interval_ms: Some(2500),
            ..Default::default()
        };
        let config = Config::with_dirs(args, data_dir.path(), config_dir.path()).unwrap();

        assert_eq!(config.refresh_interval_ms, 2500);
        assert_eq!(config.subreddits, vec!["arduino".to_string(), "esp32".to_string()]);
        assert_eq!(config.history_dir(), PathBuf::from("/var/lib/subreddit-stats"));
        assert_eq!(config.data_dir(), data_dir.path());
        assert_eq!(config.history_max, 1460);
    }
}
