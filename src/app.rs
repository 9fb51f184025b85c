use color_eyre::Result;
use eyre::Context as _;
use std::sync::Arc;
use subreddit_stats_config::{
    Args,
    Config,
};
use subreddit_stats_http::create_router;
use subreddit_stats_tracker::{
    RedditSource,
    Registry,
    WorkerContext,
    WorkerSettings,
};
use tokio::net::TcpListener;

pub struct App {
    config: Config,
    registry: Registry,
}

impl App {
    pub fn new(args: Args) -> Result<Self> {
        let config = Config::new(args)?;
        config.validate()?;

        let source = RedditSource::new(&config)?;
        let context = WorkerContext::new(WorkerSettings::from(&config), Arc::new(source));

        Ok(Self {
            registry: Registry::new(context),
            config,
        })
    }

    /// Starts the workers and serves queries until Ctrl-C.
    pub async fn run(self) -> Result<()> {
        let history_dir = self.config.history_dir();
        std::fs::create_dir_all(&history_dir)
            .wrap_err_with(|| format!("Failed to create history directory {history_dir:?}"))?;

        self.registry.discover(&history_dir)?;
        for name in &self.config.subreddits {
            self.registry.track(name, &history_dir);
        }
        if self.registry.lookup(&self.config.default_subreddit).is_none() {
            warn!(name = %self.config.default_subreddit, "Default subreddit is not tracked");
        }

        let listener = TcpListener::bind(self.config.listen_address)
            .await
            .wrap_err_with(|| format!("Failed to listen on {}", self.config.listen_address))?;
        info!("listening on {}", listener.local_addr()?);

        let router = create_router(self.config.clone(), self.registry.clone());
        let served = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        self.registry.shutdown_all();
        served?;
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for the shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
