use crate::router::AppState;
use eyre::{
    eyre,
    Result,
};
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    time::Duration,
};
use subreddit_stats_config::Config;
use subreddit_stats_tracker::{
    source::RemoteReply,
    Registry,
    RemoteMetricSource,
    WorkerContext,
    WorkerSettings,
};
use temp_dir::TempDir;

#[derive(Debug)]
struct UnreachableSource;

impl RemoteMetricSource for UnreachableSource {
    fn fetch<'a>(&'a self, name: &'a str) -> Pin<Box<dyn Future<Output = Result<RemoteReply>> + Send + 'a>> {
        Box::pin(async move { Err(eyre!("{name} is unreachable")) })
    }
}

/// State without any tracked subreddit.
pub(crate) fn failing_state() -> AppState {
    let context = WorkerContext::new(
        WorkerSettings {
            refresh_interval: Duration::from_secs(60),
            history_max: 1460,
        },
        Arc::new(UnreachableSource),
    );
    AppState {
        config: Config::default(),
        registry: Registry::new(context),
    }
}

/// State tracking `Arduino` with two days of history. Must be called within a runtime.
pub(crate) fn app_state() -> (TempDir, AppState) {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("r-Arduino-subscribers.txt"),
        "2022-08-23,100\n2022-08-24,105\n",
    )
    .unwrap();

    let state = failing_state();
    state.registry.discover(dir.path()).unwrap();
    (dir, state)
}
