use crate::router::AppState;
use axum::{
    extract::State,
    Json,
};
use serde::Serialize;
use std::path::PathBuf;
use subreddit_stats_tracker::WorkerStatus;

#[derive(Debug, Serialize)]
pub(crate) struct StatusReply {
    version: &'static str,
    default_subreddit: String,
    history_dir: PathBuf,
    workers: Vec<WorkerStatus>,
}

pub(crate) async fn handler(State(state): State<AppState>) -> Json<StatusReply> {
    Json(StatusReply {
        version: env!("CARGO_PKG_VERSION"),
        default_subreddit: state.config.default_subreddit.clone(),
        history_dir: state.config.history_dir(),
        workers: state.registry.status(),
    })
}
