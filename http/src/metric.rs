use crate::{
    error::AppError,
    router::AppState,
};
use axum::{
    extract::{
        rejection::QueryRejection,
        Query,
        State,
    },
    Json,
};
use serde::Deserialize;
use subreddit_stats_tracker::MetricRecord;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct MetricQuery {
    #[serde(rename = "subName")]
    sub_name: Option<String>,
    /// Presence is enough, `?history` and `?history=1` both include it.
    history: Option<String>,
}

pub(crate) async fn handler(
    State(state): State<AppState>,
    query: Result<Query<MetricQuery>, QueryRejection>,
) -> Result<Json<MetricRecord>, AppError> {
    let Query(query) = query?;
    let name = query
        .sub_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(state.config.default_subreddit.as_str());

    let Some(record) = state.registry.lookup(name) else {
        debug!(%name, "Metric requested for untracked subreddit");
        return Ok(Json(MetricRecord::no_data()));
    };

    if query.history.is_some() {
        Ok(Json(record))
    } else {
        Ok(Json(record.without_history()))
    }
}
