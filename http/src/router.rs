use crate::{
    metric::handler as metric,
    status::handler as status,
};
use axum::{
    routing::get,
    Router,
};
use subreddit_stats_config::Config;
use subreddit_stats_tracker::Registry;

#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Config,
    pub registry: Registry,
}

pub fn create_router(config: Config, registry: Registry) -> Router {
    let state = AppState { config, registry };

    Router::new()
        .route("/healthz", get(healthz))
        .route("/metric", get(metric))
        .route("/GetSubRedditMetric", get(metric))
        .route("/status", get(status))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "Hello!"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::failing_state;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn metric_is_served_under_both_paths() {
        let state = failing_state();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, create_router(state.config, state.registry)).await });

        for path in ["metric", "GetSubRedditMetric"] {
            let reply = reqwest::get(format!("http://{address}/{path}?subName=esp8266"))
                .await
                .unwrap()
                .json::<serde_json::Value>()
                .await
                .unwrap();
            assert_eq!(
                reply,
                json!({ "name": "No Data", "subscribers": -1, "activeUsers": -1, "subscriberHistory": {} })
            );
        }
    }
}
