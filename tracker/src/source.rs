use crate::record::SENTINEL;
use eyre::{
    Context as _,
    Result,
};
use reqwest::Client as HttpClient;
use serde_json::Value;
use std::{
    fmt,
    future::Future,
    pin::Pin,
};
use subreddit_stats_config::Config;

/// Raw reply of the remote API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteReply {
    pub status: u16,
    pub body: String,
}

impl RemoteReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Where the popularity metrics of a subreddit come from.
///
/// Implementations do not retry; a failed fetch is reported to the worker which
/// records it and tries again on its next cycle.
pub trait RemoteMetricSource: fmt::Debug + Send + Sync {
    fn fetch<'a>(&'a self, name: &'a str) -> Pin<Box<dyn Future<Output = Result<RemoteReply>> + Send + 'a>>;
}

/// Reads `about.json` of a subreddit from reddit.
#[derive(Debug, Clone)]
pub struct RedditSource {
    config: Config,
    http_client: HttpClient,
}

impl RedditSource {
    pub fn new(config: &Config) -> Result<Self> {
        let http_client = HttpClient::builder()
            .user_agent(config.api.user_agent.clone())
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.read_timeout())
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            config: config.clone(),
            http_client,
        })
    }
}

impl RemoteMetricSource for RedditSource {
    fn fetch<'a>(&'a self, name: &'a str) -> Pin<Box<dyn Future<Output = Result<RemoteReply>> + Send + 'a>> {
        Box::pin(async move {
            let url = self.config.api_url(name)?;
            trace!(%url, "Requesting subreddit metrics");

            let response = self
                .http_client
                .get(url.clone())
                .send()
                .await
                .wrap_err_with(|| format!("request to {url} failed"))?;
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .wrap_err_with(|| format!("reading the reply of {url} failed"))?;

            Ok(RemoteReply { status, body })
        })
    }
}

/// Counts extracted from an `about.json` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AboutCounts {
    pub subscribers: i64,
    pub active_users: i64,
}

/// Parses an `about.json` body.
///
/// The body has to be a JSON object. `data.subscribers` and `data.active_user_count`
/// fall back to [`SENTINEL`] when they are missing, not numeric, or when `data`
/// itself is not an object.
pub fn parse_about_reply(body: &str) -> Result<AboutCounts, serde_json::Error> {
    let document = serde_json::from_str::<serde_json::Map<String, Value>>(body)?;
    let data = document.get("data");
    if !matches!(data, Some(Value::Object(_))) {
        warn!(?data, "Reply has no data object");
    }

    Ok(AboutCounts {
        subscribers: count_from(data, "subscribers"),
        active_users: count_from(data, "active_user_count"),
    })
}

fn count_from(data: Option<&Value>, key: &str) -> i64 {
    let Some(Value::Object(data)) = data else {
        return SENTINEL;
    };
    match data.get(key) {
        Some(Value::Number(number)) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|value| value as i64))
            .unwrap_or(SENTINEL),
        _ => SENTINEL,
    }
}
