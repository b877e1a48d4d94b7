//! Client for the SMARD-style market data source.
//!
//! The upstream schema is only loosely specified: the chunk-id list and the
//! per-chunk point list each appear under one of several alternative keys, so
//! payloads are decoded to `serde_json::Value` and probed through an ordered
//! candidate list with a named schema-variant outcome.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use std::time::Duration;

use crate::domain::Resolution;

/// Opaque fetches against the market data source. The ingestion driver only
/// sees decoded payloads, so tests substitute canned ones.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Index of available chunk identifiers for (filter, region, resolution).
    async fn fetch_index(&self, filter: &str, region: &str, resolution: Resolution)
        -> Result<Value>;

    /// Points of one chunk, addressed by its index identifier.
    async fn fetch_chunk(
        &self,
        filter: &str,
        region: &str,
        resolution: Resolution,
        chunk: i64,
    ) -> Result<Value>;
}

#[derive(Clone)]
pub struct SmardClient {
    client: reqwest::Client,
    base_url: String,
}

impl SmardClient {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("energy-forecast-service/0.1"));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self { client, base_url })
    }

    async fn get_json(&self, url: String) -> Result<Value> {
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("market GET failed: {url}"))?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("market API error: HTTP {status} for {url}");
        }
        resp.json().await.context("market JSON parse failed")
    }
}

#[async_trait]
impl MarketDataSource for SmardClient {
    async fn fetch_index(
        &self,
        filter: &str,
        region: &str,
        resolution: Resolution,
    ) -> Result<Value> {
        let url = format!(
            "{}/chart_data/{filter}/{region}/index_{resolution}.json",
            self.base_url.trim_end_matches('/'),
        );
        self.get_json(url).await
    }

    async fn fetch_chunk(
        &self,
        filter: &str,
        region: &str,
        resolution: Resolution,
        chunk: i64,
    ) -> Result<Value> {
        let url = format!(
            "{}/chart_data/{filter}/{region}/{filter}_{region}_{resolution}_{chunk}.json",
            self.base_url.trim_end_matches('/'),
        );
        self.get_json(url).await
    }
}

/// Where the chunk-id list was found in an index payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSchema {
    Timestamps,
    Data,
    Values,
    BareList,
}

const INDEX_KEYS: [(&str, IndexSchema); 3] = [
    ("timestamps", IndexSchema::Timestamps),
    ("data", IndexSchema::Data),
    ("values", IndexSchema::Values),
];

const CHUNK_KEYS: [&str; 3] = ["series", "data", "values"];

/// Probe an index payload for its chunk-id list. `None` means no recognized
/// shape, which the driver reports as a skipped unit rather than swallowing.
pub fn probe_chunk_index(payload: &Value) -> Option<(IndexSchema, Vec<i64>)> {
    if let Some(map) = payload.as_object() {
        for (key, schema) in INDEX_KEYS {
            if let Some(list) = map.get(key).and_then(Value::as_array) {
                return Some((schema, chunk_ids(list)));
            }
        }
        return None;
    }
    payload
        .as_array()
        .map(|list| (IndexSchema::BareList, chunk_ids(list)))
}

/// Probe a chunk payload for its (epoch-ms, value) point list.
pub fn probe_chunk_points(payload: &Value) -> Option<Vec<(i64, Option<f64>)>> {
    let map = payload.as_object()?;
    let points = CHUNK_KEYS
        .iter()
        .find_map(|key| map.get(*key))
        .and_then(Value::as_array)?;
    Some(points.iter().filter_map(parse_point).collect())
}

fn chunk_ids(list: &[Value]) -> Vec<i64> {
    list.iter()
        .filter_map(|v| v.as_i64().or_else(|| v.as_str()?.parse().ok()))
        .collect()
}

fn parse_point(row: &Value) -> Option<(i64, Option<f64>)> {
    let pair = row.as_array()?;
    let ts_ms = pair.first()?.as_i64()?;
    let value = pair.get(1).and_then(Value::as_f64);
    Some((ts_ms, value))
}
