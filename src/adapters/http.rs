use crate::domain::model::SearchRequest;
use crate::domain::ports::SearchBackend;
use crate::utils::error::{CatalogError, Result};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;

/// Envelope fields some search endpoints wrap their result list in.
const ENVELOPE_KEYS: [&str; 4] = ["products", "items", "results", "data"];

/// Remote search over plain HTTP GET with the request encoded as query parameters.
pub struct HttpSearchBackend {
    client: Client,
    endpoint: String,
    headers: HashMap<String, String>,
    timeout: Option<Duration>,
}

impl HttpSearchBackend {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            headers: HashMap::new(),
            timeout: None,
        }
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

pub fn query_params(request: &SearchRequest) -> Vec<(&'static str, String)> {
    let mut params = vec![("query", request.query.clone())];
    let ctx = &request.context;

    if let Some(category) = &ctx.category {
        params.push(("category", category.clone()));
    }
    if let Some(subcategory) = &ctx.subcategory {
        params.push(("subcategory", subcategory.clone()));
    }
    if let Some(min_price) = ctx.min_price {
        params.push(("minPrice", min_price.to_string()));
    }
    if let Some(max_price) = ctx.max_price {
        params.push(("maxPrice", max_price.to_string()));
    }
    if let Some(status) = &ctx.status {
        params.push(("status", status.clone()));
    }
    params.push(("limit", request.limit.to_string()));
    params
}

/// Pulls the record list out of a response body: a bare array, an array under
/// one of the envelope keys, or a single record object.
pub fn extract_records(body: serde_json::Value) -> Vec<serde_json::Value> {
    match body {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut obj) => {
            for key in ENVELOPE_KEYS {
                if let Some(serde_json::Value::Array(items)) = obj.remove(key) {
                    return items;
                }
            }
            if obj.contains_key("id") || obj.contains_key("_id") {
                vec![serde_json::Value::Object(obj)]
            } else {
                tracing::warn!("Search response has no recognizable record list");
                Vec::new()
            }
        }
        _ => {
            tracing::warn!("Search response is neither a list nor an object");
            Vec::new()
        }
    }
}

#[async_trait::async_trait]
impl SearchBackend for HttpSearchBackend {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<serde_json::Value>> {
        let mut builder = self.client.get(&self.endpoint).query(&query_params(request));

        for (key, value) in &self.headers {
            builder = builder.header(key, value);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        tracing::debug!("Searching {} for '{}'", self.endpoint, request.query);
        let response = builder.send().await?;
        let status = response.status();
        tracing::debug!("Search response status: {}", status);

        if !status.is_success() {
            return Err(CatalogError::RemoteStatus {
                status: status.as_u16(),
                url: self.endpoint.clone(),
            });
        }

        let body: serde_json::Value = response.json().await?;
        let mut records = extract_records(body);
        records.truncate(request.limit);
        Ok(records)
    }
}
