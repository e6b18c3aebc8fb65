//! REST implementation of [`RemoteGateway`]

use std::marker::PhantomData;
use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

use super::{RemoteError, RemoteGateway, RemoteRecord};
use crate::models::{CollectionItem, RecordId};
use crate::util::{compact_text, is_http_url, normalize_text_option};

struct Endpoint {
    base: Url,
    client: Client,
}

/// Gateway talking to the Tend REST API.
///
/// An unconfigured gateway fails every call with [`RemoteError::NotConfigured`],
/// which leaves the engine working purely offline.
pub struct HttpGateway<T> {
    endpoint: Option<Endpoint>,
    _item: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for HttpGateway<T> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpGateway")
            .field(
                "base",
                &self.endpoint.as_ref().map(|endpoint| endpoint.base.as_str()),
            )
            .finish()
    }
}

impl<T: CollectionItem> HttpGateway<T> {
    /// Create a gateway rooted at `base_url` (e.g. `https://api.example.com/v1`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let base = normalize_base_url(base_url.into())?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: Some(Endpoint { base, client }),
            _item: PhantomData,
        })
    }

    /// Gateway with no server behind it.
    pub const fn unconfigured() -> Self {
        Self {
            endpoint: None,
            _item: PhantomData,
        }
    }

    pub const fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }

    fn endpoint(&self) -> Result<&Endpoint, RemoteError> {
        self.endpoint.as_ref().ok_or(RemoteError::NotConfigured)
    }

    fn url(base: &Url, id: Option<&RecordId>) -> Result<Url, RemoteError> {
        let mut url = base.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                RemoteError::InvalidConfiguration("base URL cannot carry a path".to_string())
            })?;
            segments.pop_if_empty().push(T::REMOTE_PATH);
            if let Some(id) = id {
                segments.push(id.as_str());
            }
        }
        Ok(url)
    }
}

impl<T: CollectionItem> RemoteGateway<T> for HttpGateway<T> {
    async fn create(&self, record: &RemoteRecord<T>) -> Result<RemoteRecord<T>, RemoteError> {
        let endpoint = self.endpoint()?;
        let response = endpoint
            .client
            .post(Self::url(&endpoint.base, None)?)
            .header("Accept", "application/json")
            .json(record)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api(parse_api_error(status, &body)));
        }

        let body = response.text().await.unwrap_or_default();
        Ok(stored_record(record, &body))
    }

    async fn list(&self) -> Result<Vec<RemoteRecord<T>>, RemoteError> {
        let endpoint = self.endpoint()?;
        let response = endpoint
            .client
            .get(Self::url(&endpoint.base, None)?)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api(parse_api_error(status, &body)));
        }

        let values = response.json::<Vec<serde_json::Value>>().await?;
        let mut records = Vec::with_capacity(values.len());
        for value in values {
            match serde_json::from_value::<RemoteRecord<T>>(value) {
                Ok(record) => records.push(record),
                Err(error) => {
                    tracing::warn!(collection = T::LABEL, "Skipping malformed server record: {error}");
                }
            }
        }
        Ok(records)
    }

    async fn update(&self, id: &RecordId, patch: &T::Patch) -> Result<(), RemoteError> {
        let endpoint = self.endpoint()?;
        let response = endpoint
            .client
            .put(Self::url(&endpoint.base, Some(id))?)
            .header("Accept", "application/json")
            .json(patch)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api(parse_api_error(status, &body)));
        }
        Ok(())
    }

    async fn delete(&self, id: &RecordId) -> Result<(), RemoteError> {
        let endpoint = self.endpoint()?;
        let response = endpoint
            .client
            .delete(Self::url(&endpoint.base, Some(id))?)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::Api(parse_api_error(status, &body)))
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_base_url(raw: String) -> Result<Url, RemoteError> {
    let endpoint = normalize_text_option(Some(raw)).ok_or_else(|| {
        RemoteError::InvalidConfiguration("API base URL must not be empty".to_string())
    })?;
    if !is_http_url(&endpoint) {
        return Err(RemoteError::InvalidConfiguration(
            "API base URL must include http:// or https://".to_string(),
        ));
    }
    Url::parse(endpoint.trim_end_matches('/'))
        .map_err(|error| RemoteError::InvalidConfiguration(format!("invalid API base URL: {error}")))
}

/// Record echoed by a successful create. Any 2xx acknowledges the push, so a
/// body that does not parse falls back to what was sent.
fn stored_record<T: CollectionItem>(sent: &RemoteRecord<T>, body: &str) -> RemoteRecord<T> {
    match serde_json::from_str(body) {
        Ok(stored) => stored,
        Err(error) => {
            tracing::warn!(
                collection = T::LABEL,
                id = %sent.client_id,
                "Create acknowledged with unreadable body ({error}): {}",
                compact_text(body)
            );
            sent.clone()
        }
    }
}
