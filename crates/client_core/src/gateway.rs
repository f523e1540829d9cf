//! Remote Duty Gateway: the four REST calls against the `duties` collection.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Duty, DutyDraft, DutyKey},
    error::ApiError,
};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::config::Settings;

const COLLECTION: &str = "duties";

/// How a remote call failed. Callers treat every kind as a failed
/// operation; the split only helps with messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteFailureKind {
    Network,
    Timeout,
    Client,
    Server,
    Decode,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("failed to reach {url}: {source}")]
    Connect {
        url: String,
        source: reqwest::Error,
    },
    #[error("{url} returned {status}: {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },
    #[error("invalid response body from {url}: {reason}")]
    Decode { url: String, reason: String },
}

impl GatewayError {
    pub fn kind(&self) -> RemoteFailureKind {
        match self {
            GatewayError::Timeout { .. } => RemoteFailureKind::Timeout,
            GatewayError::Connect { .. } => RemoteFailureKind::Network,
            GatewayError::Status { status, .. } if (400..500).contains(status) => {
                RemoteFailureKind::Client
            }
            GatewayError::Status { .. } => RemoteFailureKind::Server,
            GatewayError::Decode { .. } => RemoteFailureKind::Decode,
        }
    }

    fn from_transport(url: &Url, source: reqwest::Error) -> Self {
        let url = url.to_string();
        if source.is_timeout() {
            GatewayError::Timeout { url }
        } else if source.is_decode() {
            GatewayError::Decode {
                url,
                reason: source.to_string(),
            }
        } else {
            GatewayError::Connect { url, source }
        }
    }

    fn from_status(url: &Url, status: StatusCode, body: &str) -> Self {
        let message = ApiError::from_body(body)
            .map(|api| api.message)
            .or_else(|| {
                let trimmed = body.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_else(|| "request failed".to_string());
        GatewayError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
pub trait DutyGateway: Send + Sync {
    async fn list(&self) -> Result<Vec<Duty>, GatewayError>;
    async fn create(&self, draft: &DutyDraft) -> Result<Duty, GatewayError>;
    async fn update(&self, key: &DutyKey, duty: &Duty) -> Result<Duty, GatewayError>;
    async fn delete(&self, key: &DutyKey) -> Result<Duty, GatewayError>;
}

pub struct HttpDutyGateway {
    http: Client,
    collection_url: Url,
}

impl HttpDutyGateway {
    pub fn new(settings: &Settings) -> Result<Self> {
        let mut collection_url = Url::parse(&settings.base_url)
            .with_context(|| format!("invalid duties base url '{}'", settings.base_url))?;
        if collection_url.cannot_be_a_base() {
            bail!("duties base url '{}' cannot carry a path", settings.base_url);
        }
        if let Ok(mut segments) = collection_url.path_segments_mut() {
            segments.pop_if_empty().push(COLLECTION);
        }

        let http = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .context("failed to build duties http client")?;

        Ok(Self {
            http,
            collection_url,
        })
    }

    pub fn collection_url(&self) -> &Url {
        &self.collection_url
    }

    fn item_url(&self, key: &DutyKey) -> Url {
        let mut url = self.collection_url.clone();
        // `new` rejected cannot-be-a-base urls, so this always succeeds.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(key.as_str());
        }
        url
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: &'static str,
        url: Url,
        request: RequestBuilder,
    ) -> Result<T, GatewayError> {
        debug!(method, %url, "duty gateway request");
        let response = request
            .send()
            .await
            .map_err(|source| GatewayError::from_transport(&url, source))
            .inspect_err(|error| warn!(method, %url, %error, "duty gateway transport failure"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = GatewayError::from_status(&url, status, &body);
            warn!(method, %url, status = status.as_u16(), %error, "duty gateway request rejected");
            return Err(error);
        }

        response
            .json::<T>()
            .await
            .map_err(|source| GatewayError::from_transport(&url, source))
            .inspect_err(|error| warn!(method, %url, %error, "duty gateway decode failure"))
    }
}

#[async_trait]
impl DutyGateway for HttpDutyGateway {
    async fn list(&self) -> Result<Vec<Duty>, GatewayError> {
        let url = self.collection_url.clone();
        let request = self.http.get(url.clone());
        self.execute("GET", url, request).await
    }

    async fn create(&self, draft: &DutyDraft) -> Result<Duty, GatewayError> {
        let url = self.collection_url.clone();
        let request = self.http.post(url.clone()).json(draft);
        self.execute("POST", url, request).await
    }

    async fn update(&self, key: &DutyKey, duty: &Duty) -> Result<Duty, GatewayError> {
        let url = self.item_url(key);
        let request = self.http.put(url.clone()).json(duty);
        self.execute("PUT", url, request).await
    }

    async fn delete(&self, key: &DutyKey) -> Result<Duty, GatewayError> {
        let url = self.item_url(key);
        let request = self.http.delete(url.clone());
        self.execute("DELETE", url, request).await
    }
}

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;
