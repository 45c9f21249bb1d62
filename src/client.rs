//! HTTP implementation of the core [`Backend`] trait.
//!
//! Issues signed `GET {base}/indicators` and `GET {base}/groups` requests
//! and decodes the `{ "data": [...], "count": N, "status": "..." }`
//! envelope. Detail lookups use `GET {base}/{kind}/{id}`, asking for
//! `associatedGroups` and `associatedIndicators` as extra fields when
//! listing associations. HTTP statuses are mapped onto [`BackendError`]:
//!
//! | Status | Error |
//! |--------|-------|
//! | 401, 403 | `Unauthorized` |
//! | 404 | `NotFound` |
//! | 429 | `RateLimited` |
//! | 400, 422 | `Validation(message)` |
//! | other non-2xx | `Other(code)` |
//!
//! Transport failures and undecodable bodies become `Network`. Nothing is
//! retried here.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use tc_search_core::backend::{Backend, BackendError, FetchPage, FetchParams};
use tc_search_core::models::{Association, Associations, RawItem, RecordKind};

use crate::auth::Credentials;
use crate::config::Config;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Vec<RawItem>,
    #[serde(default)]
    count: Option<u64>,
    #[serde(default)]
    #[allow(dead_code)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItemEnvelope<T> {
    data: T,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssociatedFields {
    #[serde(default)]
    associated_groups: AssociationList,
    #[serde(default)]
    associated_indicators: AssociationList,
}

#[derive(Debug, Default, Deserialize)]
struct AssociationList {
    #[serde(default)]
    data: Vec<RawAssociation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAssociation {
    #[serde(default)]
    id: i64,
    #[serde(rename = "type", default)]
    type_name: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    owner_name: Option<String>,
}

impl RawAssociation {
    fn into_association(self, kind: RecordKind) -> Association {
        let display_value = match kind {
            RecordKind::Indicator => self.summary.or(self.name),
            RecordKind::Group => self.name.or(self.summary),
        }
        .unwrap_or_default();
        Association {
            id: self.id,
            kind,
            type_name: self.type_name,
            display_value,
            owner_name: self.owner_name.unwrap_or_default(),
        }
    }
}

impl From<AssociatedFields> for Associations {
    fn from(fields: AssociatedFields) -> Self {
        Associations {
            groups: fields
                .associated_groups
                .data
                .into_iter()
                .map(|a| a.into_association(RecordKind::Group))
                .collect(),
            indicators: fields
                .associated_indicators
                .data
                .into_iter()
                .map(|a| a.into_association(RecordKind::Indicator))
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Signed HTTP client for the threat-intelligence API.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
}

impl HttpBackend {
    pub fn new(base_url: &str, credentials: Credentials, timeout: Duration) -> Result<Self> {
        let mut base_url =
            Url::parse(base_url).with_context(|| format!("Invalid API base URL: {}", base_url))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url,
            credentials,
        })
    }

    /// Build a client from configuration, checking credentials first.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.require_credentials()?;
        Self::new(
            &config.base_url()?,
            Credentials::new(&config.api.access_id, &config.api.secret_key),
            Duration::from_secs(config.api.timeout_secs),
        )
    }

    /// Full request URL for `params`, query string included.
    pub fn request_url(&self, params: &FetchParams<'_>) -> Result<Url, BackendError> {
        let mut url = self
            .base_url
            .join(params.kind.endpoint())
            .map_err(|e| BackendError::Network(e.to_string()))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("tql", params.query)
                .append_pair("resultStart", &params.result_start.to_string())
                .append_pair("resultLimit", &params.result_limit.to_string());
            if let Some(owner) = params.owner {
                query.append_pair("owner", owner);
            }
            if params.include_tags {
                query.append_pair("fields", "tags");
            }
        }
        Ok(url)
    }

    /// URL of one record, with each of `fields` requested as an extra field.
    pub fn detail_url(
        &self,
        kind: RecordKind,
        id: i64,
        fields: &[&str],
    ) -> Result<Url, BackendError> {
        let mut url = self
            .base_url
            .join(&format!("{}/{}", kind.endpoint(), id))
            .map_err(|e| BackendError::Network(e.to_string()))?;
        if !fields.is_empty() {
            let mut query = url.query_pairs_mut();
            for field in fields {
                query.append_pair("fields", field);
            }
        }
        Ok(url)
    }

    /// Signed GET of `url`, decoding a success body as `T`.
    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, BackendError> {
        let headers = self.credentials.sign(url.path(), url.query(), "GET");
        debug!(url = %url, "GET");

        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .header("Timestamp", &headers.timestamp)
            .header("Authorization", &headers.authorization)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        if !status.is_success() {
            debug!(status = status.as_u16(), "API error response");
            return Err(map_status(status.as_u16(), &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| BackendError::Network(format!("invalid API response: {}", e)))
    }
}

/// Map a non-success status and its body onto a [`BackendError`].
pub fn map_status(status: u16, body: &str) -> BackendError {
    match status {
        401 | 403 => BackendError::Unauthorized,
        404 => BackendError::NotFound,
        429 => BackendError::RateLimited,
        400 | 422 => {
            let message = serde_json::from_str::<ErrorBody>(body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| body.trim().to_string());
            BackendError::Validation(message)
        }
        other => BackendError::Other(other),
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch(&self, params: FetchParams<'_>) -> Result<FetchPage, BackendError> {
        let url = self.request_url(&params)?;
        debug!(kind = %params.kind, "search");
        let envelope: Envelope = self.get(url).await?;
        let total = envelope.count.unwrap_or(envelope.data.len() as u64);
        Ok(FetchPage {
            items: envelope.data,
            total,
        })
    }

    async fn fetch_one(&self, kind: RecordKind, id: i64) -> Result<RawItem, BackendError> {
        let url = self.detail_url(kind, id, &["tags"])?;
        let envelope: ItemEnvelope<RawItem> = self.get(url).await?;
        Ok(envelope.data)
    }

    async fn fetch_associations(
        &self,
        kind: RecordKind,
        id: i64,
    ) -> Result<Associations, BackendError> {
        let url = self.detail_url(kind, id, &["associatedGroups", "associatedIndicators"])?;
        let envelope: ItemEnvelope<AssociatedFields> = self.get(url).await?;
        Ok(envelope.data.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(base: &str) -> HttpBackend {
        HttpBackend::new(base, Credentials::new("id", "key"), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn status_mapping() {
        assert_eq!(map_status(401, ""), BackendError::Unauthorized);
        assert_eq!(map_status(403, ""), BackendError::Unauthorized);
        assert_eq!(map_status(404, ""), BackendError::NotFound);
        assert_eq!(map_status(429, ""), BackendError::RateLimited);
        assert_eq!(
            map_status(400, r#"{"status":"Failure","message":"Invalid TQL"}"#),
            BackendError::Validation("Invalid TQL".into())
        );
        assert_eq!(
            map_status(422, "bad query\n"),
            BackendError::Validation("bad query".into())
        );
        assert_eq!(map_status(500, ""), BackendError::Other(500));
        assert_eq!(map_status(503, "down"), BackendError::Other(503));
    }

    #[test]
    fn request_url_has_params() {
        let b = backend("https://acme.threatconnect.com/api/v3");
        let url = b
            .request_url(&FetchParams {
                kind: RecordKind::Group,
                query: r#"name in ("APT29")"#,
                result_start: 50,
                result_limit: 25,
                owner: Some("Acme Org"),
                include_tags: true,
            })
            .unwrap();
        assert_eq!(url.path(), "/api/v3/groups");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("tql".to_string(), r#"name in ("APT29")"#.to_string()),
                ("resultStart".to_string(), "50".to_string()),
                ("resultLimit".to_string(), "25".to_string()),
                ("owner".to_string(), "Acme Org".to_string()),
                ("fields".to_string(), "tags".to_string()),
            ]
        );
    }

    #[test]
    fn request_url_without_optional_params() {
        let b = backend("http://127.0.0.1:8080/api/v3/");
        let url = b
            .request_url(&FetchParams {
                kind: RecordKind::Indicator,
                query: "rating >= 3",
                result_start: 0,
                result_limit: 100,
                owner: None,
                include_tags: false,
            })
            .unwrap();
        assert_eq!(url.path(), "/api/v3/indicators");
        assert!(!url.query().unwrap_or_default().contains("owner"));
        assert!(!url.query().unwrap_or_default().contains("fields"));
    }

    #[test]
    fn envelope_count_falls_back_to_len() {
        let env: Envelope = serde_json::from_str(
            r#"{"data":[{"type":"Host","summary":"a.com","dateAdded":"2024-01-01T00:00:00Z"}]}"#,
        )
        .unwrap();
        assert_eq!(env.count.unwrap_or(env.data.len() as u64), 1);
    }

    #[test]
    fn detail_url_repeats_fields() {
        let b = backend("https://acme.threatconnect.com/api/v3");
        let url = b
            .detail_url(
                RecordKind::Indicator,
                42,
                &["associatedGroups", "associatedIndicators"],
            )
            .unwrap();
        assert_eq!(url.path(), "/api/v3/indicators/42");
        assert_eq!(
            url.query(),
            Some("fields=associatedGroups&fields=associatedIndicators")
        );

        let url = b.detail_url(RecordKind::Group, 7, &[]).unwrap();
        assert_eq!(url.path(), "/api/v3/groups/7");
        assert_eq!(url.query(), None);
    }

    #[test]
    fn associated_fields_split_by_kind() {
        let env: ItemEnvelope<AssociatedFields> = serde_json::from_str(
            r#"{"data":{"id":1,"summary":"evil.com",
                "associatedGroups":{"data":[{"id":10,"type":"Adversary","name":"APT29","ownerName":"Acme"}]},
                "associatedIndicators":{"data":[{"id":2,"type":"Address","summary":"1.2.3.4"}]}}}"#,
        )
        .unwrap();
        let associations: Associations = env.data.into();
        assert_eq!(associations.groups.len(), 1);
        assert_eq!(associations.groups[0].display_value, "APT29");
        assert_eq!(associations.groups[0].kind, RecordKind::Group);
        assert_eq!(associations.indicators[0].display_value, "1.2.3.4");
        assert_eq!(associations.indicators[0].owner_name, "");

        let env: ItemEnvelope<AssociatedFields> =
            serde_json::from_str(r#"{"data":{"id":1}}"#).unwrap();
        assert!(Associations::from(env.data).is_empty());
    }

    #[test]
    fn from_config_requires_credentials() {
        let cfg = Config::default();
        let err = HttpBackend::from_config(&cfg).err().unwrap();
        assert!(err.to_string().contains("missing API credentials"));
    }
}
