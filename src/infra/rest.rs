//! PostgREST adapter for the remote table store.
//!
//! Reads become `GET /rest/v1/{table}` with filters in the query string,
//! counts are `HEAD` requests with `Prefer: count=exact`, and writes address
//! rows through `id=eq.{id}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde_json::Value;
use tracing::debug;

use crate::application::repos::{Filter, FilterOp, Predicate, RemoteStore, RepoError, SelectQuery};
use crate::config::RemoteSettings;
use crate::domain::records::Record;

use super::error::InfraError;

const REST_PATH: &str = "rest/v1/";
const PREFER: HeaderName = HeaderName::from_static("prefer");
const API_KEY: HeaderName = HeaderName::from_static("apikey");
const ACCEPT_PROFILE: HeaderName = HeaderName::from_static("accept-profile");
const CONTENT_PROFILE: HeaderName = HeaderName::from_static("content-profile");
const CONTENT_RANGE: &str = "content-range";

/// Remote store speaking the PostgREST dialect over HTTP.
#[derive(Clone, Debug)]
pub struct RestStore {
    client: Client,
    base: Url,
}

impl RestStore {
    pub fn new(settings: &RemoteSettings) -> Result<Self, InfraError> {
        let url = settings
            .url
            .as_deref()
            .ok_or_else(|| InfraError::configuration("remote.url is required"))?;
        Self::connect(
            url,
            settings.api_key.as_deref(),
            settings.timeout,
            &settings.schema,
        )
    }

    pub fn connect(
        url: &str,
        api_key: Option<&str>,
        timeout: Duration,
        schema: &str,
    ) -> Result<Self, InfraError> {
        let mut base = Url::parse(url)
            .map_err(|err| InfraError::configuration(format!("invalid remote url `{url}`: {err}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let base = base
            .join(REST_PATH)
            .map_err(|err| InfraError::configuration(format!("invalid remote url `{url}`: {err}")))?;

        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            headers.insert(API_KEY, header_value(key)?);
            headers.insert(AUTHORIZATION, header_value(&format!("Bearer {key}"))?);
        }
        headers.insert(ACCEPT_PROFILE, header_value(schema)?);
        headers.insert(CONTENT_PROFILE, header_value(schema)?);

        let client = Client::builder()
            .user_agent(concat!("rentdesk/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| InfraError::http(err.to_string()))?;

        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn table_url(&self, table: &str, pairs: &[(String, String)]) -> Result<Url, RepoError> {
        let mut url = self
            .base
            .join(table)
            .map_err(|err| RepoError::invalid_input(format!("invalid table `{table}`: {err}")))?;
        if !pairs.is_empty() {
            let mut query = url.query_pairs_mut();
            for (name, value) in pairs {
                query.append_pair(name, value);
            }
        }
        Ok(url)
    }

    fn request(
        &self,
        method: Method,
        table: &str,
        pairs: &[(String, String)],
    ) -> Result<RequestBuilder, RepoError> {
        let url = self.table_url(table, pairs)?;
        debug!(%method, table, url = %url, "Remote store request");
        Ok(self.client.request(method, url))
    }

    fn row_request(&self, method: Method, table: &str, id: &str) -> Result<RequestBuilder, RepoError> {
        self.request(method, table, &[("id".to_string(), format!("eq.{id}"))])
    }
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn select(&self, query: &SelectQuery) -> Result<Vec<Record>, RepoError> {
        let response = self
            .request(Method::GET, &query.table, &select_pairs(query))?
            .send()
            .await
            .map_err(transport_error)?;
        decode_rows(check(response).await?).await
    }

    async fn count(&self, table: &str, filters: &[Filter]) -> Result<u64, RepoError> {
        let response = self
            .request(Method::HEAD, table, &filter_pairs(filters))?
            .header(PREFER, "count=exact")
            .send()
            .await
            .map_err(transport_error)?;
        let response = check(response).await?;

        let header = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| RepoError::decode("count response carries no Content-Range"))?;
        parse_total(header)
    }

    async fn insert(&self, table: &str, record: Record) -> Result<Record, RepoError> {
        let response = self
            .request(Method::POST, table, &[])?
            .header(PREFER, "return=representation")
            .json(&record)
            .send()
            .await
            .map_err(transport_error)?;
        decode_rows(check(response).await?)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RepoError::decode("insert returned no representation"))
    }

    async fn update(&self, table: &str, id: &str, patch: Record) -> Result<Record, RepoError> {
        let response = self
            .row_request(Method::PATCH, table, id)?
            .header(PREFER, "return=representation")
            .json(&patch)
            .send()
            .await
            .map_err(transport_error)?;
        decode_rows(check(response).await?)
            .await?
            .into_iter()
            .next()
            .ok_or(RepoError::NotFound)
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), RepoError> {
        let response = self
            .row_request(Method::DELETE, table, id)?
            .send()
            .await
            .map_err(transport_error)?;
        check(response).await?;
        Ok(())
    }
}

fn header_value(value: &str) -> Result<HeaderValue, InfraError> {
    HeaderValue::from_str(value)
        .map_err(|err| InfraError::configuration(format!("invalid header value: {err}")))
}

async fn check(response: Response) -> Result<Response, RepoError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, body))
}

async fn decode_rows(response: Response) -> Result<Vec<Record>, RepoError> {
    response.json::<Vec<Record>>().await.map_err(RepoError::decode)
}

fn status_error(status: StatusCode, body: String) -> RepoError {
    match status {
        StatusCode::NOT_FOUND => RepoError::NotFound,
        StatusCode::CONFLICT => RepoError::Duplicate { message: body },
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            RepoError::InvalidInput { message: body }
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => RepoError::Timeout,
        _ => RepoError::Persistence(format!("status {status}: {body}")),
    }
}

fn transport_error(err: reqwest::Error) -> RepoError {
    if err.is_timeout() {
        RepoError::Timeout
    } else {
        RepoError::from_persistence(err)
    }
}

/// Total from a `Content-Range` header such as `0-9/45` or `*/0`.
fn parse_total(header: &str) -> Result<u64, RepoError> {
    header
        .rsplit_once('/')
        .and_then(|(_, total)| total.trim().parse().ok())
        .ok_or_else(|| RepoError::decode(format!("unexpected Content-Range `{header}`")))
}

fn select_pairs(query: &SelectQuery) -> Vec<(String, String)> {
    let mut pairs = vec![("select".to_string(), query.columns.clone())];
    pairs.extend(filter_pairs(&query.filters));

    if let Some(order) = &query.order {
        pairs.push((
            "order".to_string(),
            format!("{}.{}", order.field, order.direction.as_str()),
        ));
    }

    match (query.range, query.limit) {
        (Some(range), _) => {
            pairs.push(("offset".to_string(), range.from.to_string()));
            pairs.push(("limit".to_string(), range.rows().to_string()));
        }
        (None, Some(limit)) => pairs.push(("limit".to_string(), limit.to_string())),
        (None, None) => {}
    }

    pairs
}

fn filter_pairs(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|filter| match filter {
            Filter::Where(predicate) => (predicate.field.clone(), condition(predicate, false)),
            Filter::AnyOf(alternatives) => {
                let inner: Vec<String> = alternatives
                    .iter()
                    .map(|predicate| format!("{}.{}", predicate.field, condition(predicate, true)))
                    .collect();
                ("or".to_string(), format!("({})", inner.join(",")))
            }
        })
        .collect()
}

/// `op.value` part of a predicate. Inside logical trees values holding
/// reserved characters are double-quoted.
fn condition(predicate: &Predicate, nested: bool) -> String {
    let value = match predicate.op {
        FilterOp::NotNull => return format!("{}.null", predicate.op.as_str()),
        FilterOp::ILike => format!("*{}*", plain(&predicate.value)),
        FilterOp::Eq | FilterOp::Gte | FilterOp::Lte => plain(&predicate.value),
    };

    if nested && value.contains([',', '(', ')', '"', '\\']) {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        format!("{}.\"{escaped}\"", predicate.op.as_str())
    } else {
        format!("{}.{value}", predicate.op.as_str())
    }
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
