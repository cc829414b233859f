//! Minimal REST client for the remote org API.

use reqwest::Url;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// REST transport errors. Callers map these onto the failure kind of the
/// operation that issued the request.
#[derive(Debug, Error)]
pub enum RestError {
    #[error("invalid url: {0}")]
    Url(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("invalid response: {0}")]
    Decode(String),
}

/// One page of a query result.
#[derive(Debug, Deserialize)]
struct QueryPage<T> {
    records: Vec<T>,
    #[serde(default = "default_done")]
    done: bool,
    #[serde(rename = "nextRecordsUrl")]
    next_records_url: Option<String>,
}

fn default_done() -> bool {
    true
}

/// Authenticated client bound to one org instance.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    instance_url: Url,
    api_version: String,
    access_token: String,
}

impl RestClient {
    pub fn new(
        http: reqwest::Client,
        instance_url: &str,
        api_version: &str,
        access_token: &str,
    ) -> Result<Self, RestError> {
        let instance_url =
            Url::parse(instance_url).map_err(|e| RestError::Url(format!("{instance_url}: {e}")))?;
        Ok(Self {
            http,
            instance_url,
            api_version: api_version.trim_start_matches('v').to_string(),
            access_token: access_token.to_string(),
        })
    }

    fn url(&self, path: &str) -> Result<Url, RestError> {
        self.instance_url
            .join(path)
            .map_err(|e| RestError::Url(format!("{path}: {e}")))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<T, RestError> {
        let response = req.bearer_auth(&self.access_token).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(RestError::Status { status, body });
        }
        serde_json::from_str(&body).map_err(|e| RestError::Decode(e.to_string()))
    }

    /// GET a JSON document at `path` relative to the instance URL.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RestError> {
        let url = self.url(path)?;
        self.send_json(self.http.get(url)).await
    }

    /// Run a query through the data API, following pagination.
    pub async fn query<T: DeserializeOwned>(&self, soql: &str) -> Result<Vec<T>, RestError> {
        let path = format!("/services/data/v{}/query", self.api_version);
        self.query_at(&path, soql).await
    }

    /// Run a query through the tooling API, following pagination.
    pub async fn tooling_query<T: DeserializeOwned>(
        &self,
        soql: &str,
    ) -> Result<Vec<T>, RestError> {
        let path = format!("/services/data/v{}/tooling/query", self.api_version);
        self.query_at(&path, soql).await
    }

    async fn query_at<T: DeserializeOwned>(
        &self,
        path: &str,
        soql: &str,
    ) -> Result<Vec<T>, RestError> {
        let url = self.url(path)?;
        let mut page: QueryPage<T> = self
            .send_json(self.http.get(url).query(&[("q", soql)]))
            .await?;
        let mut records = std::mem::take(&mut page.records);

        while !page.done {
            let Some(next) = page.next_records_url.take() else {
                break;
            };
            page = self.get_json(&next).await?;
            records.append(&mut page.records);
        }

        Ok(records)
    }
}
