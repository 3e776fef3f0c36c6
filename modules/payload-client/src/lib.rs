pub mod error;
pub mod types;

pub use error::{PayloadError, Result};
pub use types::{DocId, Document, Where};

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use types::{DocResponse, FindResponse};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the Payload CMS collections REST API.
pub struct PayloadClient {
    client: reqwest::Client,
    base_url: String,
    auth_header: String,
}

impl PayloadClient {
    /// `auth_collection` is the collection the API key belongs to, usually `users`.
    pub fn new(base_url: &str, api_key: &str, auth_collection: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_header: format!("{auth_collection} API-Key {api_key}"),
        }
    }

    pub async fn find(&self, collection: &str, clause: &Where, limit: u32) -> Result<Vec<Document>> {
        let url = format!("{}/api/{}", self.base_url, collection);
        let mut query = clause.query_pairs();
        query.push(("limit".to_string(), limit.to_string()));
        query.push(("depth".to_string(), "0".to_string()));

        let resp = self
            .client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, &self.auth_header)
            .query(&query)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let found: FindResponse = read_json(resp).await?;
        tracing::debug!(
            collection,
            matched = found.docs.len(),
            total = found.total_docs.unwrap_or_default(),
            "Payload find"
        );
        Ok(found.docs)
    }

    pub async fn create(&self, collection: &str, data: &Value) -> Result<Document> {
        let url = format!("{}/api/{}", self.base_url, collection);
        let resp = self
            .client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, &self.auth_header)
            .json(data)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let created: DocResponse = read_json(resp).await?;
        tracing::debug!(collection, id = %created.doc.id, "Payload create");
        Ok(created.doc)
    }

    pub async fn update(&self, collection: &str, id: &DocId, data: &Value) -> Result<Document> {
        let url = format!("{}/api/{}/{}", self.base_url, collection, id);
        let resp = self
            .client
            .patch(&url)
            .header(reqwest::header::AUTHORIZATION, &self.auth_header)
            .json(data)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let updated: DocResponse = read_json(resp).await?;
        tracing::debug!(collection, id = %updated.doc.id, "Payload update");
        Ok(updated.doc)
    }
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(PayloadError::Api {
            status: status.as_u16(),
            message: body,
        });
    }

    let text = resp.text().await?;
    Ok(serde_json::from_str(&text)?)
}
