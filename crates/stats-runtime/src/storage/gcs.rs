//! Google Cloud Storage JSON API client.

use std::path::Path;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use stats_core::error::StorageError;
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace};

use super::{RemoteObject, StorageClient, StorageResult};
use crate::auth::TokenSource;

pub const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

/// Characters left as-is in bucket and object path segments. `/` is encoded.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Deserialize)]
struct ObjectResource {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    items: Vec<ObjectResource>,
    #[serde(default)]
    next_page_token: Option<String>,
}

pub struct GcsStorageClient {
    http: reqwest::Client,
    tokens: TokenSource,
    endpoint: String,
    quota_project: Option<String>,
}

impl std::fmt::Debug for GcsStorageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcsStorageClient")
            .field("endpoint", &self.endpoint)
            .field("quota_project", &self.quota_project)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

impl GcsStorageClient {
    pub fn new(http: reqwest::Client, tokens: TokenSource) -> Self {
        Self {
            http,
            tokens,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            quota_project: None,
        }
    }

    /// Point the client at another JSON API endpoint (e.g. an emulator).
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Bill requests to `project` via the `x-goog-user-project` header.
    #[must_use]
    pub fn with_quota_project(mut self, project: Option<String>) -> Self {
        self.quota_project = project.filter(|p| !p.trim().is_empty());
        self
    }

    fn objects_url(&self, bucket: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o",
            self.endpoint,
            utf8_percent_encode(bucket, PATH_SEGMENT)
        )
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}/{}",
            self.objects_url(bucket),
            utf8_percent_encode(key, PATH_SEGMENT)
        )
    }

    async fn authorized(&self, request: RequestBuilder) -> StorageResult<RequestBuilder> {
        let token = self.tokens.token().await?;
        let request = request.bearer_auth(token);
        Ok(match &self.quota_project {
            Some(project) => request.header("x-goog-user-project", project),
            None => request,
        })
    }
}

/// HTTP client shared by token exchange and storage requests.
pub fn default_http_client() -> StorageResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("playstats/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(30))
        .build()
        .map_err(transport)
}

fn transport(err: reqwest::Error) -> StorageError {
    StorageError::Transport(Box::new(err))
}

async fn status_error(response: Response, key: &str) -> StorageError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::NOT_FOUND => StorageError::NotFound(key.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            StorageError::Unauthorized(format!("{status}: {}", body.trim()))
        }
        _ => StorageError::Http {
            status: status.as_u16(),
            message: body.trim().to_string(),
        },
    }
}

#[async_trait::async_trait]
impl StorageClient for GcsStorageClient {
    async fn authenticate(&self) -> StorageResult<()> {
        self.tokens.token().await.map(|_| ())
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<RemoteObject>> {
        let url = self.objects_url(bucket);
        let mut objects = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query: Vec<(&str, &str)> =
                vec![("prefix", prefix), ("fields", "items(name),nextPageToken")];
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }

            let request = self.authorized(self.http.get(&url).query(&query)).await?;
            let response = request.send().await.map_err(transport)?;
            if !response.status().is_success() {
                return Err(status_error(response, bucket).await);
            }

            let page: ListResponse = response.json().await.map_err(transport)?;
            trace!(count = page.items.len(), "listing page");
            objects.extend(page.items.into_iter().map(|o| RemoteObject::new(o.name)));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!(bucket, prefix, count = objects.len(), "listed objects");
        Ok(objects)
    }

    async fn download_object(
        &self,
        bucket: &str,
        key: &str,
        destination: &Path,
    ) -> StorageResult<()> {
        let request = self
            .authorized(
                self.http
                    .get(self.object_url(bucket, key))
                    .query(&[("alt", "media")]),
            )
            .await?;
        let mut response = request.send().await.map_err(transport)?;
        if !response.status().is_success() {
            return Err(status_error(response, key).await);
        }

        let mut file = tokio::fs::File::create(destination).await?;
        let mut written = 0usize;
        while let Some(chunk) = response.chunk().await.map_err(transport)? {
            file.write_all(&chunk).await?;
            written += chunk.len();
        }
        file.flush().await?;

        debug!(key, bytes = written, path = %destination.display(), "downloaded object");
        Ok(())
    }
}
