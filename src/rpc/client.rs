use super::{ErrorBody, MissingBlobsRequest, PutArtifact, PutBlob, RemoteError, DEFAULT_TOKEN_HEADER};
use crate::cache::{ArtifactCache, ArtifactInfo, BlobInfo, MissingBlobs};
use crate::error::{CacheError, ScanFailure};
use crate::model::{FailureKind, ScanResults};
use crate::scanner::{ScanDriver, ScanRequest};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

const USER_AGENT: &str = concat!("fleetscan/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP plumbing for the scan server clients.
#[derive(Clone)]
struct Endpoint {
    client: Client,
    base: Url,
    token: Option<(String, String)>,
}

impl Endpoint {
    fn new(base: &str) -> Result<Self, RemoteError> {
        let mut base = Url::parse(base).map_err(|e| RemoteError::Url(format!("{}: {}", base, e)))?;
        if base.cannot_be_a_base() {
            return Err(RemoteError::Url(base.to_string()));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Self {
            client,
            base,
            token: None,
        })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some((header, token)) => request.header(header.as_str(), token.as_str()),
            None => request,
        }
    }

    async fn post<B: Serialize + ?Sized>(&self, segments: &[&str], body: &B) -> Result<Response, RemoteError> {
        let request = self.client.post(self.url(segments)).json(body);
        check(self.authorize(request).send().await?).await
    }

    async fn get(&self, segments: &[&str]) -> Result<Response, RemoteError> {
        let request = self.client.get(self.url(segments));
        check(self.authorize(request).send().await?).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<T, RemoteError> {
        Ok(self.post(segments, body).await?.json().await?)
    }
}

async fn check(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(RemoteError::Unauthorized);
    }

    let text = response.text().await.unwrap_or_default();
    let body = serde_json::from_str::<ErrorBody>(&text).unwrap_or_else(|_| ErrorBody {
        code: "http_error".to_string(),
        message: if text.is_empty() {
            status.to_string()
        } else {
            text
        },
        kind: None,
    });
    Err(RemoteError::Status {
        status: status.as_u16(),
        body,
    })
}

/// [`ScanDriver`] that delegates detection to a scan server.
#[derive(Clone)]
pub struct RemoteScanner {
    endpoint: Endpoint,
}

impl RemoteScanner {
    pub fn new(base_url: &str) -> Result<Self, RemoteError> {
        Ok(Self {
            endpoint: Endpoint::new(base_url)?,
        })
    }

    pub fn with_token(mut self, header: Option<&str>, token: impl Into<String>) -> Self {
        let header = header.unwrap_or(DEFAULT_TOKEN_HEADER).to_string();
        self.endpoint.token = Some((header, token.into()));
        self
    }
}

#[async_trait]
impl ScanDriver for RemoteScanner {
    async fn scan(&self, request: &ScanRequest) -> Result<ScanResults, ScanFailure> {
        self.endpoint
            .post_json(&["scan"], request)
            .await
            .map_err(|e| match e {
                RemoteError::Status { body, .. } if body.kind.is_some() => ScanFailure::Rejected {
                    kind: body.kind.unwrap_or(FailureKind::Remote),
                    message: body.message,
                },
                other => ScanFailure::Remote(other.to_string()),
            })
    }
}

/// [`ArtifactCache`] stored on a scan server.
///
/// Lets a client populate the cache the server scans against.
#[derive(Clone)]
pub struct RemoteCache {
    endpoint: Endpoint,
}

impl RemoteCache {
    pub fn new(base_url: &str) -> Result<Self, RemoteError> {
        Ok(Self {
            endpoint: Endpoint::new(base_url)?,
        })
    }

    pub fn with_token(mut self, header: Option<&str>, token: impl Into<String>) -> Self {
        let header = header.unwrap_or(DEFAULT_TOKEN_HEADER).to_string();
        self.endpoint.token = Some((header, token.into()));
        self
    }

    async fn fetch<T: DeserializeOwned>(&self, bucket: &str, key: &str) -> Result<T, CacheError> {
        match self.endpoint.get(&["cache", bucket, key]).await {
            Ok(response) => response.json().await.map_err(|e| remote(e.into())),
            Err(RemoteError::Status { status: 404, .. }) => Err(CacheError::Miss {
                kind: if bucket == "blob" { "blob" } else { "artifact" },
                key: key.to_string(),
            }),
            Err(e) => Err(remote(e)),
        }
    }
}

fn remote(err: RemoteError) -> CacheError {
    CacheError::Remote(err.to_string())
}

#[async_trait]
impl ArtifactCache for RemoteCache {
    async fn put_artifact(&self, key: &str, info: &ArtifactInfo) -> Result<(), CacheError> {
        let body = PutArtifact {
            key: key.to_string(),
            info: info.clone(),
        };
        self.endpoint
            .post(&["cache", "artifact"], &body)
            .await
            .map(drop)
            .map_err(remote)
    }

    async fn put_blob(&self, key: &str, info: &BlobInfo) -> Result<(), CacheError> {
        let body = PutBlob {
            key: key.to_string(),
            info: info.clone(),
        };
        self.endpoint
            .post(&["cache", "blob"], &body)
            .await
            .map(drop)
            .map_err(remote)
    }

    async fn get_artifact(&self, key: &str) -> Result<ArtifactInfo, CacheError> {
        self.fetch("artifact", key).await
    }

    async fn get_blob(&self, key: &str) -> Result<BlobInfo, CacheError> {
        self.fetch("blob", key).await
    }

    /// One round trip instead of a lookup per key.
    async fn missing_blobs(
        &self,
        artifact_key: &str,
        blob_keys: &[String],
    ) -> Result<MissingBlobs, CacheError> {
        let body = MissingBlobsRequest {
            artifact_key: artifact_key.to_string(),
            blob_keys: blob_keys.to_vec(),
        };
        self.endpoint
            .post_json(&["cache", "missing"], &body)
            .await
            .map_err(remote)
    }

    async fn clear(&self) -> Result<(), CacheError> {
        Err(CacheError::Remote(
            "the scan server cache cannot be cleared remotely".to_string(),
        ))
    }
}
