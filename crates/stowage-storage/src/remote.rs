//! Remote object store over HTTP
//!
//! Path-style addressing: objects live at `{endpoint}/{bucket}/{key}`. Uploads
//! are one `PUT`, reads a `GET`, existence a `HEAD`, removal a `DELETE`.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, StatusCode};
use stowage_core::RemoteConfig;
use tracing::{debug, info, instrument};

use crate::file::SanitizedFile;
use crate::traits::{StorageEngine, StorageError, StorageResult, StoredFile};

/// HTTP object store engine
#[derive(Clone)]
pub struct RemoteStorage {
    client: Client,
    endpoint: String,
    bucket: String,
    access_token: Option<String>,
    public_url: Option<String>,
}

impl RemoteStorage {
    pub fn new(config: &RemoteConfig) -> StorageResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        info!(endpoint = %config.endpoint, bucket = %config.bucket, "Remote storage initialized");

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            bucket: config.bucket.clone(),
            access_token: config.access_token.clone(),
            public_url: config
                .public_url
                .as_ref()
                .map(|url| url.trim_end_matches('/').to_string()),
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, encode_key(key))
    }

    fn handle(&self, key: &str) -> RemoteFile {
        let object_url = self.object_url(key);
        let public_url = match &self.public_url {
            Some(base) => format!("{}/{}", base, encode_key(key)),
            None => object_url.clone(),
        };
        RemoteFile {
            key: key.to_string(),
            object_url,
            public_url,
            client: self.client.clone(),
            access_token: self.access_token.clone(),
        }
    }
}

impl fmt::Debug for RemoteStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteStorage")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

/// Percent-encode each path segment, keeping the separators
fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn authorize(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

#[async_trait]
impl StorageEngine for RemoteStorage {
    #[instrument(skip(self, file), fields(storage = "remote", bucket = %self.bucket))]
    async fn store(
        &self,
        file: &mut SanitizedFile,
        store_path: &str,
    ) -> StorageResult<Box<dyn StoredFile>> {
        let data = file.read().await?;
        let size = data.len();
        let content_type = file
            .content_type()
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let handle = self.handle(store_path);

        let request = self
            .client
            .put(&handle.object_url)
            .header(CONTENT_TYPE, content_type)
            .body(data);
        let response = authorize(request, self.access_token.as_deref())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::UploadFailed(format!(
                "PUT {} returned {}",
                handle.object_url, status
            )));
        }

        info!(key = %store_path, size_bytes = size, "Remote upload successful");
        Ok(Box::new(handle))
    }

    async fn retrieve(&self, store_path: &str) -> StorageResult<Box<dyn StoredFile>> {
        Ok(Box::new(self.handle(store_path)))
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

/// Handle to an object in a [`RemoteStorage`] bucket
#[derive(Clone)]
pub struct RemoteFile {
    key: String,
    object_url: String,
    public_url: String,
    client: Client,
    access_token: Option<String>,
}

impl RemoteFile {
    async fn head(&self) -> StorageResult<reqwest::Response> {
        let request = self.client.head(&self.object_url);
        Ok(authorize(request, self.access_token.as_deref()).send().await?)
    }
}

impl fmt::Debug for RemoteFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteFile")
            .field("key", &self.key)
            .field("url", &self.object_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl StoredFile for RemoteFile {
    fn key(&self) -> &str {
        &self.key
    }

    fn url(&self) -> Option<String> {
        Some(self.public_url.clone())
    }

    async fn read(&self) -> StorageResult<Bytes> {
        let request = self.client.get(&self.object_url);
        let response = authorize(request, self.access_token.as_deref())
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(StorageError::NotFound(self.key.clone())),
            status if !status.is_success() => Err(StorageError::DownloadFailed(format!(
                "GET {} returned {}",
                self.object_url, status
            ))),
            _ => Ok(response.bytes().await?),
        }
    }

    async fn size(&self) -> StorageResult<u64> {
        let response = self.head().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(StorageError::NotFound(self.key.clone())),
            status if !status.is_success() => Err(StorageError::DownloadFailed(format!(
                "HEAD {} returned {}",
                self.object_url, status
            ))),
            _ => response
                .headers()
                .get(CONTENT_LENGTH)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse().ok())
                .ok_or_else(|| {
                    StorageError::DownloadFailed(format!(
                        "HEAD {} returned no content length",
                        self.object_url
                    ))
                }),
        }
    }

    async fn exists(&self) -> StorageResult<bool> {
        let response = self.head().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(StorageError::DownloadFailed(format!(
                "HEAD {} returned {}",
                self.object_url, status
            ))),
        }
    }

    async fn delete(&self) -> StorageResult<()> {
        let request = self.client.delete(&self.object_url);
        let response = authorize(request, self.access_token.as_deref())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            debug!(key = %self.key, "Remote object deleted");
            Ok(())
        } else {
            Err(StorageError::DeleteFailed(format!(
                "DELETE {} returned {}",
                self.object_url, status
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::RawFile;
    use wiremock::matchers::{body_bytes, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(endpoint: &str) -> RemoteConfig {
        RemoteConfig {
            endpoint: endpoint.to_string(),
            bucket: "media".to_string(),
            access_token: Some("secret".to_string()),
            public_url: None,
            timeout_seconds: 5,
        }
    }

    #[test]
    fn test_encode_key() {
        assert_eq!(encode_key("uploads/photo.jpg"), "uploads/photo.jpg");
        assert_eq!(encode_key("my files/a+b.png"), "my%20files/a%2Bb.png");
    }

    #[test]
    fn test_public_url() {
        let mut cfg = config("https://objects.example.com/");
        let storage = RemoteStorage::new(&cfg).unwrap();
        assert_eq!(
            storage.handle("uploads/a.jpg").url().as_deref(),
            Some("https://objects.example.com/media/uploads/a.jpg")
        );

        cfg.public_url = Some("https://cdn.example.com/".to_string());
        let storage = RemoteStorage::new(&cfg).unwrap();
        assert_eq!(
            storage.handle("uploads/a.jpg").url().as_deref(),
            Some("https://cdn.example.com/uploads/a.jpg")
        );
    }

    #[tokio::test]
    async fn test_store_issues_single_put() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/media/uploads/photo.jpg"))
            .and(header("authorization", "Bearer secret"))
            .and(header("content-type", "image/jpeg"))
            .and(body_bytes(b"jpeg bytes".to_vec()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let storage = RemoteStorage::new(&config(&server.uri())).unwrap();
        let mut file = SanitizedFile::new(RawFile::bytes("photo.jpg", "jpeg bytes"));

        let stored = storage.store(&mut file, "uploads/photo.jpg").await.unwrap();
        assert_eq!(stored.key(), "uploads/photo.jpg");
        assert!(stored.path().is_none());
    }

    #[tokio::test]
    async fn test_store_failure_status() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let storage = RemoteStorage::new(&config(&server.uri())).unwrap();
        let mut file = SanitizedFile::new(RawFile::bytes("a.txt", "x"));

        let result = storage.store(&mut file, "uploads/a.txt").await;
        assert!(matches!(result, Err(StorageError::UploadFailed(_))));
    }

    #[tokio::test]
    async fn test_retrieve_reads_lazily() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/media/uploads/a.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"remote".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let storage = RemoteStorage::new(&config(&server.uri())).unwrap();
        let stored = storage.retrieve("uploads/a.txt").await.unwrap();

        assert_eq!(stored.read().await.unwrap(), Bytes::from("remote"));
    }

    #[tokio::test]
    async fn test_read_missing_object() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let storage = RemoteStorage::new(&config(&server.uri())).unwrap();
        let stored = storage.retrieve("uploads/none.txt").await.unwrap();

        assert!(matches!(stored.read().await, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_exists_and_delete() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/media/uploads/a.txt"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/media/uploads/b.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/media/uploads/a.txt"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let storage = RemoteStorage::new(&config(&server.uri())).unwrap();
        let a = storage.retrieve("uploads/a.txt").await.unwrap();
        let b = storage.retrieve("uploads/b.txt").await.unwrap();

        assert!(a.exists().await.unwrap());
        assert!(!b.exists().await.unwrap());
        a.delete().await.unwrap();
    }
}
