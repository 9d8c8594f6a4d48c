use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, StatusCode};
use std::{
    collections::BTreeMap,
    path::PathBuf,
    sync::Arc,
};
use tokio::{fs, sync::RwLock};
use tracing::debug;
use url::Url;

pub const PREFERENCES_PREFIX: &str = "preferences/";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A flat key/value bucket. Keys are `/`-separated relative paths.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()>;

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>>;
}

/// Longest name fragment kept in a preference key. Leaves room for the
/// prefix, millis and extension inside a 255-byte file name.
pub const MAX_KEY_NAME_BYTES: usize = 160;

/// `preferences/preferences-{name}-{unix_millis}.json`. Path separators in
/// the name become `-` so the key always stays under the prefix, and the name
/// is cut to [`MAX_KEY_NAME_BYTES`] on a char boundary.
pub fn preference_object_key(name: &str, at: DateTime<Utc>) -> String {
    let mut fragment = String::new();
    for c in name.trim().chars() {
        let c = if c == '/' || c == '\\' { '-' } else { c };
        if fragment.len() + c.len_utf8() > MAX_KEY_NAME_BYTES {
            break;
        }
        fragment.push(c);
    }
    format!(
        "{PREFERENCES_PREFIX}preferences-{fragment}-{}.json",
        at.timestamp_millis()
    )
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.starts_with('/') {
        bail!("object key '{key}' must be a non-empty relative path");
    }
    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        bail!("object key '{key}' contains an empty or relative segment");
    }
    Ok(())
}

/// Bucket backed by a local directory.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |path, segment| path.join(segment)))
    }

    /// Keys under `prefix`, sorted.
    pub async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(e).with_context(|| format!("failed to read '{}'", dir.display()))
                }
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&self.root) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put_object(&self, key: &str, body: Vec<u8>, _content_type: &str) -> Result<()> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!(
                    "failed to create parent directory '{}' for object '{key}'",
                    parent.display()
                )
            })?;
        }
        fs::write(&path, body)
            .await
            .with_context(|| format!("failed to write object '{}'", path.display()))?;
        debug!(key, path = %path.display(), "stored object");
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.object_path(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("failed to read object '{}'", path.display())),
        }
    }
}

/// Path-style S3-compatible gateway: objects live at `{endpoint}/{bucket}/{key}`.
#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    client: reqwest::Client,
    endpoint: Url,
    bucket: String,
    token: Option<String>,
}

impl HttpObjectStore {
    pub fn new(endpoint: &str, bucket: impl Into<String>, token: Option<String>) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .with_context(|| format!("invalid object store endpoint '{endpoint}'"))?;
        if endpoint.cannot_be_a_base() {
            bail!("object store endpoint '{endpoint}' cannot carry a path");
        }
        let bucket = bucket.into();
        if bucket.trim().is_empty() {
            bail!("object store bucket name is empty");
        }
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            bucket,
            token,
        })
    }

    pub fn object_url(&self, key: &str) -> Result<Url> {
        validate_key(key)?;
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("object store endpoint cannot carry a path"))?
            .pop_if_empty()
            .push(&self.bucket)
            .extend(key.split('/'));
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put_object(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        let url = self.object_url(key)?;
        let response = self
            .authorize(self.client.put(url.clone()))
            .header(header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .with_context(|| format!("PUT {url} failed"))?;
        let status = response.status();
        if !status.is_success() {
            bail!("PUT {url} returned {status}");
        }
        debug!(key, %url, "stored object");
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let url = self.object_url(key)?;
        let response = self
            .authorize(self.client.get(url.clone()))
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.bytes().await?.to_vec())),
            status => bail!("GET {url} returned {status}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
}

/// Process-local bucket, mostly for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<RwLock<BTreeMap<String, StoredObject>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn list_keys(&self, prefix: &str) -> Vec<String> {
        self.objects
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub async fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().await.get(key).cloned()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        validate_key(key)?;
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        Ok(self.objects.read().await.get(key).map(|o| o.body.clone()))
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
