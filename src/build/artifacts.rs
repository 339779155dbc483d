use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use url::Url;

use super::prompt::Platform;
use crate::error::YoddaError;

/// Path prefix artifacts are published under.
pub const BUILDS_ROUTE: &str = "builds";

const BUILD_ID_LEN: usize = 8;

/// Fresh build id: the first eight lowercase hex chars of a v4 UUID.
pub fn new_build_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(BUILD_ID_LEN);
    id
}

/// Relative location of one artifact: `{id}/index.{ext}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPath {
    pub build_id: String,
    pub file_name: String,
}

impl ArtifactPath {
    pub fn new(build_id: impl Into<String>, platform: Platform) -> Self {
        Self {
            build_id: build_id.into(),
            file_name: format!("index.{}", platform.extension()),
        }
    }

    /// Public URL of the artifact under `base`.
    pub fn public_url(&self, base: &Url) -> Result<Url, YoddaError> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|()| {
                YoddaError::Configuration(format!("public base url '{base}' cannot be a base"))
            })?
            .pop_if_empty()
            .extend([BUILDS_ROUTE, self.build_id.as_str(), self.file_name.as_str()]);
        Ok(url)
    }
}

impl fmt::Display for ArtifactPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{BUILDS_ROUTE}/{}/{}", self.build_id, self.file_name)
    }
}

/// Write-once storage for generated builds.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Stores `bytes`; an existing artifact at `path` is never overwritten.
    async fn write(&self, path: &ArtifactPath, bytes: &[u8]) -> Result<(), YoddaError>;
}

/// Stores artifacts as `{root}/{id}/index.{ext}`.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn file_path(&self, path: &ArtifactPath) -> PathBuf {
        self.root.join(&path.build_id).join(&path.file_name)
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn write(&self, path: &ArtifactPath, bytes: &[u8]) -> Result<(), YoddaError> {
        let target = self.file_path(path);
        let dir = self.root.join(&path.build_id);
        let failed = |e: std::io::Error| YoddaError::ArtifactWrite(format!("{path}: {e}"));

        tokio::fs::create_dir_all(&dir).await.map_err(failed)?;
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .await
            .map_err(failed)?;
        file.write_all(bytes).await.map_err(failed)?;
        file.flush().await.map_err(failed)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("yodda-artifacts-{tag}-{}", new_build_id()))
    }

    #[test]
    fn build_ids_are_short_lowercase_hex() {
        let id = new_build_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn public_url_joins_base_and_path() {
        let path = ArtifactPath::new("abcd1234", Platform::Web);
        for base in ["https://yodda.example/", "https://yodda.example"] {
            let url = path.public_url(&Url::parse(base).unwrap()).unwrap();
            assert_eq!(url.as_str(), "https://yodda.example/builds/abcd1234/index.html");
        }
        let nested = path
            .public_url(&Url::parse("https://cdn.example/app/").unwrap())
            .unwrap();
        assert_eq!(nested.as_str(), "https://cdn.example/app/builds/abcd1234/index.html");
        assert_eq!(path.to_string(), "builds/abcd1234/index.html");
    }

    #[tokio::test]
    async fn fs_store_writes_once() {
        let root = temp_root("once");
        let store = FsArtifactStore::new(&root);
        let path = ArtifactPath::new("deadbeef", Platform::Android);

        store.write(&path, b"<html></html>").await.unwrap();
        let written = tokio::fs::read(store.file_path(&path)).await.unwrap();
        assert_eq!(written, b"<html></html>");

        assert!(matches!(
            store.write(&path, b"other").await,
            Err(YoddaError::ArtifactWrite(_))
        ));
        let _ = tokio::fs::remove_dir_all(&root).await;
    }
}
