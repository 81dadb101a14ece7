//! Encrypted on-disk copy of the last successfully fetched secrets.
//!
//! Each cache entry is identified by a fingerprint over everything that
//! shapes the download: token, project, config, format, name transformer
//! and the requested subset of names. The payload is a crypto envelope of
//! the raw JSON; a YAML sidecar at
//! `<metadata-dir>/.metadata-<fingerprint>.json` records the ETag and the
//! fingerprint hash. A sidecar whose hash does not match is a miss.
//!
//! Both files are replaced atomically, so concurrent runs sharing a path
//! never observe a torn file.

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;

use crate::atomic_write::write_private;
use crate::crypto;
use crate::crypto::CryptoError;

/// Directory name under the config directory that holds cache files.
pub const FALLBACK_DIR: &str = "fallback";

#[derive(Debug, thiserror::Error)]
pub enum FallbackError {
    #[error("unable to access fallback file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to decrypt fallback file: {0}")]
    Crypto(#[from] CryptoError),

    #[error("fallback file does not contain a secrets map: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unable to encode fallback metadata: {0}")]
    Metadata(#[from] serde_yaml::Error),

    #[error("fallback file is not valid UTF-8")]
    Encoding,
}

/// Inputs that distinguish one cache entry from another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FallbackIdentity {
    pub token: String,
    pub project: String,
    pub config: String,
    pub format: String,
    pub name_transformer: Option<String>,
    pub secret_names: Vec<String>,
}

impl FallbackIdentity {
    /// Hex SHA-256 of
    /// `token:project:config:format[:transformer][:sorted,unique,names]`.
    ///
    /// Invariant under permutation and duplication of `secret_names`.
    pub fn fingerprint(&self) -> String {
        let mut parts = vec![
            self.token.as_str(),
            self.project.as_str(),
            self.config.as_str(),
            self.format.as_str(),
        ];
        if let Some(transformer) = self.name_transformer.as_deref()
            && !transformer.is_empty()
        {
            parts.push(transformer);
        }

        let mut names: Vec<&str> = self.secret_names.iter().map(String::as_str).collect();
        names.sort_unstable();
        names.dedup();
        let joined = names.join(",");
        if !joined.is_empty() {
            parts.push(&joined);
        }

        hex::encode(Sha256::digest(parts.join(":").as_bytes()))
    }

    /// `<token>:<project>:<config>` when both are known, else the token.
    pub fn default_passphrase(&self) -> String {
        if self.project.is_empty() || self.config.is_empty() {
            self.token.clone()
        } else {
            format!("{}:{}:{}", self.token, self.project, self.config)
        }
    }
}

/// Sidecar describing a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub etag: String,
    pub hash: String,
}

/// Default cache file for `fingerprint` under `config_dir`.
pub fn default_fallback_path(config_dir: &Path, fingerprint: &str) -> PathBuf {
    default_metadata_dir(config_dir).join(format!(".run-{fingerprint}.json"))
}

pub fn default_metadata_dir(config_dir: &Path) -> PathBuf {
    config_dir.join(FALLBACK_DIR)
}

/// One cache entry: payload path, sidecar location and passphrase.
#[derive(Debug, Clone)]
pub struct FallbackStore {
    path: PathBuf,
    metadata_dir: PathBuf,
    passphrase: String,
    fingerprint: String,
}

impl FallbackStore {
    pub fn new(
        identity: &FallbackIdentity,
        path: PathBuf,
        metadata_dir: PathBuf,
        passphrase: Option<String>,
    ) -> Self {
        let passphrase = passphrase
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| identity.default_passphrase());
        Self {
            path,
            metadata_dir,
            passphrase,
            fingerprint: identity.fingerprint(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.metadata_dir
            .join(format!(".metadata-{}.json", self.fingerprint))
    }

    /// The sidecar, if present, readable and matching this fingerprint.
    pub fn read_metadata(&self) -> Option<Metadata> {
        let path = self.metadata_path();
        let text = std::fs::read_to_string(&path).ok()?;
        let metadata: Metadata = match serde_yaml::from_str(&text) {
            Ok(metadata) => metadata,
            Err(err) => {
                tracing::debug!("ignoring unreadable fallback metadata {}: {err}", path.display());
                return None;
            }
        };
        if metadata.hash != self.fingerprint {
            tracing::debug!("fallback metadata hash mismatch for {}", path.display());
            return None;
        }
        Some(metadata)
    }

    /// ETag to send as `If-None-Match`, when a usable entry exists.
    pub fn cached_etag(&self) -> Option<String> {
        let metadata = self.read_metadata()?;
        if metadata.etag.is_empty() || !self.path.exists() {
            return None;
        }
        Some(metadata.etag)
    }

    /// Decrypts the raw JSON payload. `Ok(None)` is a cache miss.
    pub fn read_raw(&self) -> Result<Option<Vec<u8>>, FallbackError> {
        if self.read_metadata().is_none() {
            return Ok(None);
        }
        let envelope = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(FallbackError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        let envelope = String::from_utf8(envelope).map_err(|_| FallbackError::Encoding)?;
        Ok(Some(crypto::decrypt(&self.passphrase, &envelope)?))
    }

    /// Decrypted secrets map. `Ok(None)` is a cache miss.
    pub fn read(&self) -> Result<Option<BTreeMap<String, String>>, FallbackError> {
        match self.read_raw()? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    /// Encrypts `raw_json` to the cache path and refreshes the sidecar.
    pub fn write(&self, raw_json: &[u8], etag: Option<&str>) -> Result<(), FallbackError> {
        let envelope = crypto::encrypt(&self.passphrase, raw_json)?;
        write_private(&self.path, envelope.as_bytes()).map_err(|source| FallbackError::Io {
            path: self.path.clone(),
            source,
        })?;

        let metadata = Metadata {
            version: crate::VERSION.to_string(),
            etag: etag.unwrap_or_default().to_string(),
            hash: self.fingerprint.clone(),
        };
        let yaml = serde_yaml::to_string(&metadata)?;
        let metadata_path = self.metadata_path();
        write_private(&metadata_path, yaml.as_bytes()).map_err(|source| FallbackError::Io {
            path: metadata_path,
            source,
        })?;
        tracing::info!("wrote fallback file {}", self.path.display());
        Ok(())
    }
}
