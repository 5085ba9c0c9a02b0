//! Storage for pairing credentials

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::credential::PairingCredential;

/// Stored pairing for one server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPairing {
    /// Credential presented on `/login`
    pub credential: PairingCredential,
    /// `servicename` the server sent when it paired, if known
    pub service_name: Option<String>,
}

/// Abstract storage interface for pairing credentials
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load the pairing for a server
    async fn load(&self, server_id: &str) -> Option<StoredPairing>;

    /// Save the pairing for a server
    ///
    /// # Errors
    ///
    /// Returns error if storage fails
    async fn save(&mut self, server_id: &str, pairing: &StoredPairing) -> Result<(), StorageError>;

    /// Remove the pairing for a server
    ///
    /// # Errors
    ///
    /// Returns error if removal fails
    async fn remove(&mut self, server_id: &str) -> Result<(), StorageError>;

    /// List all server ids with a stored pairing
    async fn list_servers(&self) -> Vec<String>;
}

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data could not be (de)serialized
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// In-memory credential storage (non-persistent)
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    pairings: HashMap<String, StoredPairing>,
}

impl MemoryCredentialStore {
    /// Create a new in-memory storage
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-seeded with one pairing
    #[must_use]
    pub fn with_pairing(server_id: impl Into<String>, pairing: StoredPairing) -> Self {
        let mut pairings = HashMap::new();
        pairings.insert(server_id.into(), pairing);
        Self { pairings }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self, server_id: &str) -> Option<StoredPairing> {
        self.pairings.get(server_id).cloned()
    }

    async fn save(&mut self, server_id: &str, pairing: &StoredPairing) -> Result<(), StorageError> {
        self.pairings.insert(server_id.to_string(), pairing.clone());
        Ok(())
    }

    async fn remove(&mut self, server_id: &str) -> Result<(), StorageError> {
        self.pairings.remove(server_id);
        Ok(())
    }

    async fn list_servers(&self) -> Vec<String> {
        self.pairings.keys().cloned().collect()
    }
}

/// JSON file credential storage
pub struct FileCredentialStore {
    path: std::path::PathBuf,
    cache: HashMap<String, StoredPairing>,
}

impl FileCredentialStore {
    /// Open file storage at the given path
    ///
    /// # Errors
    ///
    /// Returns error if directory cannot be created or file loaded
    pub async fn new(path: impl AsRef<std::path::Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let cache = Self::load_all(&path).await?;

        Ok(Self { path, cache })
    }

    /// Backing file
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    async fn load_all(
        path: &std::path::Path,
    ) -> Result<HashMap<String, StoredPairing>, StorageError> {
        if !tokio::fs::try_exists(path).await? {
            return Ok(HashMap::new());
        }

        let bytes = tokio::fs::read(path).await?;
        if bytes.is_empty() {
            return Ok(HashMap::new());
        }

        let cache = tokio::task::spawn_blocking(move || serde_json::from_slice(&bytes))
            .await
            .map_err(|e| StorageError::Serialization(format!("Deserialization task failed: {e}")))?
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        Ok(cache)
    }

    async fn save_all(&self) -> Result<(), StorageError> {
        let path = self.path.clone();
        let cache = self.cache.clone();

        let bytes = tokio::task::spawn_blocking(move || serde_json::to_vec_pretty(&cache))
            .await
            .map_err(|e| StorageError::Serialization(format!("Serialization task failed: {e}")))?
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        tokio::fs::write(path, bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self, server_id: &str) -> Option<StoredPairing> {
        self.cache.get(server_id).cloned()
    }

    async fn save(&mut self, server_id: &str, pairing: &StoredPairing) -> Result<(), StorageError> {
        self.cache.insert(server_id.to_string(), pairing.clone());
        self.save_all().await
    }

    async fn remove(&mut self, server_id: &str) -> Result<(), StorageError> {
        self.cache.remove(server_id);
        self.save_all().await
    }

    async fn list_servers(&self) -> Vec<String> {
        self.cache.keys().cloned().collect()
    }
}
