//! Secret sources for configuration lookup.
//!
//! Configuration values are resolved through a chain of [`SecretSource`]s:
//! the encrypted [`SecretStore`] first (when configured), then the process
//! environment. The store uses ChaCha20-Poly1305 for authenticated encryption.

use base64::Engine;
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    ChaCha20Poly1305, Nonce,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

use crate::error::{Error, Result, ResultExt};

/// Environment variable naming the encrypted secret store file.
pub const SECRETS_PATH_ENV: &str = "TEAMBOT_SECRETS_PATH";

/// Environment variable holding the base64-encoded 32-byte store key.
pub const SECRETS_KEY_ENV: &str = "TEAMBOT_SECRETS_KEY";

/// A read-only key/value lookup for configuration secrets.
pub trait SecretSource: Send + Sync {
    /// Source name for diagnostics.
    fn name(&self) -> &str;

    /// Look up a value by key.
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads values from the process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSource;

impl SecretSource for EnvSource {
    fn name(&self) -> &str {
        "environment"
    }

    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl SecretSource for HashMap<String, String> {
    fn name(&self) -> &str {
        "map"
    }

    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Ordered chain of sources; the first source holding a key wins.
#[derive(Default)]
pub struct SecretChain {
    sources: Vec<Box<dyn SecretSource>>,
}

impl SecretChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source with lower precedence than those already present.
    pub fn with_source(mut self, source: impl SecretSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Names of the sources, highest precedence first.
    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Build the default chain: encrypted store (if configured), then environment.
    pub fn from_env() -> Result<Self> {
        let mut chain = Self::new();
        if let Some(store) = SecretStore::from_env()? {
            tracing::info!(path = %store.path().display(), "Secret store opened");
            chain = chain.with_source(store);
        }
        Ok(chain.with_source(EnvSource))
    }
}

impl SecretSource for SecretChain {
    fn name(&self) -> &str {
        "chain"
    }

    fn get(&self, key: &str) -> Option<String> {
        self.sources.iter().find_map(|source| {
            let value = source.get(key)?;
            tracing::trace!(key, source = source.name(), "Resolved configuration key");
            Some(value)
        })
    }
}

/// Encrypted secret store.
pub struct SecretStore {
    path: PathBuf,
    cipher: ChaCha20Poly1305,
    secrets: HashMap<String, Zeroizing<String>>,
}

/// Serialized format for the secret store file.
#[derive(Serialize, Deserialize)]
struct EncryptedStore {
    /// Base64-encoded nonce
    nonce: String,
    /// Base64-encoded ciphertext
    ciphertext: String,
}

impl SecretStore {
    /// Create or open a secret store at the given path with the given key.
    pub fn open(path: PathBuf, key: &[u8; 32]) -> Result<Self> {
        let cipher = ChaCha20Poly1305::new(key.into());

        let secrets = if path.exists() {
            let content = fs::read_to_string(&path)
                .context(format!("Failed to read secret store from {}", path.display()))?;
            let store: EncryptedStore =
                serde_json::from_str(&content).context("Failed to parse secret store")?;

            let engine = base64::engine::general_purpose::STANDARD;
            let nonce_bytes = engine
                .decode(&store.nonce)
                .map_err(|e| Error::Secret(format!("Failed to decode nonce: {e}")))?;
            let ciphertext = engine
                .decode(&store.ciphertext)
                .map_err(|e| Error::Secret(format!("Failed to decode ciphertext: {e}")))?;

            if nonce_bytes.len() != 12 {
                return Err(Error::Secret("Invalid nonce length".into()));
            }

            let nonce = Nonce::from_slice(&nonce_bytes);
            let plaintext = Zeroizing::new(
                cipher
                    .decrypt(nonce, ciphertext.as_ref())
                    .map_err(|_| Error::Secret("Failed to decrypt secret store - wrong key?".into()))?,
            );

            let data: HashMap<String, String> = serde_json::from_slice(&plaintext)
                .context("Failed to parse decrypted secrets")?;

            data.into_iter()
                .map(|(k, v)| (k, Zeroizing::new(v)))
                .collect()
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            cipher,
            secrets,
        })
    }

    /// Open the store named by `TEAMBOT_SECRETS_PATH` with the key in `TEAMBOT_SECRETS_KEY`.
    ///
    /// Returns `Ok(None)` when either variable is unset.
    pub fn from_env() -> Result<Option<Self>> {
        let (Ok(path), Ok(key)) = (
            std::env::var(SECRETS_PATH_ENV),
            std::env::var(SECRETS_KEY_ENV),
        ) else {
            return Ok(None);
        };

        let key = decode_key(&key)?;
        Self::open(PathBuf::from(path), &key).map(Some)
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get a secret by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.secrets.get(key).map(|s| s.as_str())
    }

    /// Set a secret.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.secrets.insert(key.into(), Zeroizing::new(value.into()));
    }

    /// Remove a secret.
    pub fn remove(&mut self, key: &str) -> Option<Zeroizing<String>> {
        self.secrets.remove(key)
    }

    /// List all secret keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.secrets.keys().map(String::as_str)
    }

    /// Save the secret store to disk.
    pub fn save(&self) -> Result<()> {
        let data: HashMap<&str, &str> = self
            .secrets
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        let plaintext = Zeroizing::new(serde_json::to_vec(&data)?);
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_slice())
            .map_err(|_| Error::Secret("Failed to encrypt secrets".into()))?;

        let engine = base64::engine::general_purpose::STANDARD;
        let store = EncryptedStore {
            nonce: engine.encode(nonce),
            ciphertext: engine.encode(ciphertext),
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(&store)?;
        fs::write(&self.path, content)
            .context(format!("Failed to write secret store to {}", self.path.display()))
    }
}

impl SecretSource for SecretStore {
    fn name(&self) -> &str {
        "secret-store"
    }

    fn get(&self, key: &str) -> Option<String> {
        SecretStore::get(self, key).map(String::from)
    }
}

/// Generate a random 32-byte key for the secret store.
pub fn generate_key() -> [u8; 32] {
    let mut key = [0u8; 32];
    rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut key);
    key
}

/// Encode a store key for use in `TEAMBOT_SECRETS_KEY`.
pub fn encode_key(key: &[u8; 32]) -> String {
    base64::engine::general_purpose::STANDARD.encode(key)
}

/// Decode a base64 store key.
pub fn decode_key(encoded: &str) -> Result<[u8; 32]> {
    let bytes = Zeroizing::new(
        base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::Secret(format!("Invalid store key encoding: {e}")))?,
    );

    bytes
        .as_slice()
        .try_into()
        .map_err(|_| Error::Secret(format!("Store key must be 32 bytes, got {}", bytes.len())))
}
