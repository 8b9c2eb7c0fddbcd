// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session persistence: a signed JSON file written atomically.
//!
//! The file holds `{payload, signature}` where `payload` is the serialized
//! [`SessionSnapshot`] and `signature` is its HMAC-SHA256 under the session
//! secret. A file whose signature does not verify is never loaded.

use std::fmt;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::Mutex;
use ring::hmac;
use serde::{Deserialize, Serialize};

use crate::credential::{Credential, Identity};
use crate::error::ErrorTag;
use crate::store::CredentialStore;

/// Every session field that must survive a restart.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub access_token_expires_at: u64,
    #[serde(default)]
    pub refresh_token_expires_at: Option<u64>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub error: Option<ErrorTag>,
}

impl fmt::Debug for SessionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSnapshot")
            .field("user_id", &self.user_id)
            .field("access_token_expires_at", &self.access_token_expires_at)
            .field("refresh_token_expires_at", &self.refresh_token_expires_at)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl From<&Credential> for SessionSnapshot {
    fn from(c: &Credential) -> Self {
        Self {
            access_token: c.access_token.clone(),
            refresh_token: c.refresh_token.clone(),
            access_token_expires_at: c.access_token_expires_at,
            refresh_token_expires_at: c.refresh_token_expires_at,
            user_id: c.identity.user_id.clone(),
            email: c.identity.email.clone(),
            first_name: c.identity.first_name.clone(),
            last_name: c.identity.last_name.clone(),
            role: c.identity.role.clone(),
            error: c.error,
        }
    }
}

impl From<SessionSnapshot> for Credential {
    fn from(s: SessionSnapshot) -> Self {
        Self {
            access_token: s.access_token,
            refresh_token: s.refresh_token,
            access_token_expires_at: s.access_token_expires_at,
            refresh_token_expires_at: s.refresh_token_expires_at,
            error: s.error,
            identity: Identity {
                user_id: s.user_id,
                email: s.email,
                first_name: s.first_name,
                last_name: s.last_name,
                role: s.role,
            },
        }
    }
}

#[derive(Serialize, Deserialize)]
struct SignedFile {
    payload: String,
    signature: String,
}

#[derive(Debug)]
pub enum PersistError {
    MissingSecret,
    Io(std::io::Error),
    Json(serde_json::Error),
    /// The file was not written with this secret, or was modified.
    BadSignature,
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSecret => f.write_str("session secret not configured"),
            Self::Io(e) => write!(f, "session file: {e}"),
            Self::Json(e) => write!(f, "session file is not valid JSON: {e}"),
            Self::BadSignature => f.write_str("session file signature mismatch"),
        }
    }
}

impl std::error::Error for PersistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::MissingSecret | Self::BadSignature => None,
        }
    }
}

impl From<std::io::Error> for PersistError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for PersistError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// HMAC-SHA256 signer keyed by the session secret.
pub struct SessionSigner {
    key: hmac::Key,
}

impl SessionSigner {
    pub fn new(secret: &[u8]) -> Result<Self, PersistError> {
        if secret.is_empty() {
            return Err(PersistError::MissingSecret);
        }
        Ok(Self { key: hmac::Key::new(hmac::HMAC_SHA256, secret) })
    }

    pub fn sign(&self, payload: &str) -> String {
        URL_SAFE_NO_PAD.encode(hmac::sign(&self.key, payload.as_bytes()).as_ref())
    }

    pub fn verify(&self, payload: &str, signature: &str) -> Result<(), PersistError> {
        let tag = URL_SAFE_NO_PAD.decode(signature).map_err(|_| PersistError::BadSignature)?;
        hmac::verify(&self.key, payload.as_bytes(), &tag).map_err(|_| PersistError::BadSignature)
    }
}

/// Load the session file. A missing file is no session.
pub fn load(path: &Path, signer: &SessionSigner) -> Result<Option<SessionSnapshot>, PersistError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let file: SignedFile = serde_json::from_str(&contents)?;
    signer.verify(&file.payload, &file.signature)?;
    Ok(Some(serde_json::from_str(&file.payload)?))
}

/// Save the session file atomically (write tmp + rename).
pub fn save(path: &Path, signer: &SessionSigner, snapshot: &SessionSnapshot) -> Result<(), PersistError> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let payload = serde_json::to_string(snapshot)?;
    let file = SignedFile { signature: signer.sign(&payload), payload };
    let json = serde_json::to_string_pretty(&file)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        "{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, json)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Delete the session file. Already gone is fine.
pub fn remove(path: &Path) -> Result<(), PersistError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Credential store that writes through to the signed session file.
pub struct FileStore {
    path: PathBuf,
    signer: SessionSigner,
    current: Mutex<Option<Credential>>,
}

impl FileStore {
    /// Open the store, loading any session left by a previous run.
    ///
    /// A corrupt or tampered file is discarded and the store starts empty.
    pub fn open(path: impl Into<PathBuf>, signer: SessionSigner) -> Result<Self, PersistError> {
        let path = path.into();
        let current = match load(&path, &signer) {
            Ok(snapshot) => snapshot.map(Credential::from),
            Err(e @ (PersistError::BadSignature | PersistError::Json(_))) => {
                tracing::warn!(path = %path.display(), err = %e, "discarding unreadable session file");
                remove(&path)?;
                None
            }
            Err(e) => return Err(e),
        };
        Ok(Self { path, signer, current: Mutex::new(current) })
    }
}

impl CredentialStore for FileStore {
    fn get(&self) -> Option<Credential> {
        self.current.lock().clone()
    }

    fn set(&self, credential: Credential) {
        let snapshot = SessionSnapshot::from(&credential);
        let mut current = self.current.lock();
        if let Err(e) = save(&self.path, &self.signer, &snapshot) {
            tracing::warn!(path = %self.path.display(), err = %e, "failed to persist session");
        }
        *current = Some(credential);
    }

    fn clear(&self) {
        let mut current = self.current.lock();
        if let Err(e) = remove(&self.path) {
            tracing::warn!(path = %self.path.display(), err = %e, "failed to remove session file");
        }
        *current = None;
    }
}

#[cfg(test)]
#[path = "persist_tests.rs"]
mod tests;
