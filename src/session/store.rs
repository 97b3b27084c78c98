use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::mpsc::Receiver;

use super::{AuthError, AuthProvider, MemorySessionProvider, Session, SessionSnapshot};
use crate::app_dirs;

const KEYRING_SERVICE: &str = "platescan";
const KEYRING_KEY: &str = "platescan_session";
pub const DISABLE_KEYRING_ENV: &str = "PLATESCAN_DISABLE_KEYRING";

#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("Session store unavailable: {0}")]
    Unavailable(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Crypto error: {0}")]
    Crypto(String),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("App dir error: {0}")]
    AppDir(#[from] app_dirs::AppDirError),
}

/// Persists the session between launches. Prefers the OS keyring and falls
/// back to an encrypted file in the secrets directory.
#[derive(Clone, Debug)]
pub struct SessionStore {
    fallback_dir: PathBuf,
    use_keyring: bool,
}

impl SessionStore {
    pub fn new() -> Result<Self, SessionStoreError> {
        Ok(Self::in_dir(app_dirs::secrets_dir()?, !keyring_disabled()))
    }

    /// Store backed by `dir`, optionally skipping the keyring entirely.
    pub fn in_dir(dir: impl Into<PathBuf>, use_keyring: bool) -> Self {
        Self {
            fallback_dir: dir.into(),
            use_keyring,
        }
    }

    pub fn load(&self) -> Result<Option<Session>, SessionStoreError> {
        let raw = match self.try_keyring_get()? {
            Some(raw) => Some(raw),
            None => self.fallback_get()?,
        };
        raw.map(|raw| {
            serde_json::from_str(&raw).map_err(|err| SessionStoreError::Decode(err.to_string()))
        })
        .transpose()
    }

    pub fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        let raw = serde_json::to_string(session)
            .map_err(|err| SessionStoreError::Decode(err.to_string()))?;
        if self.try_keyring_set(&raw).is_ok() {
            self.fallback_delete();
            return Ok(());
        }
        self.fallback_set(&raw)
    }

    pub fn delete(&self) {
        self.try_keyring_delete();
        self.fallback_delete();
    }

    fn keyring_entry(&self) -> Result<Option<keyring::Entry>, SessionStoreError> {
        if !self.use_keyring {
            return Ok(None);
        }
        keyring::Entry::new(KEYRING_SERVICE, KEYRING_KEY)
            .map(Some)
            .map_err(|err| SessionStoreError::Unavailable(err.to_string()))
    }

    fn try_keyring_get(&self) -> Result<Option<String>, SessionStoreError> {
        let Some(entry) = self.keyring_entry()? else {
            return Ok(None);
        };
        match entry.get_password() {
            Ok(raw) => Ok(Some(raw)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => {
                tracing::debug!("Keyring read failed, trying file fallback: {err}");
                Ok(None)
            }
        }
    }

    fn try_keyring_set(&self, raw: &str) -> Result<(), SessionStoreError> {
        let entry = self
            .keyring_entry()?
            .ok_or_else(|| SessionStoreError::Unavailable("keyring disabled".into()))?;
        entry
            .set_password(raw)
            .map_err(|err| SessionStoreError::Unavailable(err.to_string()))
    }

    fn try_keyring_delete(&self) {
        if let Ok(Some(entry)) = self.keyring_entry() {
            let _ = entry.delete_credential();
        }
    }

    fn fallback_session_path(&self) -> PathBuf {
        self.fallback_dir.join("session.bin")
    }

    fn fallback_key_path(&self) -> PathBuf {
        self.fallback_dir.join("session.key")
    }

    fn fallback_get(&self) -> Result<Option<String>, SessionStoreError> {
        let session_path = self.fallback_session_path();
        if !session_path.exists() {
            return Ok(None);
        }
        let data = std::fs::read(session_path)?;
        if data.len() < NONCE_LEN {
            return Err(SessionStoreError::Decode("session file too short".into()));
        }
        let (nonce, ciphertext) = data.split_at(NONCE_LEN);
        let key_bytes = std::fs::read(self.fallback_key_path())?;
        if key_bytes.len() != KEY_LEN {
            return Err(SessionStoreError::Decode("session key invalid".into()));
        }
        let plaintext = decrypt(&key_bytes, nonce, ciphertext)?;
        String::from_utf8(plaintext)
            .map(Some)
            .map_err(|err| SessionStoreError::Decode(err.to_string()))
    }

    fn fallback_set(&self, raw: &str) -> Result<(), SessionStoreError> {
        std::fs::create_dir_all(&self.fallback_dir)?;
        let key_path = self.fallback_key_path();
        let key_bytes = if key_path.exists() {
            std::fs::read(&key_path)?
        } else {
            let bytes = random_bytes(KEY_LEN)?;
            write_private_file(&key_path, &bytes)?;
            bytes
        };
        if key_bytes.len() != KEY_LEN {
            return Err(SessionStoreError::Decode("session key invalid".into()));
        }
        let nonce = random_bytes(NONCE_LEN)?;
        let ciphertext = encrypt(&key_bytes, &nonce, raw.as_bytes())?;
        let mut payload = Vec::with_capacity(nonce.len() + ciphertext.len());
        payload.extend_from_slice(&nonce);
        payload.extend_from_slice(&ciphertext);
        write_private_file(&self.fallback_session_path(), &payload)
    }

    fn fallback_delete(&self) {
        let _ = std::fs::remove_file(self.fallback_session_path());
        let _ = std::fs::remove_file(self.fallback_key_path());
    }
}

/// Auth provider backed by [`SessionStore`]. The stored session is loaded
/// lazily by the first `current_session` call, which the gate makes off the
/// UI thread.
pub struct StoredSessionProvider {
    store: SessionStore,
    memory: MemorySessionProvider,
    loaded: Mutex<bool>,
}

impl StoredSessionProvider {
    pub fn new(store: SessionStore) -> Self {
        Self {
            store,
            memory: MemorySessionProvider::new(None),
            loaded: Mutex::new(false),
        }
    }

    /// Persist `session` and broadcast the sign-in.
    pub fn store_session(&self, session: Session) -> Result<SessionSnapshot, AuthError> {
        self.store.save(&session)?;
        let mut loaded = self.lock_loaded();
        *loaded = true;
        Ok(self.memory.set_session(Some(session)))
    }

    /// Forget the stored session and broadcast the sign-out.
    pub fn sign_out(&self) -> SessionSnapshot {
        self.store.delete();
        let mut loaded = self.lock_loaded();
        *loaded = true;
        self.memory.set_session(None)
    }

    fn lock_loaded(&self) -> std::sync::MutexGuard<'_, bool> {
        self.loaded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AuthProvider for StoredSessionProvider {
    fn current_session(&self) -> Result<SessionSnapshot, AuthError> {
        let mut loaded = self.lock_loaded();
        if !*loaded {
            let session = self.store.load()?;
            *loaded = true;
            if session.is_some() {
                return Ok(self.memory.set_session(session));
            }
        }
        Ok(self.memory.snapshot())
    }

    fn subscribe(&self) -> Receiver<SessionSnapshot> {
        self.memory.subscribe()
    }
}

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

fn keyring_disabled() -> bool {
    std::env::var(DISABLE_KEYRING_ENV)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn random_bytes(len: usize) -> Result<Vec<u8>, SessionStoreError> {
    let mut out = vec![0u8; len];
    use rand::TryRngCore;
    rand::rngs::OsRng
        .try_fill_bytes(&mut out)
        .map_err(|err| SessionStoreError::Unavailable(err.to_string()))?;
    Ok(out)
}

fn write_private_file(path: &Path, bytes: &[u8]) -> Result<(), SessionStoreError> {
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)?;
    file.write_all(bytes)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
    }
    Ok(())
}

fn encrypt(key: &[u8], nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, SessionStoreError> {
    use chacha20poly1305::aead::{Aead, KeyInit};
    let cipher = chacha20poly1305::ChaCha20Poly1305::new_from_slice(key)
        .map_err(|err| SessionStoreError::Crypto(err.to_string()))?;
    cipher
        .encrypt(chacha20poly1305::Nonce::from_slice(nonce), plaintext)
        .map_err(|err| SessionStoreError::Crypto(err.to_string()))
}

fn decrypt(key: &[u8], nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, SessionStoreError> {
    use chacha20poly1305::aead::{Aead, KeyInit};
    let cipher = chacha20poly1305::ChaCha20Poly1305::new_from_slice(key)
        .map_err(|err| SessionStoreError::Crypto(err.to_string()))?;
    cipher
        .decrypt(chacha20poly1305::Nonce::from_slice(nonce), ciphertext)
        .map_err(|err| SessionStoreError::Crypto(err.to_string()))
}
