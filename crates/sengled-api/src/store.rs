// Session persistence
//
// A session token survives process restarts through a `SessionStore`.
// The store is a dumb keyed box: validity decisions belong to the
// credential session in `sengled-core`.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Error;
use crate::redact::{hide_email, hide_token};

/// A persisted session token and its metadata.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    /// Account identity (login email) the token belongs to.
    pub account: String,
    /// The `JSESSIONID` value.
    pub token: String,
    #[serde(default)]
    pub customer_id: Option<String>,
    pub obtained_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredSession {
    /// Whether the expiry hint has passed at `now`. Sessions without a
    /// hint never expire by age alone.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

impl fmt::Debug for StoredSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredSession")
            .field("account", &hide_email(&self.account))
            .field("token", &hide_token(&self.token))
            .field("customer_id", &self.customer_id)
            .field("obtained_at", &self.obtained_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Load/save/clear of one session per account.
pub trait SessionStore: Send + Sync {
    /// The stored session for `account`, or `None` if nothing usable is stored.
    fn load(&self, account: &str) -> Result<Option<StoredSession>, Error>;

    /// Replace whatever is stored for `session.account`.
    fn save(&self, session: &StoredSession) -> Result<(), Error>;

    /// Forget the session for `account`. Clearing an absent entry is not an error.
    fn clear(&self, account: &str) -> Result<(), Error>;
}

// ── In-memory ────────────────────────────────────────────────────────

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, StoredSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, StoredSession>>, Error> {
        self.sessions
            .lock()
            .map_err(|_| Error::Store("session store lock poisoned".into()))
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, account: &str) -> Result<Option<StoredSession>, Error> {
        Ok(self.lock()?.get(account).cloned())
    }

    fn save(&self, session: &StoredSession) -> Result<(), Error> {
        self.lock()?
            .insert(session.account.clone(), session.clone());
        Ok(())
    }

    fn clear(&self, account: &str) -> Result<(), Error> {
        self.lock()?.remove(account);
        Ok(())
    }
}

// ── File-backed ──────────────────────────────────────────────────────

/// One JSON file per account under a directory:
/// `{dir}/session.{sanitized-account}.json`.
///
/// Writes go through a temp file and a rename so a crash never leaves a
/// half-written session behind. On unix the file is created `0600`.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the session file for `account`.
    pub fn path_for(&self, account: &str) -> PathBuf {
        self.dir.join(format!("session.{}.json", sanitize(account)))
    }
}

/// Keep filenames portable: anything outside `[A-Za-z0-9._-]` becomes `_`,
/// and the account is lowercased since login emails are case-insensitive.
fn sanitize(account: &str) -> String {
    account
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn io_error(action: &str, path: &Path, err: &std::io::Error) -> Error {
    Error::Store(format!("failed to {action} {}: {err}", path.display()))
}

impl SessionStore for FileSessionStore {
    fn load(&self, account: &str) -> Result<Option<StoredSession>, Error> {
        let path = self.path_for(account);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error("read", &path, &e)),
        };

        match serde_json::from_str::<StoredSession>(&raw) {
            Ok(session) if session.account.eq_ignore_ascii_case(account.trim()) => {
                debug!(account = %hide_email(account), "loaded persisted session");
                Ok(Some(session))
            }
            Ok(_) => {
                warn!(path = %path.display(), "session file belongs to another account, ignoring");
                Ok(None)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt session file, ignoring");
                Ok(None)
            }
        }
    }

    fn save(&self, session: &StoredSession) -> Result<(), Error> {
        std::fs::create_dir_all(&self.dir).map_err(|e| io_error("create", &self.dir, &e))?;

        let path = self.path_for(&session.account);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(session)
            .map_err(|e| Error::Store(format!("failed to encode session: {e}")))?;

        write_private(&tmp, &body).map_err(|e| io_error("write", &tmp, &e))?;
        std::fs::rename(&tmp, &path).map_err(|e| io_error("replace", &path, &e))?;

        debug!(account = %hide_email(&session.account), path = %path.display(), "session persisted");
        Ok(())
    }

    fn clear(&self, account: &str) -> Result<(), Error> {
        let path = self.path_for(account);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!(account = %hide_email(account), "persisted session cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("remove", &path, &e)),
        }
    }
}

#[cfg(unix)]
fn write_private(path: &Path, body: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(body)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, body: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, body)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(account: &str, token: &str) -> StoredSession {
        let now = Utc::now();
        StoredSession {
            account: account.into(),
            token: token.into(),
            customer_id: Some("42".into()),
            obtained_at: now,
            expires_at: Some(now + Duration::hours(24)),
        }
    }

    #[test]
    fn file_store_round_trips_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        let saved = session("Jane@Example.com", "tok-1");

        store.save(&saved).unwrap();
        assert_eq!(store.load("jane@example.com").unwrap(), Some(saved));

        store.clear("jane@example.com").unwrap();
        assert_eq!(store.load("jane@example.com").unwrap(), None);
        store.clear("jane@example.com").unwrap();
    }

    #[test]
    fn file_name_is_sanitized() {
        let store = FileSessionStore::new("/tmp/x");
        let path = store.path_for("Jane+Bulbs@Example.com");
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "session.jane_bulbs_example.com.json"
        );
    }

    #[test]
    fn corrupt_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        std::fs::write(store.path_for("a@b.c"), b"{ not json").unwrap();
        assert_eq!(store.load("a@b.c").unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        store.save(&session("a@b.c", "tok")).unwrap();
        let mode = std::fs::metadata(store.path_for("a@b.c"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn save_overwrites_previous_record() {
        let store = MemorySessionStore::new();
        store.save(&session("a@b.c", "old")).unwrap();
        store.save(&session("a@b.c", "new")).unwrap();
        assert_eq!(store.load("a@b.c").unwrap().unwrap().token, "new");
    }

    #[test]
    fn expiry_hint() {
        let mut s = session("a@b.c", "tok");
        assert!(!s.is_expired_at(s.obtained_at));
        assert!(s.is_expired_at(s.obtained_at + Duration::hours(25)));
        s.expires_at = None;
        assert!(!s.is_expired_at(s.obtained_at + Duration::days(365)));
    }

    #[test]
    fn debug_redacts_token() {
        let rendered = format!("{:?}", session("a@b.c", "VERYSECRETVALUE"));
        assert!(!rendered.contains("VERYSECRETVALUE"));
    }
}
