use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Buffer time before expiry to treat the token as needing refresh (5 minutes)
const TOKEN_REFRESH_BUFFER_SECS: i64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub access_token: String,
    pub user_id: String,
    pub email: String,
    pub first_name: String,
    pub created_at: DateTime<Utc>,
    /// Token lifetime reported by the auth service at sign-in.
    pub expires_in_secs: i64,
}

impl SessionData {
    fn expiry(&self) -> DateTime<Utc> {
        self.created_at + Duration::seconds(self.expires_in_secs)
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expiry()
    }

    /// Check if the session will expire soon and the user should sign in
    /// again before starting a fetch cycle.
    pub fn needs_refresh(&self) -> bool {
        Utc::now() > self.expiry() - Duration::seconds(TOKEN_REFRESH_BUFFER_SECS)
    }

    /// Minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        (self.expiry() - Utc::now()).num_minutes().max(0)
    }
}

pub struct Session {
    cache_dir: PathBuf,
    pub data: Option<SessionData>,
}

impl Session {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            data: None,
        }
    }

    /// Load session from disk. Returns true when a non-expired session
    /// was found.
    pub fn load(&mut self) -> Result<bool> {
        let path = self.session_path();
        if path.exists() {
            let contents =
                std::fs::read_to_string(&path).context("Failed to read session file")?;
            let data: SessionData =
                serde_json::from_str(&contents).context("Failed to parse session file")?;

            if !data.is_expired() {
                self.data = Some(data);
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Save session to disk
    pub fn save(&self) -> Result<()> {
        if let Some(ref data) = self.data {
            let path = self.session_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let contents = serde_json::to_string_pretty(data)?;
            std::fs::write(path, contents)?;
        }
        Ok(())
    }

    /// Clear session data, on disk and in memory
    pub fn clear(&mut self) -> Result<()> {
        self.data = None;
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Update session with new data
    pub fn update(&mut self, data: SessionData) {
        self.data = Some(data);
    }

    /// Get the bearer token if a session exists
    pub fn token(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.access_token.as_str())
    }

    /// Get the signed-in email if a session exists
    pub fn email(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.email.as_str())
    }

    /// Check if session is valid (exists and not expired)
    pub fn is_valid(&self) -> bool {
        self.data.as_ref().map(|d| !d.is_expired()).unwrap_or(false)
    }

    fn session_path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_data(age_secs: i64, lifetime_secs: i64) -> SessionData {
        SessionData {
            access_token: "token".to_string(),
            user_id: "u1".to_string(),
            email: "a@x.com".to_string(),
            first_name: "Alice".to_string(),
            created_at: Utc::now() - Duration::seconds(age_secs),
            expires_in_secs: lifetime_secs,
        }
    }

    #[test]
    fn test_fresh_session_is_valid() {
        let data = session_data(0, 3600);
        assert!(!data.is_expired());
        assert!(!data.needs_refresh());
    }

    #[test]
    fn test_session_expiry() {
        let data = session_data(3700, 3600);
        assert!(data.is_expired());
        assert_eq!(data.minutes_until_expiry(), 0);
    }

    #[test]
    fn test_needs_refresh_inside_buffer() {
        // 3 minutes left on the token: not expired, but inside the
        // 5-minute refresh buffer.
        let data = session_data(3600 - 180, 3600);
        assert!(!data.is_expired());
        assert!(data.needs_refresh());
    }

    #[test]
    fn test_session_roundtrip_and_clear() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut session = Session::new(dir.path().to_path_buf());
        session.update(session_data(0, 3600));
        session.save().expect("save");

        let mut reloaded = Session::new(dir.path().to_path_buf());
        assert!(reloaded.load().expect("load"));
        assert_eq!(reloaded.email(), Some("a@x.com"));

        reloaded.clear().expect("clear");
        let mut empty = Session::new(dir.path().to_path_buf());
        assert!(!empty.load().expect("load"));
        assert!(empty.token().is_none());
    }

    #[test]
    fn test_expired_session_not_loaded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut session = Session::new(dir.path().to_path_buf());
        session.update(session_data(7200, 3600));
        session.save().expect("save");

        let mut reloaded = Session::new(dir.path().to_path_buf());
        assert!(!reloaded.load().expect("load"));
        assert!(!reloaded.is_valid());
    }
}
