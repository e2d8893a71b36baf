#[cfg(test)]
#[path = "sessions_test.rs"]
mod tests;

use std::path;

use anyhow::bail;
use anyhow::Result;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::domain::models::AuthSession;

/// Persists the auth session as a YAML file in the cache directory. The
/// session is the only state kept on disk.
pub struct SessionStore {
    pub cache_dir: path::PathBuf,
}

impl Default for SessionStore {
    fn default() -> SessionStore {
        let cache_dir = dirs::cache_dir().unwrap().join("kibble");

        return SessionStore::new(cache_dir);
    }
}

impl SessionStore {
    pub fn new(cache_dir: path::PathBuf) -> SessionStore {
        return SessionStore { cache_dir };
    }

    fn session_file(&self) -> path::PathBuf {
        return self.cache_dir.join("session.yaml");
    }

    pub async fn load(&self) -> Result<AuthSession> {
        let file_path = self.session_file();
        if !file_path.exists() {
            bail!("No session found. Sign in first with 'kibble login'.");
        }

        let payload = fs::read_to_string(file_path).await?;
        let session: AuthSession = serde_yaml::from_str(&payload)?;

        return Ok(session);
    }

    pub async fn save(&self, session: &AuthSession) -> Result<()> {
        let payload = serde_yaml::to_string(session)?;

        if !self.cache_dir.exists() {
            fs::create_dir_all(&self.cache_dir).await?;
        }

        let mut file = fs::File::create(self.session_file()).await?;
        file.write_all(payload.as_bytes()).await?;

        return Ok(());
    }

    pub async fn delete(&self) -> Result<()> {
        let file_path = self.session_file();
        if !file_path.exists() {
            return Ok(());
        }

        fs::remove_file(file_path).await?;
        return Ok(());
    }
}
