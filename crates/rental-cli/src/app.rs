//! Composition root: wires storage, the API client and the session manager.

use rental_api::RentalApiClient;
use rental_config::{Config, Paths};
use rental_session::{SessionConfig, SessionManager, SessionSnapshot};
use rental_storage::{CredentialStore, FileStorage};
use std::sync::Arc;
use tracing::debug;

/// Error type returned by CLI commands.
pub type CliError = Box<dyn std::error::Error>;

/// Result type returned by CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Everything a command needs, built once per invocation.
pub struct App {
    pub session: Arc<SessionManager>,
    pub api: Arc<RentalApiClient>,
}

impl App {
    pub fn build(config: &Config, paths: &Paths) -> CliResult<Self> {
        let storage = FileStorage::new(paths.credentials_file())?;
        debug!(path = %storage.path().display(), "Using credential file");

        let api = Arc::new(RentalApiClient::new(config.api_url()?, config.request_timeout())?);
        let session = SessionManager::new(
            CredentialStore::new(Box::new(storage)),
            api.clone(),
            SessionConfig {
                expiry_skew_ms: config.expiry_skew_ms(),
            },
        );

        Ok(Self {
            session: Arc::new(session),
            api,
        })
    }

    /// Resolve the stored session.
    pub async fn init(&self) -> CliResult<SessionSnapshot> {
        Ok(self.session.init().await?)
    }

    pub fn shutdown(&self) {
        self.session.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_fresh_base_dir_starts_signed_out() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().join("rental"));

        let app = App::build(&Config::default(), &paths).unwrap();
        let snapshot = app.init().await.unwrap();

        assert!(!snapshot.is_authenticated);
        assert!(!snapshot.bootstrapping);
        assert!(paths.credentials_file().parent().unwrap().exists());
        app.shutdown();
    }

    #[test]
    fn test_invalid_api_url_is_rejected() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        let mut config = Config::default();
        config.api_base_url = "not a url".to_string();

        assert!(App::build(&config, &paths).is_err());
    }
}
