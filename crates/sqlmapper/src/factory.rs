//! Session factory.

use sqlmapper_core::{DataSource, Result};
use sqlmapper_session::{Configuration, Session};
use std::sync::Arc;

/// Opens sessions that share one configuration and one data source.
///
/// ```rust,ignore
/// let factory = SessionFactory::new(config, SqliteConfig::file("blog.db"));
/// let session = factory.open_session()?;
/// ```
#[derive(Clone)]
pub struct SessionFactory {
    config: Arc<Configuration>,
    data_source: Arc<dyn DataSource>,
}

impl std::fmt::Debug for SessionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionFactory")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SessionFactory {
    pub fn new(config: Configuration, data_source: impl DataSource + 'static) -> Self {
        Self::from_shared(Arc::new(config), Arc::new(data_source))
    }

    pub fn from_shared(config: Arc<Configuration>, data_source: Arc<dyn DataSource>) -> Self {
        Self {
            config,
            data_source,
        }
    }

    pub fn configuration(&self) -> &Arc<Configuration> {
        &self.config
    }

    /// Open a session with the configured `default_auto_commit`.
    pub fn open_session(&self) -> Result<Session> {
        self.open_session_with(self.config.settings().default_auto_commit)
    }

    /// Open a session on a fresh connection.
    pub fn open_session_with(&self, auto_commit: bool) -> Result<Session> {
        let connection = self.data_source.connect()?;
        Ok(Session::open(Arc::clone(&self.config), connection, auto_commit))
    }
}
