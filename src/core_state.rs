//! Shared application state.
//!
//! `CoreState` is created once at startup and wrapped in `Arc`. It owns the
//! configuration, the database location, the realtime broadcaster and the
//! optional text generator. Each request opens its own connection.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::assistant::{self, GenerationError, TextGenerator};
use crate::config::AppConfig;
use crate::db;
use crate::realtime::{Broadcaster, EventPublisher};

pub struct CoreState {
    pub config: AppConfig,
    db_path: PathBuf,
    /// Socket fan-out; connections subscribe here.
    events: Broadcaster,
    /// Where handlers publish. Normally the broadcaster itself.
    publisher: Arc<dyn EventPublisher>,
    generator: Option<Arc<dyn TextGenerator>>,
    started_at: Instant,
}

impl CoreState {
    /// Prepare the database (creating its directory and running migrations)
    /// and build the configured generator.
    pub fn new(config: AppConfig) -> Result<Self, CoreError> {
        if let Some(parent) = config.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        db::open_database(&config.database_path)?;

        let generator = config
            .generator
            .as_ref()
            .map(assistant::from_config)
            .transpose()?;
        let events = Broadcaster::new();

        Ok(Self {
            db_path: config.database_path.clone(),
            publisher: Arc::new(events.clone()),
            events,
            generator,
            config,
            started_at: Instant::now(),
        })
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn with_generator(mut self, generator: Option<Arc<dyn TextGenerator>>) -> Self {
        self.generator = generator;
        self
    }

    /// Open a connection to the already-migrated database.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::connect(&self.db_path).map_err(CoreError::Database)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn events(&self) -> &Broadcaster {
        &self.events
    }

    pub fn publisher(&self) -> &dyn EventPublisher {
        self.publisher.as_ref()
    }

    pub fn generator(&self) -> Option<&dyn TextGenerator> {
        self.generator.as_deref()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("Cannot prepare data directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("Text generator setup failed: {0}")]
    Generator(#[from] GenerationError),
}
