//! Shared server state

use crate::config::ServerConfig;
use sat_store::{ExportDir, JsonlLog, PersistStrategy, WithFallback};
use std::sync::Arc;
use tokio::sync::Mutex;

/// State shared by every request handler
///
/// Appends are serialized by the log's own writer lock. Whole-file
/// rewrites (bulleted document, evidence tree) take the matching lock
/// here so read-merge-write cycles never interleave.
pub struct AppState {
    config: ServerConfig,
    log: JsonlLog,
    persist: Box<dyn PersistStrategy>,
    document_lock: Mutex<()>,
    evidence_lock: Mutex<()>,
}

impl AppState {
    /// Build state from configuration
    ///
    /// With `indicators.fallback_dir` set, failed appends are exported to
    /// that directory.
    #[must_use]
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let log = JsonlLog::new(config.indicators_log());
        let persist: Box<dyn PersistStrategy> = match config.fallback_dir() {
            Some(dir) => Box::new(WithFallback::new(log.clone(), ExportDir::new(dir))),
            None => Box::new(log.clone()),
        };
        tracing::debug!(
            tool = %config.tool,
            strategy = persist.name(),
            log = %log.path().display(),
            "server state ready"
        );

        Arc::new(Self {
            config,
            log,
            persist,
            document_lock: Mutex::new(()),
            evidence_lock: Mutex::new(()),
        })
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Indicator log
    #[inline]
    #[must_use]
    pub fn log(&self) -> &JsonlLog {
        &self.log
    }

    /// Strategy used for indicator submissions
    #[inline]
    #[must_use]
    pub fn persist(&self) -> &dyn PersistStrategy {
        self.persist.as_ref()
    }

    /// Lock guarding the bulleted document
    #[inline]
    pub fn document_lock(&self) -> &Mutex<()> {
        &self.document_lock
    }

    /// Lock guarding the evidence tree file
    #[inline]
    pub fn evidence_lock(&self) -> &Mutex<()> {
        &self.evidence_lock
    }
}
