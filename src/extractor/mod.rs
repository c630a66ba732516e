//! The extraction pipeline: URL interpretation, credential resolution,
//! fetching, parsing, and batch orchestration.

pub mod batch;
mod credentials;
mod error;
mod fetcher;
mod media;
mod models;
mod parser;
mod payload;
mod url;

use std::sync::Arc;

use tracing::{info, instrument};

pub use credentials::{resolve, Credentials, ProxyConfig};
pub use error::{ErrorKind, ExtractError, Result};
pub use fetcher::{NoteFetcher, NoteSource};
pub use models::{
    BatchFailure, BatchResult, BatchSuccess, Note, NoteMedia, NoteType, NoteUser, VideoMedia,
};
pub use parser::NoteParser;
pub use payload::RawPayload;
pub use url::{parse_post_url, PostDescriptor};

use crate::config::Config;

/// Fetcher and parser wired together. Cheap to clone.
#[derive(Clone)]
pub struct Extractor {
    source: Arc<dyn NoteSource>,
    parser: NoteParser,
    batch_concurrency: usize,
}

impl Extractor {
    #[must_use]
    pub fn new(source: Arc<dyn NoteSource>, parser: NoteParser, batch_concurrency: usize) -> Self {
        Self {
            source,
            parser,
            batch_concurrency,
        }
    }

    /// Build the production pipeline: HTTP fetcher against the configured
    /// web base.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(NoteFetcher::from_config(config)),
            NoteParser::new(&config.web_base),
            config.batch_concurrency,
        )
    }

    /// Extract a single post.
    ///
    /// # Errors
    ///
    /// Returns `InvalidUrl` for unrecognised URLs, otherwise whatever the
    /// fetch or parse step reports.
    #[instrument(skip(self, creds))]
    pub async fn extract(&self, url: &str, creds: &Credentials) -> Result<Note> {
        let descriptor = parse_post_url(url)?;
        self.extract_descriptor(&descriptor, creds).await
    }

    /// Fetch and parse an already-interpreted post.
    ///
    /// # Errors
    ///
    /// Propagates fetch and parse failures.
    pub async fn extract_descriptor(
        &self,
        descriptor: &PostDescriptor,
        creds: &Credentials,
    ) -> Result<Note> {
        let payload = self.source.fetch(descriptor, creds).await?;
        let note = self.parser.parse(&payload, descriptor)?;
        info!(note_id = %note.note_id, note_type = ?note.note_type(), "Extracted note");
        Ok(note)
    }

    /// Extract many posts with the configured concurrency bound.
    pub async fn run_batch(&self, urls: &[String], creds: &Credentials) -> BatchResult {
        batch::run_batch(self, urls, creds, self.batch_concurrency).await
    }
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor")
            .field("parser", &self.parser)
            .field("batch_concurrency", &self.batch_concurrency)
            .finish_non_exhaustive()
    }
}
