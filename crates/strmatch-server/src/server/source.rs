//! Where each query's corpus comes from.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use strmatch_core::{Corpus, Error};
use tracing::{debug, info};

/// Cached in memory, or re-read from disk for every query.
#[derive(Debug, Clone)]
pub enum CorpusSource {
    Cached(Arc<Corpus>),
    Reread(PathBuf),
}

impl CorpusSource {
    /// Load the data file once.
    ///
    /// In reread mode the file is still loaded here so a missing or
    /// unreadable file fails startup, but the result is not kept.
    pub fn open(data_path: PathBuf, reread_on_query: bool) -> Result<Self, Error> {
        let corpus = Corpus::load(&data_path)?;
        info!(
            path = %data_path.display(),
            lines = corpus.len(),
            reread_on_query,
            "Data file loaded"
        );
        if reread_on_query {
            Ok(Self::Reread(data_path))
        } else {
            Ok(Self::Cached(Arc::new(corpus)))
        }
    }

    /// Corpus to answer the current query with.
    pub async fn corpus(&self) -> Result<Arc<Corpus>, Error> {
        match self {
            Self::Cached(corpus) => Ok(Arc::clone(corpus)),
            Self::Reread(path) => {
                let started = Instant::now();
                let path = path.clone();
                let corpus = tokio::task::spawn_blocking(move || Corpus::load(&path))
                    .await
                    .map_err(|e| Error::Io(std::io::Error::other(e)))??;
                debug!(
                    lines = corpus.len(),
                    load_ms = started.elapsed().as_secs_f64() * 1000.0,
                    "Data file re-read"
                );
                Ok(Arc::new(corpus))
            }
        }
    }
}
