use doc_model::{ModelError, RunId};
use pdf_engine::PdfEngineError;
use std::path::PathBuf;
use thiserror::Error;

/// Failures that abort an export. Everything else degrades with a warning.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("failed to load source document: {0}")]
    Load(#[source] PdfEngineError),
    #[error("failed to serialize output document: {0}")]
    Save(#[source] PdfEngineError),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to open document: {0}")]
    Open(#[source] PdfEngineError),
    #[error(transparent)]
    Engine(#[from] PdfEngineError),
    #[error("unknown text run {0}")]
    UnknownRun(RunId),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Export(#[from] ReconcileError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("edit script error: {0}")]
    Script(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("failed to read response body: {0}")]
    Body(#[from] std::io::Error),
    #[error("fetching disabled")]
    Disabled,
}
