use std::path::PathBuf;

use thiserror::Error;
use tower_lsp::lsp_types::Url;

/// Errors surfaced by the indexing core. Handlers log these and return
/// empty results; nothing here is allowed to take the server down.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("URI has no usable file path: {0}")]
    InvalidUri(Url),
}
