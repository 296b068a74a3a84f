//! Backend state management
//!
//! `ProBackend` holds everything the LSP front-end needs: the client
//! handle, the open-document map, the engine state (symbol store plus
//! problem detector) behind one lock, and the built-in dictionary loaded
//! once at construction.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::RwLock;
use tower_lsp::lsp_types::Url;
use tower_lsp::Client;

use crate::lsp::completion::RoutineDictionary;
use crate::lsp::document::LspDocument;
use crate::lsp::index::SymbolStore;
use crate::lsp::problems::ProblemDetector;
use crate::lsp::text_cache::DocumentProvider;

/// Index and diagnostics state guarded by a single lock. Holding the
/// write guard across a document's remove/reinsert/detect sequence is
/// what keeps per-URI updates atomic; the store itself does no locking.
#[derive(Debug, Default)]
pub struct EngineState {
    pub store: SymbolStore,
    pub problems: ProblemDetector,
}

/// Text provider backed by the open-document map; anything not open
/// falls through to disk.
pub(crate) struct OpenDocuments<'a>(pub(crate) &'a DashMap<Url, Arc<LspDocument>>);

impl DocumentProvider for OpenDocuments<'_> {
    fn open_text(&self, uri: &Url) -> Option<String> {
        self.0.get(uri).map(|doc| doc.text.to_string())
    }
}

/// The language server backend, handling LSP requests over the symbol
/// index core.
#[derive(Clone)]
pub struct ProBackend {
    pub(super) client: Client,
    pub(super) documents_by_uri: Arc<DashMap<Url, Arc<LspDocument>>>,
    pub(super) serial_document_id: Arc<AtomicU32>,
    pub(super) engine: Arc<RwLock<EngineState>>,
    pub(super) builtins: Arc<RoutineDictionary>,
    pub(super) root_dir: Arc<RwLock<Option<PathBuf>>>,
}

impl std::fmt::Debug for ProBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProBackend")
            .field("documents", &self.documents_by_uri.len())
            .finish()
    }
}

impl ProBackend {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            documents_by_uri: Arc::new(DashMap::new()),
            serial_document_id: Arc::new(AtomicU32::new(0)),
            engine: Arc::new(RwLock::new(EngineState::default())),
            builtins: Arc::new(RoutineDictionary::load()),
            root_dir: Arc::new(RwLock::new(None)),
        }
    }

    pub(super) fn next_document_id(&self) -> u32 {
        self.serial_document_id.fetch_add(1, Ordering::SeqCst)
    }

    pub(super) fn provider(&self) -> OpenDocuments<'_> {
        OpenDocuments(&self.documents_by_uri)
    }

    /// Runs a detection pass and pushes the resulting diagnostics,
    /// including empty lists that clear freshly-fixed files. The lock is
    /// released before the publishes go out.
    pub(super) async fn publish_problems(&self) {
        let publishes = {
            let mut engine = self.engine.write().await;
            let EngineState { store, problems } = &mut *engine;
            problems.detect(store, &self.builtins);
            problems.take_publishes()
        };
        for (uri, diagnostics) in publishes {
            self.client.publish_diagnostics(uri, diagnostics, None).await;
        }
    }
}
