//! LSP protocol handler implementations
//!
//! All `tower_lsp::LanguageServer` trait implementations for the
//! backend: lifecycle (initialize, initialized, shutdown), document
//! lifecycle (did_open, did_change, did_close), workspace folders, and
//! the query handlers (definition, hover, completion, symbols). Handlers
//! never panic: engine errors are logged and turn into empty responses.

use std::sync::Arc;

use tower_lsp::jsonrpc;
use tower_lsp::lsp_types::{
    CompletionOptions, CompletionParams, CompletionResponse, DidChangeTextDocumentParams,
    DidChangeWorkspaceFoldersParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
    Documentation, DocumentSymbolParams, DocumentSymbolResponse, GotoDefinitionParams,
    GotoDefinitionResponse, Hover, HoverContents, HoverParams, HoverProviderCapability,
    InitializedParams, InitializeParams, InitializeResult, MarkedString, OneOf,
    ServerCapabilities, SymbolInformation, TextDocumentSyncCapability, TextDocumentSyncKind,
    WorkspaceSymbolParams,
};
use tower_lsp::LanguageServer;
use tracing::{debug, error, info, warn};

use crate::lsp::document::LspDocument;

use super::state::ProBackend;

#[tower_lsp::async_trait]
impl LanguageServer for ProBackend {
    /// Sets up capabilities and indexes the workspace folders handed
    /// over by the editor.
    async fn initialize(&self, params: InitializeParams) -> jsonrpc::Result<InitializeResult> {
        info!("Received initialize request");

        let mut roots = Vec::new();
        if let Some(folders) = params.workspace_folders {
            roots.extend(folders.iter().filter_map(|f| f.uri.to_file_path().ok()));
        } else if let Some(root_uri) = params.root_uri {
            roots.extend(root_uri.to_file_path().ok());
        }

        if let Some(first) = roots.first() {
            *self.root_dir.write().await = Some(first.clone());
        }

        {
            let mut engine = self.engine.write().await;
            let provider = self.provider();
            for root in &roots {
                let count = engine.store.index_workspace_folder(root, &provider);
                info!("Indexed {} files under {:?}", count, root);
            }
        }

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::INCREMENTAL,
                )),
                definition_provider: Some(OneOf::Left(true)),
                document_symbol_provider: Some(OneOf::Left(true)),
                workspace_symbol_provider: Some(OneOf::Left(true)),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                completion_provider: Some(CompletionOptions {
                    trigger_characters: Some(vec![
                        ".".to_string(),
                        ">".to_string(),
                        ":".to_string(),
                    ]),
                    resolve_provider: Some(false),
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    /// Publishes the diagnostics found during workspace indexing.
    async fn initialized(&self, _params: InitializedParams) {
        info!("Server initialized");
        self.publish_problems().await;
    }

    async fn shutdown(&self) -> jsonrpc::Result<()> {
        info!("Received shutdown request");
        Ok(())
    }

    /// Registers the opened document and reindexes it from the editor
    /// buffer, replacing any disk-read version.
    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri.clone();
        let version = params.text_document.version;
        info!("Opening document: {} (version {})", uri, version);

        let document = Arc::new(LspDocument::new(
            self.next_document_id(),
            uri.clone(),
            &params.text_document.text,
            version,
        ));
        self.documents_by_uri.insert(uri.clone(), document);

        // first open with no workspace: adopt the parent directory so
        // sibling routines resolve
        let needs_root = self.root_dir.read().await.is_none();
        if needs_root {
            if let Ok(path) = uri.to_file_path() {
                if let Some(parent) = path.parent() {
                    *self.root_dir.write().await = Some(parent.to_path_buf());
                    let mut engine = self.engine.write().await;
                    let provider = self.provider();
                    let count = engine.store.index_workspace_folder(parent, &provider);
                    info!("Indexed {} sibling files under {:?}", count, parent);
                }
            }
        }

        {
            let mut engine = self.engine.write().await;
            let provider = self.provider();
            if let Err(e) = engine.store.update_document(&uri, &provider) {
                error!("Failed to index {}: {}", uri, e);
            }
        }
        self.publish_problems().await;
    }

    /// Applies the edit and runs the full remove-then-reinsert update,
    /// then republishes diagnostics.
    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri.clone();
        let version = params.text_document.version;
        debug!("Document changed: {} (version {})", uri, version);

        let updated = match self.documents_by_uri.get(&uri).map(|d| d.value().clone()) {
            Some(document) => Arc::new(document.apply(&params.content_changes, version)),
            None => {
                warn!("Change for unopened document {}", uri);
                return;
            }
        };
        self.documents_by_uri.insert(uri.clone(), updated);

        {
            let mut engine = self.engine.write().await;
            let provider = self.provider();
            if let Err(e) = engine.store.update_document(&uri, &provider) {
                warn!("Failed to update {}: {}", uri, e);
            }
        }
        self.publish_problems().await;
    }

    /// Drops the document from the open map and the index, then clears
    /// its diagnostics through the regular publish diff.
    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        info!("Closing document: {}", uri);

        self.documents_by_uri.remove(&uri);
        {
            let mut engine = self.engine.write().await;
            engine.store.remove_document(&uri);
        }
        self.publish_problems().await;
    }

    /// Indexes added folders and unindexes removed ones.
    async fn did_change_workspace_folders(&self, params: DidChangeWorkspaceFoldersParams) {
        let mut engine = self.engine.write().await;
        for folder in &params.event.removed {
            if let Ok(path) = folder.uri.to_file_path() {
                engine.store.remove_workspace_folder(&path);
                info!("Removed workspace folder {:?}", path);
            }
        }
        let provider = self.provider();
        for folder in &params.event.added {
            if let Ok(path) = folder.uri.to_file_path() {
                let count = engine.store.index_workspace_folder(&path, &provider);
                info!("Indexed {} files under added folder {:?}", count, path);
            }
        }
        drop(engine);
        self.publish_problems().await;
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> jsonrpc::Result<Option<GotoDefinitionResponse>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;

        let mut engine = self.engine.write().await;
        let provider = self.provider();
        match engine.store.find_definition(&uri, position, &provider, true) {
            Ok(location) => Ok(location.map(GotoDefinitionResponse::Scalar)),
            Err(e) => {
                warn!("Definition lookup failed for {}: {}", uri, e);
                Ok(None)
            }
        }
    }

    /// Hover shows the built-in dictionary's documentation for the
    /// routine under the cursor.
    async fn hover(&self, params: HoverParams) -> jsonrpc::Result<Option<Hover>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;

        let word = {
            let mut engine = self.engine.write().await;
            let provider = self.provider();
            match engine.store.resolve_at(&uri, position, &provider) {
                Ok(word) => word,
                Err(e) => {
                    warn!("Hover resolution failed for {}: {}", uri, e);
                    return Ok(None);
                }
            }
        };

        let contents = match self.builtins.hover(&word.search_name) {
            Some(Documentation::MarkupContent(markup)) => HoverContents::Markup(markup),
            Some(Documentation::String(text)) => {
                HoverContents::Scalar(MarkedString::String(text))
            }
            None => return Ok(None),
        };
        Ok(Some(Hover {
            contents,
            range: None,
        }))
    }

    /// Built-in routines first, then the user routines from whichever
    /// bucket the cursor shape selects, then file-local constants.
    async fn completion(
        &self,
        params: CompletionParams,
    ) -> jsonrpc::Result<Option<CompletionResponse>> {
        let uri = params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;

        let (word, user_items) = {
            let mut engine = self.engine.write().await;
            let provider = self.provider();
            let word = match engine.store.resolve_at(&uri, position, &provider) {
                Ok(word) => word,
                Err(e) => {
                    warn!("Completion resolution failed for {}: {}", uri, e);
                    return Ok(None);
                }
            };
            let items = engine.store.completions(&word, &uri);
            (word, items)
        };

        let mut items = if word.is_method {
            // method calls narrow to matching built-ins; anything else
            // hands the editor the whole dictionary to prefix-filter
            let hits = self.builtins.search(&word.search_name);
            if hits.is_empty() {
                self.builtins.all()
            } else {
                hits
            }
        } else {
            self.builtins.all()
        };
        items.extend(user_items);

        Ok(Some(CompletionResponse::Array(items)))
    }

    /// Document outline with variables filtered out.
    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> jsonrpc::Result<Option<DocumentSymbolResponse>> {
        let uri = params.text_document.uri;

        let mut engine = self.engine.write().await;
        let provider = self.provider();
        match engine.store.outline(&uri, &provider) {
            Ok(symbols) => Ok(Some(DocumentSymbolResponse::Nested(
                symbols.iter().map(|s| s.to_document_symbol()).collect(),
            ))),
            Err(e) => {
                warn!("Outline failed for {}: {}", uri, e);
                Ok(None)
            }
        }
    }

    async fn symbol(
        &self,
        params: WorkspaceSymbolParams,
    ) -> jsonrpc::Result<Option<Vec<SymbolInformation>>> {
        let mut engine = self.engine.write().await;
        Ok(Some(engine.store.find_by_name(&params.query)))
    }
}
