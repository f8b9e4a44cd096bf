//! bettyfix LSP Server
//!
//! Language Server Protocol implementation for the betty C style checker.
//! Runs betty when C documents are opened or saved, publishes the parsed
//! findings, and serves quick fixes for the messages the fix table
//! recognizes.

mod conversion;
mod state;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService, Server};
use tracing::{debug, error, info};

use bettyfix_core::{
    Config, Document, DocumentDiagnostics, TextEdit as BettyTextEdit, fix_all, fix_for,
};
use bettyfix_runner::{BettyRunner, RunnerError};

use crate::conversion::{to_lsp_diagnostic, to_lsp_edit};
use crate::state::{BackendState, DocumentData};

/// Command id for the highlighting toggle.
pub const TOGGLE_COMMAND: &str = "bettyfix.toggle";

/// The LSP backend for bettyfix.
#[derive(Clone)]
pub struct Backend {
    /// LSP client for sending notifications.
    client: Client,
    /// Shared state
    state: Arc<BackendState>,
}

impl Backend {
    /// Creates a new backend with the given client.
    ///
    /// Starts with a default betty configuration; a workspace config file
    /// replaces it during `initialize`.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            state: Arc::new(BackendState::new()),
        }
    }

    /// Runs betty for a document and publishes the findings.
    ///
    /// Betty reads the file from disk, so callers invoke this on open and
    /// save when buffer and disk agree. The result is dropped when the
    /// document version moved on while betty ran; the next save will
    /// supersede it anyway.
    async fn check_and_publish(&self, uri: &Url, version: i32) {
        if !self.state.enabled.load(Ordering::Relaxed) {
            return;
        }

        let path = match uri.to_file_path() {
            Ok(p) => p,
            Err(_) => {
                debug!("Skipping non-file URI: {}", uri);
                return;
            }
        };

        let runner = {
            let guard = match self.state.runner.read() {
                Ok(g) => g,
                Err(e) => {
                    error!("Runner lock poisoned: {}", e);
                    return;
                }
            };
            guard.clone()
        };

        let output = match runner.run(&path).await {
            Ok(output) => output,
            Err(RunnerError::ToolMissing) => {
                self.notify_tool_missing().await;
                // Previous findings stay published; they may still be valid.
                return;
            }
            Err(e) => {
                error!("betty failed for {}: {}", path.display(), e);
                return;
            }
        };

        self.state.note_tool_seen();

        // Spans are measured against the text as it is now; re-read it and
        // drop the run if the document changed while betty was working.
        let Some(text) = self.state.text_at_version(uri, version) else {
            return;
        };

        let document = Document::new(&text);
        let set = DocumentDiagnostics::from_output(&output, &document);
        let lsp_diagnostics: Vec<Diagnostic> = set
            .diagnostics()
            .iter()
            .map(|diag| to_lsp_diagnostic(diag, &document))
            .collect();

        {
            let mut sets = match self.state.diagnostics.write() {
                Ok(g) => g,
                Err(e) => {
                    error!("Diagnostics lock poisoned: {}", e);
                    return;
                }
            };
            sets.insert(uri.clone(), set);
        }

        self.client
            .publish_diagnostics(uri.clone(), lsp_diagnostics, Some(version))
            .await;
    }

    /// Shows the missing-tool error once per failure streak.
    async fn notify_tool_missing(&self) {
        if self.state.note_tool_missing() {
            self.client
                .show_message(
                    MessageType::ERROR,
                    "betty executable not found; install betty or set betty_path in .bettyfix.jsonc",
                )
                .await;
        }
    }

    /// Flips highlighting on or off.
    ///
    /// Re-enabling rechecks every open document; disabling clears what is
    /// published without touching the document cache.
    async fn toggle(&self) {
        let enabled = !self.state.enabled.fetch_xor(true, Ordering::Relaxed);

        if enabled {
            let open: Vec<(Url, i32)> = {
                let docs = match self.state.documents.read() {
                    Ok(g) => g,
                    Err(e) => {
                        error!("Documents lock poisoned: {}", e);
                        return;
                    }
                };
                docs.iter().map(|(uri, data)| (uri.clone(), data.version)).collect()
            };
            for (uri, version) in open {
                self.check_and_publish(&uri, version).await;
            }
        } else {
            let published: Vec<Url> = {
                let mut sets = match self.state.diagnostics.write() {
                    Ok(g) => g,
                    Err(e) => {
                        error!("Diagnostics lock poisoned: {}", e);
                        return;
                    }
                };
                let uris = sets.keys().cloned().collect();
                sets.clear();
                uris
            };
            for uri in published {
                self.client.publish_diagnostics(uri, vec![], None).await;
            }
        }

        let word = if enabled { "enabled" } else { "disabled" };
        self.client
            .show_message(MessageType::INFO, format!("betty highlighting {word}"))
            .await;
    }

    /// Loads a workspace config file into the runner, when one exists.
    fn load_workspace_config(&self, root: &std::path::Path) {
        let Some(config_path) = Config::discover(root) else {
            return;
        };
        info!("Found config file: {}", config_path.display());
        match Config::from_file(&config_path) {
            Ok(config) => match self.state.runner.write() {
                Ok(mut runner) => {
                    *runner = BettyRunner::new(config);
                    info!("Runner re-initialized with workspace config");
                }
                Err(e) => error!("Runner lock poisoned: {}", e),
            },
            Err(e) => error!("Failed to load config: {}", e),
        }
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        info!("bettyfix LSP server initializing...");

        if let Some(path) = params.root_uri.and_then(|u| u.to_file_path().ok()) {
            self.load_workspace_config(&path);
        }

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(
                    TextDocumentSyncOptions {
                        open_close: Some(true),
                        change: Some(TextDocumentSyncKind::FULL),
                        save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                            include_text: Some(true),
                        })),
                        ..Default::default()
                    },
                )),
                // Code action support for auto-fix
                code_action_provider: Some(CodeActionProviderCapability::Options(
                    CodeActionOptions {
                        code_action_kinds: Some(vec![
                            CodeActionKind::QUICKFIX,
                            CodeActionKind::SOURCE_FIX_ALL,
                        ]),
                        resolve_provider: Some(false),
                        work_done_progress_options: Default::default(),
                    },
                )),
                // Line findings on hover
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                execute_command_provider: Some(ExecuteCommandOptions {
                    commands: vec![TOGGLE_COMMAND.to_string()],
                    work_done_progress_options: Default::default(),
                }),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "bettyfix-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "bettyfix LSP server initialized!")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        info!("bettyfix LSP server shutting down...");
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        if params.text_document.language_id != "c" {
            debug!(
                "Ignoring non-C document: {} ({})",
                params.text_document.uri, params.text_document.language_id
            );
            return;
        }
        debug!("Document opened: {}", params.text_document.uri);

        {
            let mut docs = match self.state.documents.write() {
                Ok(guard) => guard,
                Err(e) => {
                    error!("Documents lock poisoned: {}", e);
                    return;
                }
            };
            docs.insert(
                params.text_document.uri.clone(),
                DocumentData {
                    text: params.text_document.text,
                    version: params.text_document.version,
                },
            );
        }

        self.check_and_publish(&params.text_document.uri, params.text_document.version)
            .await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        // Full sync: the last change carries the whole document. Checking
        // waits for the save, when buffer and disk agree again.
        if let Some(change) = params.content_changes.into_iter().next_back() {
            let mut docs = match self.state.documents.write() {
                Ok(guard) => guard,
                Err(e) => {
                    error!("Documents lock poisoned: {}", e);
                    return;
                }
            };
            if let Some(data) = docs.get_mut(&params.text_document.uri) {
                data.text = change.text;
                data.version = params.text_document.version;
            }
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        debug!("Document saved: {}", params.text_document.uri);

        let version = {
            let mut docs = match self.state.documents.write() {
                Ok(guard) => guard,
                Err(e) => {
                    error!("Documents lock poisoned: {}", e);
                    return;
                }
            };
            match docs.get_mut(&params.text_document.uri) {
                Some(data) => {
                    if let Some(text) = params.text {
                        data.text = text;
                    }
                    Some(data.version)
                }
                // Not a tracked C document.
                None => None,
            }
        };

        if let Some(version) = version {
            self.check_and_publish(&params.text_document.uri, version).await;
        }
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        let config_changed = params.changes.iter().any(|change| {
            let path = change.uri.path();
            Config::CONFIG_FILES.iter().any(|name| path.ends_with(name))
        });

        if config_changed {
            info!("Configuration file changed, reloading...");
            let root = params.changes.first().and_then(|change| {
                change
                    .uri
                    .to_file_path()
                    .ok()
                    .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            });
            if let Some(root) = root {
                self.load_workspace_config(&root);
            }
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        debug!("Document closed: {}", params.text_document.uri);

        {
            let mut docs = match self.state.documents.write() {
                Ok(guard) => guard,
                Err(e) => {
                    error!("Documents lock poisoned: {}", e);
                    return;
                }
            };
            docs.remove(&params.text_document.uri);
        }
        {
            let mut sets = match self.state.diagnostics.write() {
                Ok(guard) => guard,
                Err(e) => {
                    error!("Diagnostics lock poisoned: {}", e);
                    return;
                }
            };
            sets.remove(&params.text_document.uri);
        }

        self.client
            .publish_diagnostics(params.text_document.uri, vec![], None)
            .await;
    }

    async fn code_action(&self, params: CodeActionParams) -> Result<Option<CodeActionResponse>> {
        debug!("Code action request: {}", params.text_document.uri);

        let uri = &params.text_document.uri;
        let text = {
            let docs = match self.state.documents.read() {
                Ok(guard) => guard,
                Err(e) => {
                    error!("Documents lock poisoned: {}", e);
                    return Ok(None);
                }
            };
            match docs.get(uri) {
                Some(data) => data.text.clone(),
                None => return Ok(None),
            }
        };

        // The last completed betty run is the single source of truth for
        // what is fixable; no re-run here.
        let diagnostics = {
            let sets = match self.state.diagnostics.read() {
                Ok(guard) => guard,
                Err(e) => {
                    error!("Diagnostics lock poisoned: {}", e);
                    return Ok(None);
                }
            };
            match sets.get(uri) {
                Some(set) => set.diagnostics().to_vec(),
                None => return Ok(None),
            }
        };

        let document = Document::new(&text);
        let mut actions = Vec::new();

        // A missing `only` filter allows every action kind.
        let (wants_fix_all, wants_quickfix) = match &params.context.only {
            Some(only) => (
                only.contains(&CodeActionKind::SOURCE_FIX_ALL),
                only.contains(&CodeActionKind::QUICKFIX),
            ),
            None => (true, true),
        };

        if wants_fix_all {
            let action = fix_all(&document);
            if !action.edits.is_empty() {
                actions.push(CodeActionOrCommand::CodeAction(CodeAction {
                    title: action.title,
                    kind: Some(CodeActionKind::SOURCE_FIX_ALL),
                    edit: Some(workspace_edit(uri, &document, &action.edits)),
                    ..Default::default()
                }));
            }
        }

        if !wants_quickfix {
            return Ok(Some(actions));
        }

        for diag in &diagnostics {
            if diag.line < params.range.start.line || diag.line > params.range.end.line {
                continue;
            }
            let Some(action) = fix_for(&document, diag) else {
                continue;
            };
            if action.edits.is_empty() {
                continue;
            }
            actions.push(CodeActionOrCommand::CodeAction(CodeAction {
                title: action.title,
                kind: Some(CodeActionKind::QUICKFIX),
                diagnostics: Some(vec![to_lsp_diagnostic(diag, &document)]),
                edit: Some(workspace_edit(uri, &document, &action.edits)),
                ..Default::default()
            }));
        }

        Ok(Some(actions))
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let position = params.text_document_position_params;
        let uri = &position.text_document.uri;
        let line = position.position.line;

        let sets = match self.state.diagnostics.read() {
            Ok(guard) => guard,
            Err(e) => {
                error!("Diagnostics lock poisoned: {}", e);
                return Ok(None);
            }
        };
        let Some(set) = sets.get(uri) else {
            return Ok(None);
        };

        // One slot per line: the error shadows the warning.
        Ok(set.index().message_at(line).map(|message| Hover {
            contents: HoverContents::Scalar(MarkedString::String(format!("betty: {message}"))),
            range: None,
        }))
    }

    async fn execute_command(
        &self,
        params: ExecuteCommandParams,
    ) -> Result<Option<serde_json::Value>> {
        match params.command.as_str() {
            TOGGLE_COMMAND => {
                self.toggle().await;
                Ok(None)
            }
            other => {
                debug!("Ignoring unknown command: {}", other);
                Ok(None)
            }
        }
    }
}

fn workspace_edit(uri: &Url, document: &Document, edits: &[BettyTextEdit]) -> WorkspaceEdit {
    WorkspaceEdit {
        changes: Some(HashMap::from([(
            uri.clone(),
            edits.iter().map(|edit| to_lsp_edit(edit, document)).collect(),
        )])),
        ..Default::default()
    }
}

/// Starts the LSP server.
///
/// This function does not return unless an error occurs or the server shuts down.
pub async fn run() {
    info!("bettyfix LSP server starting...");

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(Backend::new);
    Server::new(stdin, stdout, socket).serve(service).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use bettyfix_core::TextEdit as CoreTextEdit;

    #[test]
    fn test_workspace_edit_targets_one_document() {
        let uri = Url::parse("file:///tmp/main.c").unwrap();
        let document = Document::new("int x;   \nint y;\n");
        let edits = vec![CoreTextEdit::delete(0, 6, 9), CoreTextEdit::insert(1, 0, "\n")];

        let ws = workspace_edit(&uri, &document, &edits);
        let changes = ws.changes.unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[&uri].len(), 2);
        assert_eq!(changes[&uri][0].new_text, "");
        assert_eq!(changes[&uri][1].new_text, "\n");
    }
}
