//! Shared backend state.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use tower_lsp::lsp_types::Url;
use tracing::{debug, error};

use bettyfix_core::DocumentDiagnostics;
use bettyfix_runner::BettyRunner;

/// Cached content of one open document.
#[derive(Debug)]
pub(crate) struct DocumentData {
    pub text: String,
    pub version: i32,
}

/// State shared across request handlers.
///
/// Guarded with std locks; every handler copies what it needs out before
/// awaiting so no guard is ever held across an await point.
#[derive(Debug)]
pub(crate) struct BackendState {
    /// Open C documents, keyed by URI.
    pub documents: RwLock<HashMap<Url, DocumentData>>,
    /// Last completed betty run per document; what fix and hover requests read.
    pub diagnostics: RwLock<HashMap<Url, DocumentDiagnostics>>,
    /// The configured betty invoker, replaced when a config file is found.
    pub runner: RwLock<BettyRunner>,
    /// Whether checking and publishing is switched on.
    pub enabled: AtomicBool,
    /// Latched after the missing-tool notification so it fires once per
    /// failure streak; reset by the next successful run.
    pub tool_missing_notified: AtomicBool,
}

impl BackendState {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            diagnostics: RwLock::new(HashMap::new()),
            runner: RwLock::new(BettyRunner::new(Default::default())),
            enabled: AtomicBool::new(true),
            tool_missing_notified: AtomicBool::new(false),
        }
    }

    /// The document's text, provided it still sits at `version`.
    ///
    /// `None` means the document changed or closed while betty ran; the
    /// caller drops the stale result, since the next check supersedes it.
    pub fn text_at_version(&self, uri: &Url, version: i32) -> Option<String> {
        let docs = match self.documents.read() {
            Ok(g) => g,
            Err(e) => {
                error!("Documents lock poisoned: {}", e);
                return None;
            }
        };
        match docs.get(uri) {
            Some(data) if data.version == version => Some(data.text.clone()),
            Some(_) => {
                debug!("Document changed during betty run, dropping stale result");
                None
            }
            None => None,
        }
    }

    /// Latches the missing-tool flag; true when this failure starts a
    /// streak and the user should be told.
    pub fn note_tool_missing(&self) -> bool {
        !self.tool_missing_notified.swap(true, Ordering::Relaxed)
    }

    /// Clears the missing-tool latch after a successful run, so the next
    /// failure streak notifies again.
    pub fn note_tool_seen(&self) {
        self.tool_missing_notified.store(false, Ordering::Relaxed);
    }
}
