//! Session state
//!
//! `Session` is the explicit state container the UI talks to: the
//! document store, the active document with its review state, the upload
//! queue and the status line. It is cheap to clone; clones share state.
//! The lock is never held across an `.await`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use shield_client::{Backend, ClientError};
use shield_core::{resolve_overlaps, Document, DocumentSummary, PageInfo, Region, SourceFile, UploadItem};
use shield_review::ReviewState;

use crate::cancel::{RequestScope, RequestTicket};
use crate::config::AppConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Upload,
    Viewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub text: String,
}

/// What a handler did with its request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Local state reflects the server's answer.
    Applied,
    /// Nothing to do (no active document, unknown region, empty batch).
    Skipped,
    /// The backend call failed; the optimistic local change is kept.
    Failed(String),
    /// The answer arrived for a document that is no longer active, or the
    /// request was cancelled.
    Discarded,
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied)
    }
}

/// Listing of every document the backend holds.
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    docs: Vec<DocumentSummary>,
}

impl DocumentStore {
    pub fn all(&self) -> &[DocumentSummary] {
        &self.docs
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn get(&self, doc_id: &str) -> Option<&DocumentSummary> {
        self.docs.iter().find(|d| d.doc_id == doc_id)
    }

    pub fn replace_all(&mut self, docs: Vec<DocumentSummary>) {
        self.docs = docs;
    }

    pub fn upsert(&mut self, summary: DocumentSummary) {
        match self.docs.iter_mut().find(|d| d.doc_id == summary.doc_id) {
            Some(existing) => *existing = summary,
            None => self.docs.push(summary),
        }
    }

    pub fn remove(&mut self, doc_id: &str) -> Option<DocumentSummary> {
        let idx = self.docs.iter().position(|d| d.doc_id == doc_id)?;
        Some(self.docs.remove(idx))
    }

    pub fn ids_named(&self, original_filename: &str) -> Vec<String> {
        self.docs
            .iter()
            .filter(|d| d.original_filename == original_filename)
            .map(|d| d.doc_id.clone())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedUpload {
    pub item_id: String,
    pub name: String,
    pub error: String,
}

/// Aggregate retry/dismiss prompt shown after a batch with failures.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RetryPrompt {
    pub failed: Vec<FailedUpload>,
}

#[derive(Debug, Default)]
pub struct Workspace {
    pub(crate) documents: DocumentStore,
    pub(crate) active_doc_id: Option<String>,
    pub(crate) active_pages: Vec<PageInfo>,
    pub(crate) review: ReviewState,
    pub(crate) uploads: Vec<UploadItem>,
    /// Files behind queue items, kept so failed uploads can be resubmitted.
    pub(crate) retained_files: HashMap<String, SourceFile>,
    pub(crate) retry_prompt: Option<RetryPrompt>,
    pub(crate) view: View,
    pub(crate) status: Option<StatusMessage>,
    pub(crate) clipboard: Vec<Region>,
}

impl Workspace {
    pub(crate) fn is_active(&self, doc_id: &str) -> bool {
        self.active_doc_id.as_deref() == Some(doc_id)
    }

    pub(crate) fn set_status(&mut self, kind: StatusKind, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            kind,
            text: text.into(),
        });
    }

    /// Run the current regions through the overlap resolver.
    pub(crate) fn relayout(&mut self) {
        let resolved = resolve_overlaps(self.review.regions());
        let moved = resolved
            .iter()
            .zip(self.review.regions())
            .filter(|(after, before)| after.bbox != before.bbox)
            .count();
        log::debug!("[Layout] {} regions, {} adjusted", resolved.len(), moved);
        self.review.store_mut().set_regions(resolved);
    }

    /// Keep the listing entry of the active document in line with its regions.
    pub(crate) fn sync_active_summary(&mut self) {
        let Some(doc_id) = self.active_doc_id.clone() else {
            return;
        };
        let regions = self.review.regions();
        let regions_count = regions.len();
        let protected = shield_core::is_protected(regions);
        if let Some(summary) = self.documents.docs.iter_mut().find(|d| d.doc_id == doc_id) {
            summary.regions_count = regions_count;
            summary.is_protected = protected;
        }
    }

    /// Make `doc` the active document with a fresh review state.
    pub(crate) fn activate(&mut self, doc: Document, undo_limit: usize) {
        self.documents.upsert(DocumentSummary::from(&doc));
        self.active_doc_id = Some(doc.doc_id.clone());
        self.active_pages = doc.pages;
        self.review = ReviewState::new(undo_limit);
        self.review.reset(resolve_overlaps(&doc.regions));
        self.view = View::Viewer;
    }
}

/// A request issued against the active document.
pub(crate) struct Call {
    pub doc_id: String,
    pub ticket: RequestTicket,
}

#[derive(Clone)]
pub struct Session {
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) config: Arc<AppConfig>,
    pub(crate) state: Arc<Mutex<Workspace>>,
    pub(crate) scope: Arc<RequestScope>,
}

impl Session {
    pub fn new(backend: Arc<dyn Backend>, config: AppConfig) -> Self {
        let workspace = Workspace {
            review: ReviewState::new(config.undo_limit),
            ..Workspace::default()
        };
        Self {
            backend,
            config: Arc::new(config),
            state: Arc::new(Mutex::new(workspace)),
            scope: Arc::new(RequestScope::default()),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut Workspace) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    // ============ Selectors ============

    pub fn regions(&self) -> Vec<Region> {
        self.with_state(|ws| ws.review.regions().to_vec())
    }

    pub fn region(&self, id: &str) -> Option<Region> {
        self.with_state(|ws| ws.review.store().region(id).cloned())
    }

    pub fn selected_ids(&self) -> Vec<String> {
        self.with_state(|ws| ws.review.store().selected_ids())
    }

    pub fn selected_regions(&self) -> Vec<Region> {
        self.with_state(|ws| ws.review.store().selected_regions())
    }

    pub fn active_doc_id(&self) -> Option<String> {
        self.with_state(|ws| ws.active_doc_id.clone())
    }

    pub fn active_pages(&self) -> Vec<PageInfo> {
        self.with_state(|ws| ws.active_pages.clone())
    }

    pub fn documents(&self) -> Vec<DocumentSummary> {
        self.with_state(|ws| ws.documents.all().to_vec())
    }

    pub fn uploads(&self) -> Vec<UploadItem> {
        self.with_state(|ws| ws.uploads.clone())
    }

    pub fn retained_file_count(&self) -> usize {
        self.with_state(|ws| ws.retained_files.len())
    }

    pub fn retry_prompt(&self) -> Option<RetryPrompt> {
        self.with_state(|ws| ws.retry_prompt.clone())
    }

    pub fn view(&self) -> View {
        self.with_state(|ws| ws.view)
    }

    pub fn set_view(&self, view: View) {
        self.with_state(|ws| ws.view = view);
    }

    pub fn status(&self) -> Option<StatusMessage> {
        self.with_state(|ws| ws.status.clone())
    }

    pub fn clipboard(&self) -> Vec<Region> {
        self.with_state(|ws| ws.clipboard.clone())
    }

    pub fn is_protected(&self) -> bool {
        self.with_state(|ws| shield_core::is_protected(ws.review.regions()))
    }

    // ============ History ============

    pub fn push_undo(&self) {
        self.with_state(|ws| ws.review.push_undo());
    }

    /// Synchronous; in-flight requests are left alone.
    pub fn undo(&self) -> bool {
        self.with_state(|ws| {
            let changed = ws.review.undo();
            ws.sync_active_summary();
            changed
        })
    }

    pub fn redo(&self) -> bool {
        self.with_state(|ws| {
            let changed = ws.review.redo();
            ws.sync_active_summary();
            changed
        })
    }

    pub fn can_undo(&self) -> bool {
        self.with_state(|ws| ws.review.can_undo())
    }

    pub fn can_redo(&self) -> bool {
        self.with_state(|ws| ws.review.can_redo())
    }

    // ============ Selection ============

    pub fn toggle_selected_region_id(&self, id: &str, additive: bool) {
        self.with_state(|ws| ws.review.store_mut().toggle_selected_region_id(id, additive));
    }

    pub fn select_ids(&self, ids: &[String]) {
        self.with_state(|ws| ws.review.store_mut().select_ids(ids.iter().cloned()));
    }

    pub fn clear_selection(&self) {
        self.with_state(|ws| ws.review.store_mut().clear_selection());
    }

    // ============ Documents ============

    /// Abort every request still running for the previous document.
    pub fn cancel_all_requests(&self) {
        self.scope.cancel_all();
    }

    pub async fn refresh_documents(&self) -> Outcome {
        match self.backend.list_documents().await {
            Ok(docs) => {
                log::info!("[Regions] {} documents on backend", docs.len());
                self.with_state(|ws| {
                    ws.documents.replace_all(docs);
                    ws.sync_active_summary();
                });
                Outcome::Applied
            }
            Err(e) => self.report_failure("load documents", &e),
        }
    }

    /// Switch to `doc_id`: cancel outstanding requests, drop history and
    /// selection, then load the document and lay out its regions.
    pub async fn open_document(&self, doc_id: &str) -> Outcome {
        self.scope.cancel_all();
        self.with_state(|ws| {
            ws.active_doc_id = Some(doc_id.to_string());
            ws.active_pages.clear();
            ws.review.reset(Vec::new());
            ws.view = View::Viewer;
        });

        let Some(call) = self.begin() else {
            return Outcome::Skipped;
        };
        let result = call.ticket.run(self.backend.get_document(doc_id)).await;
        let undo_limit = self.config.undo_limit;
        self.finish(&call, "open document", result, |ws, doc| {
            log::info!("[Regions] opened {} ({} regions)", doc.doc_id, doc.regions.len());
            ws.activate(doc, undo_limit);
        })
    }

    /// Re-read the active document's regions from the backend, replacing
    /// the local set. Undoable.
    pub async fn reload_regions(&self) -> Outcome {
        let Some(call) = self.begin() else {
            return Outcome::Skipped;
        };
        let result = call.ticket.run(self.backend.get_regions(&call.doc_id)).await;
        self.finish(&call, "load regions", result, |ws, regions| {
            ws.review.push_undo();
            ws.review.store_mut().set_regions(regions);
            ws.relayout();
        })
    }

    // ============ Request plumbing ============

    /// Issue a ticket for the active document, or `None` if there is none.
    pub(crate) fn begin(&self) -> Option<Call> {
        let doc_id = self.active_doc_id()?;
        Some(Call {
            doc_id,
            ticket: self.scope.ticket(),
        })
    }

    /// Apply `result` if it still belongs to the active document.
    ///
    /// Aborted requests and answers for a superseded document are dropped
    /// without a status message. Failures are logged and surfaced on the
    /// status line; local state is not rolled back.
    pub(crate) fn finish<T>(
        &self,
        call: &Call,
        label: &str,
        result: shield_client::Result<T>,
        apply: impl FnOnce(&mut Workspace, T),
    ) -> Outcome {
        match result {
            Err(e) if e.is_aborted() => {
                log::debug!("[Regions] {} aborted", label);
                Outcome::Discarded
            }
            _ if !call.ticket.is_current() => {
                log::debug!("[Regions] {} answered after cancel, dropped", label);
                Outcome::Discarded
            }
            Err(e) => self.report_failure(label, &e),
            Ok(value) => self.with_state(|ws| {
                if !ws.is_active(&call.doc_id) {
                    log::debug!("[Regions] {} answered for inactive {}, dropped", label, call.doc_id);
                    return Outcome::Discarded;
                }
                apply(ws, value);
                ws.sync_active_summary();
                Outcome::Applied
            }),
        }
    }

    pub(crate) fn report_failure(&self, label: &str, error: &ClientError) -> Outcome {
        let message = format!("Failed to {}: {}", label, error);
        log::warn!("[Regions] {}", message);
        self.with_state(|ws| ws.set_status(StatusKind::Error, message.clone()));
        Outcome::Failed(message)
    }

    pub(crate) fn info(&self, text: impl Into<String>) {
        self.with_state(|ws| ws.set_status(StatusKind::Info, text));
    }
}
