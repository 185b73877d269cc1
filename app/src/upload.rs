//! Upload pipeline
//!
//! Files are taken in batches and uploaded strictly one at a time. While
//! a file is being processed server-side a poller reads the extraction
//! progress into its queue item. A failing file marks only its own item.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use shield_client::{Backend, ClientError, ProgressPhase, UploadProgress};
use shield_core::{dedup_by_name, SourceFile, UploadItem, UploadStatus};
use tokio::task::JoinHandle;

use crate::session::{FailedUpload, RetryPrompt, Session, StatusKind, View, Workspace};

const PROGRESS_UPLOADING: u8 = 5;
const PROGRESS_UPLOADED: u8 = 85;
const PROGRESS_DONE: u8 = 100;

/// What happened to one `handle_files` batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    /// Document ids, in upload order.
    pub uploaded: Vec<String>,
    pub failed: Vec<FailedUpload>,
    /// Set when the batch pushed the document count past the export limit.
    pub over_limit: bool,
}

/// Polls upload progress until dropped.
struct ProgressPoller {
    handle: JoinHandle<()>,
}

impl ProgressPoller {
    fn start(
        backend: Arc<dyn Backend>,
        state: Arc<Mutex<Workspace>>,
        item_id: String,
        token: String,
        every: Duration,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match backend.upload_progress(&token).await {
                    Ok(progress) => {
                        let mut ws = state.lock().unwrap_or_else(PoisonError::into_inner);
                        apply_progress(&mut ws, &item_id, &progress);
                    }
                    Err(e) => log::debug!("[Upload] progress poll for {} failed: {}", item_id, e),
                }
            }
        });
        Self { handle }
    }
}

impl Drop for ProgressPoller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn apply_progress(ws: &mut Workspace, item_id: &str, progress: &UploadProgress) {
    let Some(item) = ws.uploads.iter_mut().find(|i| i.id == item_id) else {
        return;
    };
    if item.status != UploadStatus::Uploading {
        return;
    }
    item.set_progress(item.progress.max(progress.percent()));
    item.ocr_phase = Some(progress.phase.to_string());
    if !progress.message.is_empty() {
        item.ocr_message = Some(progress.message.clone());
    }
}

impl Session {
    /// Upload a batch of files.
    ///
    /// Same-named files in the batch collapse to the last one. Every file
    /// gets a queue item up front, then they are uploaded in order. Done
    /// items leave the queue when the batch ends; failed ones stay, and a
    /// retry prompt lists them.
    pub async fn handle_files(&self, files: Vec<SourceFile>) -> UploadReport {
        let files = dedup_by_name(files);
        let mut report = UploadReport::default();
        if files.is_empty() {
            return report;
        }

        let limit = self.config.export_batch_limit;
        let projected = self.with_state(|ws| {
            let replaced = ws
                .documents
                .all()
                .iter()
                .filter(|d| files.iter().any(|f| f.name == d.original_filename))
                .count();
            ws.documents.len() - replaced + files.len()
        });
        if projected > limit {
            report.over_limit = true;
            let text = format!(
                "{} documents exceed the export limit of {}; export will need several runs",
                projected, limit
            );
            log::warn!("[Upload] {}", text);
            self.with_state(|ws| ws.set_status(StatusKind::Warning, text));
        }

        let batch: Vec<(String, SourceFile)> = files
            .into_iter()
            .map(|file| (uuid::Uuid::new_v4().to_string(), file))
            .collect();
        self.with_state(|ws| {
            for (id, file) in &batch {
                ws.uploads
                    .push(UploadItem::queued(id.clone(), file.name.clone(), file.parent_path.clone()));
                ws.retained_files.insert(id.clone(), file.clone());
            }
            ws.view = View::Viewer;
        });
        log::info!("[Upload] queued {} files", batch.len());

        for (item_id, file) in &batch {
            match self.upload_one(item_id, file).await {
                Ok(doc_id) => {
                    log::info!("[Upload] {} -> {}", file.name, doc_id);
                    report.uploaded.push(doc_id);
                }
                Err(e) => {
                    let error = e.to_string();
                    log::error!("[Upload] {} failed: {}", file.name, error);
                    self.update_item(item_id, |item| item.fail(error.clone()));
                    report.failed.push(FailedUpload {
                        item_id: item_id.clone(),
                        name: file.name.clone(),
                        error,
                    });
                }
            }
        }

        self.with_state(|ws| {
            ws.uploads.retain(|item| item.status != UploadStatus::Done);
            let uploads = &ws.uploads;
            ws.retained_files
                .retain(|id, _| uploads.iter().any(|item| &item.id == id));
            // failures left over from earlier batches stay retryable
            let failed: Vec<FailedUpload> = ws
                .uploads
                .iter()
                .filter(|item| item.status == UploadStatus::Error)
                .map(|item| FailedUpload {
                    item_id: item.id.clone(),
                    name: item.name.clone(),
                    error: item.error.clone().unwrap_or_default(),
                })
                .collect();
            ws.retry_prompt = (!failed.is_empty()).then_some(RetryPrompt { failed });
            if report.failed.is_empty() {
                ws.set_status(
                    StatusKind::Info,
                    format!("Uploaded {} documents", report.uploaded.len()),
                );
            } else {
                ws.set_status(
                    StatusKind::Error,
                    format!("{} of {} uploads failed", report.failed.len(), batch.len()),
                );
            }
        });
        report
    }

    async fn upload_one(&self, item_id: &str, file: &SourceFile) -> Result<String, ClientError> {
        self.update_item(item_id, |item| {
            item.advance(UploadStatus::Uploading, PROGRESS_UPLOADING);
        });

        self.delete_same_named(&file.name).await;

        let token = uuid::Uuid::new_v4().simple().to_string();
        let poller = ProgressPoller::start(
            Arc::clone(&self.backend),
            Arc::clone(&self.state),
            item_id.to_string(),
            token.clone(),
            Duration::from_millis(self.config.poll_interval_ms.max(1)),
        );
        let uploaded = self.backend.upload_document(file, &token).await;
        drop(poller);
        let uploaded = uploaded?;

        self.with_state(|ws| ws.documents.upsert(uploaded.summary()));
        self.update_item(item_id, |item| {
            item.set_progress(PROGRESS_UPLOADED);
            item.ocr_phase = Some(ProgressPhase::Complete.to_string());
        });

        let doc = self.backend.get_document(&uploaded.doc_id).await?;
        let doc_id = doc.doc_id.clone();
        self.scope.cancel_all();
        let undo_limit = self.config.undo_limit;
        self.with_state(|ws| ws.activate(doc, undo_limit));

        self.update_item(item_id, |item| {
            item.advance(UploadStatus::Done, PROGRESS_DONE);
        });
        Ok(doc_id)
    }

    /// Remove documents already stored under `name`. Failures are logged and
    /// the upload carries on.
    async fn delete_same_named(&self, name: &str) {
        let existing = self.with_state(|ws| ws.documents.ids_named(name));
        for doc_id in existing {
            match self.backend.delete_document(&doc_id).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    log::warn!("[Upload] could not replace {} ({}): {}", name, doc_id, e);
                    continue;
                }
            }
            log::info!("[Upload] replaced existing {} ({})", name, doc_id);
            self.with_state(|ws| {
                ws.documents.remove(&doc_id);
                if ws.is_active(&doc_id) {
                    ws.active_doc_id = None;
                    ws.active_pages.clear();
                    ws.review.reset(Vec::new());
                }
            });
        }
    }

    fn update_item(&self, item_id: &str, f: impl FnOnce(&mut UploadItem)) {
        self.with_state(|ws| {
            if let Some(item) = ws.uploads.iter_mut().find(|i| i.id == item_id) {
                f(item);
            }
        });
    }

    /// Resubmit the files behind the failed items as a fresh batch.
    pub async fn retry_failed(&self) -> UploadReport {
        let files = self.with_state(|ws| {
            let Some(prompt) = ws.retry_prompt.take() else {
                return Vec::new();
            };
            let mut files = Vec::new();
            for failed in &prompt.failed {
                ws.uploads.retain(|item| item.id != failed.item_id);
                if let Some(file) = ws.retained_files.remove(&failed.item_id) {
                    files.push(file);
                }
            }
            files
        });
        if files.is_empty() {
            return UploadReport::default();
        }
        log::info!("[Upload] retrying {} files", files.len());
        self.handle_files(files).await
    }

    /// Give up on the failed items and release their files.
    pub fn dismiss_failed(&self) {
        self.with_state(|ws| {
            ws.retry_prompt = None;
            ws.retained_files.clear();
            ws.uploads.retain(|item| item.status != UploadStatus::Error);
        });
    }
}
