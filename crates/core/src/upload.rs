//! Upload queue items and the files behind them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Per-file status in the upload queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    #[default]
    Queued,
    Uploading,
    Detecting,
    Done,
    Error,
}

impl UploadStatus {
    fn rank(self) -> u8 {
        match self {
            UploadStatus::Queued => 0,
            UploadStatus::Uploading => 1,
            UploadStatus::Detecting => 2,
            UploadStatus::Done => 3,
            UploadStatus::Error => 4,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, UploadStatus::Done | UploadStatus::Error)
    }
}

/// One entry of the visible upload queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadItem {
    pub id: String,
    pub name: String,
    pub parent_path: String,
    pub status: UploadStatus,
    /// 0-100
    pub progress: u8,
    pub ocr_phase: Option<String>,
    pub ocr_message: Option<String>,
    pub error: Option<String>,
}

impl UploadItem {
    pub fn queued(id: impl Into<String>, name: impl Into<String>, parent_path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent_path: parent_path.into(),
            status: UploadStatus::Queued,
            progress: 0,
            ocr_phase: None,
            ocr_message: None,
            error: None,
        }
    }

    /// Move forward through `queued → uploading → detecting → done`.
    ///
    /// Returns `false` (and changes nothing) for a backward step or for
    /// any step out of a terminal state. Use [`UploadItem::fail`] for errors.
    pub fn advance(&mut self, status: UploadStatus, progress: u8) -> bool {
        if self.status.is_terminal() || status == UploadStatus::Error {
            return false;
        }
        if status.rank() < self.status.rank() {
            return false;
        }
        self.status = status;
        self.progress = progress.min(100);
        true
    }

    /// Progress update within the current state; ignored once terminal.
    pub fn set_progress(&mut self, progress: u8) {
        if !self.status.is_terminal() {
            self.progress = progress.min(100);
        }
    }

    /// Any state may fail. An item that already failed keeps its first error.
    pub fn fail(&mut self, message: impl Into<String>) {
        if self.status == UploadStatus::Error {
            return;
        }
        self.status = UploadStatus::Error;
        self.error = Some(message.into());
    }
}

/// A file selected for upload, held in memory so a failed upload can be
/// resubmitted without asking the user to pick it again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub parent_path: String,
    pub data: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            parent_path: String::new(),
            data,
        }
    }

    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let data = std::fs::read(path)?;
        let name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let parent_path = path
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(Self {
            name,
            parent_path,
            data,
        })
    }
}

/// Drop earlier files that share a name with a later one in the same batch.
///
/// The surviving files keep the position of their last occurrence, so
/// `[a, b, a']` becomes `[b, a']`.
pub fn dedup_by_name(files: Vec<SourceFile>) -> Vec<SourceFile> {
    let mut last_seen: HashMap<String, usize> = HashMap::new();
    for (idx, file) in files.iter().enumerate() {
        last_seen.insert(file.name.clone(), idx);
    }
    files
        .into_iter()
        .enumerate()
        .filter(|(idx, file)| last_seen.get(&file.name) == Some(idx))
        .map(|(_, file)| file)
        .collect()
}
