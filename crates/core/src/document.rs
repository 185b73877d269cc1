//! Document aggregate
//!
//! Mirrors the document record served by the detection service. Only the
//! fields the review engine reads are modelled; anything else in the
//! payload is ignored on decode.

use serde::{Deserialize, Serialize};

use crate::region::{Region, RegionAction};

/// Processing status reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentStatus {
    #[default]
    Uploading,
    Processing,
    Detecting,
    Reviewing,
    Anonymizing,
    Completed,
    Error,
}

/// Page geometry, in page units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    /// 1-based
    pub page_number: u32,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub doc_id: String,
    pub original_filename: String,
    #[serde(default)]
    pub page_count: u32,
    #[serde(default)]
    pub status: DocumentStatus,
    #[serde(default)]
    pub pages: Vec<PageInfo>,
    #[serde(default)]
    pub regions: Vec<Region>,
}

impl Document {
    /// Derived, never stored: see [`is_protected`].
    pub fn is_protected(&self) -> bool {
        is_protected(&self.regions)
    }

    pub fn page(&self, page_number: u32) -> Option<&PageInfo> {
        self.pages.iter().find(|p| p.page_number == page_number)
    }
}

/// A document is protected once nothing is left pending and at least one
/// region is actually redacted or tokenized.
pub fn is_protected(regions: &[Region]) -> bool {
    let any_pending = regions.iter().any(|r| r.action == RegionAction::Pending);
    let any_applied = regions
        .iter()
        .any(|r| matches!(r.action, RegionAction::Tokenize | RegionAction::Remove));
    !any_pending && any_applied
}

/// Lightweight listing entry kept in the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub doc_id: String,
    pub original_filename: String,
    #[serde(default)]
    pub page_count: u32,
    #[serde(default)]
    pub status: DocumentStatus,
    #[serde(default)]
    pub regions_count: usize,
    #[serde(default)]
    pub is_protected: bool,
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        Self {
            doc_id: doc.doc_id.clone(),
            original_filename: doc.original_filename.clone(),
            page_count: doc.page_count,
            status: doc.status,
            regions_count: doc.regions.len(),
            is_protected: doc.is_protected(),
        }
    }
}
