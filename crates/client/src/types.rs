//! Wire types for the detection service.
//!
//! Field names follow the service's snake_case JSON. Unknown fields in
//! responses are ignored.

use serde::{Deserialize, Serialize};
use shield_core::{
    BBox, DetectionSource, DocumentStatus, DocumentSummary, PiiType, Region, RegionAction,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub doc_id: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub page_count: u32,
    #[serde(default)]
    pub status: DocumentStatus,
}

impl UploadResponse {
    /// Listing entry for a document that was stored but not fetched yet.
    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            doc_id: self.doc_id.clone(),
            original_filename: self.filename.clone(),
            page_count: self.page_count,
            status: self.status,
            regions_count: 0,
            is_protected: false,
        }
    }
}

/// Extraction phase reported while an upload is being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProgressPhase {
    Starting,
    Extracting,
    Ocr,
    Complete,
    #[default]
    #[serde(other)]
    Idle,
}

impl std::fmt::Display for ProgressPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProgressPhase::Starting => write!(f, "starting"),
            ProgressPhase::Extracting => write!(f, "extracting"),
            ProgressPhase::Ocr => write!(f, "ocr"),
            ProgressPhase::Complete => write!(f, "complete"),
            ProgressPhase::Idle => write!(f, "idle"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct UploadProgress {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub phase: ProgressPhase,
    #[serde(default)]
    pub current_page: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub ocr_pages_done: u32,
    #[serde(default)]
    pub ocr_pages_total: u32,
    #[serde(default)]
    pub message: String,
}

impl UploadProgress {
    /// Map the backend phase onto the 0-100 progress bar.
    ///
    /// `starting` is 10, `extracting` spans 10-40 by page, `ocr` spans
    /// 40-80 by OCR'd page, anything else sits at 80. Zero totals count
    /// as no progress within the phase.
    pub fn percent(&self) -> u8 {
        fn ratio(done: u32, total: u32) -> f64 {
            if total == 0 {
                0.0
            } else {
                (f64::from(done) / f64::from(total)).clamp(0.0, 1.0)
            }
        }
        let value = match self.phase {
            ProgressPhase::Starting => 10.0,
            ProgressPhase::Extracting => 10.0 + 30.0 * ratio(self.current_page, self.total_pages),
            ProgressPhase::Ocr => 40.0 + 40.0 * ratio(self.ocr_pages_done, self.ocr_pages_total),
            _ => 80.0,
        };
        value.round() as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BlacklistAction {
    #[default]
    None,
    Tokenize,
    Remove,
}

/// Options for a full re-detection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectOptions {
    pub confidence_threshold: f64,
    /// `None` runs every page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    pub regex_enabled: bool,
    pub ner_enabled: bool,
    pub llm_detection_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regex_types: Option<Vec<PiiType>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ner_types: Option<Vec<PiiType>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blacklist_terms: Option<Vec<String>>,
    pub blacklist_action: BlacklistAction,
    /// 1.0 is an exact match; lower values allow fuzzier matches (min 0.5).
    pub blacklist_fuzziness: f64,
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.55,
            page_number: None,
            regex_enabled: true,
            ner_enabled: true,
            llm_detection_enabled: true,
            regex_types: None,
            ner_types: None,
            blacklist_terms: None,
            blacklist_action: BlacklistAction::None,
            blacklist_fuzziness: 1.0,
        }
    }
}

/// Result of `detect`, `redetect` and `reset-detection`. The server's
/// region list is authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DetectionResult {
    #[serde(default)]
    pub doc_id: String,
    #[serde(default)]
    pub regions: Vec<Region>,
    #[serde(default)]
    pub total_regions: usize,
    #[serde(default)]
    pub added: usize,
    #[serde(default)]
    pub updated: usize,
    #[serde(default)]
    pub removed: usize,
    #[serde(default)]
    pub cleared: usize,
}

/// Per-region change the server propagated, e.g. to siblings sharing the
/// same text after a label edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionUpdate {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pii_type: Option<PiiType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatedRegions {
    #[serde(default)]
    pub updated: Vec<RegionUpdate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reanalysis {
    pub region_id: String,
    #[serde(default)]
    pub text: String,
    pub pii_type: PiiType,
    #[serde(default)]
    pub confidence: f64,
    pub source: DetectionSource,
}

/// Regions created server-side by highlight-all or a manual add.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HighlightAllResult {
    #[serde(default)]
    pub created: usize,
    #[serde(default)]
    pub new_regions: Vec<Region>,
    /// Every id in the occurrence set, pre-existing and new.
    #[serde(default)]
    pub all_ids: Vec<String>,
    /// Existing regions the server cancelled in favour of the new ones.
    #[serde(default)]
    pub cancelled_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddRegionResult {
    pub region_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub pii_type: PiiType,
    pub bbox: BBox,
    #[serde(default)]
    pub new_regions: Vec<Region>,
    #[serde(default)]
    pub all_ids: Vec<String>,
    #[serde(default)]
    pub cancelled_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSyncItem {
    pub id: String,
    pub action: RegionAction,
    pub bbox: BBox,
}

impl From<&Region> for RegionSyncItem {
    fn from(region: &Region) -> Self {
        Self {
            id: region.id.clone(),
            action: region.action,
            bbox: region.bbox,
        }
    }
}

// Request bodies

#[derive(Debug, Serialize)]
pub(crate) struct ActionBody<'a> {
    pub region_id: &'a str,
    pub action: RegionAction,
}

#[derive(Debug, Serialize)]
pub(crate) struct BatchBody<'a> {
    pub region_ids: &'a [String],
    pub action: RegionAction,
}

#[derive(Debug, Serialize)]
pub(crate) struct LabelBody {
    pub pii_type: PiiType,
}

#[derive(Debug, Serialize)]
pub(crate) struct TextBody<'a> {
    pub text: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct HighlightBody<'a> {
    pub region_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BatchActionResponse {
    #[serde(default)]
    pub updated: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BatchDeleteResponse {
    #[serde(default)]
    pub deleted: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SyncResponse {
    #[serde(default)]
    pub synced: usize,
}
