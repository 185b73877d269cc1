use async_trait::async_trait;
use shield_core::{BBox, Document, DocumentSummary, PiiType, Region, RegionAction, SourceFile};

use crate::error::Result;
use crate::types::{
    AddRegionResult, DetectOptions, DetectionResult, HighlightAllResult, Reanalysis,
    RegionSyncItem, RegionUpdate, UploadProgress, UploadResponse,
};

/// The detection service as seen by the review engine.
///
/// [`crate::HttpBackend`] talks to the real service; tests plug in an
/// in-memory implementation.
#[async_trait]
pub trait Backend: Send + Sync {
    // Documents

    async fn list_documents(&self) -> Result<Vec<DocumentSummary>>;

    /// Multipart upload tagged with `progress_token`, which the caller
    /// then polls through [`Backend::upload_progress`].
    async fn upload_document(&self, file: &SourceFile, progress_token: &str) -> Result<UploadResponse>;

    async fn upload_progress(&self, progress_token: &str) -> Result<UploadProgress>;

    async fn get_document(&self, doc_id: &str) -> Result<Document>;

    async fn delete_document(&self, doc_id: &str) -> Result<()>;

    // Detection

    async fn get_regions(&self, doc_id: &str) -> Result<Vec<Region>>;

    async fn detect(&self, doc_id: &str) -> Result<DetectionResult>;

    async fn redetect(&self, doc_id: &str, options: &DetectOptions) -> Result<DetectionResult>;

    async fn reset_detection(&self, doc_id: &str) -> Result<DetectionResult>;

    // Regions

    async fn set_region_action(&self, doc_id: &str, region_id: &str, action: RegionAction) -> Result<()>;

    /// Returns how many regions the server updated.
    async fn batch_action(&self, doc_id: &str, region_ids: &[String], action: RegionAction) -> Result<usize>;

    async fn delete_region(&self, doc_id: &str, region_id: &str) -> Result<()>;

    async fn batch_delete(&self, doc_id: &str, region_ids: &[String]) -> Result<usize>;

    async fn update_bbox(&self, doc_id: &str, region_id: &str, bbox: BBox) -> Result<()>;

    async fn update_label(&self, doc_id: &str, region_id: &str, pii_type: PiiType) -> Result<Vec<RegionUpdate>>;

    async fn update_text(&self, doc_id: &str, region_id: &str, text: &str) -> Result<Vec<RegionUpdate>>;

    async fn reanalyze(&self, doc_id: &str, region_id: &str) -> Result<Reanalysis>;

    async fn highlight_all(&self, doc_id: &str, region_id: &str) -> Result<HighlightAllResult>;

    async fn add_region(&self, doc_id: &str, region: &Region) -> Result<AddRegionResult>;

    async fn sync_regions(&self, doc_id: &str, items: &[RegionSyncItem]) -> Result<usize>;
}
