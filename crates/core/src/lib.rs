//! Core model for the region review engine.
//!
//! Regions, documents and upload items, plus the overlap resolver that
//! lays regions out on a page. Nothing in this crate performs I/O.

pub mod document;
pub mod layout;
pub mod region;
pub mod upload;

pub use document::{is_protected, Document, DocumentStatus, DocumentSummary, PageInfo};
pub use layout::{has_overlaps, resolve_overlaps};
pub use region::{
    BBox, DetectionSource, PiiType, Region, RegionAction, RegionPatch, MIN_REGION_PAGE_UNITS,
};
pub use upload::{dedup_by_name, SourceFile, UploadItem, UploadStatus};

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid region {id}: {reason}")]
    InvalidRegion { id: String, reason: &'static str },
    #[error("unknown region: {0}")]
    UnknownRegion(String),
}
