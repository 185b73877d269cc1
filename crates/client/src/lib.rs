//! Client for the document and PII-detection service.
//!
//! The [`Backend`] trait is the seam the review engine depends on;
//! [`HttpBackend`] is the production implementation.

pub mod backend;
pub mod error;
pub mod http;
pub mod types;

pub use backend::Backend;
pub use error::{ClientError, Result};
pub use http::{HttpBackend, API_PREFIX};
pub use types::{
    AddRegionResult, BlacklistAction, DetectOptions, DetectionResult, HighlightAllResult,
    ProgressPhase, Reanalysis, RegionSyncItem, RegionUpdate, UpdatedRegions, UploadProgress,
    UploadResponse,
};
