//! PII region model
//!
//! A region is one detected (or manually drawn) span of personal data,
//! anchored to a bounding box on a single page. Coordinates are page
//! units, not pixels.

use serde::{Deserialize, Serialize};

use crate::{CoreError, Result};

/// Smallest width and height a region may have, in page units.
pub const MIN_REGION_PAGE_UNITS: f64 = 5.0;

/// Bounding box in page coordinates (origin top-left).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BBox {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    /// Open-interval AABB test: boxes that only share an edge do not overlap.
    pub fn overlaps(&self, other: &BBox) -> bool {
        self.x0 < other.x1 && self.x1 > other.x0 && self.y0 < other.y1 && self.y1 > other.y0
    }

    pub fn translate(&self, dx: f64, dy: f64) -> BBox {
        BBox {
            x0: self.x0 + dx,
            y0: self.y0 + dy,
            x1: self.x1 + dx,
            y1: self.y1 + dy,
        }
    }

    /// Grow a too-small box to the minimum size.
    ///
    /// Only the far edges move (`x1` to the right, `y1` downward); the
    /// origin corner stays where the user put it.
    pub fn with_min_size(&self, min: f64) -> BBox {
        let mut out = *self;
        if out.width() < min {
            out.x1 = out.x0 + min;
        }
        if out.height() < min {
            out.y1 = out.y0 + min;
        }
        out
    }

    pub fn is_valid(&self) -> bool {
        let finite = [self.x0, self.y0, self.x1, self.y1]
            .iter()
            .all(|v| v.is_finite());
        finite && self.x1 > self.x0 && self.y1 > self.y0
    }
}

/// Category of personal data carried by a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PiiType {
    Person,
    Org,
    Email,
    Phone,
    Ssn,
    CreditCard,
    Date,
    Address,
    Location,
    IpAddress,
    Iban,
    Passport,
    DriverLicense,
    Custom,
    /// Anything the backend reports that this client does not know yet.
    #[default]
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for PiiType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PiiType::Person => "PERSON",
            PiiType::Org => "ORG",
            PiiType::Email => "EMAIL",
            PiiType::Phone => "PHONE",
            PiiType::Ssn => "SSN",
            PiiType::CreditCard => "CREDIT_CARD",
            PiiType::Date => "DATE",
            PiiType::Address => "ADDRESS",
            PiiType::Location => "LOCATION",
            PiiType::IpAddress => "IP_ADDRESS",
            PiiType::Iban => "IBAN",
            PiiType::Passport => "PASSPORT",
            PiiType::DriverLicense => "DRIVER_LICENSE",
            PiiType::Custom => "CUSTOM",
            PiiType::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// Which detection layer produced a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DetectionSource {
    Regex,
    Ner,
    Gliner,
    Llm,
    Manual,
}

/// Disposition the reviewer chose for a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum RegionAction {
    /// Awaiting a decision
    #[default]
    Pending,
    /// Highlight dismissed, content kept (soft delete)
    Cancel,
    /// Permanently redacted
    Remove,
    /// Replaced with a reversible vault token
    Tokenize,
}

impl std::fmt::Display for RegionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegionAction::Pending => write!(f, "PENDING"),
            RegionAction::Cancel => write!(f, "CANCEL"),
            RegionAction::Remove => write!(f, "REMOVE"),
            RegionAction::Tokenize => write!(f, "TOKENIZE"),
        }
    }
}

/// A detected PII region on a document page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: String,
    pub page_number: u32,
    pub bbox: BBox,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub pii_type: PiiType,
    #[serde(default)]
    pub confidence: f64,
    pub source: DetectionSource,
    #[serde(default)]
    pub char_start: usize,
    #[serde(default)]
    pub char_end: usize,
    #[serde(default)]
    pub action: RegionAction,
    /// Grouping key shared by regions that select as one unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_group: Option<String>,
}

impl Region {
    /// A hand-drawn region with no classification yet.
    pub fn manual(id: impl Into<String>, page_number: u32, bbox: BBox) -> Self {
        Self {
            id: id.into(),
            page_number,
            bbox,
            text: String::new(),
            pii_type: PiiType::Custom,
            confidence: 1.0,
            source: DetectionSource::Manual,
            char_start: 0,
            char_end: 0,
            action: RegionAction::Pending,
            linked_group: None,
        }
    }

    /// Cancelled regions are kept addressable but take no space on the page.
    pub fn is_visible(&self) -> bool {
        self.action != RegionAction::Cancel
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(CoreError::InvalidRegion {
                id: self.id.clone(),
                reason: "empty id",
            });
        }
        if !self.bbox.is_valid() {
            return Err(CoreError::InvalidRegion {
                id: self.id.clone(),
                reason: "degenerate bounding box",
            });
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(CoreError::InvalidRegion {
                id: self.id.clone(),
                reason: "confidence outside [0, 1]",
            });
        }
        Ok(())
    }
}

/// Field-wise partial update applied by `update_region`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionPatch {
    pub text: Option<String>,
    pub pii_type: Option<PiiType>,
    pub confidence: Option<f64>,
    pub source: Option<DetectionSource>,
    pub action: Option<RegionAction>,
    pub bbox: Option<BBox>,
}

impl RegionPatch {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn pii_type(pii_type: PiiType) -> Self {
        Self {
            pii_type: Some(pii_type),
            ..Default::default()
        }
    }

    pub fn apply(&self, region: &mut Region) {
        if let Some(text) = &self.text {
            region.text = text.clone();
        }
        if let Some(pii_type) = self.pii_type {
            region.pii_type = pii_type;
        }
        if let Some(confidence) = self.confidence {
            region.confidence = confidence;
        }
        if let Some(source) = self.source {
            region.source = source;
        }
        if let Some(action) = self.action {
            region.action = action;
        }
        if let Some(bbox) = self.bbox {
            region.bbox = bbox;
        }
    }
}
