//! In-memory backend for driving sessions in tests
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use app_lib::{AppConfig, Session};
use async_trait::async_trait;
use shield_client::{
    AddRegionResult, Backend, ClientError, DetectOptions, DetectionResult, HighlightAllResult,
    ProgressPhase, Reanalysis, RegionSyncItem, RegionUpdate, Result, UploadProgress,
    UploadResponse,
};
use shield_core::{
    BBox, DetectionSource, Document, DocumentStatus, DocumentSummary, PageInfo, PiiType, Region,
    RegionAction, SourceFile,
};

#[derive(Default)]
pub struct MockState {
    pub docs: Vec<Document>,
    pub calls: Vec<String>,
    /// File names whose upload fails.
    pub failing_uploads: HashSet<String>,
    /// Operation names that fail with a 500.
    pub failing_ops: HashSet<&'static str>,
    /// Operations that sleep before answering.
    pub delays: HashMap<&'static str, Duration>,
    /// Regions handed out by the next highlight-all.
    pub highlight_new: Vec<Region>,
    /// Regions returned by detect and redetect.
    pub detected: Vec<Region>,
    /// Existing region the next add resolves to instead of creating one.
    pub add_reuses: Option<String>,
    /// Extra occurrences the next add creates, and regions it cancels.
    pub add_new_regions: Vec<Region>,
    pub add_cancelled: Vec<String>,
    pub last_detect_options: Option<DetectOptions>,
    pub last_sync: Vec<RegionSyncItem>,
    next_id: usize,
}

#[derive(Default)]
pub struct MockBackend {
    pub state: Mutex<MockState>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        let mut guard = self.state.lock().unwrap();
        f(&mut guard)
    }

    pub fn add_document(&self, doc_id: &str, name: &str, regions: Vec<Region>) {
        self.with_state(|s| s.docs.push(document(doc_id, name, regions)));
    }

    pub fn calls(&self) -> Vec<String> {
        self.with_state(|s| s.calls.clone())
    }

    pub fn calls_to(&self, op: &str) -> usize {
        self.with_state(|s| {
            s.calls
                .iter()
                .filter(|c| c.split(':').next() == Some(op))
                .count()
        })
    }

    pub fn server_region(&self, doc_id: &str, region_id: &str) -> Option<Region> {
        self.with_state(|s| {
            s.docs
                .iter()
                .find(|d| d.doc_id == doc_id)
                .and_then(|d| d.regions.iter().find(|r| r.id == region_id).cloned())
        })
    }

    pub fn fail(&self, op: &'static str) {
        self.with_state(|s| {
            s.failing_ops.insert(op);
        });
    }

    pub fn delay(&self, op: &'static str, by: Duration) {
        self.with_state(|s| {
            s.delays.insert(op, by);
        });
    }

    /// Record the call, apply any configured delay, then fail if asked to.
    async fn enter(&self, op: &'static str, detail: &str) -> Result<()> {
        let delay = self.with_state(|s| {
            s.calls.push(format!("{}:{}", op, detail));
            s.delays.get(op).copied()
        });
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.with_state(|s| s.failing_ops.contains(op)) {
            return Err(ClientError::Status {
                status: 500,
                message: format!("{} exploded", op),
            });
        }
        Ok(())
    }

    fn doc_mut<R>(&self, doc_id: &str, f: impl FnOnce(&mut Document) -> R) -> Result<R> {
        self.with_state(|s| {
            s.docs
                .iter_mut()
                .find(|d| d.doc_id == doc_id)
                .map(f)
                .ok_or_else(|| ClientError::NotFound(format!("/documents/{}", doc_id)))
        })
    }

    fn next_id(&self, prefix: &str) -> String {
        self.with_state(|s| {
            s.next_id += 1;
            format!("{}-{}", prefix, s.next_id)
        })
    }
}

pub fn document(doc_id: &str, name: &str, regions: Vec<Region>) -> Document {
    Document {
        doc_id: doc_id.to_string(),
        original_filename: name.to_string(),
        page_count: 2,
        status: DocumentStatus::Reviewing,
        pages: vec![
            PageInfo {
                page_number: 1,
                width: 612.0,
                height: 792.0,
            },
            PageInfo {
                page_number: 2,
                width: 612.0,
                height: 792.0,
            },
        ],
        regions,
    }
}

fn linked_group_of(doc: &Document, region_id: &str) -> Option<String> {
    doc.regions
        .iter()
        .find(|r| r.id == region_id)
        .and_then(|r| r.linked_group.clone())
}

pub fn region(id: &str, page: u32, x0: f64, y0: f64, x1: f64, y1: f64) -> Region {
    let mut r = Region::manual(id, page, BBox::new(x0, y0, x1, y1));
    r.text = format!("text of {}", id);
    r.pii_type = PiiType::Person;
    r.confidence = 0.8;
    r.source = DetectionSource::Ner;
    r
}

pub fn test_config() -> AppConfig {
    AppConfig {
        poll_interval_ms: 5,
        ..AppConfig::default()
    }
}

/// Session with `regions` loaded as the active document `d1`.
pub async fn open_session(backend: Arc<MockBackend>, regions: Vec<Region>) -> Session {
    backend.add_document("d1", "contract.pdf", regions);
    let session = Session::new(backend, test_config());
    session.refresh_documents().await;
    assert!(session.open_document("d1").await.is_applied());
    session
}

pub fn file(name: &str) -> SourceFile {
    SourceFile::new(name, name.as_bytes().to_vec())
}

#[async_trait]
impl Backend for MockBackend {
    async fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        self.enter("list", "").await?;
        Ok(self.with_state(|s| s.docs.iter().map(DocumentSummary::from).collect()))
    }

    async fn upload_document(&self, file: &SourceFile, progress_token: &str) -> Result<UploadResponse> {
        self.enter("upload", &file.name).await?;
        if self.with_state(|s| s.failing_uploads.contains(&file.name)) {
            return Err(ClientError::Status {
                status: 400,
                message: format!("cannot read {}", file.name),
            });
        }
        assert!(!progress_token.is_empty());
        // give the poller a chance to run
        tokio::time::sleep(Duration::from_millis(15)).await;
        let doc_id = self.next_id("doc");
        self.with_state(|s| s.docs.push(document(&doc_id, &file.name, Vec::new())));
        Ok(UploadResponse {
            doc_id,
            filename: file.name.clone(),
            page_count: 2,
            status: DocumentStatus::Reviewing,
        })
    }

    async fn upload_progress(&self, progress_token: &str) -> Result<UploadProgress> {
        self.enter("progress", progress_token).await?;
        Ok(UploadProgress {
            status: "processing".to_string(),
            phase: ProgressPhase::Ocr,
            current_page: 2,
            total_pages: 2,
            ocr_pages_done: 1,
            ocr_pages_total: 2,
            message: "OCR page 1/2".to_string(),
        })
    }

    async fn get_document(&self, doc_id: &str) -> Result<Document> {
        self.enter("get", doc_id).await?;
        self.doc_mut(doc_id, |d| d.clone())
    }

    async fn delete_document(&self, doc_id: &str) -> Result<()> {
        self.enter("delete_doc", doc_id).await?;
        self.with_state(|s| {
            let before = s.docs.len();
            s.docs.retain(|d| d.doc_id != doc_id);
            if s.docs.len() == before {
                Err(ClientError::NotFound(doc_id.to_string()))
            } else {
                Ok(())
            }
        })
    }

    async fn get_regions(&self, doc_id: &str) -> Result<Vec<Region>> {
        self.enter("regions", doc_id).await?;
        self.doc_mut(doc_id, |d| d.regions.clone())
    }

    async fn detect(&self, doc_id: &str) -> Result<DetectionResult> {
        self.enter("detect", doc_id).await?;
        let detected = self.with_state(|s| s.detected.clone());
        self.doc_mut(doc_id, |d| {
            d.regions = detected.clone();
            DetectionResult {
                doc_id: d.doc_id.clone(),
                total_regions: detected.len(),
                added: detected.len(),
                regions: detected,
                ..Default::default()
            }
        })
    }

    async fn redetect(&self, doc_id: &str, options: &DetectOptions) -> Result<DetectionResult> {
        self.with_state(|s| s.last_detect_options = Some(options.clone()));
        self.enter("redetect", doc_id).await?;
        let detected = self.with_state(|s| s.detected.clone());
        self.doc_mut(doc_id, |d| {
            let removed = d.regions.len();
            d.regions = detected.clone();
            DetectionResult {
                doc_id: d.doc_id.clone(),
                total_regions: detected.len(),
                added: detected.len(),
                removed,
                regions: detected,
                ..Default::default()
            }
        })
    }

    async fn reset_detection(&self, doc_id: &str) -> Result<DetectionResult> {
        self.enter("reset", doc_id).await?;
        self.doc_mut(doc_id, |d| {
            let cleared = d.regions.len();
            d.regions.clear();
            DetectionResult {
                doc_id: d.doc_id.clone(),
                cleared,
                ..Default::default()
            }
        })
    }

    async fn set_region_action(&self, doc_id: &str, region_id: &str, action: RegionAction) -> Result<()> {
        self.enter("action", region_id).await?;
        self.doc_mut(doc_id, |d| {
            let group = linked_group_of(d, region_id);
            for r in d.regions.iter_mut() {
                if r.id == region_id || (group.is_some() && r.linked_group == group) {
                    r.action = action;
                }
            }
        })
    }

    async fn batch_action(&self, doc_id: &str, region_ids: &[String], action: RegionAction) -> Result<usize> {
        self.enter("batch_action", &region_ids.join(",")).await?;
        self.doc_mut(doc_id, |d| {
            let mut updated = 0;
            for r in d.regions.iter_mut().filter(|r| region_ids.contains(&r.id)) {
                r.action = action;
                updated += 1;
            }
            updated
        })
    }

    async fn delete_region(&self, doc_id: &str, region_id: &str) -> Result<()> {
        self.enter("delete", region_id).await?;
        self.doc_mut(doc_id, |d| {
            let group = linked_group_of(d, region_id);
            let before = d.regions.len();
            d.regions
                .retain(|r| r.id != region_id && (group.is_none() || r.linked_group != group));
            d.regions.len() < before
        })?
        .then_some(())
        .ok_or_else(|| ClientError::NotFound(region_id.to_string()))
    }

    async fn batch_delete(&self, doc_id: &str, region_ids: &[String]) -> Result<usize> {
        self.enter("batch_delete", &region_ids.join(",")).await?;
        self.doc_mut(doc_id, |d| {
            let before = d.regions.len();
            d.regions.retain(|r| !region_ids.contains(&r.id));
            before - d.regions.len()
        })
    }

    async fn update_bbox(&self, doc_id: &str, region_id: &str, bbox: BBox) -> Result<()> {
        self.enter("bbox", region_id).await?;
        self.doc_mut(doc_id, |d| {
            if let Some(r) = d.regions.iter_mut().find(|r| r.id == region_id) {
                r.bbox = bbox;
            }
        })
    }

    /// Relabels every region sharing the target's text.
    async fn update_label(&self, doc_id: &str, region_id: &str, pii_type: PiiType) -> Result<Vec<RegionUpdate>> {
        self.enter("label", region_id).await?;
        self.doc_mut(doc_id, |d| {
            let text = d
                .regions
                .iter()
                .find(|r| r.id == region_id)
                .map(|r| r.text.clone())
                .unwrap_or_default();
            d.regions
                .iter_mut()
                .filter(|r| r.text == text)
                .map(|r| {
                    r.pii_type = pii_type;
                    RegionUpdate {
                        id: r.id.clone(),
                        text: None,
                        pii_type: Some(pii_type),
                    }
                })
                .collect()
        })
    }

    async fn update_text(&self, doc_id: &str, region_id: &str, text: &str) -> Result<Vec<RegionUpdate>> {
        self.enter("text", region_id).await?;
        self.doc_mut(doc_id, |d| {
            d.regions
                .iter_mut()
                .filter(|r| r.id == region_id)
                .map(|r| {
                    r.text = text.to_string();
                    RegionUpdate {
                        id: r.id.clone(),
                        text: Some(text.to_string()),
                        pii_type: None,
                    }
                })
                .collect()
        })
    }

    async fn reanalyze(&self, doc_id: &str, region_id: &str) -> Result<Reanalysis> {
        self.enter("reanalyze", region_id).await?;
        let bbox = self
            .server_region(doc_id, region_id)
            .map(|r| r.bbox)
            .ok_or_else(|| ClientError::NotFound(region_id.to_string()))?;
        Ok(Reanalysis {
            region_id: region_id.to_string(),
            text: format!("text at {}", bbox.x0),
            pii_type: PiiType::Email,
            confidence: 0.97,
            source: DetectionSource::Regex,
        })
    }

    async fn highlight_all(&self, doc_id: &str, region_id: &str) -> Result<HighlightAllResult> {
        self.enter("highlight", region_id).await?;
        let new_regions = self.with_state(|s| std::mem::take(&mut s.highlight_new));
        self.doc_mut(doc_id, |d| {
            d.regions.extend(new_regions.iter().cloned());
            let mut all_ids = vec![region_id.to_string()];
            all_ids.extend(new_regions.iter().map(|r| r.id.clone()));
            HighlightAllResult {
                created: new_regions.len(),
                new_regions,
                all_ids,
                cancelled_ids: Vec::new(),
            }
        })
    }

    async fn add_region(&self, doc_id: &str, region: &Region) -> Result<AddRegionResult> {
        self.enter("add", &region.id).await?;
        let (reuses, new_regions, cancelled_ids) = self.with_state(|s| {
            (
                s.add_reuses.take(),
                std::mem::take(&mut s.add_new_regions),
                std::mem::take(&mut s.add_cancelled),
            )
        });
        let (id, text, bbox) = match reuses {
            Some(existing) => {
                let found = self
                    .server_region(doc_id, &existing)
                    .ok_or_else(|| ClientError::NotFound(existing.clone()))?;
                (existing, found.text, found.bbox)
            }
            None => {
                let id = self.next_id("added");
                let mut stored = region.clone();
                stored.id = id.clone();
                stored.text = format!("text at {}", region.bbox.x0);
                let text = stored.text.clone();
                self.doc_mut(doc_id, |d| d.regions.push(stored))?;
                (id, text, region.bbox)
            }
        };
        self.doc_mut(doc_id, |d| {
            for r in d.regions.iter_mut().filter(|r| cancelled_ids.contains(&r.id)) {
                r.action = RegionAction::Cancel;
            }
            d.regions.extend(new_regions.iter().cloned());
        })?;
        let mut all_ids = vec![id.clone()];
        all_ids.extend(new_regions.iter().map(|r| r.id.clone()));
        Ok(AddRegionResult {
            region_id: id,
            text,
            pii_type: region.pii_type,
            bbox,
            new_regions,
            all_ids,
            cancelled_ids,
        })
    }

    async fn sync_regions(&self, doc_id: &str, items: &[RegionSyncItem]) -> Result<usize> {
        self.enter("sync", doc_id).await?;
        self.with_state(|s| s.last_sync = items.to_vec());
        Ok(items.len())
    }
}
