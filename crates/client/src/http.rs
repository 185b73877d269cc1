//! `reqwest` implementation of [`Backend`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shield_core::{BBox, Document, DocumentSummary, PiiType, Region, RegionAction, SourceFile};

use crate::backend::Backend;
use crate::error::{ClientError, Result};
use crate::types::{
    ActionBody, AddRegionResult, BatchActionResponse, BatchBody, BatchDeleteResponse,
    DetectOptions, DetectionResult, HighlightAllResult, HighlightBody, LabelBody, Reanalysis,
    RegionSyncItem, RegionUpdate, SyncResponse, TextBody, UpdatedRegions, UploadProgress,
    UploadResponse,
};

pub const API_PREFIX: &str = "/api";

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        log::info!("[Client] using backend at {}", base_url);
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }

    async fn execute(&self, request: RequestBuilder, path: &str) -> Result<Vec<u8>> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if status == StatusCode::NOT_FOUND {
            log::debug!("[Client] 404 for {}", path);
            return Err(ClientError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            let message = error_detail(&body).unwrap_or_else(|| {
                status.canonical_reason().unwrap_or("request failed").to_string()
            });
            log::warn!("[Client] {} returned {}: {}", path, status.as_u16(), message);
            return Err(ClientError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(body.to_vec())
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder, path: &str) -> Result<T> {
        let body = self.execute(request, path).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.fetch(self.request(Method::GET, path), path).await
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        self.fetch(self.request(method, path).json(body), path).await
    }

    /// For endpoints whose response body carries nothing the caller needs.
    async fn send_unit<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<()>
    where
        B: Serialize + ?Sized + Sync,
    {
        let mut request = self.request(method, path);
        if let Some(body) = body {
            request = request.json(body);
        }
        self.execute(request, path).await.map(|_| ())
    }
}

/// Pull a readable message out of an error body: the `detail` field the
/// service uses, else the raw text.
pub fn error_detail(body: &[u8]) -> Option<String> {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
        return match value.get("detail") {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
            None => None,
        };
    }
    let text = String::from_utf8_lossy(body).trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn region_path(doc_id: &str, region_id: &str, suffix: &str) -> String {
    format!("/documents/{}/regions/{}{}", doc_id, region_id, suffix)
}

#[async_trait]
impl Backend for HttpBackend {
    async fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        self.get("/documents?paginated=false&limit=500").await
    }

    async fn upload_document(&self, file: &SourceFile, progress_token: &str) -> Result<UploadResponse> {
        let path = format!("/documents/upload?progress_id={}", progress_token);
        let part = reqwest::multipart::Part::bytes(file.data.clone()).file_name(file.name.clone());
        let form = reqwest::multipart::Form::new().part("file", part);
        log::debug!("[Client] uploading {} ({} bytes)", file.name, file.data.len());
        self.fetch(self.request(Method::POST, &path).multipart(form), &path)
            .await
    }

    async fn upload_progress(&self, progress_token: &str) -> Result<UploadProgress> {
        self.get(&format!("/documents/{}/upload-progress", progress_token))
            .await
    }

    async fn get_document(&self, doc_id: &str) -> Result<Document> {
        self.get(&format!("/documents/{}", doc_id)).await
    }

    async fn delete_document(&self, doc_id: &str) -> Result<()> {
        self.send_unit::<()>(Method::DELETE, &format!("/documents/{}", doc_id), None)
            .await
    }

    async fn get_regions(&self, doc_id: &str) -> Result<Vec<Region>> {
        self.get(&format!("/documents/{}/regions", doc_id)).await
    }

    async fn detect(&self, doc_id: &str) -> Result<DetectionResult> {
        let path = format!("/documents/{}/detect", doc_id);
        self.fetch(self.request(Method::POST, &path), &path).await
    }

    async fn redetect(&self, doc_id: &str, options: &DetectOptions) -> Result<DetectionResult> {
        self.send_json(Method::POST, &format!("/documents/{}/redetect", doc_id), options)
            .await
    }

    async fn reset_detection(&self, doc_id: &str) -> Result<DetectionResult> {
        let path = format!("/documents/{}/reset-detection", doc_id);
        self.fetch(self.request(Method::POST, &path), &path).await
    }

    async fn set_region_action(&self, doc_id: &str, region_id: &str, action: RegionAction) -> Result<()> {
        let body = ActionBody { region_id, action };
        self.send_unit(Method::PUT, &region_path(doc_id, region_id, "/action"), Some(&body))
            .await
    }

    async fn batch_action(&self, doc_id: &str, region_ids: &[String], action: RegionAction) -> Result<usize> {
        let body = BatchBody { region_ids, action };
        let path = format!("/documents/{}/regions/batch-action", doc_id);
        let response: BatchActionResponse = self.send_json(Method::PUT, &path, &body).await?;
        Ok(response.updated)
    }

    async fn delete_region(&self, doc_id: &str, region_id: &str) -> Result<()> {
        self.send_unit::<()>(Method::DELETE, &region_path(doc_id, region_id, ""), None)
            .await
    }

    async fn batch_delete(&self, doc_id: &str, region_ids: &[String]) -> Result<usize> {
        let body = BatchBody {
            region_ids,
            action: RegionAction::Remove,
        };
        let path = format!("/documents/{}/regions/batch-delete", doc_id);
        let response: BatchDeleteResponse = self.send_json(Method::POST, &path, &body).await?;
        Ok(response.deleted)
    }

    async fn update_bbox(&self, doc_id: &str, region_id: &str, bbox: BBox) -> Result<()> {
        self.send_unit(Method::PUT, &region_path(doc_id, region_id, "/bbox"), Some(&bbox))
            .await
    }

    async fn update_label(&self, doc_id: &str, region_id: &str, pii_type: PiiType) -> Result<Vec<RegionUpdate>> {
        let path = region_path(doc_id, region_id, "/label");
        let response: UpdatedRegions = self
            .send_json(Method::PUT, &path, &LabelBody { pii_type })
            .await?;
        Ok(response.updated)
    }

    async fn update_text(&self, doc_id: &str, region_id: &str, text: &str) -> Result<Vec<RegionUpdate>> {
        let path = region_path(doc_id, region_id, "/text");
        let response: UpdatedRegions = self
            .send_json(Method::PUT, &path, &TextBody { text })
            .await?;
        Ok(response.updated)
    }

    async fn reanalyze(&self, doc_id: &str, region_id: &str) -> Result<Reanalysis> {
        let path = region_path(doc_id, region_id, "/reanalyze");
        self.fetch(self.request(Method::POST, &path), &path).await
    }

    async fn highlight_all(&self, doc_id: &str, region_id: &str) -> Result<HighlightAllResult> {
        let path = format!("/documents/{}/regions/highlight-all", doc_id);
        self.send_json(Method::POST, &path, &HighlightBody { region_id })
            .await
    }

    async fn add_region(&self, doc_id: &str, region: &Region) -> Result<AddRegionResult> {
        self.send_json(Method::POST, &format!("/documents/{}/regions/add", doc_id), region)
            .await
    }

    async fn sync_regions(&self, doc_id: &str, items: &[RegionSyncItem]) -> Result<usize> {
        let path = format!("/documents/{}/regions/sync", doc_id);
        let response: SyncResponse = self.send_json(Method::PUT, &path, items).await?;
        Ok(response.synced)
    }
}
