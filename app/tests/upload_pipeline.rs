mod common;

use std::sync::Arc;

use app_lib::{Session, StatusKind, View};
use common::{file, test_config, MockBackend};
use pretty_assertions::assert_eq;
use shield_core::UploadStatus;

fn session(backend: &Arc<MockBackend>) -> Session {
    Session::new(backend.clone(), test_config())
}

#[tokio::test]
async fn test_batch_dedups_by_name_keeping_last() {
    let backend = MockBackend::new();
    let session = session(&backend);

    let mut first = file("a.pdf");
    first.data = b"first".to_vec();
    let mut last = file("a.pdf");
    last.data = b"last".to_vec();

    let report = session
        .handle_files(vec![first, file("b.pdf"), last])
        .await;

    assert_eq!(report.uploaded.len(), 2);
    assert!(report.failed.is_empty());
    let uploads: Vec<String> = backend
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("upload:"))
        .collect();
    assert_eq!(uploads, vec!["upload:b.pdf", "upload:a.pdf"]);
}

#[tokio::test]
async fn test_one_failure_does_not_abort_batch() {
    let backend = MockBackend::new();
    backend.with_state(|s| {
        s.failing_uploads.insert("two.pdf".to_string());
    });
    let session = session(&backend);

    let report = session
        .handle_files(vec![file("one.pdf"), file("two.pdf"), file("three.pdf")])
        .await;

    assert_eq!(report.uploaded.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].name, "two.pdf");

    // done items left the queue, the failed one stays
    let queue = session.uploads();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].name, "two.pdf");
    assert_eq!(queue[0].status, UploadStatus::Error);
    assert!(queue[0].error.as_deref().unwrap_or_default().contains("cannot read two.pdf"));

    let prompt = session.retry_prompt().expect("retry prompt");
    assert_eq!(prompt.failed.len(), 1);
    assert_eq!(prompt.failed[0].item_id, queue[0].id);
    assert_eq!(session.retained_file_count(), 1);

    // the last successful upload is the active document
    assert_eq!(session.active_doc_id(), report.uploaded.last().cloned());
    assert_eq!(session.view(), View::Viewer);
    assert_eq!(session.status().map(|s| s.kind), Some(StatusKind::Error));
}

#[tokio::test]
async fn test_retry_resubmits_only_failed_files() {
    let backend = MockBackend::new();
    backend.with_state(|s| {
        s.failing_uploads.insert("two.pdf".to_string());
    });
    let session = session(&backend);
    session
        .handle_files(vec![file("one.pdf"), file("two.pdf")])
        .await;
    let failed_id = session.uploads()[0].id.clone();

    backend.with_state(|s| s.failing_uploads.clear());
    let report = session.retry_failed().await;

    assert_eq!(report.uploaded.len(), 1);
    assert!(report.failed.is_empty());
    assert!(session.uploads().is_empty());
    assert!(session.retry_prompt().is_none());
    assert_eq!(session.retained_file_count(), 0);
    assert_eq!(backend.calls_to("upload"), 3);
    assert!(session.uploads().iter().all(|i| i.id != failed_id));
}

#[tokio::test]
async fn test_dismiss_clears_failed_items() {
    let backend = MockBackend::new();
    backend.with_state(|s| {
        s.failing_uploads.insert("bad.pdf".to_string());
    });
    let session = session(&backend);
    session.handle_files(vec![file("bad.pdf")]).await;
    assert!(session.retry_prompt().is_some());

    session.dismiss_failed();
    assert!(session.retry_prompt().is_none());
    assert!(session.uploads().is_empty());
    assert_eq!(session.retained_file_count(), 0);

    let report = session.retry_failed().await;
    assert!(report.uploaded.is_empty());
}

#[tokio::test]
async fn test_same_named_document_is_replaced() {
    let backend = MockBackend::new();
    backend.add_document("old", "report.pdf", Vec::new());
    let session = session(&backend);
    session.refresh_documents().await;

    let report = session.handle_files(vec![file("report.pdf")]).await;

    assert_eq!(backend.calls_to("delete_doc"), 1);
    let docs = session.documents();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].doc_id, report.uploaded[0]);
    assert_eq!(docs[0].original_filename, "report.pdf");
}

#[tokio::test]
async fn test_failed_replace_is_not_fatal() {
    let backend = MockBackend::new();
    backend.add_document("old", "report.pdf", Vec::new());
    backend.fail("delete_doc");
    let session = session(&backend);
    session.refresh_documents().await;

    let report = session.handle_files(vec![file("report.pdf")]).await;
    assert_eq!(report.uploaded.len(), 1);
    assert_eq!(session.documents().len(), 2);
}

#[tokio::test]
async fn test_export_limit_warns_without_blocking() {
    let backend = MockBackend::new();
    let config = app_lib::AppConfig {
        export_batch_limit: 2,
        ..test_config()
    };
    let session = Session::new(backend.clone(), config);

    let report = session
        .handle_files(vec![file("1.pdf"), file("2.pdf"), file("3.pdf")])
        .await;
    assert!(report.over_limit);
    assert_eq!(report.uploaded.len(), 3);
}

#[tokio::test]
async fn test_progress_is_polled_while_uploading() {
    let backend = MockBackend::new();
    let session = session(&backend);
    session.handle_files(vec![file("scan.pdf")]).await;

    let polls = backend.calls_to("progress");
    assert!(polls >= 1, "expected at least one progress poll");

    // the poller is gone once the batch is over
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;
    assert_eq!(backend.calls_to("progress"), polls);
}

#[tokio::test]
async fn test_polling_stops_when_upload_fails() {
    let backend = MockBackend::new();
    backend.delay("upload", std::time::Duration::from_millis(30));
    backend.fail("upload");
    let session = session(&backend);

    let report = session.handle_files(vec![file("slow.pdf")]).await;
    assert_eq!(report.failed.len(), 1);

    let polls = backend.calls_to("progress");
    assert!(polls >= 2, "expected polling during the upload, got {}", polls);
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;
    assert_eq!(backend.calls_to("progress"), polls);
}

#[tokio::test]
async fn test_retry_prompt_keeps_failures_from_earlier_batches() {
    let backend = MockBackend::new();
    backend.with_state(|s| {
        s.failing_uploads.insert("x.pdf".to_string());
        s.failing_uploads.insert("y.pdf".to_string());
    });
    let session = session(&backend);

    session.handle_files(vec![file("x.pdf")]).await;
    session.handle_files(vec![file("y.pdf")]).await;

    let names: Vec<String> = session
        .retry_prompt()
        .expect("retry prompt")
        .failed
        .into_iter()
        .map(|f| f.name)
        .collect();
    assert_eq!(names, vec!["x.pdf", "y.pdf"]);
    assert_eq!(session.retained_file_count(), 2);

    backend.with_state(|s| s.failing_uploads.clear());
    let report = session.retry_failed().await;
    assert_eq!(report.uploaded.len(), 2);
    assert!(session.uploads().is_empty());
    assert!(session.retry_prompt().is_none());
    assert_eq!(session.retained_file_count(), 0);
}

#[tokio::test]
async fn test_stored_document_is_listed_when_fetch_fails() {
    let backend = MockBackend::new();
    backend.fail("get");
    let session = session(&backend);

    let report = session.handle_files(vec![file("scan.pdf")]).await;
    assert_eq!(report.failed.len(), 1);
    let docs = session.documents();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].original_filename, "scan.pdf");

    // the retry replaces the stored copy instead of duplicating it
    backend.with_state(|s| s.failing_ops.clear());
    let report = session.retry_failed().await;
    assert_eq!(report.uploaded.len(), 1);
    assert_eq!(backend.calls_to("delete_doc"), 1);
    assert_eq!(backend.with_state(|s| s.docs.len()), 1);
    assert_eq!(session.documents().len(), 1);
}
