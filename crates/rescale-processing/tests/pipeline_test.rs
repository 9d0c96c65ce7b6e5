mod helpers;

use helpers::*;
use image::ImageFormat;
use rescale_core::{OriginUpdate, RunOutcome, SkipReason};
use rescale_processing::{process_event, Pipeline, PipelineError};
use rescale_storage::StorageError;
use serde_json::json;
use std::sync::Arc;

const ORIGINAL: &str = "files/u1/assets/upload/pic.png";
const SCALED: &str = "files/u1/assets/images/2024-05-01T10:00:00.000Z_pic.png";

#[tokio::test]
async fn test_wide_image_resized_published_and_original_removed() {
    let h = Harness::new();
    h.blobs.put("bucket", ORIGINAL, png(2000, 1000), "image/png");
    h.documents.insert("msgs/m1");

    let event = image_event(ORIGINAL).with_metadata("messageOrigin", "msgs/m1");
    let outcome = process_event(&event, &h.deps, &h.settings).await.unwrap();

    let result = outcome.published().expect("published");
    assert_eq!(h.blobs.keys("bucket"), vec![SCALED.to_string()]);
    assert_eq!(
        decode_dimensions(&h.blobs.get("bucket", SCALED).unwrap()),
        (2160, 1080)
    );
    assert_eq!(
        h.blobs.content_type("bucket", SCALED).as_deref(),
        Some("image/png")
    );
    assert_eq!(h.resizer.calls(), vec![1080]);

    assert!(result.url.starts_with(&format!("https://signed.example.com/bucket/{}", SCALED)));
    assert_eq!(result.original_metadata.get("messageOrigin").unwrap(), "msgs/m1");
    assert_eq!(
        result.origin,
        OriginUpdate::Updated {
            document: "msgs/m1".to_string()
        }
    );
    assert_eq!(
        h.documents.get("msgs/m1").unwrap()["resource"],
        json!(result.url)
    );
}

#[tokio::test]
async fn test_publish_steps_run_in_order() {
    let h = Harness::new();
    h.blobs.put("bucket", ORIGINAL, png(2000, 1000), "image/png");

    process_event(&image_event(ORIGINAL), &h.deps, &h.settings)
        .await
        .unwrap();

    assert_eq!(
        h.blobs.ops(),
        vec![
            BlobOp::Download(ORIGINAL.to_string()),
            BlobOp::Upload(SCALED.to_string()),
            BlobOp::Sign(SCALED.to_string()),
            BlobOp::Delete(ORIGINAL.to_string()),
        ]
    );
}

#[tokio::test]
async fn test_small_image_copied_byte_for_byte() {
    let h = Harness::new();
    let original = png(800, 600);
    h.blobs.put("bucket", ORIGINAL, original.clone(), "image/png");

    let outcome = process_event(&image_event(ORIGINAL), &h.deps, &h.settings)
        .await
        .unwrap();

    assert!(outcome.published().is_some());
    assert_eq!(h.blobs.get("bucket", SCALED).unwrap(), original);
    assert!(h.resizer.calls().is_empty());
    assert!(!h.blobs.has("bucket", ORIGINAL));
}

#[tokio::test]
async fn test_tall_narrow_image_not_resized() {
    let h = Harness::new();
    let original = png(1080, 4000);
    h.blobs.put("bucket", ORIGINAL, original.clone(), "image/png");

    process_event(&image_event(ORIGINAL), &h.deps, &h.settings)
        .await
        .unwrap();

    assert_eq!(h.blobs.get("bucket", SCALED).unwrap(), original);
    assert!(h.resizer.calls().is_empty());
}

#[tokio::test]
async fn test_aspect_ratio_preserved() {
    let h = Harness::new();
    let key = "files/u1/assets/upload/photo.jpg";
    h.blobs
        .put("bucket", key, encode(3000, 1700, ImageFormat::Jpeg), "image/jpeg");

    let event = rescale_core::UploadEvent::new("bucket", key).with_content_type("image/jpeg");
    process_event(&event, &h.deps, &h.settings).await.unwrap();

    let scaled_key = "files/u1/assets/images/2024-05-01T10:00:00.000Z_photo.jpg";
    let (w, height) = decode_dimensions(&h.blobs.get("bucket", scaled_key).unwrap());
    assert_eq!(height, 1080);
    let expected = 3000.0 / 1700.0;
    assert!((w as f64 / height as f64 - expected).abs() < 0.01);
    assert_eq!(
        h.blobs.content_type("bucket", scaled_key).as_deref(),
        Some("image/jpeg")
    );
}

#[tokio::test]
async fn test_non_image_skipped_without_side_effects() {
    let h = Harness::new();
    let key = "files/u1/assets/upload/notes.txt";
    h.blobs.put("bucket", key, b"hello".to_vec(), "text/plain");

    let event = rescale_core::UploadEvent::new("bucket", key)
        .with_content_type("text/plain")
        .with_metadata("messageOrigin", "msgs/m1");
    let outcome = process_event(&event, &h.deps, &h.settings).await.unwrap();

    assert_eq!(outcome, RunOutcome::Skipped(SkipReason::NotImage));
    assert!(h.blobs.ops().is_empty());
    assert!(h.documents.updates().is_empty());
    assert!(h.blobs.has("bucket", key));
}

#[tokio::test]
async fn test_own_output_skipped() {
    let h = Harness::new();
    h.blobs.put("bucket", SCALED, png(2000, 1000), "image/png");

    let outcome = process_event(&image_event(SCALED), &h.deps, &h.settings)
        .await
        .unwrap();

    assert_eq!(outcome, RunOutcome::Skipped(SkipReason::AlreadyProcessed));
    assert!(h.blobs.ops().is_empty());
    assert_eq!(h.blobs.keys("bucket"), vec![SCALED.to_string()]);
}

#[tokio::test]
async fn test_upload_failure_preserves_original() {
    let h = Harness::new();
    h.blobs.put("bucket", ORIGINAL, png(2000, 1000), "image/png");
    h.blobs.fail_on(FailOn::Upload);
    h.documents.insert("msgs/m1");

    let event = image_event(ORIGINAL).with_metadata("messageOrigin", "msgs/m1");
    let err = process_event(&event, &h.deps, &h.settings)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Upload(StorageError::UploadFailed(_))));
    assert!(h.blobs.has("bucket", ORIGINAL));
    assert!(!h
        .blobs
        .ops()
        .iter()
        .any(|op| matches!(op, BlobOp::Sign(_) | BlobOp::Delete(_))));
    assert!(h.documents.updates().is_empty());
    assert!(h.scratch_files().is_empty());
}

#[tokio::test]
async fn test_sign_failure_preserves_original() {
    let h = Harness::new();
    h.blobs.put("bucket", ORIGINAL, png(2000, 1000), "image/png");
    h.blobs.fail_on(FailOn::Sign);

    let err = process_event(&image_event(ORIGINAL), &h.deps, &h.settings)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::SignUrl(_)));
    assert!(h.blobs.has("bucket", ORIGINAL));
    assert!(!h.blobs.ops().contains(&BlobOp::Delete(ORIGINAL.to_string())));
    assert!(h.documents.updates().is_empty());
}

#[tokio::test]
async fn test_delete_failure_skips_origin_update() {
    let h = Harness::new();
    h.blobs.put("bucket", ORIGINAL, png(800, 600), "image/png");
    h.blobs.fail_on(FailOn::Delete);
    h.documents.insert("msgs/m1");

    let event = image_event(ORIGINAL).with_metadata("messageOrigin", "msgs/m1");
    let err = process_event(&event, &h.deps, &h.settings)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::DeleteOriginal(_)));
    assert!(h.blobs.has("bucket", ORIGINAL));
    assert!(h.documents.updates().is_empty());
}

#[tokio::test]
async fn test_undecodable_image_fails_before_upload() {
    let h = Harness::new();
    h.blobs
        .put("bucket", ORIGINAL, b"not really a png".to_vec(), "image/png");

    let err = process_event(&image_event(ORIGINAL), &h.deps, &h.settings)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Decode { .. }));
    assert!(!err.is_retryable());
    assert_eq!(h.blobs.ops(), vec![BlobOp::Download(ORIGINAL.to_string())]);
    assert!(h.blobs.has("bucket", ORIGINAL));
    assert!(h.scratch_files().is_empty());
}

#[tokio::test]
async fn test_resize_failure_preserves_original() {
    let mut h = Harness::new();
    h.deps.resizer = Arc::new(FailingResizer);
    h.blobs.put("bucket", ORIGINAL, png(2000, 1000), "image/png");
    h.documents.insert("msgs/m1");

    let event = image_event(ORIGINAL).with_metadata("messageOrigin", "msgs/m1");
    let err = process_event(&event, &h.deps, &h.settings)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Resize(_)));
    assert!(!err.is_retryable());
    assert_eq!(h.blobs.ops(), vec![BlobOp::Download(ORIGINAL.to_string())]);
    assert!(h.blobs.has("bucket", ORIGINAL));
    assert!(h.documents.updates().is_empty());
    assert!(h.scratch_files().is_empty());
}

#[tokio::test]
async fn test_unsupported_url_expiry_preserves_original() {
    let h = Harness::new();
    h.blobs.put("bucket", ORIGINAL, png(2000, 1000), "image/png");
    h.blobs.fail_on(FailOn::SignExpiry);
    h.documents.insert("msgs/m1");

    let event = image_event(ORIGINAL).with_metadata("messageOrigin", "msgs/m1");
    let err = process_event(&event, &h.deps, &h.settings)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::SignUrl(StorageError::ExpiryUnsupported(_))
    ));
    assert!(!err.is_retryable());
    assert!(h.blobs.has("bucket", ORIGINAL));
    assert!(!h.blobs.ops().contains(&BlobOp::Delete(ORIGINAL.to_string())));
    assert!(h.documents.updates().is_empty());
    assert!(h.scratch_files().is_empty());
}

#[tokio::test]
async fn test_missing_original_fails_download() {
    let h = Harness::new();

    let err = process_event(&image_event(ORIGINAL), &h.deps, &h.settings)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Download(StorageError::NotFound(_))));
    assert!(h.blobs.keys("bucket").is_empty());
}

#[tokio::test]
async fn test_missing_message_origin_still_publishes() {
    let h = Harness::new();
    h.blobs.put("bucket", ORIGINAL, png(800, 600), "image/png");

    let outcome = process_event(&image_event(ORIGINAL), &h.deps, &h.settings)
        .await
        .unwrap();

    let result = outcome.published().expect("published");
    assert_eq!(result.origin, OriginUpdate::MissingReference);
    assert!(h.documents.updates().is_empty());
    assert!(!h.blobs.has("bucket", ORIGINAL));
    assert!(h.blobs.has("bucket", SCALED));
}

#[tokio::test]
async fn test_document_store_failure_is_reported_not_fatal() {
    let h = Harness::new();
    h.blobs.put("bucket", ORIGINAL, png(800, 600), "image/png");
    h.documents.set_unavailable();

    let event = image_event(ORIGINAL).with_metadata("messageOrigin", "msgs/m1");
    let outcome = process_event(&event, &h.deps, &h.settings).await.unwrap();

    let result = outcome.published().expect("published");
    assert!(matches!(
        &result.origin,
        OriginUpdate::Failed { document, .. } if document == "msgs/m1"
    ));
    assert!(!h.blobs.has("bucket", ORIGINAL));
    assert_eq!(h.documents.updates().len(), 1);
}

#[tokio::test]
async fn test_unknown_origin_document_reported() {
    let h = Harness::new();
    h.blobs.put("bucket", ORIGINAL, png(800, 600), "image/png");

    let event = image_event(ORIGINAL).with_metadata("messageOrigin", "msgs/gone");
    let outcome = process_event(&event, &h.deps, &h.settings).await.unwrap();

    assert!(matches!(
        outcome.published().unwrap().origin,
        OriginUpdate::Failed { .. }
    ));
}

#[tokio::test]
async fn test_origin_updated_once_with_url_only() {
    let h = Harness::new();
    h.blobs.put("bucket", ORIGINAL, png(2000, 1000), "image/png");
    h.documents.insert("rooms/r1/messages/m1");

    let event = image_event(ORIGINAL).with_metadata("messageOrigin", "rooms/r1/messages/m1");
    let outcome = process_event(&event, &h.deps, &h.settings).await.unwrap();

    let updates = h.documents.updates();
    assert_eq!(updates.len(), 1);
    let (path, fields) = &updates[0];
    assert_eq!(path, "rooms/r1/messages/m1");
    assert_eq!(fields.len(), 1);
    assert_eq!(fields["resource"], json!(outcome.published().unwrap().url));
}

#[tokio::test]
async fn test_scratch_cleaned_after_success() {
    let h = Harness::new();
    h.blobs.put("bucket", ORIGINAL, png(2000, 1000), "image/png");

    process_event(&image_event(ORIGINAL), &h.deps, &h.settings)
        .await
        .unwrap();

    assert!(h.scratch_files().is_empty());
}

#[tokio::test]
async fn test_url_ttl_runs_until_configured_expiry() {
    let h = Harness::new();
    h.blobs.put("bucket", ORIGINAL, png(800, 600), "image/png");

    let outcome = process_event(&image_event(ORIGINAL), &h.deps, &h.settings)
        .await
        .unwrap();

    let expected = (h.settings.signed_url_expires_at - fixed_time()).num_seconds();
    assert!(outcome
        .published()
        .unwrap()
        .url
        .ends_with(&format!("?ttl={}", expected)));
}

#[tokio::test]
async fn test_concurrent_runs_use_distinct_keys() {
    let h = Harness::new();
    let a = "files/u1/assets/upload/a.png";
    let b = "files/u2/assets/upload/a.png";
    h.blobs.put("bucket", a, png(2000, 1000), "image/png");
    h.blobs.put("bucket", b, png(900, 900), "image/png");

    let pipeline = Pipeline::new(h.deps.clone(), h.settings.clone());
    let event_a = image_event(a);
    let event_b = image_event(b);
    let (ra, rb) = tokio::join!(
        pipeline.process_event(&event_a),
        pipeline.process_event(&event_b)
    );
    ra.unwrap();
    rb.unwrap();

    assert_eq!(
        h.blobs.keys("bucket"),
        vec![
            "files/u1/assets/images/2024-05-01T10:00:00.000Z_a.png".to_string(),
            "files/u2/assets/images/2024-05-01T10:00:00.000Z_a.png".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_concurrent_runs_in_same_directory() {
    let h = Harness::new();
    let a = "files/u1/assets/upload/a.png";
    let b = "files/u1/assets/upload/b.png";
    h.blobs.put("bucket", a, png(2000, 1000), "image/png");
    h.blobs.put("bucket", b, png(1500, 1200), "image/png");

    let pipeline = Pipeline::new(h.deps.clone(), h.settings.clone());
    let event_a = image_event(a);
    let event_b = image_event(b);
    let (ra, rb) = tokio::join!(
        pipeline.process_event(&event_a),
        pipeline.process_event(&event_b)
    );
    let url_a = ra.unwrap().published().expect("a published").url.clone();
    let url_b = rb.unwrap().published().expect("b published").url.clone();

    assert_ne!(url_a, url_b);
    assert_eq!(
        h.blobs.keys("bucket"),
        vec![
            "files/u1/assets/images/2024-05-01T10:00:00.000Z_a.png".to_string(),
            "files/u1/assets/images/2024-05-01T10:00:00.000Z_b.png".to_string(),
        ]
    );

    let paths = h.resizer.paths();
    assert_eq!(paths.len(), 2);
    assert_ne!(paths[0].0, paths[1].0);
    assert_ne!(paths[0].1, paths[1].1);
    assert!(h.scratch_files().is_empty());
}

#[tokio::test]
async fn test_key_at_bucket_root_staging() {
    let h = Harness::new();
    h.blobs.put("bucket", "upload/x.png", png(10, 10), "image/png");

    process_event(&image_event("upload/x.png"), &h.deps, &h.settings)
        .await
        .unwrap();

    assert_eq!(
        h.blobs.keys("bucket"),
        vec!["images/2024-05-01T10:00:00.000Z_x.png".to_string()]
    );
}
