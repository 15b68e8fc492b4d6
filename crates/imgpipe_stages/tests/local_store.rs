use std::fs;

use imgpipe_protocol::ObjectRef;
use imgpipe_stages::{handle_ingest, IngestStage, LocalObjectStore, ObjectStore, StoreError};
use serde_json::json;
use tempfile::TempDir;

fn store_with_image() -> (TempDir, LocalObjectStore) {
    let dir = TempDir::new().unwrap();
    let bucket = dir.path().join("sagemaker-images").join("test");
    fs::create_dir_all(&bucket).unwrap();
    fs::write(bucket.join("bicycle_s_000513.png"), b"\x89PNG\r\n\x1a\n").unwrap();
    let store = LocalObjectStore::new(dir.path());
    (dir, store)
}

#[test]
fn reads_nested_key() {
    let (_dir, store) = store_with_image();
    let bytes = store
        .fetch(&ObjectRef::new("sagemaker-images", "test/bicycle_s_000513.png"))
        .unwrap();
    assert_eq!(bytes, b"\x89PNG\r\n\x1a\n");
}

#[test]
fn missing_file_is_not_found() {
    let (_dir, store) = store_with_image();
    let err = store
        .fetch(&ObjectRef::new("sagemaker-images", "test/missing.png"))
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[test]
fn directory_is_not_an_object() {
    let (_dir, store) = store_with_image();
    let err = store
        .fetch(&ObjectRef::new("sagemaker-images", "test"))
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[test]
fn traversal_does_not_resolve() {
    let (dir, store) = store_with_image();
    fs::write(dir.path().join("outside.png"), b"secret").unwrap();
    let err = store
        .fetch(&ObjectRef::new("sagemaker-images", "../outside.png"))
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[test]
fn ingest_handler_over_local_store() {
    let (_dir, store) = store_with_image();
    let stage = IngestStage::new(store);

    let out = handle_ingest(
        &stage,
        json!({"s3_bucket": "sagemaker-images", "s3_key": "test/bicycle_s_000513.png"}),
    )
    .unwrap();
    assert_eq!(out["body"]["image_data"], "iVBORw0KGgo=");
    assert_eq!(out["body"]["s3_key"], "test/bicycle_s_000513.png");

    let failure = handle_ingest(&stage, json!({"s3_bucket": "sagemaker-images", "s3_key": "nope"}))
        .unwrap_err();
    assert_eq!(failure.error_type, "ObjectNotFound");
}
