//! Integration tests for soma_photo organ operations and the upload store

use exif::experimental::Writer;
use exif::{Field, In, Tag, Value};
use serde_json::json;
use soma_photo::organ::{Organ, PhotoOrgan, Response, Stimulus};
use soma_photo::{
    extract_metadata, DuplicatePolicy, ExtractOptions, MetadataMode, OutcomeStatus, PhotoConfig, PhotoStore,
    RejectReason, YearFormat,
};
use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

// ============================================================================
// Fixtures
// ============================================================================

/// Helper to create a test stimulus
fn create_stimulus(op: &str, input: serde_json::Value) -> Stimulus {
    Stimulus {
        op: op.to_string(),
        input,
        context: HashMap::new(),
    }
}

fn ascii(s: &str) -> Value {
    Value::Ascii(vec![s.as_bytes().to_vec()])
}

fn dms(degrees: u32, minutes: u32, seconds: u32) -> Value {
    Value::Rational(vec![(degrees, 1).into(), (minutes, 1).into(), (seconds, 1).into()])
}

/// EXIF fields for a photo; `None` leaves the group out
fn exif_fields(time: Option<&str>, position: Option<(&str, Value, &str, Value)>) -> Vec<Field> {
    let mut fields = vec![Field {
        tag: Tag::Make,
        ifd_num: In::PRIMARY,
        value: ascii("TestCam"),
    }];

    if let Some(literal) = time {
        fields.push(Field {
            tag: Tag::DateTimeOriginal,
            ifd_num: In::PRIMARY,
            value: ascii(literal),
        });
    }

    if let Some((lat_ref, lat, lon_ref, lon)) = position {
        for (tag, value) in [
            (Tag::GPSLatitudeRef, ascii(lat_ref)),
            (Tag::GPSLatitude, lat),
            (Tag::GPSLongitudeRef, ascii(lon_ref)),
            (Tag::GPSLongitude, lon),
        ] {
            fields.push(Field {
                tag,
                ifd_num: In::PRIMARY,
                value,
            });
        }
    }

    fields
}

/// Minimal JPEG: SOI, APP1 Exif segment, EOI
fn jpeg_with(fields: &[Field]) -> Vec<u8> {
    let mut writer = Writer::new();
    for field in fields {
        writer.push_field(field);
    }
    let mut tiff = Cursor::new(Vec::new());
    writer.write(&mut tiff, false).unwrap();
    let tiff = tiff.into_inner();

    let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE1];
    jpeg.extend_from_slice(&((tiff.len() + 8) as u16).to_be_bytes());
    jpeg.extend_from_slice(b"Exif\0\0");
    jpeg.extend_from_slice(&tiff);
    jpeg.extend_from_slice(&[0xFF, 0xD9]);
    jpeg
}

fn seoul() -> (&'static str, Value, &'static str, Value) {
    ("N", dms(37, 33, 59), "E", dms(126, 58, 41))
}

fn jpeg_without_exif() -> Vec<u8> {
    vec![0xFF, 0xD8, 0xFF, 0xD9]
}

fn config_in(dir: &TempDir) -> PhotoConfig {
    PhotoConfig {
        upload_dir: dir.path().join("uploads"),
        ..Default::default()
    }
}

/// Write `bytes` outside the upload directory and ingest them through the organ
async fn ingest(organ: &PhotoOrgan, dir: &TempDir, name: &str, bytes: &[u8]) -> Response {
    let incoming = dir.path().join("incoming");
    fs::create_dir_all(&incoming).unwrap();
    let source: PathBuf = incoming.join(name);
    fs::write(&source, bytes).unwrap();

    organ
        .stimulate(create_stimulus(
            "photo.ingest",
            json!({ "source_path": source.to_string_lossy() }),
        ))
        .await
        .unwrap()
}

// ============================================================================
// Organ card
// ============================================================================

#[tokio::test]
async fn test_photo_capabilities() {
    let dir = TempDir::new().unwrap();
    let organ = PhotoOrgan::new(&config_in(&dir)).unwrap();

    let response = organ.stimulate(create_stimulus("photo.capabilities", json!({}))).await.unwrap();

    assert!(response.ok);
    assert_eq!(response.output["name"], "soma_photo");
    assert_eq!(response.output["functions"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn test_function_cards_have_required_fields() {
    let dir = TempDir::new().unwrap();
    let card = PhotoOrgan::new(&config_in(&dir)).unwrap().describe();

    assert!(card.execution_modes.contains(&"server".to_string()));
    for function in &card.functions {
        assert!(!function.name.is_empty(), "Function name is empty");
        assert!(!function.description.is_empty(), "Function description is empty for {}", function.name);
        assert!(!function.tags.is_empty(), "Function tags are empty for {}", function.name);
        assert!(!function.examples.is_empty(), "Function examples are empty for {}", function.name);
        assert!(function.output_schema.is_object(), "Output schema not an object for {}", function.name);
    }
}

#[tokio::test]
async fn test_unsupported_operation() {
    let dir = TempDir::new().unwrap();
    let organ = PhotoOrgan::new(&config_in(&dir)).unwrap();

    let response = organ.stimulate(create_stimulus("audio.preprocess", json!({}))).await.unwrap();

    assert!(!response.ok);
    assert!(response.output["error"].as_str().unwrap().contains("Unsupported"));
}

#[tokio::test]
async fn test_missing_required_input() {
    let dir = TempDir::new().unwrap();
    let organ = PhotoOrgan::new(&config_in(&dir)).unwrap();

    let response = organ.stimulate(create_stimulus("photo.metadata", json!({}))).await.unwrap();

    assert!(!response.ok);
    assert!(response.output["error"].as_str().unwrap().contains("input_path"));
}

// ============================================================================
// Metadata
// ============================================================================

#[tokio::test]
async fn test_metadata_operation() {
    let dir = TempDir::new().unwrap();
    let organ = PhotoOrgan::new(&config_in(&dir)).unwrap();
    let path = dir.path().join("IMG_0001.jpg");
    fs::write(&path, jpeg_with(&exif_fields(Some("2023:07:04 15:30:00"), Some(seoul())))).unwrap();

    let response = organ
        .stimulate(create_stimulus("photo.metadata", json!({ "input_path": path.to_string_lossy() })))
        .await
        .unwrap();

    assert!(response.ok);
    let output = &response.output;
    assert_eq!(output["make"], "TestCam");
    assert_eq!(output["location"]["state"], "found");
    let latitude = output["location"]["value"]["latitude"].as_f64().unwrap();
    assert!((latitude - (37.0 + 33.0 / 60.0 + 59.0 / 3600.0)).abs() < 1e-9);
    assert_eq!(output["captured_at"]["state"], "found");
    assert_eq!(output["tags"]["GPSInfo"]["GPSLatitudeRef"], "N");
}

#[tokio::test]
async fn test_metadata_of_unreadable_file_is_absent() {
    let dir = TempDir::new().unwrap();
    let organ = PhotoOrgan::new(&config_in(&dir)).unwrap();

    let response = organ
        .stimulate(create_stimulus("photo.metadata", json!({ "input_path": "/nonexistent/photo.jpg" })))
        .await
        .unwrap();

    assert!(response.ok);
    assert!(response.output["tags"].is_null());
    assert_eq!(response.output["location"]["state"], "missing");
    assert_eq!(response.output["captured_at"]["state"], "missing");
}

#[test]
fn test_southern_western_hemispheres_negative() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rio.jpg");
    let position = ("S", dms(22, 54, 0), "W", dms(43, 12, 0));
    fs::write(&path, jpeg_with(&exif_fields(None, Some(position)))).unwrap();

    let meta = extract_metadata(&path, &ExtractOptions::default());
    let coords = meta.coordinates().unwrap();
    assert!((coords.latitude + 22.9).abs() < 1e-9);
    assert!((coords.longitude + 43.2).abs() < 1e-9);
    assert!(meta.captured_at.is_missing());
}

// ============================================================================
// Upload classification
// ============================================================================

#[tokio::test]
async fn test_ingest_success_renames_by_capture_time() {
    let dir = TempDir::new().unwrap();
    let organ = PhotoOrgan::new(&config_in(&dir)).unwrap();

    let bytes = jpeg_with(&exif_fields(Some("2023:07:04 15:30:00"), Some(seoul())));
    let response = ingest(&organ, &dir, "IMG_0001.JPG", &bytes).await;

    assert!(response.ok);
    assert_eq!(response.output["status"]["kind"], "success");
    assert_eq!(response.output["level"], "success");
    assert_eq!(response.output["stored_filename"], "20230704_153000.jpg");
    assert_eq!(response.output["captured_at"], "2023-07-04 15:30:00");
    assert!(dir.path().join("uploads/20230704_153000.jpg").is_file());
}

#[tokio::test]
async fn test_ingest_without_exif_is_missing_both() {
    let dir = TempDir::new().unwrap();
    let organ = PhotoOrgan::new(&config_in(&dir)).unwrap();

    let response = ingest(&organ, &dir, "scan.jpg", &jpeg_without_exif()).await;

    assert!(response.ok);
    assert_eq!(response.output["status"]["kind"], "missing_both");
    assert_eq!(response.output["level"], "warning");
    assert_eq!(response.output["stored_filename"], "scan.jpg");
}

#[tokio::test]
async fn test_ingest_gps_without_time_is_missing_time() {
    let dir = TempDir::new().unwrap();
    let organ = PhotoOrgan::new(&config_in(&dir)).unwrap();

    let bytes = jpeg_with(&exif_fields(None, Some(seoul())));
    let response = ingest(&organ, &dir, "gps_only.jpg", &bytes).await;

    assert_eq!(response.output["status"]["kind"], "missing_time");
    assert!(response.output["location"]["latitude"].as_f64().is_some());
    assert_eq!(response.output["stored_filename"], "gps_only.jpg");
}

#[tokio::test]
async fn test_ingest_time_without_gps_is_missing_location() {
    let dir = TempDir::new().unwrap();
    let organ = PhotoOrgan::new(&config_in(&dir)).unwrap();

    let bytes = jpeg_with(&exif_fields(Some("2022:01:02 03:04:05"), None));
    let response = ingest(&organ, &dir, "indoor.jpg", &bytes).await;

    assert_eq!(response.output["status"]["kind"], "missing_location");
    assert_eq!(response.output["stored_filename"], "20220102_030405.jpg");
}

#[tokio::test]
async fn test_same_capture_second_rejected_as_duplicate() {
    let dir = TempDir::new().unwrap();
    let organ = PhotoOrgan::new(&config_in(&dir)).unwrap();
    let bytes = jpeg_with(&exif_fields(Some("2023:07:04 15:30:00"), Some(seoul())));

    let first = ingest(&organ, &dir, "a.jpg", &bytes).await;
    let second = ingest(&organ, &dir, "b.jpg", &bytes).await;

    assert_eq!(first.output["status"]["kind"], "success");
    assert_eq!(second.output["status"]["kind"], "rejected");
    assert_eq!(second.output["status"]["reason"], "duplicate_capture_time");
    assert_eq!(second.output["level"], "error");
    assert!(second.output["stored_filename"].is_null());

    let stored = fs::read_dir(dir.path().join("uploads")).unwrap().count();
    assert_eq!(stored, 1);

    let uploads = organ.metrics().snapshot().uploads;
    assert_eq!(uploads.success, 1);
    assert_eq!(uploads.duplicates, 1);
}

#[test]
fn test_concurrent_same_second_uploads_store_one_file() {
    const UPLOADERS: usize = 16;

    let dir = TempDir::new().unwrap();
    let store = Arc::new(PhotoStore::open(&config_in(&dir)).unwrap());
    let bytes = Arc::new(jpeg_with(&exif_fields(Some("2023:07:04 15:30:00"), Some(seoul()))));
    let start = Arc::new(Barrier::new(UPLOADERS));

    let handles: Vec<_> = (0..UPLOADERS)
        .map(|i| {
            let store = Arc::clone(&store);
            let bytes = Arc::clone(&bytes);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                store.ingest(&format!("IMG_{:04}.jpg", i), &bytes)
            })
        })
        .collect();
    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let stored: Vec<_> = outcomes.iter().filter(|o| o.status.is_stored()).collect();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].stored_filename.as_deref(), Some("20230704_153000.jpg"));

    for outcome in outcomes.iter().filter(|o| !o.status.is_stored()) {
        assert_eq!(
            outcome.status,
            OutcomeStatus::Rejected(RejectReason::DuplicateCaptureTime("20230704_153000.jpg".to_string()))
        );
    }

    // only the winner remains; every staged temp file is gone
    assert_eq!(store.list().unwrap(), vec!["20230704_153000.jpg".to_string()]);
    assert_eq!(fs::read_dir(store.root()).unwrap().count(), 1);
}

#[test]
fn test_two_digit_year_and_overwrite_policy() {
    let dir = TempDir::new().unwrap();
    let store = PhotoStore::open(&PhotoConfig {
        year_format: YearFormat::TwoDigit,
        on_duplicate: DuplicatePolicy::Overwrite,
        ..config_in(&dir)
    })
    .unwrap();
    let bytes = jpeg_with(&exif_fields(Some("2023:07:04 15:30:00"), None));

    let first = store.ingest("a.jpg", &bytes);
    let second = store.ingest("b.jpg", &bytes);

    assert_eq!(first.stored_filename.as_deref(), Some("230704_153000.jpg"));
    assert_eq!(second.status, OutcomeStatus::MissingLocation);
    assert_eq!(store.list().unwrap(), vec!["230704_153000.jpg".to_string()]);
}

#[test]
fn test_malformed_time_strict_and_lenient() {
    let dir = TempDir::new().unwrap();
    let bytes = jpeg_with(&exif_fields(Some("2023-07-04 15:30:00"), Some(seoul())));

    let strict = PhotoStore::open(&config_in(&dir)).unwrap();
    let outcome = strict.ingest("odd.jpg", &bytes);
    assert!(matches!(
        outcome.status,
        OutcomeStatus::Rejected(RejectReason::MalformedMetadata(_))
    ));
    assert!(strict.list().unwrap().is_empty());

    let lenient = PhotoStore::open(&PhotoConfig {
        metadata_mode: MetadataMode::Lenient,
        ..config_in(&dir)
    })
    .unwrap();
    let outcome = lenient.ingest("odd.jpg", &bytes);
    assert_eq!(outcome.status, OutcomeStatus::MissingTime);
    assert_eq!(outcome.stored_filename.as_deref(), Some("odd.jpg"));
}

#[tokio::test]
async fn test_invalid_upload_rejected() {
    let dir = TempDir::new().unwrap();
    let organ = PhotoOrgan::new(&config_in(&dir)).unwrap();

    let response = ingest(&organ, &dir, "notes.txt", b"plain text").await;

    assert!(response.ok);
    assert_eq!(response.output["status"]["reason"], "invalid_file");
    assert_eq!(organ.metrics().snapshot().uploads.rejected, 1);
}

#[tokio::test]
async fn test_ingest_missing_source_fails() {
    let dir = TempDir::new().unwrap();
    let organ = PhotoOrgan::new(&config_in(&dir)).unwrap();

    let response = organ
        .stimulate(create_stimulus("photo.ingest", json!({ "source_path": "/nonexistent/a.jpg" })))
        .await
        .unwrap();

    assert!(!response.ok);
    assert_eq!(response.output["kind"], "ProcessingError");
}

// ============================================================================
// Route and delete
// ============================================================================

#[tokio::test]
async fn test_route_ordered_by_capture_time() {
    let dir = TempDir::new().unwrap();
    let organ = PhotoOrgan::new(&config_in(&dir)).unwrap();

    let busan = ("N", dms(35, 10, 0), "E", dms(129, 4, 0));
    let jeju = ("N", dms(33, 30, 0), "E", dms(126, 31, 0));
    ingest(&organ, &dir, "3.jpg", &jpeg_with(&exif_fields(Some("2023:07:06 10:00:00"), Some(jeju)))).await;
    ingest(&organ, &dir, "1.jpg", &jpeg_with(&exif_fields(Some("2023:07:04 09:00:00"), Some(seoul())))).await;
    ingest(&organ, &dir, "2.jpg", &jpeg_with(&exif_fields(Some("2023:07:05 12:00:00"), Some(busan)))).await;
    ingest(&organ, &dir, "nowhere.jpg", &jpeg_with(&exif_fields(Some("2023:07:01 00:00:00"), None))).await;

    let response = organ.stimulate(create_stimulus("photo.route", json!({}))).await.unwrap();

    assert!(response.ok);
    assert_eq!(response.output["count"], 3);
    let names: Vec<&str> = response.output["points"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["filename"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["20230704_090000.jpg", "20230705_120000.jpg", "20230706_100000.jpg"]);
    assert_eq!(response.output["points"][0]["captured_at"], "2023-07-04 09:00:00");
}

#[tokio::test]
async fn test_delete_stored_photo() {
    let dir = TempDir::new().unwrap();
    let organ = PhotoOrgan::new(&config_in(&dir)).unwrap();
    ingest(&organ, &dir, "scan.jpg", &jpeg_without_exif()).await;

    let response = organ
        .stimulate(create_stimulus("photo.delete", json!({ "filename": "scan.jpg" })))
        .await
        .unwrap();
    assert!(response.ok);
    assert!(!dir.path().join("uploads/scan.jpg").exists());

    let response = organ
        .stimulate(create_stimulus("photo.delete", json!({ "filename": "../incoming/scan.jpg" })))
        .await
        .unwrap();
    assert!(!response.ok);
    assert!(dir.path().join("incoming/scan.jpg").exists());
}

#[tokio::test]
async fn test_metrics_operation() {
    let dir = TempDir::new().unwrap();
    let organ = PhotoOrgan::new(&config_in(&dir)).unwrap();
    ingest(&organ, &dir, "scan.jpg", &jpeg_without_exif()).await;

    let response = organ.stimulate(create_stimulus("metrics", json!({}))).await.unwrap();

    assert!(response.ok);
    assert_eq!(response.output["operations"]["photo_ingest"], 1);
    assert_eq!(response.output["uploads"]["missing_both"], 1);
}
