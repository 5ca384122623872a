//! Live upload against a real S3-compatible service
//!
//! Run with:
//! CHUTE_S3_TESTS=1 S3_BUCKET=... ACCESS_KEY=... SECRET_KEY=... cargo test -- --ignored
//!
//! `ENDPOINT` (e.g. `localhost:9000` for MinIO) and `REGION` are optional.

#![cfg(feature = "s3-native")]

use chute::config::MIB;
use chute::{MultipartUpload, UploadConfig};
use std::io::Cursor;

fn live_config() -> Option<UploadConfig> {
    if std::env::var("CHUTE_S3_TESTS").ok().as_deref() != Some("1") {
        return None;
    }

    let mut builder = UploadConfig::builder()
        .bucket(std::env::var("S3_BUCKET").ok()?)
        .credentials(
            std::env::var("ACCESS_KEY").ok()?,
            std::env::var("SECRET_KEY").ok()?,
        )
        .max_part_size(5 * MIB);

    if let Ok(endpoint) = std::env::var("ENDPOINT") {
        builder = builder.endpoint(endpoint).force_path_style(true);
    }
    if let Ok(region) = std::env::var("REGION") {
        builder = builder.region(region);
    }
    Some(builder.build())
}

#[tokio::test]
#[ignore]
async fn test_live_multipart_upload() {
    let Some(config) = live_config() else {
        eprintln!("skipping: CHUTE_S3_TESTS=1 and credentials not set");
        return;
    };
    chute::logging::init_test_logging();

    let data: Vec<u8> = (0..11 * MIB).map(|i| (i % 253) as u8).collect();
    let upload = MultipartUpload::s3(config).await;

    let summary = upload
        .upload(Cursor::new(data), "chute-tests/live-multipart.bin")
        .await
        .unwrap();

    assert_eq!(summary.total_bytes, 11 * MIB as u64);
    assert_eq!(summary.parts, 3);
}
