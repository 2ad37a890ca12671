// CLI exit codes and error reporting
use std::io::Write;
use std::process::{Command, Output};

fn ocr_ingest(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ocr-ingest"))
        .args(args)
        .env("RUST_LOG", "off")
        .env_remove("OCR_INGEST_CONFIG")
        .output()
        .expect("failed to run ocr-ingest")
}

#[test]
fn test_missing_pdf_exits_with_2() {
    let output = ocr_ingest(&["pdf", "/nonexistent/scan.pdf", "--prefer-ocr"]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("Error:"), "stderr: {stderr}");
    assert!(stderr.contains("rasterization failed"));
}

#[test]
fn test_empty_image_dir_exits_with_2() {
    let dir = tempfile::tempdir().unwrap();
    let output = ocr_ingest(&["image", dir.path().to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("no .png images"));
}

#[test]
fn test_unknown_engine_reported() {
    let output = ocr_ingest(&["pdf", "/nonexistent/scan.pdf", "--engine", "ghost"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown engine: ghost"));
}

#[test]
fn test_invalid_config_file_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "confidence_threshold = 2.0").unwrap();
    let output = ocr_ingest(&[
        "pdf",
        "/nonexistent/scan.pdf",
        "--config",
        file.path().to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid configuration"));
}

#[test]
fn test_htr_run_validates_fallback_engines() {
    let dir = tempfile::tempdir().unwrap();
    image::RgbImage::from_pixel(8, 8, image::Rgb([255, 255, 255]))
        .save(dir.path().join("page-1.png"))
        .unwrap();
    let output = ocr_ingest(&[
        "image",
        dir.path().to_str().unwrap(),
        "--enable-htr",
        "--engine",
        "tesseract",
        "--fallback",
        "ghost",
    ]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown engine: ghost"));
}
