//! Tests for loading local `.txt` and `.pdf` documents.

use std::fs;

use ragline::loader::SUPPORTED_EXTENSIONS;
use ragline::{DocumentLoader, RagError};
use tempfile::tempdir;

#[tokio::test]
async fn loads_a_single_text_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("guide.txt");
    fs::write(&path, "Gain staging comes first.").unwrap();

    let documents = DocumentLoader::new(&path).load().await.unwrap();

    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].text, "Gain staging comes first.");
    assert_eq!(documents[0].filename, "guide.txt");
    assert_eq!(documents[0].path, path);
}

#[tokio::test]
async fn directory_loads_supported_files_sorted_by_name() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("b_mixing.txt"), "mixing").unwrap();
    fs::write(dir.path().join("a_tracking.TXT"), "tracking").unwrap();
    fs::write(dir.path().join("notes.md"), "ignored").unwrap();
    fs::create_dir(dir.path().join("nested.txt")).unwrap();
    fs::write(dir.path().join("nested.txt").join("deep.txt"), "not recursive").unwrap();

    let loader = DocumentLoader::new(dir.path());
    let documents = loader.load().await.unwrap();

    let names: Vec<&str> = documents.iter().map(|d| d.filename.as_str()).collect();
    assert_eq!(names, vec!["a_tracking.TXT", "b_mixing.txt"]);
    assert_eq!(documents[1].text, "mixing");
    assert_eq!(loader.list_supported_files().await.unwrap().len(), 2);
}

#[tokio::test]
async fn empty_directory_loads_nothing() {
    let dir = tempdir().unwrap();
    let documents = DocumentLoader::new(dir.path()).load().await.unwrap();
    assert!(documents.is_empty());
}

#[tokio::test]
async fn missing_path_is_a_loader_error() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nowhere");

    let err = DocumentLoader::new(&missing).load().await.unwrap_err();
    assert!(matches!(err, RagError::LoaderError { path, .. } if path.contains("nowhere")));
}

#[tokio::test]
async fn unsupported_extension_is_a_loader_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("slides.pptx");
    fs::write(&path, "binary").unwrap();

    let err = DocumentLoader::new(&path).load().await.unwrap_err();
    assert!(matches!(err, RagError::LoaderError { message, .. } if message.contains("supported")));
}

#[tokio::test]
async fn corrupt_pdf_is_a_loader_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.pdf");
    fs::write(&path, "this is not a pdf").unwrap();

    let err = DocumentLoader::new(&path).load().await.unwrap_err();
    assert!(matches!(err, RagError::LoaderError { .. }));
}

#[tokio::test]
async fn invalid_utf8_text_is_a_loader_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("latin1.txt");
    fs::write(&path, [0xff, 0xfe, 0x41]).unwrap();

    let err = DocumentLoader::new(&path).load().await.unwrap_err();
    assert!(matches!(err, RagError::LoaderError { .. }));
}

#[test]
fn supported_extensions_are_txt_and_pdf() {
    assert_eq!(SUPPORTED_EXTENSIONS, ["txt", "pdf"]);
}
