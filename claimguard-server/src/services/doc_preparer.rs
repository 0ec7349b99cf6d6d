//! Document preparation: raw documents to fixed-size text chunks

use std::ffi::OsStr;
use std::fs;
use std::path::{Component, Path, PathBuf};

use claimguard_common::models::DocumentChunk;
use claimguard_common::{Error, PipelinePaths, Result};
use serde::{Deserialize, Serialize};

use super::synthetic_generator::DocumentMetadata;

/// Characters per chunk window
pub const CHUNK_CHARS: usize = 800;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareSummary {
    pub chunks: usize,
    pub saved_to: String,
}

/// Split `text` into trimmed 800-character windows, dropping empty ones
///
/// Returns `(char_offset, chunk_text)` pairs.
pub fn chunk_text(text: &str) -> Vec<(usize, String)> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(CHUNK_CHARS)
        .enumerate()
        .filter_map(|(i, window)| {
            let chunk: String = window.iter().collect();
            let trimmed = chunk.trim();
            (!trimmed.is_empty()).then(|| (i * CHUNK_CHARS, trimmed.to_string()))
        })
        .collect()
}

/// Metadata file to read; requests may only name files under the raw documents folder
pub fn resolve_metadata_path(paths: &PipelinePaths, requested: Option<&Path>) -> Result<PathBuf> {
    let Some(requested) = requested else {
        return Ok(paths.docs_metadata());
    };

    if requested.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(Error::InvalidInput(format!(
            "metadata path {} must not contain '..'",
            requested.display()
        )));
    }

    let resolved = if requested.is_absolute() {
        requested.to_path_buf()
    } else {
        paths.docs_raw_dir.join(requested)
    };
    if !resolved.starts_with(&paths.docs_raw_dir) {
        return Err(Error::InvalidInput(format!(
            "metadata path {} is outside {}",
            requested.display(),
            paths.docs_raw_dir.display()
        )));
    }
    Ok(resolved)
}

/// Metadata `file` entries name a document directly inside the raw folder
fn is_plain_file_name(file: &str) -> bool {
    Path::new(file).file_name() == Some(OsStr::new(file))
}

fn document_text(docs_dir: &Path, file: &str) -> Result<String> {
    if !is_plain_file_name(file) {
        return Err(Error::InvalidInput(format!(
            "document entry {:?} is not a plain file name",
            file
        )));
    }

    let path = docs_dir.join(file);
    if path.extension().and_then(|e| e.to_str()) == Some("txt") {
        fs::read_to_string(&path).map_err(|e| {
            Error::DataUnavailable(format!("cannot read document {}: {}", path.display(), e))
        })
    } else {
        Ok(format!("[PLACEHOLDER TEXT for {}]", file))
    }
}

/// Chunk every document listed in `metadata_path` and persist the chunk list
pub fn prepare_docs(paths: &PipelinePaths, metadata_path: &Path) -> Result<PrepareSummary> {
    if !metadata_path.exists() {
        return Err(Error::DataUnavailable(format!(
            "document metadata missing at {}; generate data first",
            metadata_path.display()
        )));
    }
    let metadata: Vec<DocumentMetadata> = serde_json::from_str(&fs::read_to_string(metadata_path)?)?;

    let mut chunks = Vec::new();
    for entry in &metadata {
        let text = document_text(&paths.docs_raw_dir, &entry.file)?;
        for (offset, chunk) in chunk_text(&text) {
            chunks.push(DocumentChunk {
                doc_id: format!("{}_{}_chunk{}", entry.claim_id, entry.file, offset),
                claim_id: entry.claim_id.clone(),
                provider_id: entry.provider_id.clone(),
                text: chunk,
            });
        }
    }

    let target = paths.chunks_json();
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&target, serde_json::to_string_pretty(&chunks)?)?;

    tracing::info!(
        documents = metadata.len(),
        chunks = chunks.len(),
        path = %target.display(),
        "Documents prepared"
    );

    Ok(PrepareSummary {
        chunks: chunks.len(),
        saved_to: target.display().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_chunk_offsets_and_trim() {
        let text = format!("{}{}", "a".repeat(800), "  tail  ");
        let chunks = chunk_text(&text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].0, 0);
        assert_eq!(chunks[1], (800, "tail".to_string()));
    }

    #[test]
    fn test_whitespace_windows_skipped() {
        let text = format!("{}{}", " ".repeat(800), "body");
        let chunks = chunk_text(&text);
        assert_eq!(chunks, vec![(800, "body".to_string())]);
        assert!(chunk_text("").is_empty());
    }

    #[test]
    fn test_multibyte_text_chunked_by_chars() {
        let text = "é".repeat(1000);
        let chunks = chunk_text(&text);
        assert_eq!(chunks[0].1.chars().count(), 800);
        assert_eq!(chunks[1].1.chars().count(), 200);
    }

    #[test]
    fn test_prepare_docs_with_placeholder() {
        let dir = TempDir::new().unwrap();
        let paths = PipelinePaths::new(dir.path());
        paths.ensure_directories().unwrap();

        fs::write(paths.docs_raw_dir.join("C100000_invoice.txt"), "Billed hours: 999").unwrap();
        let metadata = vec![
            DocumentMetadata {
                file: "C100000_invoice.txt".to_string(),
                claim_id: "C100000".to_string(),
                provider_id: Some("P1000".to_string()),
            },
            DocumentMetadata {
                file: "scan.pdf".to_string(),
                claim_id: "C100001".to_string(),
                provider_id: None,
            },
        ];
        fs::write(paths.docs_metadata(), serde_json::to_string(&metadata).unwrap()).unwrap();

        let summary = prepare_docs(&paths, &paths.docs_metadata()).unwrap();
        assert_eq!(summary.chunks, 2);

        let chunks: Vec<DocumentChunk> =
            serde_json::from_str(&fs::read_to_string(paths.chunks_json()).unwrap()).unwrap();
        assert_eq!(chunks[0].doc_id, "C100000_C100000_invoice.txt_chunk0");
        assert_eq!(chunks[1].text, "[PLACEHOLDER TEXT for scan.pdf]");
        assert_eq!(chunks[1].provider_id, None);
    }

    #[test]
    fn test_missing_metadata_is_data_unavailable() {
        let dir = TempDir::new().unwrap();
        let paths = PipelinePaths::new(dir.path());
        let err = prepare_docs(&paths, &paths.docs_metadata()).unwrap_err();
        assert!(err.is_data_unavailable());
    }

    #[test]
    fn test_metadata_path_confined_to_docs_folder() {
        let paths = PipelinePaths::new("/srv/cg");

        assert_eq!(resolve_metadata_path(&paths, None).unwrap(), paths.docs_metadata());
        assert_eq!(
            resolve_metadata_path(&paths, Some(Path::new("batch2.json"))).unwrap(),
            paths.docs_raw_dir.join("batch2.json")
        );
        assert_eq!(
            resolve_metadata_path(&paths, Some(paths.docs_metadata().as_path())).unwrap(),
            paths.docs_metadata()
        );

        for bad in ["/etc/passwd", "../../claimguard.db", "sub/../../x.json"] {
            let err = resolve_metadata_path(&paths, Some(Path::new(bad))).unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)), "{} accepted", bad);
        }
    }

    #[test]
    fn test_document_entries_must_be_plain_names() {
        let dir = TempDir::new().unwrap();
        let paths = PipelinePaths::new(dir.path());
        paths.ensure_directories().unwrap();

        for file in ["../secret.txt", "nested/doc.txt", "/etc/hosts.txt", ".."] {
            let metadata = vec![DocumentMetadata {
                file: file.to_string(),
                claim_id: "C100000".to_string(),
                provider_id: None,
            }];
            fs::write(paths.docs_metadata(), serde_json::to_string(&metadata).unwrap()).unwrap();

            let err = prepare_docs(&paths, &paths.docs_metadata()).unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)), "{} accepted", file);
        }
        assert!(!paths.chunks_json().exists());
    }
}
