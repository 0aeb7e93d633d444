//! Categorized document loading.
//!
//! Reads the three fixed source folders (prds, sprints, roadmaps) under the
//! configured base path. Markdown and plain-text files become one document
//! each; CSV files become one document per data row, with cells flattened
//! to `key: value` lines. Load failures never abort a run: unreadable
//! files are logged and counted, missing folders are logged and skipped.

use std::path::Path;

use tracing::warn;

use crate::models::{DocMetadata, Document};

/// The source folders scanned under the base path, in load order. The
/// folder name doubles as the document type tag.
pub const DOC_FOLDERS: [&str; 3] = ["prds", "sprints", "roadmaps"];

/// Result of a load pass. Failures are folded into counts rather than
/// raised, so ingestion can report data loss without stopping.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub documents: Vec<Document>,
    pub files_loaded: usize,
    pub files_skipped: usize,
    pub folders_missing: usize,
}

/// Load every supported file under the three source folders.
pub fn load_documents(base_path: &Path) -> LoadOutcome {
    let mut outcome = LoadOutcome::default();

    for folder in DOC_FOLDERS {
        let dir = base_path.join(folder);
        if !dir.is_dir() {
            warn!(folder = %dir.display(), "source folder does not exist, skipping");
            outcome.folders_missing += 1;
            continue;
        }

        let mut names = match list_file_names(&dir) {
            Ok(names) => names,
            Err(e) => {
                warn!(folder = %dir.display(), error = %e, "could not read source folder, skipping");
                outcome.folders_missing += 1;
                continue;
            }
        };
        // Deterministic output order regardless of directory enumeration.
        names.sort();

        for name in names {
            let path = dir.join(&name);
            let loaded = match extension_of(&name) {
                Some("md") | Some("markdown") | Some("txt") => load_text(&path, folder, &name),
                Some("csv") => load_csv(&path, folder, &name),
                _ => continue,
            };

            match loaded {
                Ok(mut docs) => {
                    outcome.files_loaded += 1;
                    outcome.documents.append(&mut docs);
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "failed to load file, skipping");
                    outcome.files_skipped += 1;
                }
            }
        }
    }

    outcome
}

fn list_file_names(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    Ok(names)
}

fn extension_of(name: &str) -> Option<&str> {
    Path::new(name).extension().and_then(|e| e.to_str())
}

fn load_text(path: &Path, folder: &str, name: &str) -> anyhow::Result<Vec<Document>> {
    let content = std::fs::read_to_string(path)?;
    Ok(vec![Document {
        content,
        metadata: DocMetadata::new(folder, name),
    }])
}

/// One document per CSV data row, cells flattened to `key: value` lines in
/// header order. A malformed row is logged and dropped; the rest of the
/// file still loads.
fn load_csv(path: &Path, folder: &str, name: &str) -> anyhow::Result<Vec<Document>> {
    let raw = std::fs::read_to_string(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(raw.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

    let mut docs = Vec::new();
    for (row_index, record) in reader.records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                warn!(file = %path.display(), row = row_index, error = %e, "malformed CSV row, skipping");
                continue;
            }
        };

        let content = headers
            .iter()
            .zip(record.iter())
            .map(|(key, value)| format!("{}: {}", key, value))
            .collect::<Vec<_>>()
            .join("\n");

        docs.push(Document {
            content,
            metadata: DocMetadata::with_row(folder, name, row_index),
        });
    }

    Ok(docs)
}
