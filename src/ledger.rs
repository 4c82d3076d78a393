//! The caption ledger: an append-only CSV of `filename,caption` rows.
//!
//! The ledger is deliberately dumb. No header, no uniqueness, no ordering
//! guarantees — rows are appended as captions arrive and a lookup takes the
//! first match, so a stale row for a re-captioned image simply loses to the
//! earlier one. This matches the file format the captioning runs have always
//! produced, and decks captioned by older runs remain usable.
//!
//! Reconciliation is the one piece of logic here: before a directory run the
//! set difference between images on disk and filenames already recorded
//! decides what still needs a (paid) caption request.

use crate::error::DeckAltError;
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::path::Path;

/// One `filename,caption` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionRecord {
    pub file_name: String,
    pub caption: String,
}

/// An in-memory view of a ledger file.
#[derive(Debug, Default)]
pub struct CaptionLedger {
    records: Vec<CaptionRecord>,
}

impl CaptionLedger {
    /// Load a ledger from disk. The file must exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DeckAltError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DeckAltError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .map_err(|e| DeckAltError::Ledger {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row.map_err(|e| DeckAltError::Ledger {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
            let file_name = row.get(0).unwrap_or_default().trim().to_string();
            if file_name.is_empty() {
                continue;
            }
            records.push(CaptionRecord {
                file_name,
                caption: row.get(1).unwrap_or_default().to_string(),
            });
        }
        Ok(Self { records })
    }

    /// Load a ledger, treating a missing file as empty.
    ///
    /// Reconciliation before a first-ever run sees an empty ledger, not an
    /// error — every image is simply missing.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, DeckAltError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// All records, in file order.
    pub fn records(&self) -> &[CaptionRecord] {
        &self.records
    }

    /// Caption for a filename — first match wins, later duplicates lose.
    pub fn lookup(&self, file_name: &str) -> Option<&str> {
        self.records
            .iter()
            .find(|r| r.file_name == file_name)
            .map(|r| r.caption.as_str())
    }

    /// Filenames already recorded.
    pub fn recorded_files(&self) -> HashSet<&str> {
        self.records.iter().map(|r| r.file_name.as_str()).collect()
    }

    /// The images in `present` that have no ledger row yet, preserving the
    /// order of `present`.
    pub fn missing_from<'a>(&self, present: &'a [String]) -> Vec<&'a str> {
        let recorded = self.recorded_files();
        present
            .iter()
            .map(String::as_str)
            .filter(|name| !recorded.contains(name))
            .collect()
    }
}

/// Append one row to the ledger file, creating it if needed.
///
/// Each append opens, writes, and flushes — the run can be killed at any
/// point and every caption paid for so far is on disk.
pub fn append_record(
    path: impl AsRef<Path>,
    file_name: &str,
    caption: &str,
) -> Result<(), DeckAltError> {
    let path = path.as_ref();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| DeckAltError::Ledger {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    writer
        .write_record([file_name, caption])
        .and_then(|_| writer.flush().map_err(Into::into))
        .map_err(|e| DeckAltError::Ledger {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn append_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("record_captions.csv");

        append_record(&path, "image_pg0_idx0.png", "a red barn").unwrap();
        append_record(&path, "image_pg0_idx1.png", "sunset, with \"clouds\"").unwrap();

        let ledger = CaptionLedger::load(&path).unwrap();
        assert_eq!(ledger.records().len(), 2);
        assert_eq!(ledger.lookup("image_pg0_idx0.png"), Some("a red barn"));
        assert_eq!(
            ledger.lookup("image_pg0_idx1.png"),
            Some("sunset, with \"clouds\"")
        );
    }

    #[test]
    fn first_match_wins_over_duplicates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.csv");

        append_record(&path, "image_pg1_idx0.png", "first caption").unwrap();
        append_record(&path, "image_pg1_idx0.png", "stale rewrite").unwrap();

        let ledger = CaptionLedger::load(&path).unwrap();
        assert_eq!(ledger.lookup("image_pg1_idx0.png"), Some("first caption"));
    }

    #[test]
    fn reads_quoted_captions_from_older_runs() {
        // Older runs always quoted the caption column by hand.
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.csv");
        std::fs::write(
            &path,
            "image_pg0_idx0.png,\"a dog, running\"\nimage_pg0_idx1.png,\"\"\n",
        )
        .unwrap();

        let ledger = CaptionLedger::load(&path).unwrap();
        assert_eq!(ledger.lookup("image_pg0_idx0.png"), Some("a dog, running"));
        assert_eq!(ledger.lookup("image_pg0_idx1.png"), Some(""));
    }

    #[test]
    fn missing_set_is_exact_difference() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.csv");
        append_record(&path, "image_pg0_idx0.png", "done").unwrap();
        append_record(&path, "image_pg2_idx1.png", "also done").unwrap();

        let ledger = CaptionLedger::load(&path).unwrap();
        let present = vec![
            "image_pg0_idx0.png".to_string(),
            "image_pg1_idx0.png".to_string(),
            "image_pg2_idx1.png".to_string(),
            "image_pg3_idx0.png".to_string(),
        ];
        assert_eq!(
            ledger.missing_from(&present),
            vec!["image_pg1_idx0.png", "image_pg3_idx0.png"]
        );
    }

    #[test]
    fn empty_caption_row_counts_as_recorded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.csv");
        append_record(&path, "image_pg0_idx0.png", "").unwrap();

        let ledger = CaptionLedger::load(&path).unwrap();
        let present = vec!["image_pg0_idx0.png".to_string()];
        assert!(ledger.missing_from(&present).is_empty());
    }

    #[test]
    fn missing_ledger_is_error_but_default_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.csv");

        assert!(CaptionLedger::load(&path).is_err());
        let ledger = CaptionLedger::load_or_default(&path).unwrap();
        assert!(ledger.records().is_empty());
    }
}
