//! Learning data loading and cleaning.
//!
//! The learning data file is a JSON array with one object per race
//! participation, produced by the export script. Each object carries the
//! horse's indices for that race plus the result of its next race.

use anyhow::Context;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};

/// `next_finish` at or above this value means the next race is unusable
/// (scratched, disqualified, or not run yet).
pub const INVALID_FINISH: f64 = 99.0;

/// Errors the loader reports as distinct kinds.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("learning data not found: {}", .path.display())]
    MissingInput { path: PathBuf },
}

/// One historical race participation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RaceEntry {
    // Indices
    #[serde(default)]
    pub potential: Option<f64>,
    /// Comeback / closing index
    #[serde(default)]
    pub makikaeshi: Option<f64>,
    #[serde(default, rename = "L4F")]
    pub l4f: Option<f64>,
    #[serde(default, rename = "T2F")]
    pub t2f: Option<f64>,
    // Race context
    #[serde(default)]
    pub finish_position: Option<f64>,
    #[serde(default)]
    pub popularity: Option<f64>,
    #[serde(default)]
    pub corner_4: Option<f64>,
    #[serde(default)]
    pub field_size: Option<f64>,
    #[serde(default)]
    pub forward_rate: Option<f64>,
    // Next race outcome
    #[serde(default)]
    pub next_finish: Option<f64>,
    /// Win payout for a 100 yen stake, only meaningful when `next_finish == 1`
    #[serde(default)]
    pub next_payout: Option<f64>,
}

impl RaceEntry {
    pub fn is_valid(&self) -> bool {
        matches!(self.next_finish, Some(f) if f < INVALID_FINISH)
            && self.potential.is_some()
            && self.makikaeshi.is_some()
    }

    pub fn is_top3(&self) -> bool {
        matches!(self.next_finish, Some(f) if f <= 3.0)
    }

    pub fn is_win(&self) -> bool {
        self.next_finish == Some(1.0)
    }
}

/// Loaded learning data with the set of columns seen across all records.
#[derive(Debug, Clone, Default)]
pub struct LearningData {
    pub entries: Vec<RaceEntry>,
    pub columns: BTreeSet<String>,
}

impl LearningData {
    /// Build from parsed JSON objects; columns are the union of their keys.
    pub fn from_objects(objects: Vec<Map<String, Value>>) -> anyhow::Result<Self> {
        let mut columns = BTreeSet::new();
        let mut entries = Vec::with_capacity(objects.len());

        for (i, obj) in objects.into_iter().enumerate() {
            for key in obj.keys() {
                if !columns.contains(key) {
                    columns.insert(key.clone());
                }
            }
            let entry: RaceEntry = serde_json::from_value(Value::Object(obj))
                .with_context(|| format!("Invalid race entry at index {}", i))?;
            entries.push(entry);
        }

        Ok(Self { entries, columns })
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Load learning data from a JSON file.
///
/// A missing file is reported as [`DataError::MissingInput`] so the caller can
/// point at the export step; anything else is a plain error.
pub fn load_learning_data<P: AsRef<Path>>(path: P) -> anyhow::Result<LearningData> {
    let path = path.as_ref();
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(DataError::MissingInput {
                path: path.to_path_buf(),
            }
            .into());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to open {}", path.display()));
        }
    };

    let objects: Vec<Map<String, Value>> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let data = LearningData::from_objects(objects)?;
    tracing::info!(
        "Loaded {} records with {} columns from {}",
        data.len(),
        data.columns.len(),
        path.display()
    );
    Ok(data)
}

/// Keep only records usable for analysis.
pub fn clean(data: &LearningData) -> Vec<&RaceEntry> {
    data.entries.iter().filter(|e| e.is_valid()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_json(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_learning_data() {
        let file = write_json(
            r#"[
                {"race_id": "202401010101", "potential": 5.5, "makikaeshi": 2.0,
                 "L4F": 46.1, "T2F": 24.0, "next_finish": 1, "next_payout": 450},
                {"race_id": "202401010102", "potential": null, "makikaeshi": 1.0,
                 "next_finish": 4}
            ]"#,
        );

        let data = load_learning_data(file.path()).unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data.entries[0].l4f, Some(46.1));
        assert_eq!(data.entries[0].next_payout, Some(450.0));
        assert_eq!(data.entries[1].potential, None);
        assert!(data.has_column("next_payout"));
        assert!(data.has_column("race_id"));
        assert!(!data.has_column("forward_rate"));
    }

    #[test]
    fn test_missing_file_is_typed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("learning-data-full.json");

        let err = load_learning_data(&path).unwrap_err();
        match err.downcast_ref::<DataError>() {
            Some(DataError::MissingInput { path: p }) => assert_eq!(p, &path),
            None => panic!("expected MissingInput, got {err:?}"),
        }
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let file = write_json(r#"[{"potential": 5"#);
        let err = load_learning_data(file.path()).unwrap_err();
        assert!(err.downcast_ref::<DataError>().is_none());
    }

    #[test]
    fn test_wrong_field_type_is_an_error() {
        let file = write_json(r#"[{"potential": "high", "next_finish": 1}]"#);
        assert!(load_learning_data(file.path()).is_err());
    }

    #[test]
    fn test_payout_column_absent() {
        let file = write_json(r#"[{"potential": 5, "makikaeshi": 3, "next_finish": 1}]"#);
        let data = load_learning_data(file.path()).unwrap();
        assert!(!data.has_column("next_payout"));
    }

    #[test]
    fn test_clean_filters_invalid_records() {
        let entry = |next_finish: Option<f64>, potential: Option<f64>, makikaeshi: Option<f64>| {
            RaceEntry {
                potential,
                makikaeshi,
                next_finish,
                ..Default::default()
            }
        };

        let data = LearningData {
            entries: vec![
                entry(Some(1.0), Some(5.0), Some(3.0)),
                entry(Some(99.0), Some(5.0), Some(3.0)),
                entry(Some(120.0), Some(5.0), Some(3.0)),
                entry(None, Some(5.0), Some(3.0)),
                entry(Some(2.0), None, Some(3.0)),
                entry(Some(2.0), Some(5.0), None),
                entry(Some(98.0), Some(0.0), Some(0.0)),
            ],
            columns: BTreeSet::new(),
        };

        let valid = clean(&data);
        assert_eq!(valid.len(), 2);
        assert!(valid.iter().all(|e| e.next_finish.unwrap() < INVALID_FINISH));
    }

    #[test]
    fn test_is_top3() {
        for (finish, expected) in [(1.0, true), (3.0, true), (3.5, false), (4.0, false)] {
            let entry = RaceEntry {
                next_finish: Some(finish),
                ..Default::default()
            };
            assert_eq!(entry.is_top3(), expected, "finish {finish}");
        }
        assert!(!RaceEntry::default().is_top3());
    }
}
