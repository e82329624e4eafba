use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::archive::error::Result;
use crate::archive::ArticleId;

#[derive(Debug, Serialize, Deserialize)]
struct ResultRow {
    record_id: ArticleId,
    feedback: String,
}

/// Load a previously saved feedback table. A missing file is an empty table.
pub fn load(path: &Path) -> Result<BTreeMap<ArticleId, String>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let mut reader = csv::Reader::from_path(path)?;
    let mut results = BTreeMap::new();
    for row in reader.deserialize::<ResultRow>() {
        let row = row?;
        results.insert(row.record_id, row.feedback);
    }
    Ok(results)
}

/// Write the full feedback table, overwriting any previous copy.
pub fn save(results: &BTreeMap<ArticleId, String>, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for (record_id, feedback) in results {
        writer.serialize(ResultRow {
            record_id: *record_id,
            feedback: feedback.clone(),
        })?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");

        let mut results = BTreeMap::new();
        results.insert(11u64, "keep".to_string());
        results.insert(12u64, "discard, too blurry".to_string());
        results.insert(13u64, String::new());

        save(&results, &path).unwrap();
        assert_eq!(load(&path).unwrap(), results);
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load(&dir.path().join("nowhere.csv")).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn save_overwrites_the_previous_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");

        let mut first = BTreeMap::new();
        first.insert(21u64, "a".to_string());
        first.insert(22u64, "b".to_string());
        save(&first, &path).unwrap();

        let mut second = BTreeMap::new();
        second.insert(21u64, "revised".to_string());
        save(&second, &path).unwrap();

        assert_eq!(load(&path).unwrap(), second);
    }
}
