//! Append-only JSON-lines files
//!
//! Usage snapshots and incident records are persisted as one
//! self-describing JSON object per line, one file per tenant. Records are
//! never rewritten in place; updating means appending a newer line and
//! readers take the last matching line as current state.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::WardenResult;

/// Append one record as a JSON line, creating the file (and parent
/// directory) if needed.
pub fn append_line<T: Serialize>(path: &Path, record: &T) -> WardenResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let line = serde_json::to_string(record)?;
    writeln!(file, "{}", line)?;
    Ok(())
}

/// Read every decodable record in file order. Lines that fail to decode
/// are skipped with a warning so one corrupt line cannot poison the log.
pub fn read_lines<T: DeserializeOwned>(path: &Path) -> WardenResult<Vec<T>> {
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!("skipping undecodable line {} in {}: {}", idx + 1, path.display(), e);
            }
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Row {
        id: String,
        n: u32,
    }

    #[test]
    fn append_then_read_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t1_usage.jsonl");
        for n in 0..3 {
            append_line(&path, &Row { id: "a".into(), n }).unwrap();
        }
        let rows: Vec<Row> = read_lines(&path).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].n, 2);
    }

    #[test]
    fn corrupt_line_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        append_line(&path, &Row { id: "a".into(), n: 1 }).unwrap();
        std::fs::write(&path, {
            let mut existing = std::fs::read_to_string(&path).unwrap();
            existing.push_str("{not json\n");
            existing
        })
        .unwrap();
        append_line(&path, &Row { id: "b".into(), n: 2 }).unwrap();
        let rows: Vec<Row> = read_lines(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].id, "b");
    }
}
