//! Load a batch of records from a JSON array file.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use super::Record;

/// Read `path` and parse it as a JSON array of records.
pub fn load_records(path: &Path) -> Result<Vec<Record>> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("read records from {}", path.display()))?;
    let records = parse_records(&data).with_context(|| format!("parse {}", path.display()))?;
    tracing::debug!(path = %path.display(), count = records.len(), "loaded records");
    Ok(records)
}

/// Parse a JSON array of records.
pub fn parse_records(data: &str) -> Result<Vec<Record>> {
    serde_json::from_str(data).context("expected a JSON array of record objects")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn parses_array() {
        let records = parse_records(
            r#"[
                {"id": 1, "name": "a", "buff": 1.5},
                {"name": "b", "sku": "sku-b"}
            ]"#,
        )
        .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, 1);
        assert_eq!(records[1].id, 0);
        assert_eq!(records[1].sku.as_deref(), Some("sku-b"));
    }

    #[test]
    fn empty_array_is_ok() {
        assert!(parse_records("[]").unwrap().is_empty());
    }

    #[test]
    fn rejects_object_and_bad_id() {
        assert!(parse_records(r#"{"id": 1}"#).is_err());
        assert!(parse_records(r#"[{"id": "one", "name": "a"}]"#).is_err());
    }

    #[test]
    fn load_from_file() {
        let mut f = NamedTempFile::new().unwrap();
        write!(f, r#"[{{"id": 9, "name": "M4A1-S | Hyper Beast"}}]"#).unwrap();
        let records = load_records(f.path()).unwrap();
        assert_eq!(records, vec![Record::new(9, "M4A1-S | Hyper Beast")]);
    }

    #[test]
    fn missing_file_mentions_path() {
        let err = load_records(Path::new("/nonexistent/deals.json")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/deals.json"));
    }
}
