//! `dealpush check` – validate a records file without sending it.

use anyhow::{bail, Result};
use dealpush_core::record;
use std::path::Path;

pub fn run_check(file: &Path, derive_ids: bool) -> Result<()> {
    let mut records = record::load_records(file)?;
    let assigned = if derive_ids {
        record::assign_missing_ids(&mut records)
    } else {
        0
    };
    let missing = records.iter().filter(|r| r.id == 0).count();
    let duplicates = record::duplicate_ids(&records);

    println!("records:     {}", records.len());
    println!("derived ids: {}", assigned);
    println!("missing ids: {}", missing);
    if duplicates.is_empty() {
        println!("duplicates:  none");
    } else {
        println!("duplicates:  {:?}", duplicates);
    }

    if missing > 0 {
        bail!("{} record(s) have no id", missing);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file(contents: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn ok_when_ids_derived() {
        let f = file(r#"[{"name": "a"}, {"id": 2, "name": "b"}]"#);
        assert!(run_check(f.path(), true).is_ok());
    }

    #[test]
    fn fails_on_missing_ids_without_derivation() {
        let f = file(r#"[{"name": "a"}]"#);
        assert!(run_check(f.path(), false).is_err());
    }

    #[test]
    fn fails_on_invalid_json() {
        let f = file("not json");
        assert!(run_check(f.path(), true).is_err());
    }
}
