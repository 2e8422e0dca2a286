//! LMDB database integrity checks.
//!
//! Run on startup to detect corruption early, before the orderer begins
//! writing blocks.

use std::path::Path;
use std::sync::Arc;

use heed::Env;

use crate::environment::{BLOCKS_DB, HISTORY_DB, META_DB};
use crate::LmdbError;

/// Summary of an integrity check run.
#[derive(Debug)]
pub struct IntegrityReport {
    pub databases_checked: u32,
    pub total_entries: u64,
    pub errors: Vec<String>,
}

impl IntegrityReport {
    /// Returns `true` if no errors were detected.
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }
}

const EXPECTED_DATABASES: &[&str] = &[BLOCKS_DB, HISTORY_DB, META_DB];

/// Check LMDB database integrity.
///
/// Opens each expected database and attempts to count entries. Any read
/// failures are recorded in the report rather than causing a hard error.
pub fn check_integrity(env: &Arc<Env>) -> Result<IntegrityReport, LmdbError> {
    let mut report = IntegrityReport {
        databases_checked: 0,
        total_entries: 0,
        errors: Vec::new(),
    };

    let rtxn = env.read_txn()?;

    for &db_name in EXPECTED_DATABASES {
        match env.open_database::<heed::types::Bytes, heed::types::Bytes>(&rtxn, Some(db_name)) {
            Ok(Some(db)) => {
                report.databases_checked += 1;
                match db.len(&rtxn) {
                    Ok(count) => report.total_entries += count,
                    Err(e) => report
                        .errors
                        .push(format!("failed to read database '{}': {}", db_name, e)),
                }
            }
            Ok(None) => {
                report
                    .errors
                    .push(format!("database '{}' is missing", db_name));
            }
            Err(e) => {
                report
                    .errors
                    .push(format!("failed to open database '{}': {}", db_name, e));
            }
        }
    }

    Ok(report)
}

/// Check if the LMDB data directory looks valid before opening.
///
/// A nonexistent or empty directory is a fresh start. A directory holding
/// an LMDB lock file but no `data.mdb` suggests corruption or
/// misconfiguration.
pub fn check_data_dir(path: &Path) -> Result<(), LmdbError> {
    if !path.exists() {
        return Ok(());
    }
    if path.join("lock.mdb").exists() && !path.join("data.mdb").exists() {
        return Err(LmdbError::Corruption(format!(
            "LMDB directory has a lock file but data.mdb is missing at {}",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_data_dir_fresh_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(check_data_dir(&dir.path().join("not-created-yet")).is_ok());
        assert!(check_data_dir(dir.path()).is_ok());
    }

    #[test]
    fn lock_without_data_is_corruption() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("lock.mdb"), b"").unwrap();
        assert!(matches!(
            check_data_dir(dir.path()),
            Err(LmdbError::Corruption(_))
        ));
    }

    #[test]
    fn unhealthy_report() {
        let report = IntegrityReport {
            databases_checked: 2,
            total_entries: 100,
            errors: vec!["database 'history' is missing".to_string()],
        };
        assert!(!report.is_healthy());
    }
}
