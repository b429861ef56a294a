//! LMDB database integrity checks.
//!
//! Run on startup to detect corruption early, before the node accepts any
//! operation.

use std::path::Path;

use crate::environment::{
    LmdbEnvironment, ALLOWANCES_DB, BALANCES_DB, BATCHES_DB, EVENTS_DB, META_DB, STATE_DB,
    VERIFIERS_DB,
};
use crate::ledger::read_header;
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

/// Check LMDB database integrity.
///
/// Counts the entries of each database. Read failures are recorded in the
/// report rather than causing a hard error. Beyond that:
/// - the state database holds at most the header;
/// - the batch table has exactly as many rows as the header lists;
/// - the event log is gap-free (its last key is `len - 1`).
pub fn check_integrity(environment: &LmdbEnvironment) -> Result<IntegrityReport, LmdbError> {
    let mut report = IntegrityReport {
        databases_checked: 0,
        total_entries: 0,
        errors: Vec::new(),
    };

    let rtxn = environment.env().read_txn()?;

    let counts = [
        (STATE_DB, environment.state_db.len(&rtxn)),
        (BATCHES_DB, environment.batches_db.len(&rtxn)),
        (BALANCES_DB, environment.balances_db.len(&rtxn)),
        (ALLOWANCES_DB, environment.allowances_db.len(&rtxn)),
        (VERIFIERS_DB, environment.verifiers_db.len(&rtxn)),
        (EVENTS_DB, environment.events_db.len(&rtxn)),
        (META_DB, environment.meta_db.len(&rtxn)),
    ];
    for (db_name, count) in counts {
        report.databases_checked += 1;
        match count {
            Ok(count) => report.total_entries += count,
            Err(e) => report
                .errors
                .push(format!("failed to read database '{}': {}", db_name, e)),
        }
    }

    match environment.state_db.len(&rtxn)? {
        0 | 1 => {}
        n => report
            .errors
            .push(format!("state database holds {} entries, expected at most 1", n)),
    }

    let batches = environment.batches_db.len(&rtxn)?;
    match read_header(&environment.state_db, &rtxn) {
        Ok(Some(header)) if header.batch_count != batches => report.errors.push(format!(
            "header lists {} batches but the batch table holds {}",
            header.batch_count, batches
        )),
        Ok(None) if batches > 0 => report
            .errors
            .push(format!("{} batch rows stored without a ledger header", batches)),
        Ok(_) => {}
        Err(e) => report.errors.push(format!("unreadable ledger header: {}", e)),
    }

    let len = environment.events_db.len(&rtxn)?;
    if let Some((last, _)) = environment.events_db.last(&rtxn)? {
        if last + 1 != len {
            report.errors.push(format!(
                "event log has gaps: {} entries but last sequence is {}",
                len, last
            ));
        }
    }

    Ok(report)
}

/// Check if the LMDB data directory looks valid before opening.
///
/// Returns `Ok(())` for a fresh (nonexistent or empty) directory. Returns an
/// error if the directory has contents but `data.mdb` is missing, which
/// suggests corruption or a wrong path.
pub fn check_data_dir(path: &Path) -> Result<(), String> {
    if !path.exists() {
        return Ok(());
    }
    if !path.is_dir() {
        return Err(format!("{} is not a directory", path.display()));
    }
    let is_empty = std::fs::read_dir(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?
        .next()
        .is_none();
    if !is_empty && !path.join("data.mdb").exists() {
        return Err(format!(
            "LMDB directory exists but data.mdb is missing at {}",
            path.display()
        ));
    }
    Ok(())
}
