use fault_ledger::record::fields;
use fault_ledger::store::StoreLease;
use fault_ledger::{CaseRecord, CsvHistoryStore, DuplicatePolicy, HistoryStore, LedgerError};
use std::fs;
use std::time::Duration;

fn case(id: &str, status: &str) -> CaseRecord {
    CaseRecord::new().with(fields::CASE_ID, id).with(fields::STATUS, status)
}

#[test]
fn test_history_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.csv");

    let report = CsvHistoryStore::new(&path)
        .merge(vec![case("A", "Open"), case("B", "Open"), case("A", "Closed")])
        .unwrap();
    assert_eq!(report.new_record_count, 2);
    assert_eq!(report.duplicates_dropped, 1);

    let history = CsvHistoryStore::new(&path).load().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history.get("A").unwrap().get(fields::STATUS), Some("Open"));
}

#[test]
fn test_schema_is_union_of_uploads() {
    let dir = tempfile::tempdir().unwrap();
    let store = CsvHistoryStore::new(dir.path().join("history.csv"));

    store.merge(vec![case("A", "Open")]).unwrap();
    store
        .merge(vec![CaseRecord::new()
            .with(fields::CASE_ID, "B")
            .with(fields::ADDRESS, "9 Elm Ave")
            .with("Owner", "field ops")])
        .unwrap();

    let history = store.load().unwrap();
    assert_eq!(history.columns(), &["case_id", "status", "address", "Owner"]);
    assert_eq!(history.get("A").unwrap().get(fields::ADDRESS), None);
    assert_eq!(history.get("B").unwrap().get("Owner"), Some("field ops"));

    let header = fs::read_to_string(store.path()).unwrap();
    assert!(header.starts_with("case_id,status,address,Owner\n"));
}

#[test]
fn test_keep_last_policy_takes_upload() {
    let dir = tempfile::tempdir().unwrap();
    let store =
        CsvHistoryStore::new(dir.path().join("history.csv")).with_policy(DuplicatePolicy::KeepLast);

    store.merge(vec![case("A", "Open")]).unwrap();
    let report = store.merge(vec![case("A", "Closed")]).unwrap();

    assert_eq!(report.new_record_count, 0);
    assert_eq!(report.total_history_count, 1);
    assert_eq!(store.load().unwrap().get("A").unwrap().get(fields::STATUS), Some("Closed"));
}

#[test]
fn test_held_lease_blocks_merge() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.csv");
    let store = CsvHistoryStore::new(&path).with_lock_timeout(Duration::from_millis(100));
    store.merge(vec![case("A", "Open")]).unwrap();
    let before = fs::read(&path).unwrap();

    let lock = dir.path().join("history.csv.lock");
    let lease = StoreLease::acquire(&lock, Duration::from_millis(100)).unwrap();
    assert_eq!(lease.path(), lock.as_path());
    let err = store.merge(vec![case("B", "Open")]).unwrap_err();
    assert!(matches!(err, LedgerError::StoreUnavailable { .. }));
    assert_eq!(err.stage(), "store");
    assert_eq!(fs::read(&path).unwrap(), before);

    drop(lease);
    assert_eq!(store.merge(vec![case("B", "Open")]).unwrap().new_record_count, 1);
}

#[test]
fn test_unreadable_store_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    // A directory where the file should be
    let path = dir.path().join("history.csv");
    fs::create_dir(&path).unwrap();

    let err = CsvHistoryStore::new(&path).load().unwrap_err();
    assert!(matches!(err, LedgerError::StoreUnavailable { .. }));
}

#[test]
fn test_lock_file_from_crashed_merge_does_not_block() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.csv");
    // What a merge killed while holding the lease leaves on disk
    fs::write(dir.path().join("history.csv.lock"), "4194303\n").unwrap();

    let store = CsvHistoryStore::new(&path).with_lock_timeout(Duration::from_millis(100));
    assert_eq!(store.merge(vec![case("A", "Open")]).unwrap().new_record_count, 1);
    assert_eq!(store.merge(vec![case("B", "Open")]).unwrap().total_history_count, 2);
}

#[test]
fn test_failed_write_keeps_previous_history() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.csv");
    let store = CsvHistoryStore::new(&path);
    store.merge(vec![case("A", "Open")]).unwrap();
    let before = fs::read(&path).unwrap();

    // Occupy the temp file's name so the write cannot start
    let blocker = dir.path().join(format!("history.csv.tmp.{}", std::process::id()));
    fs::create_dir(&blocker).unwrap();

    let err = store.merge(vec![case("B", "Open")]).unwrap_err();
    assert!(matches!(err, LedgerError::StoreUnavailable { .. }));
    assert_eq!(fs::read(&path).unwrap(), before);

    for entry in fs::read_dir(dir.path()).unwrap() {
        let entry = entry.unwrap();
        if entry.file_name().to_string_lossy().contains(".tmp.") {
            assert!(entry.file_type().unwrap().is_dir(), "leftover temp file {:?}", entry.path());
        }
    }

    fs::remove_dir(&blocker).unwrap();
    assert_eq!(store.merge(vec![case("B", "Open")]).unwrap().new_record_count, 1);
}
