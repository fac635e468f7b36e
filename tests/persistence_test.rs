#![cfg(feature = "storage-rocksdb")]

use assert_cmd::cargo_bin;
use std::io::Write;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn test_rocksdb_persistence_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    // 1. First run: issue a card and consume part of it
    let mut csv1 = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv1, "type, card, pay, arrival, reserve, entitlement, quantity, start, end, at").unwrap();
    writeln!(csv1, "issue_count, 1, 9, 8.98, 0.3, 7, , , ,").unwrap();
    writeln!(csv1, "consume, 1, , , , , 3, , ,").unwrap();

    let mut cmd1 = Command::new(cargo_bin!("card-escrow"));
    cmd1.arg(csv1.path()).arg("--db-path").arg(&db_path);

    let output1 = cmd1.output().expect("Failed to execute command");
    assert!(output1.status.success());
    let stdout1 = String::from_utf8_lossy(&output1.stdout);
    assert!(stdout1.contains("1,transfer,0.00"));

    // 2. Second run: the remaining units against the same DB path
    let mut csv2 = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv2, "type, card, pay, arrival, reserve, entitlement, quantity, start, end, at").unwrap();
    writeln!(csv2, "consume, 1, , , , , 4, , ,").unwrap();

    let mut cmd2 = Command::new(cargo_bin!("card-escrow"));
    cmd2.arg(csv2.path()).arg("--db-path").arg(&db_path);

    let output2 = cmd2.output().expect("Failed to execute command");
    assert!(output2.status.success());
    let stdout2 = String::from_utf8_lossy(&output2.stdout);

    // The recovered snapshot still knows 3.84 was recognized, so the flush releases the reserve
    assert!(stdout2.contains("1,transfer,2.70"));
}
