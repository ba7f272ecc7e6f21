//! Concurrency behavior: racing writers, tag index updates, stale locks

use flux_core::repository::CreateOptions;
use serde_json::json;
use std::sync::Arc;

mod common;
use common::{TestRepo, SAMPLE_CSV};

#[test]
fn test_concurrent_creates_same_inputs_converge() {
    let fixture = TestRepo::new();
    let raw = fixture.write_csv("data.csv", SAMPLE_CSV);
    let repo = Arc::new(fixture.repo.clone());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let repo = Arc::clone(&repo);
            let raw = raw.clone();
            std::thread::spawn(move || {
                repo.create(
                    &raw,
                    &json!({"pipeline": [{"step": "lowercase"}]}),
                    CreateOptions::default(),
                )
            })
        })
        .collect();

    let mut hashes = Vec::new();
    for handle in handles {
        hashes.push(handle.join().unwrap().unwrap().hash);
    }

    hashes.dedup();
    assert_eq!(hashes.len(), 1, "all callers must converge on one hash");
    assert_eq!(repo.list().unwrap().len(), 1);
    repo.verify(&hashes[0]).unwrap();
}

#[test]
fn test_concurrent_creates_distinct_inputs_proceed_independently() {
    let fixture = TestRepo::new();
    let repo = Arc::new(fixture.repo.clone());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let repo = Arc::clone(&repo);
            let raw = fixture.write_csv(
                &format!("data{i}.csv"),
                &format!("text,label\nrow number {i},x\n"),
            );
            std::thread::spawn(move || {
                repo.create(
                    &raw,
                    &json!({"pipeline": [{"step": "lowercase"}]}),
                    CreateOptions {
                        tag: Some(format!("run-{i}")),
                        author: None,
                    },
                )
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    assert_eq!(repo.list().unwrap().len(), 4);
    // No lost updates on the shared tag index
    let tags = repo.tags().unwrap();
    assert_eq!(tags.len(), 4);
    for i in 0..4 {
        assert!(tags.contains_key(&format!("run-{i}")));
    }
}

#[test]
fn test_concurrent_retagging_keeps_index_consistent() {
    let fixture = TestRepo::new();
    let raw = fixture.write_csv("data.csv", SAMPLE_CSV);
    let info = fixture
        .repo
        .create(
            &raw,
            &json!({"pipeline": []}),
            CreateOptions::default(),
        )
        .unwrap();
    let repo = Arc::new(fixture.repo.clone());

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let repo = Arc::clone(&repo);
            let hash = info.hash.clone();
            std::thread::spawn(move || repo.tag(&hash, &format!("tag-{i}")))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    let tags = repo.tags().unwrap();
    assert_eq!(tags.len(), 6);
    assert!(tags.values().all(|h| h == &info.hash));
}

#[test]
fn test_stalled_writer_lock_is_reclaimed() {
    let fixture = TestRepo::new();
    let raw = fixture.write_csv("data.csv", SAMPLE_CSV);

    // Simulate a crashed writer: a marker left behind an hour ago
    let config = json!({"pipeline": [{"step": "lowercase"}]});
    let raw_hash = flux_core::hash::hash_file(&raw).unwrap();
    let config_hash = flux_core::hash::hash_config(&config).unwrap();
    let version_hash = flux_core::hash::hash_version(&raw_hash, &config_hash);

    let marker = fixture
        .repo
        .root()
        .join("locks")
        .join(format!("{version_hash}.lock"));
    let acquired_at = (chrono::Utc::now() - chrono::Duration::hours(1)).to_rfc3339();
    let stale_body = format!(r#"{{"pid": 1, "hostname": "dead", "acquired_at": "{acquired_at}"}}"#);
    std::fs::write(&marker, stale_body).unwrap();

    // A fresh writer reclaims the marker and completes normally
    let info = fixture
        .repo
        .create(&raw, &config, CreateOptions::default())
        .unwrap();
    assert_eq!(info.hash, version_hash);
    fixture.repo.verify(&info.hash).unwrap();
}
