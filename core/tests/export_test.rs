//! Export / import round trips and archive integrity checks

use flate2::write::GzEncoder;
use flate2::Compression;
use flux_core::error::FluxError;
use flux_core::repository::{CreateOptions, Repository};
use serde_json::json;

mod common;
use common::{fast_locks, TestRepo, SAMPLE_CSV};

#[test]
fn test_export_import_round_trip() {
    let source = TestRepo::new();
    let raw = source.write_csv("data.csv", SAMPLE_CSV);
    let original = source
        .repo
        .create(
            &raw,
            &json!({"pipeline": [{"step": "lowercase"}, {"step": "tokenize"}]}),
            CreateOptions {
                tag: Some("release".to_string()),
                author: Some("exporter".to_string()),
            },
        )
        .unwrap();

    let export_dir = source.temp_dir.path().join("exports");
    let archive = source.repo.export("release", &export_dir).unwrap();
    assert_eq!(archive.file_name().unwrap(), "release.tar.gz");

    let target = TestRepo::new();
    let imported = target.repo.import(&archive).unwrap();

    assert_eq!(imported.hash, original.hash);
    assert_eq!(imported.raw_hash, original.raw_hash);
    assert_eq!(imported.config_hash, original.config_hash);
    assert_eq!(imported.metrics, original.metrics);
    assert_eq!(imported.pipeline, original.pipeline);
    // Tags are repository-local state, not part of the archive
    assert!(imported.tags.is_empty());

    target.repo.verify(&imported.hash).unwrap();
}

#[test]
fn test_export_by_hash_uses_hash_name() {
    let fixture = TestRepo::new();
    let raw = fixture.write_csv("data.csv", SAMPLE_CSV);
    let info = fixture
        .repo
        .create(&raw, &json!({"pipeline": []}), CreateOptions::default())
        .unwrap();

    let export_dir = fixture.temp_dir.path().join("exports");
    let archive = fixture.repo.export(&info.hash, &export_dir).unwrap();
    assert_eq!(
        archive.file_name().unwrap().to_str().unwrap(),
        format!("{}.tar.gz", info.hash)
    );
}

#[test]
fn test_import_existing_version_is_noop() {
    let fixture = TestRepo::new();
    let raw = fixture.write_csv("data.csv", SAMPLE_CSV);
    let info = fixture
        .repo
        .create(&raw, &json!({"pipeline": []}), CreateOptions::default())
        .unwrap();

    let export_dir = fixture.temp_dir.path().join("exports");
    let archive = fixture.repo.export(&info.hash, &export_dir).unwrap();

    let imported = fixture.repo.import(&archive).unwrap();
    assert_eq!(imported.hash, info.hash);
    assert_eq!(fixture.repo.list().unwrap().len(), 1);
}

#[test]
fn test_import_rejects_tampered_contents() {
    let source = TestRepo::new();
    let raw = source.write_csv("data.csv", SAMPLE_CSV);
    let info = source
        .repo
        .create(&raw, &json!({"pipeline": []}), CreateOptions::default())
        .unwrap();

    // Re-pack the version under a hash its contents cannot reproduce
    let version_dir = source.repo.root().join("versions").join(&info.hash);
    let forged_hash = "0".repeat(64);
    let archive_path = source.temp_dir.path().join("forged.tar.gz");
    let file = std::fs::File::create(&archive_path).unwrap();
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    builder.append_dir_all(&forged_hash, &version_dir).unwrap();
    builder.into_inner().unwrap().finish().unwrap();

    let target = TestRepo::new();
    let err = target.repo.import(&archive_path).unwrap_err();
    assert!(matches!(err, FluxError::CorruptArchive { .. }));
    assert!(target.repo.list().unwrap().is_empty());
}

#[test]
fn test_import_rejects_modified_raw_data() {
    let source = TestRepo::new();
    let raw = source.write_csv("data.csv", SAMPLE_CSV);
    let info = source
        .repo
        .create(&raw, &json!({"pipeline": []}), CreateOptions::default())
        .unwrap();

    let export_dir = source.temp_dir.path().join("exports");
    let archive = source.repo.export(&info.hash, &export_dir).unwrap();

    // Unpack, tamper with the raw artifact, re-pack under the same hash
    let scratch = source.temp_dir.path().join("scratch");
    std::fs::create_dir_all(&scratch).unwrap();
    let file = std::fs::File::open(&archive).unwrap();
    tar::Archive::new(flate2::read::GzDecoder::new(file))
        .unpack(&scratch)
        .unwrap();
    std::fs::write(
        scratch.join(&info.hash).join("raw.csv"),
        "text\nsomething else entirely\n",
    )
    .unwrap();

    let tampered = source.temp_dir.path().join("tampered.tar.gz");
    let file = std::fs::File::create(&tampered).unwrap();
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    builder
        .append_dir_all(&info.hash, scratch.join(&info.hash))
        .unwrap();
    builder.into_inner().unwrap().finish().unwrap();

    let target = TestRepo::new();
    let err = target.repo.import(&tampered).unwrap_err();
    assert!(matches!(err, FluxError::CorruptArchive { .. }));
}

#[test]
fn test_import_missing_archive() {
    let fixture = TestRepo::new();
    let err = fixture
        .repo
        .import(&fixture.temp_dir.path().join("missing.tar.gz"))
        .unwrap_err();
    assert!(matches!(err, FluxError::Io(_)));
}

#[test]
fn test_import_and_tag_into_minimal_layout() {
    let source = TestRepo::new();
    let raw = source.write_csv("data.csv", SAMPLE_CSV);
    let info = source
        .repo
        .create(&raw, &json!({"pipeline": []}), CreateOptions::default())
        .unwrap();
    let archive = source
        .repo
        .export(&info.hash, &source.temp_dir.path().join("exports"))
        .unwrap();

    // A repository that only has the required layout: versions/ + refs.json
    let bare = source.temp_dir.path().join("bare");
    std::fs::create_dir_all(bare.join("versions")).unwrap();
    std::fs::write(bare.join("refs.json"), "{}").unwrap();

    let repo = Repository::open(&bare).unwrap().with_lock_config(fast_locks());
    let imported = repo.import(&archive).unwrap();
    assert_eq!(imported.hash, info.hash);

    repo.tag(&imported.hash, "prod").unwrap();
    assert_eq!(repo.resolve("prod").unwrap().hash, info.hash);
}

#[test]
fn test_import_into_reopened_repository() {
    let source = TestRepo::new();
    let raw = source.write_csv("data.csv", SAMPLE_CSV);
    let info = source
        .repo
        .create(&raw, &json!({"pipeline": []}), CreateOptions::default())
        .unwrap();
    let archive = source
        .repo
        .export(&info.hash, &source.temp_dir.path().join("exports"))
        .unwrap();

    // A freshly opened handle sees the same on-disk state
    let reopened = Repository::open(source.repo.root())
        .unwrap()
        .with_lock_config(fast_locks());
    let imported = reopened.import(&archive).unwrap();
    assert_eq!(imported.hash, info.hash);
}
