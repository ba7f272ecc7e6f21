//! Repository operations: version creation, resolution, tagging,
//! export and import
//!
//! A repository is a directory tree acting as a shared database:
//!
//! ```text
//! <root>/
//!   versions/<64-hex-hash>/
//!     raw.csv          original content, byte for byte
//!     processed.csv    output of the preprocessing pipeline
//!     config.json      canonicalized pipeline document
//!     metrics.json     version record (hashes, authorship, metrics)
//!   staging/           in-flight version builds, discarded on failure
//!   locks/             transient lock markers, not logical state
//!   refs.json          { "<tag>": "<hash>", ... }
//! ```
//!
//! All state is reached through an explicit [`Repository`] handle; every
//! operation reads fresh state from disk. Writers serialize through
//! per-version and refs locks; readers are lock-free and can never
//! observe a partially written version because versions become visible
//! only through an atomic rename out of `staging/`.

use crate::canonical;
use crate::config::Config;
use crate::data::Table;
use crate::error::{FluxError, Result};
use crate::hash;
use crate::lock::{FileLock, LockConfig};
use crate::metrics::compute_metrics;
use crate::model::{PipelineStep, VersionInfo, VersionRecord};
use crate::pipeline::{is_tokenizing, Preprocess, TextPipeline};
use chrono::Utc;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const RAW_FILE: &str = "raw.csv";
pub const PROCESSED_FILE: &str = "processed.csv";
pub const CONFIG_FILE: &str = "config.json";
pub const METRICS_FILE: &str = "metrics.json";
const REFS_FILE: &str = "refs.json";
const REFS_LOCK: &str = "refs";

/// Minimum hash prefix length accepted by [`Repository::resolve`].
const MIN_PREFIX_LEN: usize = 4;

/// Which stored artifact of a version to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Raw,
    Processed,
}

/// Optional knobs for [`Repository::create`].
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// Tag to assign to the created (or already existing) version.
    pub tag: Option<String>,
    /// Author recorded as `created_by`; defaults to the OS username.
    pub author: Option<String>,
}

/// Handle to an on-disk flux repository.
#[derive(Clone)]
pub struct Repository {
    root: PathBuf,
    lock_config: LockConfig,
    preprocessor: Arc<dyn Preprocess>,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository").field("root", &self.root).finish()
    }
}

impl Repository {
    /// Initialize a repository at `path`, reusing it if already present.
    pub fn init(path: &Path) -> Result<Repository> {
        if Self::is_repository(path) {
            log::info!("Repository already exists at {}, reusing", path.display());
            return Self::open(path);
        }
        fs::create_dir_all(path.join("versions"))?;
        fs::create_dir_all(path.join("locks"))?;
        fs::create_dir_all(path.join("staging"))?;
        let refs_path = path.join(REFS_FILE);
        if !refs_path.exists() {
            fs::write(&refs_path, "{}")?;
        }
        log::info!("Initialized flux repository at {}", path.display());
        Self::open(path)
    }

    /// Open an existing repository.
    pub fn open(path: &Path) -> Result<Repository> {
        if !Self::is_repository(path) {
            return Err(FluxError::RepositoryNotFound {
                path: path.to_path_buf(),
            });
        }
        let settings = Config::load(path)?;
        Ok(Repository {
            root: path.to_path_buf(),
            lock_config: settings.lock.to_lock_config(),
            preprocessor: Arc::new(TextPipeline),
        })
    }

    /// Replace the preprocessing implementation.
    pub fn with_preprocessor(mut self, preprocessor: Arc<dyn Preprocess>) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    /// Override lock tuning (mainly for tests).
    pub fn with_lock_config(mut self, lock_config: LockConfig) -> Self {
        self.lock_config = lock_config;
        self
    }

    fn is_repository(path: &Path) -> bool {
        path.join("versions").is_dir() && path.join(REFS_FILE).is_file()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn versions_dir(&self) -> PathBuf {
        self.root.join("versions")
    }

    fn locks_dir(&self) -> PathBuf {
        self.root.join("locks")
    }

    fn staging_dir(&self) -> PathBuf {
        self.root.join("staging")
    }

    fn version_dir(&self, hash: &str) -> PathBuf {
        self.versions_dir().join(hash)
    }

    // -----------------------------------------------------------------
    // Version creation
    // -----------------------------------------------------------------

    /// Create a version from a raw CSV file and a preprocessing config.
    ///
    /// Identical (raw bytes, canonical config) inputs always resolve to
    /// the same hash; when that version is already committed it is
    /// returned as-is and the preprocessing pipeline is not re-run.
    pub fn create(
        &self,
        raw_path: &Path,
        config: &Value,
        options: CreateOptions,
    ) -> Result<VersionInfo> {
        if !raw_path.exists() {
            return Err(FluxError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("raw data file not found: {}", raw_path.display()),
            )));
        }
        let pipeline = parse_pipeline(config)?;

        let raw_hash = hash::hash_file(raw_path)?;
        let config_hash = hash::hash_config(config)?;
        let version_hash = hash::hash_version(&raw_hash, &config_hash);

        // Idempotent short-circuit before taking the lock
        if self.version_dir(&version_hash).exists() {
            log::info!("Version {version_hash} already exists, returning existing");
            return self.finish_create(&version_hash, options.tag.as_deref());
        }

        let lock = FileLock::acquire(&self.locks_dir(), &version_hash, &self.lock_config)?;

        // Re-check under the lock: a concurrent writer may have won
        if self.version_dir(&version_hash).exists() {
            drop(lock);
            log::info!("Version {version_hash} created concurrently, returning existing");
            return self.finish_create(&version_hash, options.tag.as_deref());
        }

        let staging = self
            .staging_dir()
            .join(format!("{version_hash}.{}", std::process::id()));
        let result = self.build_version(
            raw_path,
            config,
            &pipeline,
            &raw_hash,
            &config_hash,
            &version_hash,
            options.author.as_deref(),
            &staging,
        );
        if result.is_err() {
            // No partial version may survive a failed create
            let _ = fs::remove_dir_all(&staging);
        }
        result?;
        drop(lock);

        log::info!("Created version {version_hash}");
        self.finish_create(&version_hash, options.tag.as_deref())
    }

    /// Write all four artifacts to `staging` and atomically commit.
    #[allow(clippy::too_many_arguments)]
    fn build_version(
        &self,
        raw_path: &Path,
        config: &Value,
        pipeline: &[PipelineStep],
        raw_hash: &str,
        config_hash: &str,
        version_hash: &str,
        author: Option<&str>,
        staging: &Path,
    ) -> Result<()> {
        fs::create_dir_all(staging)?;

        fs::copy(raw_path, staging.join(RAW_FILE))?;
        fs::write(staging.join(CONFIG_FILE), canonical::canonical_json(config))?;

        let table = Table::load_csv(raw_path)?;
        let processed = self.preprocessor.apply(table, pipeline)?;
        processed.save_csv(&staging.join(PROCESSED_FILE))?;

        let record = VersionRecord {
            version_hash: version_hash.to_string(),
            raw_hash: raw_hash.to_string(),
            config_hash: config_hash.to_string(),
            created_at: Utc::now(),
            created_by: Some(
                author
                    .map(str::to_string)
                    .unwrap_or_else(whoami::username),
            ),
            metrics: compute_metrics(&processed, is_tokenizing(pipeline)),
        };
        fs::write(
            staging.join(METRICS_FILE),
            serde_json::to_string_pretty(&record)?,
        )?;

        self.commit_staging(staging, version_hash)
    }

    /// Promote a fully built staging directory into `versions/`.
    fn commit_staging(&self, staging: &Path, version_hash: &str) -> Result<()> {
        let final_dir = self.version_dir(version_hash);
        match fs::rename(staging, &final_dir) {
            Ok(()) => Ok(()),
            Err(_) if final_dir.exists() => {
                // Lost a race (e.g. after a stale-lock reclaim); the
                // committed version is identical by construction.
                fs::remove_dir_all(staging)?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn finish_create(&self, version_hash: &str, tag: Option<&str>) -> Result<VersionInfo> {
        if let Some(tag) = tag {
            self.tag(version_hash, tag)?;
        }
        self.load_info(version_hash)
    }

    // -----------------------------------------------------------------
    // Resolution and listing
    // -----------------------------------------------------------------

    /// Resolve a full hash, unambiguous hash prefix, or tag name.
    pub fn resolve(&self, reference: &str) -> Result<VersionInfo> {
        let hash = self.resolve_hash(reference)?;
        self.load_info(&hash)
    }

    /// Resolve a reference to a full version hash without loading it.
    pub fn resolve_hash(&self, reference: &str) -> Result<String> {
        if hash::is_full_hash(reference) && self.version_dir(reference).exists() {
            return Ok(reference.to_string());
        }

        let refs = self.load_refs()?;
        if let Some(hash) = refs.get(reference) {
            return Ok(hash.clone());
        }

        if reference.len() >= MIN_PREFIX_LEN {
            let mut matches: Vec<String> = self
                .version_hashes()?
                .into_iter()
                .filter(|h| h.starts_with(reference))
                .collect();
            match matches.len() {
                0 => {}
                1 => return Ok(matches.swap_remove(0)),
                n => {
                    return Err(FluxError::AmbiguousReference {
                        prefix: reference.to_string(),
                        count: n,
                    })
                }
            }
        }

        Err(FluxError::not_found(reference))
    }

    /// All committed versions, ascending by creation time (ties broken
    /// by hash, so the order is total and stable).
    pub fn list(&self) -> Result<Vec<VersionInfo>> {
        let mut versions = Vec::new();
        for hash in self.version_hashes()? {
            versions.push(self.load_info(&hash)?);
        }
        versions.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.hash.cmp(&b.hash))
        });
        Ok(versions)
    }

    fn version_hashes(&self) -> Result<Vec<String>> {
        let mut hashes = Vec::new();
        for entry in fs::read_dir(self.versions_dir())? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if hash::is_full_hash(name) {
                    hashes.push(name.to_string());
                }
            }
        }
        hashes.sort();
        Ok(hashes)
    }

    /// Load the full [`VersionInfo`] for a committed version hash.
    fn load_info(&self, version_hash: &str) -> Result<VersionInfo> {
        let dir = self.version_dir(version_hash);
        if !dir.exists() {
            return Err(FluxError::not_found(version_hash));
        }
        let record: VersionRecord =
            serde_json::from_str(&fs::read_to_string(dir.join(METRICS_FILE))?)?;
        let config: Value = serde_json::from_str(&fs::read_to_string(dir.join(CONFIG_FILE))?)?;
        let pipeline = parse_pipeline(&config)?;

        let refs = self.load_refs()?;
        let tags: Vec<String> = refs
            .iter()
            .filter(|(_, h)| h.as_str() == version_hash)
            .map(|(t, _)| t.clone())
            .collect();

        Ok(VersionInfo {
            hash: version_hash.to_string(),
            raw_hash: record.raw_hash,
            config_hash: record.config_hash,
            created_at: record.created_at,
            created_by: record.created_by,
            pipeline,
            metrics: record.metrics,
            tags,
        })
    }

    /// Load a version's raw or processed table.
    pub fn load_table(&self, reference: &str, artifact: Artifact) -> Result<Table> {
        let hash = self.resolve_hash(reference)?;
        let file = match artifact {
            Artifact::Raw => RAW_FILE,
            Artifact::Processed => PROCESSED_FILE,
        };
        Table::load_csv(&self.version_dir(&hash).join(file))
    }

    // -----------------------------------------------------------------
    // Tags
    // -----------------------------------------------------------------

    /// Point `name` at the referenced version, replacing any previous
    /// target. The version's own content is untouched.
    pub fn tag(&self, reference: &str, name: &str) -> Result<()> {
        let hash = self.resolve_hash(reference)?;
        let _lock = FileLock::acquire(&self.locks_dir(), REFS_LOCK, &self.lock_config)?;
        let mut refs = self.load_refs()?;
        refs.insert(name.to_string(), hash.clone());
        self.write_refs(&refs)?;
        log::info!("Tagged version {hash} as '{name}'");
        Ok(())
    }

    /// Current tag -> hash mapping.
    pub fn tags(&self) -> Result<BTreeMap<String, String>> {
        self.load_refs()
    }

    fn load_refs(&self) -> Result<BTreeMap<String, String>> {
        let path = self.root.join(REFS_FILE);
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }

    /// Rewrite refs.json via temp file + rename so readers never see a
    /// torn write.
    fn write_refs(&self, refs: &BTreeMap<String, String>) -> Result<()> {
        let path = self.root.join(REFS_FILE);
        // staging/ is not part of the required layout, so make sure
        fs::create_dir_all(self.staging_dir())?;
        let tmp = self.staging_dir().join(format!("refs.{}", std::process::id()));
        fs::write(&tmp, serde_json::to_string_pretty(refs)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Export / import
    // -----------------------------------------------------------------

    /// Bundle a version's artifacts into `<target_dir>/<tag-or-hash>.tar.gz`.
    pub fn export(&self, reference: &str, target_dir: &Path) -> Result<PathBuf> {
        let hash = self.resolve_hash(reference)?;
        let refs = self.load_refs()?;
        // Deterministic naming: the tag if one was given, else the hash
        let stem = if refs.contains_key(reference) {
            reference
        } else {
            hash.as_str()
        };

        fs::create_dir_all(target_dir)?;
        let archive_path = target_dir.join(format!("{stem}.tar.gz"));
        let file = fs::File::create(&archive_path)?;
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        builder.append_dir_all(&hash, self.version_dir(&hash))?;
        builder.into_inner()?.finish()?;

        log::info!("Exported version {hash} to {}", archive_path.display());
        Ok(archive_path)
    }

    /// Import a version archive produced by [`Repository::export`].
    ///
    /// All hashes are recomputed from the unpacked raw data and config
    /// before the version is registered; any mismatch fails with
    /// [`FluxError::CorruptArchive`]. Importing an already-present
    /// version returns the existing info.
    pub fn import(&self, archive_path: &Path) -> Result<VersionInfo> {
        if !archive_path.exists() {
            return Err(FluxError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("archive not found: {}", archive_path.display()),
            )));
        }

        // Unpack inside staging/ so the final promotion is a same-device rename
        fs::create_dir_all(self.staging_dir())?;
        let unpack_dir = tempfile::tempdir_in(self.staging_dir())?;
        let file = fs::File::open(archive_path)?;
        let mut archive = tar::Archive::new(GzDecoder::new(file));
        // The tar crate refuses entries that would escape the
        // destination, which covers path traversal
        archive.unpack(unpack_dir.path())?;

        let mut extracted: Vec<PathBuf> = fs::read_dir(unpack_dir.path())?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        if extracted.len() != 1 {
            return Err(FluxError::corrupt_archive(
                archive_path,
                format!("expected exactly one version directory, found {}", extracted.len()),
            ));
        }
        let version_dir = extracted.remove(0);
        let claimed_hash = version_dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        if !hash::is_full_hash(&claimed_hash) {
            return Err(FluxError::corrupt_archive(
                archive_path,
                format!("invalid version hash in archive: '{claimed_hash}'"),
            ));
        }

        // Never trust the archive: recompute identity from its contents
        let verified = verify_version_dir(&version_dir)
            .map_err(|message| FluxError::corrupt_archive(archive_path, message))?;
        if verified != claimed_hash {
            return Err(FluxError::corrupt_archive(
                archive_path,
                format!("archive claims hash {claimed_hash} but contents hash to {verified}"),
            ));
        }

        let lock = FileLock::acquire(&self.locks_dir(), &claimed_hash, &self.lock_config)?;
        if !self.version_dir(&claimed_hash).exists() {
            self.commit_staging(&version_dir, &claimed_hash)?;
            log::info!("Imported version {claimed_hash} from {}", archive_path.display());
        } else {
            log::info!("Version {claimed_hash} already present, import is a no-op");
        }
        drop(lock);

        self.load_info(&claimed_hash)
    }

    /// Check a committed version's integrity: its artifacts must
    /// reproduce the hash it is stored under and the hashes recorded in
    /// its metrics document.
    pub fn verify(&self, reference: &str) -> Result<VersionInfo> {
        let hash = self.resolve_hash(reference)?;
        let dir = self.version_dir(&hash);
        let recomputed =
            verify_version_dir(&dir).map_err(|message| FluxError::integrity(&hash, message))?;
        if recomputed != hash {
            return Err(FluxError::integrity(
                &hash,
                format!("stored as {hash} but contents hash to {recomputed}"),
            ));
        }
        self.load_info(&hash)
    }
}

/// Recompute a version directory's identity from raw.csv + config.json
/// and cross-check the recorded hashes. Returns the recomputed version
/// hash, or a description of the first mismatch.
fn verify_version_dir(dir: &Path) -> std::result::Result<String, String> {
    let raw_hash = hash::hash_file(&dir.join(RAW_FILE))
        .map_err(|e| format!("cannot hash raw artifact: {e}"))?;
    let config: Value = fs::read_to_string(dir.join(CONFIG_FILE))
        .map_err(|e| format!("cannot read config artifact: {e}"))
        .and_then(|s| serde_json::from_str(&s).map_err(|e| format!("invalid config artifact: {e}")))?;
    let config_hash =
        hash::hash_config(&config).map_err(|e| format!("cannot hash config artifact: {e}"))?;
    let version_hash = hash::hash_version(&raw_hash, &config_hash);

    let record: VersionRecord = fs::read_to_string(dir.join(METRICS_FILE))
        .map_err(|e| format!("cannot read metrics artifact: {e}"))
        .and_then(|s| serde_json::from_str(&s).map_err(|e| format!("invalid metrics artifact: {e}")))?;
    if record.raw_hash != raw_hash {
        return Err(format!(
            "recorded raw hash {} does not match recomputed {raw_hash}",
            record.raw_hash
        ));
    }
    if record.config_hash != config_hash {
        return Err(format!(
            "recorded config hash {} does not match recomputed {config_hash}",
            record.config_hash
        ));
    }
    if record.version_hash != version_hash {
        return Err(format!(
            "recorded version hash {} does not match recomputed {version_hash}",
            record.version_hash
        ));
    }
    if !dir.join(PROCESSED_FILE).exists() {
        return Err("processed artifact is missing".to_string());
    }
    Ok(version_hash)
}

/// Parse and validate the `pipeline` section of a config document.
pub fn parse_pipeline(config: &Value) -> Result<Vec<PipelineStep>> {
    let pipeline = config
        .get("pipeline")
        .ok_or_else(|| FluxError::config("config must contain a 'pipeline' key"))?;
    let steps: Vec<PipelineStep> = serde_json::from_value(pipeline.clone())
        .map_err(|e| FluxError::config(format!("invalid pipeline: {e}")))?;
    for (i, step) in steps.iter().enumerate() {
        if step.step.is_empty() {
            return Err(FluxError::config(format!("step {i} is missing its name")));
        }
    }
    Ok(steps)
}
