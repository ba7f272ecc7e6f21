//! Command implementations for flux CLI

use crate::cli::Commands;
use crate::output::{JsonFormatter, PrettyPrinter};
use flux_core::compare::compare;
use flux_core::error::{FluxError, Result};
use flux_core::repository::{CreateOptions, Repository};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Execute a command
pub fn execute_command(command: Commands, repo_path: Option<&Path>) -> Result<()> {
    match command {
        Commands::Init => init_command(repo_path),
        Commands::Create {
            input,
            config,
            tag,
            author,
            json,
        } => create_command(repo_path, &input, config.as_deref(), tag, author, json),
        Commands::List { json } => list_command(repo_path, json),
        Commands::Show { reference, json } => show_command(repo_path, &reference, json),
        Commands::Tag { reference, name } => tag_command(repo_path, &reference, &name),
        Commands::Tags { json } => tags_command(repo_path, json),
        Commands::Compare { left, right, json } => compare_command(repo_path, &left, &right, json),
        Commands::Export { reference, out } => export_command(repo_path, &reference, &out),
        Commands::Import { archive, json } => import_command(repo_path, &archive, json),
        Commands::Verify { reference } => verify_command(repo_path, &reference),
    }
}

/// Resolve the repository root: explicit flag, then $FLUX_REPO, then ./.flux
fn repo_root(repo_path: Option<&Path>) -> PathBuf {
    if let Some(path) = repo_path {
        return path.to_path_buf();
    }
    if let Ok(env_path) = std::env::var("FLUX_REPO") {
        return PathBuf::from(env_path);
    }
    PathBuf::from(".flux")
}

fn open_repository(repo_path: Option<&Path>) -> Result<Repository> {
    Repository::open(&repo_root(repo_path))
}

/// Initialize a flux repository
fn init_command(repo_path: Option<&Path>) -> Result<()> {
    let root = repo_root(repo_path);
    let repo = Repository::init(&root)?;
    println!("✅ Initialized flux repository at: {}", repo.root().display());
    Ok(())
}

/// Create a version from a raw CSV file and a config file
fn create_command(
    repo_path: Option<&Path>,
    input: &str,
    config_path: Option<&Path>,
    tag: Option<String>,
    author: Option<String>,
    json: bool,
) -> Result<()> {
    let repo = open_repository(repo_path)?;

    let config: Value = match config_path {
        Some(path) => {
            let contents = std::fs::read_to_string(path)?;
            serde_json::from_str(&contents)?
        }
        None => serde_json::json!({"pipeline": []}),
    };

    let info = repo.create(Path::new(input), &config, CreateOptions { tag, author })?;

    if json {
        println!("{}", JsonFormatter::format_version(&info)?);
    } else {
        println!("✅ Version {} stored", info.short_hash());
        PrettyPrinter::print_version(&info);
    }
    Ok(())
}

/// List all versions, oldest first
fn list_command(repo_path: Option<&Path>, json: bool) -> Result<()> {
    let repo = open_repository(repo_path)?;
    let versions = repo.list()?;

    if json {
        println!("{}", JsonFormatter::format_version_list(&versions)?);
    } else {
        PrettyPrinter::print_version_list(&versions);
    }
    Ok(())
}

/// Show one version
fn show_command(repo_path: Option<&Path>, reference: &str, json: bool) -> Result<()> {
    let repo = open_repository(repo_path)?;
    let info = repo.resolve(reference)?;

    if json {
        println!("{}", JsonFormatter::format_version(&info)?);
    } else {
        PrettyPrinter::print_version(&info);
    }
    Ok(())
}

/// Assign or move a tag
fn tag_command(repo_path: Option<&Path>, reference: &str, name: &str) -> Result<()> {
    let repo = open_repository(repo_path)?;
    let info = repo.resolve(reference)?;
    repo.tag(reference, name)?;
    println!("🏷️  Tag '{}' -> {}", name, info.short_hash());
    Ok(())
}

/// List all tags
fn tags_command(repo_path: Option<&Path>, json: bool) -> Result<()> {
    let repo = open_repository(repo_path)?;
    let tags = repo.tags()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tags)?);
    } else {
        PrettyPrinter::print_tags(&tags);
    }
    Ok(())
}

/// Compare two versions
fn compare_command(repo_path: Option<&Path>, left: &str, right: &str, json: bool) -> Result<()> {
    let repo = open_repository(repo_path)?;
    let report = compare(&repo, left, right)?;

    if json {
        println!("{}", JsonFormatter::format_comparison(&report)?);
    } else {
        println!("{report}");
    }
    Ok(())
}

/// Export a version archive
fn export_command(repo_path: Option<&Path>, reference: &str, out: &Path) -> Result<()> {
    let repo = open_repository(repo_path)?;
    let archive = repo.export(reference, out)?;
    println!("📦 Exported to {}", archive.display());
    Ok(())
}

/// Import a version archive
fn import_command(repo_path: Option<&Path>, archive: &Path, json: bool) -> Result<()> {
    let repo = open_repository(repo_path)?;
    let info = repo.import(archive)?;

    if json {
        println!("{}", JsonFormatter::format_version(&info)?);
    } else {
        println!("✅ Imported version {}", info.short_hash());
        PrettyPrinter::print_version(&info);
    }
    Ok(())
}

/// Verify a stored version's content hashes
fn verify_command(repo_path: Option<&Path>, reference: &str) -> Result<()> {
    let repo = open_repository(repo_path)?;
    match repo.verify(reference) {
        Ok(info) => {
            println!("✅ Version {} verified", info.short_hash());
            Ok(())
        }
        Err(e @ FluxError::Integrity { .. }) => {
            println!("❌ Verification failed");
            Err(e)
        }
        Err(e) => Err(e),
    }
}
