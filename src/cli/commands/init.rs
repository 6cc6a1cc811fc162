//! Init command implementation.

use std::fs;

use anyhow::{Context as _, Result, bail};

use crate::cli::{Cli, InitArgs};
use crate::config::{CONFIG_FILE, Config, DB_FILE, WORKSPACE_DIR};
use crate::format;
use crate::storage::SqliteStore;

const GITIGNORE: &str = r"# Database
*.db
*.db-shm
*.db-wal

# Exports
*-export-*.csv
";

/// Execute the init command.
///
/// Creates the workspace directory, the database (schema applied on open),
/// the default display formats, a config template and a `.gitignore`.
///
/// # Errors
///
/// Returns an error if the workspace already exists (without `--force`) or
/// any file cannot be written.
pub fn execute(cli: &Cli, args: &InitArgs) -> Result<()> {
    let workspace = match &cli.dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?.join(WORKSPACE_DIR),
    };
    let db_path = workspace.join(DB_FILE);

    if db_path.exists() && !args.force {
        bail!(
            "Workspace already initialized at {} (use --force to re-seed)",
            workspace.display()
        );
    }
    fs::create_dir_all(&workspace).with_context(|| format!("creating {}", workspace.display()))?;

    let store = SqliteStore::open(&db_path)?;
    let seeded = store.seed_default_formats()?;

    let project = cli.project.clone().unwrap_or_else(|| Config::default().project);
    let config_path = workspace.join(CONFIG_FILE);
    if !config_path.exists() {
        fs::write(&config_path, Config::template(&project))
            .with_context(|| format!("writing {}", config_path.display()))?;
    }

    let gitignore_path = workspace.join(".gitignore");
    if !gitignore_path.exists() {
        fs::write(&gitignore_path, GITIGNORE)?;
    }

    tracing::info!(workspace = %workspace.display(), seeded, "Initialized workspace");
    let workspace = dunce::simplified(&workspace).to_path_buf();
    if cli.json {
        format::print_json(&serde_json::json!({
            "workspace": workspace.display().to_string(),
            "project": project,
            "formatsSeeded": seeded,
        }))?;
    } else if !cli.quiet {
        println!("Initialized qatrack workspace in {}", workspace.display());
    }
    Ok(())
}
