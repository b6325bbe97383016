use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, anyhow};
use clap::Parser;
use crossterm::style::Stylize;
use walkdir::WalkDir;

mod checks;
mod config;
mod error;
mod folder;
mod mp3;
mod naming;
mod tags;
mod track;

use config::{CheckSettings, Settings};
use tags::LoftyBackend;

/// Audit album folders for tag, filename, and folder-name consistency,
/// optionally repairing what can be repaired safely.
#[derive(Debug, Parser)]
#[command(name = "albumlint", version)]
struct Cli {
    /// Directory whose immediate subfolders are album folders.
    source: PathBuf,

    /// Move folders that pass every check under this directory.
    #[arg(long, value_name = "DIR")]
    move_to: Option<PathBuf>,

    /// Delete files outside the allowed-extension list.
    #[arg(long)]
    delete_disallowed_files: bool,

    /// Recover missing track numbers from leading filename digits.
    #[arg(long)]
    fix_track_numbers: bool,

    /// Fill in or correct track totals once the set is complete.
    #[arg(long)]
    fix_track_number_of: bool,

    /// Propagate an agreeing artist credit to ALBUMARTIST.
    #[arg(long)]
    fix_album_artist: bool,

    /// Fill in a missing year from a track or the folder name.
    #[arg(long)]
    fix_year: bool,

    /// Write the inferred disc number to every track.
    #[arg(long)]
    fix_disc_numbers: bool,

    /// Append the disc total to bare disc numbers.
    #[arg(long)]
    fix_disc_number_of: bool,

    /// Rename files to their canonical form.
    #[arg(long)]
    fix_filenames: bool,

    /// Rename folders to their canonical form.
    #[arg(long)]
    fix_foldernames: bool,

    /// Enable every fix at once.
    #[arg(long)]
    fix_all: bool,
}

impl Cli {
    /// Flags override whatever the config file and environment set.
    fn apply(&self, checks: &mut CheckSettings) {
        if let Some(dest) = &self.move_to {
            checks.move_to = Some(dest.clone());
        }
        checks.delete_disallowed_files |= self.delete_disallowed_files;
        checks.fix_track_numbers |= self.fix_track_numbers | self.fix_all;
        checks.fix_track_number_of |= self.fix_track_number_of | self.fix_all;
        checks.fix_album_artist |= self.fix_album_artist | self.fix_all;
        checks.fix_year |= self.fix_year | self.fix_all;
        checks.fix_disc_numbers |= self.fix_disc_numbers | self.fix_all;
        checks.fix_disc_number_of |= self.fix_disc_number_of | self.fix_all;
        checks.fix_filenames |= self.fix_filenames | self.fix_all;
        checks.fix_foldernames |= self.fix_foldernames | self.fix_all;
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut settings = Settings::load().context("failed to load configuration")?;
    cli.apply(&mut settings.checks);
    settings
        .validate()
        .map_err(|e| anyhow!("invalid configuration: {e}"))?;

    let folders: Vec<PathBuf> = WalkDir::new(&cli.source)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .map(|entry| entry.into_path())
        .collect();

    println!("Scanning {} subfolders...", folders.len());

    let backend = LoftyBackend;
    let mut failed = 0usize;
    let mut total_violations = 0usize;
    let mut last_failed = false;

    for path in &folders {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        // A fatal error (a tag write the container refused) aborts the
        // whole run rather than ploughing on with half-applied fixes.
        let folder = folder::process(path, &settings, &backend)
            .with_context(|| format!("while processing {}", path.display()))?;

        if folder.violations.is_empty() {
            println!("{} {}", "[PASS]".green(), name);
            last_failed = false;
        } else {
            if !last_failed {
                println!();
            }
            println!("{} {}", "[FAIL]".red(), name);
            for violation in &folder.violations {
                println!("    {}", violation.as_str().red());
            }
            println!();
            failed += 1;
            total_violations += folder.violations.len();
            last_failed = true;
        }
    }

    println!(
        "{} folders checked, {} failed, {} violations",
        folders.len(),
        failed,
        total_violations
    );

    Ok(if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
