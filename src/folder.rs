//! One album folder end to end: list it, open its tracks, run the
//! consistency battery, and relocate it when it comes out clean.

use std::fs;
use std::path::{Path, PathBuf};

use crate::checks::Checker;
use crate::config::{CheckSettings, Settings};
use crate::error::Result;
use crate::tags::TagBackend;
use crate::track::{self, Track};

pub struct Folder {
    pub path: PathBuf,
    pub tracks: Vec<Track>,
    pub violations: Vec<String>,
}

impl Folder {
    /// List one folder non-recursively and open every track in it.
    ///
    /// Listing is strictly ordered so repeated runs report identically:
    /// the no-tracks violation first, then the subfolder one, then
    /// disallowed files, then per-track normalization notes.
    pub fn open(path: &Path, settings: &Settings, backend: &dyn TagBackend) -> Result<Folder> {
        let mut entries: Vec<fs::DirEntry> = fs::read_dir(path)?.collect::<std::io::Result<_>>()?;
        entries.sort_by_key(|e| e.file_name());

        let allowed = &settings.scan.allowed_extensions;
        let mut saw_subfolder = false;
        let mut disallowed: Vec<String> = Vec::new();
        let mut notes: Vec<String> = Vec::new();
        let mut tracks: Vec<Track> = Vec::new();

        for entry in entries {
            let entry_path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();

            if entry.file_type()?.is_dir() {
                saw_subfolder = true;
                continue;
            }
            // compilation marker, never a violation
            if name == ".mix" {
                continue;
            }

            let extension = entry_path
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_lowercase);
            let extension = match extension {
                Some(ext) if allowed.iter().any(|a| *a == ext) => ext,
                _ => {
                    if settings.checks.delete_disallowed_files {
                        fs::remove_file(&entry_path)?;
                    } else {
                        disallowed.push(format!("Disallowed file: {name}"));
                    }
                    continue;
                }
            };
            if extension != "mp3" {
                continue;
            }
            // decoder stubs and placeholders, not audio
            if entry.metadata()?.len() == 0 {
                continue;
            }

            match Track::open(&entry_path, backend) {
                Ok((track, track_notes)) => {
                    notes.extend(track_notes.into_iter().map(|n| format!("{name}: {n}")));
                    tracks.push(track);
                }
                Err(e) if !e.is_fatal() => notes.push(format!("{name}: {e}")),
                Err(e) => return Err(e),
            }
        }

        tracks.sort_by(track::by_filename);

        let mut violations = Vec::new();
        if tracks.is_empty() {
            violations.push("Folder contains no tracks".to_string());
        }
        if saw_subfolder {
            violations.push("Subfolder present".to_string());
        }
        violations.extend(disallowed);
        violations.extend(notes);

        Ok(Folder {
            path: path.to_path_buf(),
            tracks,
            violations,
        })
    }

    /// Run the consistency battery. The folder's path may change when the
    /// folder-name fix renames it.
    pub fn validate(
        &mut self,
        settings: &CheckSettings,
        backend: &dyn TagBackend,
        subfolder_mode: bool,
    ) -> Result<()> {
        let checker = Checker::new(
            &self.path,
            settings,
            backend,
            subfolder_mode,
            &mut self.violations,
        );
        self.path = checker.run(&mut self.tracks)?;
        Ok(())
    }

    /// Move a fully clean folder under `dest_root`, keeping its name.
    /// Returns whether it moved; a folder with violations never does.
    pub fn relocate(&mut self, dest_root: &Path, backend: &dyn TagBackend) -> Result<bool> {
        if !self.violations.is_empty() {
            return Ok(false);
        }
        let Some(name) = self.path.file_name() else {
            return Ok(false);
        };
        let dest = dest_root.join(name);
        if dest.exists() {
            self.violations
                .push(format!("Destination folder {} already exists", dest.display()));
            return Ok(false);
        }

        for track in &mut self.tracks {
            track.flush(backend)?;
        }
        backend.rename(&self.path, &dest)?;
        for track in &mut self.tracks {
            track.path = dest.join(track.filename());
        }
        self.path = dest;
        Ok(true)
    }
}

/// Open, validate, and (when configured) relocate one folder.
pub fn process(path: &Path, settings: &Settings, backend: &dyn TagBackend) -> Result<Folder> {
    let mut folder = Folder::open(path, settings, backend)?;
    folder.validate(&settings.checks, backend, false)?;
    if let Some(dest_root) = &settings.checks.move_to {
        folder.relocate(dest_root, backend)?;
    }
    Ok(folder)
}
