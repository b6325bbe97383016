use std::path::PathBuf;

use serde::Deserialize;

/// Top-level application settings loaded from `config.toml`.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/albumlint/config.toml` or `~/.config/albumlint/config.toml`
///
/// Precedence (highest wins):
/// 1) Command-line flags
/// 2) Environment variables (prefix `ALBUMLINT__`, `__` as nested separator)
/// 3) Config file (if present)
/// 4) Struct defaults
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub checks: CheckSettings,
    pub scan: ScanSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            checks: CheckSettings::default(),
            scan: ScanSettings::default(),
        }
    }
}

/// Per-check fix switches. Every switch defaults to off: a bare run
/// reports violations and changes nothing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CheckSettings {
    /// Delete files outside the allowed-extension list instead of
    /// reporting them.
    pub delete_disallowed_files: bool,
    /// Recover missing track numbers from leading filename digits.
    pub fix_track_numbers: bool,
    /// Fill in or correct `N/total` track totals once the set is complete.
    pub fix_track_number_of: bool,
    /// Propagate an agreeing per-track artist credit to ALBUMARTIST.
    pub fix_album_artist: bool,
    /// Fill in a missing/conflicting year from a track or the folder name.
    pub fix_year: bool,
    /// Write the inferred disc number to every track.
    pub fix_disc_numbers: bool,
    /// Append the disc total to bare disc numbers.
    pub fix_disc_number_of: bool,
    /// Rename files to their canonical form.
    pub fix_filenames: bool,
    /// Rename the folder to its canonical form.
    pub fix_foldernames: bool,
    /// Move folders that pass every check under this directory.
    pub move_to: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// File extensions allowed inside an album folder (case-insensitive,
    /// without dot). Anything else is a disallowed file.
    pub allowed_extensions: Vec<String>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            allowed_extensions: vec![
                "mp3".into(),
                "flac".into(),
                "jpg".into(),
                "jpeg".into(),
                "png".into(),
                "log".into(),
            ],
        }
    }
}
