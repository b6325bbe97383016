//! The per-folder consistency battery.
//!
//! Checks run in a fixed order because later ones read what earlier ones
//! wrote: disc numbers before track numbers (track totals are scoped per
//! disc), field checks before filename checks, filenames before bitrate
//! aggregation, and folder naming last, only on a pass with zero
//! violations. Each check is independently gated by its fix flag: off
//! means report-only, on means repair and flush before the next check.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::config::CheckSettings;
use crate::error::Result;
use crate::naming;
use crate::tags::{TagBackend, TagKey};
use crate::track::{self, Track};

pub struct Checker<'a> {
    folder: PathBuf,
    settings: &'a CheckSettings,
    backend: &'a dyn TagBackend,
    /// A disc subfolder of a multi-disc album cannot know the disc total
    /// locally, so the disc number-of check is skipped there.
    subfolder_mode: bool,
    violations: &'a mut Vec<String>,
    years_ok: bool,
}

impl<'a> Checker<'a> {
    pub fn new(
        folder: &Path,
        settings: &'a CheckSettings,
        backend: &'a dyn TagBackend,
        subfolder_mode: bool,
        violations: &'a mut Vec<String>,
    ) -> Self {
        Checker {
            folder: folder.to_path_buf(),
            settings,
            backend,
            subfolder_mode,
            violations,
            years_ok: false,
        }
    }

    /// Run the whole battery. Returns the folder's path afterwards, which
    /// differs from the input when the folder-name fix renamed it.
    pub fn run(mut self, tracks: &mut Vec<Track>) -> Result<PathBuf> {
        if tracks.is_empty() {
            return Ok(self.folder);
        }

        let disc_numbers = self.check_disc_numbers(tracks)?;
        if !self.subfolder_mode {
            self.check_disc_number_of(tracks, &disc_numbers)?;
        }
        self.check_album_titles(tracks);
        self.check_track_titles(tracks);
        self.check_artists(tracks);
        self.check_album_artists(tracks)?;
        self.check_years(tracks)?;

        let (all_present, track_numbers) = self.check_track_numbers(tracks)?;
        self.check_track_number_of(tracks, all_present, &track_numbers)?;
        self.check_filenames(tracks)?;

        let descriptor = naming::overall_descriptor(tracks.iter().map(|t| &t.encoding))
            .unwrap_or_default();
        self.check_folder_name(tracks, &descriptor)
    }

    /// Every track needs a positive disc number. When the folder as a
    /// whole is inconsistent, a candidate is inferred: the single distinct
    /// value present, a `disc N`/`cd N` hint in the folder name, or 1.
    fn check_disc_numbers(&mut self, tracks: &mut Vec<Track>) -> Result<Vec<u32>> {
        let mut ok = true;
        let mut numbers: Vec<u32> = Vec::new();
        for track in tracks.iter() {
            match track.get(TagKey::DiscNumber).and_then(number_prefix) {
                Some(n) if n > 0 => numbers.push(n),
                _ => ok = false,
            }
        }
        numbers.sort_unstable();
        numbers.dedup();

        if ok {
            return Ok(numbers);
        }

        let candidate = if numbers.len() == 1 {
            numbers[0]
        } else {
            disc_from_folder_name(&folder_basename(&self.folder)).unwrap_or(1)
        };

        if self.settings.fix_disc_numbers {
            for track in tracks.iter_mut() {
                track.set(TagKey::DiscNumber, vec![candidate.to_string()]);
                track.flush(self.backend)?;
            }
            numbers = vec![candidate];
        } else {
            self.violations.push(format!(
                "Directory has missing disc numbers (should be {candidate})"
            ));
        }
        Ok(numbers)
    }

    fn check_disc_number_of(
        &mut self,
        tracks: &mut Vec<Track>,
        disc_numbers: &[u32],
    ) -> Result<()> {
        for i in 0..tracks.len() {
            let Some(value) = tracks[i].get(TagKey::DiscNumber).map(str::to_string) else {
                continue;
            };
            if value.contains('/') {
                continue;
            }
            match disc_numbers.last() {
                Some(total) => {
                    if self.settings.fix_disc_number_of {
                        tracks[i].set(TagKey::DiscNumber, vec![format!("{value}/{total}")]);
                        tracks[i].flush(self.backend)?;
                    } else {
                        self.violations.push(format!(
                            "{}: disc number-of missing, should be {}",
                            tracks[i].filename(),
                            total
                        ));
                    }
                }
                None => self.violations.push(format!(
                    "{}: disc number-of missing",
                    tracks[i].filename()
                )),
            }
        }
        Ok(())
    }

    /// ALBUM must be present and identical across the folder. There is no
    /// safe inference for a differing album title, so no fix exists.
    fn check_album_titles(&mut self, tracks: &[Track]) {
        let mut ok = true;
        let mut last: Option<&str> = None;
        for track in tracks {
            match track.get(TagKey::Album) {
                None => ok = false,
                Some(album) => match last {
                    None => last = Some(album),
                    Some(previous) if previous != album => ok = false,
                    _ => {}
                },
            }
        }
        if !ok {
            self.violations
                .push("Folder has missing/non-matching album titles".to_string());
        }
    }

    fn check_track_titles(&mut self, tracks: &[Track]) {
        for track in tracks {
            if track.get(TagKey::Title).is_none() {
                self.violations
                    .push(format!("{}: Track title missing", track.filename()));
            }
        }
    }

    fn check_artists(&mut self, tracks: &[Track]) {
        for track in tracks {
            if track.get(TagKey::Artist).is_none() {
                self.violations
                    .push(format!("{}: Track artist missing", track.filename()));
            }
        }
    }

    /// ALBUMARTIST must be present and identical (full multi-valued
    /// compare). The fix only applies on a true single-artist album: every
    /// track's ARTIST credit agrees and is non-empty, in which case it is
    /// propagated.
    fn check_album_artists(&mut self, tracks: &mut Vec<Track>) -> Result<()> {
        let mut ok = true;
        {
            let mut last: Option<&[String]> = None;
            for track in tracks.iter() {
                let credit = track.get_all(TagKey::AlbumArtist);
                if credit.is_empty() {
                    ok = false;
                    continue;
                }
                match last {
                    None => last = Some(credit),
                    Some(previous) if previous != credit => ok = false,
                    _ => {}
                }
            }
        }
        if ok {
            return Ok(());
        }

        let common: Option<Vec<String>> = {
            let credits: Vec<&[String]> =
                tracks.iter().map(|t| t.get_all(TagKey::Artist)).collect();
            let agree = !credits.is_empty()
                && credits.iter().all(|c| *c == credits[0])
                && credits[0].first().is_some_and(|v| !v.is_empty());
            agree.then(|| credits[0].to_vec())
        };

        match common {
            Some(credit) if self.settings.fix_album_artist => {
                for track in tracks.iter_mut() {
                    track.set(TagKey::AlbumArtist, credit.clone());
                    track.flush(self.backend)?;
                }
            }
            _ => self
                .violations
                .push("Folder has missing/non-matching album artist tags".to_string()),
        }
        Ok(())
    }

    /// DATE's leading year segment must be present and identical. The fix
    /// prefers a year found on any track, then one in the folder name.
    fn check_years(&mut self, tracks: &mut Vec<Track>) -> Result<()> {
        let mut ok = true;
        let mut last: Option<String> = None;
        let mut any: Option<String> = None;
        for track in tracks.iter() {
            match track.get(TagKey::Date).map(year_of) {
                None => ok = false,
                Some(year) => {
                    any = Some(year.clone());
                    match &last {
                        None => last = Some(year),
                        Some(previous) if *previous != year => ok = false,
                        _ => {}
                    }
                }
            }
        }
        if ok {
            self.years_ok = true;
            return Ok(());
        }

        let candidate = any.or_else(|| year_from_folder_name(&folder_basename(&self.folder)));
        match candidate {
            Some(year) if self.settings.fix_year => {
                for track in tracks.iter_mut() {
                    track.set(TagKey::Date, vec![year.clone()]);
                    track.flush(self.backend)?;
                }
                self.years_ok = true;
            }
            _ => self
                .violations
                .push("Folder has missing/non-matching year tags".to_string()),
        }
        Ok(())
    }

    /// Per disc, the folder needs a full run of track numbers starting at
    /// 1 with no gaps. A missing number may be recovered from leading
    /// digits in the filename; a non-integer value never is.
    fn check_track_numbers(
        &mut self,
        tracks: &mut Vec<Track>,
    ) -> Result<(bool, BTreeMap<u32, Vec<u32>>)> {
        let mut by_disc: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
        let mut every_track_numbered = true;

        for i in 0..tracks.len() {
            let disc = tracks[i]
                .get(TagKey::DiscNumber)
                .and_then(number_prefix)
                .unwrap_or(1);
            by_disc.entry(disc).or_default();

            let mut current: Option<u32> = None;
            if let Some(raw) = tracks[i].get(TagKey::TrackNumber) {
                let prefix = raw.split('/').next().unwrap_or("").trim();
                match prefix.parse::<i64>() {
                    // out-of-range counts as missing, like non-positive
                    Ok(n) if n > 0 => current = u32::try_from(n).ok(),
                    Ok(_) => {}
                    Err(_) => {
                        self.violations.push(format!(
                            "Invalid track number, examine manually: {}",
                            tracks[i].filename()
                        ));
                        every_track_numbered = false;
                        continue;
                    }
                }
            }

            if current.is_none() && self.settings.fix_track_numbers {
                if let Some(n) = leading_track_number(&tracks[i].filename()) {
                    tracks[i].set(TagKey::TrackNumber, vec![n.to_string()]);
                    tracks[i].flush(self.backend)?;
                    current = Some(n);
                }
            }

            match current {
                Some(n) => by_disc.entry(disc).or_default().push(n),
                None => {
                    self.violations
                        .push(format!("{}: track number missing", tracks[i].filename()));
                    every_track_numbered = false;
                }
            }
        }

        // A track without a usable number poisons completeness even when
        // the numbers that are present happen to be consecutive.
        let mut all_present = every_track_numbered && !by_disc.is_empty();
        for numbers in by_disc.values_mut() {
            numbers.sort_unstable();
            if numbers.first() != Some(&1) || numbers.windows(2).any(|w| w[1] != w[0] + 1) {
                all_present = false;
            }
        }

        if !all_present {
            let listing: String = by_disc
                .iter()
                .map(|(disc, numbers)| {
                    let joined = numbers
                        .iter()
                        .map(u32::to_string)
                        .collect::<Vec<_>>()
                        .join(",");
                    format!(" Disc {disc}: {joined}")
                })
                .collect();
            self.violations.push(format!(
                "Directory does not have a full set of tracks:{listing}"
            ));
        }

        Ok((all_present, by_disc))
    }

    /// Only meaningful once the track set is known complete; the expected
    /// total is the highest number on the track's own disc.
    fn check_track_number_of(
        &mut self,
        tracks: &mut Vec<Track>,
        all_present: bool,
        track_numbers: &BTreeMap<u32, Vec<u32>>,
    ) -> Result<()> {
        if !all_present {
            return Ok(());
        }
        for i in 0..tracks.len() {
            let Some(raw) = tracks[i].get(TagKey::TrackNumber).map(str::to_string) else {
                continue;
            };
            let disc = tracks[i]
                .get(TagKey::DiscNumber)
                .and_then(number_prefix)
                .unwrap_or(1);
            let Some(total) = track_numbers.get(&disc).and_then(|n| n.last()).copied() else {
                continue;
            };

            let mut parts = raw.splitn(2, '/');
            let number = parts.next().unwrap_or("").to_string();
            match parts.next() {
                None => {
                    if self.settings.fix_track_number_of {
                        tracks[i].set(TagKey::TrackNumber, vec![format!("{number}/{total}")]);
                        tracks[i].flush(self.backend)?;
                    } else {
                        self.violations.push(format!(
                            "{}: track number-of missing, should be {}",
                            tracks[i].filename(),
                            total
                        ));
                    }
                }
                Some(existing) if existing.trim().parse::<u32>().ok() != Some(total) => {
                    if self.settings.fix_track_number_of {
                        tracks[i].set(TagKey::TrackNumber, vec![format!("{number}/{total}")]);
                        tracks[i].flush(self.backend)?;
                    } else {
                        self.violations.push(format!(
                            "{}: track number-of incorrect: {} should be {}",
                            tracks[i].filename(),
                            existing,
                            total
                        ));
                    }
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Canonical filename checks. A track missing any of its core tags
    /// makes the whole check impossible: the collection is re-sorted and
    /// the remaining per-track checks are skipped.
    fn check_filenames(&mut self, tracks: &mut Vec<Track>) -> Result<()> {
        let multi_disc = folder_has_multiple_discs(tracks);

        for i in 0..tracks.len() {
            let unvalidatable = tracks[i].get(TagKey::TrackNumber).is_none()
                || tracks[i].get(TagKey::Title).is_none()
                || tracks[i].get(TagKey::Artist).is_none();
            if unvalidatable {
                self.violations.push(format!(
                    "Impossible to validate filename {}",
                    tracks[i].filename()
                ));
                tracks.sort_by(track::by_filename);
                return Ok(());
            }

            let disc_prefix = if multi_disc {
                tracks[i]
                    .get(TagKey::DiscNumber)
                    .and_then(|v| v.split('/').next())
                    .unwrap_or("")
                    .to_string()
            } else {
                String::new()
            };
            let number = tracks[i]
                .get(TagKey::TrackNumber)
                .and_then(|v| v.split('/').next())
                .unwrap_or("")
                .to_string();
            let title = tracks[i].get(TagKey::Title).unwrap_or("").to_string();
            let correct = naming::canonical_filename(&disc_prefix, &number, &title);

            if tracks[i].filename() == correct {
                continue;
            }
            if self.settings.fix_filenames {
                let new_path = naming::clamp_path(tracks[i].path.with_file_name(&correct));
                if new_path.exists() {
                    self.violations
                        .push(format!("Duplicate filename: {correct}"));
                    continue;
                }
                tracks[i].rename_to(&new_path, self.backend)?;
            } else {
                self.violations.push(format!(
                    "Invalid filename {}, should be {}",
                    tracks[i].filename(),
                    correct
                ));
            }
        }
        Ok(())
    }

    /// Must come last: it consumes values every earlier check may have
    /// repaired, and is only meaningful on an otherwise clean pass.
    fn check_folder_name(
        mut self,
        tracks: &mut Vec<Track>,
        descriptor: &str,
    ) -> Result<PathBuf> {
        if !self.violations.is_empty() {
            self.violations
                .push("Folder name validation impossible".to_string());
            return Ok(self.folder);
        }

        // A clean pass guarantees these tags exist on every track.
        let album_artist = naming::flatten_credit(tracks[0].get_all(TagKey::AlbumArtist));
        let album = tracks[0].get(TagKey::Album).unwrap_or_default().to_string();
        let year = if self.years_ok {
            tracks[0].get(TagKey::Date).map(year_of)
        } else {
            None
        };

        let artists: BTreeSet<&str> = tracks
            .iter()
            .filter_map(|t| t.get(TagKey::Artist))
            .collect();
        let compilation = artists.len() > 4 || self.folder.join(".mix").exists();

        let correct = naming::canonical_folder_name(&naming::FolderName {
            album_artist: &album_artist,
            album: &album,
            year: year.as_deref(),
            descriptor,
            compilation,
        });

        let current = folder_basename(&self.folder);
        if current == correct {
            return Ok(self.folder);
        }

        let parent = self
            .folder
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let correct_path = parent.join(&correct);

        if !self.settings.fix_foldernames {
            self.violations
                .push(format!("Folder name should be {correct}, not {current}"));
            return Ok(self.folder);
        }

        for track in tracks.iter_mut() {
            track.flush(self.backend)?;
        }
        // A pure case change is legal on case-insensitive filesystems even
        // though the destination "exists" there.
        let case_change_only = current.to_lowercase() == correct.to_lowercase();
        if correct_path.exists() && !case_change_only {
            self.violations.push(format!(
                "Destination folder {} already exists",
                correct_path.display()
            ));
            return Ok(self.folder);
        }

        self.backend.rename(&self.folder, &correct_path)?;
        for track in tracks.iter_mut() {
            track.path = correct_path.join(track.filename());
        }
        Ok(correct_path)
    }
}

fn folder_basename(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string()
}

/// Numeric prefix of an `N` or `N/total` value.
fn number_prefix(value: &str) -> Option<u32> {
    value.split('/').next()?.trim().parse().ok()
}

fn year_of(date: &str) -> String {
    date.split('-').next().unwrap_or("").to_string()
}

/// `disc N` / `cd N` hint in a folder name, optionally unspaced. The
/// earliest hit of either word wins.
fn disc_from_folder_name(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    let mut earliest: Option<(usize, u32)> = None;
    for word in ["disc", "cd"] {
        let mut offset = 0;
        while let Some(found) = lower[offset..].find(word) {
            let at = offset + found;
            let tail = &lower[at + word.len()..];
            let tail = tail.strip_prefix(' ').unwrap_or(tail);
            if let Some(digit) = tail.chars().next().and_then(|c| c.to_digit(10)) {
                if earliest.is_none_or(|(best, _)| at < best) {
                    earliest = Some((at, digit));
                }
                break;
            }
            offset = at + word.len();
        }
    }
    earliest.map(|(_, digit)| digit)
}

/// A 4-digit year bracketed by separators, e.g. `(1999)` or `- 1999 -`.
fn year_from_folder_name(name: &str) -> Option<String> {
    const LEADING: &str = "^$(-[ ";
    const TRAILING: &str = ")^$-] ";
    let chars: Vec<char> = name.chars().collect();
    for i in 0..chars.len() {
        if !LEADING.contains(chars[i]) {
            continue;
        }
        if i + 5 >= chars.len() {
            break;
        }
        let digits = &chars[i + 1..i + 5];
        if digits.iter().all(char::is_ascii_digit) && TRAILING.contains(chars[i + 5]) {
            return Some(digits.iter().collect());
        }
    }
    None
}

/// Up to two digits followed by a separator somewhere in the filename,
/// e.g. `07 - Title.mp3` or `3_title.mp3`.
fn leading_track_number(filename: &str) -> Option<u32> {
    let bytes = filename.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i < bytes.len() && matches!(bytes[i], b' ' | b'-' | b'_' | b'.') {
            let digits = &filename[start.max(i.saturating_sub(2))..i];
            return digits.parse().ok();
        }
    }
    None
}

/// More than one distinct disc number, or any disc total above one.
fn folder_has_multiple_discs(tracks: &[Track]) -> bool {
    let mut distinct = BTreeSet::new();
    for track in tracks {
        let Some(value) = track.get(TagKey::DiscNumber) else {
            continue;
        };
        let mut parts = value.splitn(2, '/');
        if let Some(n) = parts.next().and_then(|p| p.trim().parse::<u32>().ok()) {
            distinct.insert(n);
        }
        if let Some(total) = parts.next().and_then(|p| p.trim().parse::<u32>().ok()) {
            if total > 1 {
                return true;
            }
        }
    }
    distinct.len() > 1
}
