//! Tag vocabulary, normalization, and the tag-container seam.
//!
//! Tracks carry a flat map from a fixed tag vocabulary to ordered string
//! values. Artist credits are legitimately multi-valued; every other key
//! is single-valued and gets collapsed by an explicit normalization pass
//! when a file is opened. The container itself (lofty) sits behind the
//! `TagBackend` trait so the consistency engine can be exercised against
//! an in-memory implementation.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use lofty::config::WriteOptions;
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::{ItemValue, Tag, TagItem};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TagKey {
    Title,
    Artist,
    Album,
    AlbumArtist,
    Date,
    TrackNumber,
    DiscNumber,
}

impl TagKey {
    pub const ALL: [TagKey; 7] = [
        TagKey::Title,
        TagKey::Artist,
        TagKey::Album,
        TagKey::AlbumArtist,
        TagKey::Date,
        TagKey::TrackNumber,
        TagKey::DiscNumber,
    ];

    /// Artist credits hold several ordered values; everything else is
    /// single-valued.
    pub fn is_multi_valued(self) -> bool {
        matches!(self, TagKey::Artist | TagKey::AlbumArtist)
    }

    pub fn name(self) -> &'static str {
        match self {
            TagKey::Title => "TITLE",
            TagKey::Artist => "ARTIST",
            TagKey::Album => "ALBUM",
            TagKey::AlbumArtist => "ALBUMARTIST",
            TagKey::Date => "DATE",
            TagKey::TrackNumber => "TRACKNUMBER",
            TagKey::DiscNumber => "DISCNUMBER",
        }
    }
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub type TagMap = BTreeMap<TagKey, Vec<String>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AudioProps {
    /// Nominal bitrate in kbps as reported by the container.
    pub bitrate_kbps: u32,
}

/// The external tag container and file-system collaborators, reduced to
/// the operations the engine needs.
pub trait TagBackend {
    fn read(&self, path: &Path) -> Result<(TagMap, AudioProps)>;
    fn write(&self, path: &Path, tags: &TagMap) -> Result<()>;

    /// Rename a file or folder. Callers must have flushed and released
    /// every handle on the old path first.
    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        fs::rename(from, to)?;
        Ok(())
    }
}

/// Collapse runs of whitespace and trim.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize a freshly read tag map in place.
///
/// Policy per key: empty values are dropped; DATE keeps its smallest
/// value; other single-valued keys collapse identical duplicates silently
/// and conflicting duplicates to the first value with a note. Returns
/// whether anything changed (the caller must flush if so) and the notes.
pub fn normalize(tags: &mut TagMap) -> (bool, Vec<String>) {
    let mut changed = false;
    let mut notes = Vec::new();

    for key in TagKey::ALL {
        let Some(values) = tags.get(&key) else { continue };
        let mut cleaned: Vec<String> = values
            .iter()
            .map(|v| clean_text(v))
            .filter(|v| !v.is_empty())
            .collect();

        if cleaned.len() > 1 && !key.is_multi_valued() {
            if key == TagKey::Date {
                cleaned.sort();
            } else if !cleaned.iter().all(|v| *v == cleaned[0]) {
                notes.push(format!("conflicting {key} values: {}", cleaned.join(" | ")));
            }
            cleaned.truncate(1);
        }

        if cleaned != *values {
            changed = true;
            if cleaned.is_empty() {
                tags.remove(&key);
            } else {
                tags.insert(key, cleaned);
            }
        }
    }

    (changed, notes)
}

/// Production backend over the lofty tag container.
pub struct LoftyBackend;

/// Main item key plus the companion total key for `N/total` fields.
fn item_keys(key: TagKey) -> (ItemKey, Option<ItemKey>) {
    match key {
        TagKey::Title => (ItemKey::TrackTitle, None),
        TagKey::Artist => (ItemKey::TrackArtist, None),
        TagKey::Album => (ItemKey::AlbumTitle, None),
        TagKey::AlbumArtist => (ItemKey::AlbumArtist, None),
        TagKey::Date => (ItemKey::RecordingDate, None),
        TagKey::TrackNumber => (ItemKey::TrackNumber, Some(ItemKey::TrackTotal)),
        TagKey::DiscNumber => (ItemKey::DiscNumber, Some(ItemKey::DiscTotal)),
    }
}

impl TagBackend for LoftyBackend {
    fn read(&self, path: &Path) -> Result<(TagMap, AudioProps)> {
        let tagged = Probe::open(path)
            .and_then(|probe| probe.read())
            .map_err(|e| Error::TagRead {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let props = AudioProps {
            bitrate_kbps: tagged.properties().audio_bitrate().unwrap_or(0),
        };

        let mut map = TagMap::new();
        if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
            for key in TagKey::ALL {
                let (main, total) = item_keys(key);
                let mut values: Vec<String> =
                    tag.get_strings(&main).map(str::to_string).collect();
                // Containers split "N/total" into two items; recombine.
                if let Some(total_key) = total {
                    if let (Some(first), Some(t)) =
                        (values.first_mut(), tag.get_string(&total_key))
                    {
                        first.push('/');
                        first.push_str(t);
                    }
                }
                if !values.is_empty() {
                    map.insert(key, values);
                }
            }
        }

        Ok((map, props))
    }

    fn write(&self, path: &Path, tags: &TagMap) -> Result<()> {
        let write_err = |reason: String| Error::TagWrite {
            path: path.to_path_buf(),
            reason,
        };

        let tagged = Probe::open(path)
            .and_then(|probe| probe.read())
            .map_err(|e| write_err(e.to_string()))?;

        let mut tag = tagged
            .primary_tag()
            .or_else(|| tagged.first_tag())
            .cloned()
            .unwrap_or_else(|| Tag::new(tagged.primary_tag_type()));

        for key in TagKey::ALL {
            let (main, total) = item_keys(key);
            tag.remove_key(&main);
            if let Some(total_key) = &total {
                tag.remove_key(total_key);
            }

            let Some(values) = tags.get(&key) else { continue };
            if let Some(total_key) = total {
                // Single "N/total" value split back into the two items.
                let Some(value) = values.first() else { continue };
                let mut parts = value.splitn(2, '/');
                if let Some(number) = parts.next() {
                    tag.insert_text(main, number.to_string());
                }
                if let Some(t) = parts.next() {
                    tag.insert_text(total_key, t.to_string());
                }
            } else {
                for value in values {
                    tag.push(TagItem::new(main.clone(), ItemValue::Text(value.clone())));
                }
            }
        }

        tag.save_to_path(path, WriteOptions::default())
            .map_err(|e| write_err(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(TagKey, &[&str])]) -> TagMap {
        entries
            .iter()
            .map(|(k, vs)| (*k, vs.iter().map(|v| v.to_string()).collect()))
            .collect()
    }

    #[test]
    fn clean_text_trims_and_collapses_whitespace() {
        assert_eq!(clean_text("  a   b  "), "a b");
        assert_eq!(clean_text("plain"), "plain");
        assert_eq!(clean_text("   "), "");
    }

    #[test]
    fn normalize_drops_empty_values() {
        let mut tags = map(&[(TagKey::Artist, &["", "Someone", "  "])]);
        let (changed, notes) = normalize(&mut tags);
        assert!(changed);
        assert!(notes.is_empty());
        assert_eq!(tags[&TagKey::Artist], vec!["Someone".to_string()]);
    }

    #[test]
    fn normalize_keeps_multi_valued_artist_credits() {
        let mut tags = map(&[(TagKey::Artist, &["A", "B"])]);
        let (changed, notes) = normalize(&mut tags);
        assert!(!changed);
        assert!(notes.is_empty());
        assert_eq!(tags[&TagKey::Artist].len(), 2);
    }

    #[test]
    fn normalize_date_keeps_earliest() {
        let mut tags = map(&[(TagKey::Date, &["2011", "2009-05-01"])]);
        let (changed, notes) = normalize(&mut tags);
        assert!(changed);
        assert!(notes.is_empty());
        assert_eq!(tags[&TagKey::Date], vec!["2009-05-01".to_string()]);
    }

    #[test]
    fn normalize_collapses_identical_duplicates_silently() {
        let mut tags = map(&[(TagKey::Album, &["Same", "Same"])]);
        let (changed, notes) = normalize(&mut tags);
        assert!(changed);
        assert!(notes.is_empty());
        assert_eq!(tags[&TagKey::Album], vec!["Same".to_string()]);
    }

    #[test]
    fn normalize_reports_conflicting_single_valued_tags() {
        let mut tags = map(&[(TagKey::Title, &["One", "Two"])]);
        let (changed, notes) = normalize(&mut tags);
        assert!(changed);
        assert_eq!(notes.len(), 1);
        assert!(notes[0].contains("TITLE"));
        assert_eq!(tags[&TagKey::Title], vec!["One".to_string()]);
    }

    #[test]
    fn normalize_removes_keys_left_without_values() {
        let mut tags = map(&[(TagKey::Album, &["", " "])]);
        let (changed, _) = normalize(&mut tags);
        assert!(changed);
        assert!(!tags.contains_key(&TagKey::Album));
    }
}
