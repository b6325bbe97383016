//! One audio file: its path, tag map, and decoded encoding info.

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::mp3::{self, EncodingInfo};
use crate::tags::{self, TagBackend, TagKey, TagMap};

pub struct Track {
    pub path: PathBuf,
    pub tags: TagMap,
    pub encoding: EncodingInfo,
    dirty: bool,
}

impl Track {
    /// Open one file: read and normalize its tags, then sniff the frame
    /// header from the raw bytes. Returns the track plus any notes the
    /// normalization pass produced.
    pub fn open(path: &Path, backend: &dyn TagBackend) -> Result<(Track, Vec<String>)> {
        let (mut tag_map, props) = backend.read(path)?;
        let (changed, notes) = tags::normalize(&mut tag_map);

        let bytes = fs::read(path)?;
        let mut encoding = mp3::decode(&bytes);
        encoding.bitrate = props.bitrate_kbps;

        let mut track = Track {
            path: path.to_path_buf(),
            tags: tag_map,
            encoding,
            dirty: changed,
        };
        track.flush(backend)?;
        Ok((track, notes))
    }

    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string()
    }

    /// First value of a tag, if any.
    pub fn get(&self, key: TagKey) -> Option<&str> {
        self.tags
            .get(&key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Every value of a tag (empty slice when unset).
    pub fn get_all(&self, key: TagKey) -> &[String] {
        self.tags.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn set(&mut self, key: TagKey, values: Vec<String>) {
        self.tags.insert(key, values);
        self.dirty = true;
    }

    /// Persist pending tag edits. Later checks read totals written by
    /// earlier ones, so every fixing check flushes before the next runs.
    pub fn flush(&mut self, backend: &dyn TagBackend) -> Result<()> {
        if self.dirty {
            backend.write(&self.path, &self.tags)?;
            self.dirty = false;
        }
        Ok(())
    }

    /// Flush, release the container, rename the file on disk, and reopen
    /// at the new path. The container must not be held across the rename.
    pub fn rename_to(&mut self, new_path: &Path, backend: &dyn TagBackend) -> Result<()> {
        self.flush(backend)?;
        backend.rename(&self.path, new_path)?;
        let (fresh, _) = Track::open(new_path, backend)?;
        *self = fresh;
        Ok(())
    }
}

/// Filename ordering, applied at the point of use rather than as an
/// intrinsic property of the type.
pub fn by_filename(a: &Track, b: &Track) -> Ordering {
    a.filename().cmp(&b.filename())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::TagMap;

    fn dummy(path: &str) -> Track {
        Track {
            path: PathBuf::from(path),
            tags: TagMap::new(),
            encoding: EncodingInfo::default(),
            dirty: false,
        }
    }

    #[test]
    fn by_filename_orders_on_the_final_component() {
        let mut tracks = vec![dummy("/x/02 - b.mp3"), dummy("/a/01 - a.mp3")];
        tracks.sort_by(by_filename);
        assert_eq!(tracks[0].filename(), "01 - a.mp3");
    }

    #[test]
    fn get_returns_first_value_only() {
        let mut track = dummy("/x/a.mp3");
        track.set(TagKey::Artist, vec!["A".into(), "B".into()]);
        assert_eq!(track.get(TagKey::Artist), Some("A"));
        assert_eq!(track.get_all(TagKey::Artist).len(), 2);
        assert_eq!(track.get(TagKey::Album), None);
        assert!(track.get_all(TagKey::Album).is_empty());
    }
}
