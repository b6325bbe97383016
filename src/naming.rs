//! Canonical file and folder name synthesis.

use std::path::PathBuf;

use crate::mp3::{EncodingInfo, Method};

/// Replace characters that NTFS/FAT forbid in names.
pub fn substitute_illegal_chars(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '\\' | '/' | '?' | '|' => out.push('_'),
            ':' => out.push('：'),
            '*' => {}
            '"' => out.push('\''),
            '<' => out.push('['),
            '>' => out.push(']'),
            _ => out.push(c),
        }
    }
    out
}

/// Apply the substitution table on filesystems that need it; a no-op
/// elsewhere.
pub fn sanitize(name: &str) -> String {
    if cfg!(target_os = "windows") {
        substitute_illegal_chars(name)
    } else {
        name.to_string()
    }
}

/// `[disc]NN - Title.mp3`. The disc prefix is empty on single-disc
/// folders; the track number keeps its tag spelling, zero-padded to two.
pub fn canonical_filename(disc: &str, track_number: &str, title: &str) -> String {
    sanitize(&format!("{disc}{track_number:0>2} - {title}.mp3"))
}

pub struct FolderName<'a> {
    pub album_artist: &'a str,
    pub album: &'a str,
    /// Only present when the year check passed.
    pub year: Option<&'a str>,
    pub descriptor: &'a str,
    pub compilation: bool,
}

/// Canonical folder name. A pure function of its inputs: identical inputs
/// always yield the identical string.
pub fn canonical_folder_name(parts: &FolderName<'_>) -> String {
    let year_segment = match parts.year {
        Some(year) => format!(" - {year}"),
        None => String::new(),
    };
    let name = if parts.compilation {
        format!(
            "VA - {}{} - {} [{}]",
            parts.album, year_segment, parts.album_artist, parts.descriptor
        )
    } else {
        format!(
            "{}{} - {} [{}]",
            parts.album_artist, year_segment, parts.album, parts.descriptor
        )
    };
    sanitize(&name)
}

/// Join a multi-valued artist credit: `A`, `A & B`, `A, B & C`.
pub fn flatten_credit(values: &[String]) -> String {
    match values {
        [] => String::new(),
        [one] => one.clone(),
        [head @ .., last] => format!("{} & {}", head.join(", "), last),
    }
}

/// Derive the folder-wide bitrate descriptor from every track's encoding
/// info. Disagreement between any two tracks yields `mixed`; plain VBR
/// and ABR folders get the integer-truncated average appended.
pub fn overall_descriptor<'a, I>(encodings: I) -> Option<String>
where
    I: IntoIterator<Item = &'a EncodingInfo>,
{
    let mut overall: Option<String> = None;
    let mut rate_sum: u64 = 0;
    let mut count: u64 = 0;

    for enc in encodings {
        count += 1;
        let descriptor = track_descriptor(enc, &mut rate_sum);
        match &overall {
            None => overall = Some(descriptor),
            Some(current) if *current != descriptor => return Some("mixed".to_string()),
            _ => {}
        }
    }

    if matches!(overall.as_deref(), Some("VBR") | Some("ABR")) && count > 0 {
        overall = Some(format!("VBR{}", rate_sum / count));
    }
    overall
}

fn track_descriptor(enc: &EncodingInfo, rate_sum: &mut u64) -> String {
    if enc.lame_version.is_some() {
        match enc.lame_vbr_method.unwrap_or(0) {
            1 | 8 => format!("CBR{}", enc.bitrate),
            3 => match enc.xing_vbr_v {
                Some(0) => "APE".to_string(),
                Some(1) => "APM".to_string(),
                Some(2) => "APS".to_string(),
                other => format!("vbr-old V{}", other.unwrap_or(-1)),
            },
            4 | 5 => format!("V{}", enc.xing_vbr_v.unwrap_or(-1)),
            2 | 9 => {
                *rate_sum += u64::from(enc.bitrate);
                "ABR".to_string()
            }
            method => format!("lame_vbr_method {method}"),
        }
    } else if enc.method == Method::Vbr {
        *rate_sum += u64::from(enc.bitrate);
        "VBR".to_string()
    } else {
        format!("CBR{}", enc.bitrate)
    }
}

/// Trim an over-long destination path to the legacy Windows limit,
/// preserving the extension. A no-op elsewhere.
pub fn clamp_path(path: PathBuf) -> PathBuf {
    if !cfg!(target_os = "windows") {
        return path;
    }
    match path.to_str() {
        Some(s) if s.chars().count() > 260 => PathBuf::from(truncate_keeping_extension(s, 259)),
        _ => path,
    }
}

fn truncate_keeping_extension(path: &str, max: usize) -> String {
    let (stem, ext) = match path.rfind('.') {
        Some(dot) => path.split_at(dot),
        None => (path, ""),
    };
    let keep = max.saturating_sub(ext.chars().count());
    let mut out: String = stem.chars().take(keep).collect();
    out.push_str(ext);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitution_table_matches_target_filesystem_rules() {
        assert_eq!(
            substitute_illegal_chars(r#"a\b/c:d*e?f"g<h>i|j"#),
            "a_b_c：de_f'g[h]i_j"
        );
        assert_eq!(substitute_illegal_chars("untouched name"), "untouched name");
    }

    #[test]
    fn canonical_filename_pads_and_prefixes() {
        assert_eq!(canonical_filename("", "3", "Song"), "03 - Song.mp3");
        assert_eq!(canonical_filename("", "12", "Song"), "12 - Song.mp3");
        assert_eq!(canonical_filename("2", "3", "Song"), "203 - Song.mp3");
    }

    #[test]
    fn folder_name_standard_and_compilation_variants() {
        let standard = canonical_folder_name(&FolderName {
            album_artist: "Artist",
            album: "Album",
            year: Some("2010"),
            descriptor: "CBR320",
            compilation: false,
        });
        assert_eq!(standard, "Artist - 2010 - Album [CBR320]");

        let va = canonical_folder_name(&FolderName {
            album_artist: "Artist",
            album: "Album",
            year: Some("2010"),
            descriptor: "CBR320",
            compilation: true,
        });
        assert_eq!(va, "VA - Album - 2010 - Artist [CBR320]");
    }

    #[test]
    fn folder_name_omits_year_segment_when_unknown() {
        let name = canonical_folder_name(&FolderName {
            album_artist: "Artist",
            album: "Album",
            year: None,
            descriptor: "V0",
            compilation: false,
        });
        assert_eq!(name, "Artist - Album [V0]");
    }

    #[test]
    fn folder_name_is_byte_stable_across_calls() {
        let parts = FolderName {
            album_artist: "Someone",
            album: "Something",
            year: Some("1999"),
            descriptor: "V2",
            compilation: false,
        };
        assert_eq!(canonical_folder_name(&parts), canonical_folder_name(&parts));
    }

    #[test]
    fn flatten_credit_joins_like_a_liner_note() {
        let strings = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(flatten_credit(&strings(&["A"])), "A");
        assert_eq!(flatten_credit(&strings(&["A", "B"])), "A & B");
        assert_eq!(flatten_credit(&strings(&["A", "B", "C"])), "A, B & C");
        assert_eq!(flatten_credit(&[]), "");
    }

    fn lame(method: u8, v: i32, bitrate: u32) -> EncodingInfo {
        EncodingInfo {
            method: Method::Vbr,
            bitrate,
            xing_vbr_v: Some(v),
            lame_version: Some("3.100".to_string()),
            lame_vbr_method: Some(method),
            ..EncodingInfo::default()
        }
    }

    fn plain(method: Method, bitrate: u32) -> EncodingInfo {
        EncodingInfo {
            method,
            bitrate,
            ..EncodingInfo::default()
        }
    }

    #[test]
    fn descriptor_table_per_lame_method() {
        let one = |e: &EncodingInfo| overall_descriptor(std::iter::once(e)).unwrap();
        assert_eq!(one(&lame(1, 0, 320)), "CBR320");
        assert_eq!(one(&lame(8, 0, 256)), "CBR256");
        assert_eq!(one(&lame(3, 0, 200)), "APE");
        assert_eq!(one(&lame(3, 1, 200)), "APM");
        assert_eq!(one(&lame(3, 2, 200)), "APS");
        assert_eq!(one(&lame(3, 7, 200)), "vbr-old V7");
        assert_eq!(one(&lame(4, 2, 190)), "V2");
        assert_eq!(one(&lame(5, 0, 245)), "V0");
        assert_eq!(one(&lame(6, 0, 245)), "lame_vbr_method 6");
    }

    #[test]
    fn abr_and_plain_vbr_average_their_bitrates() {
        let tracks = [lame(2, 0, 200), lame(2, 0, 250)];
        assert_eq!(overall_descriptor(tracks.iter()).as_deref(), Some("VBR225"));

        let tracks = [plain(Method::Vbr, 180), plain(Method::Vbr, 181)];
        // integer truncation
        assert_eq!(overall_descriptor(tracks.iter()).as_deref(), Some("VBR180"));
    }

    #[test]
    fn disagreeing_tracks_yield_mixed() {
        let tracks = [plain(Method::Cbr, 320), lame(4, 2, 190)];
        assert_eq!(overall_descriptor(tracks.iter()).as_deref(), Some("mixed"));

        let tracks = [plain(Method::Cbr, 320), plain(Method::Cbr, 192)];
        assert_eq!(overall_descriptor(tracks.iter()).as_deref(), Some("mixed"));
    }

    #[test]
    fn cbr_folders_share_one_descriptor() {
        let tracks = [plain(Method::Cbr, 320), plain(Method::Cbr, 320)];
        assert_eq!(overall_descriptor(tracks.iter()).as_deref(), Some("CBR320"));
        assert_eq!(overall_descriptor(std::iter::empty::<&EncodingInfo>()), None);
    }

    #[test]
    fn truncation_keeps_the_extension() {
        let long = format!("{}.mp3", "a".repeat(300));
        let cut = truncate_keeping_extension(&long, 259);
        assert_eq!(cut.chars().count(), 259);
        assert!(cut.ends_with(".mp3"));
    }
}
