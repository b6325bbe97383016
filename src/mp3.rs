//! MPEG frame-header sniffing.
//!
//! Classifies a file as constant- or variable-rate by scanning its raw
//! bytes for one of the three historical marker conventions (`Xing`,
//! `Info`, `VBRI`) and, inside the Xing layout, decoding the LAME encoder
//! extension. Sniffing is best-effort by design: LAME versions below 3.90
//! never wrote the extension, and broken or truncated headers exist in the
//! wild, so every decode failure degrades to the coarsest classification
//! that is still known to hold instead of surfacing an error.

use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Method {
    Cbr,
    Vbr,
    #[default]
    Unknown,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Cbr => write!(f, "CBR"),
            Method::Vbr => write!(f, "VBR"),
            Method::Unknown => write!(f, "unknown"),
        }
    }
}

/// Encoder metadata for one file, derived purely from its bytes (the
/// nominal bitrate is filled in by the caller from the audio properties).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodingInfo {
    pub method: Method,
    /// Nominal bitrate in kbps.
    pub bitrate: u32,
    pub xing_vbr_v: Option<i32>,
    pub xing_vbr_q: Option<i32>,
    pub lame_version: Option<String>,
    pub lame_tag_revision: Option<u8>,
    pub lame_vbr_method: Option<u8>,
    pub lame_nspsytune: Option<bool>,
    pub lame_nssafejoint: Option<bool>,
    pub lame_nogap_next: Option<bool>,
    pub lame_nogap_previous: Option<bool>,
}

/// Decode the embedded VBR/CBR signature block from raw file bytes.
///
/// Marker search is byte-aligned; the LAME extension fields are bit-packed
/// and read in strict order. A file with no marker at all defaults to CBR.
pub fn decode(data: &[u8]) -> EncodingInfo {
    let mut info = EncodingInfo::default();
    let mut reader = Reader::new(data);

    if reader.find(b"Xing") {
        info.method = Method::Vbr;
        if decode_xing(&mut reader, &mut info).is_none() {
            // Truncated past the marker: keep the tentative VBR
            // classification, drop any half-read LAME fields.
            clear_lame_fields(&mut info);
        }
        return info;
    }

    // The marker alone settles the classification; whatever follows it
    // is not consulted.
    if reader.find(b"Info") {
        info.method = Method::Cbr;
        return info;
    }

    if reader.find(b"VBRI") {
        info.method = Method::Vbr;
        return info;
    }

    info.method = Method::Cbr;
    info
}

fn decode_xing(reader: &mut Reader<'_>, info: &mut EncodingInfo) -> Option<()> {
    reader.skip_bytes(4)?;
    let flags = reader.read_u32()?;
    if flags & 1 != 0 {
        reader.skip_bytes(4)?; // frame count
    }
    if flags & 2 != 0 {
        reader.skip_bytes(4)?; // byte count
    }
    if flags & 4 != 0 {
        reader.skip_bytes(100)?; // seek table
    }
    if flags & 8 != 0 {
        // Widen before the split: a garbage quality word must yield a
        // garbage value, not an overflow.
        let quality = i64::from(reader.read_u32()?);
        info.xing_vbr_v = Some((10 - (quality + 9).div_euclid(10)) as i32);
        info.xing_vbr_q = Some((10 - quality % 10) as i32);
    }

    let tag = reader.read_bytes(9)?;
    if &tag[..4] == b"LAME" {
        if decode_lame(reader, tag, info).is_none() {
            clear_lame_fields(info);
        }
    }
    Some(())
}

/// The extension rides directly behind the 9-byte encoder tag: a 4-bit tag
/// revision, a 4-bit vbr method, 9 reserved/bitrate-range bytes, then four
/// 1-bit flags. The fields are bit-packed; reading them out of order would
/// corrupt everything downstream.
fn decode_lame(reader: &mut Reader<'_>, tag: &[u8], info: &mut EncodingInfo) -> Option<()> {
    let mut version = std::str::from_utf8(&tag[4..]).ok()?.trim().to_string();
    if version.ends_with('.') {
        version.pop();
    }
    info.lame_version = Some(version);
    info.lame_tag_revision = Some(reader.read_bits(4)? as u8);
    info.lame_vbr_method = Some(reader.read_bits(4)? as u8);
    reader.skip_bytes(9)?;
    info.lame_nspsytune = Some(reader.read_bit()?);
    info.lame_nssafejoint = Some(reader.read_bit()?);
    info.lame_nogap_next = Some(reader.read_bit()?);
    info.lame_nogap_previous = Some(reader.read_bit()?);
    Some(())
}

fn clear_lame_fields(info: &mut EncodingInfo) {
    info.lame_version = None;
    info.lame_tag_revision = None;
    info.lame_vbr_method = None;
    info.lame_nspsytune = None;
    info.lame_nssafejoint = None;
    info.lame_nogap_next = None;
    info.lame_nogap_previous = None;
}

/// Bit-level cursor over a byte buffer. All reads are bounds-checked and
/// return `None` past end-of-buffer, never panicking.
struct Reader<'a> {
    data: &'a [u8],
    bitpos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Reader { data, bitpos: 0 }
    }

    /// Byte-aligned search for a 4-byte marker anywhere in the buffer.
    /// Positions the cursor at the start of the match.
    fn find(&mut self, marker: &[u8; 4]) -> bool {
        match self.data.windows(4).position(|w| w == marker) {
            Some(index) => {
                self.bitpos = index * 8;
                true
            }
            None => false,
        }
    }

    fn read_bits(&mut self, count: usize) -> Option<u32> {
        let end = self.bitpos.checked_add(count)?;
        if end > self.data.len() * 8 {
            return None;
        }
        let mut value = 0u32;
        for _ in 0..count {
            let byte = self.data[self.bitpos / 8];
            let bit = (byte >> (7 - (self.bitpos % 8))) & 1;
            value = (value << 1) | u32::from(bit);
            self.bitpos += 1;
        }
        Some(value)
    }

    fn read_bit(&mut self) -> Option<bool> {
        self.read_bits(1).map(|b| b == 1)
    }

    fn read_u32(&mut self) -> Option<u32> {
        self.read_bits(32)
    }

    fn read_bytes(&mut self, count: usize) -> Option<&'a [u8]> {
        if self.bitpos % 8 != 0 {
            return None;
        }
        let start = self.bitpos / 8;
        let end = start.checked_add(count)?;
        if end > self.data.len() {
            return None;
        }
        self.bitpos = end * 8;
        Some(&self.data[start..end])
    }

    fn skip_bytes(&mut self, count: usize) -> Option<()> {
        let end = self.bitpos.checked_add(count * 8)?;
        if end > self.data.len() * 8 {
            return None;
        }
        self.bitpos = end;
        Some(())
    }
}
