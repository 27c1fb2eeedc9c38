//! Track Parser (C4): marker search, header/data pairing, and MFM sector
//! record extraction from a single track's decompressed bitstream.
//!
//! The Python original found sector markers with `re.split` and data markers
//! with `re.finditer` over an ASCII bit string. Here both searches are
//! `MarkerPattern::find_all_ends` over a packed `BitBuf`, and pairing walks
//! both offset lists with a single pair of indices instead of rebuilding a
//! list via repeated `.remove()`.

use byteorder::{BigEndian, ByteOrder};

use crate::bits::BitBuf;
use crate::error::TrackWarning;
use crate::format::{DiskFormat, LEGAL_OFFSET_LOWER, SECTOR_DATA_PLUS_CRC_BITS};

/// One decoded sector record as it comes off the wire, before CRC
/// verification (which [`crate::validator`] performs).
#[derive(Clone, Debug)]
pub struct SectorRecord {
    pub track_no: u8,
    pub side_no: u8,
    pub sector_no: u8,
    pub sector_length_code: u8,
    /// `A1 A1 A1 FE` followed by the 4 header field bytes: the exact span
    /// the header CRC is computed over.
    pub header_crc_span: Vec<u8>,
    pub header_crc: u16,
    /// `A1 A1 A1 FB`: the 4-byte prelude of the data field.
    pub data_meta_bytes: Vec<u8>,
    pub data_bytes: Vec<u8>,
    pub data_crc: u16,
}

impl SectorRecord {
    /// The byte span the data CRC is computed over: the `FB` prelude
    /// followed by the 512 data bytes.
    pub fn data_crc_input(&self) -> Vec<u8> {
        let mut span = self.data_meta_bytes.clone();
        span.extend_from_slice(&self.data_bytes);
        span
    }
}

const HEADER_PRELUDE_BITS: usize = 4 * 16;
const HEADER_FIELDS_BITS: usize = 4 * 16;
const HEADER_CRC_BITS: usize = 2 * 16;
const HEADER_RECORD_BITS: usize = HEADER_PRELUDE_BITS + HEADER_FIELDS_BITS + HEADER_CRC_BITS;
const DATA_PRELUDE_BITS: usize = 4 * 16;

/// Finds and decodes every sector record in `bitstream`, a decompressed
/// track already obtained for the correct physical head (side-swap applied
/// by the caller before fetching the bitstream). Alongside the records,
/// returns one [`TrackWarning::UnusualOffset`] per pairing whose
/// header-to-data distance falls outside `format.legal_offset_range()`; such
/// pairings are still extracted and returned as records.
pub fn parse_track(format: &DiskFormat, bitstream: &BitBuf) -> (Vec<SectorRecord>, Vec<TrackWarning>) {
    let header_ends = format.sector_start_pattern.find_all_ends(bitstream);
    if header_ends.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let min_data_end = header_ends[0] + LEGAL_OFFSET_LOWER;
    let data_ends: Vec<usize> = format
        .sector_data_start_pattern
        .find_all_ends(bitstream)
        .into_iter()
        .filter(|&end| end >= min_data_end)
        .collect();

    let legal_offset_range = format.legal_offset_range();
    let mut records = Vec::new();
    let mut warnings = Vec::new();
    let mut h = 0usize;
    let mut d = 0usize;
    while h < header_ends.len() && d < data_ends.len() {
        let header_end = header_ends[h];
        let data_end = data_ends[d];

        if data_end + SECTOR_DATA_PLUS_CRC_BITS > bitstream.len() {
            // The data field plus CRC would run off the end of the track;
            // this header can't be completed, try the next one against the
            // same data candidate.
            h += 1;
            continue;
        }

        let offset = data_end - header_end;
        if !legal_offset_range.contains(&offset) {
            warnings.push(TrackWarning::UnusualOffset {
                offset,
                lower: *legal_offset_range.start(),
                upper: *legal_offset_range.end(),
            });
        }

        if let Some(record) = extract_record(bitstream, header_end, data_end) {
            records.push(record);
        }
        h += 1;
        d += 1;
    }
    (records, warnings)
}

fn extract_record(bitstream: &BitBuf, header_end: usize, data_end: usize) -> Option<SectorRecord> {
    let header_window_start = header_end.checked_sub(HEADER_PRELUDE_BITS)?;
    let header_window = bitstream.slice(header_window_start, header_window_start + HEADER_RECORD_BITS);
    let header_decoded = header_window.mfm_decode_bytes();
    if header_decoded.len() < 10 {
        return None;
    }

    let header_crc_span = header_decoded[0..8].to_vec();
    let track_no = header_decoded[4];
    let side_no = header_decoded[5];
    let sector_no = header_decoded[6];
    let sector_length_code = header_decoded[7];
    let header_crc = BigEndian::read_u16(&header_decoded[8..10]);

    let data_meta_start = data_end.checked_sub(DATA_PRELUDE_BITS)?;
    let data_meta_bytes = bitstream.slice(data_meta_start, data_end).mfm_decode_bytes();

    let data_window = bitstream.slice(data_end, data_end + SECTOR_DATA_PLUS_CRC_BITS);
    let data_decoded = data_window.mfm_decode_bytes();
    if data_decoded.len() < 514 {
        return None;
    }
    let data_bytes = data_decoded[0..512].to_vec();
    let data_crc = BigEndian::read_u16(&data_decoded[512..514]);

    Some(SectorRecord {
        track_no,
        side_no,
        sector_no,
        sector_length_code,
        header_crc_span,
        header_crc,
        data_meta_bytes,
        data_bytes,
        data_crc,
    })
}
