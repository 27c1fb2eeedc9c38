//! Imager (C7): orchestrates every (track, head) read through the
//! [`TrackValidator`] and assembles the final sector image.
//!
//! Mirrors the teacher's `read_tracks_to_diskimage` progress reporting via
//! plain `println!` per track; the caller (the `cli` crate) owns writing the
//! resulting bytes to disk and printing checksums.

use crate::error::{CoreResult, TrackWarning};
use crate::format::DiskFormat;
use crate::source::TrackSource;
use crate::validator::TrackValidator;

/// One entry in [`ImageResult::track_warnings`]: which (track, head) a
/// warning was collected for.
#[derive(Debug)]
pub struct TrackWarningEntry {
    pub track: u8,
    pub head: u8,
    pub warning: TrackWarning,
}

/// The completed image plus every non-fatal warning collected while
/// building it, so the caller can print a summary without the `core` crate
/// doing any I/O of its own.
pub struct ImageResult {
    pub bytes: Vec<u8>,
    pub warnings: Vec<TrackWarningEntry>,
}

/// Reads every track and head of `format` from `source`, reporting progress
/// on stdout as it goes. Fails fast on the first fatal [`CoreError`]; sector-
/// level problems are collected as warnings instead (unless `stop_on_error`
/// was set on `validator`, which turns them into that same fatal error).
pub fn image_disk(
    format: &DiskFormat,
    source: &mut dyn TrackSource,
    validator: &TrackValidator,
) -> CoreResult<ImageResult> {
    let mut bytes = Vec::with_capacity(format.image_len());
    let mut warnings = Vec::new();

    for track in 0..format.track_count {
        for head in 0..format.head_count {
            let outcome = validator.read_track(format, source, track, head)?;
            println!(
                "Reading track: {:2}, head: {}. Payload bytes: {}/{}",
                track,
                head,
                outcome.payload.len(),
                format.track_payload_len()
            );
            for warning in outcome.warnings {
                warnings.push(TrackWarningEntry { track, head, warning });
            }
            bytes.extend(outcome.payload);
        }
    }

    Ok(ImageResult { bytes, warnings })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::BitBuf;

    /// Always returns an empty bitstream, so every track is filled with
    /// zeros; exercises the full track/head iteration and warning plumbing
    /// without needing realistic sector data.
    struct EmptySource;

    impl TrackSource for EmptySource {
        fn decompressed_bitstream(&mut self, _track: u8, _head: u8) -> CoreResult<BitBuf> {
            Ok(BitBuf::new())
        }
    }

    #[test]
    fn image_has_exact_expected_size_and_one_warning_per_track_head() {
        let format = DiskFormat::ibm_dos();
        let validator = TrackValidator::new(1, false);
        let mut source = EmptySource;

        let result = image_disk(&format, &mut source, &validator).unwrap();
        assert_eq!(result.bytes.len(), format.image_len());
        assert_eq!(
            result.warnings.len(),
            format.track_count as usize * format.head_count as usize
        );
        assert!(result
            .warnings
            .iter()
            .all(|entry| matches!(entry.warning, TrackWarning::FilledEmpty)));
    }
}
