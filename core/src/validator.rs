//! Track Validator (C6): per-track retry loop that turns parsed
//! [`SectorRecord`]s into a byte-exact track payload, deduplicating by
//! sector number and promoting configured warning classes to fatal errors.

use std::collections::HashMap;

use crate::crc::crc16_ccitt_false;
use crate::error::{CoreError, CoreResult, TrackWarning};
use crate::format::DiskFormat;
use crate::parser::{parse_track, SectorRecord};
use crate::source::TrackSource;

/// Result of validating one (track, head): the assembled payload plus every
/// non-fatal warning collected along the way.
pub struct TrackReadOutcome {
    pub payload: Vec<u8>,
    pub warnings: Vec<TrackWarning>,
    pub attempts_used: u32,
}

pub struct TrackValidator {
    max_retries: u32,
    stop_on_error: bool,
}

impl TrackValidator {
    pub fn new(max_retries: u32, stop_on_error: bool) -> Self {
        TrackValidator {
            max_retries: max_retries.max(1),
            stop_on_error,
        }
    }

    /// Reads and validates the track at logical `(track, head)`, retrying up
    /// to `max_retries` times as long as fewer than
    /// `expected_sectors_per_track` sectors have been accepted.
    pub fn read_track(
        &self,
        format: &DiskFormat,
        source: &mut dyn TrackSource,
        track: u8,
        head: u8,
    ) -> CoreResult<TrackReadOutcome> {
        // Logical head 0 maps to the physical side opposite the disk's own
        // head-0 convention unless the format says sides are already swapped.
        let physical_head = if format.swap_sides { head } else { 1 - head };

        let mut accepted: HashMap<u8, Vec<u8>> = HashMap::new();
        let mut warnings = Vec::new();
        let mut attempt = 1u32;

        loop {
            let bitstream = source.decompressed_bitstream(track, physical_head)?;
            let (records, offset_warnings) = parse_track(format, &bitstream);
            warnings.extend(offset_warnings);
            let last_chance = attempt == self.max_retries;

            for record in records {
                self.check_position(&record, track, head, format, &mut warnings)?;

                if !accepted.contains_key(&record.sector_no) {
                    let header_ok = crc16_ccitt_false(&record.header_crc_span) == record.header_crc
                        && record.sector_length_code == 2;
                    let data_ok = crc16_ccitt_false(&record.data_crc_input()) == record.data_crc;

                    if header_ok && data_ok {
                        accepted.insert(record.sector_no, record.data_bytes);
                    } else if last_chance {
                        warnings.push(TrackWarning::CrcMismatch {
                            sector_no: record.sector_no,
                            header_ok,
                            data_ok,
                        });
                        accepted.insert(record.sector_no, record.data_bytes);
                    }
                }
            }

            if accepted.len() == format.expected_sectors_per_track as usize || last_chance {
                break;
            }
            attempt += 1;
        }

        let payload = self.assemble_payload(format, &accepted, &mut warnings);
        Ok(TrackReadOutcome {
            payload,
            warnings,
            attempts_used: attempt,
        })
    }

    fn check_position(
        &self,
        record: &SectorRecord,
        track: u8,
        head: u8,
        format: &DiskFormat,
        warnings: &mut Vec<TrackWarning>,
    ) -> CoreResult<()> {
        if record.track_no != track {
            self.report(
                warnings,
                TrackWarning::WrongTrack {
                    expected: track,
                    found: record.track_no,
                },
            )?;
        }
        if record.side_no != head {
            self.report(
                warnings,
                TrackWarning::WrongSide {
                    expected: head,
                    found: record.side_no,
                },
            )?;
        }
        if record.sector_no < 1 || record.sector_no > format.expected_sectors_per_track {
            self.report(
                warnings,
                TrackWarning::SectorOutOfRange {
                    sector_no: record.sector_no,
                    max: format.expected_sectors_per_track,
                },
            )?;
        }
        Ok(())
    }

    fn report(&self, warnings: &mut Vec<TrackWarning>, warning: TrackWarning) -> CoreResult<()> {
        if self.stop_on_error {
            return Err(CoreError::SectorInconsistency(warning));
        }
        warnings.push(warning);
        Ok(())
    }

    /// Builds the final `expected_sectors_per_track * sector_size` payload.
    /// Sectors that were never recovered are zero-filled so the track
    /// payload's byte length is always exact, even when only some sectors
    /// were found.
    fn assemble_payload(
        &self,
        format: &DiskFormat,
        accepted: &HashMap<u8, Vec<u8>>,
        warnings: &mut Vec<TrackWarning>,
    ) -> Vec<u8> {
        let expected = format.expected_sectors_per_track as usize;

        if accepted.is_empty() {
            warnings.push(TrackWarning::FilledEmpty);
            return vec![0u8; format.track_payload_len()];
        }

        if accepted.len() < expected {
            warnings.push(TrackWarning::Partial {
                found: accepted.len(),
                expected,
            });
        }

        let mut payload = Vec::with_capacity(format.track_payload_len());
        for sector_no in 1..=format.expected_sectors_per_track {
            match accepted.get(&sector_no) {
                Some(data) => payload.extend_from_slice(data),
                None => payload.extend(std::iter::repeat(0u8).take(format.sector_size)),
            }
        }
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::BitBuf;
    use crate::format::DiskFormat;

    fn mfm_encode_byte(byte: u8, last_bit: &mut bool) -> Vec<bool> {
        let mut out = Vec::with_capacity(16);
        for i in (0..8).rev() {
            let data_bit = (byte >> i) & 1 != 0;
            let clock_bit = !*last_bit && !data_bit;
            out.push(clock_bit);
            out.push(data_bit);
            *last_bit = data_bit;
        }
        out
    }

    fn mfm_encode_bytes(bytes: &[u8]) -> BitBuf {
        let mut buf = BitBuf::new();
        let mut last_bit = false;
        for &b in bytes {
            for bit in mfm_encode_byte(b, &mut last_bit) {
                buf.push(bit);
            }
        }
        buf
    }

    fn synthetic_sector(track: u8, side: u8, sector: u8, data: &[u8; 512], corrupt_crc: bool) -> Vec<u8> {
        let mut header_field_bytes = vec![track, side, sector, 2];
        let header_crc_span = {
            let mut span = vec![0xA1, 0xA1, 0xA1, 0xFE];
            span.extend_from_slice(&header_field_bytes);
            span
        };
        let mut header_crc = crc16_ccitt_false(&header_crc_span);

        let mut data_crc_span = vec![0xA1, 0xA1, 0xA1, 0xFB];
        data_crc_span.extend_from_slice(data);
        let mut data_crc = crc16_ccitt_false(&data_crc_span);

        if corrupt_crc {
            header_crc ^= 0xFFFF;
            data_crc ^= 0xFFFF;
        }

        let mut bytes = vec![0x00; 10];
        bytes.extend_from_slice(&[0xA1, 0xA1, 0xA1, 0xFE]);
        bytes.append(&mut header_field_bytes);
        bytes.extend_from_slice(&header_crc.to_be_bytes());

        // 34 zero bytes puts the header-to-data offset at exactly the
        // 704-bit lower bound of `legal_offset_range()`, so these synthetic
        // sectors never trigger an UnusualOffset warning.
        bytes.extend_from_slice(&[0x00; 34]);
        bytes.extend_from_slice(&[0xA1, 0xA1, 0xA1, 0xFB]);
        bytes.extend_from_slice(data);
        bytes.extend_from_slice(&data_crc.to_be_bytes());

        bytes
    }

    /// Like [`synthetic_sector`], but the header's sector-length code is
    /// `length_code` instead of the expected `2` (512 bytes/sector), with
    /// both CRCs still computed correctly over the resulting (wrong) fields.
    fn synthetic_sector_with_length_code(
        track: u8,
        side: u8,
        sector: u8,
        data: &[u8; 512],
        length_code: u8,
    ) -> Vec<u8> {
        let mut header_field_bytes = vec![track, side, sector, length_code];
        let header_crc_span = {
            let mut span = vec![0xA1, 0xA1, 0xA1, 0xFE];
            span.extend_from_slice(&header_field_bytes);
            span
        };
        let header_crc = crc16_ccitt_false(&header_crc_span);

        let mut data_crc_span = vec![0xA1, 0xA1, 0xA1, 0xFB];
        data_crc_span.extend_from_slice(data);
        let data_crc = crc16_ccitt_false(&data_crc_span);

        let mut bytes = vec![0x00; 10];
        bytes.extend_from_slice(&[0xA1, 0xA1, 0xA1, 0xFE]);
        bytes.append(&mut header_field_bytes);
        bytes.extend_from_slice(&header_crc.to_be_bytes());

        bytes.extend_from_slice(&[0x00; 34]);
        bytes.extend_from_slice(&[0xA1, 0xA1, 0xA1, 0xFB]);
        bytes.extend_from_slice(data);
        bytes.extend_from_slice(&data_crc.to_be_bytes());

        bytes
    }

    /// A [`TrackSource`] stub that returns one bitstream per call, cycling
    /// through a fixed script of raw byte sequences (one per retry attempt).
    struct ScriptedSource {
        attempts: Vec<Vec<u8>>,
        next: usize,
    }

    impl TrackSource for ScriptedSource {
        fn decompressed_bitstream(
            &mut self,
            _track: u8,
            _head: u8,
        ) -> CoreResult<BitBuf> {
            let bytes = self.attempts[self.next.min(self.attempts.len() - 1)].clone();
            self.next += 1;
            Ok(mfm_encode_bytes(&bytes))
        }
    }

    #[test]
    fn all_valid_sectors_accepted_on_first_attempt() {
        let format = DiskFormat::ibm_dos();
        let mut bytes = Vec::new();
        for sector_no in 1..=9u8 {
            bytes.extend(synthetic_sector(0, 0, sector_no, &[sector_no; 512], false));
        }
        let mut source = ScriptedSource {
            attempts: vec![bytes],
            next: 0,
        };

        let validator = TrackValidator::new(5, false);
        let outcome = validator.read_track(&format, &mut source, 0, 0).unwrap();
        assert_eq!(outcome.payload.len(), 9 * 512);
        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.attempts_used, 1);
    }

    #[test]
    fn corrupted_sector_recovers_on_a_later_retry() {
        let format = DiskFormat::ibm_dos();
        let mut good_attempt = Vec::new();
        for sector_no in 1..=9u8 {
            let corrupt = sector_no == 5;
            good_attempt.extend(synthetic_sector(0, 0, sector_no, &[sector_no; 512], corrupt));
        }
        let mut final_attempt = Vec::new();
        for sector_no in 1..=9u8 {
            final_attempt.extend(synthetic_sector(0, 0, sector_no, &[sector_no; 512], false));
        }

        let mut source = ScriptedSource {
            attempts: vec![
                good_attempt.clone(),
                good_attempt.clone(),
                good_attempt.clone(),
                good_attempt,
                final_attempt,
            ],
            next: 0,
        };

        let validator = TrackValidator::new(5, false);
        let outcome = validator.read_track(&format, &mut source, 0, 0).unwrap();
        assert_eq!(outcome.payload.len(), 9 * 512);
        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.attempts_used, 5);
    }

    #[test]
    fn permanently_corrupted_sector_is_accepted_on_final_retry_with_warning() {
        let format = DiskFormat::ibm_dos();
        let mut attempt = Vec::new();
        for sector_no in 1..=9u8 {
            let corrupt = sector_no == 7;
            attempt.extend(synthetic_sector(0, 0, sector_no, &[sector_no; 512], corrupt));
        }
        let mut source = ScriptedSource {
            attempts: vec![attempt.clone(), attempt.clone(), attempt],
            next: 0,
        };

        let validator = TrackValidator::new(3, false);
        let outcome = validator.read_track(&format, &mut source, 0, 0).unwrap();
        assert_eq!(outcome.payload.len(), 9 * 512);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(matches!(
            outcome.warnings[0],
            TrackWarning::CrcMismatch { sector_no: 7, .. }
        ));
    }

    #[test]
    fn wrong_sector_length_code_is_treated_like_a_crc_mismatch() {
        let format = DiskFormat::ibm_dos();
        let mut attempt = Vec::new();
        for sector_no in 1..=9u8 {
            if sector_no == 4 {
                attempt.extend(synthetic_sector_with_length_code(
                    0,
                    0,
                    sector_no,
                    &[sector_no; 512],
                    3,
                ));
            } else {
                attempt.extend(synthetic_sector(0, 0, sector_no, &[sector_no; 512], false));
            }
        }
        let mut source = ScriptedSource {
            attempts: vec![attempt.clone(), attempt.clone(), attempt],
            next: 0,
        };

        let validator = TrackValidator::new(3, false);
        let outcome = validator.read_track(&format, &mut source, 0, 0).unwrap();
        assert_eq!(outcome.payload.len(), 9 * 512);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(matches!(
            outcome.warnings[0],
            TrackWarning::CrcMismatch {
                sector_no: 4,
                header_ok: false,
                data_ok: true,
            }
        ));
    }

    #[test]
    fn zero_records_every_attempt_fills_track_with_zeros() {
        let format = DiskFormat::cbm_1581();
        let mut source = ScriptedSource {
            attempts: vec![vec![0x00; 40]],
            next: 0,
        };

        let validator = TrackValidator::new(2, false);
        let outcome = validator.read_track(&format, &mut source, 0, 0).unwrap();
        assert_eq!(outcome.payload, vec![0u8; 10 * 512]);
        assert!(matches!(outcome.warnings[0], TrackWarning::FilledEmpty));
    }

    #[test]
    fn wrong_side_with_stop_on_error_aborts() {
        let format = DiskFormat::ibm_dos();
        let mut bytes = Vec::new();
        for sector_no in 1..=9u8 {
            // Every record carries side_no 1 while we ask for logical head 0,
            // simulating the wrong swap_sides choice for this disk.
            bytes.extend(synthetic_sector(0, 1, sector_no, &[sector_no; 512], false));
        }
        let mut source = ScriptedSource {
            attempts: vec![bytes],
            next: 0,
        };

        let validator = TrackValidator::new(1, true);
        let result = validator.read_track(&format, &mut source, 0, 0);
        assert!(matches!(
            result,
            Err(CoreError::SectorInconsistency(TrackWarning::WrongSide { .. }))
        ));
    }
}
