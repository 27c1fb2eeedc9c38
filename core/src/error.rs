use thiserror::Error;

/// Fatal errors from the imaging pipeline. These stop the run, as opposed to
/// [`TrackWarning`] which the validator can retry past or the caller can choose
/// to ignore.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("controller command '{cmd}' failed: expected reply '1', got {reply:?}")]
    Controller {
        cmd: &'static str,
        reply: Option<u8>,
    },

    #[error("track {track} head {head} is out of range for this disk format")]
    Range { track: u8, head: u8 },

    #[error("sector inconsistency promoted to fatal: {0}")]
    SectorInconsistency(#[from] TrackWarning),

    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Non-fatal per-sector or per-track conditions encountered while reading a
/// track. The validator collects these; `stop_on_error` turns a subset of
/// them into a fatal [`CoreError::SectorInconsistency`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackWarning {
    #[error("wrong track number: expected {expected}, found {found}")]
    WrongTrack { expected: u8, found: u8 },

    #[error(
        "wrong head/side number: expected {expected}, found {found} \
         (check whether the disk format's swap_sides setting matches this disk)"
    )]
    WrongSide { expected: u8, found: u8 },

    #[error("sector number {sector_no} is out of expected bounds (1..={max})")]
    SectorOutOfRange { sector_no: u8, max: u8 },

    #[error("raw track read suspiciously short: {len} bytes")]
    ShortTrack { len: usize },

    #[error(
        "CRC mismatch for sector {sector_no} (header_ok={header_ok}, data_ok={data_ok}), \
         accepted anyway on the final retry"
    )]
    CrcMismatch {
        sector_no: u8,
        header_ok: bool,
        data_ok: bool,
    },

    #[error("only {found}/{expected} sectors recovered after all retries")]
    Partial { found: usize, expected: usize },

    #[error("no sectors recovered after all retries; track filled with zeros")]
    FilledEmpty,

    #[error("unusual header-to-data offset {offset} bits (expected {lower}..={upper})")]
    UnusualOffset {
        offset: usize,
        lower: usize,
        upper: usize,
    },
}

pub type CoreResult<T> = Result<T, CoreError>;
