//! Disk imaging pipeline for IBM-PC-compatible DD 3.5" and Commodore 1581
//! floppies: serial command protocol, flux decompression, MFM sector
//! parsing, CRC validation, and per-track retry assembly.
//!
//! The crate has no knowledge of argument parsing or the filesystem; the
//! `access1581` binary crate is the sole caller.

pub mod bits;
pub mod controller;
pub mod crc;
pub mod decompress;
pub mod error;
pub mod format;
pub mod imager;
pub mod parser;
pub mod protocol;
pub mod simulated;
pub mod source;
pub mod validator;

pub use controller::ControllerLink;
pub use error::{CoreError, CoreResult, TrackWarning};
pub use format::{DiskFormat, DiskFormatName};
pub use imager::{image_disk, ImageResult, TrackWarningEntry};
pub use simulated::{Capture, CapturingSource, SimulatedSource};
pub use source::TrackSource;
pub use validator::{TrackReadOutcome, TrackValidator};
