//! Simulated Source (C8): a [`TrackSource`] that replays a previously
//! captured debug bitstream instead of talking to real hardware. Mirrors the
//! Python `ArduinoSimulator`, which overrides `getDecompressedBitstream` to
//! return pre-recorded data and never opens a serial connection.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::bits::BitBuf;
use crate::error::{CoreError, CoreResult};
use crate::source::TrackSource;

/// A capture of decompressed bitstreams keyed by `(track, head)`, as
/// recorded by [`write_capture`] and replayed by [`SimulatedSource`].
#[derive(Default)]
pub struct Capture {
    tracks: HashMap<(u8, u8), BitBuf>,
}

impl Capture {
    pub fn new() -> Self {
        Capture::default()
    }

    pub fn insert(&mut self, track: u8, head: u8, bitstream: BitBuf) {
        self.tracks.insert((track, head), bitstream);
    }

    pub fn get(&self, track: u8, head: u8) -> Option<&BitBuf> {
        self.tracks.get(&(track, head))
    }
}

/// Writes `capture` to `path` as a sequence of `(track: u8, head: u8,
/// bit_len: u32, packed_bytes...)` records. This is a Rust-native debug
/// format, not a port of the Python tool's `repr()`-of-a-dict capture file.
pub fn write_capture(path: &Path, capture: &Capture) -> io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writer.write_u32::<LittleEndian>(capture.tracks.len() as u32)?;
    for (&(track, head), bitstream) in &capture.tracks {
        writer.write_u8(track)?;
        writer.write_u8(head)?;
        writer.write_u32::<LittleEndian>(bitstream.len() as u32)?;
        let packed = bitstream.to_packed_bytes();
        writer.write_u32::<LittleEndian>(packed.len() as u32)?;
        writer.write_all(&packed)?;
    }
    Ok(())
}

/// Loads a capture file written by [`write_capture`].
pub fn read_capture(path: &Path) -> io::Result<Capture> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let count = reader.read_u32::<LittleEndian>()?;
    let mut capture = Capture::new();
    for _ in 0..count {
        let track = reader.read_u8()?;
        let head = reader.read_u8()?;
        let bit_len = reader.read_u32::<LittleEndian>()? as usize;
        let byte_len = reader.read_u32::<LittleEndian>()? as usize;
        let mut packed = vec![0u8; byte_len];
        reader.read_exact(&mut packed)?;
        capture.insert(track, head, BitBuf::from_packed(&packed, bit_len));
    }
    Ok(capture)
}

pub struct SimulatedSource {
    capture: Capture,
}

impl SimulatedSource {
    pub fn new(capture: Capture) -> Self {
        SimulatedSource { capture }
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        Ok(SimulatedSource::new(read_capture(path)?))
    }
}

impl TrackSource for SimulatedSource {
    fn decompressed_bitstream(&mut self, track: u8, head: u8) -> CoreResult<BitBuf> {
        self.capture
            .get(track, head)
            .cloned()
            .ok_or(CoreError::Range { track, head })
    }
}

/// A [`TrackSource`] wrapper that records every bitstream it hands back into
/// a [`Capture`], so a real [`crate::controller::ControllerLink`] run can
/// also produce a replay file for the `simulated` device path, matching the
/// Python imager's `storeBitstream` option.
pub struct CapturingSource<'a> {
    inner: &'a mut dyn TrackSource,
    capture: Capture,
}

impl<'a> CapturingSource<'a> {
    pub fn new(inner: &'a mut dyn TrackSource) -> Self {
        CapturingSource {
            inner,
            capture: Capture::new(),
        }
    }

    pub fn into_capture(self) -> Capture {
        self.capture
    }
}

impl<'a> TrackSource for CapturingSource<'a> {
    fn decompressed_bitstream(&mut self, track: u8, head: u8) -> CoreResult<BitBuf> {
        let bitstream = self.inner.decompressed_bitstream(track, head)?;
        self.capture.insert(track, head, bitstream.clone());
        Ok(bitstream)
    }
}
