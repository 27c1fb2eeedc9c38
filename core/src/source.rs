//! The abstraction boundary between "how a decompressed bitstream for a
//! given (track, head) is obtained" and the rest of the pipeline. Real
//! hardware ([`crate::controller::ControllerLink`]) and the replay backend
//! ([`crate::simulated::SimulatedSource`]) both implement this trait; the
//! parser and validator never know which one they were handed.

use crate::bits::BitBuf;
use crate::error::CoreResult;

pub trait TrackSource {
    /// Returns the decompressed bitstream for `track`/`head`, performing
    /// whatever side-swap interpretation the disk format requires before
    /// talking to the underlying transport.
    fn decompressed_bitstream(&mut self, track: u8, head: u8) -> CoreResult<BitBuf>;
}
