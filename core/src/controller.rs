//! Controller Link (C2): owns the serial session with the microcontroller
//! and implements the command/response wire protocol.
//!
//! `ControllerLink` is a scoped resource in the same spirit as the teacher
//! crate's `init_usb`/`DeviceHandle` pairing: the constructor opens the port
//! and runs the handshake, and `Drop` rewinds and switches the motor off on
//! every exit path, including unwinding past a `?`.

use std::io::{Read, Write};
use std::time::Duration;

use crate::bits::BitBuf;
use crate::decompress::decompress;
use crate::error::{CoreError, CoreResult};
use crate::protocol::{
    Command, BAUD_RATE, MAX_TRACK_READ_LEN, SHORT_TRACK_THRESHOLD, TRACK_TERMINATOR,
};
use crate::source::TrackSource;

/// A non-fatal condition surfaced while reading a raw track, distinct from
/// the sector-level warnings the validator tracks. Callers that want the
/// `ShortTrack` signal can inspect `ControllerLink::take_warnings`.
pub type RawTrackWarning = crate::error::TrackWarning;

pub struct ControllerLink {
    port: Box<dyn serialport::SerialPort>,
    current_track: Option<u8>,
    current_head: Option<u8>,
    motor_running: bool,
    ignore_index_pulse: bool,
    pending_warnings: Vec<RawTrackWarning>,
}

impl ControllerLink {
    /// Opens the serial port, clears any residual input, and runs the
    /// version + rewind handshake, mirroring the Python
    /// `openSerialConnection` / teacher `init_usb` constructors.
    pub fn open(device_path: &str) -> CoreResult<Self> {
        let port = serialport::new(device_path, BAUD_RATE)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(Duration::from_secs(30))
            .open()?;

        let mut link = ControllerLink {
            port,
            current_track: None,
            current_head: None,
            motor_running: false,
            ignore_index_pulse: true,
            pending_warnings: Vec::new(),
        };

        link.send_command(Command::Version)?;
        link.send_command(Command::Rewind)?;
        link.current_track = Some(0);

        Ok(link)
    }

    pub fn set_ignore_index_pulse(&mut self, ignore: bool) {
        self.ignore_index_pulse = ignore;
    }

    /// Drains and returns any warnings (currently only `ShortTrack`)
    /// accumulated since the last call.
    pub fn take_warnings(&mut self) -> Vec<RawTrackWarning> {
        std::mem::take(&mut self.pending_warnings)
    }

    fn ensure_motor_on(&mut self) -> CoreResult<()> {
        if !self.motor_running {
            self.send_command(Command::MotorOn)?;
        }
        Ok(())
    }

    /// Sends a single command and validates its single-byte ack, per the
    /// `send_command` contract in the spec. `version` additionally consumes
    /// the 4 ASCII firmware bytes.
    pub fn send_command(&mut self, cmd: Command) -> CoreResult<()> {
        if !matches!(cmd, Command::Version | Command::MotorOn | Command::MotorOff) {
            self.ensure_motor_on()?;
        }
        match cmd {
            Command::MotorOn => self.motor_running = true,
            Command::MotorOff => self.motor_running = false,
            _ => {}
        }

        self.port.clear(serialport::ClearBuffer::Input).ok();
        self.port.write_all(&cmd.encode())?;

        let mut reply = [0u8; 1];
        self.port.read_exact(&mut reply)?;
        if reply[0] != b'1' {
            return Err(CoreError::Controller {
                cmd: cmd.label(),
                reply: Some(reply[0]),
            });
        }

        if cmd.expects_firmware_bytes() {
            let mut firmware = [0u8; 4];
            self.port.read_exact(&mut firmware)?;
        }

        Ok(())
    }

    fn select_track_and_head(&mut self, track: u8, head: u8) -> CoreResult<()> {
        if self.current_track != Some(track) {
            if track >= crate::format::TRACK_COUNT {
                return Err(CoreError::Range { track, head });
            }
            self.send_command(Command::SelectTrack(track))?;
            self.current_track = Some(track);
        }
        if self.current_head != Some(head) {
            if head >= crate::format::HEAD_COUNT {
                return Err(CoreError::Range { track, head });
            }
            let cmd = if head == 0 {
                Command::SelectHead0
            } else {
                Command::SelectHead1
            };
            self.send_command(cmd)?;
            self.current_head = Some(head);
        }
        Ok(())
    }

    /// Requests the raw compressed track for `track`/`head` (already
    /// side-interpreted by the caller), reading until the `\x00` terminator
    /// bounded at `MAX_TRACK_READ_LEN` bytes.
    pub fn read_raw_track(&mut self, track: u8, head: u8) -> CoreResult<Vec<u8>> {
        self.select_track_and_head(track, head)?;
        self.ensure_motor_on()?;

        self.port.clear(serialport::ClearBuffer::Input).ok();
        self.port.write_all(
            &Command::ReadTrack {
                from_index_pulse: !self.ignore_index_pulse,
            }
            .encode(),
        )?;

        let mut result = Vec::with_capacity(MAX_TRACK_READ_LEN);
        let mut byte = [0u8; 1];
        while result.len() < MAX_TRACK_READ_LEN {
            self.port.read_exact(&mut byte)?;
            if byte[0] == TRACK_TERMINATOR {
                break;
            }
            result.push(byte[0]);
        }

        if result.len() < SHORT_TRACK_THRESHOLD {
            self.pending_warnings.push(RawTrackWarning::ShortTrack {
                len: result.len(),
            });
        }

        Ok(result)
    }
}

impl TrackSource for ControllerLink {
    fn decompressed_bitstream(&mut self, track: u8, head: u8) -> CoreResult<BitBuf> {
        let raw = self.read_raw_track(track, head)?;
        Ok(decompress(&raw))
    }
}

impl Drop for ControllerLink {
    fn drop(&mut self) {
        // Best-effort: a failure during shutdown must never panic or abort
        // the process, since Drop can run while already unwinding.
        let _ = self.send_command(Command::Rewind);
        let _ = self.send_command(Command::MotorOff);
    }
}

#[cfg(test)]
mod tests {
    // `ControllerLink::open` requires a real or virtual serial device, which
    // is out of reach for unit tests; its wire-protocol behavior is covered
    // indirectly through `protocol::Command` tests and the simulated-backend
    // integration tests that exercise everything above the transport.
}
