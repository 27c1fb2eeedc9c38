use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use sha1::Sha1;
use sha2::{Digest, Sha256};

use access1581_core::{
    image_disk, Capture, CapturingSource, ControllerLink, DiskFormat, DiskFormatName,
    SimulatedSource, TrackSource, TrackValidator,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum DiskTypeArg {
    Cbm1581,
    Ibmdos,
}

impl From<DiskTypeArg> for DiskFormatName {
    fn from(arg: DiskTypeArg) -> Self {
        match arg {
            DiskTypeArg::Cbm1581 => DiskFormatName::Cbm1581,
            DiskTypeArg::Ibmdos => DiskFormatName::IbmDos,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, about, long_about = None)]
struct Args {
    /// Disk format to image
    #[arg(short, long, value_enum, default_value = "cbm1581")]
    disktype: DiskTypeArg,

    /// Output image path. Defaults to image_<disktype>.<ext>
    #[arg(short, long)]
    output: Option<String>,

    /// Serial device path, or "simulated" to replay a captured bitstream
    /// given via --store-bitstream
    #[arg(short, long)]
    serialdevice: Option<String>,

    /// Number of read attempts per track before giving up on missing sectors
    #[arg(short, long, default_value_t = 5)]
    retries: u32,

    /// Promote sector-level inconsistencies (wrong track/side/sector number)
    /// to a fatal error instead of just logging a warning
    #[arg(long, default_value_t = false)]
    stop_on_error: bool,

    /// Time a track read from the index pulse rather than immediately
    #[arg(long, default_value_t = false)]
    from_index_pulse: bool,

    /// Path to read (when --serialdevice simulated) or write (otherwise) a
    /// per-track decompressed bitstream capture
    #[arg(long)]
    store_bitstream: Option<String>,
}

fn default_serial_device() -> &'static str {
    match std::env::consts::OS {
        "macos" => "/dev/cu.usbserial",
        "windows" => "COM5",
        _ => "/dev/ttyUSB0",
    }
}

fn print_digests(image: &[u8]) {
    let mut md5_ctx = md5::Context::new();
    md5_ctx.consume(image);
    println!("MD5   : {:x}", md5_ctx.compute());

    let mut sha1_hasher = Sha1::new();
    sha1_hasher.update(image);
    println!("SHA1  : {:x}", sha1_hasher.finalize());

    let mut sha256_hasher = Sha256::new();
    sha256_hasher.update(image);
    println!("SHA256: {:x}", sha256_hasher.finalize());
}

fn run_imaging(
    format: &DiskFormat,
    source: &mut dyn TrackSource,
    validator: &TrackValidator,
) -> anyhow::Result<Vec<u8>> {
    let result = image_disk(format, source, validator)?;
    for entry in &result.warnings {
        println!(
            "  Warning track {:2} head {}: {}",
            entry.track, entry.head, entry.warning
        );
    }
    Ok(result.bytes)
}

fn main() -> anyhow::Result<()> {
    println!("access1581 - disk imaging pipeline for IBM DD 3.5\" and Commodore 1581 floppies");

    let cli = Args::parse();
    let format = DiskFormat::by_name(cli.disktype.into());

    println!(
        "Selected disk format is {}, we expect {} sectors per track",
        format.name.as_str(),
        format.expected_sectors_per_track
    );

    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| format!("image_{}.{}", format.name.as_str(), format.image_extension));
    println!("Target image file is: {output_path}");

    let serial_device = cli
        .serialdevice
        .clone()
        .unwrap_or_else(|| default_serial_device().to_string());
    println!("Serial device is: {serial_device}");

    let validator = TrackValidator::new(cli.retries, cli.stop_on_error);

    let (image, capture_to_store) = if serial_device == "simulated" {
        let capture_path = cli
            .store_bitstream
            .as_ref()
            .context("--serialdevice simulated requires --store-bitstream <path> to replay from")?;
        let mut source = SimulatedSource::load(capture_path.as_ref())
            .with_context(|| format!("loading simulated capture from {capture_path}"))?;
        let image = run_imaging(&format, &mut source, &validator)?;
        (image, None)
    } else {
        let mut link = ControllerLink::open(&serial_device)
            .with_context(|| format!("opening serial device {serial_device}"))?;
        link.set_ignore_index_pulse(!cli.from_index_pulse);

        if cli.store_bitstream.is_some() {
            let mut capturing = CapturingSource::new(&mut link);
            let image = run_imaging(&format, &mut capturing, &validator)?;
            (image, Some(capturing.into_capture()))
        } else {
            let image = run_imaging(&format, &mut link, &validator)?;
            (image, None)
        }
    };

    if image.len() != format.image_len() {
        bail!(
            "assembled image is {} bytes, expected {}",
            image.len(),
            format.image_len()
        );
    }

    println!("Writing image to file {output_path}");
    let file = File::create(&output_path).with_context(|| format!("creating {output_path}"))?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&image)?;

    print_digests(&image);

    if let (Some(capture), Some(path)) = (capture_to_store, cli.store_bitstream.as_ref()) {
        write_capture(path, &capture)?;
        println!("Stored decompressed bitstream capture to {path}");
    }

    Ok(())
}

fn write_capture(path: &str, capture: &Capture) -> anyhow::Result<()> {
    access1581_core::simulated::write_capture(path.as_ref(), capture)
        .with_context(|| format!("writing bitstream capture to {path}"))
}
