use std::error::Error;
use std::io::{stdout, Write};
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use bpaf::Bpaf;
use log::warn;
use sensel::{DecodedFrame, Sensel, Transport};

use crate::config::{content_mask, Config, ContentList, ModeSetting, ScanConfig};

mod config;
mod serial;

/// Register id, hex with an optional 0x prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HexByte(u8);

impl FromStr for HexByte {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim_start_matches("0x");
        u8::from_str_radix(digits, 16)
            .map(Self)
            .map_err(|e| format!("invalid register {s}: {e}"))
    }
}

/// Register payload as a hex string, e.g. 0x0102ff
#[derive(Debug, Clone, PartialEq, Eq)]
struct HexBytes(Vec<u8>);

impl FromStr for HexBytes {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim_start_matches("0x");
        if digits.len() % 2 != 0 {
            return Err(format!("odd number of hex digits in {s}"));
        }
        (0..digits.len())
            .step_by(2)
            .map(|i| {
                digits
                    .get(i..i + 2)
                    .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                    .ok_or_else(|| format!("invalid hex byte at offset {i} in {s}"))
            })
            .collect::<Result<_, _>>()
            .map(Self)
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Clone, Debug, Bpaf)]
enum RegCommand {
    /// Read a fixed-size register
    #[bpaf(command("read"))]
    Read {
        #[bpaf(positional("REG"))]
        reg: HexByte,
        #[bpaf(positional("SIZE"))]
        size: u8,
    },
    /// Write a fixed-size register
    #[bpaf(command("write"))]
    Write {
        #[bpaf(positional("REG"))]
        reg: HexByte,
        #[bpaf(positional("HEX"))]
        data: HexBytes,
    },
    /// Read a variable-size register
    #[bpaf(command("read-vs"))]
    ReadVs {
        #[bpaf(positional("REG"))]
        reg: HexByte,
        #[bpaf(positional("MAX"))]
        max: usize,
    },
    /// Write a variable-size register
    #[bpaf(command("write-vs"))]
    WriteVs {
        #[bpaf(positional("REG"))]
        reg: HexByte,
        #[bpaf(positional("HEX"))]
        data: HexBytes,
    },
}

#[derive(Clone, Debug, Bpaf)]
enum Command {
    /// Print firmware and sensor information
    #[bpaf(command)]
    Info,
    /// Print decoded frames as they arrive
    #[bpaf(command)]
    Stream {
        /// Stop after this many frames
        #[bpaf(short, long, argument("N"))]
        frames: Option<usize>,
        /// Let the device push frames instead of requesting each one
        #[bpaf(long("async"))]
        asynchronous: bool,
        /// Frames the device batches per request, 0 for one at a time
        #[bpaf(short, long, argument("N"))]
        buffer: Option<u8>,
        /// Frame sections to request, e.g. contacts,accel
        #[bpaf(short, long, argument("LIST"))]
        content: Option<ContentList>,
    },
    /// Raw register access
    #[bpaf(command, fallback_to_usage)]
    Reg(#[bpaf(external(reg_command))] RegCommand),
}

#[derive(Clone, Debug, Bpaf)]
#[bpaf(options, version, descr(env!("CARGO_PKG_DESCRIPTION")))]
struct Cli {
    /// Serial port of the device, overrides the config file
    #[bpaf(short, long, argument("PATH"))]
    port: Option<String>,
    /// Serial read timeout, e.g. 500ms
    #[bpaf(long, argument("DURATION"))]
    timeout: Option<humantime::Duration>,
    #[bpaf(external(command))]
    command: Command,
}

fn print_info<T: Transport>(sensel: &mut Sensel<T>) -> Result<(), Box<dyn Error>> {
    let firmware = sensel.firmware_info();
    let sensor = sensel.sensor_info();
    let scales = sensel.scales();
    println!("firmware:  {firmware}");
    println!(
        "device:    id {:#06x}, revision {}",
        firmware.device_id, firmware.revision
    );
    println!(
        "sensor:    {}x{} cells, {:.1}x{:.1} mm, up to {} contacts",
        sensor.num_cols, sensor.num_rows, sensor.width, sensor.height, sensor.max_contacts
    );
    println!(
        "content:   {:?} (supported {:?})",
        sensel.frame_content(),
        sensel.supported_frame_content()
    );
    println!(
        "scales:    dims {} force {} angle {} area {}",
        scales.dims, scales.force, scales.angle, scales.area
    );
    println!("detail:    {:?}", sensel.scan_detail()?);
    println!("max rate:  {} fps", sensel.max_frame_rate()?);
    println!("baseline:  {}", if sensel.dynamic_baseline() { "dynamic" } else { "static" });

    let leds = sensel.leds();
    if leds.count > 0 {
        println!(
            "leds:      {} (max brightness {}): {:?}",
            leds.count,
            leds.max_brightness,
            leds.levels()
        );
    }
    Ok(())
}

fn print_frame(frame: &DecodedFrame) {
    let mut line = format!("t={:<10} lost={}", frame.timestamp, frame.lost_frames);
    for c in frame.contacts.iter().flatten() {
        line += &format!(
            " [#{} {:?} ({:.2}, {:.2}) force {:.1} area {:.1}]",
            c.id, c.state, c.x, c.y, c.force, c.area
        );
    }
    if let Some(accel) = frame.accel {
        line += &format!(" accel ({}, {}, {})", accel.x, accel.y, accel.z);
    }
    if let Some(force) = &frame.force {
        line += &format!(" total force {:.1}", force.iter().sum::<f32>());
    }
    println!("{line}");
}

/// Read and print frames until `limit` frames were printed
fn pump<T: Transport>(sensel: &mut Sensel<T>, limit: Option<usize>) -> sensel::Result<()> {
    let mut printed = 0;
    while !limit.is_some_and(|n| printed >= n) {
        match sensel.read_sensor() {
            Ok(0) => thread::sleep(Duration::from_millis(1)),
            Ok(_) => {},
            Err(e) if e.is_session_fatal() => return Err(e),
            Err(e) => warn!("read cycle failed: {e}"),
        }

        while sensel.available_frames() > 0 && !limit.is_some_and(|n| printed >= n) {
            // undecodable frames are logged and dropped by the session
            if let Ok(frame) = sensel.get_frame() {
                print_frame(&frame);
                printed += 1;
            }
        }
    }
    Ok(())
}

fn stream<T: Transport>(
    sensel: &mut Sensel<T>,
    scan: &ScanConfig,
    limit: Option<usize>,
) -> Result<(), Box<dyn Error>> {
    sensel.set_scan_detail(scan.detail.into())?;
    sensel.set_frame_content(content_mask(&scan.content))?;
    sensel.set_buffer_control(scan.buffer_depth)?;
    sensel.set_scan_mode(scan.mode.into())?;

    sensel.start_scanning()?;
    let res = pump(sensel, limit);
    let stopped = sensel.stop_scanning();
    res?;
    Ok(stopped?)
}

fn register<T: Transport>(sensel: &mut Sensel<T>, cmd: RegCommand) -> Result<(), Box<dyn Error>> {
    match cmd {
        RegCommand::Read { reg, size } => {
            println!("{}", hex(&sensel.read_register(reg.0, size)?));
        },
        RegCommand::Write { reg, data } => {
            sensel.write_register(reg.0, &data.0)?;
            println!("wrote {} bytes to {:#04x}", data.0.len(), reg.0);
        },
        RegCommand::ReadVs { reg, max } => {
            println!("{}", hex(&sensel.read_register_vs(reg.0, max)?));
        },
        RegCommand::WriteVs { reg, data } => {
            let len = data.0.len();
            sensel.write_register_vs(reg.0, &data.0, &mut |written| {
                print!("\rwriting {len} bytes ({written}/{len}) ... ");
                let _ = stdout().flush();
            })?;
            println!("done");
        },
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = cli().run();

    let mut config = Config::load_or_create()?;
    if let Some(port) = cli.port {
        config.serial.port = Some(port);
    }
    if let Some(timeout) = cli.timeout {
        config.serial.timeout = timeout.into();
    }

    let transport = serial::connect(&config.serial, config.protocol.read_retries)?;
    let mut sensel = Sensel::open(transport, (&config.protocol).into())?;

    let res = match cli.command {
        Command::Info => print_info(&mut sensel),
        Command::Stream {
            frames,
            asynchronous,
            buffer,
            content,
        } => {
            let mut scan = config.scan.clone();
            if asynchronous {
                scan.mode = ModeSetting::Async;
            }
            if let Some(depth) = buffer {
                scan.buffer_depth = depth;
            }
            if let Some(ContentList(content)) = content {
                scan.content = content;
            }
            stream(&mut sensel, &scan, frames)
        },
        Command::Reg(cmd) => register(&mut sensel, cmd),
    };

    let closed = sensel.close();
    res?;
    Ok(closed?)
}
