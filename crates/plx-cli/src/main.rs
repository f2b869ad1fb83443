//! `plx`: command-line interface for PLX PCIe switches over I2C.
//!
//! ```text
//! USAGE:
//!   plx read <port> <reg> <length>   Hex dump of successive registers
//!   plx status                       Switch health report
//!   plx eeprom-gen [options]         Write a register-stream EEPROM image
//!   plx eeprom-fill <start> <length> Program a raw EEPROM range
//! ```
//!
//! Numbers accept `0x` hex or decimal, e.g. `plx read 0xa 0x240 106`.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use plx_chip::regs::{RegisterSchema, NUM_PORTS};
use plx_driver::backends::MockTransport;
use plx_driver::page::DEFAULT_EEPROM_ADDRESS;
use plx_driver::reader::DEFAULT_DEVICE_ADDRESS;
use plx_driver::{
    AdapterMode, DebugControl, DecodedRegister, EepromPageWriter, EepromStreamBuilder, Fill, LinkStatus,
    LinkStatusControl2, PageWriterConfig, PlxError, PortConfigPreset, RegisterRecord, Session, SessionConfig,
    StreamConfig, Transport, UpstreamRole,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "plx", about = "PLX PCIe switch I2C and EEPROM tool", version)]
struct Cli {
    #[command(flatten)]
    bus: BusArgs,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Args)]
struct BusArgs {
    /// Adapter number (`/dev/i2c-N`).
    #[arg(long, global = true, default_value_t = 0)]
    channel: u32,

    /// Switch I2C address.
    #[arg(long, global = true, default_value_t = DEFAULT_DEVICE_ADDRESS, value_parser = parse_u8)]
    device: u8,

    /// I2C bitrate in kHz.
    #[arg(long, global = true, default_value_t = 100)]
    bitrate: u32,

    /// Bus-lock timeout in ms.
    #[arg(long, global = true, default_value_t = 150)]
    bus_timeout: u32,

    /// Explicit i2c-dev node, overriding `--channel`.
    #[arg(long, global = true)]
    i2c_dev: Option<PathBuf>,

    /// Use the in-memory transport instead of hardware (every read NAKs).
    #[arg(long, global = true)]
    mock: bool,
}

#[derive(Subcommand)]
enum Cmd {
    /// Read `length` bytes of registers from `port`, starting at `reg`.
    Read {
        /// Port selector (0-31).
        #[arg(value_parser = parse_u8)]
        port: u8,
        /// First register byte offset.
        #[arg(value_parser = parse_u32)]
        reg: u32,
        /// Byte count; one register is read per 4 bytes.
        #[arg(value_parser = parse_u32)]
        length: u32,
    },
    /// Print the switch health report.
    Status {
        /// Also decode Link Status for every enabled port.
        #[arg(long)]
        links: bool,
        /// Also decode Link Control 2 for every enabled port.
        #[arg(long)]
        link_control2: bool,
    },
    /// Generate a PEX8732/PEX8734 register-stream EEPROM image.
    EepromGen(GenArgs),
    /// Write a fill pattern into an I2C EEPROM, page by page.
    EepromFill {
        /// First EEPROM byte address.
        #[arg(value_parser = parse_usize)]
        start: usize,
        /// Number of bytes.
        #[arg(value_parser = parse_usize)]
        length: usize,
        /// Write zeros instead of an incrementing pattern.
        #[arg(long)]
        zero: bool,
        /// EEPROM I2C address.
        #[arg(long, default_value_t = DEFAULT_EEPROM_ADDRESS, value_parser = parse_u8)]
        eeprom: u8,
    },
}

#[derive(Args)]
struct GenArgs {
    /// Skip the station 1 lane-reversal entry.
    #[arg(long)]
    no_stn2rev: bool,
    /// Disable port 1.
    #[arg(long)]
    disable_port1: bool,
    /// Disable port 4.
    #[arg(long)]
    disable_port4: bool,
    /// Upstream / NT role.
    #[arg(long, value_enum, default_value_t = RoleArg::Upstream1)]
    role: RoleArg,
    /// Enable the NT link and virtual interfaces (NT roles only).
    #[arg(long)]
    nt_interfaces: bool,
    /// Lane partitioning.
    #[arg(long, value_enum, default_value_t = PortCfgArg::X8x8)]
    port_config: PortCfgArg,
    /// Output file (default: name derived from the options).
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
    /// Port 1 upstream
    Upstream1,
    /// NT on port 1
    Nt1,
    /// NT on port 4
    Nt4,
    /// Leave the strap default
    None,
}

#[derive(Clone, Copy, ValueEnum)]
enum PortCfgArg {
    /// Two x8 ports
    X8x8,
    /// Four x4 ports
    X4x4x4x4,
    /// Leave the strap default
    None,
}

impl From<&GenArgs> for StreamConfig {
    fn from(a: &GenArgs) -> Self {
        Self {
            station2_lane_reversal: !a.no_stn2rev,
            disable_port1: a.disable_port1,
            disable_port4: a.disable_port4,
            upstream: match a.role {
                RoleArg::Upstream1 => Some(UpstreamRole::UpstreamPort1),
                RoleArg::Nt1 => Some(UpstreamRole::NtPort1),
                RoleArg::Nt4 => Some(UpstreamRole::NtPort4),
                RoleArg::None => None,
            },
            nt_interfaces: a.nt_interfaces,
            port_config: match a.port_config {
                PortCfgArg::X8x8 => Some(PortConfigPreset::X8x8),
                PortCfgArg::X4x4x4x4 => Some(PortConfigPreset::X4x4x4x4),
                PortCfgArg::None => None,
            },
        }
    }
}

fn parse_u32(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("'{s}': {e}"))
}

fn parse_u8(s: &str) -> Result<u8, String> {
    u8::try_from(parse_u32(s)?).map_err(|e| format!("'{s}': {e}"))
}

fn parse_usize(s: &str) -> Result<usize, String> {
    usize::try_from(parse_u32(s)?).map_err(|e| format!("'{s}': {e}"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();

    // Image generation needs no adapter.
    if let Cmd::EepromGen(args) = &cli.command {
        return cmd_eeprom_gen(args);
    }

    let config = SessionConfig {
        channel: cli.bus.channel,
        mode: AdapterMode::SpiI2c,
        bitrate_khz: cli.bus.bitrate,
        bus_timeout_ms: cli.bus.bus_timeout,
        device: cli.bus.device,
        ..SessionConfig::default()
    };

    if cli.bus.mock {
        let session = Session::start(MockTransport::open(config.channel)?, config)?;
        return run(session, &cli.command);
    }
    run_hardware(&cli.bus, config, &cli.command)
}

#[cfg(target_os = "linux")]
fn run_hardware(bus: &BusArgs, config: SessionConfig, cmd: &Cmd) -> Result<()> {
    use plx_driver::backends::I2cDevTransport;

    let transport = match &bus.i2c_dev {
        Some(path) => I2cDevTransport::open_path(path)?,
        None => I2cDevTransport::open(config.channel)?,
    };
    run(Session::start(transport, config)?, cmd)
}

#[cfg(not(target_os = "linux"))]
fn run_hardware(_bus: &BusArgs, _config: SessionConfig, _cmd: &Cmd) -> Result<()> {
    bail!("no hardware transport on this platform; use --mock")
}

fn run<T: Transport>(mut session: Session<T>, cmd: &Cmd) -> Result<()> {
    println!("Bitrate set to {} kHz", session.bitrate_khz());
    println!("Bus lock timeout set to {} ms", session.bus_timeout_ms());

    match cmd {
        Cmd::Read { port, reg, length } => cmd_read(&mut session, *port, *reg, *length, &mut io::stdout().lock())?,
        Cmd::Status { links, link_control2 } => {
            cmd_status(&mut session, *links, *link_control2, &mut io::stdout().lock())?;
        }
        Cmd::EepromFill {
            start,
            length,
            zero,
            eeprom,
        } => cmd_eeprom_fill(&mut session, *start, *length, *zero, *eeprom)?,
        Cmd::EepromGen(args) => cmd_eeprom_gen(args)?,
    }

    session.close()?;
    Ok(())
}

fn cmd_read<T: Transport>(
    session: &mut Session<T>,
    port: u8,
    reg: u32,
    length: u32,
    out: &mut impl Write,
) -> Result<()> {
    let mut any = false;
    for (offset, result) in session.read_range(port, reg, length) {
        match result {
            Ok(v) => {
                let [b0, b1, b2, b3] = v.to_be_bytes();
                writeln!(out, "0x{offset:04x}: {b0:02x} {b1:02x} {b2:02x} {b3:02x}")?;
                any = true;
            }
            // A wrong-sized reply leaves the bus usable; anything else ends the scan.
            Err(e @ PlxError::UnexpectedLength { .. }) => eprintln!("warning: 0x{offset:04x}: {e}"),
            Err(e) => {
                eprintln!("error: 0x{offset:04x}: {e}");
                break;
            }
        }
    }
    if !any && length > 0 {
        bail!("no registers read");
    }
    Ok(())
}

fn flags(v: &[bool]) -> String {
    let bits: Vec<&str> = v.iter().map(|&b| if b { "1" } else { "0" }).collect();
    format!("[{}]", bits.join(", "))
}

fn cmd_status<T: Transport>(
    session: &mut Session<T>,
    links: bool,
    link_control2: bool,
    out: &mut impl Write,
) -> Result<()> {
    let mut sw = session.switch();

    match sw.port_map() {
        Ok((code, map)) => writeln!(out, "Port Configuration: {code} - {map:?}")?,
        Err(e) => writeln!(out, "Port Configuration: {e}")?,
    }

    // Without the enable mask no per-port register is read.
    let enabled = match sw.ports_enabled() {
        Ok(en) => {
            writeln!(out, "Ports Enabled: {}", flags(&en))?;
            en
        }
        Err(e) => {
            writeln!(out, "Ports Enabled: {e}")?;
            [false; NUM_PORTS]
        }
    };

    match sw.receivers_detected() {
        Ok(rd) => writeln!(out, "Receivers Detected: {}", flags(&rd))?,
        Err(e) => writeln!(out, "Receivers Detected: {e}")?,
    }

    let pending: Vec<String> = sw
        .for_enabled_ports(&enabled, |s, port| s.vc0_negotiation_pending(port))
        .into_iter()
        .map(|(port, r)| match r {
            Ok(p) => format!("{port}:{}", u8::from(p)),
            Err(_) => format!("{port}:?"),
        })
        .collect();
    writeln!(out, "VC0 Negotiations Pending: [{}]", pending.join(", "))?;

    match sw.lanes_up() {
        Ok(up) => writeln!(out, "Lanes Up: {}", flags(&up))?,
        Err(e) => writeln!(out, "Lanes Up: {e}")?,
    }

    match sw.link_widths_and_speeds() {
        Ok(l) => {
            let widths: Vec<u8> = l.iter().map(|p| p.lanes).collect();
            let speeds: Vec<String> = l.iter().map(|p| p.speed.to_string()).collect();
            writeln!(out, "Negotiated Link Widths: {widths:?}")?;
            writeln!(out, "Negotiated Link Speeds: [{}]", speeds.join(", "))?;
        }
        Err(e) => writeln!(out, "Negotiated Links: {e}")?,
    }

    match sw.receive_error_counts() {
        Ok(c) => writeln!(out, "Receive Error Counts: {c:?}")?,
        Err(e) => writeln!(out, "Receive Error Counts: {e}")?,
    }

    let counts = |r: Vec<(u8, plx_driver::Result<u32>)>| -> String {
        let v: Vec<String> = r
            .into_iter()
            .map(|(_, r)| r.map_or_else(|_| "?".into(), |c| c.to_string()))
            .collect();
        format!("[{}]", v.join(", "))
    };
    let tlp = counts(sw.for_all_ports(|s, p| s.bad_tlp_count(p)));
    writeln!(out, "Bad TLP Counts: {tlp}")?;
    let dllp = counts(sw.for_all_ports(|s, p| s.bad_dllp_count(p)));
    writeln!(out, "Bad DLLP Counts: {dllp}")?;

    print_register(out, None, DebugControl::SCHEMA, sw.read_decoded(0, DebugControl::SCHEMA))?;

    if links {
        for (port, r) in sw.for_enabled_ports(&enabled, |s, port| s.read_decoded(port, LinkStatus::SCHEMA)) {
            print_register(out, Some(port), LinkStatus::SCHEMA, r)?;
        }
    }
    if link_control2 {
        for (port, r) in
            sw.for_enabled_ports(&enabled, |s, port| s.read_decoded(port, LinkStatusControl2::SCHEMA))
        {
            print_register(out, Some(port), LinkStatusControl2::SCHEMA, r)?;
        }
    }

    Ok(())
}

fn print_register(
    out: &mut impl Write,
    port: Option<u8>,
    schema: &RegisterSchema,
    decoded: plx_driver::Result<DecodedRegister>,
) -> Result<()> {
    match port {
        Some(p) => writeln!(out, "{} (port {p}):", schema.name)?,
        None => writeln!(out, "{}:", schema.name)?,
    }
    writeln!(out, "  note: see {}", schema.reference)?;
    match decoded {
        Ok(d) => {
            for f in &d.fields {
                writeln!(out, "  {}: {}", f.name, f.value)?;
            }
        }
        Err(e) => writeln!(out, "  error: {e}")?,
    }
    Ok(())
}

fn cmd_eeprom_gen(args: &GenArgs) -> Result<()> {
    let config = StreamConfig::from(args);
    if config.nt_interfaces && !config.upstream.is_some_and(UpstreamRole::is_nt) {
        eprintln!("warning: --nt-interfaces has no effect without an NT role");
    }

    let image = EepromStreamBuilder::from_config(&config).serialize()?;
    let hex: String = image.iter().map(|b| format!("{b:02x}")).collect();
    println!("Data:");
    println!("{hex}");

    let path = args.output.clone().unwrap_or_else(|| config.image_name().into());
    std::fs::write(&path, &image).with_context(|| format!("writing {}", path.display()))?;
    info!("{} entries, {} byte image", config.entries().len(), image.len());
    println!("to File {}", path.display());
    Ok(())
}

fn cmd_eeprom_fill<T: Transport>(
    session: &mut Session<T>,
    start: usize,
    length: usize,
    zero: bool,
    eeprom: u8,
) -> Result<()> {
    let writer = EepromPageWriter::new(PageWriterConfig::default());
    let fill = if zero { Fill::Zero } else { Fill::Incrementing };
    let report = session.write_eeprom(&writer, eeprom, start, length, fill)?;
    println!(
        "Wrote {} bytes in {} pages to EEPROM {eeprom:#04x}",
        report.bytes_written, report.pages_written
    );
    Ok(())
}
