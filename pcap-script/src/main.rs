#![warn(clippy::all)]

use clap::{crate_version, Parser};
use tracing::{debug, error, info, warn, Level};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use libpcap_script::*;

/// Run scripts on captured packets
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Capture interface
    #[arg(short, long)]
    interface: Option<String>,

    /// BPF capture filter
    #[arg(short, long)]
    filter: Option<String>,

    /// Rule script, run for every packet (default: print packets as JSON)
    #[arg(short, long, value_name = "FILE")]
    rules: Option<String>,

    /// Setup script, run once before the first packet
    #[arg(short = 's', long, value_name = "FILE")]
    rules_setup: Option<String>,

    /// Capture in promiscuous mode
    #[arg(long)]
    promiscuous: bool,

    /// Capture in immediate mode
    #[arg(long)]
    immediate: bool,

    /// Maximum number of bytes captured per packet [default: 65536]
    #[arg(long, value_name = "BYTES")]
    snap_len: Option<u32>,

    /// Configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<String>,

    /// Read packets from a pcap/pcap-ng file instead of an interface ('-' for stdin)
    #[arg(long, value_name = "FILE")]
    read: Option<String>,

    /// Decode packets with this link type instead of the detected one
    #[arg(long)]
    link_type: Option<String>,

    /// What to do when the rule script fails: 'fatal' or 'skip'
    #[arg(long, value_name = "POLICY")]
    on_error: Option<String>,

    /// List capture interfaces and exit
    #[arg(long)]
    list_interfaces: bool,
}

fn load_config(config: &mut Config, filename: &str) -> Result<(), io::Error> {
    debug!("Loading configuration {filename}");
    let path = Path::new(&filename);
    let file = File::open(path)?;
    config.load_config(file)
}

/// Override config options from command-line arguments
fn apply_args(config: &mut Config, args: &Args) -> Result<(), Error> {
    if let Some(filter) = args.filter.as_ref() {
        config.set("live.filter", filter.as_str())?;
    }
    if args.promiscuous {
        config.set("live.promisc", true)?;
    }
    if args.immediate {
        config.set("live.immediate", true)?;
    }
    if let Some(snaplen) = args.snap_len {
        config.set("live.snaplen", i64::from(snaplen))?;
    }
    if let Some(link_type) = args.link_type.as_ref() {
        config.set("link_type", link_type.as_str())?;
    }
    if let Some(policy) = args.on_error.as_ref() {
        config.set("script.on_error", policy.as_str())?;
    }
    Ok(())
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_env("PCAP_SCRIPT_LOG")
        .unwrap_or_else(|_| EnvFilter::from_default_env().add_directive(Level::INFO.into()));
    // stdout is reserved for script output
    let (writer, ansi) = match config.get("log_file") {
        Some(log_file) => {
            let output_dir = config.get("output_dir").unwrap_or(".");
            let file_appender = RollingFileAppender::new(Rotation::NEVER, output_dir, log_file);
            (BoxMakeWriter::new(file_appender), false)
        }
        None => (BoxMakeWriter::new(io::stderr), true),
    };
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_env_filter(env_filter)
        .with_ansi(ansi)
        .compact()
        .init();
}

fn read_script(filename: &str) -> Result<String, Error> {
    debug!("Loading script {filename}");
    fs::read_to_string(filename)
        .map_err(|e| Error::Config(format!("could not read script '{filename}': {e}")))
}

#[cfg(feature = "live")]
fn print_interfaces() -> Result<(), Error> {
    println!("pcap-script capture interfaces:");
    for iface in libpcap_script_live::list_interfaces()? {
        let addresses: Vec<_> = iface.addresses.iter().map(|a| a.to_string()).collect();
        match iface.description {
            Some(desc) => println!("    {} ({desc})", iface.name),
            None => println!("    {}", iface.name),
        }
        if !addresses.is_empty() {
            println!("        {}", addresses.join(" "));
        }
    }
    Ok(())
}

#[cfg(not(feature = "live"))]
fn print_interfaces() -> Result<(), Error> {
    Err(Error::Config(
        "listing interfaces requires the 'live' feature".to_owned(),
    ))
}

#[cfg(feature = "live")]
fn open_source(
    args: &Args,
    config: &Config,
    running: Arc<AtomicBool>,
) -> Result<Box<dyn CaptureSource>, Error> {
    if let Some(filename) = args.read.as_ref() {
        info!("Reading packets from {filename}");
        return libpcap_script_live::create_source_file(filename, config);
    }
    match args.interface.as_ref() {
        Some(interface) => libpcap_script_live::create_source_live(interface, config, running),
        None => Err(Error::Config(
            "no capture interface given (use -i or --read)".to_owned(),
        )),
    }
}

#[cfg(not(feature = "live"))]
fn open_source(
    args: &Args,
    config: &Config,
    _running: Arc<AtomicBool>,
) -> Result<Box<dyn CaptureSource>, Error> {
    if args.interface.is_some() {
        return Err(Error::Config(
            "live capture requires the 'live' feature".to_owned(),
        ));
    }
    if config.get("live.filter").is_some() {
        return Err(Error::Config(
            "capture filters require the 'live' feature".to_owned(),
        ));
    }
    match args.read.as_ref() {
        Some(filename) => {
            info!("Reading packets from {filename}");
            Ok(Box::new(PcapFileSource::open(filename, config)?))
        }
        None => Err(Error::Config("no input file given (use --read)".to_owned())),
    }
}

fn run(args: Args) -> Result<(), Error> {
    // load config
    let mut config = Config::default();
    if let Some(filename) = args.config.as_ref() {
        load_config(&mut config, filename)
            .map_err(|e| Error::Config(format!("could not load '{filename}': {e}")))?;
    }
    apply_args(&mut config, &args)?;

    init_logging(&config);

    // Now, really start
    info!("pcap-script {}", crate_version!());

    if args.list_interfaces {
        return print_interfaces();
    }

    // scripts are checked before the capture is opened
    let context = PacketContext::new_shared();
    let mut engine = ScriptEngine::new(context);
    engine.initialize()?;
    if let Some(filename) = args.rules_setup.as_ref() {
        let setup = read_script(filename)?;
        engine.run_setup(&setup)?;
    }
    let rule = match args.rules.as_ref() {
        Some(filename) => {
            let script = read_script(filename)?;
            engine.compile_rule(Some(&script))?
        }
        None => {
            debug!("No rule script, packets will be printed");
            engine.compile_rule(None)?
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Could not install Ctrl-C handler: {e}");
    }

    let source = open_source(&args, &config, running.clone())?;
    let stats = EvaluationLoop::new(source, engine, rule)
        .configure(&config)?
        .with_running_flag(running)
        .run()?;

    info!(
        "pcap-script: done, {} packets ({} not fully decoded, {} rule failures)",
        stats.packets, stats.decode_errors, stats.script_errors
    );
    Ok(())
}

fn main() {
    let args = Args::parse();
    if let Err(e) = run(args) {
        error!("{e}");
        eprintln!("pcap-script: {e}");
        process::exit(1);
    }
}
