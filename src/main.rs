use anyhow::Context;
use clap::Parser;
use rewind_dbgp::config::{self, Config};
use rewind_dbgp::dbgp::TcpTransport;
use rewind_dbgp::engine::notify::StopNotifier;
use rewind_dbgp::engine::{Session, SessionOptions};
use rewind_dbgp::mi::{Gdb, GdbProcess, Verbosity};
use rewind_dbgp::replay::{self, Replay};
use rewind_dbgp::version::{self, Tool};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// rr trace directory of the recorded PHP execution
    trace_dir: PathBuf,

    /// Script the recording was started with
    #[arg(long)]
    entry_file: PathBuf,

    /// TOML table from script path to its block in the break source
    #[arg(long)]
    source_map: PathBuf,

    /// Address of the listening IDE [default: 127.0.0.1:9000]
    #[arg(long)]
    ide: Option<String>,

    #[arg(long)]
    idekey: Option<String>,

    /// Generated C source breakpoints are placed in [default: dontbug_break.c]
    #[arg(long)]
    break_source: Option<String>,

    #[arg(long, env = "REWIND_GDB")]
    gdb: Option<String>,

    #[arg(long, env = "REWIND_RR")]
    rr: Option<String>,

    #[arg(long, env = "REWIND_PHP")]
    php: Option<String>,

    /// Port of the rr gdb server
    #[arg(long, default_value_t = 9999)]
    replay_port: u16,

    /// Run and step backwards unless a command says otherwise
    #[arg(long)]
    reverse: bool,

    #[arg(short, long)]
    verbose: bool,

    /// Configuration file [default: ~/.config/rewind-dbgp/config.toml]
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();
    rewind_dbgp::log::init(args.verbose);

    let config = Config::from_file(args.config.as_deref()).unwrap_or_default();
    if let Err(e) = run(args, config) {
        log::error!("{e:#}");
        std::process::exit(1);
    }
}

fn run(args: Args, config: Config) -> anyhow::Result<()> {
    let php = args.php.or(config.php).unwrap_or_else(|| "php".to_string());
    let gdb = args.gdb.or(config.gdb).unwrap_or_else(|| "gdb".to_string());
    let rr = args.rr.or(config.rr).unwrap_or_else(|| "rr".to_string());
    version::check_executable(Tool::Php, &php).context("php requirements")?;
    let gdb = version::check_executable(Tool::Gdb, &gdb).context("gdb requirements")?;
    let rr = version::check_executable(Tool::Rr, &rr).context("rr requirements")?;

    let trace_dir = version::absolute_path(&args.trace_dir).context("trace directory")?;
    let entry_file = version::absolute_path(&args.entry_file).context("entry file")?;
    let source_map = config::load_source_map(&args.source_map)?;

    let replay = Replay::start(&rr, &trace_dir, args.replay_port)?;

    let notifier = StopNotifier::new();
    let process = GdbProcess::spawn(&gdb, &["--quiet", "--nx"], notifier.clone())?;
    let verbosity = if config.noisy_gdb {
        Verbosity::Noisy
    } else {
        Verbosity::Quiet
    };
    let break_source = args
        .break_source
        .or(config.break_source)
        .unwrap_or_else(|| "dontbug_break.c".to_string());
    let mut gdb = Gdb::new(process, verbosity);
    replay::attach(&mut gdb, replay.launch(), &break_source)
        .context("attach gdb to the replay")?;

    let ide_addr = args
        .ide
        .or(config.ide)
        .unwrap_or_else(|| "127.0.0.1:9000".to_string());
    let ide = TcpTransport::connect(ide_addr.as_str())
        .with_context(|| format!("connect to the IDE at {ide_addr}"))?;
    log::info!("connected to the IDE at {ide_addr}");

    let options = SessionOptions {
        entry_file: entry_file.to_string_lossy().into_owned(),
        idekey: args.idekey.or(config.idekey).unwrap_or_default(),
        break_source,
        source_map,
        reverse: args.reverse,
    };
    let mut session = Session::new(gdb, ide, notifier, options);
    session.run()?;

    log::info!("session finished");
    Ok(())
}
