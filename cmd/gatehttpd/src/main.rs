//! # gatehttpd
//!
//! Static file server with per-directory `.htpasswd` Basic authentication.
//!
//! ## Usage
//!
//!     cargo run -p gatehttpd-bin --release -- [--port 3490] [--root ./www]
//!
//! Requests resolve to `<root>/<Host>/<path>`; a path ending in `/` serves
//! `index.html`. Settings come from (highest wins) the flags below, `GATE_*`
//! environment variables, the `config` file and built-in defaults.
//!
//! ## Try it
//!
//!     mkdir -p www/localhost:3490 && echo hi > www/localhost:3490/index.html
//!     curl http://localhost:3490/

use gatehttpd::Server;
use gatehttpd_core::kprint::{self, LogLevel};
use gatehttpd_core::{kerror, kinfo};
use gatehttpd_runtime::ServerConfig;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};

static RUNNING: AtomicBool = AtomicBool::new(true);

const USAGE: &str = "\
usage: gatehttpd [options] [port]

  -p, --port <port>       listen port (default 3490)
  -r, --root <dir>        document root (default .)
  -c, --config <file>     config file (default ./config, or GATE_CONFIG)
  -t, --threads <n>       task slots; n-1 worker threads (default 8)
  -q, --quiet             log errors only
  -v, --verbose           log every request
  -h, --help              show this help";

/// Command-line overrides, applied on top of the resolved config
#[derive(Default)]
struct Cli {
    port: Option<u16>,
    root: Option<String>,
    config: Option<PathBuf>,
    threads: Option<usize>,
    log_level: Option<LogLevel>,
}

enum Parsed {
    Run(Cli),
    Help,
}

fn value<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> Result<T, String> {
    let raw = args.get(i).ok_or_else(|| format!("{} needs a value", flag))?;
    raw.parse()
        .map_err(|_| format!("invalid value for {}: {}", flag, raw))
}

fn parse_args(args: &[String]) -> Result<Parsed, String> {
    let mut cli = Cli::default();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                i += 1;
                cli.port = Some(value(args, i, "--port")?);
            }
            "--root" | "-r" => {
                i += 1;
                cli.root = Some(value(args, i, "--root")?);
            }
            "--config" | "-c" => {
                i += 1;
                cli.config = Some(value(args, i, "--config")?);
            }
            "--threads" | "-t" => {
                i += 1;
                cli.threads = Some(value(args, i, "--threads")?);
            }
            "--quiet" | "-q" => cli.log_level = Some(LogLevel::Error),
            "--verbose" | "-v" => cli.log_level = Some(LogLevel::Debug),
            "--help" | "-h" => return Ok(Parsed::Help),
            s => match s.parse::<u16>() {
                Ok(port) => cli.port = Some(port),
                Err(_) => return Err(format!("unknown argument: {}", s)),
            },
        }
        i += 1;
    }
    Ok(Parsed::Run(cli))
}

extern "C" fn handle_signal(_sig: libc::c_int) {
    RUNNING.store(false, Ordering::Relaxed);
}

fn install_signal_handlers() -> nix::Result<()> {
    let stop = SigAction::new(
        SigHandler::Handler(handle_signal),
        SaFlags::empty(),
        SigSet::empty(),
    );
    let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
    // SAFETY: the handler only stores to an atomic
    unsafe {
        sigaction(Signal::SIGINT, &stop)?;
        sigaction(Signal::SIGTERM, &stop)?;
        sigaction(Signal::SIGPIPE, &ignore)?;
    }
    Ok(())
}

fn run(cli: Cli) -> Result<(), String> {
    let mut config = ServerConfig::load(cli.config);
    if let Some(port) = cli.port {
        config = config.port(port);
    }
    if let Some(root) = cli.root {
        config = config.root(root);
    }
    if let Some(threads) = cli.threads {
        config = config.num_threads(threads);
    }
    config.validate().map_err(|e| e.to_string())?;
    config.print();

    install_signal_handlers().map_err(|e| format!("signal setup failed: {}", e))?;

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .map_err(|e| format!("bind port {}: {}", config.port, e))?;

    let server = Server::new(&config).map_err(|e| e.to_string())?;
    let served = server.serve(&listener, &RUNNING);
    let stopped = server.shutdown();
    served.and(stopped).map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let cli = match parse_args(&args) {
        Ok(Parsed::Run(cli)) => cli,
        Ok(Parsed::Help) => {
            println!("{}", USAGE);
            return ExitCode::SUCCESS;
        }
        Err(msg) => {
            eprintln!("gatehttpd: {}\n\n{}", msg, USAGE);
            return ExitCode::from(2);
        }
    };

    kprint::init();
    if let Some(level) = cli.log_level {
        kprint::set_log_level(level);
    }

    match run(cli) {
        Ok(()) => {
            kinfo!("stopped");
            ExitCode::SUCCESS
        }
        Err(msg) => {
            kerror!("{}", msg);
            ExitCode::FAILURE
        }
    }
}
