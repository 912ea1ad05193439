use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use peercall::config::Config;
use peercall::log::{LogSink, Logger};
use peercall::signaling::run::run_signaling_server_with_log;
use peercall::signaling::signaling_server::ServerSettings;

#[derive(Parser)]
#[command(name = "signaling_server")]
#[command(about = "Signaling relay for two-party calls")]
struct Cli {
    /// Listen address, `IP:PORT` (or just `IP` together with PORT)
    addr: Option<String>,

    /// Port, when ADDR is a bare IP
    port: Option<u16>,

    /// INI config file with [Signaling] and [Logging] sections
    #[arg(short, long, env = "PEERCALL_CONFIG")]
    config: Option<PathBuf>,

    /// Answer calls to unknown identities with call-failed instead of silence
    #[arg(long)]
    notify_unreachable: bool,

    /// Largest accepted frame body, in bytes
    #[arg(long)]
    max_body_len: Option<usize>,

    /// Directory for the server log (overrides [Logging] server_log_path)
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

/// CLI flags win over the config file.
fn apply_cli(settings: &mut ServerSettings, cli: &Cli) {
    match (&cli.addr, cli.port) {
        (Some(ip), Some(port)) => settings.bind_addr = format!("{ip}:{port}"),
        (Some(addr), None) => settings.bind_addr.clone_from(addr),
        (None, _) => {}
    }
    if cli.notify_unreachable {
        settings.policy.notify_unreachable = true;
    }
    if let Some(max) = cli.max_body_len {
        settings.max_body_len = max;
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match Config::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("[signaling_server] {e}");
                return ExitCode::FAILURE;
            }
        },
        None => Config::empty(),
    };

    let mut settings = ServerSettings::from_config(&config);
    apply_cli(&mut settings, &cli);

    let logger = match &cli.log_dir {
        Some(dir) => Logger::start_in_dir(
            dir,
            "signaling_server",
            peercall::log::logger::DEFAULT_QUEUE_CAPACITY,
            Some(peercall::log::LogLevel::Warn),
        ),
        None => Logger::start_server(&config),
    };
    let log_sink: Arc<dyn LogSink> = Arc::new(logger.handle());

    eprintln!(
        "[signaling_server] starting on {} (log: {})",
        settings.bind_addr,
        logger.file_path().display()
    );

    let result = run_signaling_server_with_log(settings, log_sink);
    logger.close();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("[signaling_server] {e}");
            ExitCode::FAILURE
        }
    }
}
