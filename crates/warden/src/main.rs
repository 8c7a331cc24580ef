//! Warden: Hostname Packet Filter
//!
//! Main entry point. Initializes the global allocator, sets up logging,
//! loads the blocklist and runs the packet pump on an already-configured
//! interface until interrupted.

mod config;
mod visits;

use anyhow::{Context, Result};
use clap::Parser;
use config::{DeviceConfig, WardenConfig};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{Subscriber, error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::util::SubscriberInitExt;
use warden_filter::{DomainRegistry, PolicyEngine, load_rules, visit_channel};
use warden_tun::{FdDevice, PacketPump};

// Use mimalloc as the global allocator for reduced memory fragmentation
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

type Connector = Box<dyn FnMut() -> io::Result<FdDevice> + Send>;

/// Drop IPv4 traffic to blocked hostnames
#[derive(Debug, Parser)]
#[command(name = "warden", version, about)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Interface device node to open
    #[arg(long, value_name = "PATH", conflicts_with = "fd")]
    device_path: Option<PathBuf>,

    /// Inherited interface descriptor
    #[arg(long, value_name = "FD")]
    fd: Option<i32>,

    /// Log filter when RUST_LOG is unset
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Extra domain to block (repeatable)
    #[arg(short, long = "block", value_name = "DOMAIN")]
    block: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    init_logging(&config.log_level);
    info!("Warden starting...");
    config.validate().context("Invalid configuration")?;

    let registry = Arc::new(DomainRegistry::with_domains(
        collect_domains(&config, &cli.block).context("Failed to load blocklist")?,
    ));
    info!("Blocking {} domains", registry.len());

    let (sink, visits) = visit_channel(config.reporting.queue_capacity);
    let writer = visits::spawn_writer(visits, config.reporting.format)
        .context("Failed to start visit writer")?;

    let sink = Arc::new(sink);
    let engine = Arc::new(PolicyEngine::new(Arc::clone(&registry), sink.clone()));
    let connector = connector(&config.device, config.pump.poll_interval());
    let mut pump = PacketPump::new(connector, engine, config.pump.clone());
    pump.start().context("Failed to start packet pump")?;

    run_until_shutdown(&pump, &registry, &config, &cli.block).await?;

    pump.stop();
    drop(pump);
    if sink.dropped() > 0 {
        warn!("{} visits were dropped because the queue was full", sink.dropped());
    }
    // Last sender; closes the visit queue
    drop(sink);
    if writer.join().is_err() {
        error!("Visit writer panicked");
    }

    info!("Warden shutting down");
    Ok(())
}

fn load_config(cli: &Cli) -> Result<WardenConfig> {
    let mut config = match &cli.config {
        Some(path) => WardenConfig::load(path)?,
        None => WardenConfig::default(),
    };

    if let Some(path) = &cli.device_path {
        config.device = DeviceConfig {
            path: Some(path.clone()),
            fd: None,
        };
    }
    if let Some(fd) = cli.fd {
        config.device = DeviceConfig {
            path: None,
            fd: Some(fd),
        };
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }

    Ok(config)
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout carries JSON visits
    log_subscriber(filter, io::stderr).init();
}

fn log_subscriber<W>(filter: EnvFilter, writer: W) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(false)
        .compact()
        .finish()
}

/// Configured domains, CLI domains, and every rule of every list file
fn collect_domains(config: &WardenConfig, extra: &[String]) -> Result<Vec<String>> {
    let mut domains = config.blocklist.domains.clone();
    domains.extend(extra.iter().cloned());
    for path in &config.blocklist.files {
        domains.extend(load_rules(path)?);
    }
    Ok(domains)
}

fn connector(device: &DeviceConfig, poll_interval: Duration) -> Connector {
    match (&device.path, device.fd) {
        (Some(path), _) => {
            let path = path.clone();
            Box::new(move || FdDevice::open(&path, poll_interval))
        }
        (None, mut fd) => {
            // A descriptor can be adopted once; a restart needs a fresh one
            Box::new(move || match fd.take() {
                // SAFETY: the descriptor was handed to this process for its
                // exclusive use and is taken out of `fd` so it is adopted once.
                Some(raw) => Ok(unsafe { FdDevice::from_raw_fd(raw, poll_interval) }),
                None => Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    "interface descriptor already consumed",
                )),
            })
        }
    }
}

/// Wait for SIGINT/SIGTERM or for the interface to close; SIGHUP reloads
/// the blocklist.
async fn run_until_shutdown(
    pump: &PacketPump<Connector>,
    registry: &DomainRegistry,
    config: &WardenConfig,
    extra: &[String],
) -> Result<()> {
    let mut hangup = signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;
    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut liveness = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for ctrl-c")?;
                info!("Interrupted");
                return Ok(());
            }
            _ = terminate.recv() => {
                info!("Terminated");
                return Ok(());
            }
            _ = hangup.recv() => reload(registry, config, extra),
            _ = liveness.tick() => {
                if !pump.state().is_running() {
                    warn!("Interface closed, exiting");
                    return Ok(());
                }
            }
        }
    }
}

fn reload(registry: &DomainRegistry, config: &WardenConfig, extra: &[String]) {
    info!("Reloading blocklist");
    match collect_domains(config, extra) {
        Ok(domains) => registry.replace_all(domains),
        Err(e) => warn!("Blocklist reload failed, keeping {} domains: {:#}", registry.len(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::ReportFormat;
    use std::io::Write;
    use std::sync::Mutex;
    use warden_filter::{HostSource, Visit};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_logs_stay_out_of_json_output() {
        let logs = Captured::default();
        let log_writer = logs.clone();
        let subscriber = log_subscriber(EnvFilter::new("trace"), move || log_writer.clone());

        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(Visit::new("example.com", HostSource::Tls, true)).unwrap();
        tx.send(Visit::new("a.b.co", HostSource::Dns, false)).unwrap();
        drop(tx);

        let mut stdout = Vec::new();
        tracing::subscriber::with_default(subscriber, || {
            info!("Blocking 2 domains");
            assert_eq!(visits::write_visits(&rx, ReportFormat::Json, &mut stdout), 2);
            DomainRegistry::new().replace_all(["example.com"]);
        });

        let stdout = String::from_utf8(stdout).unwrap();
        assert_eq!(stdout.lines().count(), 2);
        for line in stdout.lines() {
            assert!(serde_json::from_str::<serde_json::Value>(line).is_ok(), "not JSON: {}", line);
        }

        let logs = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("Blocking 2 domains"));
        assert!(logs.contains("Blocklist replaced"));
        assert!(!logs.contains("\"host\""));
    }

    #[test]
    fn test_cli_overrides_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "log_level = \"warn\"\n[device]\npath = \"/dev/tun0\"").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cli = Cli::parse_from(["warden", "--config", path.as_str(), "--fd", "5", "--block", "x.com"]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.device.fd, Some(5));
        assert_eq!(config.device.path, None);
        assert_eq!(config.log_level, "warn");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_device_flags_conflict() {
        let parsed = Cli::try_parse_from(["warden", "--device-path", "/dev/tun0", "--fd", "3"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_collect_domains_reads_files() {
        let mut list = tempfile::NamedTempFile::new().unwrap();
        writeln!(list, "# ads\n0.0.0.0 ads.example.net\n||tracker.example.org^").unwrap();

        let mut config = WardenConfig::default();
        config.blocklist.domains = vec!["example.com".to_string()];
        config.blocklist.files = vec![list.path().to_path_buf()];

        let registry = DomainRegistry::with_domains(
            collect_domains(&config, &["Extra.Example".to_string()]).unwrap(),
        );
        assert!(registry.contains("example.com"));
        assert!(registry.contains("extra.example"));
        assert!(registry.contains("ads.example.net"));
        assert!(registry.contains("tracker.example.org"));
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_reload_keeps_list_on_error() {
        let registry = DomainRegistry::with_domains(["keep.example"]);
        let mut config = WardenConfig::default();
        config.blocklist.files = vec![PathBuf::from("/nonexistent/list.txt")];

        reload(&registry, &config, &[]);
        assert!(registry.contains("keep.example"));

        config.blocklist.files.clear();
        config.blocklist.domains = vec!["new.example".to_string()];
        reload(&registry, &config, &[]);
        assert!(!registry.contains("keep.example"));
        assert!(registry.contains("new.example"));
    }

    #[test]
    fn test_consumed_descriptor_is_not_reused() {
        let device = DeviceConfig { path: None, fd: None };
        let mut connect = connector(&device, Duration::from_millis(10));
        let err = connect().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
