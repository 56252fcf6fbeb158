use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use fleetscan::{
    cache::{ArtifactCache, FsCache},
    config::Config,
    detector::{AdvisoryStore, Detector, DriverRegistry, MemoryAdvisoryStore, OsFamily, SupportWindow},
    model::{Report, Severity},
    output::{format_report_to_string, print_report, OutputFormat},
    rpc::{self, AppState, RemoteCache, RemoteScanner},
    runner::Runner,
    scanner::{Inventory, InventoryInspector, LocalScanner, ScanDriver},
    source::{ArtifactSource, ClusterSource, StaticLister, StaticSource},
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Exit codes for CI integration
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const CRITICAL_VULN: u8 = 2;
    pub const HIGH_VULN: u8 = 3;
    pub const MEDIUM_VULN: u8 = 4;
    pub const LOW_VULN: u8 = 5;
    pub const PARTIAL: u8 = 6;
    pub const ERROR: u8 = 1;
}

#[derive(Parser)]
#[command(name = "fleetscan")]
#[command(
    author,
    version,
    about = "Detect vulnerable OS packages across images, filesystems and cluster workloads"
)]
struct Cli {
    /// Config file (default: platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the artifacts of a package inventory
    Scan {
        /// Inventory JSON produced by the analysis layer
        inventory: PathBuf,

        /// Enumerate artifacts from an exported cluster workload list instead
        #[arg(long)]
        workloads: Option<PathBuf>,

        /// Restrict cluster scanning to one namespace
        #[arg(long, requires = "workloads")]
        namespace: Option<String>,

        /// Advisory snapshot JSON used for local detection
        #[arg(long)]
        advisories: Option<PathBuf>,

        /// Scan through a remote scan server at this URL
        #[arg(long)]
        server: Option<String>,

        /// Token presented to the scan server
        #[arg(long, env = "FLEETSCAN_TOKEN")]
        token: Option<String>,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,

        /// Write output to file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Exit with error if vulnerabilities at or above this severity are found
        #[arg(long, value_enum)]
        fail_on: Option<FailLevel>,

        /// Number of artifacts scanned in parallel
        #[arg(long)]
        concurrency: Option<usize>,

        /// Per-artifact timeout in seconds (0 disables)
        #[arg(long)]
        timeout: Option<u64>,

        /// Vulnerability types to report, comma separated (os, library)
        #[arg(long, value_delimiter = ',')]
        vuln_type: Option<Vec<String>>,

        /// Security checks to run, comma separated (vuln, config, secret, license)
        #[arg(long, value_delimiter = ',')]
        security_checks: Option<Vec<String>>,

        /// Keep packages removed by later layers
        #[arg(long)]
        scan_removed_packages: bool,

        /// Include every package in the report, not only vulnerable ones
        #[arg(long)]
        list_all_packages: bool,

        /// Target platform (os/arch[/variant])
        #[arg(long)]
        platform: Option<String>,
    },

    /// Run the remote scan server
    Server {
        /// Address to listen on
        #[arg(long)]
        listen: Option<String>,

        /// Advisory snapshot JSON
        #[arg(long)]
        advisories: Option<PathBuf>,

        /// Directory of the shared artifact cache
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Require this token from clients
        #[arg(long, env = "FLEETSCAN_TOKEN")]
        token: Option<String>,
    },

    /// List supported OS families
    Families,

    /// Show or create config file
    Config {
        /// Generate default config file
        #[arg(long)]
        init: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Clear the local artifact cache
    ClearCache,
}

#[derive(Clone, Copy, ValueEnum)]
enum FailLevel {
    Critical,
    High,
    Medium,
    Low,
}

impl FailLevel {
    fn threshold(self) -> Severity {
        match self {
            FailLevel::Critical => Severity::Critical,
            FailLevel::High => Severity::High,
            FailLevel::Medium => Severity::Medium,
            FailLevel::Low => Severity::Low,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fleetscan=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

async fn run() -> Result<u8> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load_or_default(),
    };

    match cli.command {
        Commands::Scan {
            inventory,
            workloads,
            namespace,
            advisories,
            server,
            token,
            format,
            output,
            fail_on,
            concurrency,
            timeout,
            vuln_type,
            security_checks,
            scan_removed_packages,
            list_all_packages,
            platform,
        } => {
            let mut config = config;
            if let Some(n) = concurrency {
                config.concurrency = n;
            }
            if let Some(secs) = timeout {
                config.artifact_timeout_secs = secs;
            }
            if server.is_some() {
                config.remote.url = server;
            }
            if token.is_some() {
                config.remote.token = token;
            }

            let options = &mut config.options;
            if let Some(types) = vuln_type {
                options.vuln_type = types;
            }
            if let Some(checks) = security_checks {
                options.security_checks = checks;
            }
            options.scan_removed_packages |= scan_removed_packages;
            options.list_all_packages |= list_all_packages;
            if platform.is_some() {
                options.platform = platform;
            }

            let request = ScanArgs {
                inventory,
                workloads,
                namespace,
                advisories,
                format: OutputFormat::from_str(&format).map_err(|e| anyhow::anyhow!(e))?,
                output,
                fail_on,
            };
            run_scan(&config, request).await
        }
        Commands::Server {
            listen,
            advisories,
            cache_dir,
            token,
        } => {
            run_server(&config, listen, advisories, cache_dir, token).await?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::Families => {
            list_families();
            Ok(exit_codes::SUCCESS)
        }
        Commands::Config { init, path } => {
            handle_config(cli.config.as_deref(), init, path)?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::ClearCache => {
            let cache = FsCache::with_dir(config.cache_dir());
            cache.clear().await?;
            println!("Cache cleared.");
            Ok(exit_codes::SUCCESS)
        }
    }
}

struct ScanArgs {
    inventory: PathBuf,
    workloads: Option<PathBuf>,
    namespace: Option<String>,
    advisories: Option<PathBuf>,
    format: OutputFormat,
    output: Option<PathBuf>,
    fail_on: Option<FailLevel>,
}

async fn run_scan(config: &Config, args: ScanArgs) -> Result<u8> {
    let is_interactive = args.format == OutputFormat::Table && args.output.is_none();
    let inventory = Inventory::load(&args.inventory)?;

    let source: Box<dyn ArtifactSource> = match &args.workloads {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read workloads {}", path.display()))?;
            let lister: StaticLister = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse workloads {}", path.display()))?;
            let mut source = ClusterSource::new(lister);
            if let Some(ns) = &args.namespace {
                source = source.with_namespace(ns);
            }
            Box::new(source)
        }
        None => Box::new(StaticSource::new(
            args.inventory.display().to_string(),
            inventory.artifacts(),
        )),
    };

    let (cache, scanner): (Arc<dyn ArtifactCache>, Arc<dyn ScanDriver>) = match &config.remote.url
    {
        Some(url) => {
            let mut cache = RemoteCache::new(url)?;
            let mut scanner = RemoteScanner::new(url)?;
            if let Some(token) = &config.remote.token {
                let header = Some(config.server.token_header.as_str());
                cache = cache.with_token(header, token.clone());
                scanner = scanner.with_token(header, token.clone());
            }
            tracing::info!(server = %url, "Scanning through remote server");
            (Arc::new(cache), Arc::new(scanner))
        }
        None => {
            let cache: Arc<dyn ArtifactCache> = Arc::new(FsCache::with_dir(config.cache_dir()));
            let detector = load_detector(args.advisories.as_deref())?;
            let scanner = LocalScanner::new(cache.clone(), detector);
            (cache, Arc::new(scanner))
        }
    };

    let inspector = Arc::new(InventoryInspector::new(cache, inventory));
    let timeout = match config.artifact_timeout_secs {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };
    let runner = Runner::new(inspector, scanner, config.options.clone())
        .with_concurrency(config.concurrency)
        .with_timeout(timeout)
        .with_ignore(config.ignore.clone());

    let progress = if is_interactive {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message(format!("Scanning {}...", source.context()));
        Some(pb)
    } else {
        None
    };

    let report = runner.run(source.as_ref()).await;

    if let Some(pb) = progress {
        match &report {
            Ok(report) => pb.finish_with_message(format!(
                "Scanned {} artifacts, found {} vulnerabilities",
                report.results.len(),
                report.vulnerability_count()
            )),
            Err(_) => pb.finish_and_clear(),
        }
    }
    let report = report?;

    if let Some(path) = &args.output {
        std::fs::write(path, format_report_to_string(&report, args.format)?)?;
        println!("Results written to: {}", path.display());
    } else {
        print_report(&report, args.format)?;
    }

    Ok(determine_exit_code(&report, args.fail_on))
}

fn load_detector(advisories: Option<&Path>) -> Result<Detector> {
    let store: Arc<dyn AdvisoryStore> = match advisories {
        Some(path) => Arc::new(MemoryAdvisoryStore::load(path)?),
        None => {
            tracing::warn!("No advisory snapshot given; detection will report no vulnerabilities");
            Arc::new(MemoryAdvisoryStore::new())
        }
    };
    Ok(Detector::new(DriverRegistry::with_advisories(store).build()))
}

async fn run_server(
    config: &Config,
    listen: Option<String>,
    advisories: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    token: Option<String>,
) -> Result<()> {
    let listen = listen.unwrap_or_else(|| config.server.listen.clone());
    let cache_dir = cache_dir.unwrap_or_else(|| config.cache_dir());
    let cache: Arc<dyn ArtifactCache> = Arc::new(FsCache::with_dir(&cache_dir));
    let detector = load_detector(advisories.as_deref())?;

    let mut state = AppState::new(LocalScanner::new(cache.clone(), detector), cache);
    if let Some(token) = token.or_else(|| config.server.token.clone()) {
        state = state.with_token(&config.server.token_header, token)?;
    }

    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .with_context(|| format!("Failed to bind {}", listen))?;
    tracing::info!(cache = %cache_dir.display(), "Using artifact cache");
    rpc::serve(listener, state, rpc::shutdown_signal()).await?;
    Ok(())
}

/// Determine the exit code based on vulnerabilities found and --fail-on setting
fn determine_exit_code(report: &Report, fail_on: Option<FailLevel>) -> u8 {
    if let (Some(level), Some(max)) = (fail_on, report.max_severity()) {
        if max >= level.threshold() {
            return match max {
                Severity::Critical => exit_codes::CRITICAL_VULN,
                Severity::High => exit_codes::HIGH_VULN,
                Severity::Medium => exit_codes::MEDIUM_VULN,
                _ => exit_codes::LOW_VULN,
            };
        }
    }

    if report.is_complete() {
        exit_codes::SUCCESS
    } else {
        exit_codes::PARTIAL
    }
}

fn list_families() {
    println!("Supported OS families:");
    println!();

    let now = chrono::Utc::now();
    for family in OsFamily::ALL {
        let releases = SupportWindow::for_family(family).supported_releases(now);
        let supported = if releases.is_empty() {
            "none".to_string()
        } else {
            releases.join(", ")
        };

        println!("  {:<30} {}", family.as_str(), family.display_name());
        println!("  {:<30} Supported releases: {}", "", supported);
        println!();
    }
}

fn handle_config(explicit: Option<&Path>, init: bool, show_path: bool) -> Result<()> {
    let config_path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::config_path);

    if show_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            println!("Config file already exists at: {}", config_path.display());
            return Ok(());
        }

        Config::default().save_to(&config_path)?;
        println!("Created config file at: {}", config_path.display());
        println!();
        println!("Default configuration:");
        println!("{}", Config::generate_default_config());
        return Ok(());
    }

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        println!("Config file: {}", config_path.display());
        println!();
        println!("{}", content);
    } else {
        println!("No config file found.");
        println!("Run 'fleetscan config --init' to create one.");
        println!();
        println!("Config path: {}", config_path.display());
    }

    Ok(())
}
