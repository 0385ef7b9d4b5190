//! wasisock CLI entry point.
//!
//! - `wasisock fetch <url>`: HTTP GET through the blocking socket adapter
//! - `wasisock run <module>`: execute a WebAssembly guest with socket imports

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use wasisock_common::{ConfigFile, SocketConfig};
use wasisock_core::{ConnectPolicy, GuardedProvider, Permissions, StdProvider, compat};
use wasisock_host::{CompiledModule, GuestContext, InstanceRunner, WasmEngine, create_store};
use wasisock_http::HttpClient;

#[derive(Debug, Parser)]
#[command(version, about = "Blocking sockets for WebAssembly-hosted interpreters")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "WASISOCK_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch a URL over plain HTTP and write the body to stdout
    Fetch {
        /// `http://` URL to request
        url: String,

        /// Nominal socket timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Host patterns to allow, replacing the configured list
        #[arg(long = "allow-host", value_name = "PATTERN")]
        allow_hosts: Vec<String>,

        /// Try every resolved address instead of only the first
        #[arg(long)]
        all_candidates: bool,
    },

    /// Run a WebAssembly module with the socket imports available
    Run {
        /// `.wasm` or `.wat` file
        module: PathBuf,

        /// Exported function to call
        #[arg(long)]
        entry: Option<String>,

        /// Host patterns to allow, replacing the configured list
        #[arg(long = "allow-host", value_name = "PATTERN")]
        allow_hosts: Vec<String>,

        /// Fuel limit, enabling metering
        #[arg(long)]
        max_fuel: Option<u64>,

        /// Arguments passed to the guest
        #[arg(last = true)]
        args: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ConfigFile::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => ConfigFile::default(),
    };

    init_tracing(&config.logging.filter, cli.log_json || config.logging.json);

    compat::set_default_timeout(config.runtime.sockets.default_timeout());

    match cli.command {
        Command::Fetch {
            url,
            timeout,
            allow_hosts,
            all_candidates,
        } => {
            apply_allow_hosts(&mut config.runtime.sockets, allow_hosts);
            config.runtime.sockets.try_all_candidates |= all_candidates;
            fetch(&config.runtime.sockets, &url, timeout.map(Duration::from_secs))
        }
        Command::Run {
            module,
            entry,
            allow_hosts,
            max_fuel,
            args,
        } => {
            apply_allow_hosts(&mut config.runtime.sockets, allow_hosts);
            if let Some(entry) = entry {
                config.runtime.execution.entry_point = entry;
            }
            if let Some(max_fuel) = max_fuel {
                config.runtime.execution.max_fuel = max_fuel;
                config.runtime.execution.fuel_metering = true;
            }

            let code = run(&config, &module, args)?;
            if code != 0 {
                std::process::exit(code);
            }
            Ok(())
        }
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured filter.
/// Logs go to stderr so `fetch` output stays clean.
fn init_tracing(filter: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let (json_layer, text_layer) = if json {
        (Some(fmt::layer().json().with_writer(std::io::stderr)), None)
    } else {
        (None, Some(fmt::layer().with_writer(std::io::stderr)))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

fn apply_allow_hosts(sockets: &mut SocketConfig, allow_hosts: Vec<String>) {
    if !allow_hosts.is_empty() {
        sockets.allowed_hosts = allow_hosts;
    }
}

fn provider(sockets: &SocketConfig) -> GuardedProvider<StdProvider> {
    GuardedProvider::new(
        StdProvider::from_config(sockets),
        Permissions::from_config(sockets),
    )
}

fn fetch(sockets: &SocketConfig, url: &str, timeout: Option<Duration>) -> anyhow::Result<()> {
    let mut client = HttpClient::new(provider(sockets)).with_policy(ConnectPolicy::from(sockets));
    if let Some(timeout) = timeout.or_else(compat::default_timeout) {
        client = client.with_timeout(timeout);
    }

    let response = client
        .get(url)
        .with_context(|| format!("Failed to fetch {url}"))?;

    std::io::stdout()
        .lock()
        .write_all(&response.body)
        .context("Failed to write response body")?;

    if !response.is_success() {
        anyhow::bail!("{url} returned {} {}", response.status, response.reason);
    }
    Ok(())
}

fn run(config: &ConfigFile, path: &Path, args: Vec<String>) -> anyhow::Result<i32> {
    let runtime = &config.runtime;

    let engine = WasmEngine::new(&runtime.engine).context("Failed to create engine")?;
    let module = CompiledModule::from_file(engine.inner(), path)
        .with_context(|| format!("Failed to load module {}", path.display()))?;
    let runner = InstanceRunner::new(&engine).context("Failed to link host functions")?;

    if !module.uses_sockets() {
        warn!(module = %path.display(), "Module does not import any socket functions");
    }

    let mut argv = vec![path.display().to_string()];
    argv.extend(args);

    let context = GuestContext::new(Arc::new(provider(&runtime.sockets)), &runtime.execution, &argv);
    let mut store = create_store(&engine, &runtime.execution, context)
        .context("Failed to create store")?;

    let result = runner
        .execute(&module, &mut store, &runtime.execution.entry_point)
        .with_context(|| format!("Failed to execute {}", path.display()))?;

    let metrics = &store.data().metrics;
    let duration = metrics.duration.unwrap_or_default();
    info!(
        module_hash = %module.content_hash(),
        exit_code = result.exit_code(),
        sockets_opened = metrics.sockets_opened,
        bytes_sent = metrics.bytes_sent,
        bytes_received = metrics.bytes_received,
        fuel_consumed = metrics.fuel_consumed,
        duration_ms = duration.as_millis(),
        "Guest finished"
    );

    if let wasisock_host::ExecutionResult::Trap { message, .. } = &result {
        warn!(trap = %message, "Guest trapped");
    }

    Ok(result.exit_code())
}
