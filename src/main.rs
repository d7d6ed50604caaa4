//! REST gateway for Neon (serverless Postgres).
//!
//! # Usage
//! ```bash
//! neon-gateway serve             # Serve in the foreground
//! neon-gateway serve --daemon    # Serve in the background
//! neon-gateway stop              # Stop the background server
//! neon-gateway status            # Query /health
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use neon_gateway::config::{Config, DEFAULT_LISTEN_ADDR};
use std::net::SocketAddr;
use std::path::Path;
use std::process::Command;

const DEFAULT_PID_FILE: &str = "~/.neon-gateway/gateway.pid";
const PROCESS_NAME: &str = "neon-gateway";

#[derive(Parser)]
#[command(name = "neon-gateway")]
#[command(about = "REST gateway over the Neon control-plane and SQL APIs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Listen address (default: LISTEN_ADDR or 0.0.0.0:3000)
        #[arg(short, long)]
        listen: Option<SocketAddr>,

        /// Run in the background
        #[arg(short, long)]
        daemon: bool,

        /// PID file written in daemon mode
        #[arg(short, long, default_value = DEFAULT_PID_FILE)]
        pid_file: String,
    },

    /// Stop the background server
    Stop {
        /// PID file
        #[arg(short, long, default_value = DEFAULT_PID_FILE)]
        pid_file: String,
    },

    /// Check server status
    Status {
        /// Address the server listens on
        #[arg(short, long, default_value = DEFAULT_LISTEN_ADDR)]
        listen: SocketAddr,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            listen,
            daemon,
            pid_file,
        } => cmd_serve(listen, daemon, pid_file),
        Commands::Stop { pid_file } => cmd_stop(pid_file),
        Commands::Status { listen } => cmd_status(listen),
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "neon_gateway=info,tower_http=info".into()),
        )
        .init();
}

/// Single-threaded runtime. Must be built after any fork.
fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")
}

fn cmd_serve(listen: Option<SocketAddr>, daemon: bool, pid_file: String) -> Result<()> {
    // Validate configuration BEFORE fork so failures reach the terminal
    let config = Config::from_env().context("Invalid configuration")?;

    if !daemon {
        init_tracing();
        return runtime()?.block_on(neon_gateway::server::run(config, listen));
    }

    let pid_path = shellexpand::tilde(&pid_file).to_string();
    if let Some(parent) = Path::new(&pid_path).parent() {
        std::fs::create_dir_all(parent).context("Failed to create PID file directory")?;
    }

    println!("Starting neon-gateway in the background...");
    println!("Listen: {}", listen.unwrap_or(config.listen_addr));
    println!("PID file: {}", pid_path);

    use daemonize::Daemonize;

    let daemonize = Daemonize::new()
        .pid_file(&pid_path)
        .working_directory("/tmp");

    match daemonize.start() {
        Ok(_) => {
            // Child process: logging and runtime only after fork
            init_tracing();
            runtime()?.block_on(neon_gateway::server::run(config, listen))
        }
        Err(e) => {
            eprintln!("Failed to daemonize: {}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_stop(pid_file: String) -> Result<()> {
    let pid_path = shellexpand::tilde(&pid_file).to_string();

    let pid_str = std::fs::read_to_string(&pid_path)
        .context("Failed to read PID file - server may not be running")?;
    let pid: i32 = pid_str.trim().parse().context("Invalid PID in file")?;

    if !pid_matches_process(pid, PROCESS_NAME) {
        anyhow::bail!("Refusing to stop PID {}: unexpected process", pid);
    }

    println!("Stopping neon-gateway (PID: {})...", pid);

    // SIGTERM triggers graceful shutdown
    let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
    if rc != 0 {
        anyhow::bail!(
            "Failed to signal PID {}: {}",
            pid,
            std::io::Error::last_os_error()
        );
    }

    std::thread::sleep(std::time::Duration::from_millis(500));
    if let Err(e) = remove_pid_file(Path::new(&pid_path)) {
        eprintln!("Warning: failed to remove PID file {}: {}", pid_path, e);
    }

    println!("Server stopped.");

    Ok(())
}

/// Removes the PID file. A file already gone (the daemon cleaned up after
/// itself) is not an error.
fn remove_pid_file(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn pid_matches_process(pid: i32, expected_name: &str) -> bool {
    let output = Command::new("ps")
        .args(["-p", &pid.to_string(), "-o", "comm="])
        .output();

    match output {
        Ok(output) if output.status.success() => {
            let command = String::from_utf8_lossy(&output.stdout);
            command.trim().contains(expected_name)
        }
        _ => false,
    }
}

fn cmd_status(listen: SocketAddr) -> Result<()> {
    let url = format!("http://{}/health", loopback_for(listen));

    let result = runtime()?.block_on(async {
        let response = reqwest::get(&url).await?;
        response.json::<serde_json::Value>().await
    });

    match result {
        Ok(health) => {
            println!("Status: RUNNING");
            println!("Address: {}", listen);
            println!("Health: {}", health);
        }
        Err(e) => {
            println!("Status: NOT RESPONDING");
            println!("Request to {} failed: {}", url, e);
        }
    }

    Ok(())
}

/// Wildcard bind addresses are reached through loopback.
fn loopback_for(addr: SocketAddr) -> SocketAddr {
    let mut addr = addr;
    if addr.ip().is_unspecified() {
        addr.set_ip(match addr {
            SocketAddr::V4(_) => std::net::Ipv4Addr::LOCALHOST.into(),
            SocketAddr::V6(_) => std::net::Ipv6Addr::LOCALHOST.into(),
        });
    }
    addr
}
