//! TideKV - An In-Memory, Redis-Compatible String and List Server
//!
//! This is the main entry point for the TideKV server.
//! It parses flags, sets up logging and the shared server state, and accepts
//! connections until Ctrl+C or a client's `SHUTDOWN`.

use anyhow::Context;
use std::sync::Arc;
use tidekv::connection::handle_connection;
use tidekv::server::{Server, ServerOptions};
use tidekv::storage::{ExpiryConfig, ExpirySweeper, DEFAULT_DATABASES};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Server configuration
struct Config {
    /// Host to bind to
    host: String,
    /// Port to listen on
    port: u16,
    /// Initial `requirepass`
    requirepass: String,
    /// Number of logical databases
    databases: usize,
    /// Run the background expiry sweeper
    active_expire: bool,
    /// Log filter used when `RUST_LOG` is unset
    log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: tidekv::DEFAULT_HOST.to_string(),
            port: tidekv::DEFAULT_PORT,
            requirepass: String::new(),
            databases: DEFAULT_DATABASES,
            active_expire: false,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--host" | "-h" => {
                    config.host = flag_value(&args, i, "--host").to_string();
                    i += 2;
                }
                "--port" | "-p" => {
                    config.port = flag_value(&args, i, "--port").parse().unwrap_or_else(|_| {
                        eprintln!("Error: invalid port number");
                        std::process::exit(1);
                    });
                    i += 2;
                }
                "--requirepass" => {
                    config.requirepass = flag_value(&args, i, "--requirepass").to_string();
                    i += 2;
                }
                "--databases" => {
                    config.databases = flag_value(&args, i, "--databases")
                        .parse()
                        .ok()
                        .filter(|&n: &usize| n >= 1)
                        .unwrap_or_else(|| {
                            eprintln!("Error: --databases must be a positive integer");
                            std::process::exit(1);
                        });
                    i += 2;
                }
                "--active-expire" => {
                    config.active_expire = true;
                    i += 1;
                }
                "--log-level" => {
                    config.log_level = flag_value(&args, i, "--log-level").to_string();
                    i += 2;
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("TideKV version {}", tidekv::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        config
    }

    /// Returns the bind address as a string
    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// The value following the flag at `args[i]`; exits if there is none.
fn flag_value<'a>(args: &'a [String], i: usize, flag: &str) -> &'a str {
    match args.get(i + 1) {
        Some(value) => value,
        None => {
            eprintln!("Error: {} requires a value", flag);
            std::process::exit(1);
        }
    }
}

fn print_help() {
    println!(
        r#"
TideKV - An In-Memory, Redis-Compatible String and List Server

USAGE:
    tidekv [OPTIONS]

OPTIONS:
    -h, --host <HOST>           Host to bind to (default: 127.0.0.1)
    -p, --port <PORT>           Port to listen on (default: 6379)
        --requirepass <PASS>    Require AUTH with this password (default: none)
        --databases <N>         Number of databases (default: 16)
        --active-expire         Reclaim expired keys in the background
        --log-level <FILTER>    Log filter when RUST_LOG is unset (default: info)
    -v, --version               Print version information
        --help                  Print this help message

EXAMPLES:
    tidekv                             # Start on 127.0.0.1:6379
    tidekv --port 6380                 # Start on port 6380
    tidekv --requirepass s3cret        # Require AUTH s3cret
    tidekv --log-level debug           # Log every request

CONNECTING:
    Use redis-cli or any Redis client to connect:
    $ redis-cli -p 6379
    127.0.0.1:6379> RPUSH jobs a b c
    (integer) 3
    127.0.0.1:6379> LRANGE jobs 0 -1
    1) "a"
    2) "b"
    3) "c"
"#
    );
}

fn print_banner(config: &Config) {
    println!(
        r#"
TideKV v{} - In-Memory String and List Server
──────────────────────────────────────────────────────────────
Server started on {}
Databases: {}    Auth: {}    Active expiry: {}
Ready to accept connections.

Use Ctrl+C to shutdown gracefully.
"#,
        tidekv::VERSION,
        config.bind_address(),
        config.databases,
        if config.requirepass.is_empty() { "off" } else { "on" },
        if config.active_expire { "on" } else { "off" },
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = Config::from_args();

    // Set up logging: RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    print_banner(&config);

    let server = Arc::new(Server::new(ServerOptions {
        databases: config.databases,
        requirepass: config.requirepass.clone(),
    }));
    info!("{} databases initialized", server.databases().len());

    let _sweeper = config
        .active_expire
        .then(|| ExpirySweeper::start(Arc::clone(server.databases()), ExpiryConfig::default()));

    // Bind the TCP listener
    let listener = TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;
    info!("Listening on {}", config.bind_address());

    let mut shutdown_rx = server.subscribe_shutdown();
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received, stopping server...");
    };

    tokio::select! {
        _ = accept_loop(listener, Arc::clone(&server)) => {}
        _ = ctrl_c => server.shutdown(),
        _ = shutdown_rx.changed() => info!("SHUTDOWN received, stopping server..."),
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Main loop that accepts incoming connections
async fn accept_loop(listener: TcpListener, server: Arc<Server>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                tokio::spawn(handle_connection(stream, addr, Arc::clone(&server)));
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
