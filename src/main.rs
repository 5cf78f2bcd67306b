//! Memcrab - A Concurrent In-Memory Cache Server
//!
//! This is the main entry point for the memcrab server.
//! It sets up the TCP listener, cache table, and handles incoming connections.

use memcrab::commands::CommandHandler;
use memcrab::connection::handle_connection;
use memcrab::stats::ServerStats;
use memcrab::storage::{CacheTable, BUCKET_COUNT};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Server configuration
struct Config {
    /// Host to bind to
    host: String,
    /// Port to listen on
    port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: memcrab::DEFAULT_HOST.to_string(),
            port: memcrab::DEFAULT_PORT,
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
                    if i + 1 < args.len() {
                        config.host = args[i + 1].clone();
                        i += 2;
                    } else {
                        eprintln!("Error: --host requires a value");
                        std::process::exit(1);
                    }
                }
                "--port" | "-p" => {
                    if i + 1 < args.len() {
                        config.port = args[i + 1].parse().unwrap_or_else(|_| {
                            eprintln!("Error: invalid port number");
                            std::process::exit(1);
                        });
                        i += 2;
                    } else {
                        eprintln!("Error: --port requires a value");
                        std::process::exit(1);
                    }
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("memcrab version {}", memcrab::VERSION);
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

fn print_help() {
    println!(
        r#"
memcrab - A Concurrent In-Memory Cache Server

USAGE:
    memcrab [OPTIONS]

OPTIONS:
    -h, --host <HOST>    Host to bind to (default: 0.0.0.0)
    -p, --port <PORT>    Port to listen on (default: 11211)
    -v, --version        Print version information
        --help           Print this help message

EXAMPLES:
    memcrab                        # Start on 0.0.0.0:11211
    memcrab --port 11212           # Start on port 11212
    memcrab --host 127.0.0.1       # Listen on loopback only

CONNECTING:
    Any memcached text-protocol client works, or plain netcat:
    $ nc localhost 11211
    set greeting 0 0 5
    hello
    STORED
    get greeting
    VALUE greeting 0 5
    hello
    END
"#
    );
}

fn print_banner(config: &Config) {
    println!(
        r#"
memcrab v{} - Concurrent In-Memory Cache Server
──────────────────────────────────────────────────────────────
Server started on {}
Ready to accept connections.

Use Ctrl+C to shutdown gracefully.
"#,
        memcrab::VERSION,
        config.bind_address()
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = Config::from_args();

    // Set up logging
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    // Print the banner
    print_banner(&config);

    // Stats first; the cache table reports item accounting into it
    let stats = Arc::new(ServerStats::new());

    // Create the cache table (shared across all connections)
    let storage = Arc::new(CacheTable::new(Arc::clone(&stats)));
    info!("Cache table initialized with {} buckets", BUCKET_COUNT);

    // Bind the TCP listener
    let listener = TcpListener::bind(config.bind_address()).await?;
    info!("Listening on {}", config.bind_address());

    // Set up graceful shutdown
    let shutdown = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Shutdown signal received, stopping server...");
    };

    // Main accept loop
    tokio::select! {
        _ = accept_loop(listener, storage, stats) => {}
        _ = shutdown => {}
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Main loop that accepts incoming connections
async fn accept_loop(listener: TcpListener, storage: Arc<CacheTable>, stats: Arc<ServerStats>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                // Create a command handler for this connection
                let handler = CommandHandler::new(Arc::clone(&storage), Arc::clone(&stats));
                let stats = Arc::clone(&stats);

                // Spawn a task to handle this connection
                tokio::spawn(async move {
                    handle_connection(stream, addr, handler, stats).await;
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
