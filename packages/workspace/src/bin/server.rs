use pagecraft_workspace::{router, AppState, ServerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let mut config = ServerConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                if i + 1 < args.len() {
                    config.http_port = args[i + 1].parse().expect("Invalid port number");
                    i += 2;
                } else {
                    eprintln!("--port requires a value");
                    std::process::exit(1);
                }
            }
            "--db" => {
                if i + 1 < args.len() {
                    config.database = Some(PathBuf::from(&args[i + 1]));
                    i += 2;
                } else {
                    eprintln!("--db requires a value");
                    std::process::exit(1);
                }
            }
            "--stale-after" => {
                if i + 1 < args.len() {
                    config.stale_after_minutes =
                        args[i + 1].parse().expect("Invalid minute count");
                    i += 2;
                } else {
                    eprintln!("--stale-after requires a value");
                    std::process::exit(1);
                }
            }
            "--node" => {
                if i + 1 < args.len() {
                    config.node_affinity = args[i + 1].clone();
                    i += 2;
                } else {
                    eprintln!("--node requires a value");
                    std::process::exit(1);
                }
            }
            "--help" | "-h" => {
                println!("Usage: pagecraft-server [OPTIONS] [SPOOL_DIR]");
                println!();
                println!("Options:");
                println!("  -p, --port <PORT>         HTTP port to listen on (default: 3030)");
                println!("  --db <PATH>               SQLite session database (default: in-memory)");
                println!("  --stale-after <MINUTES>   Idle minutes before the staleness advisory (default: 15)");
                println!("  --node <NAME>             Node name stamped on sessions (default: node-local)");
                println!("  -h, --help                Show this help message");
                println!();
                println!("Arguments:");
                println!("  [SPOOL_DIR]               Directory of spooled package manifests (default: packages)");
                std::process::exit(0);
            }
            arg if !arg.starts_with('-') => {
                config.spool_dir = PathBuf::from(arg);
                i += 1;
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                std::process::exit(1);
            }
        }
    }

    println!("Starting Pagecraft workspace server...");
    println!("Spool directory: {:?}", config.spool_dir);
    match &config.database {
        Some(path) => println!("Session store: {:?}", path),
        None => println!("Session store: in-memory"),
    }
    println!("HTTP listening on 127.0.0.1:{}", config.http_port);

    let state = Arc::new(AppState::from_config(&config).await?);
    let app = router(state).layer(CorsLayer::permissive());

    let listener =
        tokio::net::TcpListener::bind(format!("127.0.0.1:{}", config.http_port)).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
