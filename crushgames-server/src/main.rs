use clap::Parser;
use std::net::SocketAddr;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use crushgames_core::config::GameConfig;
use crushgames_core::{Database, Error};

mod context;
mod routes;

#[derive(Parser, Debug, Clone)]
#[command(name = "crushgames")]
#[command(author, version, about = "Promotional mini-game backend for the pizza shop")]
struct Args {
    /// Address to which the server will bind. Falls back to BIND_ADDR.
    #[arg(long)]
    addr: Option<String>,

    /// Postgres connection URL. Falls back to DATABASE_URL.
    #[arg(long)]
    db_url: Option<String>,
}

fn init_tracing() {
    let filter = EnvFilter::from_default_env()
        .add_directive("crushgames=info".parse().unwrap_or_default());
    let sub = fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(sub)
        .expect("Failed to set global subscriber");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    init_tracing();
    let args = Args::parse();

    if let Err(e) = run_server(args).await {
        error!("Server error: {:?}", e);
    }
    Ok(())
}

async fn run_server(args: Args) -> Result<(), Error> {
    let db_url = args
        .db_url
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| "postgres://crush@localhost:5432/crushgames".to_string());

    let db = Database::new(&db_url).await?;
    db.migrate().await?;

    let config = GameConfig::from_env()?;
    info!(
        "Starting: lock_minutes={}, policy={:?}, dev_routes={}",
        config.lock_minutes,
        config.forced_win_policy(),
        config.dev_routes
    );

    let ctx = context::ServerContext::build(&db, config).await?;

    // First boot: make sure a round exists before anyone plays.
    if ctx.number_game.status().await?.target_value.is_none() {
        let round = ctx.number_game.generate_round().await?;
        info!("Bootstrapped first round with target {}", round.target_value);
    }

    let app = routes::build_router(ctx);

    let addr: SocketAddr = args
        .addr
        .or_else(|| std::env::var("BIND_ADDR").ok())
        .unwrap_or_else(|| "0.0.0.0:8080".to_string())
        .parse()?;
    info!("Game server listening on http://{}", addr);

    let handle = axum_server::Handle::new();
    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received.");
            shutdown_handle.graceful_shutdown(None);
        }
    });

    axum_server::Server::bind(addr)
        .handle(handle)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await?;

    info!("Server shut down.");
    Ok(())
}
