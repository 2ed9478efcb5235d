use clap::{Parser, ValueEnum};
use log::{error, info};
use server::network::Server;
use shared::Side;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "5555")]
    port: u16,

    /// Tick rate (simulation steps per second)
    #[arg(short, long, default_value_t = shared::TICK_RATE)]
    tick_rate: u32,

    /// Reserve a paddle side for local control instead of a remote player
    #[arg(short, long, value_enum)]
    reserve: Option<ReservedSide>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum ReservedSide {
    Left,
    Right,
}

impl From<ReservedSide> for Side {
    fn from(side: ReservedSide) -> Side {
        match side {
            ReservedSide::Left => Side::Left,
            ReservedSide::Right => Side::Right,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let address = format!("{}:{}", args.host, args.port);
    let tick_duration = Duration::from_secs_f32(1.0 / args.tick_rate as f32);

    let mut server = Server::new(&address, tick_duration, args.reserve.map(Side::from)).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server exited with error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
