mod input;
mod network;
mod rendering;

use clap::{Parser, ValueEnum};
use log::{error, info, warn};
use macroquad::prelude::*;
use shared::{PauseAction, Role, Snapshot};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:5555")]
    server: String,

    /// Client identifier sent to the server (generated when omitted)
    #[arg(short, long)]
    name: Option<String>,

    /// Requested role
    #[arg(short, long, value_enum, default_value = "player")]
    role: RoleArg,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum RoleArg {
    Player,
    Spectator,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Role {
        match role {
            RoleArg::Player => Role::Player,
            RoleArg::Spectator => Role::Spectator,
        }
    }
}

/// Unique-enough id for one connection attempt.
fn generated_client_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    format!("client-{}-{}", std::process::id(), nanos)
}

fn window_conf() -> Conf {
    Conf {
        window_title: "Pong".to_string(),
        window_width: shared::BOARD_WIDTH as i32,
        window_height: shared::BOARD_HEIGHT as i32,
        window_resizable: false,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let client_id = args.name.clone().unwrap_or_else(generated_client_id);

    info!("Connecting to {} as {}", args.server, client_id);
    info!("Controls: W/S or arrow keys to move, P to pause");

    let mut connection =
        match network::Connection::connect(&args.server, client_id, args.role.into()) {
            Ok(connection) => connection,
            Err(e) => {
                error!("Connection failed: {}", e);
                return;
            }
        };

    let session = connection.session();
    let label = match (session.role, session.side) {
        (Role::Player, Some(side)) => format!("You: Player {}", side.player_number()),
        _ => "Spectating".to_string(),
    };

    let mut input_manager = input::InputManager::new();
    let renderer = rendering::Renderer::new();

    loop {
        connection.poll();

        let frame = input_manager.update();

        if frame.pause_toggled {
            let currently_paused = matches!(
                connection.latest_snapshot(),
                Some(Snapshot::State { paused: true, .. })
            );
            let action = if currently_paused {
                PauseAction::Resume
            } else {
                PauseAction::Pause
            };
            if let Err(e) = connection.send_pause(action) {
                warn!("Failed to send pause request: {}", e);
            }
        }

        if let Err(e) = connection.send_input(frame.up, frame.down) {
            warn!("Failed to send input: {}", e);
        }

        renderer.render(connection.latest_snapshot(), &label);

        next_frame().await;
    }
}
