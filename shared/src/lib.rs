use serde::{Deserialize, Serialize};

pub const BOARD_WIDTH: f32 = 800.0;
pub const BOARD_HEIGHT: f32 = 600.0;
pub const PADDLE_WIDTH: f32 = 10.0;
pub const PADDLE_HEIGHT: f32 = 100.0;
pub const LEFT_PADDLE_X: f32 = 50.0;
pub const RIGHT_PADDLE_X: f32 = BOARD_WIDTH - 50.0 - PADDLE_WIDTH;
pub const PADDLE_SPEED: f32 = 300.0;
pub const BALL_RADIUS: f32 = 8.0;
pub const BALL_SERVE_SPEED: f32 = 320.0;
/// Horizontal speed multiplier applied on every paddle hit. Deliberately
/// unbounded over a rally; long exchanges get faster and faster.
pub const BALL_RALLY_ACCELERATION: f32 = 1.03;
/// Band for the randomized vertical serve speed, px/s.
pub const SERVE_VY_MIN: f32 = 40.0;
pub const SERVE_VY_MAX: f32 = 128.0;
pub const TICK_RATE: u32 = 60;
pub const LIVENESS_TIMEOUT_SECS: u64 = 5;

/// One of the two paddle sides. Left is player 1, right is player 2.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    /// Array index for per-side state ([left, right]).
    pub fn index(&self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }

    /// Player number as shown to clients (1 = left, 2 = right).
    pub fn player_number(&self) -> u8 {
        match self {
            Side::Left => 1,
            Side::Right => 2,
        }
    }

    pub fn opponent(&self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    /// The x-position of this side's paddle (left edge).
    pub fn paddle_x(&self) -> f32 {
        match self {
            Side::Left => LEFT_PADDLE_X,
            Side::Right => RIGHT_PADDLE_X,
        }
    }
}

/// A client's current capability: occupying a slot or watching.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Player,
    Spectator,
}

/// Held-key state for one paddle side. Only the slot occupant may change it.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaddleInput {
    pub up: bool,
    pub down: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct Ball {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
}

impl Ball {
    /// A ball served from the center toward the given side. The vertical
    /// component is supplied by the caller (the server randomizes it).
    pub fn serve(toward: Side, vy: f32) -> Self {
        let vx = match toward {
            Side::Left => -BALL_SERVE_SPEED,
            Side::Right => BALL_SERVE_SPEED,
        };
        Ball {
            x: BOARD_WIDTH / 2.0,
            y: BOARD_HEIGHT / 2.0,
            vx,
            vy,
        }
    }
}

/// Occupancy of a player slot as reported in snapshots.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    Connected,
    Open,
}

/// Fire-and-forget client-to-server traffic.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum ControlMessage {
    Input {
        client_id: String,
        side: Side,
        up: bool,
        down: bool,
    },
    Heartbeat {
        client_id: String,
    },
    Pause {
        client_id: String,
        action: PauseAction,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum PauseAction {
    Pause,
    Resume,
}

/// Request half of the negotiation channel. Exactly one response is
/// produced per request; clients keep at most one request in flight.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum NegotiationRequest {
    Connect { client_id: String, role: Role },
    RoleUpdate { client_id: String, role: Role },
}

impl NegotiationRequest {
    pub fn client_id(&self) -> &str {
        match self {
            NegotiationRequest::Connect { client_id, .. } => client_id,
            NegotiationRequest::RoleUpdate { client_id, .. } => client_id,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            NegotiationRequest::Connect { role, .. } => *role,
            NegotiationRequest::RoleUpdate { role, .. } => *role,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum DowngradeReason {
    PlayersOccupied,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationError {
    InvalidRequest,
}

/// Response half of the negotiation channel.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum NegotiationResponse {
    Accepted {
        client_id: String,
        role: Role,
        /// Set when a player slot was granted (1 or 2).
        player_id: Option<u8>,
        /// Set when a player request was downgraded to spectator.
        reason: Option<DowngradeReason>,
    },
    Error {
        client_id: String,
        reason: NegotiationError,
    },
}

/// One broadcast message fully describing simulation state at a tick
/// boundary. Clients render the latest one they have, nothing more.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Snapshot {
    State {
        tick: u64,
        ball: Ball,
        paddles: [f32; 2],
        scores: [u32; 2],
        paused: bool,
        players: [SlotStatus; 2],
        spectator_count: u32,
    },
    Waiting {
        message: String,
        players: [SlotStatus; 2],
        spectator_count: u32,
    },
}

/// Top-level wire frame. The three logical channels (control, broadcast,
/// negotiation) share one UDP socket and are told apart by this tag.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Control(ControlMessage),
    Negotiation(NegotiationRequest),
    NegotiationReply(NegotiationResponse),
    Snapshot(Snapshot),
}

/// Advances one paddle by a fixed timestep and clamps it to the board.
/// Both keys held cancel out rather than stacking.
pub fn step_paddle(y: f32, input: PaddleInput, dt: f32) -> f32 {
    let mut y = y;
    if input.up {
        y -= PADDLE_SPEED * dt;
    }
    if input.down {
        y += PADDLE_SPEED * dt;
    }
    y.clamp(0.0, BOARD_HEIGHT - PADDLE_HEIGHT)
}

/// Advances the ball by a fixed timestep against the given paddle
/// positions: integrates position, bounces off the top/bottom walls,
/// resolves paddle hits, then checks for a goal.
///
/// Returns the side that scored, if any. The caller owns the scoreboard
/// and the re-serve; the ball is left where it crossed the boundary.
pub fn step_ball(ball: &mut Ball, paddles: &[f32; 2], dt: f32) -> Option<Side> {
    ball.x += ball.vx * dt;
    ball.y += ball.vy * dt;

    // Wall bounce, elastic. Clamp back inside so a ball sitting on the
    // boundary never tunnels out.
    if ball.y - BALL_RADIUS <= 0.0 {
        ball.vy = ball.vy.abs();
        ball.y = BALL_RADIUS;
    } else if ball.y + BALL_RADIUS >= BOARD_HEIGHT {
        ball.vy = -ball.vy.abs();
        ball.y = BOARD_HEIGHT - BALL_RADIUS;
    }

    for side in Side::BOTH {
        resolve_paddle_hit(ball, side, paddles[side.index()]);
    }

    if ball.x < 0.0 {
        Some(Side::Right)
    } else if ball.x > BOARD_WIDTH {
        Some(Side::Left)
    } else {
        None
    }
}

/// Reverses and speeds up the ball when its leading edge is inside the
/// paddle's horizontal band, moving toward that side, and vertically
/// within the paddle's span. The upper half of the paddle deflects the
/// ball upward, the lower half downward, regardless of incoming vy; this
/// is what gives the occupant aim control.
fn resolve_paddle_hit(ball: &mut Ball, side: Side, paddle_y: f32) {
    let (in_band, moving_toward) = match side {
        Side::Left => {
            let edge = ball.x - BALL_RADIUS;
            (
                edge >= LEFT_PADDLE_X && edge <= LEFT_PADDLE_X + PADDLE_WIDTH,
                ball.vx < 0.0,
            )
        }
        Side::Right => {
            let edge = ball.x + BALL_RADIUS;
            (
                edge >= RIGHT_PADDLE_X && edge <= RIGHT_PADDLE_X + PADDLE_WIDTH,
                ball.vx > 0.0,
            )
        }
    };

    let overlapping = paddle_y <= ball.y && ball.y <= paddle_y + PADDLE_HEIGHT;
    if !(in_band && moving_toward && overlapping) {
        return;
    }

    ball.vx = -ball.vx * BALL_RALLY_ACCELERATION;

    let center = paddle_y + PADDLE_HEIGHT / 2.0;
    if ball.y < center {
        ball.vy = -ball.vy.abs();
    } else {
        ball.vy = ball.vy.abs();
    }
}
