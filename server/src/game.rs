use log::info;
use rand::Rng;
use shared::{
    step_ball, step_paddle, Ball, PaddleInput, Side, BALL_SERVE_SPEED, BOARD_HEIGHT,
    PADDLE_HEIGHT, SERVE_VY_MAX, SERVE_VY_MIN,
};

/// The authoritative game world: everything the physics step reads and
/// writes, owned by the tick loop and mutated nowhere else.
#[derive(Debug, Clone)]
pub struct GameWorld {
    /// Counts executed simulation steps only; paused or waiting ticks do
    /// not advance it.
    pub tick: u64,
    pub ball: Ball,
    /// Paddle y-positions, [left, right].
    pub paddles: [f32; 2],
    pub scores: [u32; 2],
    pub inputs: [PaddleInput; 2],
    pub paused: bool,
}

impl GameWorld {
    pub fn new() -> Self {
        let center = (BOARD_HEIGHT - PADDLE_HEIGHT) / 2.0;
        Self {
            tick: 0,
            ball: Ball {
                x: shared::BOARD_WIDTH / 2.0,
                y: BOARD_HEIGHT / 2.0,
                vx: BALL_SERVE_SPEED,
                vy: 0.0,
            },
            paddles: [center, center],
            scores: [0, 0],
            inputs: [PaddleInput::default(), PaddleInput::default()],
            paused: false,
        }
    }

    /// Replaces the held-key state for one side. Authorization (is the
    /// sender the slot occupant?) is the caller's job.
    pub fn set_input(&mut self, side: Side, up: bool, down: bool) {
        self.inputs[side.index()] = PaddleInput { up, down };
    }

    /// Zeroes one side's input so a vacated paddle stops drifting.
    pub fn clear_input(&mut self, side: Side) {
        self.inputs[side.index()] = PaddleInput::default();
    }

    /// Advances the world by one fixed timestep: paddles first, then the
    /// ball, then scoring. A goal increments the scorer's count and
    /// re-serves toward the side that conceded, with a randomized vertical
    /// component for serve variety.
    pub fn step<R: Rng>(&mut self, dt: f32, rng: &mut R) {
        for side in Side::BOTH {
            self.paddles[side.index()] =
                step_paddle(self.paddles[side.index()], self.inputs[side.index()], dt);
        }

        if let Some(scorer) = step_ball(&mut self.ball, &self.paddles, dt) {
            self.scores[scorer.index()] += 1;
            info!(
                "Player {} scores ({} - {})",
                scorer.player_number(),
                self.scores[0],
                self.scores[1]
            );
            self.serve(scorer.opponent(), rng);
        }

        self.tick += 1;
    }

    fn serve<R: Rng>(&mut self, toward: Side, rng: &mut R) {
        let magnitude = rng.gen_range(SERVE_VY_MIN..=SERVE_VY_MAX);
        let vy = if rng.gen_bool(0.5) {
            magnitude
        } else {
            -magnitude
        };
        self.ball = Ball::serve(toward, vy);
    }
}

impl Default for GameWorld {
    fn default() -> Self {
        Self::new()
    }
}
