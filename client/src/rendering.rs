//! Snapshot rendering: paddles, ball, scores, and the waiting screen
//!
//! Draws exactly what the latest snapshot says. There is no smoothing or
//! prediction; the server's view is the sole truth.

use macroquad::prelude::*;
use shared::{
    Snapshot, BALL_RADIUS, BOARD_HEIGHT, BOARD_WIDTH, LEFT_PADDLE_X, PADDLE_HEIGHT, PADDLE_WIDTH,
    RIGHT_PADDLE_X,
};

pub struct Renderer;

impl Renderer {
    pub fn new() -> Self {
        Renderer
    }

    pub fn render(&self, snapshot: Option<&Snapshot>, label: &str) {
        clear_background(BLACK);

        match snapshot {
            Some(Snapshot::State {
                ball,
                paddles,
                scores,
                paused,
                ..
            }) => {
                self.draw_board(ball.x, ball.y, paddles, scores);
                if *paused {
                    self.draw_centered("PAUSED - press P to resume", BOARD_HEIGHT / 2.0 - 60.0);
                }
            }
            Some(Snapshot::Waiting {
                message,
                players,
                spectator_count,
                ..
            }) => {
                self.draw_centered(message, BOARD_HEIGHT / 2.0 - 40.0);
                let slots = format!(
                    "Player 1: {}   Player 2: {}   Spectators: {}",
                    status_text(players[0]),
                    status_text(players[1]),
                    spectator_count
                );
                self.draw_centered(&slots, BOARD_HEIGHT / 2.0 + 10.0);
            }
            None => {
                self.draw_centered("Waiting for server...", BOARD_HEIGHT / 2.0);
            }
        }

        draw_text(label, 10.0, BOARD_HEIGHT - 20.0, 28.0, GRAY);
    }

    fn draw_board(&self, ball_x: f32, ball_y: f32, paddles: &[f32; 2], scores: &[u32; 2]) {
        // Center line
        draw_line(
            BOARD_WIDTH / 2.0,
            0.0,
            BOARD_WIDTH / 2.0,
            BOARD_HEIGHT,
            1.0,
            WHITE,
        );

        draw_rectangle(LEFT_PADDLE_X, paddles[0], PADDLE_WIDTH, PADDLE_HEIGHT, WHITE);
        draw_rectangle(RIGHT_PADDLE_X, paddles[1], PADDLE_WIDTH, PADDLE_HEIGHT, WHITE);
        draw_circle(ball_x, ball_y, BALL_RADIUS, WHITE);

        draw_text(&scores[0].to_string(), BOARD_WIDTH / 4.0, 50.0, 48.0, WHITE);
        draw_text(
            &scores[1].to_string(),
            BOARD_WIDTH * 3.0 / 4.0,
            50.0,
            48.0,
            WHITE,
        );
    }

    fn draw_centered(&self, text: &str, y: f32) {
        let dims = measure_text(text, None, 32, 1.0);
        draw_text(text, (BOARD_WIDTH - dims.width) / 2.0, y, 32.0, WHITE);
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

fn status_text(status: shared::SlotStatus) -> &'static str {
    match status {
        shared::SlotStatus::Connected => "connected",
        shared::SlotStatus::Open => "open",
    }
}
