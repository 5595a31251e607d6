//! Randomized obstacle spawning.
//!
//! The scheduler is deliberately free of I/O and wall-clock reads: the
//! relay loop feeds it a millisecond counter and broadcasts whatever it
//! emits. That keeps spawn timing and shape selection fully
//! deterministic under an injected RNG, which is how the tests pin the
//! randomized rules down.

use rand::Rng;

use crate::config::Config;
use shared::{Obstacle, ObstacleKind, FLYING_ALTITUDE_OFFSETS};

/// Emits at most one [`Obstacle`] per poll once the spawn deadline has
/// passed, then reschedules itself a uniform-random interval ahead.
pub struct ObstacleScheduler<R: Rng> {
    rng: R,
    next_id: u32,
    next_spawn_at: u64,
    spawn_min_ms: u64,
    spawn_max_ms: u64,
    world_width: f32,
    ground_y: f32,
}

impl<R: Rng> ObstacleScheduler<R> {
    pub fn new(rng: R, config: &Config) -> Self {
        Self {
            rng,
            next_id: 1,
            next_spawn_at: 0,
            spawn_min_ms: config.spawn_min.as_millis() as u64,
            spawn_max_ms: config.spawn_max.as_millis() as u64,
            world_width: config.world_width,
            ground_y: config.ground_y,
        }
    }

    /// Resets the spawn deadline. Called when a match starts so the
    /// first obstacle arrives a full interval after START rather than
    /// immediately.
    pub fn arm(&mut self, now_ms: u64) {
        self.next_spawn_at = now_ms + self.random_interval();
    }

    /// One obstacle when due, `None` otherwise. The caller gates this
    /// on the match actually running.
    pub fn poll(&mut self, now_ms: u64) -> Option<Obstacle> {
        if now_ms < self.next_spawn_at {
            return None;
        }
        let obstacle = self.generate();
        self.next_spawn_at = now_ms + self.random_interval();
        Some(obstacle)
    }

    fn random_interval(&mut self) -> u64 {
        if self.spawn_max_ms > self.spawn_min_ms {
            self.rng.gen_range(self.spawn_min_ms..self.spawn_max_ms)
        } else {
            self.spawn_min_ms
        }
    }

    /// Shape rules: a fair coin picks the kind. Ground hazards sit on
    /// the ground line with width in [20,30) and height in [30,40);
    /// flying hazards are a fixed 40x20 at one of two discrete
    /// altitudes. Everything spawns at the right edge of the playfield.
    fn generate(&mut self) -> Obstacle {
        let id = self.next_id;
        self.next_id += 1;

        if self.rng.gen_bool(0.5) {
            Obstacle {
                id,
                kind: ObstacleKind::Ground,
                x: self.world_width,
                y: self.ground_y,
                width: self.rng.gen_range(20..30) as f32,
                height: self.rng.gen_range(30..40) as f32,
            }
        } else {
            let offset = if self.rng.gen_bool(0.5) {
                FLYING_ALTITUDE_OFFSETS[0]
            } else {
                FLYING_ALTITUDE_OFFSETS[1]
            };
            Obstacle {
                id,
                kind: ObstacleKind::Flying,
                x: self.world_width,
                y: self.ground_y + offset,
                width: 40.0,
                height: 20.0,
            }
        }
    }
}
