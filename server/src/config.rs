//! Runtime tunables for the relay server.

use std::time::Duration;

use shared::{
    DEFAULT_PORT, GROUND_Y, MAX_PLAYERS, PLAYER_TIMEOUT_MS, SPAWN_INTERVAL_MAX_MS,
    SPAWN_INTERVAL_MIN_MS, WORLD_WIDTH,
};

/// Everything the server treats as configurable. Defaults reproduce the
/// protocol constants in `shared`; the binary overrides them from the
/// command line.
#[derive(Debug, Clone)]
pub struct Config {
    /// Interface to bind the UDP socket to.
    pub host: String,
    /// UDP port; 0 lets the OS pick (used by tests).
    pub port: u16,
    /// Session capacity. The wire protocol only has ids for 2.
    pub max_players: usize,
    /// Playfield width; obstacles spawn at this x coordinate.
    pub world_width: f32,
    /// Ground line for ground hazards.
    pub ground_y: f32,
    /// Bounds for the randomized delay between obstacle spawns.
    pub spawn_min: Duration,
    pub spawn_max: Duration,
    /// Silence after which a registered player is evicted. Short values
    /// free the slot quickly after a real drop but can false-positive on
    /// a bursty link.
    pub timeout: Duration,
    /// Bounded wait of the receive call; also the cadence of liveness
    /// sweeps and spawn checks when no traffic arrives.
    pub tick_period: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            max_players: MAX_PLAYERS,
            world_width: WORLD_WIDTH,
            ground_y: GROUND_Y,
            spawn_min: Duration::from_millis(SPAWN_INTERVAL_MIN_MS),
            spawn_max: Duration::from_millis(SPAWN_INTERVAL_MAX_MS),
            timeout: Duration::from_millis(PLAYER_TIMEOUT_MS),
            tick_period: Duration::from_millis(200),
        }
    }
}

impl Config {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
