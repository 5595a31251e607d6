//! Player registry and session state machine.
//!
//! The lobby owns every registered player, keyed by their UDP source
//! address, and the `match_started` flag. All transitions funnel through
//! here so the invariants hold no matter which network event triggered
//! them:
//!
//! - a started match implies exactly two registered players,
//! - assigned ids are always a subset of {1, 2} with no duplicates,
//! - whenever fewer than two players remain, nobody is `ready`.
//!
//! There is no transport-level disconnect on UDP, so the timeout sweep
//! in [`Lobby::sweep_timeouts`] is the only automatic way a dead client
//! frees its slot.

use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Advisory cache of the most recent `STATE` payload from a player.
/// Not authoritative; kept for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedState {
    pub x: f32,
    pub y: f32,
    pub duck: bool,
}

/// One registered client.
#[derive(Debug)]
pub struct Player {
    /// Slot id, 1 or 2, stable until the player leaves or times out.
    pub id: u8,
    /// Source address; the registry key, one player per address.
    pub addr: SocketAddr,
    /// Set by READY, cleared whenever the lobby drops below two players.
    pub ready: bool,
    /// Last time any structurally valid message arrived from this
    /// address, not just STATE.
    pub last_seen: Instant,
    /// Latest relayed position, if any.
    pub last_state: Option<TrackedState>,
}

impl Player {
    fn new(id: u8, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            ready: false,
            last_seen: Instant::now(),
            last_state: None,
        }
    }

    pub fn is_timed_out(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) > timeout
    }
}

/// Where the session currently sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Empty,
    WaitingForPeer,
    Lobby,
    Playing,
}

/// Result of a join attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum JoinOutcome {
    /// New registration; `players` is the count after insertion.
    Joined { id: u8, players: usize },
    /// The address was already registered; same id, refreshed liveness.
    Rejoined { id: u8, players: usize },
    /// Registry at capacity, nothing changed.
    Full,
}

/// Result of marking a player ready.
#[derive(Debug, PartialEq, Eq)]
pub struct ReadyOutcome {
    pub id: u8,
    /// True when this READY was the transition into a running match.
    pub started: bool,
}

/// A completed removal and whether it invalidated the session.
#[derive(Debug)]
pub struct Removed {
    pub player: Player,
    /// True when the departure invalidated a running match, clearing
    /// `match_started` and every survivor's ready flag.
    pub reset: bool,
}

/// Outcome of one liveness sweep.
#[derive(Debug, Default)]
pub struct Sweep {
    pub evicted: Vec<Player>,
    pub reset: bool,
}

impl Sweep {
    pub fn is_empty(&self) -> bool {
        self.evicted.is_empty()
    }
}

/// The session singleton: at most two players plus the match flag.
pub struct Lobby {
    players: HashMap<SocketAddr, Player>,
    match_started: bool,
    max_players: usize,
    timeout: Duration,
}

impl Lobby {
    pub fn new(max_players: usize, timeout: Duration) -> Self {
        Self {
            players: HashMap::new(),
            match_started: false,
            max_players,
            timeout,
        }
    }

    /// Registers the address, idempotently.
    ///
    /// A re-JOIN from a known address keeps its id and only refreshes
    /// liveness, so a client retrying over lossy UDP converges instead
    /// of burning the second slot. New joins take the smaller unused id.
    pub fn join(&mut self, addr: SocketAddr) -> JoinOutcome {
        if let Some(player) = self.players.get_mut(&addr) {
            player.last_seen = Instant::now();
            return JoinOutcome::Rejoined {
                id: player.id,
                players: self.players.len(),
            };
        }

        if self.players.len() >= self.max_players {
            return JoinOutcome::Full;
        }

        let id = if self.id_in_use(1) { 2 } else { 1 };
        self.players.insert(addr, Player::new(id, addr));
        info!("player {} joined from {}", id, addr);

        JoinOutcome::Joined {
            id,
            players: self.players.len(),
        }
    }

    /// Refreshes liveness for a registered sender. Returns false when
    /// the address is unknown. Called for every structurally valid
    /// message so an idle-but-listening player is not evicted.
    pub fn touch(&mut self, addr: &SocketAddr) -> bool {
        match self.players.get_mut(addr) {
            Some(player) => {
                player.last_seen = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Marks the sender ready and reports whether that completed the
    /// handshake: exactly two players, both ready, match not already
    /// running.
    pub fn mark_ready(&mut self, addr: &SocketAddr) -> Option<ReadyOutcome> {
        let id = {
            let player = self.players.get_mut(addr)?;
            player.ready = true;
            player.id
        };

        let started = self.players.len() == self.max_players
            && self.players.values().all(|p| p.ready)
            && !self.match_started;
        if started {
            self.match_started = true;
        }

        Some(ReadyOutcome { id, started })
    }

    /// Updates the diagnostics cache for the sender.
    pub fn record_state(&mut self, addr: &SocketAddr, state: TrackedState) {
        if let Some(player) = self.players.get_mut(addr) {
            player.last_state = Some(state);
        }
    }

    /// The other player, by id swap 1 <-> 2.
    pub fn peer_of(&self, id: u8) -> Option<&Player> {
        let other = if id == 1 { 2 } else { 1 };
        self.players.values().find(|p| p.id == other)
    }

    /// Explicit leave (BYE). A departure below two players invalidates
    /// the match; the survivor must re-ready against a future peer.
    pub fn remove(&mut self, addr: &SocketAddr) -> Option<Removed> {
        let player = self.players.remove(addr)?;
        let reset = self.reset_if_underfull();
        Some(Removed { player, reset })
    }

    /// Liveness monitor: evicts every player whose silence exceeds the
    /// timeout, then applies the same session reset as an explicit
    /// leave. `now` is passed in so tests can drive the clock.
    pub fn sweep_timeouts(&mut self, now: Instant) -> Sweep {
        let stale: Vec<SocketAddr> = self
            .players
            .values()
            .filter(|p| p.is_timed_out(now, self.timeout))
            .map(|p| p.addr)
            .collect();

        let mut sweep = Sweep::default();
        for addr in stale {
            if let Some(player) = self.players.remove(&addr) {
                info!("player {} timed out ({})", player.id, addr);
                sweep.evicted.push(player);
            }
        }

        if !sweep.evicted.is_empty() {
            sweep.reset = self.reset_if_underfull();
        }
        sweep
    }

    fn id_in_use(&self, id: u8) -> bool {
        self.players.values().any(|p| p.id == id)
    }

    fn reset_if_underfull(&mut self) -> bool {
        if self.players.len() >= self.max_players {
            return false;
        }
        let was_started = self.match_started;
        self.match_started = false;
        for player in self.players.values_mut() {
            player.ready = false;
        }
        if was_started {
            info!("match invalidated, lobby back to waiting");
        }
        was_started
    }

    pub fn phase(&self) -> Phase {
        match self.players.len() {
            0 => Phase::Empty,
            1 => Phase::WaitingForPeer,
            _ if self.match_started => Phase::Playing,
            _ => Phase::Lobby,
        }
    }

    pub fn get(&self, addr: &SocketAddr) -> Option<&Player> {
        self.players.get(addr)
    }

    pub fn addrs(&self) -> Vec<SocketAddr> {
        self.players.values().map(|p| p.addr).collect()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn match_started(&self) -> bool {
        self.match_started
    }
}
