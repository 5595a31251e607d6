//! The relay engine: socket ownership, dispatch, and the main loop.
//!
//! One task owns everything. Each loop iteration sweeps liveness, waits
//! a bounded period for at most one datagram, dispatches it, and then
//! gives the obstacle scheduler a chance to fire. Sequential ownership
//! of the lobby is what makes the session invariants hold without any
//! locking.
//!
//! All outbound traffic is fire-and-forget: attempt the send once, log
//! at debug on failure, never propagate. A peer with a broken return
//! path must not take the server down or stall the other client.

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::config::Config;
use crate::lobby::{JoinOutcome, Lobby, Phase, TrackedState};
use crate::scheduler::ObstacleScheduler;
use shared::{Message, ParseError, MAX_DATAGRAM_SIZE};

pub struct Server {
    socket: UdpSocket,
    lobby: Lobby,
    scheduler: ObstacleScheduler<StdRng>,
    config: Config,
    /// Zero point of the millisecond clock fed to the scheduler.
    epoch: Instant,
}

impl Server {
    /// Binds the UDP socket. This is the only fatal error path; every
    /// failure after startup is handled locally.
    pub async fn new(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind(config.bind_addr()).await?;
        info!("relay listening on {}", socket.local_addr()?);

        Ok(Self {
            lobby: Lobby::new(config.max_players, config.timeout),
            scheduler: ObstacleScheduler::new(StdRng::from_entropy(), &config),
            socket,
            config,
            epoch: Instant::now(),
        })
    }

    /// Actual bound address; lets tests bind port 0.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Main loop. One iteration per tick: liveness sweep, bounded-wait
    /// receive for a single datagram, obstacle scheduling.
    pub async fn run(mut self) -> Result<(), Box<dyn std::error::Error>> {
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        info!("relay started");

        loop {
            self.sweep_liveness().await;

            let received = timeout(self.config.tick_period, self.socket.recv_from(&mut buf)).await;
            match received {
                Ok(Ok((len, addr))) => {
                    let text = String::from_utf8_lossy(&buf[..len]).trim().to_string();
                    self.handle_datagram(addr, &text).await;
                }
                Ok(Err(e)) => warn!("receive error: {}", e),
                // Quiet tick; fall through to housekeeping.
                Err(_) => {}
            }

            self.pump_scheduler().await;
        }
    }

    /// Evicts silent players and tells the survivors the lobby shrank.
    /// The timed-out side gets nothing; it is unreachable by definition.
    async fn sweep_liveness(&mut self) {
        let sweep = self.lobby.sweep_timeouts(Instant::now());
        if !sweep.is_empty() {
            self.broadcast_count().await;
        }
    }

    /// Spawns and broadcasts one obstacle when the match is running and
    /// the scheduler deadline has passed. Lost OBST packets are never
    /// resent; clients simply miss that hazard.
    async fn pump_scheduler(&mut self) {
        if self.lobby.phase() != Phase::Playing {
            return;
        }
        if let Some(obstacle) = self.scheduler.poll(self.now_ms()) {
            debug!("obstacle {} spawned ({:?})", obstacle.id, obstacle.kind);
            self.broadcast(&Message::from(obstacle).encode()).await;
        }
    }

    /// Dispatches one inbound datagram.
    ///
    /// JOIN, the discovery probe, and BYE work for any source address;
    /// everything else requires registration first, and a structurally
    /// valid message from a registered sender always refreshes their
    /// liveness before further processing.
    async fn handle_datagram(&mut self, addr: SocketAddr, text: &str) {
        let parsed = Message::parse(text);

        match parsed {
            Ok(Message::Discover) => {
                // Answered from any address, no registry mutation.
                self.send(addr, &Message::DiscoverReply.encode()).await;
            }
            Ok(Message::Join) => self.handle_join(addr).await,
            Ok(Message::Bye) => self.handle_leave(addr, "bye").await,
            other => {
                if !self.lobby.touch(&addr) {
                    self.send(addr, &Message::Error { msg: "send JOIN first".to_string() }.encode())
                        .await;
                    return;
                }
                match other {
                    Ok(Message::Ready) => self.handle_ready(addr).await,
                    Ok(Message::State { x, y, duck, .. }) => {
                        self.handle_state(addr, text, TrackedState { x, y, duck }).await;
                    }
                    Err(ParseError::MalformedState) => {
                        // Dropped on purpose: a garbled position snapshot
                        // is worthless and the next one is already on
                        // the way.
                        debug!("dropping malformed STATE from {}", addr);
                    }
                    Ok(_) | Err(ParseError::Unrecognized) => {
                        debug!("unrecognized message from {}: {:?}", addr, text);
                        self.send(addr, &Message::Error { msg: "unrecognized message".to_string() }.encode())
                            .await;
                    }
                }
            }
        }
    }

    /// JOIN handling, idempotent for a known address. COUNT goes both
    /// directly to the joiner and as a broadcast; the duplication is
    /// deliberate, two attempts raise the odds the lobby count lands on
    /// everyone despite packet loss.
    async fn handle_join(&mut self, addr: SocketAddr) {
        match self.lobby.join(addr) {
            JoinOutcome::Joined { id, players } | JoinOutcome::Rejoined { id, players } => {
                self.send(addr, &Message::Assign { id }.encode()).await;
                self.send(addr, &Message::Count { players }.encode()).await;
                self.broadcast(&Message::Count { players }.encode()).await;
            }
            JoinOutcome::Full => {
                info!("rejecting join from {}, lobby full", addr);
                self.send(addr, &Message::Full.encode()).await;
            }
        }
    }

    async fn handle_ready(&mut self, addr: SocketAddr) {
        let Some(outcome) = self.lobby.mark_ready(&addr) else {
            return;
        };
        info!("player {} ready", outcome.id);
        self.broadcast(&Message::ReadyEcho { id: outcome.id }.encode()).await;

        if outcome.started {
            info!("both players ready, match started");
            self.broadcast(&Message::Start.encode()).await;
            self.scheduler.arm(self.now_ms());
        }
    }

    /// Relays the raw STATE text to the sender's peer, verbatim. The
    /// peer is looked up from the sender's registered id, never from
    /// the id field inside the payload. With no peer present the
    /// snapshot is cached and silently absorbed.
    async fn handle_state(&mut self, addr: SocketAddr, raw: &str, state: TrackedState) {
        self.lobby.record_state(&addr, state);

        let Some(sender_id) = self.lobby.get(&addr).map(|p| p.id) else {
            return;
        };
        if let Some(peer_addr) = self.lobby.peer_of(sender_id).map(|p| p.addr) {
            self.send(peer_addr, raw).await;
        }
    }

    async fn handle_leave(&mut self, addr: SocketAddr, reason: &str) {
        if let Some(removed) = self.lobby.remove(&addr) {
            info!("player {} left ({})", removed.player.id, reason);
            self.broadcast_count().await;
        }
    }

    async fn broadcast_count(&self) {
        self.broadcast(&Message::Count { players: self.lobby.len() }.encode()).await;
    }

    /// Single send attempt, failures swallowed.
    async fn send(&self, addr: SocketAddr, text: &str) {
        if let Err(e) = self.socket.send_to(text.as_bytes(), addr).await {
            debug!("send to {} failed: {}", addr, e);
        }
    }

    /// One attempt per registered player, failures swallowed
    /// independently so one broken peer cannot shadow the other.
    async fn broadcast(&self, text: &str) {
        for addr in self.lobby.addrs() {
            self.send(addr, text).await;
        }
    }
}
