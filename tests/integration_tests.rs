//! End-to-end tests against a live relay over loopback UDP.
//!
//! Each test spawns a real server task on an ephemeral port and drives
//! it with plain client sockets, asserting on the exact wire text.

use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

use server::config::Config;
use server::network::Server;
use shared::MAX_DATAGRAM_SIZE;

fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        tick_period: Duration::from_millis(25),
        ..Default::default()
    }
}

async fn spawn_relay(config: Config) -> SocketAddr {
    let relay = Server::new(config).await.expect("bind relay");
    let addr = relay.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = relay.run().await;
    });
    addr
}

async fn client() -> UdpSocket {
    UdpSocket::bind("127.0.0.1:0").await.expect("bind client")
}

async fn recv_within(socket: &UdpSocket, wait: Duration) -> Option<String> {
    let mut buf = [0u8; MAX_DATAGRAM_SIZE];
    match timeout(wait, socket.recv_from(&mut buf)).await {
        Ok(Ok((len, _))) => Some(String::from_utf8_lossy(&buf[..len]).trim().to_string()),
        _ => None,
    }
}

async fn recv_text(socket: &UdpSocket) -> Option<String> {
    recv_within(socket, Duration::from_millis(500)).await
}

/// Collects every datagram arriving within a total time window. The
/// window is a hard deadline so a steady stream (obstacle spawns) still
/// terminates the collection.
async fn collect(socket: &UdpSocket, window: Duration) -> Vec<String> {
    let deadline = std::time::Instant::now() + window;
    let mut messages = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(std::time::Instant::now());
        if remaining.is_zero() {
            break;
        }
        match recv_within(socket, remaining).await {
            Some(text) => messages.push(text),
            None => break,
        }
    }
    messages
}

async fn drain(socket: &UdpSocket) {
    while recv_within(socket, Duration::from_millis(150)).await.is_some() {}
}

async fn join(socket: &UdpSocket, relay: SocketAddr) {
    socket.send_to(b"JOIN", relay).await.expect("send JOIN");
}

/// LOBBY TESTS
mod lobby_tests {
    use super::*;

    #[tokio::test]
    async fn discovery_probe_is_answered() {
        let relay = spawn_relay(test_config()).await;
        let probe = client().await;

        probe.send_to(b"BUSCAR_SERVIDOR", relay).await.unwrap();

        assert_eq!(recv_text(&probe).await.as_deref(), Some("SERVIDOR_AQUI"));
    }

    #[tokio::test]
    async fn joins_assign_ids_in_order_and_third_is_full() {
        let relay = spawn_relay(test_config()).await;
        let a = client().await;
        let b = client().await;
        let c = client().await;

        join(&a, relay).await;
        assert_eq!(recv_text(&a).await.as_deref(), Some("ASSIGN;id=1"));

        join(&b, relay).await;
        assert_eq!(recv_text(&b).await.as_deref(), Some("ASSIGN;id=2"));

        join(&c, relay).await;
        let replies = collect(&c, Duration::from_millis(300)).await;
        assert_eq!(replies, vec!["FULL".to_string()]);
    }

    #[tokio::test]
    async fn rejoin_is_idempotent() {
        let relay = spawn_relay(test_config()).await;
        let a = client().await;

        join(&a, relay).await;
        assert_eq!(recv_text(&a).await.as_deref(), Some("ASSIGN;id=1"));
        drain(&a).await;

        // Same address retries JOIN; same id, count stays at 1.
        join(&a, relay).await;
        let replies = collect(&a, Duration::from_millis(300)).await;
        assert!(replies.contains(&"ASSIGN;id=1".to_string()), "{:?}", replies);
        assert!(replies.contains(&"COUNT;players=1".to_string()), "{:?}", replies);
        assert!(!replies.iter().any(|m| m == "COUNT;players=2"), "{:?}", replies);
    }

    #[tokio::test]
    async fn join_count_reaches_both_players() {
        let relay = spawn_relay(test_config()).await;
        let a = client().await;
        let b = client().await;

        join(&a, relay).await;
        drain(&a).await;

        join(&b, relay).await;

        // The earlier player hears about the newcomer via broadcast.
        let at_a = collect(&a, Duration::from_millis(300)).await;
        assert!(at_a.contains(&"COUNT;players=2".to_string()), "{:?}", at_a);

        let at_b = collect(&b, Duration::from_millis(300)).await;
        assert!(at_b.contains(&"COUNT;players=2".to_string()), "{:?}", at_b);
    }

    #[tokio::test]
    async fn unregistered_sender_gets_error() {
        let relay = spawn_relay(test_config()).await;
        let stranger = client().await;

        stranger.send_to(b"READY", relay).await.unwrap();

        let reply = recv_text(&stranger).await.expect("error reply");
        assert!(reply.starts_with("ERROR;msg="), "got {}", reply);
    }

    #[tokio::test]
    async fn unknown_command_from_player_gets_error() {
        let relay = spawn_relay(test_config()).await;
        let a = client().await;

        join(&a, relay).await;
        drain(&a).await;

        a.send_to(b"TELEPORT;x=1", relay).await.unwrap();
        let reply = recv_text(&a).await.expect("error reply");
        assert!(reply.starts_with("ERROR;msg="), "got {}", reply);
    }
}

/// MATCH LIFECYCLE TESTS
mod match_tests {
    use super::*;

    async fn join_pair(relay: SocketAddr) -> (UdpSocket, UdpSocket) {
        let a = client().await;
        let b = client().await;
        join(&a, relay).await;
        join(&b, relay).await;
        drain(&a).await;
        drain(&b).await;
        (a, b)
    }

    #[tokio::test]
    async fn ready_handshake_starts_match() {
        let relay = spawn_relay(test_config()).await;
        let (a, b) = join_pair(relay).await;

        a.send_to(b"READY", relay).await.unwrap();
        b.send_to(b"READY", relay).await.unwrap();

        let at_a = collect(&a, Duration::from_millis(400)).await;
        let at_b = collect(&b, Duration::from_millis(400)).await;

        for (name, messages) in [("a", &at_a), ("b", &at_b)] {
            assert!(messages.contains(&"START".to_string()), "{}: {:?}", name, messages);
            assert!(
                messages.contains(&"READY;id=1;value=1".to_string()),
                "{}: {:?}",
                name,
                messages
            );
            assert!(
                messages.contains(&"READY;id=2;value=1".to_string()),
                "{}: {:?}",
                name,
                messages
            );
        }
    }

    #[tokio::test]
    async fn state_is_relayed_verbatim_to_peer_only() {
        let relay = spawn_relay(test_config()).await;
        let (a, b) = join_pair(relay).await;

        let state = "STATE;id=1;x=10;y=40;duck=0";
        a.send_to(state.as_bytes(), relay).await.unwrap();

        assert_eq!(recv_text(&b).await.as_deref(), Some(state));
        // Never echoed back to the sender.
        assert_eq!(recv_within(&a, Duration::from_millis(300)).await, None);
    }

    #[tokio::test]
    async fn malformed_state_is_dropped_silently() {
        let relay = spawn_relay(test_config()).await;
        let (a, b) = join_pair(relay).await;

        a.send_to(b"STATE;id=1;x=10", relay).await.unwrap();
        a.send_to(b"STATE;id=1;x=abc;y=40;duck=0", relay).await.unwrap();

        // No error to the sender, no relay to the peer.
        assert_eq!(recv_within(&a, Duration::from_millis(300)).await, None);
        assert_eq!(recv_within(&b, Duration::from_millis(100)).await, None);
    }

    #[tokio::test]
    async fn bye_invalidates_match_and_resets_survivor() {
        let relay = spawn_relay(test_config()).await;
        let (a, b) = join_pair(relay).await;

        a.send_to(b"READY", relay).await.unwrap();
        b.send_to(b"READY", relay).await.unwrap();
        drain(&a).await;
        drain(&b).await;

        a.send_to(b"BYE", relay).await.unwrap();

        let at_b = collect(&b, Duration::from_millis(400)).await;
        assert!(at_b.contains(&"COUNT;players=1".to_string()), "{:?}", at_b);

        // Survivor's ready flag was reset: a lone READY echoes but
        // cannot start a match.
        b.send_to(b"READY", relay).await.unwrap();
        let at_b = collect(&b, Duration::from_millis(400)).await;
        assert!(
            at_b.contains(&"READY;id=2;value=1".to_string()),
            "{:?}",
            at_b
        );
        assert!(!at_b.contains(&"START".to_string()), "{:?}", at_b);
    }

    #[tokio::test]
    async fn silent_player_is_evicted_and_survivor_notified() {
        let config = Config {
            timeout: Duration::from_millis(300),
            ..test_config()
        };
        let relay = spawn_relay(config).await;
        let (a, b) = join_pair(relay).await;

        // B goes silent. A keeps talking so only B times out.
        let mut survivor_saw_count = false;
        for _ in 0..12 {
            a.send_to(b"STATE;id=1;x=1;y=40;duck=0", relay).await.unwrap();
            if let Some(text) = recv_within(&a, Duration::from_millis(100)).await {
                if text == "COUNT;players=1" {
                    survivor_saw_count = true;
                    break;
                }
            }
        }
        assert!(survivor_saw_count, "survivor never saw the lobby shrink");

        // The freed slot is joinable again.
        let c = client().await;
        join(&c, relay).await;
        assert_eq!(recv_text(&c).await.as_deref(), Some("ASSIGN;id=2"));
        let _ = b;
    }
}

/// OBSTACLE BROADCAST TESTS
mod obstacle_tests {
    use super::*;

    #[tokio::test]
    async fn obstacles_flow_to_both_players_after_start() {
        let config = Config {
            spawn_min: Duration::from_millis(50),
            spawn_max: Duration::from_millis(80),
            ..test_config()
        };
        let relay = spawn_relay(config).await;

        let a = client().await;
        let b = client().await;
        join(&a, relay).await;
        join(&b, relay).await;
        a.send_to(b"READY", relay).await.unwrap();
        b.send_to(b"READY", relay).await.unwrap();

        let at_a = collect(&a, Duration::from_millis(400)).await;
        let at_b = collect(&b, Duration::from_millis(400)).await;

        for (name, messages) in [("a", &at_a), ("b", &at_b)] {
            let obstacles: Vec<_> = messages.iter().filter(|m| m.starts_with("OBST;")).collect();
            assert!(!obstacles.is_empty(), "{} got no obstacles: {:?}", name, messages);
            for text in obstacles {
                match shared::Message::parse(text) {
                    Ok(shared::Message::Obstacle { x, .. }) => {
                        assert_eq!(x, shared::WORLD_WIDTH);
                    }
                    other => panic!("bad OBST payload {:?}: {:?}", text, other),
                }
            }
        }
    }

    #[tokio::test]
    async fn no_obstacles_before_start() {
        let config = Config {
            spawn_min: Duration::from_millis(50),
            spawn_max: Duration::from_millis(80),
            ..test_config()
        };
        let relay = spawn_relay(config).await;

        let a = client().await;
        join(&a, relay).await;
        drain(&a).await;

        let messages = collect(&a, Duration::from_millis(300)).await;
        assert!(
            !messages.iter().any(|m| m.starts_with("OBST;")),
            "{:?}",
            messages
        );
    }
}
