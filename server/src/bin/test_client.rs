//! Hand-driven protocol exerciser. Joins the relay, readies up, streams
//! a few position snapshots, then says goodbye, printing every reply.
//!
//! Usage: `test_client [server_addr]` (defaults to 127.0.0.1:4321).

use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout};

use shared::{Message, GROUND_Y, MAX_DATAGRAM_SIZE};

async fn drain_replies(socket: &UdpSocket, window: Duration) {
    let mut buf = [0u8; MAX_DATAGRAM_SIZE];
    while let Ok(Ok((len, _))) = timeout(window, socket.recv_from(&mut buf)).await {
        let text = String::from_utf8_lossy(&buf[..len]).trim().to_string();
        match Message::parse(&text) {
            Ok(msg) => println!("<- {} ({:?})", text, msg),
            Err(e) => println!("<- {} (unparseable: {:?})", text, e),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let server_addr: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| format!("127.0.0.1:{}", shared::DEFAULT_PORT))
        .parse()?;

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("client socket bound to {}", socket.local_addr()?);

    println!("-> JOIN");
    socket.send_to(b"JOIN", server_addr).await?;
    drain_replies(&socket, Duration::from_millis(500)).await;

    println!("-> READY");
    socket.send_to(b"READY", server_addr).await?;
    drain_replies(&socket, Duration::from_millis(500)).await;

    // Stream a short run of position snapshots. With a peer connected
    // these come back from their side; alone they vanish silently.
    for i in 0..10u32 {
        let state = Message::State {
            id: 1,
            x: 50.0 + i as f32 * 5.0,
            y: GROUND_Y,
            duck: i % 4 == 0,
        };
        let text = state.encode();
        println!("-> {}", text);
        socket.send_to(text.as_bytes(), server_addr).await?;
        drain_replies(&socket, Duration::from_millis(100)).await;
        sleep(Duration::from_millis(100)).await;
    }

    println!("-> BYE");
    socket.send_to(b"BYE", server_addr).await?;
    drain_replies(&socket, Duration::from_millis(300)).await;

    Ok(())
}
