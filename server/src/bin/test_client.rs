//! Headless client that joins a running server, flies with random controls
//! and logs what it receives.

use bincode::{deserialize, serialize};
use clap::Parser;
use log::{debug, info, warn};
use rand::Rng;
use shared::{EntityKind, Packet, PROTOCOL_VERSION, TICK_MILLIS};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep, Instant};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server address
    #[clap(short, long, default_value = "127.0.0.1:3000")]
    server: SocketAddr,
    /// Nickname shown on the scoreboard
    #[clap(short, long, default_value = "tester")]
    nick: String,
    /// How long to play, in seconds
    #[clap(short, long, default_value = "10")]
    duration: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    info!("Client socket bound to {}", socket.local_addr()?);

    let join = Packet::Join {
        client_version: PROTOCOL_VERSION,
        nick: args.nick.clone(),
    };
    socket.send_to(&serialize(&join)?, args.server).await?;
    info!("Sent join request to {}", args.server);

    let mut rng = rand::thread_rng();
    let mut buf = [0u8; 65536];
    let mut sequence = 0u32;
    let mut updates = 0u32;
    let mut control_interval = interval(Duration::from_millis(TICK_MILLIS));
    let deadline = sleep(Duration::from_secs(args.duration));
    tokio::pin!(deadline);
    let started = Instant::now();

    loop {
        tokio::select! {
            _ = &mut deadline => break,

            _ = control_interval.tick() => {
                // Turn bits and the fire/boost/brake bits, picked at random
                let flags = rng.gen::<u8>() & 0b1_1111;
                sequence += 1;
                let control = Packet::Control { sequence, flags };
                socket.send_to(&serialize(&control)?, args.server).await?;
            },

            received = socket.recv_from(&mut buf) => {
                let (len, _) = received?;
                match deserialize::<Packet>(&buf[..len]) {
                    Ok(Packet::JoinInfo { player_id, width, height }) => {
                        info!("Joined as player {} in a {}x{} world", player_id, width, height);
                    }
                    Ok(Packet::Rejected { reason }) => {
                        warn!("Join rejected: {}", reason);
                        return Ok(());
                    }
                    Ok(Packet::Scores { entries }) => {
                        for entry in entries {
                            info!("  {:>3} {:<12} {}", entry.player_id, entry.nick, entry.score);
                        }
                    }
                    Ok(Packet::WorldUpdate { tick, records }) => {
                        updates += 1;
                        let mut counts: HashMap<EntityKind, usize> = HashMap::new();
                        for record in &records {
                            *counts.entry(record.kind()).or_default() += 1;
                        }
                        if updates % 25 == 0 {
                            info!("Tick {}: {:?}", tick, counts);
                        }
                        if let Some(first) = records.first() {
                            debug!("First record: {:?}", first.fields());
                        }
                    }
                    Ok(other) => warn!("Unexpected packet: {:?}", other),
                    Err(e) => warn!("Failed to deserialize packet: {}", e),
                }
            },
        }
    }

    socket.send_to(&serialize(&Packet::Leave)?, args.server).await?;
    info!(
        "Left after {:.1}s: {} controls sent, {} world updates received",
        started.elapsed().as_secs_f32(),
        sequence,
        updates
    );
    Ok(())
}
