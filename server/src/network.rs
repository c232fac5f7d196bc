//! Server network layer handling UDP communications and the simulation loop

use crate::bonus::BonusSpawner;
use crate::roster::{Roster, CLIENT_TIMEOUT};
use crate::world::{ScoreEvent, World};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{ControlState, Packet, PROTOCOL_VERSION, TICK_MILLIS, WORLD_HEIGHT, WORLD_WIDTH};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};

pub type ServerResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Number of ticks between periodic statistics log lines
const STATS_INTERVAL_TICKS: u32 = 250;

/// Runtime settings of a [`Server`]
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub tick_duration: Duration,
    /// Maximum number of remote players
    pub max_clients: usize,
    /// Bots added when the server starts
    pub bots: usize,
    pub width: f32,
    pub height: f32,
    /// Fixed RNG seed; random when unset
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_duration: Duration::from_millis(TICK_MILLIS),
            max_clients: 16,
            bots: 0,
            width: WORLD_WIDTH,
            height: WORLD_HEIGHT,
            seed: None,
        }
    }
}

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { player_id: u32 },
    Shutdown,
}

/// Messages sent from the main loop to the network sender
#[derive(Debug)]
pub enum GameMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
    BroadcastPacket { packet: Packet, exclude: Option<u32> },
}

/// Main server coordinating networking and the world simulation
pub struct Server {
    socket: Arc<UdpSocket>,
    roster: Arc<RwLock<Roster>>,
    world: World,
    config: ServerConfig,
    score_rx: mpsc::UnboundedReceiver<ScoreEvent>,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(addr: &str, config: ServerConfig) -> ServerResult<Self> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let mut world = match config.seed {
            Some(seed) => World::with_seed(config.width, config.height, seed),
            None => World::new(config.width, config.height),
        };

        let (score_tx, score_rx) = mpsc::unbounded_channel();
        world.set_score_sink(Box::new(move |event: ScoreEvent| {
            if score_tx.send(event).is_err() {
                warn!("Score event dropped: {:?}", event);
            }
        }));
        world.add(BonusSpawner::new());

        let mut roster = Roster::new(config.max_clients);
        for _ in 0..config.bots {
            roster.add_bot(&mut world);
        }

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            roster: Arc::new(RwLock::new(roster)),
            world,
            config,
            score_rx,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Channel into the main loop; sending [`ServerMessage::Shutdown`] stops
    /// [`Server::run`].
    pub fn control_handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let roster = Arc::clone(&self.roster);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet, exclude } => {
                        let client_addrs = {
                            let roster_guard = roster.read().await;
                            roster_guard.client_addrs()
                        };

                        for (player_id, addr) in client_addrs {
                            if Some(player_id) == exclude {
                                continue;
                            }

                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to player {}: {}", player_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that reports silent clients to the main loop
    fn spawn_timeout_checker(&self) {
        let roster = Arc::clone(&self.roster);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let roster_guard = roster.read().await;
                    roster_guard.timed_out(CLIENT_TIMEOUT)
                };

                for player_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { player_id }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> ServerResult<()> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_packet(&self, packet: Packet, exclude: Option<u32>) {
        if let Err(e) = self
            .game_tx
            .send(GameMessage::BroadcastPacket { packet, exclude })
        {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    async fn broadcast_scores(&mut self) {
        let entries = self.roster.read().await.scoreboard();
        self.broadcast_packet(Packet::Scores { entries }, None);
    }

    /// Applies a client packet to the roster and the world
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Join {
                client_version,
                nick,
            } => {
                info!(
                    "Client joining from {} (version: {}, nick: {})",
                    addr, client_version, nick
                );

                if client_version != PROTOCOL_VERSION {
                    let reason = "Protocol version mismatch".to_string();
                    self.send_packet(Packet::Rejected { reason }, addr);
                    return;
                }

                let player_id = {
                    let mut roster = self.roster.write().await;

                    // Rejoining from the same address replaces the old session
                    if let Some(existing_id) = roster.find_by_addr(addr) {
                        info!("Replacing player {} from {}", existing_id, addr);
                        roster.leave(existing_id, &mut self.world);
                    }
                    roster.join(addr, &nick, &mut self.world)
                };

                match player_id {
                    Some(player_id) => {
                        let response = Packet::JoinInfo {
                            player_id,
                            width: self.world.width() as u32,
                            height: self.world.height() as u32,
                        };
                        self.send_packet(response, addr);
                        self.broadcast_scores().await;
                    }
                    None => {
                        let reason = "Server full".to_string();
                        self.send_packet(Packet::Rejected { reason }, addr);
                    }
                }
            }

            Packet::Control { sequence, flags } => {
                let mut roster = self.roster.write().await;
                if let Some(player_id) = roster.find_by_addr(addr) {
                    let control = ControlState::from_flags(flags);
                    roster.apply_control(player_id, sequence, control, &mut self.world);
                } else {
                    debug!("Control from unknown client {}", addr);
                }
            }

            Packet::Leave => {
                let left = {
                    let mut roster = self.roster.write().await;
                    match roster.find_by_addr(addr) {
                        Some(player_id) => roster.leave(player_id, &mut self.world),
                        None => false,
                    }
                };

                if left {
                    self.broadcast_scores().await;
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    async fn handle_timeout(&mut self, player_id: u32) {
        let left = {
            let mut roster = self.roster.write().await;
            // The player may have sent something since the check ran.
            let still_silent = roster
                .get(player_id)
                .is_some_and(|p| p.is_timed_out(CLIENT_TIMEOUT));
            still_silent && roster.leave(player_id, &mut self.world)
        };

        if left {
            info!("Player {} timed out", player_id);
            self.broadcast_scores().await;
        }
    }

    /// Credits every score event produced by the last tick
    async fn collect_scores(&mut self) {
        let mut scored = false;
        {
            let mut roster = self.roster.write().await;
            while let Ok(event) = self.score_rx.try_recv() {
                roster.record_score(event);
                scored = true;
            }
        }

        if scored {
            self.broadcast_scores().await;
        }
    }

    /// Runs one simulation step and broadcasts the resulting snapshot
    async fn step(&mut self) {
        let before = self.world.time();
        self.world.tick();
        let elapsed = self.world.time() - before;

        let period = self.config.tick_duration.as_millis() as u64;
        if self.world.tick_count() > 1 && elapsed > period * 2 {
            warn!(
                "Server does not keep up, {} milliseconds between ticks instead of {}",
                elapsed, period
            );
        }

        self.collect_scores().await;

        let records = self.world.snapshot();
        let tick = self.world.tick_count();

        if tick % STATS_INTERVAL_TICKS == 0 {
            let players = self.roster.read().await.len();
            debug!(
                "Tick {}: {} players, {} entities, {} records",
                tick,
                players,
                self.world.len(),
                records.len()
            );
        }

        self.broadcast_packet(Packet::WorldUpdate { tick, records }, None);
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> ServerResult<()> {
        // Initialize concurrent tasks
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut tick_interval = interval(self.config.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Server started: {}x{} world, {} ms ticks",
            self.config.width,
            self.config.height,
            self.config.tick_duration.as_millis()
        );

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { player_id }) => {
                            self.handle_timeout(player_id).await;
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Handle server tick events
                _ = tick_interval.tick() => {
                    self.step().await;
                },
            }
        }

        Ok(())
    }
}
