//! # Dogfight Server Library
//!
//! This library provides the authoritative server for a small real-time
//! multiplayer arcade game: planes fly, shoot and collect power-ups in a
//! wrap-around 2D arena. The server steps every entity on a fixed tick and
//! broadcasts a compact snapshot of the world to all connected clients, which
//! render it and play the sounds it contains.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! All game logic runs here. Clients only send their control intents (turn,
//! fire, boost, brake) and receive the resulting world state; they never
//! decide positions, hits or scores.
//!
//! ### Session Management
//! Handles the lifecycle of players and bots:
//! - Joining, with the lowest free player id and a plane at the arena centre
//! - Control updates, with stale (reordered) packets dropped
//! - Leaving and inactivity timeouts
//! - Score bookkeeping and scoreboard broadcasts
//!
//! ### State Broadcasting
//! After every tick the world is serialized into an ordered list of records,
//! one per visible entity. Sound events appear in exactly one snapshot.
//!
//! ## Module Organization
//!
//! ### World Module (`world`)
//! Owns every entity, the simulation clock, deferred removal and the
//! brute-force spatial queries used for collisions and targeting.
//!
//! ### Entity Modules (`entity`, `plane`, `bullet`, `bonus`, `bot`)
//! The entity variants and their per-tick behaviour:
//! - Planes with their flight model, health, respawn and weapon buffs
//! - Bullets that hit the closest eligible plane or expire
//! - Bonuses granting a random buff, and the spawner that drops them
//! - Bots steering planes through the same intents a player uses
//!
//! ### Roster Module (`roster`)
//! Maps players to planes and keeps nicks and scores.
//!
//! ### Network Module (`network`)
//! UDP socket handling, the packet protocol and the tick loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     // 640x480 arena, 40 ms ticks, up to 16 players and two bots
//!     let config = ServerConfig {
//!         bots: 2,
//!         ..ServerConfig::default()
//!     };
//!     let mut server = Server::new("127.0.0.1:3000", config).await?;
//!
//!     // Runs until a shutdown message arrives:
//!     // - Applies join, control and leave packets between ticks
//!     // - Advances the world by the measured time since the last tick
//!     // - Broadcasts scores when they change and a snapshot every tick
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! The server runs these async tasks:
//! - **Network Receiver**: Continuously listens for incoming packets
//! - **Network Sender**: Sends replies and broadcasts to remote players
//! - **Timeout Checker**: Reports players that went silent
//! - **Main Loop**: Applies packets, ticks the world and broadcasts snapshots

pub mod bonus;
pub mod bot;
pub mod bullet;
pub mod entity;
pub mod network;
pub mod plane;
pub mod roster;
pub mod world;
