//! Session roster: who is playing, which plane they fly and their score
//!
//! The roster sits between the network layer and the [`World`]. It owns the
//! association between players and their planes and is the only place that
//! creates or retires planes on behalf of players:
//! - Remote players joining from a socket address, with inactivity timeouts
//! - Server-side bots, each driven by a [`Bot`] controller entity
//! - Score bookkeeping fed from the world's score events
//!
//! Player ids are small integers; the lowest free id is handed out on join,
//! so ids of departed players are reused.

use crate::bot::Bot;
use crate::entity::EntityId;
use crate::plane::Plane;
use crate::world::{ScoreEvent, World};
use log::{debug, info};
use shared::{sanitize_nick, ControlState, ScoreEntry, Vector2};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Remote clients that stay silent this long are dropped.
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Who is flying a participant's plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Controller {
    Remote { addr: SocketAddr },
    Bot { bot: EntityId },
}

#[derive(Debug)]
pub struct Participant {
    pub player_id: u32,
    pub nick: String,
    pub score: i32,
    pub plane: EntityId,
    pub controller: Controller,
    /// Last time any packet arrived from this participant
    pub last_seen: Instant,
    /// Highest control sequence applied so far
    pub last_sequence: Option<u32>,
}

impl Participant {
    pub fn addr(&self) -> Option<SocketAddr> {
        match self.controller {
            Controller::Remote { addr } => Some(addr),
            Controller::Bot { .. } => None,
        }
    }

    pub fn is_bot(&self) -> bool {
        matches!(self.controller, Controller::Bot { .. })
    }

    /// Bots never time out.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        !self.is_bot() && self.last_seen.elapsed() > timeout
    }
}

pub struct Roster {
    participants: BTreeMap<u32, Participant>,
    /// Maximum number of remote players; bots do not count
    max_clients: usize,
}

impl Roster {
    pub fn new(max_clients: usize) -> Self {
        Self {
            participants: BTreeMap::new(),
            max_clients,
        }
    }

    fn next_free_id(&self) -> u32 {
        (0..)
            .find(|id| !self.participants.contains_key(id))
            .unwrap_or_default()
    }

    fn remote_count(&self) -> usize {
        self.participants.values().filter(|p| !p.is_bot()).count()
    }

    fn spawn_point(world: &World) -> Vector2 {
        Vector2::new(world.width() / 2.0, world.height() / 2.0)
    }

    /// Admits a remote player and spawns their plane at the world centre.
    ///
    /// Returns None when the server is full.
    pub fn join(&mut self, addr: SocketAddr, nick: &str, world: &mut World) -> Option<u32> {
        if self.remote_count() >= self.max_clients {
            return None;
        }

        let player_id = self.next_free_id();
        let nick = sanitize_nick(nick);
        let spawn = Self::spawn_point(world);
        let plane = world.add(Plane::new(player_id, spawn));

        info!("Player {} ({}) joined from {}", player_id, nick, addr);
        self.participants.insert(
            player_id,
            Participant {
                player_id,
                nick,
                score: 0,
                plane,
                controller: Controller::Remote { addr },
                last_seen: Instant::now(),
                last_sequence: None,
            },
        );
        Some(player_id)
    }

    /// Adds a bot-controlled plane together with its controller.
    pub fn add_bot(&mut self, world: &mut World) -> u32 {
        let player_id = self.next_free_id();
        let spawn = Self::spawn_point(world);
        let now = world.time();
        let plane = world.add(Plane::new(player_id, spawn));
        let bot = world.add(Bot::new(plane, now));
        let nick = format!("bot{}", player_id);

        info!("Bot {} added as player {}", nick, player_id);
        self.participants.insert(
            player_id,
            Participant {
                player_id,
                nick,
                score: 0,
                plane,
                controller: Controller::Bot { bot },
                last_seen: Instant::now(),
                last_sequence: None,
            },
        );
        player_id
    }

    /// Retires the most recently added bot, if any.
    pub fn retire_bot(&mut self, world: &mut World) -> Option<u32> {
        let player_id = self
            .participants
            .values()
            .rev()
            .find(|p| p.is_bot())
            .map(|p| p.player_id)?;
        self.leave(player_id, world);
        Some(player_id)
    }

    /// Removes a participant and queues their plane (and bot controller)
    /// for removal. Returns false if the player was already gone.
    pub fn leave(&mut self, player_id: u32, world: &mut World) -> bool {
        let Some(participant) = self.participants.remove(&player_id) else {
            return false;
        };

        world.request_removal(participant.plane);
        if let Controller::Bot { bot } = participant.controller {
            world.request_removal(bot);
        }
        info!("Player {} ({}) left", player_id, participant.nick);
        true
    }

    pub fn find_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.participants
            .values()
            .find(|p| p.addr() == Some(addr))
            .map(|p| p.player_id)
    }

    pub fn get(&self, player_id: u32) -> Option<&Participant> {
        self.participants.get(&player_id)
    }

    /// Marks a remote player as active without changing anything else.
    pub fn touch(&mut self, player_id: u32) {
        if let Some(participant) = self.participants.get_mut(&player_id) {
            participant.last_seen = Instant::now();
        }
    }

    /// Applies a control update to the player's plane.
    ///
    /// Updates older than the last applied sequence were reordered in
    /// transit and are dropped. Returns whether the control was applied.
    pub fn apply_control(
        &mut self,
        player_id: u32,
        sequence: u32,
        control: ControlState,
        world: &mut World,
    ) -> bool {
        let Some(participant) = self.participants.get_mut(&player_id) else {
            return false;
        };
        participant.last_seen = Instant::now();

        if participant.last_sequence.is_some_and(|last| sequence < last) {
            debug!(
                "Dropping stale control {} from player {}",
                sequence, player_id
            );
            return false;
        }
        participant.last_sequence = Some(sequence);

        match world.plane_mut(participant.plane) {
            Some(plane) => {
                plane.apply_control(control);
                true
            }
            None => false,
        }
    }

    /// Credits the scorer of `event`. Events for players that have already
    /// left are ignored.
    pub fn record_score(&mut self, event: ScoreEvent) {
        if let Some(scorer) = self.participants.get_mut(&event.scorer) {
            scorer.score += event.points;
            info!("New score for {}: {}", scorer.nick, scorer.score);
        }
    }

    /// Score table ordered by player id.
    pub fn scoreboard(&self) -> Vec<ScoreEntry> {
        self.participants
            .values()
            .map(|p| ScoreEntry {
                player_id: p.player_id,
                nick: p.nick.clone(),
                score: p.score,
            })
            .collect()
    }

    /// Remote players that have been silent for longer than `timeout`.
    pub fn timed_out(&self, timeout: Duration) -> Vec<u32> {
        self.participants
            .values()
            .filter(|p| p.is_timed_out(timeout))
            .map(|p| p.player_id)
            .collect()
    }

    /// Addresses of every remote player, for broadcasting.
    pub fn client_addrs(&self) -> Vec<(u32, SocketAddr)> {
        self.participants
            .values()
            .filter_map(|p| p.addr().map(|addr| (p.player_id, addr)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}
