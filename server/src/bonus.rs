//! Power-ups drifting through the arena and the spawner that drops them.

use crate::entity::{EntityId, Serializable, Sound, Updatable};
use crate::plane::{MultiShot, Plane};
use crate::world::World;
use log::debug;
use rand::Rng;
use shared::{EntityKind, EntityRecord, SoundEffect, Vector2};
use std::f32::consts::PI;

pub const BONUS_SPEED: f32 = 40.0;
pub const BONUS_LIFETIME_MS: u64 = 10_000;
pub const PICKUP_RADIUS: f32 = 20.0;

pub const SPAWN_BASE_DELAY_MS: u64 = 15_000;
pub const SPAWN_JITTER_MS: u64 = 45_000;

/// Buff granted by a bonus pickup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Buff {
    MultiShot(MultiShot),
    RapidFire,
}

impl Buff {
    /// Picks one of the three buffs with equal probability.
    pub fn roll(rng: &mut impl Rng) -> Self {
        let roll: f32 = rng.gen();
        if roll < 0.33 {
            Buff::MultiShot(MultiShot::Cross)
        } else if roll < 0.66 {
            Buff::MultiShot(MultiShot::Fan)
        } else {
            Buff::RapidFire
        }
    }

    pub fn apply(self, plane: &mut Plane, now: u64) {
        match self {
            Buff::MultiShot(pattern) => plane.enable_multi_shot(pattern, now),
            Buff::RapidFire => plane.enable_rapid_fire(now),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Bonus {
    position: Vector2,
    angle: f32,
    expires_at: u64,
}

impl Bonus {
    pub fn new(position: Vector2, angle: f32, now: u64) -> Self {
        Self {
            position,
            angle,
            expires_at: now + BONUS_LIFETIME_MS,
        }
    }

    pub fn position(&self) -> Vector2 {
        self.position
    }

    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }
}

impl Updatable for Bonus {
    fn update(&mut self, id: EntityId, world: &mut World) {
        let now = world.time();
        let step = Vector2::from_angle(self.angle).scale(BONUS_SPEED * world.timedelta());
        self.position = world.wrap(self.position.add(&step));

        // Any plane in reach collects it, even one that is currently down.
        let collector = world.find_closest_within_radius(
            id,
            self.position,
            PICKUP_RADIUS,
            Some(EntityKind::Plane),
        );
        if let Some(collector) = collector {
            let buff = Buff::roll(world.rng());
            if let Some(plane) = world.plane_mut(collector) {
                buff.apply(plane, now);
                debug!("Player {} picked up {:?}", plane.player_id(), buff);
            }
            world.add(Sound::new(SoundEffect::BonusPickup));
            world.request_removal(id);
        } else if now >= self.expires_at {
            world.request_removal(id);
        }
    }
}

impl Serializable for Bonus {
    fn net_record(&self) -> EntityRecord {
        EntityRecord::bonus(self.position)
    }
}

/// Invisible entity that periodically drops a bonus somewhere in the arena,
/// but only while there is at least one plane around to collect it.
#[derive(Debug, Clone, Default)]
pub struct BonusSpawner {
    next_spawn: u64,
}

impl BonusSpawner {
    pub fn new() -> Self {
        Self { next_spawn: 0 }
    }

    pub fn next_spawn(&self) -> u64 {
        self.next_spawn
    }
}

impl Updatable for BonusSpawner {
    fn update(&mut self, _id: EntityId, world: &mut World) {
        let now = world.time();
        if now < self.next_spawn {
            return;
        }
        let jitter = world.rng().gen_range(0..SPAWN_JITTER_MS);
        self.next_spawn = now + SPAWN_BASE_DELAY_MS + jitter;

        if world.find_by_kind(EntityKind::Plane).is_empty() {
            return;
        }

        let position = world.random_position();
        let angle = world.rng().gen_range(-PI..PI);
        world.add(Bonus::new(position, angle, now));
        world.add(Sound::new(SoundEffect::BonusSpawn));
        debug!(
            "Spawned bonus at ({:.0}, {:.0}), next in {} ms",
            position.x,
            position.y,
            self.next_spawn - now
        );
    }
}
