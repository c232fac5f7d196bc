//! Entity variants owned by the [`World`] and the capabilities they expose.
//!
//! Not every entity can do everything: a bot controller has no position and
//! is never sent to clients, a sound has no per-tick behaviour. The world
//! asks each variant for the capability it needs and skips the ones that do
//! not provide it.

use crate::bonus::{Bonus, BonusSpawner};
use crate::bot::Bot;
use crate::bullet::Bullet;
use crate::plane::Plane;
use crate::world::World;
use shared::{EntityKind, EntityRecord, SoundEffect, Vector2};

/// Stable handle of an entity inside one [`World`].
///
/// Handles are never reused, so a stale handle simply stops resolving once
/// its entity has been removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

/// Entities that advance their own state once per tick.
pub trait Updatable {
    /// Runs one simulation step. `id` is the entity's own handle; the entity
    /// is not visible to world queries while it is being updated.
    fn update(&mut self, id: EntityId, world: &mut World);
}

/// Entities that appear in the per-tick network snapshot.
pub trait Serializable {
    fn net_record(&self) -> EntityRecord;
}

#[derive(Debug, Clone)]
pub enum Entity {
    Plane(Plane),
    Bullet(Bullet),
    Bonus(Bonus),
    Sound(Sound),
    BonusSpawner(BonusSpawner),
    Bot(Bot),
}

impl Entity {
    /// Query and wire category; `None` for invisible controllers.
    pub fn kind(&self) -> Option<EntityKind> {
        match self {
            Entity::Plane(_) => Some(EntityKind::Plane),
            Entity::Bullet(_) => Some(EntityKind::Bullet),
            Entity::Bonus(_) => Some(EntityKind::Bonus),
            Entity::Sound(_) => Some(EntityKind::Sound),
            Entity::BonusSpawner(_) | Entity::Bot(_) => None,
        }
    }

    /// Position in the world, for entities that have one.
    pub fn position(&self) -> Option<Vector2> {
        match self {
            Entity::Plane(plane) => Some(plane.position()),
            Entity::Bullet(bullet) => Some(bullet.position()),
            Entity::Bonus(bonus) => Some(bonus.position()),
            Entity::Sound(_) | Entity::BonusSpawner(_) | Entity::Bot(_) => None,
        }
    }

    pub fn as_updatable(&mut self) -> Option<&mut dyn Updatable> {
        match self {
            Entity::Plane(plane) => Some(plane),
            Entity::Bullet(bullet) => Some(bullet),
            Entity::Bonus(bonus) => Some(bonus),
            Entity::BonusSpawner(spawner) => Some(spawner),
            Entity::Bot(bot) => Some(bot),
            Entity::Sound(_) => None,
        }
    }

    pub fn as_serializable(&self) -> Option<&dyn Serializable> {
        match self {
            Entity::Plane(plane) => Some(plane),
            Entity::Bullet(bullet) => Some(bullet),
            Entity::Bonus(bonus) => Some(bonus),
            Entity::Sound(sound) => Some(sound),
            Entity::BonusSpawner(_) | Entity::Bot(_) => None,
        }
    }

    /// True for entities that must be dropped after their first snapshot.
    pub fn is_transient(&self) -> bool {
        matches!(self, Entity::Sound(_))
    }

    pub fn as_plane(&self) -> Option<&Plane> {
        match self {
            Entity::Plane(plane) => Some(plane),
            _ => None,
        }
    }

    pub fn as_plane_mut(&mut self) -> Option<&mut Plane> {
        match self {
            Entity::Plane(plane) => Some(plane),
            _ => None,
        }
    }
}

impl From<Plane> for Entity {
    fn from(plane: Plane) -> Self {
        Entity::Plane(plane)
    }
}

impl From<Bullet> for Entity {
    fn from(bullet: Bullet) -> Self {
        Entity::Bullet(bullet)
    }
}

impl From<Bonus> for Entity {
    fn from(bonus: Bonus) -> Self {
        Entity::Bonus(bonus)
    }
}

impl From<Sound> for Entity {
    fn from(sound: Sound) -> Self {
        Entity::Sound(sound)
    }
}

impl From<BonusSpawner> for Entity {
    fn from(spawner: BonusSpawner) -> Self {
        Entity::BonusSpawner(spawner)
    }
}

impl From<Bot> for Entity {
    fn from(bot: Bot) -> Self {
        Entity::Bot(bot)
    }
}

/// A one-shot sound event. It exists only to be observed in a single
/// snapshot; the world removes it as soon as it has been serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sound {
    effect: SoundEffect,
}

impl Sound {
    pub fn new(effect: SoundEffect) -> Self {
        Self { effect }
    }

    pub fn effect(&self) -> SoundEffect {
        self.effect
    }
}

impl Serializable for Sound {
    fn net_record(&self) -> EntityRecord {
        EntityRecord::Sound {
            effect: self.effect,
        }
    }
}
