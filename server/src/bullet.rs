use crate::entity::{EntityId, Serializable, Sound, Updatable};
use crate::world::World;
use shared::{EntityKind, EntityRecord, SoundEffect, Vector2};

pub const BULLET_SPEED: f32 = 300.0;
pub const BULLET_LIFETIME_MS: u64 = 700;
pub const HIT_RADIUS: f32 = 20.0;
pub const BULLET_DAMAGE: i32 = 200;

/// A projectile flying in a straight line until it hits a plane or expires.
#[derive(Debug, Clone)]
pub struct Bullet {
    position: Vector2,
    angle: f32,
    shooter: u32,
    expires_at: u64,
}

impl Bullet {
    pub fn new(position: Vector2, angle: f32, shooter: u32, now: u64) -> Self {
        Self {
            position,
            angle,
            shooter,
            expires_at: now + BULLET_LIFETIME_MS,
        }
    }

    pub fn position(&self) -> Vector2 {
        self.position
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn shooter(&self) -> u32 {
        self.shooter
    }

    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }

    /// Damages the closest eligible plane, returning its player id.
    ///
    /// Only the closest plane counts: if that is the shooter's own plane, or
    /// a plane that is already down, nothing is hit this tick.
    fn try_hit(&self, id: EntityId, world: &mut World) -> Option<u32> {
        let now = world.time();
        let target =
            world.find_closest_within_radius(id, self.position, HIT_RADIUS, Some(EntityKind::Plane))?;
        let plane = world.plane_mut(target)?;
        if plane.player_id() == self.shooter || !plane.is_alive() {
            return None;
        }

        plane.receive_damage(BULLET_DAMAGE, now);
        Some(plane.player_id())
    }
}

impl Updatable for Bullet {
    fn update(&mut self, id: EntityId, world: &mut World) {
        let step = Vector2::from_angle(self.angle).scale(BULLET_SPEED * world.timedelta());
        self.position = world.wrap(self.position.add(&step));

        if let Some(victim) = self.try_hit(id, world) {
            world.add(Sound::new(SoundEffect::Hit));
            world.emit_score(1, self.shooter, Some(victim));
            world.request_removal(id);
        } else if world.time() >= self.expires_at {
            world.request_removal(id);
        }
    }
}

impl Serializable for Bullet {
    fn net_record(&self) -> EntityRecord {
        EntityRecord::bullet(self.position)
    }
}
