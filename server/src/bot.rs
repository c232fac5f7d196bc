use crate::entity::{EntityId, Updatable};
use crate::world::World;
use rand::Rng;
use shared::math::angle_difference;
use shared::EntityKind;

pub const TARGET_RADIUS: f32 = 200.0;
pub const RETARGET_INTERVAL_MS: u64 = 100;
/// Maximum angle between facing and bearing at which a bot opens fire.
pub const FIRE_CONE: f32 = 0.5;
pub const MAX_WANDER_INTERVAL_MS: u64 = 2000;

/// Scripted controller driving one plane through the same intents a human
/// player would set. It never aims: it flies straight or wanders, and pulls
/// the trigger whenever a nearby plane happens to be in front of it.
#[derive(Debug, Clone)]
pub struct Bot {
    plane: EntityId,
    next_target: u64,
    next_turn: u64,
    target: Option<EntityId>,
}

impl Bot {
    pub fn new(plane: EntityId, now: u64) -> Self {
        Self {
            plane,
            next_target: now,
            next_turn: now,
            target: None,
        }
    }

    /// Handle of the plane this bot flies.
    pub fn plane(&self) -> EntityId {
        self.plane
    }

    pub fn target(&self) -> Option<EntityId> {
        self.target
    }
}

impl Updatable for Bot {
    fn update(&mut self, id: EntityId, world: &mut World) {
        let now = world.time();
        let Some(own) = world.plane(self.plane) else {
            // The plane is gone; the controller goes with it.
            world.request_removal(id);
            return;
        };
        let own_position = own.position();
        let own_angle = own.angle();

        if now >= self.next_target {
            self.target = world.find_closest_within_radius(
                self.plane,
                own_position,
                TARGET_RADIUS,
                Some(EntityKind::Plane),
            );
            self.next_target = now + RETARGET_INTERVAL_MS;
        }

        let target_position = self
            .target
            .and_then(|target| world.plane(target))
            .map(|target| target.position());

        match target_position {
            Some(target_position) => {
                let bearing = own_position.bearing_to(&target_position);
                let aligned = angle_difference(own_angle, bearing).abs() < FIRE_CONE;
                if let Some(plane) = world.plane_mut(self.plane) {
                    plane.set_firing(aligned);
                }
            }
            None => {
                let wander = if now >= self.next_turn {
                    let roll: f32 = world.rng().gen();
                    let turn = if roll < 0.4 {
                        1
                    } else if roll > 0.6 {
                        -1
                    } else {
                        0
                    };
                    self.next_turn = now + world.rng().gen_range(0..MAX_WANDER_INTERVAL_MS);
                    Some(turn)
                } else {
                    None
                };

                if let Some(plane) = world.plane_mut(self.plane) {
                    plane.set_firing(false);
                    if let Some(turn) = wander {
                        plane.set_turn(turn);
                    }
                }
            }
        }
    }
}
