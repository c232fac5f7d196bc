//! Player and bot aircraft.
//!
//! A plane is alive while its health is positive. Alive planes fly according
//! to their control intents; dead planes ignore them, spin in place and come
//! back to full health after a fixed recovery delay.

use crate::bullet::Bullet;
use crate::entity::{EntityId, Serializable, Sound, Updatable};
use crate::world::World;
use shared::math::wrap_angle;
use shared::{ControlState, EntityRecord, SoundEffect, Vector2};
use std::f32::consts::PI;

pub const MAX_HEALTH: i32 = 100;

const BASE_TURN_RATE: f32 = 1.9; // rad/s
const BASE_SPEED: f32 = 100.0; // px/s
const BRAKE_SPEED_PENALTY: f32 = 40.0;
const BOOST_SPEED_BONUS: f32 = 75.0;
const MANEUVER_TURN_FACTOR: f32 = 1.2;

pub const MAX_BOOST_FUEL: f32 = 100.0;
const BOOST_CONSUMPTION: f32 = 40.0; // fuel per second
const BOOST_RECOVERY: f32 = 10.0; // fuel per second

const SPIN_TURN_RATE: f32 = 15.0;
pub const RECOVER_DELAY_MS: u64 = 1333;

pub const FIRE_DELAY_MS: u64 = 700;
const RAPID_FIRE_DELAY_FACTOR: f64 = 0.33;
pub const MULTI_SHOT_DURATION_MS: u64 = 15_000;
pub const RAPID_FIRE_DURATION_MS: u64 = 20_000;

/// Spread pattern of the multi-shot buff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiShot {
    /// Extra bullets sideways and backwards.
    Cross,
    /// Two extra bullets fanned out slightly ahead.
    Fan,
}

impl MultiShot {
    fn offsets(self) -> &'static [f32] {
        match self {
            MultiShot::Cross => &[-0.5 * PI, 0.5 * PI, PI],
            MultiShot::Fan => &[-0.125 * PI, 0.125 * PI],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneState {
    Alive,
    Spinning,
}

#[derive(Debug, Clone)]
pub struct Plane {
    player_id: u32,
    position: Vector2,
    /// Facing in `(-PI, PI]`; 0 flies right, positive is counter-clockwise.
    angle: f32,
    turn: i8,
    health: i32,

    firing: bool,
    boosting: bool,
    braking: bool,
    boost_fuel: f32,

    last_fire: Option<u64>,
    recover_at: u64,

    multi_shot: MultiShot,
    multi_shot_until: u64,
    rapid_fire_until: u64,
}

impl Plane {
    pub fn new(player_id: u32, position: Vector2) -> Self {
        Self {
            player_id,
            position,
            angle: 0.0,
            turn: 0,
            health: MAX_HEALTH,
            firing: false,
            boosting: false,
            braking: false,
            boost_fuel: MAX_BOOST_FUEL,
            last_fire: None,
            recover_at: 0,
            multi_shot: MultiShot::Cross,
            multi_shot_until: 0,
            rapid_fire_until: 0,
        }
    }

    pub fn player_id(&self) -> u32 {
        self.player_id
    }

    pub fn position(&self) -> Vector2 {
        self.position
    }

    pub fn set_position(&mut self, position: Vector2) {
        self.position = position;
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn set_angle(&mut self, angle: f32) {
        self.angle = wrap_angle(angle);
    }

    pub fn health(&self) -> i32 {
        self.health
    }

    pub fn boost_fuel(&self) -> f32 {
        self.boost_fuel
    }

    pub fn turn(&self) -> i8 {
        self.turn
    }

    pub fn is_firing(&self) -> bool {
        self.firing
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    pub fn state(&self) -> PlaneState {
        if self.is_alive() {
            PlaneState::Alive
        } else {
            PlaneState::Spinning
        }
    }

    /// Sets the turn direction, clamped to `-1..=1`.
    pub fn set_turn(&mut self, turn: i8) {
        self.turn = turn.clamp(-1, 1);
    }

    pub fn set_firing(&mut self, firing: bool) {
        self.firing = firing;
    }

    pub fn set_boosting(&mut self, boosting: bool) {
        self.boosting = boosting;
    }

    pub fn set_braking(&mut self, braking: bool) {
        self.braking = braking;
    }

    pub fn apply_control(&mut self, control: ControlState) {
        self.set_turn(control.turn);
        self.set_firing(control.firing);
        self.set_boosting(control.boosting);
        self.set_braking(control.braking);
    }

    /// Subtracts `amount` from health. Dropping to zero or below records the
    /// time the recovery delay counts from; a plane that is already down
    /// just loses more health.
    pub fn receive_damage(&mut self, amount: i32, now: u64) {
        let was_alive = self.is_alive();
        self.health -= amount;
        if was_alive && !self.is_alive() {
            self.recover_at = now + RECOVER_DELAY_MS;
        }
    }

    /// (Re)starts the multi-shot buff; reapplying extends rather than stacks.
    pub fn enable_multi_shot(&mut self, pattern: MultiShot, now: u64) {
        self.multi_shot = pattern;
        self.multi_shot_until = now + MULTI_SHOT_DURATION_MS;
    }

    pub fn enable_rapid_fire(&mut self, now: u64) {
        self.rapid_fire_until = now + RAPID_FIRE_DURATION_MS;
    }

    pub fn multi_shot(&self, now: u64) -> Option<MultiShot> {
        (now < self.multi_shot_until).then_some(self.multi_shot)
    }

    pub fn has_rapid_fire(&self, now: u64) -> bool {
        now < self.rapid_fire_until
    }

    fn can_fire(&self, now: u64) -> bool {
        let Some(last_fire) = self.last_fire else {
            return true;
        };
        let factor = if self.has_rapid_fire(now) {
            RAPID_FIRE_DELAY_FACTOR
        } else {
            1.0
        };
        now as f64 > last_fire as f64 + FIRE_DELAY_MS as f64 * factor
    }

    /// Fires along the current facing, plus the multi-shot pattern if that
    /// buff is active, and emits a firing sound.
    pub fn fire(&mut self, world: &mut World) {
        let now = world.time();
        self.last_fire = Some(now);

        world.add(Bullet::new(self.position, self.angle, self.player_id, now));
        if let Some(pattern) = self.multi_shot(now) {
            for offset in pattern.offsets() {
                world.add(Bullet::new(
                    self.position,
                    wrap_angle(self.angle + offset),
                    self.player_id,
                    now,
                ));
            }
        }
        world.add(Sound::new(SoundEffect::Fire));
    }

    /// Turn rate and speed from the intents, updating the boost gauge.
    fn flight_controls(&mut self, dt: f32) -> (i8, f32, f32) {
        let mut turn_rate = BASE_TURN_RATE;
        let mut speed = BASE_SPEED;

        if self.braking {
            speed -= BRAKE_SPEED_PENALTY;
            turn_rate *= MANEUVER_TURN_FACTOR;
        }

        if self.boosting {
            self.boost_fuel -= BOOST_CONSUMPTION * dt;
            if self.boost_fuel > 0.0 {
                speed += BOOST_SPEED_BONUS;
                turn_rate *= MANEUVER_TURN_FACTOR;
            }
        } else {
            self.boost_fuel += BOOST_RECOVERY * dt;
        }
        self.boost_fuel = self.boost_fuel.clamp(0.0, MAX_BOOST_FUEL);

        (self.turn, turn_rate, speed)
    }

    fn spin(&mut self, dt: f32, now: u64) -> (i8, f32, f32) {
        self.boost_fuel = (self.boost_fuel + BOOST_RECOVERY * dt).min(MAX_BOOST_FUEL);
        if now >= self.recover_at {
            self.health = MAX_HEALTH;
        }
        (1, SPIN_TURN_RATE, 0.0)
    }
}

impl Updatable for Plane {
    fn update(&mut self, _id: EntityId, world: &mut World) {
        let dt = world.timedelta();
        let now = world.time();

        let (turn, turn_rate, speed) = match self.state() {
            PlaneState::Alive => self.flight_controls(dt),
            PlaneState::Spinning => self.spin(dt, now),
        };

        self.angle = wrap_angle(self.angle + turn as f32 * turn_rate * dt);
        let step = Vector2::from_angle(self.angle).scale(speed * dt);
        self.position = world.wrap(self.position.add(&step));

        if self.firing && self.is_alive() && self.can_fire(now) {
            self.fire(world);
        }
    }
}

impl Serializable for Plane {
    fn net_record(&self) -> EntityRecord {
        EntityRecord::plane(self.player_id, self.position, self.angle)
    }
}
