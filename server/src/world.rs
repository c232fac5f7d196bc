//! The authoritative world: entity ownership, the simulation clock, deferred
//! removal and the brute-force spatial queries entities use during a tick.
//!
//! A tick runs in three phases:
//!
//! 1. advance the clock and compute the frame delta from measured time,
//! 2. drop every entity whose removal was requested since the last tick,
//! 3. update every updatable entity that was live when the tick started,
//!    in insertion order.
//!
//! Entities spawned during phase 3 are visible to queries immediately but
//! are first updated on the following tick, so a freshly fired bullet never
//! moves twice in the tick it was created. Removal requests made during a
//! tick take effect at the start of the next one; until then the entity is
//! still queried, updated and serialized normally.

use crate::entity::{Entity, EntityId};
use crate::plane::Plane;
use log::trace;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{EntityKind, EntityRecord, Vector2};
use std::collections::{HashMap, HashSet};
use std::time::Instant;

/// Points awarded to a player, optionally at the expense of another one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreEvent {
    pub points: i32,
    pub scorer: u32,
    pub victim: Option<u32>,
}

pub type ScoreSink = Box<dyn FnMut(ScoreEvent) + Send>;

pub struct World {
    width: f32,
    height: f32,

    /// Live entities in insertion order; this is the update and snapshot order.
    order: Vec<EntityId>,
    entities: HashMap<EntityId, Entity>,
    pending_removal: HashSet<EntityId>,
    next_id: u64,

    epoch: Instant,
    /// Simulation clock in milliseconds.
    time: u64,
    last_tick: u64,
    /// Seconds elapsed between the last two ticks.
    timedelta: f32,
    tick_count: u32,

    score_sink: ScoreSink,
    rng: StdRng,
}

impl World {
    pub fn new(width: f32, height: f32) -> Self {
        Self::with_rng(width, height, StdRng::from_entropy())
    }

    /// Creates a world whose random choices are reproducible.
    pub fn with_seed(width: f32, height: f32, seed: u64) -> Self {
        Self::with_rng(width, height, StdRng::seed_from_u64(seed))
    }

    fn with_rng(width: f32, height: f32, rng: StdRng) -> Self {
        Self {
            width,
            height,
            order: Vec::new(),
            entities: HashMap::new(),
            pending_removal: HashSet::new(),
            next_id: 1,
            epoch: Instant::now(),
            time: 0,
            last_tick: 0,
            timedelta: 0.0,
            tick_count: 0,
            score_sink: Box::new(|_| {}),
            rng,
        }
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    /// Current simulation time in milliseconds.
    pub fn time(&self) -> u64 {
        self.time
    }

    /// Frame delta of the current tick in seconds.
    pub fn timedelta(&self) -> f32 {
        self.timedelta
    }

    pub fn tick_count(&self) -> u32 {
        self.tick_count
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Advances the world to the wall-clock time since it was created.
    pub fn tick(&mut self) {
        let now = self.epoch.elapsed().as_millis() as u64;
        self.tick_at(now);
    }

    /// Advances the world to `now` milliseconds. Time never runs backwards;
    /// an earlier `now` results in a zero-length tick.
    pub fn tick_at(&mut self, now: u64) {
        let now = now.max(self.time);
        self.time = now;
        self.timedelta = (now - self.last_tick) as f32 * 0.001;
        self.last_tick = now;
        self.tick_count = self.tick_count.wrapping_add(1);

        self.apply_removals();

        let live: Vec<EntityId> = self.order.clone();
        for id in live {
            // Take the entity out so it can mutate the rest of the world.
            let Some(mut entity) = self.entities.remove(&id) else {
                continue;
            };
            if let Some(updatable) = entity.as_updatable() {
                updatable.update(id, self);
            }
            self.entities.insert(id, entity);
        }
    }

    fn apply_removals(&mut self) {
        if self.pending_removal.is_empty() {
            return;
        }

        let pending = std::mem::take(&mut self.pending_removal);
        self.order.retain(|id| !pending.contains(id));
        for id in &pending {
            self.entities.remove(id);
        }
        trace!("Removed {} entities", pending.len());
    }

    /// Inserts a new entity at the end of the update order.
    ///
    /// Entities are moved into the world, so the same entity can never be
    /// present twice; the returned handle identifies it from now on.
    pub fn add(&mut self, entity: impl Into<Entity>) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        self.order.push(id);
        self.entities.insert(id, entity.into());
        id
    }

    /// Queues `id` for removal at the next tick boundary. Repeated requests,
    /// and requests for entities that are already gone, are no-ops.
    pub fn request_removal(&mut self, id: EntityId) {
        self.pending_removal.insert(id);
    }

    pub fn is_pending_removal(&self, id: EntityId) -> bool {
        self.pending_removal.contains(&id)
    }

    /// True while `id` is part of the live set, including the entity that is
    /// currently being updated.
    pub fn contains(&self, id: EntityId) -> bool {
        self.order.contains(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn plane(&self, id: EntityId) -> Option<&Plane> {
        self.get(id).and_then(Entity::as_plane)
    }

    pub fn plane_mut(&mut self, id: EntityId) -> Option<&mut Plane> {
        self.get_mut(id).and_then(Entity::as_plane_mut)
    }

    /// Live entities in update order, skipping the one currently updating.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> + '_ {
        self.order
            .iter()
            .filter_map(move |id| self.entities.get(id).map(|entity| (*id, entity)))
    }

    /// Positioned entities of the optional `kind`, excluding `origin`.
    fn candidates(
        &self,
        origin: EntityId,
        kind: Option<EntityKind>,
    ) -> impl Iterator<Item = (EntityId, Vector2)> + '_ {
        self.iter().filter_map(move |(id, entity)| {
            if id == origin {
                return None;
            }
            if kind.is_some() && entity.kind() != kind {
                return None;
            }
            entity.position().map(|position| (id, position))
        })
    }

    /// Every entity other than `origin` within `radius` of `at`.
    pub fn find_within_radius(
        &self,
        origin: EntityId,
        at: Vector2,
        radius: f32,
        kind: Option<EntityKind>,
    ) -> Vec<EntityId> {
        let radius_squared = radius * radius;
        self.candidates(origin, kind)
            .filter(|(_, position)| at.distance_squared(position) <= radius_squared)
            .map(|(id, _)| id)
            .collect()
    }

    /// The nearest entity other than `origin` within `radius` of `at`.
    /// On equal distances the entity earlier in update order wins.
    pub fn find_closest_within_radius(
        &self,
        origin: EntityId,
        at: Vector2,
        radius: f32,
        kind: Option<EntityKind>,
    ) -> Option<EntityId> {
        let radius_squared = radius * radius;
        let mut best: Option<(EntityId, f32)> = None;

        for (id, position) in self.candidates(origin, kind) {
            let distance_squared = at.distance_squared(&position);
            if distance_squared > radius_squared {
                continue;
            }
            match best {
                Some((_, best_distance)) if distance_squared >= best_distance => {}
                _ => best = Some((id, distance_squared)),
            }
        }

        best.map(|(id, _)| id)
    }

    pub fn find_by_kind(&self, kind: EntityKind) -> Vec<EntityId> {
        self.iter()
            .filter(|(_, entity)| entity.kind() == Some(kind))
            .map(|(id, _)| id)
            .collect()
    }

    pub fn set_score_sink(&mut self, sink: ScoreSink) {
        self.score_sink = sink;
    }

    pub fn emit_score(&mut self, points: i32, scorer: u32, victim: Option<u32>) {
        (self.score_sink)(ScoreEvent {
            points,
            scorer,
            victim,
        });
    }

    /// Wire records for every serializable entity, in update order.
    ///
    /// Transient entities (sounds) are queued for removal as they are
    /// serialized, so each one shows up in exactly one snapshot.
    pub fn snapshot(&mut self) -> Vec<EntityRecord> {
        let mut records = Vec::new();
        let mut transient = Vec::new();

        for (id, entity) in self.iter() {
            if let Some(serializable) = entity.as_serializable() {
                records.push(serializable.net_record());
                if entity.is_transient() {
                    transient.push(id);
                }
            }
        }

        for id in transient {
            self.request_removal(id);
        }
        records
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Uniformly random point inside the world.
    pub fn random_position(&mut self) -> Vector2 {
        let x = self.rng.gen::<f32>() * self.width;
        let y = self.rng.gen::<f32>() * self.height;
        Vector2::new(x, y).wrapped(self.width, self.height)
    }

    /// Wraps a position onto the world torus.
    pub fn wrap(&self, position: Vector2) -> Vector2 {
        position.wrapped(self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bullet::Bullet;
    use crate::entity::Sound;
    use shared::SoundEffect;
    use std::sync::{Arc, Mutex};

    fn test_world() -> World {
        World::with_seed(640.0, 480.0, 7)
    }

    fn plane_at(world: &mut World, player_id: u32, x: f32, y: f32) -> EntityId {
        world.add(Plane::new(player_id, Vector2::new(x, y)))
    }

    #[test]
    fn test_tick_advances_clock() {
        let mut world = test_world();
        world.tick_at(40);
        assert_eq!(world.time(), 40);
        assert!((world.timedelta() - 0.04).abs() < 1e-6);

        world.tick_at(100);
        assert_eq!(world.time(), 100);
        assert!((world.timedelta() - 0.06).abs() < 1e-6);
        assert_eq!(world.tick_count(), 2);
    }

    #[test]
    fn test_clock_never_runs_backwards() {
        let mut world = test_world();
        world.tick_at(100);
        world.tick_at(50);
        assert_eq!(world.time(), 100);
        assert_eq!(world.timedelta(), 0.0);
    }

    #[test]
    fn test_removal_is_deferred_to_next_tick() {
        let mut world = test_world();
        let plane = plane_at(&mut world, 1, 100.0, 100.0);

        world.request_removal(plane);
        assert!(world.contains(plane));
        assert!(world.is_pending_removal(plane));
        assert_eq!(world.find_by_kind(EntityKind::Plane), vec![plane]);

        world.tick_at(40);
        assert!(!world.contains(plane));
        assert!(world.get(plane).is_none());
        assert!(world.find_by_kind(EntityKind::Plane).is_empty());
    }

    #[test]
    fn test_double_removal_is_noop() {
        let mut world = test_world();
        let plane = plane_at(&mut world, 1, 100.0, 100.0);
        let other = plane_at(&mut world, 2, 200.0, 100.0);

        world.request_removal(plane);
        world.request_removal(plane);
        world.tick_at(40);
        world.request_removal(plane);
        world.tick_at(80);

        assert_eq!(world.len(), 1);
        assert!(world.contains(other));
    }

    #[test]
    fn test_find_within_radius_excludes_origin_and_filters_kind() {
        let mut world = test_world();
        let origin = plane_at(&mut world, 1, 100.0, 100.0);
        let near = plane_at(&mut world, 2, 110.0, 100.0);
        let _far = plane_at(&mut world, 3, 300.0, 100.0);
        let bullet = world.add(Bullet::new(Vector2::new(105.0, 100.0), 0.0, 1, 0));

        let at = Vector2::new(100.0, 100.0);
        let all = world.find_within_radius(origin, at, 20.0, None);
        assert_eq!(all, vec![near, bullet]);

        let planes = world.find_within_radius(origin, at, 20.0, Some(EntityKind::Plane));
        assert_eq!(planes, vec![near]);
    }

    #[test]
    fn test_find_within_radius_is_inclusive() {
        let mut world = test_world();
        let origin = plane_at(&mut world, 1, 100.0, 100.0);
        let edge = plane_at(&mut world, 2, 120.0, 100.0);

        let found = world.find_within_radius(origin, Vector2::new(100.0, 100.0), 20.0, None);
        assert_eq!(found, vec![edge]);
    }

    #[test]
    fn test_find_closest_picks_nearest() {
        let mut world = test_world();
        let origin = plane_at(&mut world, 1, 100.0, 100.0);
        let _mid = plane_at(&mut world, 2, 115.0, 100.0);
        let nearest = plane_at(&mut world, 3, 100.0, 105.0);

        let found = world.find_closest_within_radius(
            origin,
            Vector2::new(100.0, 100.0),
            20.0,
            Some(EntityKind::Plane),
        );
        assert_eq!(found, Some(nearest));
    }

    #[test]
    fn test_find_closest_ties_go_to_first_encountered() {
        let mut world = test_world();
        let origin = plane_at(&mut world, 1, 100.0, 100.0);
        let first = plane_at(&mut world, 2, 110.0, 100.0);
        let _second = plane_at(&mut world, 3, 90.0, 100.0);

        let found = world.find_closest_within_radius(origin, Vector2::new(100.0, 100.0), 20.0, None);
        assert_eq!(found, Some(first));
    }

    #[test]
    fn test_queries_on_empty_world() {
        let world = test_world();
        let at = Vector2::new(10.0, 10.0);
        assert!(world.find_within_radius(EntityId(99), at, 50.0, None).is_empty());
        assert!(world
            .find_closest_within_radius(EntityId(99), at, 50.0, None)
            .is_none());
        assert!(world.find_by_kind(EntityKind::Plane).is_empty());
    }

    #[test]
    fn test_snapshot_order_and_sound_lifetime() {
        let mut world = test_world();
        world.add(Plane::new(4, Vector2::new(10.0, 20.0)));
        let sound = world.add(Sound::new(SoundEffect::Fire));

        let records = world.snapshot();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].kind(), EntityKind::Plane);
        assert_eq!(records[1].kind(), EntityKind::Sound);
        assert!(world.is_pending_removal(sound));

        world.tick_at(40);
        let records = world.snapshot();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind(), EntityKind::Plane);
    }

    #[test]
    fn test_emit_score_reaches_sink() {
        let mut world = test_world();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink_events = Arc::clone(&events);
        world.set_score_sink(Box::new(move |event| {
            sink_events.lock().unwrap().push(event);
        }));

        world.emit_score(1, 2, Some(3));
        world.emit_score(5, 4, None);

        let events = events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                ScoreEvent {
                    points: 1,
                    scorer: 2,
                    victim: Some(3)
                },
                ScoreEvent {
                    points: 5,
                    scorer: 4,
                    victim: None
                },
            ]
        );
    }

    #[test]
    fn test_entities_spawned_mid_tick_wait_for_next_tick() {
        let mut world = test_world();
        let shooter = plane_at(&mut world, 1, 100.0, 100.0);
        world.plane_mut(shooter).unwrap().set_firing(true);

        world.tick_at(40);
        let bullets = world.find_by_kind(EntityKind::Bullet);
        assert_eq!(bullets.len(), 1);

        // The bullet was fired from the plane's post-move position and has not moved yet.
        let plane_pos = world.plane(shooter).unwrap().position();
        let bullet_pos = world.get(bullets[0]).unwrap().position().unwrap();
        assert_eq!(plane_pos, bullet_pos);
    }

    #[test]
    fn test_random_position_inside_world() {
        let mut world = test_world();
        for _ in 0..100 {
            let p = world.random_position();
            assert!(p.x >= 0.0 && p.x < 640.0);
            assert!(p.y >= 0.0 && p.y < 480.0);
        }
    }
}
