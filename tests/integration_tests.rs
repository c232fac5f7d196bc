//! Integration tests for the dogfight server
//!
//! These tests drive the world through full ticks and exercise the server
//! over a real UDP socket.

use bincode::{deserialize, serialize};
use server::bonus::BonusSpawner;
use server::bullet::Bullet;
use server::entity::{Entity, EntityId, Sound};
use server::network::{Server, ServerConfig, ServerMessage};
use server::plane::{MultiShot, Plane, MAX_HEALTH, RECOVER_DELAY_MS};
use server::roster::Roster;
use server::world::{ScoreEvent, World};
use shared::{EntityKind, EntityRecord, Packet, SoundEffect, Vector2, PROTOCOL_VERSION};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

fn arena() -> World {
    World::with_seed(640.0, 480.0, 42)
}

fn sounds(world: &World) -> Vec<SoundEffect> {
    world
        .iter()
        .filter_map(|(_, entity)| match entity {
            Entity::Sound(sound) => Some(sound.effect()),
            _ => None,
        })
        .collect()
}

/// SIMULATION SCENARIOS
mod simulation_tests {
    use super::*;

    /// One bullet from A crosses the 10 units to B and kills it
    #[test]
    fn bullet_hits_neighbouring_plane() {
        let mut world = arena();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        world.set_score_sink(Box::new(move |event| sink.lock().unwrap().push(event)));

        let a = world.add(Plane::new(0, Vector2::new(320.0, 240.0)));
        let b = world.add(Plane::new(1, Vector2::new(330.0, 240.0)));

        // A fires from (320, 240) along angle 0.
        let mut shooter = world.plane(a).unwrap().clone();
        shooter.fire(&mut world);
        let bullets = world.find_by_kind(EntityKind::Bullet);
        assert_eq!(bullets.len(), 1);
        assert_eq!(
            world.get(bullets[0]).unwrap().position(),
            Some(Vector2::new(320.0, 240.0))
        );

        world.tick_at(34);

        assert_eq!(world.plane(b).unwrap().health(), -100);
        assert_eq!(world.plane(a).unwrap().health(), MAX_HEALTH);
        assert_eq!(sounds(&world), vec![SoundEffect::Fire, SoundEffect::Hit]);
        assert_eq!(
            *events.lock().unwrap(),
            vec![ScoreEvent {
                points: 1,
                scorer: 0,
                victim: Some(1)
            }]
        );
        assert!(world.is_pending_removal(bullets[0]));

        world.tick_at(74);
        assert!(world.find_by_kind(EntityKind::Bullet).is_empty());
    }

    /// Boosting drains the gauge in 2.5s, after which the bonus speed is gone
    #[test]
    fn boost_runs_dry_after_two_and_a_half_seconds() {
        let mut world = arena();
        let id = world.add(Plane::new(0, Vector2::new(100.0, 100.0)));
        world.plane_mut(id).unwrap().set_boosting(true);

        for step in 1..=62 {
            world.tick_at(step * 40);
        }
        let fuel = world.plane(id).unwrap().boost_fuel();
        assert!((fuel - 0.8).abs() < 1e-2, "fuel was {}", fuel);

        world.tick_at(2520);
        assert_eq!(world.plane(id).unwrap().boost_fuel(), 0.0);

        let before = world.plane(id).unwrap().position();
        world.tick_at(2560);
        let after = world.plane(id).unwrap().position();
        let moved = (after.x - before.x).rem_euclid(640.0);
        assert!((moved - 4.0).abs() < 1e-3, "moved {}", moved);
    }

    /// A plane killed outright spins in place until its recovery time
    #[test]
    fn dead_plane_spins_until_recovery() {
        let mut world = arena();
        let id = world.add(Plane::new(0, Vector2::new(200.0, 200.0)));
        world.tick_at(500);
        world.plane_mut(id).unwrap().receive_damage(MAX_HEALTH, 500);

        let spot = world.plane(id).unwrap().position();
        for step in 1..=33 {
            world.tick_at(500 + step * 40);
            let plane = world.plane(id).unwrap();
            assert_eq!(plane.position(), spot);
            assert_eq!(plane.health(), 0);
        }

        world.tick_at(500 + RECOVER_DELAY_MS);
        assert_eq!(world.plane(id).unwrap().health(), MAX_HEALTH);
    }

    /// Cross multi-shot fires the primary bullet plus three spread bullets
    #[test]
    fn cross_multi_shot_fires_four_bullets() {
        let mut world = arena();
        let mut plane = Plane::new(0, Vector2::new(100.0, 100.0));
        plane.enable_multi_shot(MultiShot::Cross, 0);
        plane.fire(&mut world);

        assert_eq!(world.find_by_kind(EntityKind::Bullet).len(), 4);
        assert_eq!(sounds(&world), vec![SoundEffect::Fire]);
    }

    /// A sound spawned by a mid-tick hit shows up in exactly one snapshot
    #[test]
    fn chain_reaction_sound_in_one_snapshot() {
        let mut world = arena();
        world.add(Plane::new(1, Vector2::new(100.0, 100.0)));
        world.add(Bullet::new(Vector2::new(95.0, 100.0), 0.0, 0, 0));

        world.tick_at(10);
        let first = world.snapshot();
        let hit_sounds = |records: &[EntityRecord]| {
            records
                .iter()
                .filter(|r| {
                    **r == EntityRecord::Sound {
                        effect: SoundEffect::Hit,
                    }
                })
                .count()
        };
        assert_eq!(hit_sounds(&first), 1);

        world.tick_at(50);
        let second = world.snapshot();
        assert_eq!(hit_sounds(&second), 0);
        assert!(second.iter().all(|r| r.kind() != EntityKind::Bullet));
    }

    /// Without planes the spawner keeps rescheduling but never drops a bonus
    #[test]
    fn spawner_idle_without_planes() {
        let mut world = arena();
        world.add(BonusSpawner::new());

        for step in 1..=2000 {
            world.tick_at(step * 100);
        }
        assert!(world.find_by_kind(EntityKind::Bonus).is_empty());
        assert!(sounds(&world).is_empty());
    }

    /// Every moving entity stays inside the arena through a busy match
    #[test]
    fn positions_always_wrap_into_arena() {
        let mut world = arena();
        let mut roster = Roster::new(4);
        world.add(BonusSpawner::new());
        for _ in 0..6 {
            roster.add_bot(&mut world);
        }

        for step in 1..=1500 {
            world.tick_at(step * 40);
            for (_, entity) in world.iter() {
                if let Some(p) = entity.position() {
                    assert!(p.x >= 0.0 && p.x < 640.0, "x out of range: {:?}", entity);
                    assert!(p.y >= 0.0 && p.y < 480.0, "y out of range: {:?}", entity);
                }
            }
            world.snapshot();
        }
    }

    /// Removing an entity twice, or one that never existed, changes nothing
    #[test]
    fn removal_requests_are_idempotent() {
        let mut world = arena();
        let plane = world.add(Plane::new(0, Vector2::new(10.0, 10.0)));
        let sound = world.add(Sound::new(SoundEffect::Fire));

        world.request_removal(plane);
        world.request_removal(plane);
        world.request_removal(EntityId(999));
        world.tick_at(40);

        assert!(!world.contains(plane));
        assert!(world.contains(sound));
        assert_eq!(world.len(), 1);
    }
}

/// CLIENT-SERVER INTEGRATION TESTS
mod client_server_tests {
    use super::*;

    async fn recv_packet(socket: &UdpSocket) -> Packet {
        let mut buf = [0u8; 65536];
        let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
            .await
            .expect("timed out waiting for the server")
            .expect("receive failed");
        deserialize(&buf[..len]).expect("undecodable packet")
    }

    /// Join over UDP, see our own plane in a world update, then leave
    #[tokio::test]
    async fn join_and_receive_world_updates() {
        let config = ServerConfig {
            tick_duration: Duration::from_millis(10),
            seed: Some(7),
            ..ServerConfig::default()
        };
        let mut server = Server::new("127.0.0.1:0", config).await.unwrap();
        let server_addr = server.local_addr().unwrap();
        let control = server.control_handle();
        let handle = tokio::spawn(async move { server.run().await.map_err(|e| e.to_string()) });

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let join = Packet::Join {
            client_version: PROTOCOL_VERSION,
            nick: "integration".to_string(),
        };
        client
            .send_to(&serialize(&join).unwrap(), server_addr)
            .await
            .unwrap();

        let mut player_id = None;
        let mut saw_own_plane = false;
        for _ in 0..200 {
            match recv_packet(&client).await {
                Packet::JoinInfo {
                    player_id: id,
                    width,
                    height,
                } => {
                    assert_eq!((width, height), (640, 480));
                    player_id = Some(id);
                }
                Packet::WorldUpdate { records, .. } => {
                    if let Some(id) = player_id {
                        saw_own_plane = records.iter().any(|r| {
                            matches!(r, EntityRecord::Plane { player_id, .. } if *player_id == id)
                        });
                    }
                }
                Packet::Scores { entries } => {
                    assert!(entries.iter().any(|e| e.nick == "integration"));
                }
                other => panic!("Unexpected packet: {:?}", other),
            }
            if saw_own_plane {
                break;
            }
        }
        assert_eq!(player_id, Some(0));
        assert!(saw_own_plane);

        client
            .send_to(&serialize(&Packet::Leave).unwrap(), server_addr)
            .await
            .unwrap();
        control.send(ServerMessage::Shutdown).unwrap();

        let result = timeout(Duration::from_secs(2), handle)
            .await
            .expect("server did not stop")
            .unwrap();
        assert!(result.is_ok());
    }

    /// An outdated client is told why it cannot play
    #[tokio::test]
    async fn version_mismatch_is_rejected() {
        let mut server = Server::new("127.0.0.1:0", ServerConfig::default())
            .await
            .unwrap();
        let server_addr = server.local_addr().unwrap();
        let control = server.control_handle();
        let handle = tokio::spawn(async move { server.run().await.map_err(|e| e.to_string()) });

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let join = Packet::Join {
            client_version: PROTOCOL_VERSION + 1,
            nick: "old".to_string(),
        };
        client
            .send_to(&serialize(&join).unwrap(), server_addr)
            .await
            .unwrap();

        match recv_packet(&client).await {
            Packet::Rejected { reason } => assert_eq!(reason, "Protocol version mismatch"),
            other => panic!("Unexpected packet: {:?}", other),
        }

        control.send(ServerMessage::Shutdown).unwrap();
        let _ = timeout(Duration::from_secs(2), handle).await;
    }
}
