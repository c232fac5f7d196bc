use serde::{Deserialize, Serialize};

pub mod math;

pub use math::Vector2;

pub const WORLD_WIDTH: f32 = 640.0;
pub const WORLD_HEIGHT: f32 = 480.0;
pub const TICK_MILLIS: u64 = 40;
pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_NICK_LEN: usize = 12;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Join {
        client_version: u32,
        nick: String,
    },
    Control {
        sequence: u32,
        flags: u8,
    },
    Leave,

    JoinInfo {
        player_id: u32,
        width: u32,
        height: u32,
    },
    WorldUpdate {
        tick: u32,
        records: Vec<EntityRecord>,
    },
    Scores {
        entries: Vec<ScoreEntry>,
    },
    Rejected {
        reason: String,
    },
}

/// Wire and query discriminator of every visible entity.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EntityKind {
    Plane = 0,
    Bullet = 1,
    Sound = 2,
    Bonus = 3,
}

impl EntityKind {
    pub fn tag(self) -> i32 {
        self as i32
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SoundEffect {
    Fire = 0,
    Hit = 1,
    BonusSpawn = 2,
    BonusPickup = 3,
}

impl SoundEffect {
    pub fn id(self) -> i32 {
        self as i32
    }
}

/// One entity as it appears in a world update.
///
/// Coordinates and angles are truncated to integers before they are put on
/// the wire; clients predict from these truncated values, so the server must
/// produce exactly the same precision loss.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum EntityRecord {
    Plane {
        player_id: u32,
        x: i32,
        y: i32,
        angle: i32,
    },
    Bullet {
        x: i32,
        y: i32,
    },
    Sound {
        effect: SoundEffect,
    },
    Bonus {
        x: i32,
        y: i32,
    },
}

/// Fixed-point scale of the transmitted plane angle (about 0.005 rad).
pub const ANGLE_SCALE: f32 = 200.0;

impl EntityRecord {
    pub fn plane(player_id: u32, position: Vector2, angle: f32) -> Self {
        EntityRecord::Plane {
            player_id,
            x: position.x as i32,
            y: position.y as i32,
            angle: (angle * ANGLE_SCALE) as i32,
        }
    }

    pub fn bullet(position: Vector2) -> Self {
        EntityRecord::Bullet {
            x: position.x as i32,
            y: position.y as i32,
        }
    }

    pub fn bonus(position: Vector2) -> Self {
        EntityRecord::Bonus {
            x: position.x as i32,
            y: position.y as i32,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRecord::Plane { .. } => EntityKind::Plane,
            EntityRecord::Bullet { .. } => EntityKind::Bullet,
            EntityRecord::Sound { .. } => EntityKind::Sound,
            EntityRecord::Bonus { .. } => EntityKind::Bonus,
        }
    }

    /// Flat integer form, `[kind, ...fields]`.
    pub fn fields(&self) -> Vec<i32> {
        let kind = self.kind().tag();
        match *self {
            EntityRecord::Plane {
                player_id,
                x,
                y,
                angle,
            } => vec![kind, player_id as i32, x, y, angle],
            EntityRecord::Bullet { x, y } | EntityRecord::Bonus { x, y } => vec![kind, x, y],
            EntityRecord::Sound { effect } => vec![kind, effect.id()],
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ScoreEntry {
    pub player_id: u32,
    pub nick: String,
    pub score: i32,
}

pub const CONTROL_TURN_CLOCKWISE: u8 = 1;
pub const CONTROL_TURN_COUNTER_CLOCKWISE: u8 = 2;
pub const CONTROL_BOOST: u8 = 4;
pub const CONTROL_BRAKE: u8 = 8;
pub const CONTROL_FIRE: u8 = 16;

/// Control intents of a single player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlState {
    /// 1 turns counter-clockwise, -1 clockwise, 0 flies straight.
    pub turn: i8,
    pub firing: bool,
    pub boosting: bool,
    pub braking: bool,
}

impl ControlState {
    pub fn from_flags(flags: u8) -> Self {
        let mut turn = 0;
        if flags & CONTROL_TURN_CLOCKWISE != 0 {
            turn = -1;
        }
        if flags & CONTROL_TURN_COUNTER_CLOCKWISE != 0 {
            turn = 1;
        }

        Self {
            turn,
            firing: flags & CONTROL_FIRE != 0,
            boosting: flags & CONTROL_BOOST != 0,
            braking: flags & CONTROL_BRAKE != 0,
        }
    }

    pub fn to_flags(&self) -> u8 {
        let mut flags = 0;
        match self.turn.signum() {
            -1 => flags |= CONTROL_TURN_CLOCKWISE,
            1 => flags |= CONTROL_TURN_COUNTER_CLOCKWISE,
            _ => {}
        }
        if self.boosting {
            flags |= CONTROL_BOOST;
        }
        if self.braking {
            flags |= CONTROL_BRAKE;
        }
        if self.firing {
            flags |= CONTROL_FIRE;
        }
        flags
    }
}

/// Truncates a nickname to the length the scoreboard can show.
pub fn sanitize_nick(nick: &str) -> String {
    nick.trim().chars().take(MAX_NICK_LEN).collect()
}
