//! Vector and angle helpers shared by the server simulation and any client
//! that wants to predict positions the same way.
//!
//! The world is a torus: positions wrap around both axes instead of being
//! clamped, and angles are kept in `(-PI, PI]`.

use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};

/// Represents a vector in 2D screen space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vector2 {
    /// Value along the x-axis.
    /// Positive direction is to the right.
    pub x: f32,
    /// Value along the y-axis.
    /// Positive direction is down.
    pub y: f32,
}

impl Vector2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Unit vector pointing along `angle`.
    ///
    /// Angles are measured counter-clockwise from the positive x-axis as seen
    /// on screen, so the y component is inverted.
    pub fn from_angle(angle: f32) -> Vector2 {
        Vector2 {
            x: angle.cos(),
            y: -angle.sin(),
        }
    }

    /// Returns the magnitude of the vector.
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Returns the scaled vector.
    pub fn scale(&self, scalar: f32) -> Vector2 {
        Vector2 {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }

    /// Returns the sum of two vectors.
    pub fn add(&self, other: &Vector2) -> Vector2 {
        Vector2 {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    pub fn distance_squared(&self, other: &Vector2) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn distance(&self, other: &Vector2) -> f32 {
        self.distance_squared(other).sqrt()
    }

    /// Screen-space bearing from `self` towards `target`, in `(-PI, PI]`.
    pub fn bearing_to(&self, target: &Vector2) -> f32 {
        // y grows downwards, so flip it to get a counter-clockwise angle.
        (self.y - target.y).atan2(target.x - self.x)
    }

    /// Wraps the vector into `[0, width) x [0, height)`.
    pub fn wrapped(&self, width: f32, height: f32) -> Vector2 {
        Vector2 {
            x: wrap_coordinate(self.x, width),
            y: wrap_coordinate(self.y, height),
        }
    }
}

/// Wraps a single coordinate into `[0, extent)`.
pub fn wrap_coordinate(value: f32, extent: f32) -> f32 {
    let wrapped = value.rem_euclid(extent);
    // rem_euclid can round up to `extent` for tiny negative inputs.
    if wrapped >= extent {
        0.0
    } else {
        wrapped
    }
}

/// Normalizes an angle into `(-PI, PI]`.
pub fn wrap_angle(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(TAU);
    if wrapped > PI {
        wrapped - TAU
    } else {
        wrapped
    }
}

/// Smallest signed difference `a - b`, in `(-PI, PI]`.
pub fn angle_difference(a: f32, b: f32) -> f32 {
    wrap_angle(a - b)
}
