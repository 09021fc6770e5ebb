//! The controlled bird

use serde::{Deserialize, Serialize};

use super::collision::Rect;
use super::mode::RoundConfig;

/// Local actor state (authoritative for this client)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub x: f32,
    pub y: f32,
    pub velocity: f32,
    pub half_width: f32,
    pub half_height: f32,
    pub score: u32,
}

impl Actor {
    /// Spawn an actor at the mode's start position
    pub fn spawn(config: &RoundConfig) -> Self {
        Self {
            x: config.start_x,
            y: config.start_y,
            velocity: config.start_velocity,
            half_width: config.actor_half_width,
            half_height: config.actor_half_height,
            score: 0,
        }
    }

    /// Axis-aligned bounding box around the actor's center
    pub fn bounds(&self) -> Rect {
        Rect {
            left: self.x - self.half_width,
            right: self.x + self.half_width,
            top: self.y - self.half_height,
            bottom: self.y + self.half_height,
        }
    }
}
