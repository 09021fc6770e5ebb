//! Actor vs pipe collision detection and push-out

use serde::{Deserialize, Serialize};

use super::actor::Actor;
use super::mode::{ContactPolicy, World};
use super::obstacles::Obstacle;

/// Axis-aligned rectangle in screen coordinates (y grows downwards)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl Rect {
    /// Strict overlap test; rectangles that only share an edge do not intersect
    pub fn intersects(&self, other: &Rect) -> bool {
        self.right > other.left
            && self.left < other.right
            && self.bottom > other.top
            && self.top < other.bottom
    }
}

/// Side of the obstacle rectangle the actor is pushed out through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushAxis {
    Left,
    Right,
    Top,
    Bottom,
}

/// One push-out applied to the actor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PushOut {
    pub axis: PushAxis,
    pub depth: f32,
}

/// Result of checking the actor against every pipe
#[derive(Debug, Clone, PartialEq)]
pub enum CollisionResult {
    Clear,
    /// The actor hit a pipe under the fatal policy; nothing was moved
    Fatal,
    /// The actor was pushed out of one or more pipe segments
    Resolved(Vec<PushOut>),
}

/// Collision resolver for one contact policy
pub struct CollisionResolver {
    policy: ContactPolicy,
}

impl CollisionResolver {
    pub fn new(policy: ContactPolicy) -> Self {
        Self { policy }
    }

    /// Check the actor against both segments of every obstacle.
    /// Under the bounce policy each overlapping segment is resolved in order
    /// against the already-corrected actor.
    pub fn check(&self, actor: &mut Actor, obstacles: &[Obstacle], world: &World) -> CollisionResult {
        let mut pushes = Vec::new();

        for obstacle in obstacles {
            for segment in obstacle.segments(world) {
                if !actor.bounds().intersects(&segment) {
                    continue;
                }

                match self.policy {
                    ContactPolicy::Fatal => return CollisionResult::Fatal,
                    ContactPolicy::Bounce => pushes.push(Self::push_out(actor, &segment)),
                }
            }
        }

        if pushes.is_empty() {
            CollisionResult::Clear
        } else {
            CollisionResult::Resolved(pushes)
        }
    }

    /// Move the actor out of `rect` along the axis of least penetration and
    /// stop it. Equal depths resolve in left, right, top, bottom order.
    pub fn push_out(actor: &mut Actor, rect: &Rect) -> PushOut {
        let bounds = actor.bounds();
        let candidates = [
            (PushAxis::Left, bounds.right - rect.left),
            (PushAxis::Right, rect.right - bounds.left),
            (PushAxis::Top, bounds.bottom - rect.top),
            (PushAxis::Bottom, rect.bottom - bounds.top),
        ];

        let (axis, depth) = candidates
            .iter()
            .copied()
            .fold(candidates[0], |best, c| if c.1 < best.1 { c } else { best });

        match axis {
            PushAxis::Left => actor.x -= depth,
            PushAxis::Right => actor.x += depth,
            PushAxis::Top => actor.y -= depth,
            PushAxis::Bottom => actor.y += depth,
        }
        actor.velocity = 0.0;

        PushOut { axis, depth }
    }
}
