//! Pipe spawning, scrolling, scoring and pruning

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::actor::Actor;
use super::collision::Rect;
use super::mode::{RoundConfig, World};

/// A top/bottom pipe pair with a gap between them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    /// Leading (left) edge
    pub x: f32,
    pub width: f32,
    pub top_height: f32,
    pub gap_height: f32,
    pub scored: bool,
}

impl Obstacle {
    /// Trailing (right) edge
    pub fn trailing_edge(&self) -> f32 {
        self.x + self.width
    }

    /// Height of the bottom pipe, from the gap down to the ground
    pub fn bottom_height(&self, world: &World) -> f32 {
        world.ground_y() - self.top_height - self.gap_height
    }

    /// Top and bottom pipe rectangles
    pub fn segments(&self, world: &World) -> [Rect; 2] {
        let left = self.x;
        let right = self.trailing_edge();
        [
            Rect {
                left,
                right,
                top: 0.0,
                bottom: self.top_height,
            },
            Rect {
                left,
                right,
                top: world.ground_y() - self.bottom_height(world),
                bottom: world.ground_y(),
            },
        ]
    }
}

/// Outcome of one obstacle tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ObstacleTick {
    pub spawned: bool,
    pub points: u32,
}

/// Owns the pipe list and the pacing state around it
pub struct ObstacleManager {
    obstacles: Vec<Obstacle>,
    rng: ChaCha8Rng,
    world: World,
    pipe_width: f32,
    gap_height: f32,
    spawn_interval: u32,
    base_speed: f32,
    speed_step: u32,
    freeze_ms: u64,
    speed: f32,
    spawn_ticks: u64,
    frozen_until: Option<u64>,
}

impl ObstacleManager {
    pub fn new(config: &RoundConfig, seed: u64) -> Self {
        Self {
            obstacles: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            world: config.world,
            pipe_width: config.pipe_width,
            gap_height: config.gap_height(),
            spawn_interval: config.spawn_interval_ticks.max(1),
            base_speed: config.base_speed,
            speed_step: config.speed_step_points.max(1),
            freeze_ms: config.freeze_ms,
            speed: config.speed_for_score(0),
            spawn_ticks: 0,
            frozen_until: None,
        }
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn is_frozen(&self, now_ms: u64) -> bool {
        self.frozen_until.map_or(false, |until| now_ms < until)
    }

    /// Remaining freeze time, zero when not frozen
    pub fn freeze_remaining_ms(&self, now_ms: u64) -> u64 {
        self.frozen_until
            .map_or(0, |until| until.saturating_sub(now_ms))
    }

    /// Stop spawning and scrolling for the freeze window.
    /// Returns false if a freeze is already running; the running window is
    /// kept as is.
    pub fn freeze(&mut self, now_ms: u64) -> bool {
        if self.is_frozen(now_ms) {
            return false;
        }
        self.frozen_until = Some(now_ms + self.freeze_ms);
        true
    }

    /// Append a new pipe pair at the right edge of the world
    pub fn spawn(&mut self) {
        let max_top = self.world.height - self.gap_height - self.world.ground_height;
        let top_height = if max_top > 0.0 {
            self.rng.gen_range(0.0..max_top)
        } else {
            0.0
        };

        self.obstacles.push(Obstacle {
            x: self.world.width,
            width: self.pipe_width,
            top_height,
            gap_height: self.gap_height,
            scored: false,
        });
    }

    /// Spawn on cadence, scroll, score passed pipes and drop off-screen ones.
    /// Does nothing while frozen.
    pub fn tick(&mut self, actor: &mut Actor, now_ms: u64) -> ObstacleTick {
        let mut result = ObstacleTick::default();
        if self.is_frozen(now_ms) {
            return result;
        }

        self.spawn_ticks += 1;
        if self.spawn_ticks % self.spawn_interval as u64 == 0 {
            self.spawn();
            result.spawned = true;
        }

        for obstacle in self.obstacles.iter_mut() {
            obstacle.x -= self.speed;

            if !obstacle.scored && actor.x > obstacle.trailing_edge() {
                obstacle.scored = true;
                actor.score += 1;
                result.points += 1;
                self.speed = self.base_speed + (actor.score / self.speed_step) as f32;
            }
        }

        self.obstacles.retain(|o| o.trailing_edge() > 0.0);
        result
    }
}
