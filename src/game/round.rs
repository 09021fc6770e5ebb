//! Round state machine and the per-tick simulation order

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::actor::Actor;
use super::collision::{CollisionResolver, CollisionResult, PushOut};
use super::mode::{ContactPolicy, RoundConfig};
use super::obstacles::{Obstacle, ObstacleManager};
use super::physics::{BoundsContact, PhysicsSystem};

/// Round phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    /// Waiting for assets, camera and lobby
    WaitingForReady,
    /// Countdown before the start
    Countdown,
    /// Round in progress
    Active,
    /// Round over; only a new round leaves this phase
    Terminal,
}

/// Preconditions for leaving `WaitingForReady`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    Assets,
    Capture,
    Lobby,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Hit a pipe under the fatal policy
    Crashed,
    /// Hit the ground under the fatal policy
    Grounded,
    /// Round timer ran out
    TimeUp,
}

/// What the countdown overlay shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "seconds", rename_all = "snake_case")]
pub enum CountdownDisplay {
    Seconds(u32),
    Go,
}

/// Things that happened during a tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum RoundEvent {
    Scored { score: u32 },
    Bounced { pushes: Vec<PushOut> },
    FloorContact,
    Frozen { until_ms: u64 },
    Ended { reason: EndReason },
}

#[derive(Debug, Clone, Copy, Default)]
struct Readiness {
    assets: bool,
    capture: bool,
    lobby: bool,
}

impl Readiness {
    fn all(&self) -> bool {
        self.assets && self.capture && self.lobby
    }
}

/// One round: owns the actor, the pipes and every deadline
pub struct Round {
    config: RoundConfig,
    phase: RoundPhase,
    readiness: Readiness,
    denied: Option<Requirement>,
    actor: Actor,
    obstacles: ObstacleManager,
    resolver: CollisionResolver,
    countdown_started: Option<u64>,
    countdown_deadline: Option<u64>,
    round_deadline: Option<u64>,
    end_reason: Option<EndReason>,
    ended_at: Option<u64>,
    tick: u64,
}

impl Round {
    pub fn new(config: RoundConfig, seed: u64) -> Self {
        let readiness = Readiness {
            lobby: !config.sync_enabled,
            ..Readiness::default()
        };

        Self {
            actor: Actor::spawn(&config),
            obstacles: ObstacleManager::new(&config, seed),
            resolver: CollisionResolver::new(config.pipe_policy),
            config,
            phase: RoundPhase::WaitingForReady,
            readiness,
            denied: None,
            countdown_started: None,
            countdown_deadline: None,
            round_deadline: None,
            end_reason: None,
            ended_at: None,
            tick: 0,
        }
    }

    pub fn config(&self) -> &RoundConfig {
        &self.config
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        self.obstacles.obstacles()
    }

    pub fn speed(&self) -> f32 {
        self.obstacles.speed()
    }

    pub fn is_frozen(&self, now_ms: u64) -> bool {
        self.obstacles.is_frozen(now_ms)
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn is_terminal(&self) -> bool {
        self.phase == RoundPhase::Terminal
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    pub fn denied(&self) -> Option<Requirement> {
        self.denied
    }

    /// Requirements still outstanding
    pub fn pending(&self) -> Vec<Requirement> {
        let mut pending = Vec::new();
        if !self.readiness.assets {
            pending.push(Requirement::Assets);
        }
        if !self.readiness.capture {
            pending.push(Requirement::Capture);
        }
        if !self.readiness.lobby {
            pending.push(Requirement::Lobby);
        }
        pending
    }

    /// Record a satisfied precondition. Starts the countdown once all are met.
    /// Returns true if this call started the countdown.
    pub fn mark_ready(&mut self, requirement: Requirement, now_ms: u64) -> bool {
        if self.phase != RoundPhase::WaitingForReady || self.denied.is_some() {
            return false;
        }

        match requirement {
            Requirement::Assets => self.readiness.assets = true,
            Requirement::Capture => self.readiness.capture = true,
            Requirement::Lobby => self.readiness.lobby = true,
        }

        if !self.readiness.all() {
            return false;
        }

        self.phase = RoundPhase::Countdown;
        self.countdown_started = Some(now_ms);
        self.countdown_deadline = Some(now_ms + self.config.countdown_total_ms());
        info!(mode = ?self.config.mode, "Countdown started");
        true
    }

    /// A precondition can never be met (camera denied). The round stays in
    /// `WaitingForReady` for good.
    pub fn deny(&mut self, requirement: Requirement) {
        if self.phase == RoundPhase::WaitingForReady {
            self.denied = Some(requirement);
        }
    }

    /// Flap request from key press or motion. Ignored unless active.
    pub fn flap(&mut self) -> bool {
        if self.phase != RoundPhase::Active {
            return false;
        }
        PhysicsSystem::impulse(&mut self.actor, self.config.flap_velocity);
        true
    }

    pub fn countdown_display(&self, now_ms: u64) -> Option<CountdownDisplay> {
        if self.phase != RoundPhase::Countdown {
            return None;
        }
        let elapsed = now_ms.saturating_sub(self.countdown_started.unwrap_or(now_ms));
        let secs = self.config.countdown_secs as u64;
        if elapsed < secs * 1000 {
            Some(CountdownDisplay::Seconds((secs - elapsed / 1000) as u32))
        } else {
            Some(CountdownDisplay::Go)
        }
    }

    /// Whole seconds left on the round clock; `None` for untimed rounds
    pub fn remaining_secs(&self, now_ms: u64) -> Option<u32> {
        let duration = self.config.duration_secs?;
        let Some(deadline) = self.round_deadline else {
            return Some(duration);
        };
        // The clock stops when the round ends
        let at = self.ended_at.unwrap_or(now_ms);
        let left_ms = deadline.saturating_sub(at);
        Some(((left_ms + 999) / 1000) as u32)
    }

    /// Advance the round by one tick
    pub fn tick(&mut self, now_ms: u64) -> Vec<RoundEvent> {
        match self.phase {
            RoundPhase::WaitingForReady | RoundPhase::Terminal => Vec::new(),
            RoundPhase::Countdown => {
                if self
                    .countdown_deadline
                    .map_or(false, |deadline| now_ms >= deadline)
                {
                    self.start(now_ms);
                }
                Vec::new()
            }
            RoundPhase::Active => self.simulate(now_ms),
        }
    }

    fn start(&mut self, now_ms: u64) {
        self.phase = RoundPhase::Active;
        self.round_deadline = self
            .config
            .duration_secs
            .map(|secs| now_ms + secs as u64 * 1000);
        if self.config.spawn_on_start {
            self.obstacles.spawn();
        }
        info!(mode = ?self.config.mode, "Round started");
    }

    fn simulate(&mut self, now_ms: u64) -> Vec<RoundEvent> {
        let mut events = Vec::new();
        self.tick += 1;

        if self
            .round_deadline
            .map_or(false, |deadline| now_ms >= deadline)
        {
            return self.end(EndReason::TimeUp, now_ms, events);
        }

        PhysicsSystem::integrate(&mut self.actor, self.config.gravity);

        if PhysicsSystem::enforce_bounds(&mut self.actor, &self.config.world) == BoundsContact::Floor
        {
            match self.config.floor_policy {
                ContactPolicy::Fatal => return self.end(EndReason::Grounded, now_ms, events),
                ContactPolicy::Bounce => {
                    events.push(RoundEvent::FloorContact);
                    self.freeze(now_ms, &mut events);
                }
            }
        }

        let step = self.obstacles.tick(&mut self.actor, now_ms);
        if step.spawned {
            debug!(tick = self.tick, speed = self.obstacles.speed(), "Pipe spawned");
        }
        if step.points > 0 {
            events.push(RoundEvent::Scored {
                score: self.actor.score,
            });
        }

        match self
            .resolver
            .check(&mut self.actor, self.obstacles.obstacles(), &self.config.world)
        {
            CollisionResult::Clear => {}
            CollisionResult::Fatal => return self.end(EndReason::Crashed, now_ms, events),
            CollisionResult::Resolved(pushes) => {
                events.push(RoundEvent::Bounced { pushes });
                self.freeze(now_ms, &mut events);
            }
        }

        PhysicsSystem::clamp_to_world(&mut self.actor, &self.config.world);
        events
    }

    fn freeze(&mut self, now_ms: u64, events: &mut Vec<RoundEvent>) {
        if self.obstacles.freeze(now_ms) {
            let until_ms = now_ms + self.obstacles.freeze_remaining_ms(now_ms);
            debug!(until_ms, "Pipes frozen");
            events.push(RoundEvent::Frozen { until_ms });
        }
    }

    fn end(&mut self, reason: EndReason, now_ms: u64, mut events: Vec<RoundEvent>) -> Vec<RoundEvent> {
        self.phase = RoundPhase::Terminal;
        self.end_reason = Some(reason);
        self.ended_at = Some(now_ms);
        info!(
            mode = ?self.config.mode,
            reason = ?reason,
            score = self.actor.score,
            "Round ended"
        );
        events.push(RoundEvent::Ended { reason });
        events
    }
}
