//! Game modes and the round tuning each one runs with

use serde::{Deserialize, Serialize};

/// Game modes offered by the front-end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    /// Timed run, any hit ends it
    #[default]
    Solo,
    /// Untimed run, any hit ends it
    Endless,
    /// Timed run that bounces off pipes instead of ending
    Practice,
    /// Timed race against the other players in a lobby
    Multiplayer,
}

impl std::str::FromStr for GameMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "solo" => Ok(Self::Solo),
            "endless" => Ok(Self::Endless),
            "practice" => Ok(Self::Practice),
            "multiplayer" | "multi" => Ok(Self::Multiplayer),
            other => Err(format!("unknown game mode '{}'", other)),
        }
    }
}

/// What happens when the actor touches something solid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactPolicy {
    /// The round ends immediately
    Fatal,
    /// The actor is stopped in place and the pipes freeze briefly
    Bounce,
}

/// Dimensions of the play field in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct World {
    pub width: f32,
    pub height: f32,
    pub ground_height: f32,
}

impl World {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            ground_height: 160.0,
        }
    }

    /// Top edge of the ground strip
    pub fn ground_y(&self) -> f32 {
        self.height - self.ground_height
    }
}

/// Full parameter set for one round
#[derive(Debug, Clone)]
pub struct RoundConfig {
    pub mode: GameMode,
    pub world: World,

    // Actor
    pub gravity: f32,
    pub flap_velocity: f32,
    pub actor_half_width: f32,
    pub actor_half_height: f32,
    pub start_x: f32,
    pub start_y: f32,
    pub start_velocity: f32,

    // Pipes
    pub gap_ratio: f32,
    pub pipe_width: f32,
    pub spawn_interval_ticks: u32,
    pub base_speed: f32,
    pub speed_step_points: u32,
    pub freeze_ms: u64,
    pub spawn_on_start: bool,

    // Rules
    pub floor_policy: ContactPolicy,
    pub pipe_policy: ContactPolicy,
    /// `None` for rounds that only end on a crash
    pub duration_secs: Option<u32>,
    pub countdown_secs: u32,
    pub go_hold_ms: u64,

    // Sync
    pub sync_enabled: bool,
    pub push_interval_ms: u64,
}

impl RoundConfig {
    pub fn for_mode(mode: GameMode, world: World) -> Self {
        let base = Self {
            mode,
            world,
            gravity: 0.5,
            flap_velocity: -8.0,
            actor_half_width: 20.0,
            actor_half_height: 15.0,
            start_x: 150.0,
            start_y: world.height / 2.0,
            start_velocity: -2.0,
            gap_ratio: 0.4,
            pipe_width: world.width * 0.08 * 0.6,
            spawn_interval_ticks: 150,
            base_speed: 3.0,
            speed_step_points: 5,
            freeze_ms: 250,
            spawn_on_start: true,
            floor_policy: ContactPolicy::Fatal,
            pipe_policy: ContactPolicy::Fatal,
            duration_secs: Some(60),
            countdown_secs: 5,
            go_hold_ms: 1000,
            sync_enabled: false,
            push_interval_ms: 200,
        };

        match mode {
            GameMode::Solo => base,
            GameMode::Endless => Self {
                duration_secs: None,
                ..base
            },
            GameMode::Practice => Self {
                floor_policy: ContactPolicy::Bounce,
                pipe_policy: ContactPolicy::Bounce,
                ..base
            },
            GameMode::Multiplayer => Self {
                gravity: 0.25,
                start_x: 100.0,
                start_y: 300.0,
                start_velocity: 0.0,
                spawn_on_start: false,
                floor_policy: ContactPolicy::Bounce,
                pipe_policy: ContactPolicy::Bounce,
                duration_secs: Some(90),
                sync_enabled: true,
                ..base
            },
        }
    }

    /// Pipe gap for this world
    pub fn gap_height(&self) -> f32 {
        self.world.height * self.gap_ratio
    }

    /// Scroll speed for a given score, stepped every `speed_step_points`
    pub fn speed_for_score(&self, score: u32) -> f32 {
        let step = self.speed_step_points.max(1);
        self.base_speed + (score / step) as f32
    }

    /// Countdown plus the "GO" hold, in milliseconds
    pub fn countdown_total_ms(&self) -> u64 {
        self.countdown_secs as u64 * 1000 + self.go_hold_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_steps_every_five_points() {
        let config = RoundConfig::for_mode(GameMode::Solo, World::new(1280.0, 800.0));
        assert_eq!(config.speed_for_score(0), 3.0);
        assert_eq!(config.speed_for_score(4), 3.0);
        assert_eq!(config.speed_for_score(5), 4.0);
        assert_eq!(config.speed_for_score(12), 5.0);
    }

    #[test]
    fn test_multiplayer_is_softer_than_solo() {
        let world = World::new(1280.0, 800.0);
        let solo = RoundConfig::for_mode(GameMode::Solo, world);
        let multi = RoundConfig::for_mode(GameMode::Multiplayer, world);

        assert!(solo.gravity > multi.gravity);
        assert_eq!(solo.floor_policy, ContactPolicy::Fatal);
        assert_eq!(multi.floor_policy, ContactPolicy::Bounce);
        assert!(multi.sync_enabled);
        assert!(!solo.sync_enabled);
        assert_eq!(multi.duration_secs, Some(90));
    }

    #[test]
    fn test_endless_has_no_timer() {
        let config = RoundConfig::for_mode(GameMode::Endless, World::new(1280.0, 800.0));
        assert_eq!(config.duration_secs, None);
        assert_eq!(config.pipe_policy, ContactPolicy::Fatal);
    }

    #[test]
    fn test_gap_and_ground() {
        let world = World::new(1280.0, 800.0);
        let config = RoundConfig::for_mode(GameMode::Multiplayer, world);
        assert_eq!(world.ground_y(), 640.0);
        assert_eq!(config.gap_height(), 320.0);
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!("Endless".parse::<GameMode>(), Ok(GameMode::Endless));
        assert_eq!("multi".parse::<GameMode>(), Ok(GameMode::Multiplayer));
        assert!("arcade".parse::<GameMode>().is_err());
        assert_eq!(GameMode::default(), GameMode::Solo);
    }
}
