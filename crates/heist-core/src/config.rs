//! Session configuration.
//!
//! All tunables live here so every node runs the same rules. Durations are in
//! seconds and are converted to ticks when a timer is armed. Configs are plain
//! JSON; any field left out keeps its default.
//!
//! ```
//! use heist_core::config::SimConfig;
//!
//! let config = SimConfig::from_json_str(r#"{ "tick_rate": 30, "guard": { "alert_secs": 2.0 } }"#).unwrap();
//! assert_eq!(config.tick_rate, 30);
//! assert_eq!(config.guard.alert_secs, 2.0);
//! assert_eq!(config.button, Default::default());
//! ```

use std::path::Path;

use heist_logic::zone::BoundaryPolicy;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed simulation rate in ticks per second.
    pub tick_rate: u32,
    /// Seed for anything randomized at level build time.
    pub seed: u64,
    pub guard: GuardConfig,
    pub alarm: AlarmConfig,
    pub button: ButtonConfig,
    pub door: DoorConfig,
    pub task: TaskConfig,
    pub laser: LaserConfig,
    pub sneak: SneakConfig,
    pub level: LevelConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate: 50,
            seed: 0,
            guard: GuardConfig::default(),
            alarm: AlarmConfig::default(),
            button: ButtonConfig::default(),
            door: DoorConfig::default(),
            task: TaskConfig::default(),
            laser: LaserConfig::default(),
            sneak: SneakConfig::default(),
            level: LevelConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Patrol and return speed (m/s).
    pub walk_speed: f32,
    /// Speed while running to an alarm (m/s).
    pub run_speed: f32,
    /// Distance at which a waypoint counts as reached.
    pub arrive_distance: f32,
    /// Distance to the alarm at which the guard stops and rests.
    pub alarm_reach_distance: f32,
    /// How long the guard stays alerted after spotting someone.
    pub alert_secs: f32,
    /// Dwell time at the alarm before returning to patrol.
    pub rest_secs: f32,
    /// Half of the view cone's opening angle, degrees.
    pub view_half_angle_deg: f32,
    pub view_range: f32,
    pub eye_height: f32,
    /// Continuous visibility needed before a target is spotted.
    pub sight_threshold_secs: f32,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            walk_speed: 1.5,
            run_speed: 4.0,
            arrive_distance: 0.25,
            alarm_reach_distance: 1.0,
            alert_secs: 3.0,
            rest_secs: 5.0,
            view_half_angle_deg: 40.0,
            view_range: 12.0,
            eye_height: 1.7,
            sight_threshold_secs: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmConfig {
    /// Silence automatically after this long. `None` rings until reset.
    pub auto_silence_secs: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonConfig {
    pub cooldown_secs: f32,
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self { cooldown_secs: 1.0 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoorConfig {
    /// Close again automatically after this long. `None` stays open.
    pub auto_close_secs: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Fraction of a hack completed per second.
    pub hack_rate: f32,
    /// Fraction of a steal completed per second.
    pub steal_rate: f32,
    /// Max distance between the actor and the task while it progresses.
    pub range: f32,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            hack_rate: 0.2,
            steal_rate: 0.5,
            range: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaserConfig {
    /// Mirror bounces allowed before the beam is cut off.
    pub max_reflections: u32,
    pub max_distance: f32,
    /// Minimum time between two alarm trips from the same laser.
    pub retrigger_secs: f32,
}

impl Default for LaserConfig {
    fn default() -> Self {
        Self {
            max_reflections: 4,
            max_distance: 50.0,
            retrigger_secs: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SneakConfig {
    /// Max movement speed (m/s) inside a sneak zone before it counts as noise.
    pub speed_limit: f32,
    pub cooldown_secs: f32,
}

impl Default for SneakConfig {
    fn default() -> Self {
        Self {
            speed_limit: 1.0,
            cooldown_secs: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    /// Delay between opening the exit and switching groups.
    pub exit_delay_secs: f32,
    /// Whether an actor exactly on the target zone radius counts as inside.
    pub zone_boundary: BoundaryPolicy,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            exit_delay_secs: 3.0,
            zone_boundary: BoundaryPolicy::Inclusive,
        }
    }
}

impl SimConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 {
            return Err(invalid("tick_rate", "must be at least 1"));
        }
        let durations = [
            ("guard.alert_secs", self.guard.alert_secs),
            ("guard.rest_secs", self.guard.rest_secs),
            ("button.cooldown_secs", self.button.cooldown_secs),
            ("laser.retrigger_secs", self.laser.retrigger_secs),
            ("sneak.cooldown_secs", self.sneak.cooldown_secs),
            ("level.exit_delay_secs", self.level.exit_delay_secs),
        ];
        for (field, secs) in durations {
            if !secs.is_finite() || secs < 0.0 {
                return Err(invalid(field, format!("expected a non-negative duration, got {secs}")));
            }
        }
        let threshold = self.guard.sight_threshold_secs;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(invalid("guard.sight_threshold_secs", "must be positive"));
        }
        if self.guard.view_range <= 0.0 {
            return Err(invalid("guard.view_range", "must be positive"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}
