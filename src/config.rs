//! Engine tunables.
//!
//! Every field has a default matching the shipped game, and the host may
//! override any subset by passing a JSON object to `DoomMini::new`, e.g.
//! `{"render": {"width": 640}, "audio": {"enabled": false}}`.

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub render: RenderConfig,
    pub movement: MovementConfig,
    pub combat: CombatConfig,
    pub patrol: PatrolConfig,
    pub frame: FrameConfig,
    pub audio: AudioConfig,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    /// Canvas width in pixels; one ray per column.
    pub width: u32,
    pub height: u32,
    /// Billboard height multiplier for enemies.
    pub sprite_scale: f64,
    /// Sprites never grow past `height * max_sprite_height_factor`.
    pub max_sprite_height_factor: f64,
    /// Slack added to the wall depth before a sprite column is rejected.
    pub depth_tolerance: f64,
    /// Projectile billboard size relative to `height / depth`.
    pub projectile_size_factor: f64,
    /// Z-buffer value for a column whose ray never terminated.
    pub max_ray_distance: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 480,
            height: 300,
            sprite_scale: 2.0,
            max_sprite_height_factor: 1.5,
            depth_tolerance: 0.01,
            projectile_size_factor: 0.4,
            max_ray_distance: 64.0,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct MovementConfig {
    /// units/s
    pub walk_speed: f64,
    pub run_speed: f64,
    /// rad/s
    pub turn_speed: f64,
    pub run_turn_speed: f64,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            walk_speed: 2.5,
            run_speed: 4.0,
            turn_speed: 2.0,
            run_turn_speed: 3.0,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct CombatConfig {
    /// Seconds of simulation time between shots.
    pub fire_cooldown: f64,
    pub fire_speed: f64,
    /// Projectile time-to-live in seconds.
    pub projectile_ttl: f64,
    pub projectile_radius: f64,
    pub enemy_radius: f64,
    /// Distance ahead of the player where projectiles spawn.
    pub spawn_offset: f64,
    /// How long an enemy shows its red variant after a hit.
    pub hit_flash: f64,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            fire_cooldown: 0.25,
            fire_speed: 6.0,
            projectile_ttl: 2.0,
            projectile_radius: 0.18,
            enemy_radius: 0.35,
            spawn_offset: 0.4,
            hit_flash: 0.15,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct PatrolConfig {
    pub speed: f64,
    /// Distance at which a waypoint counts as reached.
    pub arrive_epsilon: f64,
}

impl Default for PatrolConfig {
    fn default() -> Self {
        Self {
            speed: 1.6,
            arrive_epsilon: 0.05,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct FrameConfig {
    /// Upper bound on a single frame's delta time (seconds).
    pub max_dt: f64,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self { max_dt: 0.05 }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub enabled: bool,
    pub bpm: f64,
    pub master_gain: f32,
    pub sfx_gain: f32,
    pub distortion: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bpm: 140.0,
            master_gain: 0.14,
            sfx_gain: 1.0,
            distortion: 35.0,
        }
    }
}

impl EngineConfig {
    /// Parses a partial JSON override on top of the defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let r = &self.render;
        if r.width == 0 || r.height == 0 {
            return Err(Error::Config(format!(
                "render size must be non-zero, got {}x{}",
                r.width, r.height
            )));
        }
        let positive = [
            ("render.sprite_scale", r.sprite_scale),
            ("render.max_sprite_height_factor", r.max_sprite_height_factor),
            ("render.max_ray_distance", r.max_ray_distance),
            ("movement.walk_speed", self.movement.walk_speed),
            ("movement.run_speed", self.movement.run_speed),
            ("movement.turn_speed", self.movement.turn_speed),
            ("movement.run_turn_speed", self.movement.run_turn_speed),
            ("combat.fire_speed", self.combat.fire_speed),
            ("combat.projectile_ttl", self.combat.projectile_ttl),
            ("patrol.speed", self.patrol.speed),
            ("patrol.arrive_epsilon", self.patrol.arrive_epsilon),
            ("frame.max_dt", self.frame.max_dt),
            ("audio.bpm", self.audio.bpm),
        ];
        for (name, value) in positive {
            if value.is_nan() || value <= 0.0 {
                return Err(Error::Config(format!("{} must be positive, got {}", name, value)));
            }
        }
        if self.combat.fire_cooldown < 0.0 || r.depth_tolerance < 0.0 {
            return Err(Error::Config("cooldown and tolerance cannot be negative".into()));
        }
        Ok(())
    }
}
