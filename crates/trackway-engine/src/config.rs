//! Physics configuration, per-train properties, and validation errors.
//!
//! [`PhysicsConfig`] is the engine-wide layer, checked once by
//! [`validate()`](PhysicsConfig::validate) when a
//! [`TrainEngine`](crate::engine::TrainEngine) is built.
//! [`TrainProperties`] overrides a subset per train.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use trackway_core::GroupId;

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during [`PhysicsConfig::validate()`].
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// A distance, speed or gravity value is NaN, infinite, zero or negative.
    NonPositive {
        /// Name of the offending field.
        field: &'static str,
        /// The invalid value.
        value: f64,
    },
    /// A coupling force constant is negative or not finite.
    NegativeForcer {
        /// Name of the offending field.
        field: &'static str,
        /// The invalid value.
        value: f64,
    },
    /// Coupling distances are out of order.
    DistanceOrder {
        /// Description of which ordering was violated.
        reason: String,
    },
    /// `near_cart_distance_factor` is below 1.
    NearFactorTooSmall {
        /// The configured factor.
        value: f64,
    },
    /// `max_following_angle` is outside `(0, 180]`.
    InvalidAngle {
        /// The configured angle.
        value: f64,
    },
    /// `tick_interval` is zero.
    ZeroTickInterval,
    /// `max_command_queue` is zero.
    CommandQueueZero,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPositive { field, value } => {
                write!(f, "{field} must be finite and positive, got {value}")
            }
            Self::NegativeForcer { field, value } => {
                write!(f, "{field} must be finite and non-negative, got {value}")
            }
            Self::DistanceOrder { reason } => write!(f, "invalid coupling distances: {reason}"),
            Self::NearFactorTooSmall { value } => {
                write!(f, "near_cart_distance_factor must be >= 1.0, got {value}")
            }
            Self::InvalidAngle { value } => {
                write!(f, "max_following_angle must be in (0, 180], got {value}")
            }
            Self::ZeroTickInterval => write!(f, "tick_interval must be non-zero"),
            Self::CommandQueueZero => write!(f, "max_command_queue must be at least 1"),
        }
    }
}

impl Error for ConfigError {}

// ── PhysicsConfig ──────────────────────────────────────────────────

/// Engine-wide physics tunables.
#[derive(Clone, Debug, PartialEq)]
pub struct PhysicsConfig {
    /// Target spacing between coupled members on straight track. Default: 1.5.
    pub cart_distance: f64,
    /// Target spacing when a pair is turned relative to each other. Default: 1.6.
    pub turned_cart_distance: f64,
    /// Correction strength on straight track. Default: 0.1.
    pub cart_distance_forcer: f64,
    /// Correction strength when turned. Default: 0.2.
    pub turned_cart_distance_forcer: f64,
    /// Multiplier on the correction strength when a pair is too close. Default: 1.2.
    pub near_cart_distance_factor: f64,
    /// Beyond this distance a pair is no longer coupled. Default: 4.0.
    pub max_cart_distance: f64,
    /// Maximum angle, in degrees, between a follower's heading and its
    /// leader. Default: 90.
    pub max_following_angle: f64,
    /// Speed above which a tick is split into sub-steps. Default: 0.4.
    pub substep_threshold: f64,
    /// Speed limit of a train without properties. Default: 0.4.
    pub default_speed_limit: f64,
    /// Slope gravity per step. Default: 0.0078125.
    pub slope_gravity: f64,
    /// Downward acceleration of a derailed member per step. Default: 0.04.
    pub derailed_gravity: f64,
    /// Only hold chunks for trains that are moving. Default: false.
    pub keep_chunks_loaded_only_when_moving: bool,
    /// Wall-clock length of one tick, used by duration waits. Default: 50 ms.
    pub tick_interval: Duration,
    /// Command queue capacity. Default: 1024.
    pub max_command_queue: usize,
    /// Fuel a powered member holds after a refill, in ticks. Default: 3600.
    pub max_fuel: u32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            cart_distance: 1.5,
            turned_cart_distance: 1.6,
            cart_distance_forcer: 0.1,
            turned_cart_distance_forcer: 0.2,
            near_cart_distance_factor: 1.2,
            max_cart_distance: 4.0,
            max_following_angle: 90.0,
            substep_threshold: 0.4,
            default_speed_limit: 0.4,
            slope_gravity: 0.0078125,
            derailed_gravity: 0.04,
            keep_chunks_loaded_only_when_moving: false,
            tick_interval: Duration::from_millis(50),
            max_command_queue: 1024,
            max_fuel: 3600,
        }
    }
}

impl PhysicsConfig {
    /// Validate all invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 1. Distances, speeds and gravity are finite and positive.
        for (field, value) in [
            ("cart_distance", self.cart_distance),
            ("turned_cart_distance", self.turned_cart_distance),
            ("max_cart_distance", self.max_cart_distance),
            ("substep_threshold", self.substep_threshold),
            ("default_speed_limit", self.default_speed_limit),
            ("slope_gravity", self.slope_gravity),
            ("derailed_gravity", self.derailed_gravity),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::NonPositive { field, value });
            }
        }
        // 2. Forcers may be zero but not negative.
        for (field, value) in [
            ("cart_distance_forcer", self.cart_distance_forcer),
            ("turned_cart_distance_forcer", self.turned_cart_distance_forcer),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::NegativeForcer { field, value });
            }
        }
        // 3. cart <= turned < max.
        if self.turned_cart_distance < self.cart_distance {
            return Err(ConfigError::DistanceOrder {
                reason: format!(
                    "turned_cart_distance ({}) is below cart_distance ({})",
                    self.turned_cart_distance, self.cart_distance,
                ),
            });
        }
        if self.max_cart_distance <= self.turned_cart_distance {
            return Err(ConfigError::DistanceOrder {
                reason: format!(
                    "max_cart_distance ({}) must exceed turned_cart_distance ({})",
                    self.max_cart_distance, self.turned_cart_distance,
                ),
            });
        }
        // 4. Near factor.
        if !self.near_cart_distance_factor.is_finite() || self.near_cart_distance_factor < 1.0 {
            return Err(ConfigError::NearFactorTooSmall {
                value: self.near_cart_distance_factor,
            });
        }
        // 5. Following angle.
        let angle = self.max_following_angle;
        if !angle.is_finite() || angle <= 0.0 || angle > 180.0 {
            return Err(ConfigError::InvalidAngle { value: angle });
        }
        // 6. Tick interval and queue.
        if self.tick_interval.is_zero() {
            return Err(ConfigError::ZeroTickInterval);
        }
        if self.max_command_queue == 0 {
            return Err(ConfigError::CommandQueueZero);
        }
        Ok(())
    }
}

// ── TrainProperties ────────────────────────────────────────────────

/// Per-train settings layered over [`PhysicsConfig`].
#[derive(Clone, Debug, PartialEq)]
pub struct TrainProperties {
    /// Display name, used in logs.
    pub name: String,
    /// Maximum speed in blocks per tick.
    pub speed_limit: f64,
    /// Replaces `cart_distance` for this train when set.
    pub coupling_distance: Option<f64>,
    /// A train of several members needs a powered member to stay together.
    pub requires_powered_vehicle: bool,
    /// Hold the surrounding world loaded while this train exists.
    pub keep_chunks_loaded: bool,
}

impl TrainProperties {
    /// Default properties for a new train.
    pub fn new(group: GroupId, config: &PhysicsConfig) -> Self {
        Self {
            name: format!("train{}", group.0),
            speed_limit: config.default_speed_limit,
            coupling_distance: None,
            requires_powered_vehicle: false,
            keep_chunks_loaded: false,
        }
    }

    /// Copy everything except the name onto `other`.
    pub fn copy_settings_to(&self, other: &mut TrainProperties) {
        other.speed_limit = self.speed_limit;
        other.coupling_distance = self.coupling_distance;
        other.requires_powered_vehicle = self.requires_powered_vehicle;
        other.keep_chunks_loaded = self.keep_chunks_loaded;
    }
}
