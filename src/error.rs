//! Configuration error types.
//!
//! Construction-time validation returns `Result<T, ConfigError>` instead of
//! tolerating degenerate parameters silently at tick time.

use core::fmt;

/// Error produced when a controller or oscillator is built with parameters
/// that would make the spring integration meaningless.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// Mass must be positive and finite (it divides the applied force).
    NonPositiveMass {
        /// The rejected mass value.
        value: f32,
    },
    /// A spring constant (stiffness or damper) must be non-negative and finite.
    NegativeSpringConstant {
        /// Which constant was rejected.
        name: &'static str,
        /// The rejected value.
        value: f32,
    },
    /// A length or duration parameter was out of its valid range.
    InvalidParameter {
        /// Which parameter was rejected.
        name: &'static str,
        /// The rejected value.
        value: f32,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPositiveMass { value } => {
                write!(f, "mass must be positive and finite, got {value}")
            }
            Self::NegativeSpringConstant { name, value } => {
                write!(f, "{name} must be non-negative and finite, got {value}")
            }
            Self::InvalidParameter { name, value } => {
                write!(f, "invalid value for {name}: {value}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
