//! # Macros
//!
//! $$
//! \text{guard}:(\text{condition},\theta)\mapsto \texttt{Err(OpsError)}
//! $$
//!
//! Early-return guards used by parameter validation.

/// Return [`OpsError::InvalidHyperparameter`](crate::error::OpsError) unless `$cond` holds.
macro_rules! ensure_param {
  ($cond:expr, $name:expr, $value:expr, $expected:expr $(,)?) => {
    if !($cond) {
      return Err($crate::error::OpsError::InvalidHyperparameter {
        name: $name,
        value: format!("{:?}", $value),
        expected: $expected,
      });
    }
  };
}

/// Return [`OpsError::InsufficientData`](crate::error::OpsError) unless `$cond` holds.
macro_rules! ensure_data {
  ($cond:expr, $algorithm:expr, $available:expr, $($requirement:tt)+) => {
    if !($cond) {
      return Err($crate::error::OpsError::InsufficientData {
        algorithm: $algorithm,
        requirement: format!($($requirement)+),
        available: $available,
      });
    }
  };
}

pub(crate) use ensure_data;
pub(crate) use ensure_param;
