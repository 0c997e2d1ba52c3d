//! Core value types: identifiers, stakes and distribution windows.
//!
//! Token amounts and share-seconds are `u128` base units; timestamps and
//! durations are `i64` seconds so that negative elapsed time can be detected
//! rather than wrapped.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::InputError;

/// Token amount in base units.
pub type Amount = u128;

/// Unix timestamp (or any shared epoch) in seconds.
pub type Timestamp = i64;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Participant identifier (typically an account address).
    UserId
);

string_id!(
    /// Distribution token identifier (typically a token address or symbol).
    TokenId
);

/// One deposit in a user's FIFO stake queue.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stake {
    pub amount: Amount,
    pub staked_at: Timestamp,
}

impl Stake {
    /// Seconds this stake has been held as of `at`.
    ///
    /// Negative when `at` predates the stake; callers turn that into
    /// [`InputError::NegativeElapsed`] through the multiplier curve.
    pub fn elapsed(&self, at: Timestamp) -> Result<i64, InputError> {
        at.checked_sub(self.staked_at)
            .ok_or(InputError::ArithmeticOverflow)
    }
}

/// A distribution window `[start, end]`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(try_from = "WindowBounds")]
pub struct Window {
    start: Timestamp,
    end: Timestamp,
}

impl Window {
    /// Create a window; `end < start` is rejected.
    pub fn new(start: Timestamp, end: Timestamp) -> Result<Self, InputError> {
        if end < start {
            return Err(InputError::InvertedWindow { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn end(&self) -> Timestamp {
        self.end
    }

    /// Window length in seconds.
    pub fn duration(&self) -> u64 {
        self.end.abs_diff(self.start)
    }

    /// Whether `at` lies inside `[start, end]`.
    pub fn contains(&self, at: Timestamp) -> bool {
        self.start <= at && at <= self.end
    }
}

#[derive(Deserialize)]
struct WindowBounds {
    start: Timestamp,
    end: Timestamp,
}

impl TryFrom<WindowBounds> for Window {
    type Error = InputError;

    fn try_from(bounds: WindowBounds) -> Result<Self, Self::Error> {
        Self::new(bounds.start, bounds.end)
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}
