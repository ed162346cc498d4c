/*!
 * Core Types
 * Identifiers shared by every subsystem
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tenant / configuration identifier
///
/// Selects which compiled configuration applies to a request. A few values
/// are reserved, see the associated constants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigureId(pub i64);

impl ConfigureId {
    /// Bypass all observation: no context is extracted for the request
    pub const BYPASS: ConfigureId = ConfigureId(-1);
    /// Reactions still run, the bus renders nothing
    pub const OBSERVATION_BYPASS: ConfigureId = ConfigureId(-2);
    /// Observations run without span allocation
    pub const TRACE_BYPASS: ConfigureId = ConfigureId(-3);
    /// The store's default configuration
    pub const DEFAULT: ConfigureId = ConfigureId(0);

    #[inline]
    pub fn is_bypass(self) -> bool {
        self == Self::BYPASS
    }

    #[inline]
    pub fn skips_observation(self) -> bool {
        self == Self::OBSERVATION_BYPASS
    }

    #[inline]
    pub fn skips_tracing(self) -> bool {
        self == Self::TRACE_BYPASS
    }
}

impl fmt::Display for ConfigureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ConfigureId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Request identifier, assigned by the network layer
pub type RequestId = u64;

/// Globally unique event identifier, assigned by the bus
pub type EventId = u64;

/// Unix timestamp in nanoseconds
pub type Nanos = i64;

/// Current wall clock time in unix nanoseconds
#[inline]
pub fn now_nanos() -> Nanos {
    let now = time::OffsetDateTime::now_utc().unix_timestamp_nanos();
    i64::try_from(now).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_ids() {
        assert!(ConfigureId::BYPASS.is_bypass());
        assert!(!ConfigureId::DEFAULT.is_bypass());
        assert!(ConfigureId::OBSERVATION_BYPASS.skips_observation());
        assert!(ConfigureId::TRACE_BYPASS.skips_tracing());
        assert!(!ConfigureId(7).skips_tracing());
        assert_eq!(ConfigureId::default(), ConfigureId::DEFAULT);
    }

    #[test]
    fn test_now_nanos_is_positive() {
        assert!(now_nanos() > 0);
    }
}
