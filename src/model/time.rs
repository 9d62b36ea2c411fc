//! Match-count, expiry, and delay policies.

use chrono::{DateTime, Duration, Utc};

// ============================================================================
// Time Units
// ============================================================================

/// Wire-level time unit enumeration.
///
/// Sub-millisecond units are accepted on the wire and truncate toward
/// zero when converted to a duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    /// Nanoseconds
    Nanoseconds,
    /// Microseconds
    Microseconds,
    /// Milliseconds
    Milliseconds,
    /// Seconds
    Seconds,
    /// Minutes
    Minutes,
    /// Hours
    Hours,
    /// Days
    Days,
}

impl TimeUnit {
    /// Wire name of the unit.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nanoseconds => "NANOSECONDS",
            Self::Microseconds => "MICROSECONDS",
            Self::Milliseconds => "MILLISECONDS",
            Self::Seconds => "SECONDS",
            Self::Minutes => "MINUTES",
            Self::Hours => "HOURS",
            Self::Days => "DAYS",
        }
    }

    /// Parses a wire name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "NANOSECONDS" => Some(Self::Nanoseconds),
            "MICROSECONDS" => Some(Self::Microseconds),
            "MILLISECONDS" => Some(Self::Milliseconds),
            "SECONDS" => Some(Self::Seconds),
            "MINUTES" => Some(Self::Minutes),
            "HOURS" => Some(Self::Hours),
            "DAYS" => Some(Self::Days),
            _ => None,
        }
    }

    /// Converts `value` units into a chrono duration, saturating at the
    /// representable bounds.
    ///
    /// The wire accepts any integer magnitude, so the coarse units must
    /// not panic on values chrono cannot represent.
    #[must_use]
    pub fn to_duration(self, value: i64) -> Duration {
        let converted = match self {
            Self::Nanoseconds => Some(Duration::nanoseconds(value)),
            Self::Microseconds => Some(Duration::microseconds(value)),
            Self::Milliseconds => Some(Duration::milliseconds(value)),
            Self::Seconds => Duration::try_seconds(value),
            Self::Minutes => Duration::try_minutes(value),
            Self::Hours => Duration::try_hours(value),
            Self::Days => Duration::try_days(value),
        };
        converted.unwrap_or(if value < 0 {
            Duration::MIN
        } else {
            Duration::MAX
        })
    }
}

// ============================================================================
// Delay
// ============================================================================

/// A delay applied before a generated message is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Delay {
    /// Unit of the delay value
    pub time_unit: TimeUnit,
    /// Magnitude of the delay in `time_unit`s
    pub value: i64,
}

impl Delay {
    /// Creates a delay of `value` `time_unit`s.
    #[must_use]
    pub const fn new(time_unit: TimeUnit, value: i64) -> Self {
        Self { time_unit, value }
    }

    /// The delay as a chrono duration.
    #[must_use]
    pub fn duration(self) -> Duration {
        self.time_unit.to_duration(self.value)
    }
}

// ============================================================================
// Times
// ============================================================================

/// Remaining-match counter for an expectation.
///
/// Each match consumes one unit; at zero the expectation is exhausted
/// and ineligible for further matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Times {
    /// Matches any number of requests
    Unlimited,
    /// Matches at most `remaining` further requests
    Exactly {
        /// Units left before exhaustion
        remaining: u32,
    },
}

impl Times {
    /// An unlimited counter.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self::Unlimited
    }

    /// A counter allowing exactly `count` matches.
    #[must_use]
    pub const fn exactly(count: u32) -> Self {
        Self::Exactly { remaining: count }
    }

    /// A counter allowing exactly one match.
    #[must_use]
    pub const fn once() -> Self {
        Self::Exactly { remaining: 1 }
    }

    /// Returns `true` when no further matches remain.
    #[must_use]
    pub const fn is_exhausted(self) -> bool {
        matches!(self, Self::Exactly { remaining: 0 })
    }

    /// Consumes one unit. Saturates at zero.
    pub const fn decrement(&mut self) {
        if let Self::Exactly { remaining } = self {
            *remaining = remaining.saturating_sub(1);
        }
    }
}

impl Default for Times {
    fn default() -> Self {
        Self::Unlimited
    }
}

// ============================================================================
// Time To Live
// ============================================================================

/// Wall-clock expiry policy for an expectation.
///
/// The absolute `end_date` is fixed at registration time; eligibility
/// checks compare lazily against the store's clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeToLive {
    /// Never expires
    Unlimited,
    /// Expires once the clock passes `end_date`
    Limited {
        /// Unit the ttl was declared in
        time_unit: TimeUnit,
        /// Declared ttl magnitude
        ttl: i64,
        /// Absolute expiry instant; anchored to `created_at + ttl` at
        /// registration, absent in a freshly parsed document
        end_date: Option<DateTime<Utc>>,
    },
}

impl TimeToLive {
    /// A never-expiring policy.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self::Unlimited
    }

    /// An unanchored policy expiring `ttl` `time_unit`s after registration.
    #[must_use]
    pub const fn limited(time_unit: TimeUnit, ttl: i64) -> Self {
        Self::Limited {
            time_unit,
            ttl,
            end_date: None,
        }
    }

    /// Fixes the absolute expiry instant relative to `created_at`.
    ///
    /// Anchoring an already-anchored policy is a no-op: an explicit
    /// `endDate` supplied by the caller wins. A window too large for the
    /// calendar saturates at the maximum representable instant, which
    /// never expires in practice.
    #[must_use]
    pub fn anchored(self, created_at: DateTime<Utc>) -> Self {
        match self {
            Self::Limited {
                time_unit,
                ttl,
                end_date: None,
            } => {
                let end = created_at
                    .checked_add_signed(time_unit.to_duration(ttl))
                    .unwrap_or(if ttl < 0 {
                        DateTime::<Utc>::MIN_UTC
                    } else {
                        DateTime::<Utc>::MAX_UTC
                    });
                // Millisecond precision: endDate is carried as epoch
                // millis on the wire, so finer precision cannot survive
                // a round trip.
                let end = chrono::TimeZone::timestamp_millis_opt(&Utc, end.timestamp_millis())
                    .single()
                    .unwrap_or(end);
                Self::Limited {
                    time_unit,
                    ttl,
                    end_date: Some(end),
                }
            }
            other => other,
        }
    }

    /// Returns `true` once the policy has elapsed at `now`.
    ///
    /// An unanchored limited policy has not started counting and is not
    /// expired.
    #[must_use]
    pub fn is_expired(self, now: DateTime<Utc>) -> bool {
        match self {
            Self::Unlimited => false,
            Self::Limited { end_date, .. } => end_date.is_some_and(|end| now > end),
        }
    }
}

impl Default for TimeToLive {
    fn default() -> Self {
        Self::Unlimited
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_times_decrement_to_exhaustion() {
        let mut times = Times::exactly(2);
        assert!(!times.is_exhausted());
        times.decrement();
        times.decrement();
        assert!(times.is_exhausted());
        times.decrement();
        assert_eq!(times, Times::exactly(0));
    }

    #[test]
    fn test_times_unlimited_never_exhausts() {
        let mut times = Times::unlimited();
        times.decrement();
        assert!(!times.is_exhausted());
    }

    #[test]
    fn test_ttl_two_hours_window() {
        let created = Utc::now();
        let ttl = TimeToLive::limited(TimeUnit::Hours, 2).anchored(created);
        assert!(!ttl.is_expired(created + Duration::minutes(119)));
        assert!(ttl.is_expired(created + Duration::minutes(121)));
    }

    #[test]
    fn test_ttl_unanchored_is_not_expired() {
        let ttl = TimeToLive::limited(TimeUnit::Seconds, 1);
        assert!(!ttl.is_expired(Utc::now() + Duration::days(1)));
        // Anchoring twice keeps the first anchor.
        let anchor = Utc::now();
        let anchored = ttl.anchored(anchor);
        assert_eq!(anchored.anchored(anchor + Duration::days(1)), anchored);
    }

    #[test]
    fn test_ttl_unlimited_never_expires() {
        let ttl = TimeToLive::unlimited();
        assert!(!ttl.is_expired(Utc::now() + Duration::days(10_000)));
    }

    #[test]
    fn test_extreme_magnitudes_saturate_instead_of_panicking() {
        assert_eq!(TimeUnit::Days.to_duration(i64::MAX), Duration::MAX);
        assert_eq!(TimeUnit::Hours.to_duration(i64::MIN), Duration::MIN);

        let created = Utc::now();
        let ttl = TimeToLive::limited(TimeUnit::Days, i64::MAX).anchored(created);
        assert!(!ttl.is_expired(created + Duration::days(365)));

        let delay = Delay::new(TimeUnit::Days, i64::MAX);
        assert_eq!(delay.duration(), Duration::MAX);
    }

    #[test]
    fn test_time_unit_round_trips_names() {
        for unit in [
            TimeUnit::Nanoseconds,
            TimeUnit::Microseconds,
            TimeUnit::Milliseconds,
            TimeUnit::Seconds,
            TimeUnit::Minutes,
            TimeUnit::Hours,
            TimeUnit::Days,
        ] {
            assert_eq!(TimeUnit::parse(unit.as_str()), Some(unit));
        }
        assert_eq!(TimeUnit::parse("FORTNIGHTS"), None);
    }

    #[test]
    fn test_delay_duration() {
        let delay = Delay::new(TimeUnit::Seconds, 3);
        assert_eq!(delay.duration(), Duration::seconds(3));
    }
}
