// SPDX-FileCopyrightText: 2026 Contributors to the MediaGraph project.
// SPDX-License-Identifier: Apache-2.0

//! Packet timestamps.
//!
//! Timestamps count microseconds since the engine epoch as a signed 64-bit
//! value and travel across the ABI as plain integers. A handful of
//! out-of-band values at both ends of the range are reserved for stream
//! control; data packets only ever carry range values (or the pre-/post-
//! stream markers on side channels).

use std::fmt;

/// A monotonic microsecond timestamp with reserved sentinel values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    /// No timestamp has been assigned.
    pub const UNSET: Timestamp = Timestamp(mediagraph_sys::MG_TIMESTAMP_UNSET);
    /// The stream has not started yet.
    pub const UNSTARTED: Timestamp = Timestamp(mediagraph_sys::MG_TIMESTAMP_UNSTARTED);
    /// Side-channel marker delivered before the first data packet.
    pub const PRE_STREAM: Timestamp = Timestamp(mediagraph_sys::MG_TIMESTAMP_PRE_STREAM);
    /// Smallest timestamp a data packet can carry.
    pub const MIN: Timestamp = Timestamp(mediagraph_sys::MG_TIMESTAMP_MIN);
    /// Largest timestamp a data packet can carry.
    pub const MAX: Timestamp = Timestamp(mediagraph_sys::MG_TIMESTAMP_MAX);
    /// Side-channel marker delivered after the last data packet.
    pub const POST_STREAM: Timestamp = Timestamp(mediagraph_sys::MG_TIMESTAMP_POST_STREAM);
    /// One past [`Timestamp::POST_STREAM`].
    pub const ONE_OVER_POST_STREAM: Timestamp =
        Timestamp(mediagraph_sys::MG_TIMESTAMP_ONE_OVER_POST_STREAM);
    /// The stream has completed.
    pub const DONE: Timestamp = Timestamp(mediagraph_sys::MG_TIMESTAMP_DONE);

    /// Creates a timestamp from a raw microsecond count.
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// The raw microsecond count.
    pub const fn micros(self) -> i64 {
        self.0
    }

    /// The timestamp in seconds.
    pub fn seconds(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Whether this is one of the reserved out-of-band values.
    pub fn is_special_value(self) -> bool {
        !self.is_range_value()
    }

    /// Whether this is an ordinary data timestamp
    /// (`Timestamp::MIN..=Timestamp::MAX`).
    pub fn is_range_value(self) -> bool {
        self.0 >= Self::MIN.0 && self.0 <= Self::MAX.0
    }

    /// Whether a packet carrying this timestamp may be added to a stream.
    pub fn is_allowed_in_stream(self) -> bool {
        self.is_range_value() || self == Self::PRE_STREAM || self == Self::POST_STREAM
    }

    /// The next timestamp allowed in a stream after this one, if any.
    pub fn next_allowed_in_stream(self) -> Option<Timestamp> {
        if self == Self::PRE_STREAM {
            return Some(Self::MIN);
        }
        if self.is_range_value() && self < Self::MAX {
            return Some(Self(self.0 + 1));
        }
        None
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::UNSET => write!(f, "Timestamp::Unset"),
            Self::UNSTARTED => write!(f, "Timestamp::Unstarted"),
            Self::PRE_STREAM => write!(f, "Timestamp::PreStream"),
            Self::POST_STREAM => write!(f, "Timestamp::PostStream"),
            Self::ONE_OVER_POST_STREAM => write!(f, "Timestamp::OneOverPostStream"),
            Self::DONE => write!(f, "Timestamp::Done"),
            Self(micros) => write!(f, "{micros}us"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_are_special() {
        assert!(Timestamp::UNSET.is_special_value());
        assert!(Timestamp::PRE_STREAM.is_special_value());
        assert!(Timestamp::POST_STREAM.is_special_value());
        assert!(Timestamp::DONE.is_special_value());
        assert!(!Timestamp::from_micros(0).is_special_value());
    }

    #[test]
    fn stream_admission() {
        assert!(Timestamp::from_micros(1).is_allowed_in_stream());
        assert!(Timestamp::PRE_STREAM.is_allowed_in_stream());
        assert!(Timestamp::POST_STREAM.is_allowed_in_stream());
        assert!(!Timestamp::UNSET.is_allowed_in_stream());
        assert!(!Timestamp::DONE.is_allowed_in_stream());
    }

    #[test]
    fn next_allowed_in_stream() {
        assert_eq!(
            Timestamp::PRE_STREAM.next_allowed_in_stream(),
            Some(Timestamp::MIN)
        );
        assert_eq!(
            Timestamp::from_micros(41).next_allowed_in_stream(),
            Some(Timestamp::from_micros(42))
        );
        assert_eq!(Timestamp::MAX.next_allowed_in_stream(), None);
        assert_eq!(Timestamp::UNSET.next_allowed_in_stream(), None);
    }
}
