// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tilt position type for blind control.
//!
//! This module provides a type-safe representation of tilt positions,
//! ensuring values are always within the valid range of 0-180.

use std::fmt;

use serde::Serialize;

/// Tilt position of a blind (0-180).
///
/// MySmartBlinds report tilt as an angle where both extremes mean the slats
/// are closed: 0 is closed-down, 180 is closed-up, 90 is fully open.
///
/// # Examples
///
/// ```
/// use msb_bridge::types::TiltPosition;
///
/// let pos = TiltPosition::clamped(90);
/// assert_eq!(pos.value(), 90);
/// assert!(!pos.is_closed());
///
/// // Values outside the range are clamped
/// assert_eq!(TiltPosition::clamped(200).value(), 180);
/// assert_eq!(TiltPosition::clamped(-5).value(), 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TiltPosition(u16);

impl TiltPosition {
    /// Minimum tilt position (closed-down).
    pub const MIN: Self = Self(0);

    /// Maximum tilt position (closed-up).
    pub const MAX: Self = Self(180);

    /// Reported positions below this snap to 0.
    const LOW_SNAP: i64 = 4;

    /// Reported positions above this snap to 180.
    const HIGH_SNAP: i64 = 176;

    /// Creates a tilt position, clamping to the valid range.
    ///
    /// Values below 0 are clamped to 0, values above 180 to 180.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub const fn clamped(raw: i64) -> Self {
        if raw < 0 {
            Self::MIN
        } else if raw > 180 {
            Self::MAX
        } else {
            // Safe: 0..=180 fits in u16
            Self(raw as u16)
        }
    }

    /// Creates a tilt position from a raw hub reading, snapping
    /// nearly-closed values to the closed boundaries.
    ///
    /// Readings below 4 become 0, readings above 176 become 180; everything
    /// in between passes through unchanged. The hub rarely reports the exact
    /// boundary values even when the slats are fully closed.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub const fn normalized(raw: i64) -> Self {
        if raw < Self::LOW_SNAP {
            Self::MIN
        } else if raw > Self::HIGH_SNAP {
            Self::MAX
        } else {
            // Safe: 4..=176 fits in u16
            Self(raw as u16)
        }
    }

    /// Returns the position value.
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }

    /// Returns whether this position means the slats are closed.
    #[must_use]
    pub const fn is_closed(self) -> bool {
        self.0 == 0 || self.0 == 180
    }

    /// Returns the open/closed label for this position.
    #[must_use]
    pub const fn tilt(self) -> BlindTilt {
        if self.is_closed() {
            BlindTilt::Closed
        } else {
            BlindTilt::Open
        }
    }
}

impl fmt::Display for TiltPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Open/closed label derived from a [`TiltPosition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlindTilt {
    /// Slats are at least partially open.
    Open,
    /// Slats are fully closed (position 0 or 180).
    Closed,
}

impl fmt::Display for BlindTilt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamped_in_range() {
        for v in 0..=180 {
            assert_eq!(TiltPosition::clamped(v).value(), u16::try_from(v).unwrap());
        }
    }

    #[test]
    fn clamped_out_of_range() {
        assert_eq!(TiltPosition::clamped(-1).value(), 0);
        assert_eq!(TiltPosition::clamped(181).value(), 180);
        assert_eq!(TiltPosition::clamped(i64::MAX).value(), 180);
        assert_eq!(TiltPosition::clamped(i64::MIN).value(), 0);
    }

    #[test]
    fn normalized_snaps_low() {
        for v in -10..4 {
            assert_eq!(TiltPosition::normalized(v).value(), 0);
        }
    }

    #[test]
    fn normalized_snaps_high() {
        for v in 177..200 {
            assert_eq!(TiltPosition::normalized(v).value(), 180);
        }
    }

    #[test]
    fn normalized_passes_through() {
        for v in 4..=176 {
            assert_eq!(TiltPosition::normalized(v).value(), u16::try_from(v).unwrap());
        }
    }

    #[test]
    fn closed_only_at_boundaries() {
        assert!(TiltPosition::MIN.is_closed());
        assert!(TiltPosition::MAX.is_closed());
        assert!(!TiltPosition::clamped(1).is_closed());
        assert!(!TiltPosition::clamped(90).is_closed());
        assert!(!TiltPosition::clamped(179).is_closed());
    }

    #[test]
    fn tilt_label() {
        assert_eq!(TiltPosition::MIN.tilt(), BlindTilt::Closed);
        assert_eq!(TiltPosition::MAX.tilt(), BlindTilt::Closed);
        assert_eq!(TiltPosition::clamped(90).tilt(), BlindTilt::Open);
    }

    #[test]
    fn tilt_display() {
        assert_eq!(BlindTilt::Open.to_string(), "open");
        assert_eq!(BlindTilt::Closed.to_string(), "closed");
    }

    #[test]
    fn tilt_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&BlindTilt::Closed).unwrap(), "\"closed\"");
    }

    #[test]
    fn position_display() {
        assert_eq!(TiltPosition::clamped(42).to_string(), "42");
    }
}
