use std::fmt;

/// Packet timestamp, with microsecond resolution
///
/// Unlike std::time::Duration, fields are exposed and no operation panics.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct Duration {
    pub secs: u32,
    pub micros: u32,
}

pub const MICROS_PER_SEC: u32 = 1_000_000;

impl Duration {
    /// Build Duration from secs and micros
    pub fn new(secs: u32, micros: u32) -> Duration {
        Duration { secs, micros }
    }

    /// Build Duration from a fractional part expressed in `unit` ticks per second
    pub fn from_frac(secs: u32, frac: u32, unit: u64) -> Duration {
        let micros = if unit == 0 {
            0
        } else {
            let micros = u64::from(frac) * u64::from(MICROS_PER_SEC) / unit;
            u32::try_from(micros).unwrap_or(u32::MAX)
        };
        Duration { secs, micros }
    }

    /// Test if Duration object is null
    #[inline]
    pub fn is_null(self) -> bool {
        self.secs == 0 && self.micros == 0
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{:06}", self.secs, self.micros)
    }
}
