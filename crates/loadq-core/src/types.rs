//! Small value types shared across crates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A target bounding box in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scale {
    pub width: u32,
    pub height: u32,
}

impl Scale {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A square box.
    #[must_use]
    pub const fn square(side: u32) -> Self {
        Self::new(side, side)
    }

    #[must_use]
    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Whether `self` covers more than `tolerance` square pixels beyond `other`.
    ///
    /// No previous scale counts as smaller than any scale.
    #[must_use]
    pub const fn is_significantly_larger(&self, other: Option<Self>, tolerance: u64) -> bool {
        match other {
            None => true,
            Some(other) => self.area() > other.area() + tolerance,
        }
    }

    /// Whether a `width`×`height` image fits inside this box.
    #[must_use]
    pub const fn contains(&self, width: u32, height: u32) -> bool {
        width <= self.width && height <= self.height
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Scale {
    type Err = String;

    /// Parse `WIDTHxHEIGHT`, e.g. `320x240`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
        let width = w
            .trim()
            .parse()
            .map_err(|e| format!("invalid width '{w}': {e}"))?;
        let height = h
            .trim()
            .parse()
            .map_err(|e| format!("invalid height '{h}': {e}"))?;
        Ok(Self::new(width, height))
    }
}
