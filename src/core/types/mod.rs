//! # Core Types Module
//!
//! Small value types shared by every metric family.
//!
//! ## Key Types
//!
//! * `Percentage` - A value clamped to 0.0..=100.0
//! * `ByteSize` - A size in bytes with unit conversions
//! * `Temperature` - A temperature in Celsius with Fahrenheit conversion
//!
//! ## Example
//!
//! ```rust
//! use tonic_metrics::core::types::ByteSize;
//!
//! let size = ByteSize::new(1024);
//! assert_eq!(size.as_kb(), 1.0);
//! ```

use serde::{Deserialize, Serialize};

/// Represents a percentage value between 0.0 and 100.0
///
/// # Examples
///
/// ```rust
/// use tonic_metrics::core::types::Percentage;
///
/// let p = Percentage::new(75.0).unwrap();
/// assert_eq!(p.as_f64(), 75.0);
///
/// // Values outside 0-100 range return None
/// assert!(Percentage::new(150.0).is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Percentage(f64);

impl Percentage {
    /// Creates a new Percentage from a value between 0 and 100
    /// Returns None if the value is outside the valid range
    pub fn new(value: f64) -> Option<Self> {
        if (0.0..=100.0).contains(&value) {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Create a new percentage value, clamping it to the range 0.0-100.0.
    /// NaN becomes 0.
    pub fn from_f64(value: f64) -> Self {
        if value.is_nan() {
            return Self(0.0);
        }
        Self(value.clamp(0.0, 100.0))
    }

    /// Percentage of `part` in `whole`, 0 when `whole` is zero
    pub fn of(part: f64, whole: f64) -> Self {
        if whole <= 0.0 {
            Self(0.0)
        } else {
            Self::from_f64(part / whole * 100.0)
        }
    }

    /// Returns the percentage value as a float
    pub fn as_f64(&self) -> f64 {
        self.0
    }
}

impl std::fmt::Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1}%", self.0)
    }
}

/// Represents a temperature in Celsius with conversion methods
///
/// # Examples
///
/// ```rust
/// use tonic_metrics::core::types::Temperature;
///
/// let temp = Temperature::new(25.0);
/// assert_eq!(temp.as_celsius(), 25.0);
/// assert_eq!(temp.as_fahrenheit(), 77.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Temperature(f64);

impl Temperature {
    /// Creates a new Temperature from a value in Celsius
    pub fn new(celsius: f64) -> Self {
        Self(celsius)
    }

    /// Returns the temperature in Celsius
    pub fn as_celsius(&self) -> f64 {
        self.0
    }

    /// Returns the temperature in Fahrenheit
    pub fn as_fahrenheit(&self) -> f64 {
        (self.0 * 9.0 / 5.0) + 32.0
    }

    /// Whether the value looks like a real sensor reading.
    ///
    /// SMC keys that are not wired up return 0 or absurd values.
    pub fn is_plausible(&self) -> bool {
        self.0 > 0.0 && self.0 < 150.0
    }
}

/// Represents a size in bytes with convenient conversion methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ByteSize(u64);

impl ByteSize {
    /// Creates a new ByteSize instance from the given number of bytes
    pub fn new(bytes: u64) -> Self {
        Self(bytes)
    }

    /// Returns the size in bytes
    pub fn as_bytes(&self) -> u64 {
        self.0
    }

    /// Returns the size in kilobytes
    pub fn as_kb(&self) -> f64 {
        self.0 as f64 / 1024.0
    }

    /// Returns the size in megabytes
    pub fn as_mb(&self) -> f64 {
        self.as_kb() / 1024.0
    }

    /// Returns the size in gigabytes
    pub fn as_gb(&self) -> f64 {
        self.as_mb() / 1024.0
    }
}

impl From<u64> for ByteSize {
    fn from(bytes: u64) -> Self {
        Self(bytes)
    }
}

impl From<ByteSize> for u64 {
    fn from(size: ByteSize) -> Self {
        size.as_bytes()
    }
}

impl std::ops::Sub for ByteSize {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl std::fmt::Display for ByteSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.as_gb() >= 1.0 {
            write!(f, "{:.2} GB", self.as_gb())
        } else if self.as_mb() >= 1.0 {
            write!(f, "{:.1} MB", self.as_mb())
        } else if self.as_kb() >= 1.0 {
            write!(f, "{:.0} KB", self.as_kb())
        } else {
            write!(f, "{} B", self.0)
        }
    }
}
