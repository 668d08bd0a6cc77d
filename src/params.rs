//! Per-channel calibration and the derived decode parameters.

use std::fmt;

use bitflags::bitflags;

use crate::config::DIVS_PER_SCREEN;

/// Highest raw sample code the instrument emits in a curve record.
pub const MAX_SAMPLE_VALUE: u32 = 256;

/// Vertical scale as a ratio of two small integers, e.g. 2/1 for 2 V/div.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoltsPerDiv {
    pub num: u32,
    pub den: u32,
}

impl VoltsPerDiv {
    pub const fn new(num: u32, den: u32) -> VoltsPerDiv {
        VoltsPerDiv { num, den }
    }

    pub fn ratio(self) -> f32 {
        self.num as f32 / self.den as f32
    }
}

impl Default for VoltsPerDiv {
    fn default() -> Self {
        VoltsPerDiv::new(2, 1)
    }
}

impl fmt::Display for VoltsPerDiv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.num % self.den == 0 {
            write!(f, "{}", self.num / self.den)
        } else {
            write!(f, "{}", self.ratio())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quantity {
    #[default]
    Voltage,
    Temperature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Unit {
    #[default]
    Volt,
    Celsius,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct QuantityFlags: u32 {
        const DC  = 1<<0;
        const AC  = 1<<1;
        const RMS = 1<<2;
    }
}

/// Everything the decoder and the emission step need to know about one
/// channel. Resolved when a run starts and read-only while it is active.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelParameters {
    pub volts_per_div: VoltsPerDiv,
    pub quantity: Quantity,
    pub unit: Unit,
    pub flags: QuantityFlags,
    /// Display resolution, in decimal digits.
    pub digits: i32,
    /// Resolution the instrument encodes samples with.
    pub encoding_digits: i32,
    pub exponent: i32,
}

impl Default for ChannelParameters {
    fn default() -> Self {
        ChannelParameters {
            volts_per_div: VoltsPerDiv::default(),
            quantity: Quantity::default(),
            unit: Unit::default(),
            flags: QuantityFlags::empty(),
            digits: 0,
            encoding_digits: 0,
            exponent: 0,
        }
    }
}

impl ChannelParameters {
    /// Divisor taking a raw curve code to volts:
    /// `sample = raw / ((256 / 10) / volts_per_div)`.
    pub fn scale_factor(&self) -> f32 {
        (MAX_SAMPLE_VALUE as f32 / DIVS_PER_SCREEN as f32) / self.volts_per_div.ratio()
    }
}
