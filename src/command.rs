//! Builds the exact ASCII command text the instrument expects.

use std::fmt;

use crate::params::VoltsPerDiv;

/// One instrument command. Each variant carries exactly the arguments its
/// wire format needs; formatting never fails.
///
/// `channel` is the 1-based channel number as printed on the front panel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command<'a> {
    /// `CH<n>:POS 0`
    ResetPosition { channel: u8 },
    /// `CH<n>:SCA <v>`
    VerticalScale { channel: u8, volts_per_div: VoltsPerDiv },
    /// `SEL:CH<n> ON`
    SelectOn { channel: u8 },
    /// `HOR:SCA <s.sse±dd>`
    HorizontalScale { seconds_per_div: f64 },
    /// `ACQ:STOPA SEQ`
    StopAfterSequence,
    /// `ACQ:STATE RUN`
    AcquireRun,
    /// `ACQ:STATE STOP`
    AcquireStop,
    /// `DAT:SOU <source>`
    DataSource { source: &'a str },
    /// `CURV?`
    QueryCurve,
    /// `*IDN?`
    Identify,
}

impl fmt::Display for Command<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::ResetPosition { channel } => {
                debug_assert!((1..=4).contains(&channel));
                write!(f, "CH{}:POS 0", channel)
            }
            Self::VerticalScale { channel, volts_per_div } => {
                debug_assert!((1..=4).contains(&channel));
                write!(f, "CH{}:SCA {}", channel, volts_per_div)
            }
            Self::SelectOn { channel } => {
                debug_assert!((1..=4).contains(&channel));
                write!(f, "SEL:CH{} ON", channel)
            }
            Self::HorizontalScale { seconds_per_div } =>
                write!(f, "HOR:SCA {}", Scientific(seconds_per_div)),
            Self::StopAfterSequence =>
                write!(f, "ACQ:STOPA SEQ"),
            Self::AcquireRun =>
                write!(f, "ACQ:STATE RUN"),
            Self::AcquireStop =>
                write!(f, "ACQ:STATE STOP"),
            Self::DataSource { source } =>
                write!(f, "DAT:SOU {}", source),
            Self::QueryCurve =>
                write!(f, "CURV?"),
            Self::Identify =>
                write!(f, "*IDN?"),
        }
    }
}

/// C `%.2e` scientific notation: two-digit mantissa fraction, sign and at
/// least two digits in the exponent. The instrument's parser expects this
/// exact shape.
struct Scientific(f64);

impl fmt::Display for Scientific {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let value = self.0;
        if value == 0.0 {
            return write!(f, "0.00e+00")
        }
        let sign = if value < 0.0 { "-" } else { "" };
        let mut exponent = value.abs().log10().floor() as i32;
        let mut mantissa = value.abs() / 10f64.powi(exponent);
        // rounding the mantissa to two places can carry into the exponent
        mantissa = (mantissa * 100.0).round() / 100.0;
        if mantissa >= 10.0 {
            mantissa /= 10.0;
            exponent += 1;
        }
        let exponent_sign = if exponent < 0 { '-' } else { '+' };
        write!(f, "{}{:.2}e{}{:02}", sign, mantissa, exponent_sign, exponent.abs())
    }
}
