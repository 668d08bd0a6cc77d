//! High-level configuration of an acquisition in terms of physical qualities.

use crate::{Error, Result};
use crate::params::VoltsPerDiv;
use crate::device::Profile;

/// Samples in one curve record. Fixed by the instrument family.
pub const SAMPLE_DEPTH: usize = 2500;
pub const DIVS_PER_SCREEN: u32 = 10;
pub const MAX_CHANNELS: usize = 4;

/// Acquisition rates the instrument family supports, in samples per second.
pub const SAMPLE_RATES: [u64; 21] = [
    50,
    100,
    250,
    500,
    1_000,
    2_500,
    5_000,
    10_000,
    25_000,
    50_000,
    100_000,
    250_000,
    500_000,
    1_000_000,
    2_500_000,
    5_000_000,
    10_000_000,
    25_000_000,
    50_000_000,
    100_000_000,
    250_000_000,
];

pub const DEFAULT_SAMPLE_RATE: u64 = SAMPLE_RATES[12]; // 500 kSa/s

/// Horizontal scale, in seconds per division, that makes one screen hold
/// exactly one curve record at `sample_rate`.
pub fn timebase_for_samplerate(sample_rate: u64) -> f64 {
    SAMPLE_DEPTH as f64 / (sample_rate as f64 * DIVS_PER_SCREEN as f64)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelConfiguration {
    pub volts_per_div: VoltsPerDiv,
}

impl Default for ChannelConfiguration {
    fn default() -> Self {
        Self { volts_per_div: VoltsPerDiv::default() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceConfiguration {
    pub sample_rate: u64,
    /// Stop the run once this many samples were delivered, counted across
    /// all channels. `None` runs until every enabled channel is downloaded.
    pub limit_samples: Option<u64>,
    /// Stop the run once this much wall-clock time has elapsed.
    pub limit_millis: Option<u64>,
    /// `None` disables the channel.
    pub channels: [Option<ChannelConfiguration>; MAX_CHANNELS],
}

impl Default for DeviceConfiguration {
    fn default() -> Self {
        DeviceConfiguration {
            sample_rate: DEFAULT_SAMPLE_RATE,
            limit_samples: None,
            limit_millis: None,
            channels: [Some(ChannelConfiguration::default()); MAX_CHANNELS],
        }
    }
}

impl DeviceConfiguration {
    pub fn timebase(&self) -> f64 {
        timebase_for_samplerate(self.sample_rate)
    }

    /// Reject out-of-range values before a run starts; nothing is checked
    /// mid-run.
    pub fn validate(&self, profile: &Profile) -> Result<()> {
        if !SAMPLE_RATES.contains(&self.sample_rate) {
            return Err(Error::Config("sample rate not in the supported set"))
        }
        if let Some(limit) = self.limit_samples {
            if limit == 0 || limit % SAMPLE_DEPTH as u64 != 0 {
                return Err(Error::Config("sample limit must be a positive multiple \
                                          of the record depth"))
            }
        }
        if self.channels.iter().skip(profile.analog_channels).any(Option::is_some) {
            return Err(Error::Config("channel index beyond device channel count"))
        }
        if self.channels[..profile.analog_channels].iter().all(Option::is_none)
                && profile.aux.is_none() {
            return Err(Error::Config("no channel enabled"))
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::device::PROFILES;

    fn profile(name: &str) -> &'static Profile {
        PROFILES.iter().find(|profile| profile.name == name).unwrap()
    }

    #[test]
    fn test_timebase_over_all_rates() {
        for &rate in SAMPLE_RATES.iter() {
            let timebase = timebase_for_samplerate(rate);
            assert_eq!(timebase, 2500.0 / (rate as f64 * 10.0));
        }
        assert_eq!(timebase_for_samplerate(500_000), 5e-4);
        assert_eq!(timebase_for_samplerate(50), 5.0);
    }

    #[test]
    fn test_validate_default() {
        let config = DeviceConfiguration::default();
        assert!(config.validate(profile("TDS 224")).is_ok());
    }

    #[test]
    fn test_validate_rejects_unsupported_rate() {
        let config = DeviceConfiguration { sample_rate: 12345, ..Default::default() };
        assert!(matches!(config.validate(profile("TDS 220")), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_misaligned_limit() {
        let mut config = DeviceConfiguration::default();
        config.limit_samples = Some(3000);
        assert!(matches!(config.validate(profile("TDS 220")), Err(Error::Config(_))));
        config.limit_samples = Some(5000);
        assert!(config.validate(profile("TDS 220")).is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_channel() {
        // TDS 220 has two channels; enabling CH3 is a configuration error.
        let config = DeviceConfiguration::default();
        assert!(matches!(config.validate(profile("TDS 220")), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_all_disabled() {
        let config = DeviceConfiguration { channels: [None; MAX_CHANNELS], ..Default::default() };
        assert!(matches!(config.validate(profile("TDS 220")), Err(Error::Config(_))));
    }
}
