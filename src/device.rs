//! Device profiles, identification, and the per-device session state.

use std::time::{Duration, Instant};

use crate::{Error, Result};
use crate::acquire::RunState;
use crate::command::Command;
use crate::config::{ChannelConfiguration, DeviceConfiguration, MAX_CHANNELS, SAMPLE_DEPTH,
                    SAMPLE_RATES};
use crate::frame::{FrameAssembler, Terminator};
use crate::params::{Quantity, Unit};
use crate::transport::Transport;

// Always USB-serial, 1ms is plenty.
pub(crate) const WRITE_TIMEOUT: Duration = Duration::from_millis(1);
const IDENTIFY_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Model {
    Tds210,
    Tds220,
    Tds224,
    Tds1002,
    Tds1012,
    Tds2001,
    Tds2002,
    Tds2012,
    Tds2022,
    Tds2004,
    Tds2014,
    Tds2024,
}

/// A derived reading some models append after the analog channels. It is
/// downloaded like any other channel, just last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuxChannel {
    pub name: &'static str,
    pub selector: &'static str,
    pub quantity: Quantity,
    pub unit: Unit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Profile {
    pub model: Model,
    pub name: &'static str,
    pub analog_channels: usize,
    pub aux: Option<AuxChannel>,
    /// How this model's firmware frames curve records. The TDS 200 family
    /// responds a field at a time and is cut at the first delimiter that
    /// ends a read; the later families emit a whole newline-terminated
    /// record.
    pub curve_terminator: Terminator,
    /// Whether the run counts the samples actually decoded from each
    /// record, or charges a full record depth per download regardless.
    pub honest_sample_count: bool,
}

pub const PROFILES: [Profile; 12] = [
    tds200(Model::Tds210, "TDS 210", 2),
    tds200(Model::Tds220, "TDS 220", 2),
    tds200(Model::Tds224, "TDS 224", 4),

    tds_bw(Model::Tds1002, "TDS 1002", 2),
    tds_bw(Model::Tds1012, "TDS 1012", 2),

    tds_bw(Model::Tds2001, "TDS 2001", 2),
    tds_bw(Model::Tds2002, "TDS 2002", 2),
    tds_bw(Model::Tds2012, "TDS 2012", 2),
    tds_bw(Model::Tds2022, "TDS 2022", 2),

    tds_bw(Model::Tds2004, "TDS 2004", 4),
    tds_bw(Model::Tds2014, "TDS 2014", 4),
    tds_bw(Model::Tds2024, "TDS 2024", 4),
];

const fn tds200(model: Model, name: &'static str, analog_channels: usize) -> Profile {
    Profile {
        model, name, analog_channels,
        aux: None,
        curve_terminator: Terminator::CommaOrNewline,
        honest_sample_count: false,
    }
}

const fn tds_bw(model: Model, name: &'static str, analog_channels: usize) -> Profile {
    Profile {
        model, name, analog_channels,
        aux: None,
        curve_terminator: Terminator::Newline,
        honest_sample_count: true,
    }
}

impl Profile {
    pub fn for_model_name(name: &str) -> Option<&'static Profile> {
        PROFILES.iter().find(|profile| profile.name == name)
    }

    /// Total downloads one run performs with every channel enabled.
    pub fn channel_count(&self) -> usize {
        self.analog_channels + self.aux.is_some() as usize
    }
}

/// Parsed `*IDN?` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub vendor: String,
    pub model: String,
    pub serial: String,
    pub version: String,
}

impl Identity {
    pub fn parse(response: &str) -> Result<Identity> {
        let mut fields = response.splitn(4, ',');
        match (fields.next(), fields.next(), fields.next(), fields.next()) {
            (Some(vendor), Some(model), Some(serial), Some(version)) =>
                Ok(Identity {
                    vendor: vendor.to_owned(),
                    model: model.to_owned(),
                    serial: serial.to_owned(),
                    version: version.to_owned(),
                }),
            _ => Err(Error::NotFound),
        }
    }
}

/// One connected oscilloscope: transport, resolved profile, configuration,
/// and (while a capture is active) the run state.
#[derive(Debug)]
pub struct Device<T: Transport> {
    pub(crate) transport: T,
    pub(crate) profile: &'static Profile,
    pub(crate) identity: Identity,
    pub(crate) config: DeviceConfiguration,
    pub(crate) run: Option<RunState>,
}

/// Format `command`, terminate it, and push it down the transport. A short
/// or timed-out write is fatal.
pub(crate) fn send_command(transport: &mut dyn Transport, command: &Command) -> Result<()> {
    let mut text = command.to_string();
    log::trace!("sending {:?}", text);
    text.push('\n');
    let written = transport.write(text.as_bytes(), WRITE_TIMEOUT)?;
    if written < text.len() {
        log::error!("short write sending {:?}", command);
        return Err(Error::WriteTimeout)
    }
    Ok(())
}

/// Discard whatever unsolicited bytes the instrument has already queued.
pub(crate) fn discard_pending(transport: &mut dyn Transport) -> Result<()> {
    let mut scratch = [0u8; 128];
    while transport.read_nonblocking(&mut scratch)? > 0 {}
    Ok(())
}

impl<T: Transport> Device<T> {
    /// Ask the instrument what it is and resolve its profile. Fails with
    /// `Error::NotFound` unless a supported Tektronix model answers.
    pub fn identify(mut transport: T) -> Result<Device<T>> {
        transport.flush()?;
        transport.drain()?;
        discard_pending(&mut transport)?;

        send_command(&mut transport, &Command::Identify)?;
        let mut assembler = FrameAssembler::new();
        let deadline = Instant::now() + IDENTIFY_TIMEOUT;
        while !assembler.on_readable(&mut transport, Terminator::Newline)? {
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::NotFound)
            }
            transport.poll_readable(deadline - now)?;
        }

        let response = String::from_utf8_lossy(assembler.record()).into_owned();
        let identity = Identity::parse(&response)?;
        if identity.vendor != "TEKTRONIX" {
            return Err(Error::NotFound)
        }
        let profile = Profile::for_model_name(&identity.model).ok_or(Error::NotFound)?;
        log::debug!("found {} (serial {:?}, firmware {:?})",
                    profile.name, identity.serial, identity.version);
        Ok(Device::resolved(transport, profile, identity))
    }

    /// Attach to a transport with a known profile, skipping identification.
    pub fn with_profile(transport: T, profile: &'static Profile) -> Device<T> {
        let identity = Identity {
            vendor: "TEKTRONIX".to_owned(),
            model: profile.name.to_owned(),
            serial: String::new(),
            version: String::new(),
        };
        Device::resolved(transport, profile, identity)
    }

    fn resolved(transport: T, profile: &'static Profile, identity: Identity) -> Device<T> {
        let mut config = DeviceConfiguration {
            channels: [None; MAX_CHANNELS],
            ..Default::default()
        };
        for slot in config.channels[..profile.analog_channels].iter_mut() {
            *slot = Some(ChannelConfiguration::default());
        }
        Device { transport, profile, identity, config, run: None }
    }

    pub fn profile(&self) -> &'static Profile {
        self.profile
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn configuration(&self) -> &DeviceConfiguration {
        &self.config
    }

    pub fn sample_rate(&self) -> u64 {
        self.config.sample_rate
    }

    pub(crate) fn ensure_idle(&self) -> Result<()> {
        if self.run.is_some() {
            return Err(Error::Busy)
        }
        Ok(())
    }

    pub fn set_sample_rate(&mut self, sample_rate: u64) -> Result<()> {
        self.ensure_idle()?;
        if !SAMPLE_RATES.contains(&sample_rate) {
            return Err(Error::Config("sample rate not in the supported set"))
        }
        self.config.sample_rate = sample_rate;
        Ok(())
    }

    pub fn set_limit_samples(&mut self, limit: Option<u64>) -> Result<()> {
        self.ensure_idle()?;
        if let Some(limit) = limit {
            if limit == 0 || limit % SAMPLE_DEPTH as u64 != 0 {
                return Err(Error::Config("sample limit must be a positive multiple \
                                          of the record depth"))
            }
        }
        self.config.limit_samples = limit;
        Ok(())
    }

    pub fn set_limit_millis(&mut self, limit: Option<u64>) -> Result<()> {
        self.ensure_idle()?;
        self.config.limit_millis = limit;
        Ok(())
    }

    /// Enable, reconfigure, or disable (`None`) one analog channel.
    /// Rejected while a run is active; calibration is read-only mid-run.
    pub fn set_channel(&mut self, index: usize, channel: Option<ChannelConfiguration>)
            -> Result<()> {
        self.ensure_idle()?;
        if index >= self.profile.analog_channels {
            return Err(Error::Config("channel index beyond device channel count"))
        }
        self.config.channels[index] = channel;
        Ok(())
    }

    pub fn close(mut self) -> Result<()> {
        self.transport.close()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::params::VoltsPerDiv;
    use crate::transport::mock::MockTransport;

    #[test]
    fn test_identity_parse() {
        let identity = Identity::parse("TEKTRONIX,TDS 220,0,CF:91.1CT FV:v1.16").unwrap();
        assert_eq!(identity.vendor, "TEKTRONIX");
        assert_eq!(identity.model, "TDS 220");
        assert_eq!(identity.serial, "0");
        assert_eq!(identity.version, "CF:91.1CT FV:v1.16");
    }

    #[test]
    fn test_identity_parse_too_few_fields() {
        assert!(matches!(Identity::parse("TEKTRONIX,TDS 220,0"), Err(Error::NotFound)));
    }

    #[test]
    fn test_profile_lookup() {
        let profile = Profile::for_model_name("TDS 224").unwrap();
        assert_eq!(profile.model, Model::Tds224);
        assert_eq!(profile.analog_channels, 4);
        assert!(Profile::for_model_name("TDS 9999").is_none());
    }

    #[test]
    fn test_identify_resolves_profile() {
        let mut mock = MockTransport::new();
        mock.push(b"garbage left over from a previous session");
        mock.reply("*IDN?", b"TEKTRONIX,TDS 220,0,CF:91.1CT\r\n");
        let device = Device::identify(mock).unwrap();
        assert_eq!(device.profile().model, Model::Tds220);
        // stale bytes were flushed before *IDN? went out
        assert_eq!(device.transport.sent(), &["*IDN?".to_owned()]);
        // two channels enabled by default, the other slots empty
        assert_eq!(device.configuration().channels.iter().filter(|c| c.is_some()).count(), 2);
    }

    #[test]
    fn test_identify_rejects_foreign_vendor() {
        let mut mock = MockTransport::new();
        mock.reply("*IDN?", b"RIGOL TECHNOLOGIES,DS1054Z,0,00.04\n");
        assert!(matches!(Device::identify(mock), Err(Error::NotFound)));
    }

    #[test]
    fn test_identify_rejects_unknown_model() {
        let mut mock = MockTransport::new();
        mock.reply("*IDN?", b"TEKTRONIX,TDS 9999,0,CF:91.1CT\n");
        assert!(matches!(Device::identify(mock), Err(Error::NotFound)));
    }

    #[test]
    fn test_set_sample_rate_validation() {
        let mock = MockTransport::new();
        let mut device = Device::with_profile(mock, Profile::for_model_name("TDS 220").unwrap());
        device.set_sample_rate(1_000_000).unwrap();
        assert_eq!(device.sample_rate(), 1_000_000);
        assert!(matches!(device.set_sample_rate(42), Err(Error::Config(_))));
        assert_eq!(device.sample_rate(), 1_000_000);
    }

    #[test]
    fn test_set_channel_bounds() {
        let mock = MockTransport::new();
        let mut device = Device::with_profile(mock, Profile::for_model_name("TDS 220").unwrap());
        let config = ChannelConfiguration { volts_per_div: VoltsPerDiv::new(1, 2) };
        device.set_channel(1, Some(config)).unwrap();
        assert!(matches!(device.set_channel(2, Some(config)), Err(Error::Config(_))));
    }

    #[test]
    fn test_set_limit_samples_validation() {
        let mock = MockTransport::new();
        let mut device = Device::with_profile(mock, Profile::for_model_name("TDS 220").unwrap());
        device.set_limit_samples(Some(2500)).unwrap();
        device.set_limit_samples(None).unwrap();
        assert!(matches!(device.set_limit_samples(Some(100)), Err(Error::Config(_))));
    }
}
