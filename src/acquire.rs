//! The acquisition run: command sequencing, per-channel curve downloads,
//! and sample delivery.
//!
//! A run is a state machine advanced by a single event entry point. The
//! surrounding event loop owns scheduling; the engine never blocks waiting
//! for bytes, and resumes exactly where the previous readiness notification
//! left it.

use std::io;
use std::time::{Duration, Instant};

use crate::{Error, Result};
use crate::command::Command;
use crate::config::{DeviceConfiguration, SAMPLE_DEPTH, MAX_CHANNELS};
use crate::curve::decode_curve;
use crate::device::{discard_pending, send_command, Device, Profile};
use crate::frame::{FrameAssembler, Terminator};
use crate::params::{ChannelParameters, Quantity, QuantityFlags, Unit};
use crate::transport::{Readiness, Transport};

const CHANNEL_NAMES: [&str; MAX_CHANNELS] = ["CH1", "CH2", "CH3", "CH4"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Configuring,
    AwaitSelectAck,
    Collecting,
    Decoding,
    Advancing,
    Done,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Done,
}

/// What an emitted sample batch was measured as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMetadata {
    pub name: &'static str,
    pub quantity: Quantity,
    pub unit: Unit,
    pub flags: QuantityFlags,
    pub digits: i32,
    pub encoding_digits: i32,
}

/// Receives the calibrated sample stream and the run lifecycle notices.
/// `run_ended` is always delivered, even when the run aborts.
pub trait Consumer {
    fn run_started(&mut self);
    fn emit(&mut self, metadata: &ChannelMetadata, samples: &[f32]);
    fn run_ended(&mut self);
}

#[derive(Debug)]
struct RunChannel {
    /// 1-based front-panel number; `None` for a derived channel.
    number: Option<u8>,
    name: &'static str,
    selector: &'static str,
    params: ChannelParameters,
}

impl RunChannel {
    fn metadata(&self) -> ChannelMetadata {
        ChannelMetadata {
            name: self.name,
            quantity: self.params.quantity,
            unit: self.params.unit,
            flags: self.params.flags,
            digits: self.params.digits - self.params.exponent,
            encoding_digits: self.params.encoding_digits - self.params.exponent,
        }
    }
}

/// Everything owned by one acquisition run. Created by `start_run`,
/// destroyed when the run ends or aborts; the receive buffer inside is
/// never shared.
#[derive(Debug)]
pub(crate) struct RunState {
    phase: Phase,
    channels: Vec<RunChannel>,
    current: usize,
    assembler: FrameAssembler,
    delivered: u64,
    limit_samples: Option<u64>,
    deadline: Option<Instant>,
    terminator: Terminator,
    honest_count: bool,
}

fn resolve_channels(profile: &Profile, config: &DeviceConfiguration) -> Vec<RunChannel> {
    let mut channels = Vec::with_capacity(profile.channel_count());
    for (index, slot) in config.channels[..profile.analog_channels].iter().enumerate() {
        if let Some(channel_config) = slot {
            channels.push(RunChannel {
                number: Some(index as u8 + 1),
                name: CHANNEL_NAMES[index],
                selector: CHANNEL_NAMES[index],
                params: ChannelParameters {
                    volts_per_div: channel_config.volts_per_div,
                    ..Default::default()
                },
            });
        }
    }
    if let Some(aux) = profile.aux {
        channels.push(RunChannel {
            number: None,
            name: aux.name,
            selector: aux.selector,
            params: ChannelParameters {
                quantity: aux.quantity,
                unit: aux.unit,
                ..Default::default()
            },
        });
    }
    channels
}

/// Send one command, first waiting for the instrument to finish chewing on
/// the previous one. Pipelining faster than that loses commands.
fn gated_send(transport: &mut dyn Transport, command: &Command) -> Result<()> {
    transport.operation_complete()?;
    send_command(transport, command)
}

/// Issue the channel-select + curve-request pair for the run's current
/// channel and settle into `Collecting`.
fn request_curve(transport: &mut dyn Transport, run: &mut RunState) -> Result<()> {
    run.phase = Phase::AwaitSelectAck;
    run.assembler.clear();
    let channel = &run.channels[run.current];
    log::debug!("requesting curve for {}", channel.name);
    gated_send(transport, &Command::DataSource { source: channel.selector })?;
    gated_send(transport, &Command::QueryCurve)?;
    run.phase = Phase::Collecting;
    Ok(())
}

fn configure_and_arm(transport: &mut dyn Transport, timebase: f64, run: &mut RunState)
        -> Result<()> {
    // instruments may have unsolicited bytes queued from a previous
    // session; none of them may frame into this run
    transport.flush()?;
    transport.drain()?;
    discard_pending(transport)?;

    for channel in run.channels.iter() {
        if let Some(number) = channel.number {
            gated_send(transport, &Command::ResetPosition { channel: number })?;
            gated_send(transport, &Command::VerticalScale {
                channel: number,
                volts_per_div: channel.params.volts_per_div,
            })?;
            gated_send(transport, &Command::SelectOn { channel: number })?;
        }
    }
    gated_send(transport, &Command::HorizontalScale { seconds_per_div: timebase })?;
    gated_send(transport, &Command::StopAfterSequence)?;

    gated_send(transport, &Command::AcquireRun)?;
    request_curve(transport, run)
}

/// Discard bytes still in flight so a stale partial record cannot bleed
/// into a subsequent run. Best-effort: the transport may already be dead.
fn quiesce(transport: &mut dyn Transport) {
    let _ = transport.flush();
    let _ = transport.drain();
    let _ = discard_pending(transport);
}

enum Outcome {
    Pending,
    Finished,
    Failed(Error),
}

impl<T: Transport> Device<T> {
    pub fn run_phase(&self) -> Phase {
        self.run.as_ref().map_or(Phase::Idle, |run| run.phase)
    }

    /// Begin an acquisition run: validate the configuration, program the
    /// instrument, and request the first enabled channel's curve. After a
    /// successful return the caller feeds transport readiness into
    /// `on_transport_event` until it reports `RunStatus::Done`.
    pub fn start_run<C: Consumer>(&mut self, consumer: &mut C) -> Result<()> {
        self.ensure_idle()?;
        self.config.validate(self.profile)?;

        consumer.run_started();
        let mut run = RunState {
            phase: Phase::Configuring,
            channels: resolve_channels(self.profile, &self.config),
            current: 0,
            assembler: FrameAssembler::new(),
            delivered: 0,
            limit_samples: self.config.limit_samples,
            deadline: self.config.limit_millis
                .map(|millis| Instant::now() + Duration::from_millis(millis)),
            terminator: self.profile.curve_terminator,
            honest_count: self.profile.honest_sample_count,
        };
        match configure_and_arm(&mut self.transport, self.config.timebase(), &mut run) {
            Ok(()) => {
                self.run = Some(run);
                Ok(())
            }
            Err(error) => {
                log::error!("run aborted during configuration: {}", error);
                quiesce(&mut self.transport);
                consumer.run_ended();
                Err(error)
            }
        }
    }

    /// The event entry point. Call whenever the transport signals
    /// readiness (or an error); with no run active this is a no-op.
    pub fn on_transport_event<C: Consumer>(&mut self, revents: Readiness, consumer: &mut C)
            -> Result<RunStatus> {
        let Some(run) = self.run.as_mut() else {
            return Ok(RunStatus::Done)
        };

        let outcome = if revents.contains(Readiness::ERROR) {
            Outcome::Failed(Error::Io(io::Error::new(io::ErrorKind::BrokenPipe,
                                                     "transport signaled an error")))
        } else if run.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            log::debug!("time limit reached");
            Outcome::Finished
        } else if !revents.contains(Readiness::READABLE) {
            Outcome::Pending
        } else {
            match run.assembler.on_readable(&mut self.transport, run.terminator) {
                Err(error) => Outcome::Failed(error),
                Ok(false) => Outcome::Pending,
                Ok(true) => {
                    run.phase = Phase::Decoding;
                    let channel = &run.channels[run.current];
                    let samples = decode_curve(run.assembler.record(), SAMPLE_DEPTH,
                                               channel.params.scale_factor());
                    log::debug!("received {} samples for {}", samples.len(), channel.name);
                    consumer.emit(&channel.metadata(), &samples);
                    run.delivered += if run.honest_count {
                        samples.len() as u64
                    } else {
                        SAMPLE_DEPTH as u64
                    };

                    let limit_reached = run.limit_samples
                        .is_some_and(|limit| run.delivered >= limit);
                    if limit_reached || run.current + 1 == run.channels.len() {
                        Outcome::Finished
                    } else {
                        run.phase = Phase::Advancing;
                        run.current += 1;
                        match request_curve(&mut self.transport, run) {
                            Ok(()) => Outcome::Pending,
                            Err(error) => Outcome::Failed(error),
                        }
                    }
                }
            }
        };

        match outcome {
            Outcome::Pending => Ok(RunStatus::Running),
            Outcome::Finished => {
                if let Some(run) = self.run.as_mut() {
                    run.phase = Phase::Done;
                    log::debug!("run complete, {} samples delivered", run.delivered);
                }
                quiesce(&mut self.transport);
                consumer.run_ended();
                self.run = None;
                Ok(RunStatus::Done)
            }
            Outcome::Failed(error) => {
                if let Some(run) = self.run.as_mut() {
                    run.phase = Phase::Aborted;
                }
                log::error!("run aborted: {}", error);
                quiesce(&mut self.transport);
                consumer.run_ended();
                self.run = None;
                Err(error)
            }
        }
    }

    /// External stop request. Halts the instrument, drains bytes in
    /// flight, and delivers `run_ended`; with no run active this is a
    /// no-op.
    pub fn stop_run<C: Consumer>(&mut self, consumer: &mut C) -> Result<()> {
        let Some(run) = self.run.take() else {
            return Ok(())
        };
        log::debug!("run stopped after {} samples", run.delivered);
        let _ = send_command(&mut self.transport, &Command::AcquireStop);
        quiesce(&mut self.transport);
        consumer.run_ended();
        Ok(())
    }

    /// Convenience capture loop for callers without an event loop of their
    /// own: polls transport readiness and drives the run until it ends.
    /// Gives up if the instrument stays silent for `idle_timeout`.
    pub fn run_to_completion<C: Consumer>(&mut self, consumer: &mut C, idle_timeout: Duration)
            -> Result<()> {
        self.start_run(consumer)?;
        let mut last_data = Instant::now();
        loop {
            let readable = match self.transport.poll_readable(Duration::from_millis(10)) {
                Ok(readable) => readable,
                Err(error) => {
                    let _ = self.on_transport_event(Readiness::ERROR, consumer);
                    return Err(error)
                }
            };
            if readable {
                last_data = Instant::now();
            } else if last_data.elapsed() >= idle_timeout {
                self.stop_run(consumer)?;
                return Err(Error::Io(io::Error::new(io::ErrorKind::TimedOut,
                                                    "instrument stopped responding")))
            }
            let revents = if readable { Readiness::READABLE } else { Readiness::empty() };
            if self.on_transport_event(revents, consumer)? == RunStatus::Done {
                return Ok(())
            }
        }
    }
}
