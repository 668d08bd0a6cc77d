mod transport;
mod config;
mod params;
mod command;
mod frame;
mod curve;
mod device;
mod acquire;

#[derive(Debug)]
pub enum Error {
    NotFound,
    Io(std::io::Error),
    WriteTimeout,
    FrameOverflow,
    Config(&'static str),
    Busy,
    Other(Box<dyn std::error::Error + Sync + Send + 'static>),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::NotFound =>
                write!(f, "no supported oscilloscope found"),
            Self::Io(io_error) =>
                write!(f, "transport I/O error: {}", io_error),
            Self::WriteTimeout =>
                write!(f, "timed out writing command; transport is wedged"),
            Self::FrameOverflow =>
                write!(f, "receive buffer overflowed before a record terminator"),
            Self::Config(reason) =>
                write!(f, "configuration rejected: {}", reason),
            Self::Busy =>
                write!(f, "acquisition run in progress"),
            Self::Other(error) =>
                write!(f, "{}", error),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            &Self::Io(ref io_error) => Some(io_error),
            _ => None
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::Io(error)
    }
}

pub type Result<T> =
    core::result::Result<T, Error>;

pub use transport::{Transport, Readiness};
pub use transport::mock::MockTransport;
#[cfg(feature = "serial")]
pub use transport::serial::{SerialTransport, DEFAULT_BAUD_RATE};

pub use config::{
    SAMPLE_DEPTH,
    DIVS_PER_SCREEN,
    MAX_CHANNELS,
    SAMPLE_RATES,
    DEFAULT_SAMPLE_RATE,
    timebase_for_samplerate,
    ChannelConfiguration,
    DeviceConfiguration,
};

pub use params::{
    VoltsPerDiv,
    Quantity,
    Unit,
    QuantityFlags,
    ChannelParameters,
};

pub use command::Command;

pub use frame::{
    RECEIVE_CAPACITY,
    Terminator,
    FrameAssembler,
};

pub use curve::decode_curve;

pub use device::{
    Model,
    AuxChannel,
    Profile,
    PROFILES,
    Identity,
    Device,
};

pub use acquire::{
    Phase,
    RunStatus,
    ChannelMetadata,
    Consumer,
};
