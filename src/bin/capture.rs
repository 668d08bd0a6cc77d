use std::time::Duration;

use tekscope::{ChannelMetadata, Consumer, Device, SerialTransport};

const IDLE_TIMEOUT: Duration = Duration::from_secs(10);

struct PrintConsumer;

impl Consumer for PrintConsumer {
    fn run_started(&mut self) {
        println!("acquisition started");
    }

    fn emit(&mut self, metadata: &ChannelMetadata, samples: &[f32]) {
        let min = samples.iter().cloned().fold(f32::INFINITY, f32::min);
        let max = samples.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        println!("{}: {} samples ({:?}), {:+.4}..{:+.4} {:?}",
                 metadata.name, samples.len(), metadata.quantity, min, max, metadata.unit);
    }

    fn run_ended(&mut self) {
        println!("acquisition ended");
    }
}

fn main() -> tekscope::Result<()> {
    env_logger::init();
    let path = std::env::args().nth(1)
        .unwrap_or_else(|| "/dev/ttyUSB0".to_owned());
    let rate = std::env::args().nth(2)
        .and_then(|arg| arg.parse::<u64>().ok());

    let transport = SerialTransport::open(&path, tekscope::DEFAULT_BAUD_RATE)?;
    let mut device = Device::identify(transport)?;
    let identity = device.identity();
    println!("found {} (serial {}, firmware {})",
             device.profile().name, identity.serial, identity.version);

    if let Some(rate) = rate {
        device.set_sample_rate(rate)?;
    }
    println!("sampling at {} Sa/s", device.sample_rate());

    device.run_to_completion(&mut PrintConsumer, IDLE_TIMEOUT)
}
