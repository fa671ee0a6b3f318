use crate::device::Device;
use crate::telemetry::{HistoryLog, StateStore, Telemetry};

/// Everything a scenario acts on: the device and the telemetry it reports
pub struct Bench {
    device: Device,
    telemetry: Telemetry,
    verbose: bool,
}

impl Bench {
    /// Wire `device` telemetry frames carrying `opcode` into a fresh state store
    pub fn new(mut device: Device, opcode: u16) -> Self {
        let telemetry = Telemetry::new();
        device.subscribe(telemetry.ingestor(opcode).into_callback());
        Self {
            device,
            telemetry,
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn device(&mut self) -> &mut Device {
        &mut self.device
    }

    pub fn telemetry(&mut self) -> &mut Telemetry {
        &mut self.telemetry
    }

    /// Latest firmware state, with all received telemetry applied
    pub fn store(&mut self) -> &StateStore {
        self.telemetry.store()
    }

    pub fn history(&mut self) -> &HistoryLog {
        self.telemetry.history()
    }

    /// Forget all observed state before the next scenario
    pub fn clear_state(&mut self) {
        self.telemetry.clear();
    }
}
