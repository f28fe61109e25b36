pub mod debounce;
pub mod gpio;
pub mod monitor;

pub use gpio::GpioInputs;
pub use monitor::{InputMonitor, MonitorSettings, monitor_inputs};
