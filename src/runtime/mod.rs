mod paths;
mod ports;
mod telemetry;

pub use paths::{ConfigSource, config_source};
pub use ports::{build_ports, redacted};
pub use telemetry::{env_flag, init_tracing};
