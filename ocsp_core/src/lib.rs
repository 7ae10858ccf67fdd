extern crate tracing;
extern crate tracing_subscriber;

pub mod config;
pub mod logging;
pub mod ocsp;
pub mod tls;
