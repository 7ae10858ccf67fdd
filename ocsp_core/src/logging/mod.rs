use std::path::PathBuf;

pub use crate::logging::error::LogError;
use crate::logging::opentelemetry::{init_meter_provider, init_tracer};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing::level_filters::LevelFilter;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::Registry;
use tracing_subscriber::layer::SubscriberExt;

mod error;
mod opentelemetry;

pub const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:8318";

pub struct LoggingConfig {
    pub log_file: Option<PathBuf>,
    pub stderr: bool,
    /// Level for the stderr layer.
    pub stderr_level: LevelFilter,
    /// `EnvFilter` directives applied to every layer, e.g. `ocsp_core::ocsp=debug`.
    pub filter: Option<String>,
    pub opentelemetry: bool,
    pub otlp_endpoint: String,
}

impl LoggingConfig {
    pub fn new(log_file: Option<PathBuf>, stderr: bool, opentelemetry: bool) -> Self {
        Self {
            log_file,
            stderr,
            stderr_level: LevelFilter::DEBUG,
            filter: None,
            opentelemetry,
            otlp_endpoint: DEFAULT_OTLP_ENDPOINT.to_string(),
        }
    }
}

/// Keeps exporters alive; call [`LoggingHandle::shutdown`] to flush them before exit.
#[derive(Default)]
pub struct LoggingHandle {
    tracer_provider: Option<SdkTracerProvider>,
    meter_provider: Option<SdkMeterProvider>,
}

impl LoggingHandle {
    pub fn shutdown(self) -> Result<(), LogError> {
        if let Some(provider) = self.tracer_provider {
            provider
                .shutdown()
                .map_err(|e| LogError::InitError(e.to_string()))?;
        }
        if let Some(provider) = self.meter_provider {
            provider
                .shutdown()
                .map_err(|e| LogError::InitError(e.to_string()))?;
        }
        Ok(())
    }
}

fn build_filter(directives: Option<&str>) -> Result<EnvFilter, LogError> {
    match directives {
        Some(d) => EnvFilter::try_new(d).map_err(|e| LogError::InvalidFilter(e.to_string())),
        None => Ok(EnvFilter::new("info")),
    }
}

pub fn init(config: LoggingConfig) -> Result<LoggingHandle, LogError> {
    let filter = build_filter(config.filter.as_deref())?;
    let mut handle = LoggingHandle::default();

    let file_layer = if let Some(log_file) = config.log_file {
        let log_file =
            std::fs::File::create(log_file).map_err(|e| LogError::InitError(e.to_string()))?;
        Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(log_file),
        )
    } else {
        None
    };

    let opentelemetry_layer = if config.opentelemetry {
        let (tracer_provider, tracer) = init_tracer(&config.otlp_endpoint)?;
        handle.tracer_provider = Some(tracer_provider);
        handle.meter_provider = Some(init_meter_provider(&config.otlp_endpoint)?);
        Some(OpenTelemetryLayer::new(tracer))
    } else {
        None
    };

    let stderr_layer = if config.stderr {
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(config.stderr_level),
        )
    } else {
        None
    };

    let subscriber = Registry::default()
        .with(filter)
        .with(file_layer)
        .with(opentelemetry_layer)
        .with(stderr_layer);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| LogError::InitError(e.to_string()))?;
    Ok(handle)
}
