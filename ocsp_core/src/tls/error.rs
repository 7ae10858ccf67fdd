use crate::config::ConfigError;
use crate::ocsp::transport::TransportError;
use crate::ocsp::worker::WorkerError;
use snafu::{Location, Snafu};
use std::path::PathBuf;

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum TlsError {
    #[snafu(display("Failed to build HTTP client"))]
    ClientBuild {
        source: reqwest::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Failed to initialize OCSP transport"))]
    OcspTransport {
        source: TransportError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Failed to start OCSP worker"))]
    OcspWorker {
        source: WorkerError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Failed to build WebPki verifier"))]
    VerifierBuild {
        source: rustls::client::VerifierBuilderError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Failed to read PEM file {}", path.display()))]
    PemRead {
        path: PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Failed to parse PEM root certificates"))]
    PemParse {
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Failed to add certificate to root store"))]
    RootStoreAdd {
        source: rustls::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Invalid TLS configuration"))]
    Config {
        source: ConfigError,
        #[snafu(implicit)]
        location: Location,
    },
}
