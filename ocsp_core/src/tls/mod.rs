pub mod client;
pub mod config;
pub mod error;
pub mod ocsp_verifier;

pub use client::create_tls_client_with_config;
pub use config::TlsConfig;
pub use error::TlsError;
pub use ocsp_verifier::OcspServerCertVerifier;
