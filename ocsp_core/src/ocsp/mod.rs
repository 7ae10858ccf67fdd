pub mod certificate;
pub mod codec;
pub mod config;
pub mod context;
pub mod error;
pub mod responder;
pub mod staple;
pub mod target;
pub mod transport;
pub mod validation;
pub mod verifier;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use codec::{CertStatus, DerOcspCodec, HashAlgorithm, OcspCodec, OcspResponse};
pub use config::{OcspConfig, RevocationCheckMode};
pub use context::{ContextEnd, VerifyContext};
pub use error::{VerificationError, VerificationFailure};
pub use target::{OcspTarget, resolve_target};
pub use transport::{OcspTransport, ReqwestTransport};
pub use verifier::{DefaultOcspVerifier, OcspVerifier};
pub use worker::OcspWorker;
