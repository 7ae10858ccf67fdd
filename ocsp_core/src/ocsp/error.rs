use crate::ocsp::certificate::CertificateError;
use crate::ocsp::codec::CodecError;
use crate::ocsp::context::ContextEnd;
use chrono::{DateTime, Utc};
use snafu::{Location, Snafu};

/// The single error type a verification returns. A caller that receives it must refuse
/// the connection.
#[derive(Snafu, Debug)]
#[snafu(visibility(pub), display("OCSP verification failed: {source}"))]
pub struct VerificationError {
    source: VerificationFailure,
}

impl VerificationError {
    pub fn failure(&self) -> &VerificationFailure {
        &self.source
    }
}

impl From<VerificationFailure> for VerificationError {
    fn from(source: VerificationFailure) -> Self {
        Self { source }
    }
}

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum VerificationFailure {
    #[snafu(display("invalid certificate chain: {source}"))]
    Config { source: ChainError },
    #[snafu(display("stapled response rejected: {source}"))]
    Staple { source: StapleError },
    #[snafu(display("responder query aborted: {source}"))]
    NetworkFatal { source: NetworkError },
    #[snafu(display("response rejected: {source}"))]
    ResponseInvalid { source: ResponseError },
}

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum ChainError {
    #[snafu(display("no verified certificate chains reported after TLS handshake"))]
    NoVerifiedChains {
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("verified chain contained no certificates"))]
    EmptyChain {
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("verified chain did not contain the issuer of the server certificate"))]
    IssuerNotFound {
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("failed to inspect certificate: {source}"))]
    Certificate {
        source: CertificateError,
        #[snafu(implicit)]
        location: Location,
    },
}

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum StapleError {
    #[snafu(display(
        "server provided a certificate with the Must-Staple extension but did not provide a stapled OCSP response"
    ))]
    MissingStaple {
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("error parsing stapled response: {source}"))]
    InvalidStaple {
        source: CodecError,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("failed to inspect server certificate: {source}"))]
    ServerCertificate {
        source: CertificateError,
        #[snafu(implicit)]
        location: Location,
    },
}

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum NetworkError {
    #[snafu(display("request to {url} ended: {reason}"))]
    CallerContextEnded {
        url: String,
        reason: ContextEnd,
        #[snafu(implicit)]
        location: Location,
    },
}

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum ResponseError {
    #[snafu(display("reported thisUpdate time {this_update} is after current time {now}"))]
    NotYetValid {
        this_update: DateTime<Utc>,
        now: DateTime<Utc>,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("reported nextUpdate time {next_update} is before current time {now}"))]
    Stale {
        next_update: DateTime<Utc>,
        now: DateTime<Utc>,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("certificate is revoked"))]
    Revoked {
        revoked_at: Option<DateTime<Utc>>,
        #[snafu(implicit)]
        location: Location,
    },
}

impl From<ChainError> for VerificationError {
    fn from(source: ChainError) -> Self {
        VerificationFailure::Config { source }.into()
    }
}

impl From<StapleError> for VerificationError {
    fn from(source: StapleError) -> Self {
        VerificationFailure::Staple { source }.into()
    }
}

impl From<NetworkError> for VerificationError {
    fn from(source: NetworkError) -> Self {
        VerificationFailure::NetworkFatal { source }.into()
    }
}

impl From<ResponseError> for VerificationError {
    fn from(source: ResponseError) -> Self {
        VerificationFailure::ResponseInvalid { source }.into()
    }
}
