use crate::ocsp::certificate;
use crate::ocsp::config::{OcspConfig, RevocationCheckMode};
use crate::ocsp::verifier::DefaultOcspVerifier;
use crate::ocsp::worker::OcspWorker;
use crate::tls::error::{OcspTransportSnafu, OcspWorkerSnafu, TlsError, VerifierBuildSnafu};
use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use snafu::ResultExt;
use std::sync::Arc;

/// Path validation by webpki, followed by an OCSP revocation check of the presented chain.
///
/// Servers usually leave the root out of the chain they present. When a leaf or its last
/// intermediate was issued by one of `anchors`, that anchor is appended before the OCSP
/// check so the responder's CertID and signature are computed against the real issuer.
#[derive(Debug)]
pub struct OcspServerCertVerifier {
    webpki_verifier: Arc<WebPkiServerVerifier>,
    worker: OcspWorker,
    check_mode: RevocationCheckMode,
    anchors: Vec<CertificateDer<'static>>,
}

impl OcspServerCertVerifier {
    pub fn new_with_root_store(
        ocsp_config: &OcspConfig,
        root_store: rustls::RootCertStore,
        anchors: Vec<CertificateDer<'static>>,
    ) -> Result<Self, TlsError> {
        let webpki_verifier = WebPkiServerVerifier::builder_with_provider(
            Arc::new(root_store),
            Arc::new(rustls::crypto::aws_lc_rs::default_provider()),
        )
        .build()
        .context(VerifierBuildSnafu)?;
        let verifier = DefaultOcspVerifier::from_config(ocsp_config).context(OcspTransportSnafu)?;
        let worker = OcspWorker::spawn(Arc::new(verifier), ocsp_config.verification_timeout)
            .context(OcspWorkerSnafu)?;
        Ok(Self::with_worker(
            webpki_verifier,
            worker,
            ocsp_config.check_mode,
            anchors,
        ))
    }

    pub fn with_worker(
        webpki_verifier: Arc<WebPkiServerVerifier>,
        worker: OcspWorker,
        check_mode: RevocationCheckMode,
        anchors: Vec<CertificateDer<'static>>,
    ) -> Self {
        Self {
            webpki_verifier,
            worker,
            check_mode,
            anchors,
        }
    }

    /// The anchor that issued `last`, unless `last` is self-issued.
    fn issuing_anchor(&self, last: &[u8]) -> Option<&CertificateDer<'static>> {
        if certificate::is_issued_by(last, last).unwrap_or(false) {
            return None;
        }
        self.anchors
            .iter()
            .find(|anchor| certificate::is_issued_by(last, anchor.as_ref()).unwrap_or(false))
    }
}

impl ServerCertVerifier for OcspServerCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        self.webpki_verifier.verify_server_cert(
            end_entity,
            intermediates,
            server_name,
            ocsp_response,
            now,
        )?;
        if self.check_mode == RevocationCheckMode::Disabled {
            return Ok(ServerCertVerified::assertion());
        }

        let mut chain = Vec::with_capacity(2 + intermediates.len());
        chain.push(end_entity.as_ref().to_vec());
        for i in intermediates {
            chain.push(i.as_ref().to_vec());
        }
        if let Some(anchor) = self.issuing_anchor(chain[chain.len() - 1].as_slice()) {
            chain.push(anchor.as_ref().to_vec());
        }
        match self.worker.verify(vec![chain], ocsp_response.to_vec()) {
            Ok(()) => Ok(ServerCertVerified::assertion()),
            Err(e) => match self.check_mode {
                RevocationCheckMode::Enabled => {
                    tracing::warn!(target: "ocsp_core::tls", server = ?server_name, "Rejecting server certificate: {e}");
                    Err(rustls::Error::General(e.to_string()))
                }
                RevocationCheckMode::Advisory | RevocationCheckMode::Disabled => {
                    tracing::warn!(target: "ocsp_core::tls", server = ?server_name, "OCSP check failed in advisory mode: {e}");
                    Ok(ServerCertVerified::assertion())
                }
            },
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.webpki_verifier
            .verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.webpki_verifier
            .verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.webpki_verifier.supported_verify_schemes()
    }
}
