use crate::ocsp::codec::{DerOcspCodec, OcspCodec, RequestOptions};
use crate::ocsp::config::OcspConfig;
use crate::ocsp::context::VerifyContext;
use crate::ocsp::error::VerificationError;
use crate::ocsp::responder::ResponderQuerier;
use crate::ocsp::staple::parse_staple;
use crate::ocsp::target::resolve_target;
use crate::ocsp::transport::{OcspTransport, ReqwestTransport, TransportError};
use crate::ocsp::validation::verify_response;
use std::sync::Arc;

pub type DefaultOcspVerifier = OcspVerifier<DerOcspCodec, ReqwestTransport>;

/// Decides whether a TLS connection may proceed given the server's revocation status.
///
/// A stapled response is preferred; otherwise the responders named in the server certificate
/// are asked. When neither source gives a conclusive answer the connection is allowed.
#[derive(Debug)]
pub struct OcspVerifier<C, T> {
    codec: Arc<C>,
    querier: ResponderQuerier<C, T>,
}

impl DefaultOcspVerifier {
    pub fn from_config(config: &OcspConfig) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::new(config)?;
        Ok(Self::new(Arc::new(DerOcspCodec), Arc::new(transport), config))
    }
}

impl<C: OcspCodec, T: OcspTransport> OcspVerifier<C, T> {
    pub fn new(codec: Arc<C>, transport: Arc<T>, config: &OcspConfig) -> Self {
        let querier = ResponderQuerier::new(
            Arc::clone(&codec),
            transport,
            config.request_timeout,
            RequestOptions { hash: config.hash },
        );
        Self { codec, querier }
    }

    /// `chains` are the verified chains from the handshake, leaf first; only the first is
    /// used. An empty `staple` means the server stapled nothing.
    pub async fn verify(
        &self,
        ctx: &VerifyContext,
        chains: &[Vec<Vec<u8>>],
        staple: &[u8],
    ) -> Result<(), VerificationError> {
        let target = resolve_target(chains)?;

        let response = match parse_staple(self.codec.as_ref(), &target, staple)? {
            Some(response) => Some(response),
            None => self.querier.query(ctx, &target).await?,
        };

        let Some(response) = response else {
            tracing::info!(
                target: "ocsp_core::ocsp",
                responders = target.responder_urls.len(),
                "No conclusive OCSP response, allowing connection"
            );
            return Ok(());
        };

        verify_response(&target, &response)?;
        tracing::debug!(target: "ocsp_core::ocsp", "OCSP verification succeeded");
        Ok(())
    }
}
