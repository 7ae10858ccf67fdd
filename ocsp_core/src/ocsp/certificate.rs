use crate::ocsp::codec;
use snafu::{Location, ResultExt, Snafu};
use x509_parser::extensions::{GeneralName, ParsedExtension};
use x509_parser::prelude::*;

/// TLS Feature extension (RFC 7633); a `status_request` entry is what "Must-Staple" means.
pub const MUST_STAPLE_OID: &str = "1.3.6.1.5.5.7.1.24";
const ACCESS_METHOD_OCSP_OID: &str = "1.3.6.1.5.5.7.48.1";

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum CertificateError {
    #[snafu(display("Failed to parse certificate"))]
    CertificateParse {
        source: x509_parser::nom::Err<x509_parser::error::X509Error>,
        #[snafu(implicit)]
        location: Location,
    },
}

fn parse(cert_der: &[u8]) -> Result<X509Certificate<'_>, CertificateError> {
    let (_, cert) = X509Certificate::from_der(cert_der).context(CertificateParseSnafu)?;
    Ok(cert)
}

pub fn has_must_staple(cert_der: &[u8]) -> Result<bool, CertificateError> {
    let cert = parse(cert_der)?;
    Ok(cert
        .extensions()
        .iter()
        .any(|ext| ext.oid.to_id_string() == MUST_STAPLE_OID))
}

/// OCSP access locations from the Authority Information Access extension, in certificate order.
pub fn extract_ocsp_responder_urls(cert_der: &[u8]) -> Result<Vec<String>, CertificateError> {
    let cert = parse(cert_der)?;
    let mut urls = Vec::new();
    for ext in cert.extensions() {
        if let ParsedExtension::AuthorityInfoAccess(aia) = ext.parsed_extension() {
            for desc in &aia.accessdescs {
                if desc.access_method.to_id_string() != ACCESS_METHOD_OCSP_OID {
                    continue;
                }
                if let GeneralName::URI(uri) = &desc.access_location {
                    urls.push(uri.to_string());
                }
            }
        }
    }
    Ok(urls)
}

/// True when `candidate_der` is named as the issuer of `cert_der` and its key signed it.
pub fn is_issued_by(cert_der: &[u8], candidate_der: &[u8]) -> Result<bool, CertificateError> {
    let cert = parse(cert_der)?;
    let candidate = parse(candidate_der)?;
    if cert.issuer().as_raw() != candidate.subject().as_raw() {
        return Ok(false);
    }
    let (tbs, signature) = signed_parts(cert_der)?;
    Ok(codec::verify_signed_by(candidate_der, &tbs, &signature).is_ok())
}

/// True when the certificate carries the id-kp-OCSPSigning extended key usage.
pub fn is_ocsp_signer(cert_der: &[u8]) -> Result<bool, CertificateError> {
    let cert = parse(cert_der)?;
    Ok(cert.extensions().iter().any(|ext| {
        matches!(ext.parsed_extension(), ParsedExtension::ExtendedKeyUsage(eku) if eku.ocsp_signing)
    }))
}

/// Raw TBS bytes and signature of a certificate, for checking it against an issuer key.
pub(crate) fn signed_parts(cert_der: &[u8]) -> Result<(Vec<u8>, Vec<u8>), CertificateError> {
    let cert = parse(cert_der)?;
    let tbs: &[u8] = cert.tbs_certificate.as_ref();
    Ok((tbs.to_vec(), cert.signature_value.data.to_vec()))
}
