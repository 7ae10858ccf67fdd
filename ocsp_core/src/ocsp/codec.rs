//! OCSP request encoding and response decoding (RFC 6960).
//!
//! The verification pipeline only needs three facts out of a response: the certificate status,
//! `thisUpdate` and `nextUpdate`. [`OcspCodec`] is the seam; [`DerOcspCodec`] is the production
//! implementation and performs the protocol-level checks needed before a response can be
//! trusted for a given (subject, issuer) pair.

use chrono::{DateTime, Utc};
use const_oid::ObjectIdentifier;
use const_oid::db::rfc6960::ID_PKIX_OCSP_BASIC;
use der::asn1::OctetString;
use der::{Any, Decode, Encode, Tag};
use rustls::pki_types::CertificateDer;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use snafu::{Location, OptionExt, ResultExt, Snafu};
use spki::AlgorithmIdentifierOwned;
use x509_cert::Certificate;
use x509_ocsp::{
    BasicOcspResponse, CertId, OcspGeneralizedTime, OcspRequest, OcspResponseStatus, Request,
    SingleResponse, TbsRequest, Version,
};

use crate::ocsp::certificate;

const ID_SHA1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.14.3.2.26");
const ID_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1");

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum CodecError {
    #[snafu(display("Malformed OCSP response"))]
    Malformed {
        source: der::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Failed to decode certificate for OCSP"))]
    CertificateDecode {
        source: der::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Failed to encode OCSP request"))]
    Encoding {
        source: der::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("OCSP responder returned error status {status}"))]
    ResponderStatus {
        status: String,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("OCSP response carries no response bytes"))]
    MissingResponseBytes {
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Unsupported OCSP response type {oid}"))]
    UnsupportedResponseType {
        oid: String,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("OCSP response does not cover the certificate"))]
    NotCovered {
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("OCSP response signature is invalid: {message}"))]
    Signature {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("OCSP response time is out of range"))]
    InvalidTime {
        #[snafu(implicit)]
        location: Location,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    #[default]
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    pub fn oid(self) -> ObjectIdentifier {
        match self {
            HashAlgorithm::Sha1 => ID_SHA1,
            HashAlgorithm::Sha256 => ID_SHA256,
        }
    }

    pub fn from_oid(oid: ObjectIdentifier) -> Option<Self> {
        if oid == ID_SHA1 {
            Some(HashAlgorithm::Sha1)
        } else if oid == ID_SHA256 {
            Some(HashAlgorithm::Sha256)
        } else {
            None
        }
    }

    fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Sha1 => Sha1::digest(data).to_vec(),
            HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RequestOptions {
    pub hash: HashAlgorithm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertStatus {
    Good,
    Revoked,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcspResponse {
    pub status: CertStatus,
    pub this_update: DateTime<Utc>,
    pub next_update: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl OcspResponse {
    /// Good and Revoked settle the question; Unknown does not.
    pub fn is_conclusive(&self) -> bool {
        matches!(self.status, CertStatus::Good | CertStatus::Revoked)
    }
}

pub trait OcspCodec: Send + Sync + 'static {
    fn encode(
        &self,
        subject_der: &[u8],
        issuer_der: &[u8],
        options: &RequestOptions,
    ) -> Result<Vec<u8>, CodecError>;

    /// Decodes `response_der` and binds it to `subject_der` as issued by `issuer_der`.
    fn decode(
        &self,
        response_der: &[u8],
        subject_der: &[u8],
        issuer_der: &[u8],
    ) -> Result<OcspResponse, CodecError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DerOcspCodec;

impl OcspCodec for DerOcspCodec {
    fn encode(
        &self,
        subject_der: &[u8],
        issuer_der: &[u8],
        options: &RequestOptions,
    ) -> Result<Vec<u8>, CodecError> {
        let subject = Certificate::from_der(subject_der).context(CertificateDecodeSnafu)?;
        let issuer = Certificate::from_der(issuer_der).context(CertificateDecodeSnafu)?;
        let (name_hash, key_hash) = issuer_hashes(options.hash, &issuer)?;

        let hash_algorithm = AlgorithmIdentifierOwned {
            oid: options.hash.oid(),
            parameters: Some(Any::new(Tag::Null, Vec::<u8>::new()).context(EncodingSnafu)?),
        };
        let req_cert = CertId {
            hash_algorithm,
            issuer_name_hash: OctetString::new(name_hash).context(EncodingSnafu)?,
            issuer_key_hash: OctetString::new(key_hash).context(EncodingSnafu)?,
            serial_number: subject.tbs_certificate.serial_number.clone(),
        };
        let request = OcspRequest {
            tbs_request: TbsRequest {
                version: Version::V1,
                requestor_name: None,
                request_list: vec![Request {
                    req_cert,
                    single_request_extensions: None,
                }],
                request_extensions: None,
            },
            optional_signature: None,
        };
        request.to_der().context(EncodingSnafu)
    }

    fn decode(
        &self,
        response_der: &[u8],
        subject_der: &[u8],
        issuer_der: &[u8],
    ) -> Result<OcspResponse, CodecError> {
        let response = x509_ocsp::OcspResponse::from_der(response_der).context(MalformedSnafu)?;
        if response.response_status != OcspResponseStatus::Successful {
            return ResponderStatusSnafu {
                status: format!("{:?}", response.response_status),
            }
            .fail();
        }
        let bytes = response
            .response_bytes
            .context(MissingResponseBytesSnafu)?;
        if bytes.response_type != ID_PKIX_OCSP_BASIC {
            return UnsupportedResponseTypeSnafu {
                oid: bytes.response_type.to_string(),
            }
            .fail();
        }
        let basic_der = bytes.response.as_bytes();
        let basic = BasicOcspResponse::from_der(basic_der).context(MalformedSnafu)?;
        let raw = RawBasicResponse::from_der(basic_der).context(MalformedSnafu)?;

        let subject = Certificate::from_der(subject_der).context(CertificateDecodeSnafu)?;
        let issuer = Certificate::from_der(issuer_der).context(CertificateDecodeSnafu)?;

        let signer_der = select_signer(&basic, issuer_der)?;
        let signature = basic.signature.as_bytes().context(SignatureSnafu {
            message: "signature has unused bits",
        })?;
        verify_signed_by(&signer_der, &raw.tbs_response_data, signature)?;

        let serial = subject.tbs_certificate.serial_number.as_bytes();
        let mut single = None;
        for candidate in &basic.tbs_response_data.responses {
            if cert_id_matches(&candidate.cert_id, serial, &issuer)? {
                single = Some(candidate);
                break;
            }
        }
        let single = single.context(NotCoveredSnafu)?;
        convert_single_response(single)
    }
}

fn issuer_hashes(
    hash: HashAlgorithm,
    issuer: &Certificate,
) -> Result<(Vec<u8>, Vec<u8>), CodecError> {
    let subject_name = issuer
        .tbs_certificate
        .subject
        .to_der()
        .context(EncodingSnafu)?;
    let key = issuer
        .tbs_certificate
        .subject_public_key_info
        .subject_public_key
        .raw_bytes();
    Ok((hash.digest(&subject_name), hash.digest(key)))
}

fn cert_id_matches(id: &CertId, serial: &[u8], issuer: &Certificate) -> Result<bool, CodecError> {
    if id.serial_number.as_bytes() != serial {
        return Ok(false);
    }
    let Some(hash) = HashAlgorithm::from_oid(id.hash_algorithm.oid) else {
        return Ok(false);
    };
    let (name_hash, key_hash) = issuer_hashes(hash, issuer)?;
    Ok(id.issuer_name_hash.as_bytes() == name_hash.as_slice()
        && id.issuer_key_hash.as_bytes() == key_hash.as_slice())
}

/// Picks the certificate whose key must have signed the response: the issuer itself, or a
/// delegated responder certificate embedded in the response that the issuer signed.
fn select_signer(basic: &BasicOcspResponse, issuer_der: &[u8]) -> Result<Vec<u8>, CodecError> {
    let Some(responder) = basic.certs.as_ref().and_then(|certs| certs.first()) else {
        return Ok(issuer_der.to_vec());
    };
    let responder_der = responder.to_der().context(EncodingSnafu)?;
    if responder_der == issuer_der {
        return Ok(responder_der);
    }

    let (tbs, signature) =
        certificate::signed_parts(&responder_der).map_err(|e| {
            SignatureSnafu {
                message: e.to_string(),
            }
            .build()
        })?;
    verify_signed_by(issuer_der, &tbs, &signature)?;
    let delegated = certificate::is_ocsp_signer(&responder_der).unwrap_or(false);
    if !delegated {
        return SignatureSnafu {
            message: "responder certificate lacks the OCSP signing usage",
        }
        .fail();
    }
    Ok(responder_der)
}

/// Checks `signature` over `message` against the public key of `signer_der`.
pub(crate) fn verify_signed_by(
    signer_der: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<(), CodecError> {
    let cert = CertificateDer::from(signer_der);
    let signer = webpki::EndEntityCert::try_from(&cert).map_err(|e| {
        SignatureSnafu {
            message: format!("unusable signer certificate: {e:?}"),
        }
        .build()
    })?;
    let algorithms = rustls::crypto::aws_lc_rs::default_provider()
        .signature_verification_algorithms
        .all;
    if algorithms
        .iter()
        .any(|alg| signer.verify_signature(*alg, message, signature).is_ok())
    {
        Ok(())
    } else {
        SignatureSnafu {
            message: "no supported algorithm accepted the signature",
        }
        .fail()
    }
}

fn convert_single_response(single: &SingleResponse) -> Result<OcspResponse, CodecError> {
    let (status, revoked_at) = match &single.cert_status {
        x509_ocsp::CertStatus::Good(_) => (CertStatus::Good, None),
        x509_ocsp::CertStatus::Revoked(info) => {
            (CertStatus::Revoked, Some(to_datetime(&info.revocation_time)?))
        }
        x509_ocsp::CertStatus::Unknown(_) => (CertStatus::Unknown, None),
    };
    let next_update = match &single.next_update {
        Some(t) => Some(to_datetime(t)?),
        None => None,
    };
    Ok(OcspResponse {
        status,
        this_update: to_datetime(&single.this_update)?,
        next_update,
        revoked_at,
    })
}

fn to_datetime(time: &OcspGeneralizedTime) -> Result<DateTime<Utc>, CodecError> {
    let secs = i64::try_from(time.0.to_unix_duration().as_secs())
        .ok()
        .context(InvalidTimeSnafu)?;
    DateTime::<Utc>::from_timestamp(secs, 0).context(InvalidTimeSnafu)
}

/// BasicOCSPResponse with `tbsResponseData` kept as the exact bytes that were signed.
#[derive(Clone, Debug, Eq, PartialEq)]
struct RawBasicResponse {
    tbs_response_data: Vec<u8>,
}

impl der::FixedTag for RawBasicResponse {
    const TAG: Tag = Tag::Sequence;
}

impl<'a> der::DecodeValue<'a> for RawBasicResponse {
    fn decode_value<R: der::Reader<'a>>(reader: &mut R, header: der::Header) -> der::Result<Self> {
        use der::Reader as _;
        reader.read_nested(header.length, |reader| {
            let tbs_response_data = reader.tlv_bytes()?.to_vec();
            // signatureAlgorithm, signature and the optional certs are read from the full decode
            while !reader.is_finished() {
                reader.tlv_bytes()?;
            }
            Ok(Self { tbs_response_data })
        })
    }
}
