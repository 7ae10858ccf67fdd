pub mod x509 {
    #![allow(deprecated)]
    use openssl::asn1::{Asn1Integer, Asn1Time};
    use openssl::bn::BigNum;
    use openssl::ec::{EcGroup, EcKey};
    use openssl::hash::MessageDigest;
    use openssl::nid::Nid;
    use openssl::pkey::{PKey, Private};
    use openssl::x509::{X509, X509Extension, X509Name, X509NameBuilder};
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Clone, Default)]
    pub struct CertOptions {
        pub must_staple: bool,
        pub ocsp_urls: Vec<String>,
        /// Adds a subjectAltName and serverAuth usage so the leaf passes webpki path checks.
        pub dns_names: Vec<String>,
    }

    pub struct TestChain {
        pub root: X509,
        pub root_key: PKey<Private>,
        pub leaf: X509,
        pub leaf_key: PKey<Private>,
    }

    impl TestChain {
        pub fn leaf_der(&self) -> Vec<u8> {
            self.leaf.to_der().unwrap()
        }

        pub fn issuer_der(&self) -> Vec<u8> {
            self.root.to_der().unwrap()
        }

        /// Chain ordered leaf first, as handshake verification reports it.
        pub fn chain(&self) -> Vec<Vec<u8>> {
            vec![self.leaf_der(), self.issuer_der()]
        }

        /// A responder certificate issued by the chain's CA.
        pub fn issue_responder(&self, cn: &str, ocsp_signing: bool) -> (X509, PKey<Private>) {
            let key = gen_key();
            let mut exts = vec![("basicConstraints", "CA:FALSE".to_string())];
            if ocsp_signing {
                exts.push(("extendedKeyUsage", "OCSPSigning".to_string()));
            }
            let cert = build_cert(cn, &key, Some((&self.root, &self.root_key)), &exts);
            (cert, key)
        }

        /// A self-signed CA with the same subject name as the chain's root but its own key.
        pub fn issue_namesake_root(&self) -> X509 {
            build_cert(
                "Test OCSP Root",
                &gen_key(),
                None,
                &[("basicConstraints", "critical,CA:TRUE".to_string())],
            )
        }

        /// Another leaf from the same CA, with a different serial number.
        pub fn issue_sibling_leaf(&self) -> X509 {
            let key = gen_key();
            build_cert(
                "sibling.example.test",
                &key,
                Some((&self.root, &self.root_key)),
                &[("basicConstraints", "CA:FALSE".to_string())],
            )
        }
    }

    pub fn make_name(cn: &str) -> X509Name {
        let mut b = X509NameBuilder::new().unwrap();
        b.append_entry_by_nid(Nid::COMMONNAME, cn).unwrap();
        b.build()
    }

    pub fn gen_key() -> PKey<Private> {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
    }

    fn next_serial() -> Asn1Integer {
        static SERIAL: AtomicU32 = AtomicU32::new(1000);
        let n = SERIAL.fetch_add(1, Ordering::Relaxed);
        BigNum::from_u32(n).unwrap().to_asn1_integer().unwrap()
    }

    pub fn build_cert(
        cn: &str,
        key: &PKey<Private>,
        issuer: Option<(&X509, &PKey<Private>)>,
        extensions: &[(&str, String)],
    ) -> X509 {
        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        builder.set_serial_number(&next_serial()).unwrap();
        let name = make_name(cn);
        builder.set_subject_name(&name).unwrap();
        match issuer {
            Some((issuer_cert, _)) => builder.set_issuer_name(issuer_cert.subject_name()).unwrap(),
            None => builder.set_issuer_name(&name).unwrap(),
        }
        builder.set_pubkey(key).unwrap();
        builder
            .set_not_before(&Asn1Time::days_from_now(0).unwrap())
            .unwrap();
        builder
            .set_not_after(&Asn1Time::days_from_now(30).unwrap())
            .unwrap();
        for (ext_name, value) in extensions {
            let ext = {
                let ctx = builder.x509v3_context(issuer.map(|(c, _)| &**c), None);
                X509Extension::new(None, Some(&ctx), ext_name, value).unwrap()
            };
            builder.append_extension(ext).unwrap();
        }
        let signing_key = issuer.map(|(_, k)| k).unwrap_or(key);
        builder.sign(signing_key, MessageDigest::sha256()).unwrap();
        builder.build()
    }

    /// Self-signed CA plus one leaf it issued.
    pub fn issue_chain(options: CertOptions) -> TestChain {
        let root_key = gen_key();
        let root = build_cert(
            "Test OCSP Root",
            &root_key,
            None,
            &[("basicConstraints", "critical,CA:TRUE".to_string())],
        );

        let leaf_key = gen_key();
        let mut exts = vec![("basicConstraints", "CA:FALSE".to_string())];
        if options.must_staple {
            exts.push(("tlsfeature", "status_request".to_string()));
        }
        if !options.ocsp_urls.is_empty() {
            let value = options
                .ocsp_urls
                .iter()
                .map(|u| format!("OCSP;URI:{u}"))
                .collect::<Vec<_>>()
                .join(",");
            exts.push(("authorityInfoAccess", value));
        }
        if !options.dns_names.is_empty() {
            let value = options
                .dns_names
                .iter()
                .map(|n| format!("DNS:{n}"))
                .collect::<Vec<_>>()
                .join(",");
            exts.push(("subjectAltName", value));
            exts.push(("extendedKeyUsage", "serverAuth".to_string()));
        }
        let leaf = build_cert("leaf.example.test", &leaf_key, Some((&root, &root_key)), &exts);
        TestChain {
            root,
            root_key,
            leaf,
            leaf_key,
        }
    }
}

pub mod ocsp {
    use super::x509::{TestChain, gen_key};
    use crate::ocsp::codec::{CertStatus, DerOcspCodec, OcspCodec, RequestOptions};
    use chrono::{DateTime, Utc};
    use const_oid::ObjectIdentifier;
    use const_oid::db::rfc6960::ID_PKIX_OCSP_BASIC;
    use der::asn1::{BitString, GeneralizedTime, Null, OctetString};
    use der::{Decode, Encode};
    use openssl::hash::MessageDigest;
    use openssl::pkey::{PKey, Private};
    use openssl::sign::Signer;
    use spki::AlgorithmIdentifierOwned;
    use x509_ocsp::{
        BasicOcspResponse, OcspGeneralizedTime, OcspRequest, OcspResponse, OcspResponseStatus,
        ResponderId, ResponseBytes, ResponseData, RevokedInfo, SingleResponse, Version,
    };

    const ECDSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");

    #[derive(Debug, Clone, Copy)]
    pub enum ResponseSigner {
        Issuer,
        Delegated { ocsp_signing: bool },
        UnrelatedKey,
    }

    #[derive(Debug, Clone)]
    pub struct ResponseSpec {
        pub status: CertStatus,
        pub this_update: DateTime<Utc>,
        pub next_update: Option<DateTime<Utc>>,
        pub signer: ResponseSigner,
    }

    impl ResponseSpec {
        pub fn good(this_update: DateTime<Utc>, next_update: Option<DateTime<Utc>>) -> Self {
            Self {
                status: CertStatus::Good,
                this_update,
                next_update,
                signer: ResponseSigner::Issuer,
            }
        }
    }

    fn gt(t: DateTime<Utc>) -> OcspGeneralizedTime {
        OcspGeneralizedTime(
            GeneralizedTime::from_unix_duration(std::time::Duration::from_secs(
                t.timestamp() as u64
            ))
            .unwrap(),
        )
    }

    fn sign(key: &PKey<Private>, data: &[u8]) -> Vec<u8> {
        let mut signer = Signer::new(MessageDigest::sha256(), key).unwrap();
        signer.sign_oneshot_to_vec(data).unwrap()
    }

    /// DER OCSPResponse for the chain's leaf, signed as `spec.signer` says.
    pub fn build_response(chain: &TestChain, spec: ResponseSpec) -> Vec<u8> {
        let request = DerOcspCodec
            .encode(&chain.leaf_der(), &chain.issuer_der(), &RequestOptions::default())
            .unwrap();
        let cert_id = OcspRequest::from_der(&request).unwrap().tbs_request.request_list[0]
            .req_cert
            .clone();

        let cert_status = match spec.status {
            CertStatus::Good => x509_ocsp::CertStatus::Good(Null),
            CertStatus::Revoked => x509_ocsp::CertStatus::Revoked(RevokedInfo {
                revocation_time: gt(spec.this_update),
                revocation_reason: None,
            }),
            CertStatus::Unknown => x509_ocsp::CertStatus::Unknown(Null),
        };
        let data = ResponseData {
            version: Version::V1,
            responder_id: ResponderId::ByKey(OctetString::new(vec![0u8; 20]).unwrap()),
            produced_at: gt(Utc::now()),
            responses: vec![SingleResponse {
                cert_id,
                cert_status,
                this_update: gt(spec.this_update),
                next_update: spec.next_update.map(gt),
                single_extensions: None,
            }],
            response_extensions: None,
        };
        let tbs = data.to_der().unwrap();

        let (signature, certs) = match spec.signer {
            ResponseSigner::Issuer => (sign(&chain.root_key, &tbs), None),
            ResponseSigner::Delegated { ocsp_signing } => {
                let (responder, key) = chain.issue_responder("Test OCSP Responder", ocsp_signing);
                let cert = x509_cert::Certificate::from_der(&responder.to_der().unwrap()).unwrap();
                (sign(&key, &tbs), Some(vec![cert]))
            }
            ResponseSigner::UnrelatedKey => (sign(&gen_key(), &tbs), None),
        };

        let basic = BasicOcspResponse {
            tbs_response_data: data,
            signature_algorithm: AlgorithmIdentifierOwned {
                oid: ECDSA_WITH_SHA256,
                parameters: None,
            },
            signature: BitString::from_bytes(&signature).unwrap(),
            certs,
        };
        OcspResponse {
            response_status: OcspResponseStatus::Successful,
            response_bytes: Some(ResponseBytes {
                response_type: ID_PKIX_OCSP_BASIC,
                response: OctetString::new(basic.to_der().unwrap()).unwrap(),
            }),
        }
        .to_der()
        .unwrap()
    }

    /// An OCSPResponse carrying only a non-successful status.
    pub fn error_response(status: OcspResponseStatus) -> Vec<u8> {
        OcspResponse {
            response_status: status,
            response_bytes: None,
        }
        .to_der()
        .unwrap()
    }
}

/// In-memory stand-ins for the codec and the HTTP transport.
pub mod mock {
    use crate::ocsp::codec::{
        CertStatus, CodecError, EncodingSnafu, NotCoveredSnafu, OcspCodec, OcspResponse,
        RequestOptions,
    };
    use crate::ocsp::transport::{
        BodySnafu, HttpReply, InvalidUrlSnafu, OcspTransport, RequestSnafu, TransportError,
    };
    use crate::ocsp::context::VerifyContext;
    use bytes::Bytes;
    use chrono::{Duration as ChronoDuration, Utc};
    use der::Decode;
    use reqwest::StatusCode;
    use snafu::{IntoError, ResultExt};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Decodes the literal response bodies `good`, `revoked`, `unknown`, `stale` and
    /// `future`; anything else is rejected.
    #[derive(Debug, Default)]
    pub struct MockCodec {
        pub fail_encode: bool,
    }

    impl OcspCodec for MockCodec {
        fn encode(
            &self,
            subject_der: &[u8],
            _issuer_der: &[u8],
            _options: &RequestOptions,
        ) -> Result<Vec<u8>, CodecError> {
            if self.fail_encode {
                let err = x509_cert::Certificate::from_der(&[]).unwrap_err();
                return Err(EncodingSnafu.into_error(err));
            }
            Ok(subject_der.to_vec())
        }

        fn decode(
            &self,
            response_der: &[u8],
            _subject_der: &[u8],
            _issuer_der: &[u8],
        ) -> Result<OcspResponse, CodecError> {
            let now = Utc::now();
            let hour = ChronoDuration::hours(1);
            let response = |status| OcspResponse {
                status,
                this_update: now - hour,
                next_update: Some(now + hour),
                revoked_at: None,
            };
            match response_der {
                b"good" => Ok(response(CertStatus::Good)),
                b"unknown" => Ok(response(CertStatus::Unknown)),
                b"revoked" => Ok(OcspResponse {
                    revoked_at: Some(now - hour),
                    ..response(CertStatus::Revoked)
                }),
                b"stale" => Ok(OcspResponse {
                    this_update: now - hour * 3,
                    next_update: Some(now - hour),
                    ..response(CertStatus::Good)
                }),
                b"future" => Ok(OcspResponse {
                    this_update: now + hour,
                    next_update: Some(now + hour * 2),
                    ..response(CertStatus::Good)
                }),
                _ => NotCoveredSnafu.fail(),
            }
        }
    }

    #[derive(Debug, Clone)]
    pub enum Reply {
        Http(StatusCode, Bytes),
        Refused,
        BodyError,
        /// Cancels the caller's context while the request is in flight, then answers.
        CancelCaller(VerifyContext, Box<Reply>),
    }

    impl Reply {
        pub fn ok(body: &'static [u8]) -> Self {
            Reply::Http(StatusCode::OK, Bytes::from_static(body))
        }

        pub fn status(code: u16, body: &'static [u8]) -> Self {
            let status = StatusCode::from_u16(code).unwrap();
            Reply::Http(status, Bytes::from_static(body))
        }
    }

    /// Answers each URL after a fixed delay. Unregistered but well-formed URLs are refused.
    #[derive(Debug, Default)]
    pub struct MockTransport {
        routes: HashMap<String, (Duration, Reply)>,
        calls: AtomicUsize,
        completed: AtomicUsize,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(mut self, url: &str, delay: Duration, reply: Reply) -> Self {
            self.routes.insert(url.to_string(), (delay, reply));
            self
        }

        /// Requests started.
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// Requests that ran to completion rather than being abandoned.
        pub fn completed(&self) -> usize {
            self.completed.load(Ordering::SeqCst)
        }
    }

    impl OcspTransport for MockTransport {
        async fn post(&self, url: &str, _body: Bytes) -> Result<HttpReply, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            url::Url::parse(url).context(InvalidUrlSnafu { url })?;
            let (delay, reply) = self
                .routes
                .get(url)
                .cloned()
                .unwrap_or((Duration::ZERO, Reply::Refused));
            tokio::time::sleep(delay).await;
            self.completed.fetch_add(1, Ordering::SeqCst);
            answer(url, reply)
        }
    }

    fn answer(url: &str, reply: Reply) -> Result<HttpReply, TransportError> {
        match reply {
            Reply::Http(status, body) => Ok(HttpReply { status, body }),
            Reply::Refused => Err(RequestSnafu { url }.into_error("connection refused".into())),
            Reply::BodyError => Err(BodySnafu { url }.into_error("connection reset".into())),
            Reply::CancelCaller(ctx, then) => {
                ctx.cancel();
                answer(url, *then)
            }
        }
    }
}
