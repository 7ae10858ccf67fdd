use crate::ocsp::config::RevocationCheckMode;
use crate::tls::config::TlsConfig;
use crate::tls::error::{
    ClientBuildSnafu, PemParseSnafu, PemReadSnafu, RootStoreAddSnafu, TlsError,
};
use crate::tls::ocsp_verifier::OcspServerCertVerifier;
use reqwest::Client;
use rustls::pki_types::CertificateDer;
use snafu::ResultExt;
use std::path::Path;
use std::sync::Arc;

pub fn create_tls_client_with_config(cfg: TlsConfig) -> Result<Client, TlsError> {
    if !cfg.verify_certificates {
        return Client::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(!cfg.verify_hostname)
            .build()
            .context(ClientBuildSnafu);
    }

    // Install aws-lc-rs provider (idempotent)
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let (root_store, anchors) = match cfg.custom_root_store_path.as_ref() {
        Some(pem_path) => {
            let anchors = load_root_certs(pem_path)?;
            let mut store = rustls::RootCertStore::empty();
            for cert in &anchors {
                store.add(cert.clone()).context(RootStoreAddSnafu)?;
            }
            (store, anchors)
        }
        None => native_or_bundled_roots(),
    };

    let tls = if cfg.ocsp_config.check_mode == RevocationCheckMode::Disabled {
        rustls::ClientConfig::builder()
            .with_root_certificates(Arc::new(root_store))
            .with_no_client_auth()
    } else {
        tracing::debug!(target: "ocsp_core::tls", mode = ?cfg.ocsp_config.check_mode, anchors = anchors.len(), "Enabling OCSP revocation checks");
        let verifier =
            OcspServerCertVerifier::new_with_root_store(&cfg.ocsp_config, root_store, anchors)?;
        rustls::ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(verifier))
            .with_no_client_auth()
    };

    Client::builder()
        .use_preconfigured_tls(tls)
        .build()
        .context(ClientBuildSnafu)
}

fn load_root_certs(pem_path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let pem_data = std::fs::read(pem_path).context(PemReadSnafu { path: pem_path })?;
    let mut cursor = std::io::Cursor::new(pem_data);
    rustls_pemfile::certs(&mut cursor)
        .collect::<Result<Vec<_>, _>>()
        .context(PemParseSnafu)
}

/// The platform trust store, or the bundled webpki roots when it is empty.
///
/// Only the platform store yields full certificates; bundled roots carry no anchors, so a
/// chain that stops below its root cannot be checked against a responder.
fn native_or_bundled_roots() -> (rustls::RootCertStore, Vec<CertificateDer<'static>>) {
    let native = rustls_native_certs::load_native_certs();
    for e in &native.errors {
        tracing::debug!(target: "ocsp_core::tls", "Skipping platform root certificate: {e}");
    }
    let mut store = rustls::RootCertStore::empty();
    let (added, ignored) = store.add_parsable_certificates(native.certs.iter().cloned());
    if added > 0 {
        tracing::debug!(target: "ocsp_core::tls", added, ignored, "Loaded platform root certificates");
        return (store, native.certs);
    }
    tracing::warn!(target: "ocsp_core::tls", "No platform root certificates found, using bundled roots without OCSP anchors");
    store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    (store, Vec::new())
}
