use crate::ocsp::codec::OcspCodec;
use crate::ocsp::context::VerifyContext;
use crate::ocsp::error::VerificationError;
use crate::ocsp::transport::OcspTransport;
use crate::ocsp::verifier::OcspVerifier;
use snafu::{Location, OptionExt, ResultExt, Snafu};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum WorkerError {
    #[snafu(display("Failed to create OCSP worker runtime"))]
    RuntimeBuild {
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Failed to spawn OCSP worker thread"))]
    ThreadSpawn {
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("OCSP worker is no longer running"))]
    WorkerGone {
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("{source}"))]
    Verification {
        source: VerificationError,
        #[snafu(implicit)]
        location: Location,
    },
}

pub struct OcspWorkerRequest {
    pub cert_chains: Vec<Vec<Vec<u8>>>,
    pub staple: Vec<u8>,
    pub reply: Sender<Result<(), VerificationError>>,
}

/// Runs verifications on a dedicated thread with its own current-thread runtime, so that
/// synchronous callers such as a rustls handshake inside an async runtime never block it.
///
/// The thread exits once every handle to the worker has been dropped.
#[derive(Debug, Clone)]
pub struct OcspWorker {
    tx: Sender<OcspWorkerRequest>,
}

impl OcspWorker {
    /// `verification_timeout` becomes the caller deadline of every verification.
    pub fn spawn<C: OcspCodec, T: OcspTransport>(
        verifier: Arc<OcspVerifier<C, T>>,
        verification_timeout: Option<Duration>,
    ) -> Result<Self, WorkerError> {
        let (tx, rx): (Sender<OcspWorkerRequest>, Receiver<OcspWorkerRequest>) = mpsc::channel();
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context(RuntimeBuildSnafu)?;

        std::thread::Builder::new()
            .name("ocsp-worker".into())
            .spawn(move || {
                rt.block_on(async move {
                    while let Ok(req) = rx.recv() {
                        let ctx = match verification_timeout {
                            Some(timeout) => VerifyContext::with_timeout(timeout),
                            None => VerifyContext::background(),
                        };
                        let res = verifier.verify(&ctx, &req.cert_chains, &req.staple).await;
                        let _ = req.reply.send(res);
                    }
                });
                tracing::debug!(target: "ocsp_core::ocsp", "OCSP worker stopped");
            })
            .context(ThreadSpawnSnafu)?;

        Ok(OcspWorker { tx })
    }

    /// Blocks until the verification finishes.
    pub fn verify(
        &self,
        cert_chains: Vec<Vec<Vec<u8>>>,
        staple: Vec<u8>,
    ) -> Result<(), WorkerError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        let msg = OcspWorkerRequest {
            cert_chains,
            staple,
            reply: reply_tx,
        };
        self.tx.send(msg).ok().context(WorkerGoneSnafu)?;
        reply_rx
            .recv()
            .ok()
            .context(WorkerGoneSnafu)?
            .context(VerificationSnafu)
    }
}
