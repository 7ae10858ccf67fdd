use crate::ocsp::codec::{OcspCodec, OcspResponse, RequestOptions};
use crate::ocsp::context::{RequestScope, VerifyContext};
use crate::ocsp::error::{CallerContextEndedSnafu, NetworkError};
use crate::ocsp::target::OcspTarget;
use crate::ocsp::transport::{OcspTransport, TransportError};
use bytes::Bytes;
use once_cell::sync::OnceCell;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::{KeyValue, global};
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// What a single responder task concluded.
#[derive(Debug)]
enum ResponderOutcome {
    /// Nothing usable from this responder; keep waiting for the others.
    Continue,
    /// The caller's context ended the query; abort everything.
    Fatal(NetworkError),
    /// Good or Revoked.
    Conclusive(OcspResponse),
}

impl ResponderOutcome {
    fn label(&self) -> &'static str {
        match self {
            ResponderOutcome::Continue => "continue",
            ResponderOutcome::Fatal(_) => "fatal",
            ResponderOutcome::Conclusive(_) => "conclusive",
        }
    }
}

#[derive(Debug, Clone)]
struct ResponderMetrics {
    query_total: Counter<u64>,
    query_ms: Histogram<u64>,
    responder_total: Counter<u64>,
}

impl ResponderMetrics {
    fn init(meter: &Meter) -> Self {
        Self {
            query_total: meter.u64_counter("ocsp_query_total").build(),
            query_ms: meter.u64_histogram("ocsp_query_ms").build(),
            responder_total: meter.u64_counter("ocsp_responder_total").build(),
        }
    }
}

fn metrics() -> &'static ResponderMetrics {
    static METRICS: OnceCell<ResponderMetrics> = OnceCell::new();
    METRICS.get_or_init(|| {
        let meter = global::meter("ocsp_core.ocsp");
        ResponderMetrics::init(&meter)
    })
}

/// Asks every OCSP responder named by the server certificate at once and keeps the first
/// conclusive answer.
#[derive(Debug)]
pub struct ResponderQuerier<C, T> {
    codec: Arc<C>,
    transport: Arc<T>,
    request_timeout: Duration,
    request_options: RequestOptions,
}

impl<C: OcspCodec, T: OcspTransport> ResponderQuerier<C, T> {
    pub fn new(
        codec: Arc<C>,
        transport: Arc<T>,
        request_timeout: Duration,
        request_options: RequestOptions,
    ) -> Self {
        Self {
            codec,
            transport,
            request_timeout,
            request_options,
        }
    }

    /// Returns `Ok(None)` when no responder gave a conclusive answer. Errors only when the
    /// caller's own cancellation or deadline cut the query short.
    pub async fn query(
        &self,
        ctx: &VerifyContext,
        target: &OcspTarget,
    ) -> Result<Option<OcspResponse>, NetworkError> {
        if target.responder_urls.is_empty() {
            tracing::debug!(target: "ocsp_core::ocsp", "Server certificate names no OCSP responders");
            return Ok(None);
        }

        // An un-queryable certificate is not treated as revoked.
        let request = match self
            .codec
            .encode(&target.server_cert, &target.issuer, &self.request_options)
        {
            Ok(der) => Bytes::from(der),
            Err(e) => {
                tracing::info!(target: "ocsp_core::ocsp", error = %e, "Could not build OCSP request, skipping responders");
                return Ok(None);
            }
        };

        let scope = RequestScope::derive(ctx, self.request_timeout);
        let stop = CancellationToken::new();
        let shared_target = Arc::new(target.clone());
        let start = std::time::Instant::now();

        let mut tasks = JoinSet::new();
        for url in &target.responder_urls {
            tasks.spawn(query_responder(
                Arc::clone(&self.codec),
                Arc::clone(&self.transport),
                Arc::clone(&shared_target),
                url.clone(),
                request.clone(),
                scope.clone(),
                stop.clone(),
            ));
        }

        let result = loop {
            match tasks.join_next().await {
                None => break Ok(None),
                Some(Ok(ResponderOutcome::Continue)) => continue,
                Some(Ok(ResponderOutcome::Conclusive(response))) => break Ok(Some(response)),
                Some(Ok(ResponderOutcome::Fatal(e))) => break Err(e),
                Some(Err(e)) => {
                    tracing::warn!(target: "ocsp_core::ocsp", error = %e, "OCSP responder task failed");
                }
            }
        };
        stop.cancel();
        tasks.abort_all();

        let outcome = match &result {
            Ok(Some(_)) => "conclusive",
            Ok(None) => "no_opinion",
            Err(_) => "fatal",
        };
        let attrs = [KeyValue::new("outcome", outcome)];
        metrics().query_total.add(1, &attrs);
        metrics()
            .query_ms
            .record(start.elapsed().as_millis() as u64, &attrs);
        tracing::debug!(
            target: "ocsp_core::ocsp",
            outcome,
            caller_deadline_applies = scope.caller_deadline_applies,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "OCSP responder query finished"
        );
        result
    }
}

async fn query_responder<C: OcspCodec, T: OcspTransport>(
    codec: Arc<C>,
    transport: Arc<T>,
    target: Arc<OcspTarget>,
    url: String,
    request: Bytes,
    scope: RequestScope,
    stop: CancellationToken,
) -> ResponderOutcome {
    let outcome = classify_responder(
        codec.as_ref(),
        transport.as_ref(),
        &target,
        &url,
        request,
        &scope,
        &stop,
    )
    .await;
    if matches!(
        outcome,
        ResponderOutcome::Fatal(_) | ResponderOutcome::Conclusive(_)
    ) {
        stop.cancel();
    }
    metrics()
        .responder_total
        .add(1, &[KeyValue::new("outcome", outcome.label())]);
    outcome
}

async fn classify_responder<C: OcspCodec, T: OcspTransport>(
    codec: &C,
    transport: &T,
    target: &OcspTarget,
    url: &str,
    request: Bytes,
    scope: &RequestScope,
    stop: &CancellationToken,
) -> ResponderOutcome {
    let reply = tokio::select! {
        biased;
        _ = stop.cancelled() => return ResponderOutcome::Continue,
        reason = scope.context.done() => {
            if scope.caller_deadline_applies {
                return ResponderOutcome::Fatal(CallerContextEndedSnafu { url, reason }.build());
            }
            tracing::debug!(target: "ocsp_core::ocsp", url, %reason, "OCSP responder did not answer before the internal cutoff");
            return ResponderOutcome::Continue;
        }
        reply = transport.post(url, request) => reply,
    };

    let reply = match reply {
        Ok(reply) => reply,
        Err(e @ TransportError::InvalidUrl { .. }) => {
            tracing::debug!(target: "ocsp_core::ocsp", url, error = %e, "Skipping OCSP responder");
            return ResponderOutcome::Continue;
        }
        // Only a failed connection can stem from the caller's context ending.
        Err(e @ TransportError::Request { .. }) => {
            if scope.caller_deadline_applies
                && let Some(reason) = scope.context.end()
            {
                return ResponderOutcome::Fatal(CallerContextEndedSnafu { url, reason }.build());
            }
            tracing::debug!(target: "ocsp_core::ocsp", url, error = %e, "OCSP responder unreachable");
            return ResponderOutcome::Continue;
        }
        Err(e) => {
            tracing::debug!(target: "ocsp_core::ocsp", url, error = %e, "OCSP responder reply unusable");
            return ResponderOutcome::Continue;
        }
    };

    if reply.status != StatusCode::OK {
        tracing::debug!(target: "ocsp_core::ocsp", url, status = %reply.status, "OCSP responder returned non-success status");
        return ResponderOutcome::Continue;
    }

    let response = match codec.decode(&reply.body, &target.server_cert, &target.issuer) {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!(target: "ocsp_core::ocsp", url, error = %e, "Ignoring undecodable OCSP response");
            return ResponderOutcome::Continue;
        }
    };
    if !response.is_conclusive() {
        tracing::debug!(target: "ocsp_core::ocsp", url, "OCSP responder returned status unknown");
        return ResponderOutcome::Continue;
    }
    tracing::debug!(target: "ocsp_core::ocsp", url, status = ?response.status, "OCSP responder answered");
    ResponderOutcome::Conclusive(response)
}
