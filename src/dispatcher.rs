use crate::breaker::{BreakerCheck, BreakerRegistry};
use crate::proxy::context::{full_body, BoxBody};
use crate::roundrobin::RoundRobin;
use bytes::Bytes;
use http::{HeaderMap, Method, Uri};
use http_body_util::BodyExt;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use tracing::warn;

/// Terminal outcome of a dispatch attempt, as seen by the Orchestrator.
pub enum DispatchOutcome {
    /// Upstream responded (any status) — forwarded verbatim to the client.
    Proxied(hyper::Response<BoxBody>),
    /// The selected upstream's breaker is fail-fast OPEN: synthesize 503,
    /// no network I/O performed.
    BreakerOpen,
    /// Attempts were exhausted without a usable response: synthesize 502.
    Unreachable(String),
    /// Roster is empty.
    NoUpstream,
}

/// Round-robin selection, header sanitization, bounded retries against the
/// same selected upstream, and circuit-breaker coordination (§4.6).
///
/// Grounded on the retry/timeout/breaker-coordination shape of
/// `phase_upstream` in the teacher's proxy handler, simplified to a flat
/// roster of upstream base URLs (no weighted clusters, no failover across
/// the roster on retry — the spec retries the *same* selected upstream).
pub struct Dispatcher {
    roundrobin: RoundRobin,
    breakers: BreakerRegistry,
    breaker_enabled: bool,
    client: Client<HttpConnector, BoxBody>,
    max_retries: u32,
    retry_delay: Duration,
    upstream_timeout: Duration,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        upstreams: Vec<String>,
        breaker_enabled: bool,
        failure_threshold: u32,
        reset_timeout: Duration,
        max_retries: u32,
        retry_delay: Duration,
        upstream_timeout: Duration,
    ) -> Self {
        Self {
            roundrobin: RoundRobin::new(upstreams),
            breakers: BreakerRegistry::new(failure_threshold, reset_timeout),
            breaker_enabled,
            client: Client::builder(TokioExecutor::new()).build(HttpConnector::new()),
            max_retries,
            retry_delay,
            upstream_timeout,
        }
    }

    pub async fn dispatch(
        &self,
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
        body: &Bytes,
    ) -> DispatchOutcome {
        let Some(upstream) = self.roundrobin.next() else {
            return DispatchOutcome::NoUpstream;
        };

        if self.breaker_enabled {
            match self.breakers.check(upstream) {
                BreakerCheck::Rejected => {
                    metrics::counter!("gateway_circuit_breaker_rejected_total").increment(1);
                    return DispatchOutcome::BreakerOpen;
                }
                BreakerCheck::Allowed | BreakerCheck::Probe => {}
            }
        }

        let target = match build_target_uri(upstream, uri) {
            Ok(t) => t,
            Err(e) => return DispatchOutcome::Unreachable(e),
        };

        let mut attempt = 0u32;
        let mut last_err = String::new();

        loop {
            let outbound = match build_outbound_request(method, &target, headers, body.clone()) {
                Ok(r) => r,
                Err(e) => return DispatchOutcome::Unreachable(e),
            };

            let result = tokio::time::timeout(self.upstream_timeout, self.client.request(outbound)).await;

            match result {
                Ok(Ok(resp)) => {
                    let status = resp.status();
                    if status.as_u16() >= 500 && attempt < self.max_retries {
                        attempt += 1;
                        metrics::counter!("gateway_upstream_retries_total").increment(1);
                        tokio::time::sleep(self.retry_delay).await;
                        continue;
                    }

                    if self.breaker_enabled {
                        if status.as_u16() >= 500 {
                            let tripped = self.breakers.record_failure(upstream);
                            if tripped {
                                metrics::counter!("gateway_circuit_breaker_trips_total").increment(1);
                            }
                        } else {
                            self.breakers.record_success(upstream);
                        }
                    }

                    let (parts, incoming) = resp.into_parts();
                    let boxed = incoming.boxed();
                    return DispatchOutcome::Proxied(hyper::Response::from_parts(parts, boxed));
                }
                Ok(Err(e)) => {
                    last_err = e.to_string();
                }
                Err(_) => {
                    last_err = "upstream request timed out".to_string();
                }
            }

            if attempt < self.max_retries {
                attempt += 1;
                metrics::counter!("gateway_upstream_retries_total").increment(1);
                tokio::time::sleep(self.retry_delay).await;
                continue;
            }

            if self.breaker_enabled {
                let tripped = self.breakers.record_failure(upstream);
                if tripped {
                    metrics::counter!("gateway_circuit_breaker_trips_total").increment(1);
                }
            }
            warn!("dispatcher: upstream {} unreachable: {}", upstream, last_err);
            return DispatchOutcome::Unreachable(last_err);
        }
    }
}

fn build_target_uri(upstream: &str, inbound_uri: &Uri) -> Result<Uri, String> {
    let base = upstream.trim_end_matches('/');
    let mut target = format!("{base}{}", inbound_uri.path());
    if let Some(q) = inbound_uri.query() {
        target.push('?');
        target.push_str(q);
    }
    target.parse::<Uri>().map_err(|e| e.to_string())
}

/// Strip `Host` (case-insensitively) and pass every other header through
/// unchanged, matching §4.6.
fn build_outbound_request(
    method: &Method,
    target: &Uri,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<hyper::Request<BoxBody>, String> {
    let mut builder = hyper::Request::builder().method(method.clone()).uri(target.clone());
    for (name, value) in headers.iter() {
        if name.as_str().eq_ignore_ascii_case("host") {
            continue;
        }
        builder = builder.header(name, value);
    }
    builder.body(full_body(body)).map_err(|e| e.to_string())
}
