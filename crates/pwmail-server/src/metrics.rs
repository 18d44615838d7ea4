use prometheus::{
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_with_registry, Counter, CounterVec, Encoder, Histogram, Registry,
    TextEncoder,
};
use std::sync::Arc;

use pwmail_auth::ErrorClass;

pub struct MailMetrics {
    pub requests_accepted: Counter,
    pub requests_rejected: CounterVec,
    pub mails_sent: Counter,
    pub nonces_pruned: Counter,
    pub request_latency: Histogram,
    pub registry: Arc<Registry>,
}

impl MailMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Arc::new(Registry::new());

        let requests_accepted = register_counter_with_registry!(
            "pwmail_requests_accepted_total",
            "Total number of authenticated requests accepted",
            registry
        )?;

        let requests_rejected = register_counter_vec_with_registry!(
            "pwmail_requests_rejected_total",
            "Total number of requests rejected, by error class",
            &["class"],
            registry
        )?;

        let mails_sent = register_counter_with_registry!(
            "pwmail_mails_sent_total",
            "Total number of mails stored",
            registry
        )?;

        let nonces_pruned = register_counter_with_registry!(
            "pwmail_nonces_pruned_total",
            "Total number of expired nonce records removed",
            registry
        )?;

        let request_latency = register_histogram_with_registry!(
            "pwmail_request_latency_seconds",
            "Request latency in seconds",
            registry
        )?;

        Ok(Self {
            requests_accepted,
            requests_rejected,
            mails_sent,
            nonces_pruned,
            request_latency,
            registry,
        })
    }

    pub fn record_rejection(&self, class: ErrorClass) {
        let label = match class {
            ErrorClass::Unauthorized => "unauthorized",
            ErrorClass::ClientError => "client_error",
            ErrorClass::NotFound => "not_found",
            ErrorClass::ServerError => "server_error",
        };
        self.requests_rejected.with_label_values(&[label]).inc();
    }

    pub fn export_prometheus(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
