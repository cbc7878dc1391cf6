use prometheus::{Encoder, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static HTTP_REQUEST_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static IDENTITY_DISCONNECT_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static IDP_VERIFICATION_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Register all collectors. Safe to call more than once; later calls are no-ops.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    if REGISTRY.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let requests_total = IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests"),
        &["method", "path", "status"],
    )?;

    let request_duration = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
        ),
        &["method", "path", "status"],
    )?;

    let disconnects = IntCounterVec::new(
        Opts::new(
            "identity_disconnect_total",
            "Identity disconnect attempts by outcome",
        ),
        &["category", "outcome"],
    )?;

    let verifications = IntCounterVec::new(
        Opts::new(
            "idp_verification_total",
            "IdP migration verification checks by result",
        ),
        &["result"],
    )?;

    registry.register(Box::new(requests_total.clone()))?;
    registry.register(Box::new(request_duration.clone()))?;
    registry.register(Box::new(disconnects.clone()))?;
    registry.register(Box::new(verifications.clone()))?;

    let _ = REGISTRY.set(registry);
    let _ = HTTP_REQUESTS_TOTAL.set(requests_total);
    let _ = HTTP_REQUEST_DURATION_SECONDS.set(request_duration);
    let _ = IDENTITY_DISCONNECT_TOTAL.set(disconnects);
    let _ = IDP_VERIFICATION_TOTAL.set(verifications);

    Ok(())
}

pub fn record_identity_disconnect(category: &str, outcome: &str) {
    if let Some(counter) = IDENTITY_DISCONNECT_TOTAL.get() {
        counter.with_label_values(&[category, outcome]).inc();
    }
}

pub fn record_idp_verification(valid: bool) {
    if let Some(counter) = IDP_VERIFICATION_TOTAL.get() {
        let result = if valid { "valid" } else { "invalid" };
        counter.with_label_values(&[result]).inc();
    }
}

pub fn get_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    let registry = match REGISTRY.get() {
        Some(r) => r,
        None => {
            tracing::error!("Metrics registry not initialized");
            return "# Metrics registry not initialized\n".to_string();
        }
    };

    let metric_families = registry.gather();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return format!("# Failed to encode metrics: {}\n", e);
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to convert metrics to UTF-8: {}", e);
            format!("# Failed to convert metrics to UTF-8: {}\n", e)
        }
    }
}
