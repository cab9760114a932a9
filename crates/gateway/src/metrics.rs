use std::sync::OnceLock;

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

static REGISTRY: OnceLock<Registry> = OnceLock::new();
static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
static ADMIN_DENIALS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
static AUDITED_CALLS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

fn register_collector<T>(collector: T) -> T
where
    T: prometheus::core::Collector + Clone + 'static,
{
    let _ = registry().register(Box::new(collector.clone()));
    collector
}

fn http_requests_total() -> &'static IntCounterVec {
    HTTP_REQUESTS_TOTAL.get_or_init(|| {
        register_collector(
            IntCounterVec::new(
                Opts::new(
                    "taskboard_gateway_http_requests_total",
                    "Gateway HTTP request count.",
                ),
                &["route", "method", "status"],
            )
            .expect("create taskboard_gateway_http_requests_total"),
        )
    })
}

fn admin_denials_total() -> &'static IntCounterVec {
    ADMIN_DENIALS_TOTAL.get_or_init(|| {
        register_collector(
            IntCounterVec::new(
                Opts::new(
                    "taskboard_gateway_admin_denials_total",
                    "Admin access gate denials by reason.",
                ),
                &["reason"],
            )
            .expect("create taskboard_gateway_admin_denials_total"),
        )
    })
}

fn audited_calls_total() -> &'static IntCounterVec {
    AUDITED_CALLS_TOTAL.get_or_init(|| {
        register_collector(
            IntCounterVec::new(
                Opts::new(
                    "taskboard_gateway_audited_calls_total",
                    "Audited admin operations by outcome.",
                ),
                &["op", "outcome"],
            )
            .expect("create taskboard_gateway_audited_calls_total"),
        )
    })
}

pub fn observe_http_request(route: &str, method: &str, status: u16) {
    http_requests_total()
        .with_label_values(&[route, method, status.to_string().as_str()])
        .inc();
}

pub fn observe_admin_denial(reason: &str) {
    admin_denials_total().with_label_values(&[reason]).inc();
}

pub fn observe_audited_call(op: &str, outcome: &str) {
    audited_calls_total().with_label_values(&[op, outcome]).inc();
}

pub fn render() -> Result<(String, String), prometheus::Error> {
    // Touch every collector so the exposition is complete even before the
    // first observation.
    let _ = http_requests_total();
    let _ = admin_denials_total();
    let _ = audited_calls_total();

    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;

    let body = String::from_utf8(buffer)
        .map_err(|_| prometheus::Error::Msg("metrics exposition is not utf-8".to_string()))?;

    Ok((body, encoder.format_type().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_registered_counters() {
        observe_http_request("/healthz", "GET", 200);
        observe_admin_denial("ERR_ADMIN_REQUIRED");
        observe_audited_call("delete_comment", "ok");

        let (body, format) = render().expect("render should succeed");
        assert!(body.contains("taskboard_gateway_http_requests_total"));
        assert!(body.contains("taskboard_gateway_admin_denials_total"));
        assert!(body.contains("taskboard_gateway_audited_calls_total"));
        assert!(format.contains("text/plain"));
    }
}
