use std::env;
use std::sync::OnceLock;

use metrics_exporter_prometheus::PrometheusBuilder;
pub use metrics_exporter_prometheus::PrometheusHandle;
use tracing::{info, warn};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn parse_port(raw: Option<&str>) -> Option<u16> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<u16>().ok())
        .filter(|port| *port != 0)
}

/// Installs the Prometheus recorder.
///
/// When `port_env` names a valid port the exporter serves `0.0.0.0:<port>`
/// on its own and `None` is returned. Otherwise the recorder is installed
/// without a listener and the handle is returned so the caller can render
/// the scrape output itself. Must be called from inside a tokio runtime.
pub fn init_metrics(port_env: &str) -> Option<&'static PrometheusHandle> {
    if let Some(existing) = PROMETHEUS_HANDLE.get() {
        return Some(existing);
    }

    if let Some(port) = parse_port(env::var(port_env).ok().as_deref()) {
        match PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], port))
            .install()
        {
            Ok(()) => info!(metrics_port = port, "started prometheus exporter"),
            Err(err) => warn!(error = %err, metrics_port = port, "failed to start prometheus exporter"),
        }
        return None;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = PROMETHEUS_HANDLE.set(handle);
            info!("installed prometheus recorder");
            PROMETHEUS_HANDLE.get()
        }
        Err(err) => {
            warn!(error = %err, "failed to install prometheus recorder");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_parsing() {
        assert_eq!(parse_port(Some("9100")), Some(9100));
        assert_eq!(parse_port(Some(" 9100 ")), Some(9100));
        assert_eq!(parse_port(Some("")), None);
        assert_eq!(parse_port(Some("0")), None);
        assert_eq!(parse_port(Some("metrics")), None);
        assert_eq!(parse_port(None), None);
    }
}
