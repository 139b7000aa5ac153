use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

/// Owns the Prometheus exporter for the lifetime of the process.
///
/// Built once by the entry point and carried in `AppState`; a disabled
/// handle renders nothing and the `/metrics` route is not mounted.
#[derive(Clone, Default)]
pub(crate) struct MetricsHandle {
    prometheus: Option<PrometheusHandle>,
}

impl MetricsHandle {
    pub(crate) fn init(settings: &Settings) -> anyhow::Result<Self> {
        if !settings.telemetry().prometheus_enabled {
            return Ok(Self::disabled());
        }

        let handle = PrometheusBuilder::new().install_recorder()?;
        Ok(Self { prometheus: Some(handle) })
    }

    /// Renders like an installed exporter without claiming the global recorder.
    #[cfg(test)]
    pub(crate) fn unregistered() -> Self {
        Self { prometheus: Some(PrometheusBuilder::new().build_recorder().handle()) }
    }

    pub(crate) fn disabled() -> Self {
        Self { prometheus: None }
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.prometheus.is_some()
    }

    pub(crate) fn render(&self) -> Option<String> {
        self.prometheus.as_ref().map(PrometheusHandle::render)
    }
}
