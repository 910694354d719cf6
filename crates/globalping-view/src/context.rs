use std::time::Duration;

use globalping_api::MeasurementKind;

use crate::ViewError;

pub const DEFAULT_SHARE_URL: &str = "https://globalping.io";

#[derive(Debug, Clone, PartialEq)]
/// Per-invocation settings shared by the orchestrator and the renderer.
pub struct Context {
    pub cmd: MeasurementKind,
    pub target: String,
    pub from: String,
    pub limit: usize,
    pub ci_mode: bool,
    pub to_json: bool,
    pub to_latency: bool,
    pub full: bool,
    pub share: bool,
    pub ipv4: bool,
    pub ipv6: bool,
    /// `http` request method, `GET` when unset.
    pub http_method: Option<String>,
    /// Floor between two consecutive polls.
    pub api_min_interval: Duration,
    pub share_url: String,
}

impl Context {
    pub fn new(cmd: MeasurementKind, target: impl Into<String>) -> Self {
        Self {
            cmd,
            target: target.into(),
            from: "world".to_string(),
            limit: 1,
            ci_mode: false,
            to_json: false,
            to_latency: false,
            full: false,
            share: false,
            ipv4: false,
            ipv6: false,
            http_method: None,
            api_min_interval: Duration::from_millis(500),
            share_url: DEFAULT_SHARE_URL.to_string(),
        }
    }

    /// Rejects output modes the command cannot produce.
    pub fn validate(&self) -> Result<(), ViewError> {
        if self.to_latency && !self.cmd.supports_latency() {
            return Err(ViewError::LatencyUnsupported(self.cmd));
        }
        if self.ipv4 && self.ipv6 {
            return Err(ViewError::ConflictingOptions(
                "--ipv4 and --ipv6 cannot be used together".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_http_head(&self) -> bool {
        self.cmd == MeasurementKind::Http
            && self
                .http_method
                .as_deref()
                .is_some_and(|method| method.eq_ignore_ascii_case("HEAD"))
    }

    pub fn share_link(&self, measurement_id: &str) -> String {
        format!(
            "{}?measurement={measurement_id}",
            self.share_url.trim_end_matches('/')
        )
    }

    /// Live frames are drawn only on interactive, human-readable output.
    pub fn shows_live_frames(&self) -> bool {
        !self.ci_mode && !self.to_json
    }
}

#[cfg(test)]
mod tests {
    use globalping_api::MeasurementKind;

    use super::Context;
    use crate::ViewError;

    #[test]
    fn latency_is_rejected_for_traceroute_and_mtr() {
        for kind in [MeasurementKind::Traceroute, MeasurementKind::Mtr] {
            let mut ctx = Context::new(kind, "example.com");
            ctx.to_latency = true;
            assert!(matches!(ctx.validate(), Err(ViewError::LatencyUnsupported(k)) if k == kind));
        }
        let mut ctx = Context::new(MeasurementKind::Dns, "example.com");
        ctx.to_latency = true;
        assert!(ctx.validate().is_ok());
    }

    #[test]
    fn share_link_appends_measurement_id() {
        let mut ctx = Context::new(MeasurementKind::Ping, "example.com");
        ctx.share_url = "https://globalping.io/".to_string();
        assert_eq!(
            ctx.share_link("nzGzfAGL7sZfUs3c"),
            "https://globalping.io?measurement=nzGzfAGL7sZfUs3c"
        );
    }

    #[test]
    fn head_detection_is_case_insensitive() {
        let mut ctx = Context::new(MeasurementKind::Http, "example.com");
        assert!(!ctx.is_http_head());
        ctx.http_method = Some("head".to_string());
        assert!(ctx.is_http_head());
    }
}
