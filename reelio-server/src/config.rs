use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use addons::AddonDescriptor;
use anyhow::Context;
use providers::HeaderBundle;
use segio::{PipelineConfig, SegmentLossMode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// This server as clients reach it; proxied URLs are rooted here.
    pub public_base_url: String,
    pub vidara: VidaraConfig,
    pub vibix: VibixConfig,
    pub kinoray: KinorayConfig,
    pub addons: Vec<AddonDescriptor>,
    pub addon_timeout_secs: u64,
    /// Header bundles matched by upstream host for the proxy endpoints;
    /// first match wins, `vidara.headers` is the fallback.
    pub proxy_headers: Vec<HostHeaders>,
    pub pipeline: PipelineSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8888".parse().expect("static addr"),
            public_base_url: "http://127.0.0.1:8888".to_string(),
            vidara: VidaraConfig::default(),
            vibix: VibixConfig::default(),
            kinoray: KinorayConfig::default(),
            addons: Vec::new(),
            addon_timeout_secs: 5,
            proxy_headers: Vec::new(),
            pipeline: PipelineSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VidaraConfig {
    pub base_url: String,
    pub headers: HeaderBundle,
}

impl Default for VidaraConfig {
    fn default() -> Self {
        Self {
            base_url: "https://vidara.example".to_string(),
            headers: HeaderBundle::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VibixConfig {
    pub headers: HeaderBundle,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KinorayConfig {
    pub mirrors: Vec<String>,
    pub headers: HeaderBundle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostHeaders {
    /// Substring matched against the upstream URL's host.
    pub host_contains: String,
    pub headers: HeaderBundle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LossMode {
    Strict,
    #[default]
    Lenient,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub prefetch_depth: usize,
    pub client_concurrency: usize,
    pub segment_retries: u32,
    pub retry_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub loss_mode: LossMode,
    pub ffmpeg_path: String,
    pub inter_episode_delay_secs: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        let d = PipelineConfig::default();
        Self {
            prefetch_depth: d.prefetch_depth,
            client_concurrency: d.client_concurrency,
            segment_retries: d.segment_retries,
            retry_delay_ms: d.retry_delay_base.as_millis() as u64,
            request_timeout_secs: d.request_timeout.as_secs(),
            loss_mode: LossMode::default(),
            ffmpeg_path: d.ffmpeg_path,
            inter_episode_delay_secs: d.inter_episode_delay.as_secs(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            prefetch_depth: self.pipeline.prefetch_depth,
            client_concurrency: self.pipeline.client_concurrency,
            segment_retries: self.pipeline.segment_retries,
            retry_delay_base: Duration::from_millis(self.pipeline.retry_delay_ms),
            request_timeout: Duration::from_secs(self.pipeline.request_timeout_secs),
            loss_mode: match self.pipeline.loss_mode {
                LossMode::Strict => SegmentLossMode::Strict,
                LossMode::Lenient => SegmentLossMode::Lenient,
            },
            ffmpeg_path: self.pipeline.ffmpeg_path.clone(),
            inter_episode_delay: Duration::from_secs(self.pipeline.inter_episode_delay_secs),
        }
    }

    /// Spoofed header bundle for an arbitrary upstream URL.
    pub fn headers_for_upstream(&self, url: &str) -> &HeaderBundle {
        let host = url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string));
        if let Some(host) = host {
            for rule in &self.proxy_headers {
                if host.contains(&rule.host_contains) {
                    return &rule.headers;
                }
            }
        }
        &self.vidara.headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_cover_a_missing_config_file() {
        let config = ServerConfig::load(None).unwrap();
        assert_eq!(config.bind.port(), 8888);
        assert_eq!(config.pipeline.prefetch_depth, 8);
        assert_eq!(config.pipeline.loss_mode, LossMode::Lenient);
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
bind = "0.0.0.0:9000"

[pipeline]
loss_mode = "strict"
ffmpeg_path = "/opt/ffmpeg/bin/ffmpeg"

[[proxy_headers]]
host_contains = "cdn.vibix"
[proxy_headers.headers]
referer = "https://vibix.example/"
"#
        )
        .unwrap();

        let config = ServerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.pipeline.loss_mode, LossMode::Strict);
        assert_eq!(config.pipeline.prefetch_depth, 8); // untouched default
        assert_eq!(
            config
                .headers_for_upstream("https://s3.cdn.vibix.example/seg0.ts")
                .referer
                .as_deref(),
            Some("https://vibix.example/")
        );
    }

    #[test]
    fn unmatched_upstream_falls_back_to_vidara_headers() {
        let config = ServerConfig::default();
        let bundle = config.headers_for_upstream("https://unknown.example/x.ts");
        assert_eq!(bundle.user_agent, config.vidara.headers.user_agent);
    }
}
