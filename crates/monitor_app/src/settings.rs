use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context};
use log::LevelFilter;
use monitor_core::CrawlConfig;
use monitor_engine::{ControlSettings, ExportRequest, ReconnectPolicy};
use monitor_logging::LogDestination;
use serde::{Deserialize, Serialize};

/// Contents of the RON file passed on the command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    /// `file`, `terminal` or `both`.
    pub log_destination: String,
    pub log_level: String,
    pub reconnect: ReconnectSettings,
    pub crawl: CrawlConfig,
    /// Exported once the session ends, when present.
    pub export: Option<ExportRequest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectSettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        let policy = ReconnectPolicy::default();
        Self {
            max_retries: policy.max_retries,
            base_delay_ms: policy.base_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        let control = ControlSettings::default();
        Self {
            api_base_url: control.base_url,
            request_timeout_secs: control.request_timeout.as_secs(),
            log_destination: "terminal".to_string(),
            log_level: "info".to_string(),
            reconnect: ReconnectSettings::default(),
            crawl: CrawlConfig::default(),
            export: None,
        }
    }
}

impl MonitorSettings {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        let settings: MonitorSettings = ron::from_str(&content)
            .with_context(|| format!("failed to parse settings in {}", path.display()))?;
        settings.destination()?;
        settings.level()?;
        Ok(settings)
    }

    pub fn destination(&self) -> anyhow::Result<LogDestination> {
        LogDestination::parse(&self.log_destination)
            .ok_or_else(|| anyhow!("unknown log destination {:?}", self.log_destination))
    }

    pub fn level(&self) -> anyhow::Result<LevelFilter> {
        LevelFilter::from_str(&self.log_level)
            .map_err(|_| anyhow!("unknown log level {:?}", self.log_level))
    }

    pub fn control_settings(&self) -> ControlSettings {
        ControlSettings {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..ControlSettings::with_base_url(self.api_base_url.clone())
        }
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_retries: self.reconnect.max_retries,
            base_delay: Duration::from_millis(self.reconnect.base_delay_ms),
            max_delay: Duration::from_millis(self.reconnect.max_delay_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use monitor_engine::ExportFormat;
    use pretty_assertions::assert_eq;

    use super::*;

    fn write_settings(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let file = write_settings(
            r#"(
                api_base_url: "http://crawler.internal:9000/api",
                crawl: (startUrl: "https://example.com", maxDepth: 2),
            )"#,
        );

        let settings = MonitorSettings::load(file.path()).unwrap();

        assert_eq!(settings.api_base_url, "http://crawler.internal:9000/api");
        assert_eq!(settings.crawl.start_url, "https://example.com");
        assert_eq!(settings.crawl.max_depth, 2);
        assert_eq!(settings.crawl.concurrent_threads, 5);
        assert_eq!(settings.reconnect_policy(), ReconnectPolicy::default());
        assert_eq!(settings.destination().unwrap(), LogDestination::Terminal);
        assert_eq!(settings.export, None);
    }

    #[test]
    fn export_and_logging_options_are_read() {
        let file = write_settings(
            r#"(
                log_destination: "both",
                log_level: "debug",
                reconnect: (max_retries: 2, base_delay_ms: 100),
                crawl: (startUrl: "https://example.com"),
                export: Some((formats: [CSV, PDF], includeDownloadedFiles: false)),
            )"#,
        );

        let settings = MonitorSettings::load(file.path()).unwrap();

        assert_eq!(settings.destination().unwrap(), LogDestination::Both);
        assert_eq!(settings.level().unwrap(), LevelFilter::Debug);
        let policy = settings.reconnect_policy();
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.base_delay, Duration::from_millis(100));
        assert_eq!(policy.max_delay, Duration::from_secs(10));
        let export = settings.export.unwrap();
        assert_eq!(export.formats, vec![ExportFormat::Csv, ExportFormat::Pdf]);
        assert!(!export.include_downloaded_files);
        assert!(export.include_pages);
    }

    #[test]
    fn unknown_destination_is_rejected() {
        let file = write_settings(r#"(log_destination: "syslog")"#);
        let err = MonitorSettings::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("syslog"));
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.ron");
        let err = MonitorSettings::load(&path).unwrap_err();
        assert!(err.to_string().contains("absent.ron"));
    }
}
