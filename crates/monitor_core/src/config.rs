use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub const MAX_DEPTH_LIMIT: u32 = 50;
pub const MAX_PAGES_LIMIT: u32 = 10_000;
pub const MAX_CONCURRENT_THREADS: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectorType {
    #[default]
    #[serde(rename = "CSS")]
    Css,
    #[serde(rename = "XPATH", alias = "XPath")]
    XPath,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRule {
    pub rule_name: String,
    pub selector_type: SelectorType,
    pub selector_value: String,
    #[serde(default = "default_attribute")]
    pub attribute_to_extract: String,
}

fn default_attribute() -> String {
    "text".to_string()
}

impl ExtractionRule {
    pub fn css(name: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            rule_name: name.into(),
            selector_type: SelectorType::Css,
            selector_value: selector.into(),
            attribute_to_extract: default_attribute(),
        }
    }

    pub fn xpath(name: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            selector_type: SelectorType::XPath,
            ..Self::css(name, selector)
        }
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute_to_extract = attribute.into();
        self
    }
}

/// Configuration sent with the start command. Zero depth or page limits mean unbounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrawlConfig {
    pub start_url: String,
    pub max_depth: u32,
    pub max_pages: u32,
    /// Seconds between requests.
    pub request_delay: f64,
    pub concurrent_threads: u32,
    pub download_files: bool,
    pub enable_java_script: bool,
    pub cookies: BTreeMap<String, String>,
    pub extraction_rules: Vec<ExtractionRule>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            start_url: String::new(),
            max_depth: 0,
            max_pages: 0,
            request_delay: 1.0,
            concurrent_threads: 5,
            download_files: true,
            enable_java_script: false,
            cookies: BTreeMap::new(),
            extraction_rules: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("start URL is required")]
    MissingStartUrl,
    #[error("start URL is not a valid URL: {0}")]
    InvalidStartUrl(String),
    #[error("start URL must use http or https, got {0}")]
    UnsupportedScheme(String),
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
    #[error("request delay must be a finite, non-negative number of seconds, got {0}")]
    InvalidRequestDelay(f64),
    #[error("extraction rule {index} is missing its {field}")]
    IncompleteRule { index: usize, field: &'static str },
}

impl CrawlConfig {
    pub fn new(start_url: impl Into<String>) -> Self {
        Self {
            start_url: start_url.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let start_url = self.start_url.trim();
        if start_url.is_empty() {
            return Err(ValidationError::MissingStartUrl);
        }
        let parsed =
            Url::parse(start_url).map_err(|err| ValidationError::InvalidStartUrl(err.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ValidationError::UnsupportedScheme(parsed.scheme().to_string()));
        }

        check_range("maxDepth", self.max_depth, 0, MAX_DEPTH_LIMIT)?;
        check_range("maxPages", self.max_pages, 0, MAX_PAGES_LIMIT)?;
        check_range(
            "concurrentThreads",
            self.concurrent_threads,
            1,
            MAX_CONCURRENT_THREADS,
        )?;
        if !self.request_delay.is_finite() || self.request_delay < 0.0 {
            return Err(ValidationError::InvalidRequestDelay(self.request_delay));
        }

        for (index, rule) in self.extraction_rules.iter().enumerate() {
            if rule.rule_name.trim().is_empty() {
                return Err(ValidationError::IncompleteRule {
                    index,
                    field: "ruleName",
                });
            }
            if rule.selector_value.trim().is_empty() {
                return Err(ValidationError::IncompleteRule {
                    index,
                    field: "selectorValue",
                });
            }
        }
        Ok(())
    }

    pub fn is_depth_unbounded(&self) -> bool {
        self.max_depth == 0
    }

    pub fn is_page_count_unbounded(&self) -> bool {
        self.max_pages == 0
    }
}

fn check_range(field: &'static str, value: u32, min: u32, max: u32) -> Result<(), ValidationError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}
