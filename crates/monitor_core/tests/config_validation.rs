use monitor_core::{CrawlConfig, ExtractionRule, SelectorType, ValidationError};
use pretty_assertions::assert_eq;

#[test]
fn default_config_with_url_is_valid_and_unbounded() {
    let config = CrawlConfig::new("https://example.com");
    assert_eq!(config.validate(), Ok(()));
    assert!(config.is_depth_unbounded());
    assert!(config.is_page_count_unbounded());
    assert_eq!(config.concurrent_threads, 5);
    assert_eq!(config.request_delay, 1.0);
}

#[test]
fn blank_start_url_is_rejected() {
    let config = CrawlConfig::new("   ");
    assert_eq!(config.validate(), Err(ValidationError::MissingStartUrl));
}

#[test]
fn non_http_scheme_is_rejected() {
    let config = CrawlConfig::new("ftp://example.com/pub");
    assert_eq!(
        config.validate(),
        Err(ValidationError::UnsupportedScheme("ftp".to_string()))
    );
    assert!(matches!(
        CrawlConfig::new("not a url").validate(),
        Err(ValidationError::InvalidStartUrl(_))
    ));
}

#[test]
fn numeric_fields_are_range_checked() {
    let config = CrawlConfig {
        max_depth: 51,
        ..CrawlConfig::new("https://example.com")
    };
    assert_eq!(
        config.validate(),
        Err(ValidationError::OutOfRange {
            field: "maxDepth",
            value: 51,
            min: 0,
            max: 50
        })
    );

    let config = CrawlConfig {
        concurrent_threads: 0,
        ..CrawlConfig::new("https://example.com")
    };
    assert!(matches!(
        config.validate(),
        Err(ValidationError::OutOfRange {
            field: "concurrentThreads",
            ..
        })
    ));

    let config = CrawlConfig {
        request_delay: -0.5,
        ..CrawlConfig::new("https://example.com")
    };
    assert_eq!(
        config.validate(),
        Err(ValidationError::InvalidRequestDelay(-0.5))
    );
}

#[test]
fn extraction_rules_need_name_and_selector() {
    let config = CrawlConfig {
        extraction_rules: vec![
            ExtractionRule::css("title", "h1"),
            ExtractionRule::xpath("links", " "),
        ],
        ..CrawlConfig::new("https://example.com")
    };
    assert_eq!(
        config.validate(),
        Err(ValidationError::IncompleteRule {
            index: 1,
            field: "selectorValue"
        })
    );
}

#[test]
fn config_serializes_with_wire_field_names() {
    let config = CrawlConfig {
        cookies: [("sid".to_string(), "abc".to_string())].into_iter().collect(),
        extraction_rules: vec![ExtractionRule::xpath("links", "//a").with_attribute("href")],
        ..CrawlConfig::new("https://example.com")
    };

    let value = serde_json::to_value(&config).expect("serialize");
    assert_eq!(value["startUrl"], "https://example.com");
    assert_eq!(value["enableJavaScript"], false);
    assert_eq!(value["cookies"]["sid"], "abc");
    assert_eq!(value["extractionRules"][0]["selectorType"], "XPATH");
    assert_eq!(value["extractionRules"][0]["attributeToExtract"], "href");

    let rule: ExtractionRule = serde_json::from_str(
        r#"{"ruleName":"t","selectorType":"CSS","selectorValue":"h1"}"#,
    )
    .expect("rule");
    assert_eq!(rule.selector_type, SelectorType::Css);
    assert_eq!(rule.attribute_to_extract, "text");
}
