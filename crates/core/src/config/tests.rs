use std::collections::HashMap;
use std::time::Duration;

use super::{format_duration, parse_duration, HarvestConfig, DEFAULT_METRICS_TOPIC};

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn parse_empty_toml_uses_defaults() {
    let cfg: HarvestConfig = toml::from_str("").unwrap();
    cfg.validate().unwrap();
    assert_eq!(cfg.vendor.request_quota, 1000);
    assert_eq!(cfg.schedule.gather_window, Duration::from_secs(60));
    assert_eq!(cfg.writer.topic, DEFAULT_METRICS_TOPIC);
    assert_eq!(cfg.writer.max_inflight_writes, 256);
    assert!(cfg.directory.tenant_allow_list.is_empty());
}

#[test]
fn parse_full_toml() {
    let toml = r#"
[directory]
path = "/etc/harvest/tenants.json"
tenant_allow_list = ["1", "2"]

[vendor]
endpoint = "https://metrics.example.com"
request_quota = 50
quota_window = "1m"
max_requests_per_second = 5
request_timeout = "2s500ms"

[schedule]
gather_window = "30s"
account_reload_interval = "10m"
catalog_reload_interval = "2m"
retry_interval = "15s"
product_filter_list = ["ecs", "rds"]

[writer]
endpoint = "tcp://bus:5555"
topic = "spot-metrics"
"#;
    let cfg: HarvestConfig = toml::from_str(toml).unwrap();
    cfg.validate().unwrap();
    assert_eq!(cfg.directory.tenant_allow_list, vec!["1", "2"]);
    assert_eq!(cfg.vendor.request_quota, 50);
    assert_eq!(cfg.vendor.request_timeout, Duration::from_millis(2_500));
    assert_eq!(cfg.schedule.account_reload_interval, Duration::from_secs(600));
    assert_eq!(cfg.schedule.product_filter_list, vec!["ecs", "rds"]);
    assert_eq!(cfg.writer.topic, "spot-metrics");
}

#[test]
fn reject_zero_quota() {
    let toml = r#"
[vendor]
request_quota = 0
"#;
    let cfg: HarvestConfig = toml::from_str(toml).unwrap();
    let err = cfg.validate().unwrap_err().to_string();
    assert!(err.contains("request_quota"), "unexpected error: {err}");
}

#[test]
fn reject_zero_gather_window() {
    let toml = r#"
[schedule]
gather_window = "0s"
"#;
    let cfg: HarvestConfig = toml::from_str(toml).unwrap();
    assert!(cfg.validate().is_err());
}

#[test]
fn reject_bad_duration_string() {
    let toml = r#"
[schedule]
gather_window = "soon"
"#;
    assert!(toml::from_str::<HarvestConfig>(toml).is_err());
}

#[test]
fn overrides_replace_values() {
    let mut cfg = HarvestConfig::default();
    cfg.apply_overrides(lookup(&[
        ("HARVEST_GATHER_WINDOW", "20s"),
        ("HARVEST_REQUEST_QUOTA", "7"),
        ("HARVEST_TENANT_ALLOW_LIST", "10, 11,,12"),
        ("HARVEST_WRITER_TOPIC", "custom"),
    ]));
    assert_eq!(cfg.schedule.gather_window, Duration::from_secs(20));
    assert_eq!(cfg.vendor.request_quota, 7);
    assert_eq!(cfg.directory.tenant_allow_list, vec!["10", "11", "12"]);
    assert_eq!(cfg.writer.topic, "custom");
}

#[test]
fn invalid_overrides_are_ignored() {
    let mut cfg = HarvestConfig::default();
    cfg.apply_overrides(lookup(&[
        ("HARVEST_GATHER_WINDOW", "later"),
        ("HARVEST_REQUEST_QUOTA", "-3"),
    ]));
    assert_eq!(cfg.schedule.gather_window, Duration::from_secs(60));
    assert_eq!(cfg.vendor.request_quota, 1000);
}

#[test]
fn parse_duration_components() {
    assert_eq!(parse_duration("90").unwrap(), Duration::from_secs(90));
    assert_eq!(parse_duration("90s").unwrap(), Duration::from_secs(90));
    assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5_400));
    assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
    assert_eq!(parse_duration("1d").unwrap(), Duration::from_secs(86_400));
    assert!(parse_duration("").is_err());
    assert!(parse_duration("5x").is_err());
    assert!(parse_duration("m5").is_err());
}

#[test]
fn format_duration_parses_back() {
    for d in [
        Duration::from_millis(250),
        Duration::from_secs(45),
        Duration::from_secs(120),
        Duration::from_secs(7_200),
        Duration::from_millis(2_500),
    ] {
        assert_eq!(parse_duration(&format_duration(d)).unwrap(), d);
    }
}

#[test]
fn shipped_config_parses_and_validates() {
    let cfg: HarvestConfig =
        toml::from_str(include_str!("../../../../config/harvester.toml")).unwrap();
    cfg.validate().unwrap();
    assert_eq!(cfg.schedule.account_reload_interval, Duration::from_secs(300));
    assert_eq!(cfg.writer.topic, DEFAULT_METRICS_TOPIC);
}

#[test]
fn zero_inflight_writes_rejected() {
    let mut cfg = HarvestConfig::default();
    cfg.apply_overrides(lookup(&[("HARVEST_WRITER_MAX_INFLIGHT_WRITES", "0")]));
    let err = cfg.validate().unwrap_err().to_string();
    assert!(err.contains("max_inflight_writes"), "{err}");
}
