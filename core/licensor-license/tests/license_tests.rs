mod common;

use chrono::{Duration, TimeZone, Utc};
use licensor_license::{
    InactiveReason, LicenseError, LicenseStatus, NewLicense, Plan, SiteUrl,
};

// ── Plan ─────────────────────────────────────────────────────────

#[test]
fn plan_defaults() {
    assert_eq!(Plan::basic().default_max_sites(), 1);
    assert_eq!(Plan::new("pro").unwrap().default_max_sites(), 5);
    assert_eq!(Plan::new("agency").unwrap().default_max_sites(), 25);
    assert_eq!(Plan::basic().default_crawl_credits(), 1_000);
    assert_eq!(Plan::new("agency").unwrap().default_crawl_credits(), 100_000);
}

#[test]
fn unknown_plan_falls_back_to_baseline_defaults() {
    let plan = Plan::new("enterprise-2025").unwrap();
    assert_eq!(plan.name(), "enterprise-2025");
    assert_eq!(plan.default_max_sites(), Plan::basic().default_max_sites());
    assert_eq!(plan.default_crawl_credits(), Plan::basic().default_crawl_credits());
}

#[test]
fn plan_name_is_normalized() {
    assert_eq!(Plan::new("  PRO ").unwrap(), Plan::new("pro").unwrap());
}

#[test]
fn plan_name_rejects_garbage() {
    let too_long = "x".repeat(33);
    for bad in ["", "   ", "has space", "semi;colon", too_long.as_str()] {
        assert!(matches!(Plan::new(bad), Err(LicenseError::Validation(_))), "{bad:?}");
    }
}

#[test]
fn plan_serializes_as_name() {
    let json = serde_json::to_string(&Plan::new("pro").unwrap()).unwrap();
    assert_eq!(json, "\"pro\"");
    assert_eq!(Plan::default(), Plan::basic());
}

// ── Status / expiry ──────────────────────────────────────────────

#[test]
fn status_serde() {
    assert_eq!(serde_json::to_string(&LicenseStatus::Active).unwrap(), "\"active\"");
    let parsed: LicenseStatus = serde_json::from_str("\"disabled\"").unwrap();
    assert_eq!(parsed, LicenseStatus::Disabled);
    assert_eq!(LicenseStatus::default(), LicenseStatus::Active);
}

#[test]
fn inactive_reason_prefers_disabled_over_expired() {
    let manager = common::manager();
    let mut license = common::issue_expired(&manager).license;
    let now = Utc::now();

    assert!(license.is_expired_at(now));
    assert!(matches!(license.inactive_reason(now), Some(InactiveReason::Expired { .. })));

    license.status = LicenseStatus::Disabled;
    assert_eq!(license.inactive_reason(now), Some(InactiveReason::Disabled));
}

#[test]
fn perpetual_license_never_expires() {
    let manager = common::manager();
    let license = common::issue(&manager, 1).license;
    let far_future = Utc::now() + Duration::days(365 * 100);
    assert!(!license.is_expired_at(far_future));
    assert_eq!(license.inactive_reason(far_future), None);
}

#[test]
fn expiry_boundary_is_inclusive() {
    let manager = common::manager();
    let at = Utc::now() + Duration::days(30);
    let license = manager
        .create(NewLicense::new("a@b.co").expires_at(at))
        .unwrap()
        .license;
    assert!(!license.is_expired_at(at - Duration::seconds(1)));
    assert!(license.is_expired_at(at));
}

#[test]
fn inactive_reason_serializes_tagged() {
    let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
    let json = serde_json::to_value(InactiveReason::Expired { at }).unwrap();
    assert_eq!(json["reason"], "expired");
    assert_eq!(json["at"], "2025-01-02T03:04:05Z");

    let json = serde_json::to_value(InactiveReason::Disabled).unwrap();
    assert_eq!(json, serde_json::json!({ "reason": "disabled" }));
}

#[test]
fn inactive_reason_display() {
    let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
    assert_eq!(InactiveReason::Disabled.to_string(), "disabled");
    assert_eq!(
        InactiveReason::Expired { at }.to_string(),
        "expired on 2025-01-02 03:04:05 UTC"
    );
}

#[test]
fn new_license_deserializes_with_only_email() {
    let request: NewLicense = serde_json::from_str(r#"{"email":"x@y.z"}"#).unwrap();
    assert_eq!(request, NewLicense::new("x@y.z"));
}

// ── SiteUrl ──────────────────────────────────────────────────────

#[test]
fn site_url_variants_collapse_to_one_seat() {
    let variants = [
        "https://example.com",
        "http://example.com/",
        "example.com",
        "  HTTPS://WWW.Example.COM//  ",
        "https://example.com/?utm_source=plugin#top",
    ];
    for v in variants {
        assert_eq!(SiteUrl::parse(v).unwrap().as_str(), "example.com", "{v}");
    }
}

#[test]
fn site_url_keeps_path_and_custom_port() {
    assert_eq!(
        SiteUrl::parse("https://example.com/blog/").unwrap().as_str(),
        "example.com/blog"
    );
    assert_eq!(
        SiteUrl::parse("http://localhost:8080/wp").unwrap().as_str(),
        "localhost:8080/wp"
    );
    assert_eq!(SiteUrl::parse("https://example.com:443").unwrap().as_str(), "example.com");
}

#[test]
fn site_url_distinguishes_subdomains_and_paths() {
    let a = SiteUrl::parse("shop.example.com").unwrap();
    let b = SiteUrl::parse("example.com/shop").unwrap();
    let c = SiteUrl::parse("example.com").unwrap();
    assert_ne!(a, b);
    assert_ne!(b, c);
    assert_ne!(a, c);
}

#[test]
fn site_url_keeps_bare_www_host() {
    assert_eq!(SiteUrl::parse("www.com").unwrap().as_str(), "www.com");
}

#[test]
fn site_url_rejects_bad_input() {
    for bad in ["", "   ", "ftp://example.com", "https://", "exa mple.com", "mailto:x@y.z", "https://user:pw@example.com"] {
        assert!(matches!(SiteUrl::parse(bad), Err(LicenseError::Validation(_))), "{bad:?}");
    }
}
