// Integration test for the filtering pipeline with realistic records
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::Span;
use vidsift::config::{FilterConfig, ScoringConfig};
use vidsift::filtering::{
    FilterOutcome, FilterPipeline, LanguageDetector, RejectionReason, WhatlangDetector,
};
use vidsift::patterns::PatternRegistry;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 8, 5, 12, 0, 0).unwrap()
}

fn at(hours_ago: i64) -> String {
    (now() - Duration::hours(hours_ago))
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string()
}

fn pipeline_with(filter: FilterConfig) -> FilterPipeline {
    let detector: Arc<dyn LanguageDetector> = Arc::new(WhatlangDetector::default());
    FilterPipeline::new(
        &filter,
        &ScoringConfig::default(),
        Arc::new(PatternRegistry::builtin().unwrap()),
        detector,
        Span::none(),
    )
}

fn pipeline() -> FilterPipeline {
    pipeline_with(FilterConfig::default())
}

fn tokyo_video() -> Value {
    json!({
        "id": "7400000000000000001",
        "description": "今日の東京は暑いですね！#東京 #日本",
        "viewCount": 1000000,
        "likeCount": 50000,
        "commentCount": 1000,
        "createTime": at(0),
        "isVerified": false,
        "followerCount": 5000,
    })
}

#[test]
fn test_end_to_end_scenario() {
    let records = vec![
        tokyo_video(),
        json!({
            "id": "7400000000000000002",
            "description": "Amazing trip to Tokyo! #travel #tourist #japan",
            "viewCount": 800000,
            "createTime": at(30),
            "isVerified": false,
        }),
        json!({
            "id": "7400000000000000003",
            "description": "ラーメン美味しい！#ラーメン #グルメ",
            "viewCount": 300000,
            "createTime": at(0),
            "isVerified": true,
            "followerCount": 200000,
        }),
    ];

    let report = pipeline().run_at(&records, now());

    assert_eq!(
        report.outcomes,
        vec![
            FilterOutcome::Accepted,
            FilterOutcome::Rejected(RejectionReason::TimeRange),
            FilterOutcome::Rejected(RejectionReason::ViewCount),
        ]
    );

    let stats = &report.stats;
    assert_eq!(stats.total_input, 3);
    assert_eq!(stats.final_output, 1);
    assert_eq!(stats.rejection_histogram[&RejectionReason::TimeRange], 1);
    assert_eq!(stats.rejection_histogram[&RejectionReason::ViewCount], 1);
    assert_eq!(stats.rejection_histogram.len(), 2);
    assert!((stats.filter_rate() - 100.0 / 3.0).abs() < 1e-9);
    assert_eq!(stats.total_input, stats.final_output + stats.total_rejected());

    // per-stage pass counters
    assert_eq!(stats.passed_time, 2);
    assert_eq!(stats.passed_views, 1);
    assert_eq!(stats.passed_quality, 1);

    let accepted = &report.accepted[0];
    assert_eq!(accepted.record.id, "7400000000000000001");
    assert!((accepted.japanese_score - 15.0 / 19.0).abs() < 1e-9);
    assert_eq!(accepted.keyword_score, 1.0);
    assert!((accepted.engagement_rate - 0.051).abs() < 1e-12);
    assert_eq!(accepted.hours_since_post, Some(0.0));

    let value = serde_json::to_value(accepted).unwrap();
    assert_eq!(value["id"], "7400000000000000001");
    assert_eq!(value["followerCount"], 5000);
    assert!(value["filtered_at"].as_str().unwrap().starts_with("2024-08-05T12:00:00"));
}

#[test]
fn test_verified_toggle() {
    let mut video = tokyo_video();
    video["isVerified"] = json!(true);

    let report = pipeline().run_at(&[video.clone()], now());
    assert_eq!(
        report.outcomes,
        vec![FilterOutcome::Rejected(RejectionReason::VerifiedAccount)]
    );

    let lenient = pipeline_with(FilterConfig {
        exclude_verified: false,
        ..FilterConfig::default()
    });
    let report = lenient.run_at(&[video], now());
    assert_eq!(report.outcomes, vec![FilterOutcome::Accepted]);
}

#[test]
fn test_time_window() {
    let mut fresh = tokyo_video();
    fresh["createTime"] = json!(at(23));
    let mut stale = tokyo_video();
    stale["createTime"] = json!(at(30));
    let mut future = tokyo_video();
    future["createTime"] = json!(at(-3));
    let mut epoch = tokyo_video();
    epoch["createTime"] = json!((now() - Duration::hours(1)).timestamp());

    let report = pipeline().run_at(&[fresh, stale, future, epoch], now());
    assert_eq!(
        report.outcomes,
        vec![
            FilterOutcome::Accepted,
            FilterOutcome::Rejected(RejectionReason::TimeRange),
            FilterOutcome::Accepted,
            FilterOutcome::Accepted,
        ]
    );
}

#[test]
fn test_region_gate() {
    let mut tourist = tokyo_video();
    tourist["description"] = json!("東京 trip 楽しかった");

    let mut tagged_region = tourist.clone();
    tagged_region["region"] = json!("jp");

    let report = pipeline().run_at(&[tourist, tagged_region], now());
    assert_eq!(
        report.outcomes,
        vec![
            FilterOutcome::Rejected(RejectionReason::Region),
            FilterOutcome::Accepted,
        ]
    );
}

#[test]
fn test_failure_policy_asymmetry() {
    // malformed follower count: region scoring errors and the gate fails open
    let mut video = tokyo_video();
    video["description"] = json!("渋谷で夜ごはん食べた");
    video["followerCount"] = json!("??");

    // malformed view count: fail closed
    let mut broken_views = tokyo_video();
    broken_views["viewCount"] = json!("lots");

    let report = pipeline().run_at(&[video, broken_views], now());
    assert_eq!(
        report.outcomes,
        vec![
            FilterOutcome::Accepted,
            FilterOutcome::Rejected(RejectionReason::ViewCount),
        ]
    );
}

#[test]
fn test_quality_gate() {
    let mut spam = tokyo_video();
    spam["description"] = json!("東京ｗｗｗｗｗｗｗｗｗｗｗ");
    let mut link = tokyo_video();
    link["description"] = json!("東京の動画はこちら http://example.com");
    let mut low_engagement = tokyo_video();
    low_engagement["likeCount"] = json!(100);
    low_engagement["commentCount"] = json!(10);

    let report = pipeline().run_at(&[spam, link, low_engagement], now());
    assert_eq!(
        report.outcomes,
        vec![FilterOutcome::Rejected(RejectionReason::Quality); 3]
    );
}

#[test]
fn test_malformed_batch_never_aborts() {
    let records = vec![
        json!("not a record"),
        json!(null),
        json!({}),
        json!({ "description": "日本", "viewCount": 1000000 }),
        tokyo_video(),
    ];

    let report = pipeline().run_at(&records, now());
    assert_eq!(report.outcomes.len(), records.len());
    assert_eq!(
        report.outcomes[..4],
        [
            FilterOutcome::Rejected(RejectionReason::ProcessingError),
            FilterOutcome::Rejected(RejectionReason::ProcessingError),
            FilterOutcome::Rejected(RejectionReason::TimeRange),
            FilterOutcome::Rejected(RejectionReason::TimeRange),
        ]
    );
    assert_eq!(report.outcomes[4], FilterOutcome::Accepted);
    assert_eq!(
        report.stats.total_input,
        report.stats.final_output + report.stats.total_rejected()
    );
}

#[test]
fn test_idempotent_runs() {
    let records = vec![tokyo_video(), json!({ "viewCount": "2M" }), json!([1])];
    let pipeline = pipeline();

    let first = pipeline.run_at(&records, now());
    let second = pipeline.run_at(&records, now());

    assert_eq!(first.outcomes, second.outcomes);
    assert_eq!(first.stats.final_output, second.stats.final_output);
    assert_eq!(
        first.stats.rejection_histogram,
        second.stats.rejection_histogram
    );
    assert_eq!(
        first.accepted[0].japanese_score,
        second.accepted[0].japanese_score
    );
}

#[test]
fn test_empty_batch() {
    let report = pipeline().run_at(&[], now());
    assert!(report.outcomes.is_empty());
    assert_eq!(report.stats.filter_rate(), 0.0);
}

#[test]
fn test_configurable_thresholds() {
    let strict = pipeline_with(FilterConfig {
        min_views: 2_000_000,
        ..FilterConfig::default()
    });
    let report = strict.run_at(&[tokyo_video()], now());
    assert_eq!(
        report.outcomes,
        vec![FilterOutcome::Rejected(RejectionReason::ViewCount)]
    );
}
