// Integration test for the CSV workbook sink and snapshot files
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use vidsift::export::SnapshotWriter;
use vidsift::filtering::{EnhancedRecord, NullDetector, ResultEnhancer};
use vidsift::patterns::PatternRegistry;
use vidsift::record::VideoRecord;
use vidsift::sink::{CsvWorkbook, TabularSink, COLUMNS};

fn enhanced(values: &[Value]) -> Vec<EnhancedRecord> {
    let enhancer = ResultEnhancer::new(
        Arc::new(PatternRegistry::builtin().unwrap()),
        Arc::new(NullDetector),
    );
    let now = Utc.with_ymd_and_hms(2024, 8, 5, 12, 0, 0).unwrap();
    values
        .iter()
        .map(|v| enhancer.enhance(&VideoRecord::from_value(v).unwrap(), now))
        .collect()
}

fn sample() -> Vec<EnhancedRecord> {
    enhanced(&[
        json!({
            "id": "101",
            "description": "渋谷の夜, 最高",
            "viewCount": "1.2M",
            "likeCount": 60000,
            "createTime": "2024-08-05T10:30:00",
            "hashtags": ["渋谷", "夜"],
            "isVerified": false,
            "language": "ja",
        }),
        json!({
            "id": "102",
            "description": "ラーメン\n二郎",
            "viewCount": 800000,
            "likeCount": "oops",
            "createTime": 1722852000,
            "isVerified": true,
            "language": "ja",
        }),
    ])
}

fn read_lines(path: &std::path::Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn test_upload_appends_after_existing_rows() {
    let temp = TempDir::new().unwrap();
    let workbook = CsvWorkbook::open(temp.path().join("sheets"), "Summary").unwrap();
    let records = sample();

    let first = workbook.upload(&records[..1], "Videos", false).unwrap();
    assert_eq!(first.count, 1);
    assert_eq!(first.start_row, 2);
    assert!(first.url.starts_with("file://"));

    let second = workbook.upload(&records, "Videos", false).unwrap();
    assert_eq!(second.count, 2);
    assert_eq!(second.start_row, 3);

    let content = fs::read_to_string(workbook.sheet_path("Videos").unwrap()).unwrap();
    assert_eq!(content.lines().next().unwrap(), COLUMNS.join(","));
    assert_eq!(content.matches("video_id").count(), 1);
    // quoted description keeps its embedded newline
    assert!(content.contains("\"ラーメン\n二郎\""));
    assert!(content.contains("\"渋谷の夜, 最高\""));
    assert!(content.contains("\"#渋谷, #夜\""));
}

#[test]
fn test_upload_clear_existing() {
    let temp = TempDir::new().unwrap();
    let workbook = CsvWorkbook::open(temp.path(), "Summary").unwrap();
    let records = sample();

    workbook.upload(&records, "Videos", false).unwrap();
    let receipt = workbook.upload(&records[..1], "Videos", true).unwrap();
    assert_eq!(receipt.start_row, 2);

    let lines = read_lines(&workbook.sheet_path("Videos").unwrap());
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with("101,,,"));
    assert!(lines[1].contains(",1200000,60000,0,0,2024-08-05 10:30:00,"));
}

#[test]
fn test_rejects_bad_sheet_names() {
    let temp = TempDir::new().unwrap();
    let workbook = CsvWorkbook::open(temp.path(), "Summary").unwrap();

    assert!(workbook.upload(&sample(), "../escape", false).is_err());
    assert!(workbook.upload(&sample(), "", false).is_err());
}

#[test]
fn test_summary_sheet() {
    let temp = TempDir::new().unwrap();
    let workbook = CsvWorkbook::open(temp.path(), "Summary").unwrap();

    let receipt = workbook.write_summary(&sample()).unwrap();
    assert_eq!(receipt.stats.total, 2);
    assert_eq!(receipt.stats.max_views, 1_200_000);
    assert_eq!(receipt.stats.min_views, 800_000);
    assert_eq!(receipt.stats.mean_views, 1_000_000.0);
    // malformed likes count as 0
    assert_eq!(receipt.stats.mean_likes, 30_000.0);
    assert_eq!(receipt.stats.verified_count, 1);

    let lines = read_lines(&workbook.sheet_path("Summary").unwrap());
    assert_eq!(lines[0], "metric,value");
    assert!(lines.contains(&"total_videos,2".to_string()));
    assert!(lines.contains(&"mean_views,\"1,000,000\"".to_string()));

    // rewriting replaces the previous summary
    workbook.write_summary(&sample()[..1]).unwrap();
    let lines = read_lines(&workbook.sheet_path("Summary").unwrap());
    assert!(lines.contains(&"total_videos,1".to_string()));
}

#[test]
fn test_snapshot_files() {
    let temp = TempDir::new().unwrap();
    let writer = SnapshotWriter::new(temp.path().join("out"), "viral_videos", true, true);
    let at = Utc.with_ymd_and_hms(2024, 8, 5, 12, 0, 0).unwrap();

    let saved = writer.save(&sample(), at).unwrap();
    let csv = saved.csv.clone().unwrap();
    let json = saved.json.clone().unwrap();
    assert_eq!(
        csv.file_name().unwrap().to_str().unwrap(),
        "viral_videos_20240805_120000.csv"
    );

    let csv_content = fs::read_to_string(&csv).unwrap();
    assert!(csv_content.starts_with('\u{feff}'));
    assert!(csv_content.contains("2024-08-05 12:00:00"));

    let parsed: Vec<Value> = serde_json::from_str(&fs::read_to_string(&json).unwrap()).unwrap();
    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed[0]["id"], "101");
    assert_eq!(parsed[0]["detected_language"], "unknown");
    assert!(parsed[0]["filtered_at"].is_string());
    assert_eq!(parsed[0]["hours_since_post"], 1.5);

    // same timestamp again must not overwrite
    assert!(writer.save(&sample(), at).is_err());
}

#[test]
fn test_snapshot_formats_toggle() {
    let temp = TempDir::new().unwrap();
    let at = Utc.with_ymd_and_hms(2024, 8, 5, 12, 0, 0).unwrap();

    let saved = SnapshotWriter::new(temp.path(), "v", false, true)
        .save(&sample(), at)
        .unwrap();
    assert!(saved.json.is_none());
    assert!(saved.csv.is_some());

    let saved = SnapshotWriter::new(temp.path(), "none", false, false)
        .save(&sample(), at)
        .unwrap();
    assert!(saved.is_empty());
}
