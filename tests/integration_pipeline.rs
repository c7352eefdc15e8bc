/*!
 * End-to-end pipeline tests
 *
 * Writes visit exports to temporary files, reads them back through the CSV
 * reader, computes reports and exports them again.
 */

use chrono::NaiveDate;
use provider_perf::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const CHINESE_EXPORT: &str = "\
诊疗医生,身份证号,就诊日期,建档日期,签约日期,是否本机构建档,是否外机构建档,是否本机构签约,是否外机构签约,团队名称
张医生,110101199001010011,2024-03-01 08:30:00,2024-03-01 08:45:00,2024-03-01 09:00:00,是,否,是,否,一组
张医生,110101199001010022,2024-03-01 09:10:00,2023-11-20 10:00:00,,是,否,否,否,一组
张医生,110101199001010033,2024-03-04 10:00:00,,,否,是,否,是,一组
李医生,110101199001010044,2024-03-04 14:00:00,2024-03-04 14:20:00,2024-03-04 14:30:00,是,否,是,否,健康小屋
李医生,110101199001010055,2024-03-05 15:00:00,,,否,否,否,否,健康小屋
王医生,110101199001010066,2024-03-06 09:00:00,,2024-03-06,否,否,是,否,二组
王医生,110101199001010077,2024-03-06 09:30:00,2024-03-06,,是,否,否,否,二组
王医生,110101199001010088,,,,是,否,否,否,二组
赵医生,110101199001010099,2024-04-02 09:00:00,2024-04-02,,是,否,否,否,二组
";

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn march() -> DateWindow {
    DateWindow::new(day(2024, 3, 1), day(2024, 3, 31))
}

fn write_input(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_csv_to_report() {
    let dir = TempDir::new().unwrap();
    let input = write_input(dir.path(), "visits.csv", CHINESE_EXPORT);

    let table = VisitReader::new().load(&input).unwrap();
    let engine = PerformanceEngine::with_defaults();
    let report = engine.compute(&table, march()).unwrap();

    assert_eq!(report.normalization.rows_read, 9);
    assert_eq!(report.normalization.rows_dropped, 1);
    assert_eq!(report.records_in_window, 7);

    let providers: Vec<&str> = report.statistics.iter().map(|s| s.provider.as_str()).collect();
    assert_eq!(providers.len(), 3);
    assert!(!providers.contains(&"赵医生"));

    let zhang = report.get("张医生").unwrap();
    assert_eq!(zhang.visit_count, 3);
    assert_eq!(zhang.registered_locally, 2);
    assert_eq!(zhang.remaining_unregistered, 1);
    assert_eq!(zhang.signed_locally, 1);
    assert_eq!(zhang.signed_externally, 1);
    assert_eq!(zhang.new_registrations.unwrap().count, 1);

    // health-hut rows are counted whether signed or not, and their signings
    // are carved out of the main rate
    let li = report.get("李医生").unwrap();
    assert_eq!(li.signed_locally, 0);
    assert_eq!(li.health_hut_signed, 2);
    assert_eq!(li.remaining_unsigned, 2);
    assert_eq!(li.signing_rate, 0.0);
    let li_signings = li.new_signings.unwrap();
    assert_eq!(li_signings.count, 0);
    assert_eq!(li_signings.health_hut_count, 1);

    let wang = report.get("王医生").unwrap();
    assert_eq!(wang.visit_count, 2);
    assert_eq!(wang.new_registrations.unwrap().count, 1);
    assert_eq!(wang.new_signings.unwrap().count, 1);

    // registration rates: 张 2/3, 李 1/2, 王 1/2
    assert_eq!(zhang.registration_rank, 1);
    assert_eq!(li.registration_rank, 2);
    assert_eq!(wang.registration_rank, 2);

    assert_eq!(report.subsets.new_registration_count(), 3);
    assert_eq!(report.subsets.new_signing_count(), 2);
    assert_eq!(report.subsets.health_hut_signing_count(), 1);
}

#[test]
fn test_rank_sets_are_dense() {
    let dir = TempDir::new().unwrap();
    let input = write_input(dir.path(), "visits.csv", CHINESE_EXPORT);
    let table = VisitReader::new().load(&input).unwrap();
    let report = PerformanceEngine::with_defaults().compute(&table, march()).unwrap();

    for metric in RankedMetric::ALL {
        let mut ranks: Vec<u32> = report.statistics.iter().filter_map(|s| metric.rank(s)).collect();
        let mut values: Vec<f64> = report.statistics.iter().filter_map(|s| metric.value(s)).collect();
        ranks.sort_unstable();
        ranks.dedup();
        values.sort_by(|a, b| a.total_cmp(b));
        values.dedup();
        assert_eq!(ranks, (1..=values.len() as u32).collect::<Vec<_>>(), "{:?}", metric);
    }
}

#[test]
fn test_export_round_trip_through_csv() {
    let dir = TempDir::new().unwrap();
    let input = write_input(dir.path(), "visits.csv", CHINESE_EXPORT);
    let table = VisitReader::new().load(&input).unwrap();
    let report = PerformanceEngine::with_defaults().compute(&table, march()).unwrap();

    let out = dir.path().join("export");
    let files = CsvExporter::new().export(&report, &out, "clinic").unwrap();
    assert_eq!(files.len(), 4);

    let exported = VisitReader::new().load(&files[0]).unwrap();
    assert_eq!(exported.headers, report.table().headers(HeaderStyle::English));
    assert_eq!(exported.len(), report.statistics.len());
    assert_eq!(exported.cell(0, 0), Some("张医生"));

    let registrations = VisitReader::new().load(&files[1]).unwrap();
    assert_eq!(registrations.len(), report.subsets.new_registration_count());

    let json = JsonExporter::new().export(&report, &out, "clinic").unwrap();
    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&json[0]).unwrap()).unwrap();
    assert_eq!(value["statistics"]["rows"].as_array().unwrap().len(), 3);
}

#[test]
fn test_english_headers_without_date_columns() {
    let input = "\
provider,patient_id,visit_date,registered_locally,registered_externally,signed_locally,signed_externally
A,1,2024-03-02,1,0,0,0
A,2,2024-03-02,0,1,1,0
B,3,2024-03-03,0,0,0,0
";
    let table = VisitReader::new().read_from(input.as_bytes()).unwrap();
    let report = PerformanceEngine::with_defaults().compute(&table, march()).unwrap();

    assert_eq!(report.groups, MetricGroups::default());
    assert!(report.subsets.new_signings.is_none());
    assert!(report.statistics.iter().all(|s| s.new_registrations.is_none()));

    let a = report.get("A").unwrap();
    assert_eq!(a.registration_rate, 0.5);
    assert_eq!(a.signing_rate, 0.5);

    let dir = TempDir::new().unwrap();
    let files = CsvExporter::new().export(&report, dir.path(), "plain").unwrap();
    assert_eq!(files.len(), 1);
}

#[test]
fn test_schema_error_names_all_missing_columns() {
    let input = "诊疗医生,就诊日期\n张医生,2024-03-01\n";
    let table = VisitReader::new().read_from(input.as_bytes()).unwrap();
    let err = PerformanceEngine::with_defaults().compute(&table, march()).unwrap_err();

    match err {
        PerfError::Schema { missing, .. } => assert_eq!(missing.len(), 5),
        other => panic!("expected schema error, got {:?}", other),
    }
}

#[test]
fn test_custom_aliases_and_labels_from_config_file() {
    let dir = TempDir::new().unwrap();
    let config_path = write_input(
        dir.path(),
        "config.toml",
        "health_hut_label = \"Health Hut\"\naffirmative_marker = \"Y\"\n\n[column_aliases]\nprovider = [\"Doctor\"]\n",
    );
    let config = EngineConfig::from_file(&config_path).unwrap();

    let input = "\
Doctor,patient_id,visit_date,signing_date,registered_locally,registered_externally,signed_locally,signed_externally,team_name
Ann,1,2024-03-02,2024-03-02,Y,N,Y,N,Health Hut
Ann,2,2024-03-02,2024-03-02,N,N,Y,N,Outreach
";
    let table = VisitReader::new().read_from(input.as_bytes()).unwrap();
    let report = PerformanceEngine::new(config).compute(&table, march()).unwrap();

    let ann = report.get("Ann").unwrap();
    assert_eq!(ann.registered_locally, 1);
    assert_eq!(ann.signed_locally, 1);
    assert_eq!(ann.health_hut_signed, 1);
    assert_eq!(ann.new_signings.unwrap().count, 1);
    assert_eq!(ann.new_signings.unwrap().health_hut_count, 1);
}

#[test]
fn test_default_window_spans_all_visits() {
    let table = VisitReader::new().read_from(CHINESE_EXPORT.as_bytes()).unwrap();
    let engine = PerformanceEngine::with_defaults();
    let normalized = engine.normalize(&table).unwrap();
    let window = normalized.visit_date_range().unwrap();
    assert_eq!(window, DateWindow::new(day(2024, 3, 1), day(2024, 4, 2)));

    let report = engine.compute_normalized(&normalized, window);
    assert_eq!(report.statistics.len(), 4);
    assert_eq!(report.summary().total_visits, 8);
}
