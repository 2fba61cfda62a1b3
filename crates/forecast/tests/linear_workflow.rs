use chrono::NaiveDate;
use etl::holiday::FixedHolidaySource;
use forecast::{ForecastArtifact, LinearConfig, LinearForecaster};
use std::fmt::Write as _;
use std::path::Path;
use tempfile::TempDir;

const TRAIN_DAYS: usize = 300;
const PREDICT_DAYS: usize = 14;

/// 第 i 天从 2013-01-02（周三）算起
fn day_of_week(i: usize) -> usize {
    (i + 2) % 7 + 1
}

fn daily_cnt(i: usize) -> f64 {
    if day_of_week(i) >= 6 {
        3000.0
    } else {
        1000.0
    }
}

/// 两个品牌拆分的训练集，按日汇总后周末 3000，工作日 1000
fn write_inputs(dir: &Path) {
    let mut train = String::from("date\tday_of_week\tbrand\tcnt\n");
    for i in 0..TRAIN_DAYS {
        let total = daily_cnt(i);
        writeln!(train, "{}\t{}\t1\t{}", i + 1, day_of_week(i), total * 0.6).unwrap();
        writeln!(train, "{}\t{}\t2\t{}", i + 1, day_of_week(i), total * 0.4).unwrap();
    }
    std::fs::write(dir.join("train.txt"), train).unwrap();

    let mut predict = String::from("date\tday_of_week\n");
    for i in TRAIN_DAYS..TRAIN_DAYS + PREDICT_DAYS {
        writeln!(predict, "{}\t{}", i + 1, day_of_week(i)).unwrap();
    }
    std::fs::write(dir.join("predict.txt"), predict).unwrap();
}

fn config(dir: &Path) -> LinearConfig {
    LinearConfig {
        train_path: dir.join("train.txt"),
        predict_path: dir.join("predict.txt"),
        output_dir: dir.join("out"),
        model_name: "linear_test".to_string(),
        split_date: NaiveDate::from_ymd_opt(2013, 9, 1).unwrap(),
        alphas: vec![0.01, 0.1, 1.0],
        patch_boundary: true,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_linear_workflow_end_to_end() {
    let dir = TempDir::new().unwrap();
    write_inputs(dir.path());

    let forecaster = LinearForecaster::new(config(dir.path())).unwrap();
    let mut oracle = forecaster
        .pipeline()
        .oracle_with(Box::new(FixedHolidaySource::weekends_only()));

    let summary = forecaster.run(&mut oracle).await.unwrap();

    let validation = summary.validation.as_ref().unwrap();
    assert_eq!(validation.train_rows + validation.test_rows, TRAIN_DAYS);
    assert!(validation.metrics.rmse < 150.0);
    assert_eq!(summary.train_rows, TRAIN_DAYS);
    assert_eq!(summary.predictions.len(), PREDICT_DAYS);

    // 预测集紧接训练集：2013-10-28 是周一，下一天是周二
    assert_eq!(
        summary.predictions[0].row.guess_date,
        NaiveDate::from_ymd_opt(2013, 10, 29).unwrap()
    );
    // 第一条被替换成训练集最后一天的销量
    assert_eq!(summary.predictions[0].predict, daily_cnt(TRAIN_DAYS - 1));
    for (offset, p) in summary.predictions.iter().enumerate().skip(1) {
        let expected = daily_cnt(TRAIN_DAYS + offset);
        assert!(
            (p.predict - expected).abs() < 150.0,
            "{}: {} vs {}",
            p.row.guess_date,
            p.predict,
            expected
        );
    }

    let series = std::fs::read_to_string(&summary.series_path).unwrap();
    let lines: Vec<&str> = series.lines().collect();
    assert_eq!(lines.len(), PREDICT_DAYS);
    assert_eq!(lines[0], "301\t1000");

    let table = std::fs::read_to_string(&summary.table_path).unwrap();
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines.len(), PREDICT_DAYS + 1);
    assert_eq!(lines[0], "date,brand,guess_date,day_of_week,holiday,predict");
    assert!(lines[1].starts_with("301,,2013-10-29,2,0,"));

    // 保存的产物可以单独加载并复现预测
    let artifact = ForecastArtifact::load(&summary.artifact_path).unwrap();
    let rows: Vec<_> = summary.predictions.iter().map(|p| p.row.clone()).collect();
    let reloaded = artifact.predict(&rows).unwrap();
    for (p, value) in summary.predictions.iter().zip(reloaded.iter()).skip(1) {
        assert!((p.predict - value).abs() < 1e-9);
    }
}

#[tokio::test]
async fn test_second_run_uses_cached_holidays() {
    let dir = TempDir::new().unwrap();
    write_inputs(dir.path());

    let forecaster = LinearForecaster::new(LinearConfig {
        run_validation: false,
        ..config(dir.path())
    })
    .unwrap();
    let mut oracle = forecaster
        .pipeline()
        .oracle_with(Box::new(FixedHolidaySource::weekends_only()));

    let summary = forecaster.run(&mut oracle).await.unwrap();
    assert!(summary.validation.is_none());
    let requests = oracle.requests();
    assert!(requests > 0);

    forecaster.run(&mut oracle).await.unwrap();
    assert_eq!(oracle.requests(), requests);
}

#[tokio::test]
async fn test_missing_column_fails() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("train.txt"), "date\tcnt\n1\t100\n").unwrap();

    let forecaster = LinearForecaster::new(config(dir.path())).unwrap();
    let mut oracle = forecaster
        .pipeline()
        .oracle_with(Box::new(FixedHolidaySource::weekends_only()));

    let err = forecaster.run(&mut oracle).await.unwrap_err();
    assert!(matches!(
        err,
        forecast::ForecastError::Etl(etl::ETLError::MissingColumn { .. })
    ));
}

#[tokio::test]
async fn test_branded_prediction_rows_share_calendar() {
    let dir = TempDir::new().unwrap();
    write_inputs(dir.path());

    let mut predict = String::from("date\tday_of_week\tbrand\n");
    for i in TRAIN_DAYS..TRAIN_DAYS + 3 {
        for brand in [1, 2] {
            writeln!(predict, "{}\t{}\t{}", i + 1, day_of_week(i), brand).unwrap();
        }
    }
    std::fs::write(dir.path().join("predict.txt"), predict).unwrap();

    let forecaster = LinearForecaster::new(LinearConfig {
        run_validation: false,
        ..config(dir.path())
    })
    .unwrap();
    let mut oracle = forecaster
        .pipeline()
        .oracle_with(Box::new(FixedHolidaySource::weekends_only()));
    let summary = forecaster.run(&mut oracle).await.unwrap();

    let predictions = &summary.predictions;
    assert_eq!(predictions.len(), 6);
    let expected = [
        NaiveDate::from_ymd_opt(2013, 10, 29).unwrap(),
        NaiveDate::from_ymd_opt(2013, 10, 30).unwrap(),
        NaiveDate::from_ymd_opt(2013, 10, 31).unwrap(),
    ];
    for (pair, date) in predictions.chunks(2).zip(expected) {
        assert_eq!(pair[0].row.guess_date, date);
        assert_eq!(pair[1].row.guess_date, date);
        assert_eq!(pair[0].row.observation.brand, Some(1));
        assert_eq!(pair[1].row.observation.brand, Some(2));
        assert_eq!(pair[0].row.week, pair[1].row.week);
        assert_eq!(pair[0].predict, pair[1].predict);
    }

    let series = std::fs::read_to_string(&summary.series_path).unwrap();
    let lines: Vec<&str> = series.lines().collect();
    assert_eq!(lines.len(), 6);
    assert!(lines[1].starts_with("301\t2\t"));

    let table = std::fs::read_to_string(&summary.table_path).unwrap();
    assert!(table.lines().nth(2).unwrap().starts_with("301,2,2013-10-29,2,0,"));
}

#[tokio::test]
async fn test_training_file_without_cnt_fails_before_lookups() {
    let dir = TempDir::new().unwrap();
    write_inputs(dir.path());
    std::fs::write(dir.path().join("train.txt"), "date\tday_of_week\n1\t3\n2\t4\n").unwrap();

    let forecaster = LinearForecaster::new(config(dir.path())).unwrap();
    let mut oracle = forecaster
        .pipeline()
        .oracle_with(Box::new(FixedHolidaySource::weekends_only()));

    let err = forecaster.run(&mut oracle).await.unwrap_err();
    assert!(matches!(
        err,
        forecast::ForecastError::Etl(etl::ETLError::MissingColumn { ref column, .. }) if column == "cnt"
    ));
    assert_eq!(oracle.requests(), 0);
}
