//! 带日历特征的岭回归预测流程
//!
//! 读训练集 -> 按日汇总 -> 日历和节假日特征 -> 验证 -> 全量训练并保存
//! -> 预测集特征 -> 预测 -> 导出。

use crate::artifact::ForecastArtifact;
use crate::config::{delimiter_byte, LinearConfig};
use crate::schema::FeatureEncoder;
use crate::types::{ForecastError, ForecastResult, PredictedRow};
use chrono::{Duration, NaiveDate};
use etl::table::{
    aggregate_by_date, read_observations, read_training_observations, write_prediction_series,
    write_table,
};
use etl::{CalendarRow, FeaturePipeline, HolidayOracle};
use ml::evaluation::Evaluator;
use ml::{Metrics, Model, RidgeCV};
use ndarray::Array1;
use std::path::PathBuf;

/// 验证结果
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub alpha: f64,
    pub train_rows: usize,
    pub test_rows: usize,
    pub metrics: Metrics,
    /// (日期, 预测值 - 真实值)
    pub large_residuals: Vec<(NaiveDate, f64)>,
}

/// 一次完整运行的结果
#[derive(Debug, Clone)]
pub struct LinearRunSummary {
    pub validation: Option<ValidationReport>,
    pub alpha: f64,
    pub train_rows: usize,
    pub predictions: Vec<PredictedRow>,
    pub artifact_path: PathBuf,
    pub series_path: PathBuf,
    pub table_path: PathBuf,
}

/// 预测明细表的表头
pub const PREDICT_TABLE_HEADER: [&str; 6] =
    ["date", "brand", "guess_date", "day_of_week", "holiday", "predict"];

pub struct LinearForecaster {
    config: LinearConfig,
    pipeline: FeaturePipeline,
    delimiter: u8,
}

impl LinearForecaster {
    pub fn new(config: LinearConfig) -> ForecastResult<Self> {
        config.validate()?;
        Ok(Self {
            pipeline: FeaturePipeline::new(config.etl.clone())?,
            delimiter: delimiter_byte(config.delimiter)?,
            config,
        })
    }

    pub fn config(&self) -> &LinearConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &FeaturePipeline {
        &self.pipeline
    }

    /// 按配置创建访问节假日接口的 oracle
    pub fn http_oracle(&self) -> ForecastResult<HolidayOracle> {
        Ok(self.pipeline.http_oracle()?)
    }

    /// 读训练集并生成特征，去掉没有销量的行
    pub async fn prepare_training(
        &self,
        oracle: &mut HolidayOracle,
    ) -> ForecastResult<Vec<CalendarRow>> {
        let raw = read_training_observations(&self.config.train_path, self.delimiter)?;
        let daily = aggregate_by_date(&raw);
        tracing::info!("Aggregated {} rows into {} days", raw.len(), daily.len());

        let rows = self.pipeline.run(daily, 0, oracle).await?;
        let total = rows.len();
        let rows: Vec<CalendarRow> = rows
            .into_iter()
            .filter(|r| r.observation.cnt.is_some())
            .collect();
        if rows.len() < total {
            tracing::warn!("Dropped {} rows without cnt", total - rows.len());
        }
        if rows.is_empty() {
            return Err(ForecastError::EmptyDataset(
                self.config.train_path.display().to_string(),
            ));
        }
        Ok(rows)
    }

    fn target(rows: &[CalendarRow]) -> Array1<f64> {
        rows.iter()
            .map(|r| r.observation.cnt.unwrap_or_default())
            .collect()
    }

    fn window(&self) -> Option<Duration> {
        self.config.training_window_days.and_then(Duration::try_days)
    }

    /// 拟合特征编码器和交叉验证岭回归
    pub fn train_model(&self, rows: &[CalendarRow]) -> ForecastResult<(FeatureEncoder, RidgeCV)> {
        let encoder = FeatureEncoder::fit(rows, &self.config.scaled_columns)?;
        let x = encoder.transform(rows)?;
        let y = Self::target(rows);

        let mut model = RidgeCV::new(self.config.alphas.clone(), self.config.cv)?;
        model.train(&x, &y)?;
        Ok((encoder, model))
    }

    /// 以 `split_date` 切分训练集和验证集
    ///
    /// 任意一侧为空时跳过验证。
    pub fn validate(&self, rows: &[CalendarRow]) -> ForecastResult<Option<ValidationReport>> {
        let split = self.config.split_date;
        let start = self.window().and_then(|w| split.checked_sub_signed(w));

        let train: Vec<CalendarRow> = rows
            .iter()
            .filter(|r| r.guess_date < split && start.map_or(true, |s| r.guess_date >= s))
            .cloned()
            .collect();
        let test: Vec<CalendarRow> = rows
            .iter()
            .filter(|r| r.guess_date >= split)
            .cloned()
            .collect();

        if train.is_empty() || test.is_empty() {
            tracing::warn!(
                "Skipping validation: {} train rows, {} test rows around {}",
                train.len(),
                test.len(),
                split
            );
            return Ok(None);
        }

        let (encoder, model) = self.train_model(&train)?;
        let y_true = Self::target(&test);
        let y_pred = model.predict(&encoder.transform(&test)?)?;
        let metrics = Evaluator::evaluate(&y_true, &y_pred)?;

        let large_residuals: Vec<(NaiveDate, f64)> =
            Evaluator::large_residuals(&y_true, &y_pred, self.config.large_residual_threshold)
                .into_iter()
                .map(|(i, delta)| (test[i].guess_date, delta))
                .collect();

        let alpha = model.alpha().unwrap_or_default();
        tracing::info!(
            "Validation on {} rows (trained on {}, alpha {}): {}",
            test.len(),
            train.len(),
            alpha,
            metrics
        );
        for (date, delta) in &large_residuals {
            tracing::warn!("Large residual on {}: {:.1}", date, delta);
        }

        Ok(Some(ValidationReport {
            alpha,
            train_rows: train.len(),
            test_rows: test.len(),
            metrics,
            large_residuals,
        }))
    }

    /// 用全部（或最近一个窗口内的）数据训练最终模型
    pub fn fit(&self, rows: &[CalendarRow]) -> ForecastResult<ForecastArtifact> {
        let last = rows
            .last()
            .ok_or_else(|| ForecastError::EmptyDataset("最终训练集".to_string()))?;

        let train: Vec<CalendarRow> = match self
            .window()
            .and_then(|w| last.guess_date.checked_sub_signed(w))
        {
            Some(start) => rows
                .iter()
                .filter(|r| r.guess_date >= start)
                .cloned()
                .collect(),
            None => rows.to_vec(),
        };

        let (encoder, model) = self.train_model(&train)?;
        tracing::info!(
            "Final model trained on {} rows, alpha {:?}, cv score {:?}",
            train.len(),
            model.alpha(),
            model.best_score()
        );
        Ok(ForecastArtifact::new(encoder, model, last))
    }

    /// 读预测集，从训练集最后一周接着编号，生成特征并预测
    ///
    /// 同一天的多个品牌共用同一组日历特征。
    pub async fn predict(
        &self,
        artifact: &ForecastArtifact,
        oracle: &mut HolidayOracle,
    ) -> ForecastResult<Vec<PredictedRow>> {
        let observations = read_observations(&self.config.predict_path, self.delimiter)?;
        let rows = self
            .pipeline
            .run_per_date(observations, artifact.last_week, oracle)
            .await?;
        let values = artifact.predict(&rows)?;

        let mut predictions: Vec<PredictedRow> = rows
            .into_iter()
            .zip(values.iter())
            .map(|(row, &predict)| PredictedRow { row, predict })
            .collect();

        if self.config.patch_boundary {
            // last_cnt 是全天汇总值，只能替换不分品牌的行
            let unbranded = predictions
                .first()
                .map(|p| p.row.observation.brand.is_none());
            match (unbranded, predictions.first_mut()) {
                (Some(true), Some(first)) => {
                    tracing::warn!(
                        "Patching first prediction {} ({:.1} -> {:.1})",
                        first.row.guess_date,
                        first.predict,
                        artifact.last_cnt
                    );
                    first.predict = artifact.last_cnt;
                }
                (Some(false), _) => {
                    tracing::warn!("Boundary patch skipped: prediction rows are split by brand");
                }
                _ => {}
            }
        }

        tracing::info!("Predicted {} rows", predictions.len());
        Ok(predictions)
    }

    /// 导出 `<model>_A.txt` 和 `<model>_predict.csv`
    pub fn export(&self, predictions: &[PredictedRow]) -> ForecastResult<()> {
        let series: Vec<_> = predictions.iter().map(|p| (p.key(), p.predict)).collect();
        write_prediction_series(self.config.series_path(), b'\t', &series)?;

        let rows = predictions.iter().map(|p| {
            vec![
                p.row.observation.date.to_string(),
                p.row
                    .observation
                    .brand
                    .map(|b| b.to_string())
                    .unwrap_or_default(),
                p.row.guess_date.format("%Y-%m-%d").to_string(),
                p.row.observation.day_of_week.to_string(),
                p.row.holiday.code().to_string(),
                p.predict.to_string(),
            ]
        });
        write_table(
            self.config.table_path(),
            b',',
            Some(&PREDICT_TABLE_HEADER[..]),
            rows,
        )?;
        Ok(())
    }

    /// 完整流程
    pub async fn run(&self, oracle: &mut HolidayOracle) -> ForecastResult<LinearRunSummary> {
        let rows = self.prepare_training(oracle).await?;

        let validation = if self.config.run_validation {
            self.validate(&rows)?
        } else {
            None
        };

        let artifact = self.fit(&rows)?;
        let artifact_path = self.config.artifact_path();
        artifact.save(&artifact_path)?;

        let predictions = self.predict(&artifact, oracle).await?;
        self.export(&predictions)?;

        tracing::info!(
            "Finished {}: {} holiday requests, {} dates cached",
            self.config.model_name,
            oracle.requests(),
            oracle.cached()
        );

        Ok(LinearRunSummary {
            validation,
            alpha: artifact.model.alpha().unwrap_or_default(),
            train_rows: rows.len(),
            predictions,
            artifact_path,
            series_path: self.config.series_path(),
            table_path: self.config.table_path(),
        })
    }
}
