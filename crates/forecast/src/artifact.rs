//! 训练产物：特征编码器 + 模型

use crate::schema::FeatureEncoder;
use crate::types::ForecastResult;
use chrono::NaiveDate;
use etl::CalendarRow;
use ml::models::{load_bincode, save_bincode};
use ml::{Model, RidgeCV};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 最终模型及预测时需要的全部状态
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastArtifact {
    pub encoder: FeatureEncoder,
    pub model: RidgeCV,
    /// 训练集最后一行的周序号，预测集从这一周接着编号
    pub last_week: i64,
    pub last_date: NaiveDate,
    pub last_cnt: f64,
}

impl ForecastArtifact {
    pub fn new(encoder: FeatureEncoder, model: RidgeCV, last_row: &CalendarRow) -> Self {
        Self {
            encoder,
            model,
            last_week: last_row.week,
            last_date: last_row.guess_date,
            last_cnt: last_row.observation.cnt.unwrap_or_default(),
        }
    }

    pub fn predict(&self, rows: &[CalendarRow]) -> ForecastResult<Array1<f64>> {
        let x = self.encoder.transform(rows)?;
        Ok(self.model.predict(&x)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> ForecastResult<()> {
        Ok(save_bincode(self, path)?)
    }

    pub fn load(path: impl AsRef<Path>) -> ForecastResult<Self> {
        let artifact: Self = load_bincode(path.as_ref())?;
        tracing::info!(
            "Loaded artifact from {} (alpha {:?}, trained through {})",
            path.as_ref().display(),
            artifact.model.alpha(),
            artifact.last_date
        );
        Ok(artifact)
    }
}
