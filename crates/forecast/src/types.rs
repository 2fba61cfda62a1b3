//! 错误类型和预测结果

use etl::{CalendarRow, ETLError, PredictionKey};
use ml::MLError;
use thiserror::Error;

pub type ForecastResult<T> = Result<T, ForecastError>;

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("ETL 错误: {0}")]
    Etl(#[from] ETLError),

    #[error("ML 错误: {0}")]
    Ml(#[from] MLError),

    #[error("配置文件解析失败: {0}")]
    ConfigParsing(#[from] serde_json::Error),

    #[error("无效的配置: {0}")]
    InvalidConfig(String),

    #[error("数据集为空: {0}")]
    EmptyDataset(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

/// 一行预测结果
#[derive(Debug, Clone, PartialEq)]
pub struct PredictedRow {
    pub row: CalendarRow,
    pub predict: f64,
}

impl PredictedRow {
    pub fn key(&self) -> PredictionKey {
        self.row.key()
    }
}
