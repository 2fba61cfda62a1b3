//! 核心类型定义

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type MLResult<T> = Result<T, MLError>;

#[derive(Debug, Error)]
pub enum MLError {
    #[error("数据预处理错误: {0}")]
    Preprocessing(String),

    #[error("模型训练错误: {0}")]
    Training(String),

    #[error("模型预测错误: {0}")]
    Prediction(String),

    #[error("数据维度不匹配: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("类别 {value} 不在 `{feature}` 的取值范围内")]
    UnknownCategory { feature: String, value: i64 },

    #[error("融合错误: {0}")]
    Ensemble(String),

    #[error("无效的配置: {0}")]
    InvalidConfig(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(String),
}

/// 交叉验证方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CvStrategy {
    /// 留一法，用帽子矩阵对角线直接求解
    LeaveOneOut,
    /// 按顺序切分的 k 折
    KFold { k: usize },
}

impl Default for CvStrategy {
    fn default() -> Self {
        CvStrategy::LeaveOneOut
    }
}

impl std::fmt::Display for CvStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CvStrategy::LeaveOneOut => write!(f, "LeaveOneOut"),
            CvStrategy::KFold { k } => write!(f, "KFold({})", k),
        }
    }
}

/// 评估指标
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// 均方误差
    pub mse: f64,
    /// 均方根误差
    pub rmse: f64,
    /// 平均绝对误差
    pub mae: f64,
    /// R² 分数
    pub r2_score: f64,
}

impl Metrics {
    pub fn new(mse: f64, rmse: f64, mae: f64, r2_score: f64) -> Self {
        Self {
            mse,
            rmse,
            mae,
            r2_score,
        }
    }
}

impl std::fmt::Display for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "mse={:.3} rmse={:.3} mae={:.3} r2={:.4}",
            self.mse, self.rmse, self.mae, self.r2_score
        )
    }
}
