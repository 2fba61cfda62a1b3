//! # Forecast
//!
//! 日销量预测的两个批处理流程
//!
//! - `linear`: 日历和节假日特征 + 交叉验证岭回归
//! - `average`: 多个模型输出按固定权重加权平均

pub mod types;
pub mod config;
pub mod schema;
pub mod artifact;
pub mod linear;
pub mod average;

pub use types::{ForecastError, ForecastResult, PredictedRow};
pub use config::{load_json, EnsembleConfig, LinearConfig, MemberConfig};
pub use schema::{CategoricalFeature, FeatureEncoder, NumericFeature};
pub use artifact::ForecastArtifact;
pub use linear::{LinearForecaster, LinearRunSummary, ValidationReport};
pub use average::{EnsembleSummary, EnsembleWorkflow};

/// `-v` 的次数对应的日志级别
pub fn log_level(verbose: u8) -> tracing::Level {
    match verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    }
}
