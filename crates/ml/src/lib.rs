//! # Sales Forecast ML
//!
//! 日销量预测使用的机器学习组件。
//!
//! ## 主要模块
//!
//! - `preprocessing`: 最小最大缩放和 one-hot 编码
//! - `models`: 岭回归及交叉验证选择正则化强度
//! - `evaluation`: 模型评估指标
//! - `ensemble`: 多模型加权融合

pub mod preprocessing;
pub mod models;
pub mod evaluation;
pub mod ensemble;
pub mod types;

pub use types::{CvStrategy, MLError, MLResult, Metrics};
pub use models::{Model, RidgeCV, RidgeRegression};
pub use ensemble::{BlendedRow, EnsembleMember, WeightedEnsemble};
