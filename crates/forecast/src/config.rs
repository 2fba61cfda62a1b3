//! 两个批处理工具的配置
//!
//! 配置文件为 JSON，缺省字段取 `Default` 中的值。

use crate::schema::NumericFeature;
use crate::types::{ForecastError, ForecastResult};
use chrono::NaiveDate;
use etl::ETLConfig;
use ml::models::default_alphas;
use ml::CvStrategy;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 从 JSON 文件读取配置
pub fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> ForecastResult<T> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let config = serde_json::from_str(&content)?;
    tracing::info!("Loaded config from {}", path.display());
    Ok(config)
}

/// 分隔符只支持单字节 ASCII 字符
pub fn delimiter_byte(delimiter: char) -> ForecastResult<u8> {
    if delimiter.is_ascii() {
        Ok(delimiter as u8)
    } else {
        Err(ForecastError::InvalidConfig(format!(
            "分隔符必须是 ASCII 字符: {:?}",
            delimiter
        )))
    }
}

/// 线性模型配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearConfig {
    pub etl: ETLConfig,
    /// 训练集：`date, day_of_week[, brand], cnt`
    pub train_path: PathBuf,
    /// 预测集：`date, day_of_week[, brand]`
    pub predict_path: PathBuf,
    pub output_dir: PathBuf,
    pub delimiter: char,
    pub model_name: String,
    /// 验证集从这一天开始
    pub split_date: NaiveDate,
    /// 只用最近若干天训练
    pub training_window_days: Option<i64>,
    pub alphas: Vec<f64>,
    pub cv: CvStrategy,
    /// 做最小最大缩放的数值列
    pub scaled_columns: Vec<NumericFeature>,
    /// 验证时绝对残差超过该值的行会打到日志里
    pub large_residual_threshold: f64,
    /// 把第一条预测替换成训练集最后一天的销量
    pub patch_boundary: bool,
    pub run_validation: bool,
}

impl Default for LinearConfig {
    fn default() -> Self {
        Self {
            etl: ETLConfig::default(),
            train_path: PathBuf::from("data/train_20171215.txt"),
            predict_path: PathBuf::from("data/test_A_20171225.txt"),
            output_dir: PathBuf::from("."),
            delimiter: '\t',
            model_name: "linear1_addFestival".to_string(),
            split_date: NaiveDate::from_ymd_opt(2015, 6, 1).unwrap_or_default(),
            training_window_days: None,
            alphas: default_alphas(),
            cv: CvStrategy::default(),
            scaled_columns: vec![NumericFeature::Year],
            large_residual_threshold: 1000.0,
            patch_boundary: false,
            run_validation: true,
        }
    }
}

impl LinearConfig {
    pub fn validate(&self) -> ForecastResult<()> {
        self.etl.validate()?;
        delimiter_byte(self.delimiter)?;

        if self.model_name.is_empty() {
            return Err(ForecastError::InvalidConfig("model_name 为空".to_string()));
        }
        if self.alphas.is_empty() {
            return Err(ForecastError::InvalidConfig("alphas 为空".to_string()));
        }
        if let Some(days) = self.training_window_days {
            if days <= 0 {
                return Err(ForecastError::InvalidConfig(format!(
                    "training_window_days 必须大于 0: {}",
                    days
                )));
            }
        }
        if !self.large_residual_threshold.is_finite() || self.large_residual_threshold < 0.0 {
            return Err(ForecastError::InvalidConfig(format!(
                "large_residual_threshold 无效: {}",
                self.large_residual_threshold
            )));
        }
        Ok(())
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.bin", self.model_name))
    }

    pub fn series_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}_A.txt", self.model_name))
    }

    pub fn table_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}_predict.csv", self.model_name))
    }
}

/// 参与融合的模型输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberConfig {
    pub name: String,
    /// 无表头：`date, brand, predict`
    pub path: PathBuf,
    pub weight: f64,
}

impl MemberConfig {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, weight: f64) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            weight,
        }
    }
}

/// 融合配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    pub members: Vec<MemberConfig>,
    pub member_delimiter: char,
    /// 主键参考表，为空时以第一个模型的主键为准
    pub reference_path: Option<PathBuf>,
    pub reference_delimiter: char,
    pub output_dir: PathBuf,
    pub model_name: String,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            members: vec![
                MemberConfig::new("lake", "lake/resultB1_lake_A.txt", 0.33),
                MemberConfig::new("keng", "keng/prophet_dateProperty_B_fusai_3_7.txt", 0.34),
                MemberConfig::new("yuna", "linear1/linear2B.txt", 0.33),
            ],
            member_delimiter: '\t',
            reference_path: Some(PathBuf::from("linear1/linear2B_predict.csv")),
            reference_delimiter: ',',
            output_dir: PathBuf::from("."),
            model_name: "average2B".to_string(),
        }
    }
}

impl EnsembleConfig {
    pub fn validate(&self) -> ForecastResult<()> {
        delimiter_byte(self.member_delimiter)?;
        delimiter_byte(self.reference_delimiter)?;

        if self.members.is_empty() {
            return Err(ForecastError::InvalidConfig("members 为空".to_string()));
        }
        if self.model_name.is_empty() {
            return Err(ForecastError::InvalidConfig("model_name 为空".to_string()));
        }
        Ok(())
    }

    pub fn table_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}_predict.csv", self.model_name))
    }

    pub fn series_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}_out.txt", self.model_name))
    }
}
