//! 回归模型模块

pub mod ridge;

use crate::types::{MLError, MLResult};
use ndarray::{Array1, Array2};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

pub use ridge::{default_alphas, RidgeCV, RidgeRegression};

/// 模型训练接口
pub trait Model: Serialize + DeserializeOwned {
    /// 训练模型
    fn train(&mut self, x_train: &Array2<f64>, y_train: &Array1<f64>) -> MLResult<()>;

    /// 预测
    fn predict(&self, x: &Array2<f64>) -> MLResult<Array1<f64>>;

    fn is_trained(&self) -> bool;

    /// 保存模型
    fn save(&self, path: impl AsRef<Path>) -> MLResult<()> {
        save_bincode(self, path)
    }

    /// 加载模型
    fn load(path: impl AsRef<Path>) -> MLResult<Self> {
        load_bincode(path)
    }
}

pub fn save_bincode<T: Serialize>(value: &T, path: impl AsRef<Path>) -> MLResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let serialized = bincode::serialize(value).map_err(|e| MLError::Serialization(e.to_string()))?;
    std::fs::write(path, serialized)?;
    tracing::info!("Saved model to {}", path.display());
    Ok(())
}

pub fn load_bincode<T: DeserializeOwned>(path: impl AsRef<Path>) -> MLResult<T> {
    let data = std::fs::read(path)?;
    bincode::deserialize(&data).map_err(|e| MLError::Serialization(e.to_string()))
}
