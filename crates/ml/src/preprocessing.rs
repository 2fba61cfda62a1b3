//! 数据预处理：最小最大缩放和 one-hot 编码

use crate::types::{MLError, MLResult};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// 最小最大缩放器，把训练集上每列的 [min, max] 映射到 [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    pub min: Array1<f64>,
    pub max: Array1<f64>,
}

impl MinMaxScaler {
    /// 从训练数据拟合缩放器，数据中不能有缺失值
    pub fn fit(data: &Array2<f64>) -> MLResult<Self> {
        if data.nrows() == 0 {
            return Err(MLError::Preprocessing("数据为空".to_string()));
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(MLError::Preprocessing(
                "存在缺失值，请先用 complete_rows 过滤".to_string(),
            ));
        }

        let min = data.fold_axis(Axis(0), f64::INFINITY, |acc, &v| acc.min(v));
        let max = data.fold_axis(Axis(0), f64::NEG_INFINITY, |acc, &v| acc.max(v));

        Ok(Self { min, max })
    }

    pub fn n_features(&self) -> usize {
        self.min.len()
    }

    /// 区间长度为 0 的列按 1 处理，只做平移
    fn range(&self, j: usize) -> f64 {
        let range = self.max[j] - self.min[j];
        if range.abs() < 1e-12 {
            1.0
        } else {
            range
        }
    }

    fn check_dims(&self, data: &Array2<f64>) -> MLResult<()> {
        if data.ncols() != self.n_features() {
            return Err(MLError::DimensionMismatch {
                expected: self.n_features(),
                actual: data.ncols(),
            });
        }
        Ok(())
    }

    /// 缩放数据，超出训练区间的值不截断
    pub fn transform(&self, data: &Array2<f64>) -> MLResult<Array2<f64>> {
        self.check_dims(data)?;

        let mut scaled = data.clone();
        for mut row in scaled.axis_iter_mut(Axis(0)) {
            for (j, val) in row.iter_mut().enumerate() {
                *val = (*val - self.min[j]) / self.range(j);
            }
        }

        Ok(scaled)
    }

    /// 拟合并转换
    pub fn fit_transform(data: &Array2<f64>) -> MLResult<(Self, Array2<f64>)> {
        let scaler = Self::fit(data)?;
        let transformed = scaler.transform(data)?;
        Ok((scaler, transformed))
    }

    /// 反缩放
    pub fn inverse_transform(&self, data: &Array2<f64>) -> MLResult<Array2<f64>> {
        self.check_dims(data)?;

        let mut restored = data.clone();
        for mut row in restored.axis_iter_mut(Axis(0)) {
            for (j, val) in row.iter_mut().enumerate() {
                *val = *val * self.range(j) + self.min[j];
            }
        }

        Ok(restored)
    }
}

/// 所有值都有限的行的下标
pub fn complete_rows(data: &Array2<f64>) -> Vec<usize> {
    data.axis_iter(Axis(0))
        .enumerate()
        .filter(|(_, row)| row.iter().all(|v| v.is_finite()))
        .map(|(i, _)| i)
        .collect()
}

/// one-hot 编码器
///
/// 类别集合在构造时固定，训练和预测使用同一个编码器，输出列的数量和
/// 顺序不随批次变化。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    feature: String,
    categories: Vec<i64>,
}

impl OneHotEncoder {
    pub fn new(feature: impl Into<String>, categories: impl IntoIterator<Item = i64>) -> MLResult<Self> {
        let feature = feature.into();
        let categories: Vec<i64> = categories.into_iter().collect();

        if categories.is_empty() {
            return Err(MLError::InvalidConfig(format!("`{}` 没有类别", feature)));
        }
        let mut sorted = categories.clone();
        sorted.sort_unstable();
        sorted.dedup();
        if sorted.len() != categories.len() {
            return Err(MLError::InvalidConfig(format!("`{}` 的类别有重复", feature)));
        }

        Ok(Self { feature, categories })
    }

    pub fn feature(&self) -> &str {
        &self.feature
    }

    pub fn categories(&self) -> &[i64] {
        &self.categories
    }

    pub fn n_columns(&self) -> usize {
        self.categories.len()
    }

    /// 列名：`<feature>_<category>`
    pub fn column_names(&self) -> Vec<String> {
        self.categories
            .iter()
            .map(|c| format!("{}_{}", self.feature, c))
            .collect()
    }

    pub fn index_of(&self, value: i64) -> MLResult<usize> {
        self.categories
            .iter()
            .position(|c| *c == value)
            .ok_or_else(|| MLError::UnknownCategory {
                feature: self.feature.clone(),
                value,
            })
    }

    /// 编码，遇到未声明的类别直接报错
    pub fn encode(&self, values: &[i64]) -> MLResult<Array2<f64>> {
        let mut encoded = Array2::<f64>::zeros((values.len(), self.n_columns()));
        for (i, &value) in values.iter().enumerate() {
            encoded[[i, self.index_of(value)?]] = 1.0;
        }
        Ok(encoded)
    }

    /// 取最大的指示列还原类别，全零行返回 `None`
    pub fn decode_row(&self, row: ArrayView1<f64>) -> MLResult<Option<i64>> {
        if row.len() != self.n_columns() {
            return Err(MLError::DimensionMismatch {
                expected: self.n_columns(),
                actual: row.len(),
            });
        }

        let best = row
            .iter()
            .enumerate()
            .filter(|(_, v)| **v > 0.0)
            .fold(None, |best: Option<(usize, f64)>, (j, &v)| match best {
                Some((_, bv)) if bv >= v => best,
                _ => Some((j, v)),
            });

        Ok(best.map(|(j, _)| self.categories[j]))
    }

    pub fn decode(&self, encoded: &Array2<f64>) -> MLResult<Vec<Option<i64>>> {
        encoded
            .axis_iter(Axis(0))
            .map(|row| self.decode_row(row))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_min_max_scaler() {
        let data = array![[2013.0, 5.0], [2014.0, 10.0], [2015.0, 7.5]];
        let (scaler, transformed) = MinMaxScaler::fit_transform(&data).unwrap();

        assert_abs_diff_eq!(transformed[[0, 0]], 0.0);
        assert_abs_diff_eq!(transformed[[2, 0]], 1.0);
        assert_abs_diff_eq!(transformed[[0, 1]], 0.0);
        assert_abs_diff_eq!(transformed[[1, 1]], 1.0);
        assert_abs_diff_eq!(transformed[[2, 1]], 0.5);

        let reconstructed = scaler.inverse_transform(&transformed).unwrap();
        assert!((reconstructed - &data).mapv(|x| x.abs()).sum() < 1e-9);
    }

    #[test]
    fn test_scaler_does_not_clip_new_values() {
        let scaler = MinMaxScaler::fit(&array![[2013.0], [2015.0]]).unwrap();
        let out = scaler.transform(&array![[2016.0]]).unwrap();
        assert_abs_diff_eq!(out[[0, 0]], 1.5);
    }

    #[test]
    fn test_constant_column_only_shifts() {
        let data = array![[2016.0], [2016.0]];
        let (scaler, transformed) = MinMaxScaler::fit_transform(&data).unwrap();
        assert_abs_diff_eq!(transformed[[1, 0]], 0.0);
        assert_abs_diff_eq!(scaler.transform(&array![[2017.0]]).unwrap()[[0, 0]], 1.0);
    }

    #[test]
    fn test_scaler_rejects_missing_and_mismatch() {
        let with_nan = array![[1.0, f64::NAN], [2.0, 3.0], [4.0, 5.0]];
        assert!(MinMaxScaler::fit(&with_nan).is_err());
        assert_eq!(complete_rows(&with_nan), vec![1, 2]);

        let scaler = MinMaxScaler::fit(&array![[1.0], [2.0]]).unwrap();
        let err = scaler.transform(&array![[1.0, 2.0]]).unwrap_err();
        assert!(matches!(err, MLError::DimensionMismatch { expected: 1, actual: 2 }));
    }

    #[test]
    fn test_one_hot_roundtrip() {
        let encoder = OneHotEncoder::new("month", 1..=12).unwrap();
        let values = vec![1, 5, 12, 5];
        let encoded = encoder.encode(&values).unwrap();

        assert_eq!(encoded.dim(), (4, 12));
        assert!(encoded.axis_iter(Axis(0)).all(|r| r.sum() == 1.0));
        // 第 5 列是 month_5
        assert_eq!(encoded[[1, 4]], 1.0);
        assert_eq!(encoder.column_names()[4], "month_5");

        let decoded = encoder.decode(&encoded).unwrap();
        assert_eq!(decoded, values.into_iter().map(Some).collect::<Vec<_>>());
    }

    #[test]
    fn test_shape_is_independent_of_batch() {
        let encoder = OneHotEncoder::new("holiday", 0..=2).unwrap();
        // 批次里只有工作日，列数仍然是 3
        let encoded = encoder.encode(&[0, 0]).unwrap();
        assert_eq!(encoded.ncols(), 3);
        assert_eq!(encoded.column(2).sum(), 0.0);
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        let encoder = OneHotEncoder::new("day_of_week", 1..=7).unwrap();
        let err = encoder.encode(&[3, 8]).unwrap_err();
        assert!(matches!(err, MLError::UnknownCategory { value: 8, .. }));

        assert!(OneHotEncoder::new("x", vec![1, 1]).is_err());
        assert!(OneHotEncoder::new("x", Vec::new()).is_err());
    }

    #[test]
    fn test_decode_all_zero_row() {
        let encoder = OneHotEncoder::new("holiday", 0..=2).unwrap();
        assert_eq!(encoder.decode_row(array![0.0, 0.0, 0.0].view()).unwrap(), None);
    }
}
