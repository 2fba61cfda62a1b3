//! 模型评估模块

use crate::types::{MLError, MLResult, Metrics};
use ndarray::Array1;

/// 模型评估器
pub struct Evaluator;

impl Evaluator {
    /// 计算评估指标
    pub fn evaluate(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> MLResult<Metrics> {
        if y_true.len() != y_pred.len() {
            return Err(MLError::DimensionMismatch {
                expected: y_true.len(),
                actual: y_pred.len(),
            });
        }

        let mse = Self::mean_squared_error(y_true, y_pred);
        let rmse = mse.sqrt();
        let mae = Self::mean_absolute_error(y_true, y_pred);
        let r2 = Self::r2_score(y_true, y_pred);

        Ok(Metrics::new(mse, rmse, mae, r2))
    }

    /// 均方误差 (MSE)，空输入为 0
    pub fn mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
        mean(residuals(y_true, y_pred).map(|r| r * r), y_true.len())
    }

    /// 平均绝对误差 (MAE)
    pub fn mean_absolute_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
        mean(residuals(y_true, y_pred).map(f64::abs), y_true.len())
    }

    /// R² = 1 - SS_res / SS_tot；真实值为常数时记为 0
    pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
        let center = mean(y_true.iter().copied(), y_true.len());
        let (ss_res, ss_tot) = y_true
            .iter()
            .zip(y_pred.iter())
            .fold((0.0_f64, 0.0_f64), |(res, tot), (t, p)| {
                (res + (t - p).powi(2), tot + (t - center).powi(2))
            });

        if ss_tot == 0.0 {
            0.0
        } else {
            1.0 - ss_res / ss_tot
        }
    }

    /// 预测值减真实值，绝对值超过阈值的样本 (下标, 残差)
    pub fn large_residuals(
        y_true: &Array1<f64>,
        y_pred: &Array1<f64>,
        threshold: f64,
    ) -> Vec<(usize, f64)> {
        y_pred
            .iter()
            .zip(y_true.iter())
            .map(|(p, t)| p - t)
            .enumerate()
            .filter(|(_, delta)| delta.abs() > threshold)
            .collect()
    }
}

fn residuals<'a>(y_true: &'a Array1<f64>, y_pred: &'a Array1<f64>) -> impl Iterator<Item = f64> + 'a {
    y_true.iter().zip(y_pred.iter()).map(|(t, p)| t - p)
}

fn mean(values: impl Iterator<Item = f64>, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    values.sum::<f64>() / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_mse() {
        let y_true = array![1.0, 2.0, 3.0];
        let y_pred = array![1.1, 2.1, 2.9];

        let mse = Evaluator::mean_squared_error(&y_true, &y_pred);
        assert_abs_diff_eq!(mse, 0.01, epsilon = 1e-6);
    }

    #[test]
    fn test_evaluate() {
        let y_true = array![3.0, 5.0, 7.0, 9.0];
        let y_pred = array![2.0, 5.0, 8.0, 9.0];

        let metrics = Evaluator::evaluate(&y_true, &y_pred).unwrap();
        assert_abs_diff_eq!(metrics.mse, 0.5);
        assert_abs_diff_eq!(metrics.rmse, 0.5f64.sqrt());
        assert_abs_diff_eq!(metrics.mae, 0.5);
        // ss_tot = 20, ss_res = 2
        assert_abs_diff_eq!(metrics.r2_score, 0.9);

        assert!(Evaluator::evaluate(&y_true, &array![1.0]).is_err());
    }

    #[test]
    fn test_degenerate_inputs() {
        let empty = Array1::<f64>::zeros(0);
        assert_eq!(Evaluator::mean_squared_error(&empty, &empty), 0.0);
        assert_eq!(Evaluator::mean_absolute_error(&empty, &empty), 0.0);

        let flat = array![4.0, 4.0, 4.0];
        assert_eq!(Evaluator::r2_score(&flat, &array![3.0, 4.0, 5.0]), 0.0);
        assert_abs_diff_eq!(
            Evaluator::mean_absolute_error(&flat, &array![3.0, 4.0, 6.0]),
            1.0
        );
    }

    #[test]
    fn test_large_residuals() {
        let y_true = array![1000.0, 2000.0, 3000.0];
        let y_pred = array![2500.0, 2100.0, 1500.0];

        let large = Evaluator::large_residuals(&y_true, &y_pred, 1000.0);
        assert_eq!(large, vec![(0, 1500.0), (2, -1500.0)]);
    }
}
