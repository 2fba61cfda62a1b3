//! 岭回归
//!
//! 截距不参与惩罚：先对 X、y 去均值，再解 (XᵀX + αI) w = Xᵀy。
//! 对 XᵀX 做一次特征分解后，每个 α 的解和留一残差都是闭式的：
//!
//! ```text
//! w      = V diag(1 / (λ + α)) Vᵀ Xᵀ y
//! h_ii   = 1/n + Σ_k Z_ik² / (λ_k + α),   Z = X V
//! e_loo  = (y_i - ŷ_i) / (1 - h_ii)
//! ```

use super::Model;
use crate::types::{CvStrategy, MLError, MLResult};
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{s, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// 默认的 α 网格：0.01, 0.02, ..., 1.99
pub fn default_alphas() -> Vec<f64> {
    (1..200).map(|x| 0.01 * x as f64).collect()
}

fn check_xy(x: &Array2<f64>, y: &Array1<f64>) -> MLResult<()> {
    if x.nrows() != y.len() {
        return Err(MLError::DimensionMismatch {
            expected: x.nrows(),
            actual: y.len(),
        });
    }
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(MLError::Training("训练数据为空".to_string()));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(MLError::Training("训练数据含有缺失值".to_string()));
    }
    Ok(())
}

fn check_alpha(alpha: f64) -> MLResult<()> {
    if !alpha.is_finite() || alpha <= 0.0 {
        return Err(MLError::InvalidConfig(format!("alpha 必须为正数: {}", alpha)));
    }
    Ok(())
}

/// 去均值后的设计矩阵及 XᵀX 的特征分解
struct Decomposition {
    x_mean: Array1<f64>,
    y_mean: f64,
    /// Z = Xc V
    z: Array2<f64>,
    /// Vᵀ Xcᵀ yc
    q: Array1<f64>,
    eigenvalues: Array1<f64>,
    eigenvectors: Array2<f64>,
    yc: Array1<f64>,
}

impl Decomposition {
    fn new(x: &Array2<f64>, y: &Array1<f64>) -> MLResult<Self> {
        let x_mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| MLError::Training("无法计算均值".to_string()))?;
        let y_mean = y.mean().unwrap_or(0.0);
        let xc = x - &x_mean;
        let yc = y - y_mean;

        let p = x.ncols();
        let gram = xc.t().dot(&xc);
        let eigen = SymmetricEigen::new(DMatrix::from_fn(p, p, |i, j| gram[[i, j]]));

        // 半正定矩阵，数值误差导致的负特征值截到 0
        let eigenvalues = Array1::from_shape_fn(p, |k| eigen.eigenvalues[k].max(0.0));
        let eigenvectors = Array2::from_shape_fn((p, p), |(i, j)| eigen.eigenvectors[(i, j)]);

        let z = xc.dot(&eigenvectors);
        let q = z.t().dot(&yc);

        Ok(Self {
            x_mean,
            y_mean,
            z,
            q,
            eigenvalues,
            eigenvectors,
            yc,
        })
    }

    fn shrink(&self, alpha: f64) -> Array1<f64> {
        Array1::from_shape_fn(self.q.len(), |k| self.q[k] / (self.eigenvalues[k] + alpha))
    }

    fn solve(&self, alpha: f64) -> (Array1<f64>, f64) {
        let coefficients = self.eigenvectors.dot(&self.shrink(alpha));
        let intercept = self.y_mean - self.x_mean.dot(&coefficients);
        (coefficients, intercept)
    }

    /// 留一法的负均方误差
    fn loo_score(&self, alpha: f64) -> f64 {
        let n = self.yc.len() as f64;
        let fitted = self.z.dot(&self.shrink(alpha));

        let mut total = 0.0;
        for (i, row) in self.z.axis_iter(Axis(0)).enumerate() {
            let leverage = 1.0 / n
                + row
                    .iter()
                    .zip(self.eigenvalues.iter())
                    .map(|(z, lambda)| z * z / (lambda + alpha))
                    .sum::<f64>();
            let residual = (self.yc[i] - fitted[i]) / (1.0 - leverage);
            total += residual * residual;
        }

        let score = -total / n;
        if score.is_finite() {
            score
        } else {
            f64::NEG_INFINITY
        }
    }
}

/// 固定 α 的岭回归
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RidgeRegression {
    alpha: f64,
    coefficients: Option<Array1<f64>>,
    intercept: f64,
}

impl RidgeRegression {
    pub fn new(alpha: f64) -> MLResult<Self> {
        check_alpha(alpha)?;
        Ok(Self {
            alpha,
            coefficients: None,
            intercept: 0.0,
        })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

impl Model for RidgeRegression {
    fn train(&mut self, x_train: &Array2<f64>, y_train: &Array1<f64>) -> MLResult<()> {
        check_xy(x_train, y_train)?;
        let decomposition = Decomposition::new(x_train, y_train)?;
        let (coefficients, intercept) = decomposition.solve(self.alpha);
        self.coefficients = Some(coefficients);
        self.intercept = intercept;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> MLResult<Array1<f64>> {
        let coefficients = self
            .coefficients
            .as_ref()
            .ok_or_else(|| MLError::Prediction("模型未训练".to_string()))?;

        if x.ncols() != coefficients.len() {
            return Err(MLError::DimensionMismatch {
                expected: coefficients.len(),
                actual: x.ncols(),
            });
        }

        Ok(x.dot(coefficients) + self.intercept)
    }

    fn is_trained(&self) -> bool {
        self.coefficients.is_some()
    }
}

/// 交叉验证选择 α 的岭回归
///
/// 对网格里的每个 α 计算负均方误差，取最大者（并列时取靠前的），再用
/// 全部数据以该 α 训练最终模型。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RidgeCV {
    alphas: Vec<f64>,
    cv: CvStrategy,
    /// (alpha, 负均方误差)
    cv_scores: Vec<(f64, f64)>,
    model: Option<RidgeRegression>,
}

impl RidgeCV {
    pub fn new(alphas: Vec<f64>, cv: CvStrategy) -> MLResult<Self> {
        if alphas.is_empty() {
            return Err(MLError::InvalidConfig("alpha 网格为空".to_string()));
        }
        for &alpha in &alphas {
            check_alpha(alpha)?;
        }
        if let CvStrategy::KFold { k } = cv {
            if k < 2 {
                return Err(MLError::InvalidConfig(format!("k 折至少为 2: {}", k)));
            }
        }

        Ok(Self {
            alphas,
            cv,
            cv_scores: Vec::new(),
            model: None,
        })
    }

    pub fn alpha(&self) -> Option<f64> {
        self.model.as_ref().map(|m| m.alpha())
    }

    pub fn best_score(&self) -> Option<f64> {
        let alpha = self.alpha()?;
        self.cv_scores
            .iter()
            .find(|(a, _)| *a == alpha)
            .map(|(_, score)| *score)
    }

    pub fn cv_scores(&self) -> &[(f64, f64)] {
        &self.cv_scores
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.model.as_ref().and_then(|m| m.coefficients())
    }

    pub fn intercept(&self) -> Option<f64> {
        self.model.as_ref().map(|m| m.intercept())
    }

    fn loo_scores(&self, x: &Array2<f64>, y: &Array1<f64>) -> MLResult<Vec<(f64, f64)>> {
        if x.nrows() < 2 {
            return Err(MLError::Training("留一法至少需要 2 个样本".to_string()));
        }
        let decomposition = Decomposition::new(x, y)?;
        Ok(self
            .alphas
            .iter()
            .map(|&alpha| (alpha, decomposition.loo_score(alpha)))
            .collect())
    }

    fn kfold_scores(&self, x: &Array2<f64>, y: &Array1<f64>, k: usize) -> MLResult<Vec<(f64, f64)>> {
        let n = x.nrows();
        if n < k {
            return Err(MLError::Training(format!("样本数 {} 少于折数 {}", n, k)));
        }

        // 每折去掉一段连续样本，前 n % k 折多一个
        let mut bounds = Vec::with_capacity(k);
        let mut start = 0;
        for fold in 0..k {
            let size = n / k + usize::from(fold < n % k);
            bounds.push((start, start + size));
            start += size;
        }

        let mut folds = Vec::with_capacity(k);
        for &(lo, hi) in &bounds {
            let train_idx: Vec<usize> = (0..lo).chain(hi..n).collect();
            let x_train = x.select(Axis(0), &train_idx);
            let y_train = y.select(Axis(0), &train_idx);
            let decomposition = Decomposition::new(&x_train, &y_train)?;
            folds.push((decomposition, x.slice(s![lo..hi, ..]).to_owned(), y.slice(s![lo..hi]).to_owned()));
        }

        Ok(self
            .alphas
            .iter()
            .map(|&alpha| {
                let mean_score = folds
                    .iter()
                    .map(|(decomposition, x_test, y_test)| {
                        let (w, b) = decomposition.solve(alpha);
                        let residual = y_test - &(x_test.dot(&w) + b);
                        -residual.mapv(|r| r * r).mean().unwrap_or(0.0)
                    })
                    .sum::<f64>()
                    / folds.len() as f64;
                (alpha, mean_score)
            })
            .collect())
    }
}

impl Default for RidgeCV {
    fn default() -> Self {
        Self {
            alphas: default_alphas(),
            cv: CvStrategy::default(),
            cv_scores: Vec::new(),
            model: None,
        }
    }
}

impl Model for RidgeCV {
    fn train(&mut self, x_train: &Array2<f64>, y_train: &Array1<f64>) -> MLResult<()> {
        check_xy(x_train, y_train)?;

        let scores = match self.cv {
            CvStrategy::LeaveOneOut => self.loo_scores(x_train, y_train)?,
            CvStrategy::KFold { k } => self.kfold_scores(x_train, y_train, k)?,
        };

        let (best_alpha, best_score) = scores
            .iter()
            .copied()
            .fold(None, |best: Option<(f64, f64)>, (alpha, score)| match best {
                Some((_, s)) if s >= score => best,
                _ => Some((alpha, score)),
            })
            .ok_or_else(|| MLError::Training("没有可用的 alpha".to_string()))?;

        let mut model = RidgeRegression::new(best_alpha)?;
        model.train(x_train, y_train)?;

        tracing::info!(
            "Selected alpha {} by {} (score {:.4}) over {} candidates",
            best_alpha,
            self.cv,
            best_score,
            scores.len()
        );
        tracing::debug!("Coefficients: {:?}", model.coefficients());

        self.cv_scores = scores;
        self.model = Some(model);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> MLResult<Array1<f64>> {
        self.model
            .as_ref()
            .ok_or_else(|| MLError::Prediction("模型未训练".to_string()))?
            .predict(x)
    }

    fn is_trained(&self) -> bool {
        self.model.is_some()
    }
}
