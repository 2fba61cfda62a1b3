//! 多模型预测的加权融合

use crate::types::{MLError, MLResult};
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

/// 参与融合的一组预测
#[derive(Debug, Clone)]
pub struct EnsembleMember<K> {
    name: String,
    weight: f64,
    keys: Vec<K>,
    predictions: HashMap<K, f64>,
}

impl<K: Eq + Hash + Clone + Debug> EnsembleMember<K> {
    pub fn new(
        name: impl Into<String>,
        weight: f64,
        series: impl IntoIterator<Item = (K, f64)>,
    ) -> MLResult<Self> {
        let name = name.into();
        if !weight.is_finite() || weight < 0.0 {
            return Err(MLError::Ensemble(format!("`{}` 的权重无效: {}", name, weight)));
        }

        let mut keys = Vec::new();
        let mut predictions = HashMap::new();
        for (key, value) in series {
            if predictions.insert(key.clone(), value).is_some() {
                return Err(MLError::Ensemble(format!("`{}` 中 {:?} 重复", name, key)));
            }
            keys.push(key);
        }

        Ok(Self {
            name,
            weight,
            keys,
            predictions,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// 按读入顺序的主键
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    pub fn get(&self, key: &K) -> Option<f64> {
        self.predictions.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// 融合后的一行
#[derive(Debug, Clone, PartialEq)]
pub struct BlendedRow<K> {
    pub key: K,
    /// 与成员顺序一致的各模型预测
    pub members: Vec<f64>,
    pub value: f64,
}

/// 固定权重的线性融合：Σ weight_i * prediction_i
///
/// 权重不要求和为 1。
#[derive(Debug, Clone)]
pub struct WeightedEnsemble<K> {
    members: Vec<EnsembleMember<K>>,
}

impl<K: Eq + Hash + Clone + Debug> WeightedEnsemble<K> {
    pub fn new(members: Vec<EnsembleMember<K>>) -> MLResult<Self> {
        if members.is_empty() {
            return Err(MLError::Ensemble("没有参与融合的模型".to_string()));
        }

        let mut names = HashSet::new();
        for member in &members {
            if !names.insert(member.name()) {
                return Err(MLError::Ensemble(format!("模型名 `{}` 重复", member.name())));
            }
        }

        let total: f64 = members.iter().map(|m| m.weight()).sum();
        if total <= 0.0 {
            return Err(MLError::Ensemble("权重全为 0".to_string()));
        }
        if (total - 1.0).abs() > 1e-6 {
            tracing::warn!("Ensemble weights sum to {}, not 1", total);
        }

        Ok(Self { members })
    }

    pub fn members(&self) -> &[EnsembleMember<K>] {
        &self.members
    }

    pub fn member_names(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.name()).collect()
    }

    /// 对给定主键逐行融合，任一成员缺少某个主键时报错
    pub fn combine(&self, keys: &[K]) -> MLResult<Vec<BlendedRow<K>>> {
        let rows = keys
            .iter()
            .map(|key| {
                let values = self
                    .members
                    .iter()
                    .map(|member| {
                        member.get(key).ok_or_else(|| {
                            MLError::Ensemble(format!("`{}` 缺少 {:?}", member.name(), key))
                        })
                    })
                    .collect::<MLResult<Vec<f64>>>()?;

                let value = values
                    .iter()
                    .zip(self.members.iter())
                    .map(|(v, m)| v * m.weight())
                    .sum();

                Ok(BlendedRow {
                    key: key.clone(),
                    members: values,
                    value,
                })
            })
            .collect::<MLResult<Vec<_>>>()?;

        tracing::info!(
            "Blended {} rows from {} models {:?}",
            rows.len(),
            self.members.len(),
            self.member_names()
        );
        Ok(rows)
    }

    /// 以外部主键表做左连接后融合
    ///
    /// 主键表不能有重复，并且必须覆盖所有成员的全部主键，否则报错，
    /// 不会悄悄丢掉某个模型的预测。
    pub fn combine_over(&self, keys: &[K]) -> MLResult<Vec<BlendedRow<K>>> {
        let mut universe = HashSet::with_capacity(keys.len());
        for key in keys {
            if !universe.insert(key) {
                return Err(MLError::Ensemble(format!("主键表中 {:?} 重复", key)));
            }
        }

        for member in &self.members {
            if let Some(key) = member.keys().iter().find(|k| !universe.contains(k)) {
                return Err(MLError::Ensemble(format!(
                    "`{}` 的 {:?} 不在主键表中",
                    member.name(),
                    key
                )));
            }
        }

        self.combine(keys)
    }

    /// 以第一个成员的主键为准融合
    pub fn combine_all(&self) -> MLResult<Vec<BlendedRow<K>>> {
        let keys = self.members[0].keys().to_vec();
        self.combine(&keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn member(name: &str, weight: f64, values: &[(i64, f64)]) -> EnsembleMember<i64> {
        EnsembleMember::new(name, weight, values.iter().copied()).unwrap()
    }

    #[test]
    fn test_constant_series_stay_constant() {
        let keys: Vec<(i64, f64)> = (0..10).map(|k| (k, 1234.5)).collect();
        let ensemble = WeightedEnsemble::new(vec![
            member("lake", 0.33, &keys),
            member("keng", 0.34, &keys),
            member("yuna", 0.33, &keys),
        ])
        .unwrap();

        let rows = ensemble.combine_all().unwrap();
        assert_eq!(rows.len(), 10);
        for row in rows {
            assert_abs_diff_eq!(row.value, 1234.5, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_weighted_sum() {
        let ensemble = WeightedEnsemble::new(vec![
            member("a", 0.5, &[(1, 10.0), (2, 20.0)]),
            member("b", 0.25, &[(2, 40.0), (1, 100.0)]),
        ])
        .unwrap();

        let rows = ensemble.combine(&[2, 1]).unwrap();
        assert_eq!(rows[0].key, 2);
        assert_eq!(rows[0].members, vec![20.0, 40.0]);
        // 权重和不为 1 时不做归一化
        assert_abs_diff_eq!(rows[0].value, 20.0);
        assert_abs_diff_eq!(rows[1].value, 30.0);
    }

    #[test]
    fn test_missing_key_is_an_error() {
        let ensemble = WeightedEnsemble::new(vec![
            member("a", 0.5, &[(1, 10.0), (2, 20.0)]),
            member("b", 0.5, &[(1, 10.0)]),
        ])
        .unwrap();

        let err = ensemble.combine_all().unwrap_err();
        assert!(matches!(err, MLError::Ensemble(msg) if msg.contains("`b`")));
    }

    #[test]
    fn test_combine_over_key_table() {
        let ensemble = WeightedEnsemble::new(vec![
            member("a", 0.5, &[(1, 10.0), (2, 20.0)]),
            member("b", 0.5, &[(2, 40.0), (1, 30.0)]),
        ])
        .unwrap();

        let rows = ensemble.combine_over(&[2, 1]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_abs_diff_eq!(rows[0].value, 30.0);

        // 成员有而主键表没有的主键
        let err = ensemble.combine_over(&[1]).unwrap_err();
        assert!(matches!(err, MLError::Ensemble(msg) if msg.contains("`a`")));

        // 主键表重复
        assert!(ensemble.combine_over(&[1, 2, 1]).is_err());

        // 主键表有而成员没有
        assert!(ensemble.combine_over(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_invalid_members() {
        assert!(EnsembleMember::new("a", -0.1, vec![(1i64, 1.0)]).is_err());
        assert!(EnsembleMember::new("a", 0.5, vec![(1i64, 1.0), (1, 2.0)]).is_err());
        assert!(WeightedEnsemble::<i64>::new(Vec::new()).is_err());
        assert!(WeightedEnsemble::new(vec![member("a", 0.0, &[(1, 1.0)])]).is_err());
        assert!(WeightedEnsemble::new(vec![
            member("a", 0.5, &[(1, 1.0)]),
            member("a", 0.5, &[(1, 1.0)]),
        ])
        .is_err());
    }
}
