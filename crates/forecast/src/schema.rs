//! 特征列定义和特征编码器
//!
//! 训练和预测共用同一份列顺序：
//! 数值列在前，随后是 `month_1..12`、`day_of_week_1..7`、`holiday_0..2`。

use crate::types::{ForecastError, ForecastResult};
use etl::CalendarRow;
use ml::preprocessing::{complete_rows, MinMaxScaler, OneHotEncoder};
use ndarray::{concatenate, Array2, Axis};
use serde::{Deserialize, Serialize};

/// 直接进入模型的数值列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericFeature {
    Year,
    Month,
    Day,
    DayOfYear,
    IsAfterNewyear,
    AfterNewYearWeight,
    IsBeforeSpringFest,
    LastDayBeforeSpring,
    IsAfterSpringFest,
    IsAfterNational,
}

impl NumericFeature {
    pub const ALL: [NumericFeature; 10] = [
        NumericFeature::Year,
        NumericFeature::Month,
        NumericFeature::Day,
        NumericFeature::DayOfYear,
        NumericFeature::IsAfterNewyear,
        NumericFeature::AfterNewYearWeight,
        NumericFeature::IsBeforeSpringFest,
        NumericFeature::LastDayBeforeSpring,
        NumericFeature::IsAfterSpringFest,
        NumericFeature::IsAfterNational,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            NumericFeature::Year => "year",
            NumericFeature::Month => "month",
            NumericFeature::Day => "day",
            NumericFeature::DayOfYear => "day_of_year",
            NumericFeature::IsAfterNewyear => "is_after_newyear",
            NumericFeature::AfterNewYearWeight => "after_new_year_weight",
            NumericFeature::IsBeforeSpringFest => "is_before_spring_fest",
            NumericFeature::LastDayBeforeSpring => "last_day_before_spring",
            NumericFeature::IsAfterSpringFest => "is_after_spring_fest",
            NumericFeature::IsAfterNational => "is_after_national",
        }
    }

    pub fn value(&self, row: &CalendarRow) -> f64 {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        let seasonal = &row.seasonal;
        match self {
            NumericFeature::Year => row.year as f64,
            NumericFeature::Month => row.month as f64,
            NumericFeature::Day => row.day as f64,
            NumericFeature::DayOfYear => row.day_of_year as f64,
            NumericFeature::IsAfterNewyear => flag(seasonal.is_after_newyear),
            NumericFeature::AfterNewYearWeight => seasonal.after_new_year_weight as f64,
            NumericFeature::IsBeforeSpringFest => flag(seasonal.is_before_spring_fest),
            NumericFeature::LastDayBeforeSpring => flag(seasonal.last_day_before_spring),
            NumericFeature::IsAfterSpringFest => flag(seasonal.is_after_spring_fest),
            NumericFeature::IsAfterNational => flag(seasonal.is_after_national),
        }
    }
}

/// 展开成指示列的类别列，类别集合固定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalFeature {
    Month,
    DayOfWeek,
    Holiday,
}

impl CategoricalFeature {
    pub const ALL: [CategoricalFeature; 3] = [
        CategoricalFeature::Month,
        CategoricalFeature::DayOfWeek,
        CategoricalFeature::Holiday,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CategoricalFeature::Month => "month",
            CategoricalFeature::DayOfWeek => "day_of_week",
            CategoricalFeature::Holiday => "holiday",
        }
    }

    pub fn categories(&self) -> Vec<i64> {
        match self {
            CategoricalFeature::Month => (1..=12).collect(),
            CategoricalFeature::DayOfWeek => (1..=7).collect(),
            CategoricalFeature::Holiday => (0..=2).collect(),
        }
    }

    pub fn value(&self, row: &CalendarRow) -> i64 {
        match self {
            CategoricalFeature::Month => row.month as i64,
            CategoricalFeature::DayOfWeek => row.observation.day_of_week as i64,
            CategoricalFeature::Holiday => row.holiday.code(),
        }
    }

    pub fn encoder(&self) -> ForecastResult<OneHotEncoder> {
        Ok(OneHotEncoder::new(self.name(), self.categories())?)
    }
}

/// 日历行到特征矩阵的编码器
///
/// 缩放参数只在训练集上拟合一次，之后随模型一起保存，预测时原样复用。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEncoder {
    scaled: Vec<NumericFeature>,
    scaler: Option<MinMaxScaler>,
    encoders: Vec<OneHotEncoder>,
}

impl FeatureEncoder {
    /// 在训练行上拟合
    pub fn fit(rows: &[CalendarRow], scaled: &[NumericFeature]) -> ForecastResult<Self> {
        if rows.is_empty() {
            return Err(ForecastError::EmptyDataset("拟合特征编码器的训练集".to_string()));
        }
        for (i, feature) in scaled.iter().enumerate() {
            if scaled[..i].contains(feature) {
                return Err(ForecastError::InvalidConfig(format!(
                    "缩放列 `{}` 重复",
                    feature.name()
                )));
            }
        }

        let scaler = if scaled.is_empty() {
            None
        } else {
            let raw = Self::numeric_matrix(rows, scaled);
            let complete = complete_rows(&raw);
            if complete.len() < raw.nrows() {
                tracing::warn!(
                    "Dropped {} rows with missing values before fitting scaler",
                    raw.nrows() - complete.len()
                );
            }
            Some(MinMaxScaler::fit(&raw.select(Axis(0), &complete))?)
        };

        let encoders = CategoricalFeature::ALL
            .iter()
            .map(|c| c.encoder())
            .collect::<ForecastResult<Vec<_>>>()?;

        let encoder = Self {
            scaled: scaled.to_vec(),
            scaler,
            encoders,
        };
        tracing::debug!("Feature columns: {:?}", encoder.column_names());
        Ok(encoder)
    }

    fn numeric_matrix(rows: &[CalendarRow], features: &[NumericFeature]) -> Array2<f64> {
        Array2::from_shape_fn((rows.len(), features.len()), |(i, j)| {
            features[j].value(&rows[i])
        })
    }

    pub fn scaled_columns(&self) -> &[NumericFeature] {
        &self.scaled
    }

    pub fn scaler(&self) -> Option<&MinMaxScaler> {
        self.scaler.as_ref()
    }

    pub fn column_names(&self) -> Vec<String> {
        NumericFeature::ALL
            .iter()
            .map(|f| f.name().to_string())
            .chain(self.encoders.iter().flat_map(|e| e.column_names()))
            .collect()
    }

    pub fn n_columns(&self) -> usize {
        NumericFeature::ALL.len() + self.encoders.iter().map(|e| e.n_columns()).sum::<usize>()
    }

    /// 编码成 `rows.len() x n_columns()` 的矩阵
    pub fn transform(&self, rows: &[CalendarRow]) -> ForecastResult<Array2<f64>> {
        let mut numeric = Self::numeric_matrix(rows, &NumericFeature::ALL);

        if let Some(scaler) = &self.scaler {
            let scaled = scaler.transform(&Self::numeric_matrix(rows, &self.scaled))?;
            for (j, feature) in self.scaled.iter().enumerate() {
                let col = NumericFeature::ALL
                    .iter()
                    .position(|f| f == feature)
                    .unwrap_or_default();
                numeric.column_mut(col).assign(&scaled.column(j));
            }
        }

        let mut blocks = vec![numeric];
        for (encoder, feature) in self.encoders.iter().zip(CategoricalFeature::ALL.iter()) {
            let values: Vec<i64> = rows.iter().map(|r| feature.value(r)).collect();
            blocks.push(encoder.encode(&values)?);
        }

        let views: Vec<_> = blocks.iter().map(|b| b.view()).collect();
        concatenate(Axis(1), &views)
            .map_err(|e| ForecastError::Ml(ml::MLError::Preprocessing(e.to_string())))
    }
}
