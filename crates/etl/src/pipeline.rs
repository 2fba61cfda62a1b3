//! 特征管道：原始观测 -> 日历特征 -> 节假日窗口

use crate::calendar::CalendarFeaturizer;
use crate::holiday::{BitefuHolidaySource, HolidayOracle, HolidaySource};
use crate::seasonal::SeasonalWindowTagger;
use crate::types::{
    CalendarRow, ETLConfig, ETLError, ETLResult, Observation, SpringFestivalPolicy,
};
use chrono::NaiveDate;
use std::collections::HashMap;

/// 特征管道
pub struct FeaturePipeline {
    config: ETLConfig,
    featurizer: CalendarFeaturizer,
    tagger: SeasonalWindowTagger,
}

impl FeaturePipeline {
    pub fn new(config: ETLConfig) -> ETLResult<Self> {
        config.validate()?;
        Ok(Self {
            featurizer: CalendarFeaturizer::new(config.calendar_origin),
            tagger: SeasonalWindowTagger::new(&config),
            config,
        })
    }

    pub fn config(&self) -> &ETLConfig {
        &self.config
    }

    /// 按配置创建查询 HTTP 接口的 oracle
    pub fn http_oracle(&self) -> ETLResult<HolidayOracle> {
        let source = BitefuHolidaySource::from_config(&self.config)?;
        Ok(self.oracle_with(Box::new(source)))
    }

    pub fn oracle_with(&self, source: Box<dyn HolidaySource>) -> HolidayOracle {
        HolidayOracle::new(source, self.config.holiday_batch_size)
    }

    /// 完整的特征流程
    ///
    /// 输入必须按时间排序；`start_week` 是第一行所在的周序号，预测集
    /// 接在训练集后面时传训练集最后一行的周序号。
    pub async fn run(
        &self,
        observations: Vec<Observation>,
        start_week: i64,
        oracle: &mut HolidayOracle,
    ) -> ETLResult<Vec<CalendarRow>> {
        tracing::info!(
            "Running feature pipeline for {} observations (start week {})",
            observations.len(),
            start_week
        );

        let mut rows = self.featurizer.featurize(observations, start_week, oracle).await?;
        self.tagger.tag(&mut rows, oracle).await?;

        tracing::info!(
            "Feature pipeline completed: {} rows, {} holiday requests so far",
            rows.len(),
            oracle.requests()
        );
        Ok(rows)
    }

    /// 同一天有多行（例如按品牌拆开）时使用
    ///
    /// 按首次出现的顺序对日期去重后生成特征，再展开回每一行，输出与输入
    /// 逐行对应。同一日期的 `day_of_week` 必须一致。
    pub async fn run_per_date(
        &self,
        observations: Vec<Observation>,
        start_week: i64,
        oracle: &mut HolidayOracle,
    ) -> ETLResult<Vec<CalendarRow>> {
        let mut days: Vec<Observation> = Vec::new();
        let mut index: HashMap<i64, usize> = HashMap::new();
        for (i, obs) in observations.iter().enumerate() {
            match index.get(&obs.date) {
                Some(&k) if days[k].day_of_week != obs.day_of_week => {
                    return Err(ETLError::MalformedRow {
                        line: i as u64 + 1,
                        reason: format!(
                            "日期 {} 的 day_of_week 不一致: {} / {}",
                            obs.date, days[k].day_of_week, obs.day_of_week
                        ),
                    });
                }
                Some(_) => {}
                None => {
                    index.insert(obs.date, days.len());
                    days.push(Observation {
                        date: obs.date,
                        day_of_week: obs.day_of_week,
                        brand: None,
                        cnt: None,
                    });
                }
            }
        }
        tracing::debug!("{} rows share {} dates", observations.len(), days.len());

        let daily = self.run(days, start_week, oracle).await?;
        observations
            .into_iter()
            .map(|observation| {
                let mut row = index
                    .get(&observation.date)
                    .and_then(|&k| daily.get(k))
                    .cloned()
                    .ok_or_else(|| ETLError::HolidayMissing(observation.date.to_string()))?;
                row.observation = observation;
                Ok(row)
            })
            .collect()
    }
}

/// 特征管道构建器
pub struct FeaturePipelineBuilder {
    config: ETLConfig,
}

impl FeaturePipelineBuilder {
    pub fn new() -> Self {
        Self {
            config: ETLConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ETLConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_origin(mut self, origin: NaiveDate) -> Self {
        self.config.calendar_origin = origin;
        self
    }

    pub fn with_holiday_api(mut self, url: impl Into<String>) -> Self {
        self.config.holiday_api_url = url.into();
        self
    }

    pub fn with_spring_festival(mut self, date: NaiveDate) -> Self {
        self.config
            .spring_festivals
            .insert(chrono::Datelike::year(&date), date);
        self
    }

    pub fn skip_unknown_spring_festival(mut self, skip: bool) -> Self {
        self.config.unknown_spring_festival = if skip {
            SpringFestivalPolicy::Skip
        } else {
            SpringFestivalPolicy::Fail
        };
        self
    }

    pub fn build(self) -> ETLResult<FeaturePipeline> {
        FeaturePipeline::new(self.config)
    }
}

impl Default for FeaturePipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
