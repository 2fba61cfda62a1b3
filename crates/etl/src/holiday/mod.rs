//! 节假日查询模块

pub mod bitefu;
pub mod fixed;

use crate::types::{ETLError, ETLResult, HolidayClass};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};

pub use bitefu::BitefuHolidaySource;
pub use fixed::FixedHolidaySource;

/// 节假日数据源接口
#[async_trait]
pub trait HolidaySource: Send + Sync {
    /// 数据源名称
    fn name(&self) -> &str;

    /// 查询一批日期，返回结果必须覆盖全部请求的日期
    async fn lookup(&self, dates: &[NaiveDate]) -> ETLResult<HashMap<NaiveDate, HolidayClass>>;
}

/// 带缓存的节假日查询
///
/// 同一次运行中每个日期只会请求一次。
pub struct HolidayOracle {
    source: Box<dyn HolidaySource>,
    cache: HashMap<NaiveDate, HolidayClass>,
    batch_size: usize,
    requests: usize,
}

impl HolidayOracle {
    pub fn new(source: Box<dyn HolidaySource>, batch_size: usize) -> Self {
        Self {
            source,
            cache: HashMap::new(),
            batch_size: batch_size.max(1),
            requests: 0,
        }
    }

    /// 查询日期类型，返回请求日期到类型的映射
    pub async fn classify(
        &mut self,
        dates: &[NaiveDate],
    ) -> ETLResult<HashMap<NaiveDate, HolidayClass>> {
        let unique: BTreeSet<NaiveDate> = dates.iter().copied().collect();
        let missing: Vec<NaiveDate> = unique
            .iter()
            .filter(|d| !self.cache.contains_key(d))
            .copied()
            .collect();

        tracing::debug!(
            "Classifying {} unique dates ({} cached, {} to fetch)",
            unique.len(),
            unique.len() - missing.len(),
            missing.len()
        );

        for chunk in missing.chunks(self.batch_size) {
            let fetched = self.source.lookup(chunk).await?;
            self.requests += 1;
            for date in chunk {
                let class = fetched
                    .get(date)
                    .copied()
                    .ok_or_else(|| ETLError::HolidayMissing(format_date(*date)))?;
                self.cache.insert(*date, class);
            }
        }

        unique
            .into_iter()
            .map(|d| {
                self.cache
                    .get(&d)
                    .map(|class| (d, *class))
                    .ok_or_else(|| ETLError::HolidayMissing(format_date(d)))
            })
            .collect()
    }

    /// 查询闭区间 [start, end] 内每天的类型，按日期升序返回
    pub async fn classify_range(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ETLResult<Vec<(NaiveDate, HolidayClass)>> {
        let dates: Vec<NaiveDate> = start.iter_days().take_while(|d| *d <= end).collect();
        let classes = self.classify(&dates).await?;
        Ok(dates.into_iter().map(|d| (d, classes[&d])).collect())
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// 已发出的请求数
    pub fn requests(&self) -> usize {
        self.requests
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

/// 接口使用的日期格式 YYYYMMDD
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// 通用 HTTP 客户端配置
pub fn create_http_client(timeout_secs: u64) -> ETLResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent("Mozilla/5.0 (compatible; SalesForecast/1.0)")
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(Into::into)
}
