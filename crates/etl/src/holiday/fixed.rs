//! 本地规则数据源：周六日为休息日，其余为工作日，再叠加显式调整

use super::HolidaySource;
use crate::types::{ETLResult, HolidayClass};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct FixedHolidaySource {
    overrides: HashMap<NaiveDate, HolidayClass>,
}

impl FixedHolidaySource {
    pub fn weekends_only() -> Self {
        Self::default()
    }

    pub fn with_override(mut self, date: NaiveDate, class: HolidayClass) -> Self {
        self.overrides.insert(date, class);
        self
    }

    /// 闭区间内的每一天都标记为节假日
    pub fn with_holidays(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        for date in start.iter_days().take_while(|d| *d <= end) {
            self.overrides.insert(date, HolidayClass::Holiday);
        }
        self
    }

    /// 调休上班的周末
    pub fn with_workday(self, date: NaiveDate) -> Self {
        self.with_override(date, HolidayClass::Workday)
    }

    pub fn class_of(&self, date: NaiveDate) -> HolidayClass {
        if let Some(class) = self.overrides.get(&date) {
            return *class;
        }
        match date.weekday() {
            Weekday::Sat | Weekday::Sun => HolidayClass::Weekend,
            _ => HolidayClass::Workday,
        }
    }
}

#[async_trait]
impl HolidaySource for FixedHolidaySource {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn lookup(&self, dates: &[NaiveDate]) -> ETLResult<HashMap<NaiveDate, HolidayClass>> {
        Ok(dates.iter().map(|d| (*d, self.class_of(*d))).collect())
    }
}
