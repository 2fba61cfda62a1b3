//! 日历特征：周序号、推算日期、年月日拆分、节假日类型

use crate::holiday::HolidayOracle;
use crate::types::{
    CalendarRow, ETLError, ETLResult, HolidayClass, Observation, SeasonalFlags,
};
use chrono::{Datelike, Duration, NaiveDate};

/// 为每一行标记周序号
///
/// 当前行的星期几不大于上一行时认为进入了新的一周。第一行沿用
/// `start_week`。输入必须已经按时间排好序。
pub fn assign_week(days_of_week: &[u32], start_week: i64) -> Vec<i64> {
    let mut week = start_week;
    let mut prev: Option<u32> = None;

    days_of_week
        .iter()
        .map(|&day| {
            if matches!(prev, Some(p) if p >= day) {
                week += 1;
            }
            prev = Some(day);
            week
        })
        .collect()
}

/// date = origin + 7 * week + day_of_week
pub fn reconstruct_date(origin: NaiveDate, week: i64, day_of_week: u32) -> Option<NaiveDate> {
    let offset = week.checked_mul(7)?.checked_add(i64::from(day_of_week))?;
    origin.checked_add_signed(Duration::try_days(offset)?)
}

/// 日期拆分出的字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateParts {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub day_of_year: u32,
    pub month_day: u32,
}

impl DateParts {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
            day: date.day(),
            day_of_year: date.ordinal0(),
            month_day: date.month() * 100 + date.day(),
        }
    }
}

/// 日历特征生成器
#[derive(Debug, Clone)]
pub struct CalendarFeaturizer {
    origin: NaiveDate,
}

impl CalendarFeaturizer {
    pub fn new(origin: NaiveDate) -> Self {
        Self { origin }
    }

    pub fn origin(&self) -> NaiveDate {
        self.origin
    }

    /// 推算日期并拆分，节假日类型先填工作日，由 [`Self::classify`] 覆盖
    pub fn reconstruct(
        &self,
        observations: Vec<Observation>,
        start_week: i64,
    ) -> ETLResult<Vec<CalendarRow>> {
        for (i, obs) in observations.iter().enumerate() {
            if !(1..=7).contains(&obs.day_of_week) {
                return Err(ETLError::MalformedRow {
                    line: i as u64 + 1,
                    reason: format!("day_of_week 超出 1-7: {}", obs.day_of_week),
                });
            }
        }

        let days: Vec<u32> = observations.iter().map(|o| o.day_of_week).collect();
        let weeks = assign_week(&days, start_week);

        observations
            .into_iter()
            .zip(weeks)
            .enumerate()
            .map(|(i, (observation, week))| {
                let guess_date = reconstruct_date(self.origin, week, observation.day_of_week)
                    .ok_or_else(|| ETLError::MalformedRow {
                        line: i as u64 + 1,
                        reason: format!("第 {} 周超出日期范围", week),
                    })?;
                let parts = DateParts::from_date(guess_date);
                Ok(CalendarRow {
                    observation,
                    week,
                    guess_date,
                    year: parts.year,
                    month: parts.month,
                    day: parts.day,
                    day_of_year: parts.day_of_year,
                    month_day: parts.month_day,
                    holiday: HolidayClass::Workday,
                    seasonal: SeasonalFlags::default(),
                })
            })
            .collect()
    }

    /// 查询每个推算日期的节假日类型
    pub async fn classify(
        &self,
        rows: &mut [CalendarRow],
        oracle: &mut HolidayOracle,
    ) -> ETLResult<()> {
        let dates: Vec<NaiveDate> = rows.iter().map(|r| r.guess_date).collect();
        let classes = oracle.classify(&dates).await?;

        for row in rows.iter_mut() {
            row.holiday = classes
                .get(&row.guess_date)
                .copied()
                .ok_or_else(|| ETLError::HolidayMissing(row.guess_date.to_string()))?;
        }

        tracing::info!(
            "Classified {} rows over {} unique dates via {}",
            rows.len(),
            classes.len(),
            oracle.source_name()
        );
        Ok(())
    }

    /// 完整的日历特征流程：周序号 -> 日期 -> 节假日
    pub async fn featurize(
        &self,
        observations: Vec<Observation>,
        start_week: i64,
        oracle: &mut HolidayOracle,
    ) -> ETLResult<Vec<CalendarRow>> {
        let mut rows = self.reconstruct(observations, start_week)?;
        self.classify(&mut rows, oracle).await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::holiday::FixedHolidaySource;

    fn obs(date: i64, day_of_week: u32) -> Observation {
        Observation {
            date,
            day_of_week,
            brand: None,
            cnt: Some(100.0),
        }
    }

    #[test]
    fn test_assign_week_wraps_on_drop() {
        assert_eq!(assign_week(&[3, 4, 5, 1, 2], 0), vec![0, 0, 0, 1, 1]);
    }

    #[test]
    fn test_assign_week_repeated_day_starts_new_week() {
        assert_eq!(assign_week(&[1, 1, 7, 7], 10), vec![10, 11, 11, 12]);
        assert!(assign_week(&[], 3).is_empty());
    }

    #[test]
    fn test_reconstruct_date() {
        let origin = NaiveDate::from_ymd_opt(2012, 12, 30).unwrap();
        assert_eq!(
            reconstruct_date(origin, 0, 2),
            NaiveDate::from_ymd_opt(2013, 1, 1)
        );
        assert_eq!(
            reconstruct_date(origin, 1, 1),
            NaiveDate::from_ymd_opt(2013, 1, 7)
        );
    }

    #[test]
    fn test_date_parts() {
        let parts = DateParts::from_date(NaiveDate::from_ymd_opt(2016, 3, 1).unwrap());
        assert_eq!(parts.year, 2016);
        assert_eq!(parts.month, 3);
        assert_eq!(parts.day, 1);
        // 闰年：31 + 29
        assert_eq!(parts.day_of_year, 60);
        assert_eq!(parts.month_day, 301);

        let jan1 = DateParts::from_date(NaiveDate::from_ymd_opt(2015, 1, 1).unwrap());
        assert_eq!(jan1.day_of_year, 0);
    }

    #[test]
    fn test_reconstructed_dates_are_monotonic() {
        let featurizer = CalendarFeaturizer::new(NaiveDate::from_ymd_opt(2012, 12, 30).unwrap());
        // 缺几天、跨周、重复日都有
        let days = [2, 3, 5, 6, 1, 2, 4, 7, 7, 1, 3, 6, 2];
        let observations = days
            .iter()
            .enumerate()
            .map(|(i, &d)| obs(i as i64 + 1, d))
            .collect();

        let rows = featurizer.reconstruct(observations, 0).unwrap();
        assert!(rows.windows(2).all(|w| w[0].guess_date <= w[1].guess_date));
        assert!(rows
            .windows(2)
            .all(|w| w[0].week * 7 + i64::from(w[0].observation.day_of_week)
                <= w[1].week * 7 + i64::from(w[1].observation.day_of_week)));
    }

    #[test]
    fn test_reconstruct_rejects_bad_day_of_week() {
        let featurizer = CalendarFeaturizer::new(NaiveDate::from_ymd_opt(2012, 12, 30).unwrap());
        let err = featurizer.reconstruct(vec![obs(1, 2), obs(2, 8)], 0).unwrap_err();
        assert!(matches!(err, ETLError::MalformedRow { line: 2, .. }));
    }

    #[tokio::test]
    async fn test_featurize_attaches_holiday_class() {
        let new_year = NaiveDate::from_ymd_opt(2013, 1, 1).unwrap();
        let source = FixedHolidaySource::weekends_only().with_holidays(new_year, new_year);
        let mut oracle = HolidayOracle::new(Box::new(source), 50);
        let featurizer = CalendarFeaturizer::new(NaiveDate::from_ymd_opt(2012, 12, 30).unwrap());

        // 2013-01-01 周二 .. 2013-01-06 周日
        let observations = (2..=7).map(|d| obs(i64::from(d), d)).collect();
        let rows = featurizer.featurize(observations, 0, &mut oracle).await.unwrap();

        assert_eq!(rows[0].guess_date, new_year);
        assert_eq!(rows[0].holiday, HolidayClass::Holiday);
        assert_eq!(rows[1].holiday, HolidayClass::Workday);
        assert_eq!(rows[4].holiday, HolidayClass::Weekend);
        assert_eq!(rows[5].holiday, HolidayClass::Weekend);
    }
}
