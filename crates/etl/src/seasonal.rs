//! 元旦后、春节前后、国庆后的工作日窗口标记
//!
//! 每个年份单独计算：在固定的日期区间内查询节假日类型，按顺序取前 N 个
//! （或最后 N 个）工作日，然后把窗口映射回数据行。

use crate::holiday::HolidayOracle;
use crate::types::{CalendarRow, ETLConfig, ETLError, ETLResult, HolidayClass, SpringFestivalPolicy};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// 单个年份的窗口
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YearWindows {
    /// 元旦后的工作日及其权重
    pub after_new_year: Vec<(NaiveDate, u32)>,
    pub before_spring: Vec<NaiveDate>,
    pub after_spring: Vec<NaiveDate>,
    pub after_national: Vec<NaiveDate>,
}

impl YearWindows {
    pub fn last_day_before_spring(&self) -> Option<NaiveDate> {
        self.before_spring.last().copied()
    }
}

/// 窗口标记器
#[derive(Debug, Clone)]
pub struct SeasonalWindowTagger {
    new_year_len: usize,
    spring_before_len: usize,
    spring_after_len: usize,
    national_len: usize,
    spring_festivals: BTreeMap<i32, NaiveDate>,
    policy: SpringFestivalPolicy,
}

impl SeasonalWindowTagger {
    pub fn new(config: &ETLConfig) -> Self {
        Self {
            new_year_len: config.new_year_window,
            spring_before_len: config.spring_before_window,
            spring_after_len: config.spring_after_window,
            national_len: config.national_day_window,
            spring_festivals: config.spring_festivals.clone(),
            policy: config.unknown_spring_festival,
        }
    }

    /// 检查数据中出现的年份是否都配置了春节日期
    pub fn validate_years(&self, years: &BTreeSet<i32>) -> ETLResult<()> {
        if self.policy == SpringFestivalPolicy::Skip {
            return Ok(());
        }
        match years.iter().find(|y| !self.spring_festivals.contains_key(y)) {
            Some(year) => Err(ETLError::UnknownSpringFestival(*year)),
            None => Ok(()),
        }
    }

    /// 查询某年的节假日并计算窗口
    pub async fn windows_for_year(
        &self,
        year: i32,
        oracle: &mut HolidayOracle,
    ) -> ETLResult<YearWindows> {
        let (jan_start, jan_end) = (ymd(year, 1, 1)?, ymd(year, 1, 30)?);
        let new_year_days = oracle.classify_range(jan_start, jan_end).await?;

        let festival = match self.spring_festivals.get(&year) {
            Some(date) => Some(*date),
            None if self.policy == SpringFestivalPolicy::Skip => {
                tracing::warn!("No spring festival date for {}, skipping spring windows", year);
                None
            }
            None => return Err(ETLError::UnknownSpringFestival(year)),
        };
        let spring_days = match festival {
            Some(_) => oracle.classify_range(jan_start, ymd(year, 3, 10)?).await?,
            None => Vec::new(),
        };

        let national_days = oracle
            .classify_range(ymd(year, 10, 1)?, ymd(year, 10, 10)?)
            .await?;

        let windows = self.compute_windows(&new_year_days, festival, &spring_days, &national_days);
        tracing::debug!(
            "Windows for {}: {} after new year, {}/{} around spring festival, {} after national day",
            year,
            windows.after_new_year.len(),
            windows.before_spring.len(),
            windows.after_spring.len(),
            windows.after_national.len()
        );
        Ok(windows)
    }

    /// 根据已分类的日期计算窗口（输入需按日期升序）
    pub fn compute_windows(
        &self,
        new_year_days: &[(NaiveDate, HolidayClass)],
        spring_festival: Option<NaiveDate>,
        spring_days: &[(NaiveDate, HolidayClass)],
        national_days: &[(NaiveDate, HolidayClass)],
    ) -> YearWindows {
        let n = self.new_year_len;
        let after_new_year = first_workdays(new_year_days, n)
            .into_iter()
            .enumerate()
            .map(|(i, d)| (d, (n - i) as u32))
            .collect();

        let (before_spring, after_spring) = match spring_festival {
            Some(festival) => {
                let (before, after): (Vec<_>, Vec<_>) =
                    spring_days.iter().copied().partition(|(d, _)| *d < festival);
                (
                    last_workdays(&before, self.spring_before_len),
                    first_workdays(&after, self.spring_after_len),
                )
            }
            None => (Vec::new(), Vec::new()),
        };

        YearWindows {
            after_new_year,
            before_spring,
            after_spring,
            after_national: first_workdays(national_days, self.national_len),
        }
    }

    /// 为所有行打上窗口标记
    pub async fn tag(&self, rows: &mut [CalendarRow], oracle: &mut HolidayOracle) -> ETLResult<()> {
        let years: BTreeSet<i32> = rows.iter().map(|r| r.year).collect();
        self.validate_years(&years)?;

        let mut by_year = HashMap::with_capacity(years.len());
        for year in &years {
            by_year.insert(*year, self.windows_for_year(*year, oracle).await?);
        }

        for row in rows.iter_mut() {
            if let Some(windows) = by_year.get(&row.year) {
                apply_windows(row, windows);
            }
        }

        tracing::info!("Tagged seasonal windows for years {:?}", years);
        Ok(())
    }
}

fn apply_windows(row: &mut CalendarRow, windows: &YearWindows) {
    let date = row.guess_date;
    let flags = &mut row.seasonal;

    if let Some((_, weight)) = windows.after_new_year.iter().find(|(d, _)| *d == date) {
        flags.is_after_newyear = true;
        flags.after_new_year_weight = *weight;
    }
    flags.is_before_spring_fest = windows.before_spring.contains(&date);
    flags.last_day_before_spring = windows.last_day_before_spring() == Some(date);
    flags.is_after_spring_fest = windows.after_spring.contains(&date);
    flags.is_after_national = windows.after_national.contains(&date);
}

fn first_workdays(days: &[(NaiveDate, HolidayClass)], n: usize) -> Vec<NaiveDate> {
    days.iter()
        .filter(|(_, class)| class.is_workday())
        .take(n)
        .map(|(d, _)| *d)
        .collect()
}

fn last_workdays(days: &[(NaiveDate, HolidayClass)], n: usize) -> Vec<NaiveDate> {
    let mut picked: Vec<NaiveDate> = days
        .iter()
        .rev()
        .filter(|(_, class)| class.is_workday())
        .take(n)
        .map(|(d, _)| *d)
        .collect();
    picked.reverse();
    picked
}

fn ymd(year: i32, month: u32, day: u32) -> ETLResult<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| ETLError::InvalidConfig(format!("无效日期 {}-{}-{}", year, month, day)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::holiday::FixedHolidaySource;
    use crate::types::{Observation, SeasonalFlags};
    use crate::calendar::DateParts;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    /// 2014 年的实际安排：元旦 1 月 1 日，春节 1 月 31 日 - 2 月 6 日，
    /// 1 月 26 日（周日）和 2 月 8 日（周六）调休上班，国庆 10 月 1 - 7 日，
    /// 10 月 11 日调休上班
    fn source_2014() -> FixedHolidaySource {
        FixedHolidaySource::weekends_only()
            .with_holidays(d(2014, 1, 1), d(2014, 1, 1))
            .with_holidays(d(2014, 1, 31), d(2014, 2, 6))
            .with_workday(d(2014, 1, 26))
            .with_workday(d(2014, 2, 8))
            .with_holidays(d(2014, 10, 1), d(2014, 10, 7))
            .with_workday(d(2014, 10, 11))
    }

    fn row(date: NaiveDate) -> CalendarRow {
        let parts = DateParts::from_date(date);
        CalendarRow {
            observation: Observation {
                date: 0,
                day_of_week: 1,
                brand: None,
                cnt: None,
            },
            week: 0,
            guess_date: date,
            year: parts.year,
            month: parts.month,
            day: parts.day,
            day_of_year: parts.day_of_year,
            month_day: parts.month_day,
            holiday: HolidayClass::Workday,
            seasonal: SeasonalFlags::default(),
        }
    }

    #[tokio::test]
    async fn test_spring_festival_2014_windows() {
        let tagger = SeasonalWindowTagger::new(&ETLConfig::default());
        let mut oracle = HolidayOracle::new(Box::new(source_2014()), 100);

        let windows = tagger.windows_for_year(2014, &mut oracle).await.unwrap();

        let expected_before = vec![
            d(2014, 1, 21),
            d(2014, 1, 22),
            d(2014, 1, 23),
            d(2014, 1, 24),
            d(2014, 1, 26),
            d(2014, 1, 27),
            d(2014, 1, 28),
            d(2014, 1, 29),
            d(2014, 1, 30),
        ];
        assert_eq!(windows.before_spring, expected_before);
        assert_eq!(windows.last_day_before_spring(), Some(d(2014, 1, 30)));

        let expected_after = vec![
            d(2014, 2, 7),
            d(2014, 2, 8),
            d(2014, 2, 10),
            d(2014, 2, 11),
            d(2014, 2, 12),
        ];
        assert_eq!(windows.after_spring, expected_after);
    }

    #[tokio::test]
    async fn test_new_year_weights_decay() {
        let tagger = SeasonalWindowTagger::new(&ETLConfig::default());
        let mut oracle = HolidayOracle::new(Box::new(source_2014()), 100);

        let windows = tagger.windows_for_year(2014, &mut oracle).await.unwrap();
        assert_eq!(
            windows.after_new_year,
            vec![
                (d(2014, 1, 2), 5),
                (d(2014, 1, 3), 4),
                (d(2014, 1, 6), 3),
                (d(2014, 1, 7), 2),
                (d(2014, 1, 8), 1),
            ]
        );
        assert_eq!(windows.after_national, vec![d(2014, 10, 8)]);
    }

    #[tokio::test]
    async fn test_tag_marks_rows() {
        let tagger = SeasonalWindowTagger::new(&ETLConfig::default());
        let mut oracle = HolidayOracle::new(Box::new(source_2014()), 100);

        let mut rows: Vec<CalendarRow> = d(2014, 1, 1)
            .iter_days()
            .take_while(|x| *x <= d(2014, 2, 28))
            .map(row)
            .collect();
        rows.push(row(d(2014, 10, 8)));

        tagger.tag(&mut rows, &mut oracle).await.unwrap();

        let before: Vec<NaiveDate> = rows
            .iter()
            .filter(|r| r.seasonal.is_before_spring_fest)
            .map(|r| r.guess_date)
            .collect();
        assert_eq!(before.len(), 9);
        assert!(before.iter().all(|x| *x < d(2014, 1, 31)));

        let after = rows.iter().filter(|r| r.seasonal.is_after_spring_fest).count();
        assert_eq!(after, 5);

        let last: Vec<_> = rows.iter().filter(|r| r.seasonal.last_day_before_spring).collect();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].guess_date, d(2014, 1, 30));

        let jan2 = rows.iter().find(|r| r.guess_date == d(2014, 1, 2)).unwrap();
        assert!(jan2.seasonal.is_after_newyear);
        assert_eq!(jan2.seasonal.after_new_year_weight, 5);

        let national = rows.last().unwrap();
        assert!(national.seasonal.is_after_national);
    }

    #[tokio::test]
    async fn test_unknown_year_fails_by_default() {
        let tagger = SeasonalWindowTagger::new(&ETLConfig::default());
        let mut oracle = HolidayOracle::new(Box::new(FixedHolidaySource::weekends_only()), 100);
        let mut rows = vec![row(d(2018, 2, 1))];

        let err = tagger.tag(&mut rows, &mut oracle).await.unwrap_err();
        assert!(matches!(err, ETLError::UnknownSpringFestival(2018)));
        // 校验在查询之前完成
        assert_eq!(oracle.requests(), 0);
    }

    #[tokio::test]
    async fn test_unknown_year_skip_policy() {
        let config = ETLConfig {
            unknown_spring_festival: SpringFestivalPolicy::Skip,
            ..ETLConfig::default()
        };
        let tagger = SeasonalWindowTagger::new(&config);
        let mut oracle = HolidayOracle::new(Box::new(FixedHolidaySource::weekends_only()), 100);
        let mut rows = vec![row(d(2018, 1, 2)), row(d(2018, 2, 20))];

        tagger.tag(&mut rows, &mut oracle).await.unwrap();
        assert!(rows[0].seasonal.is_after_newyear);
        assert!(!rows[1].seasonal.is_before_spring_fest);
        assert!(!rows[1].seasonal.is_after_spring_fest);
    }

    #[test]
    fn test_short_windows_do_not_panic() {
        let tagger = SeasonalWindowTagger::new(&ETLConfig::default());
        let all_holidays: Vec<_> = d(2015, 1, 1)
            .iter_days()
            .take(30)
            .map(|x| (x, HolidayClass::Holiday))
            .collect();

        let windows = tagger.compute_windows(&all_holidays, Some(d(2015, 1, 10)), &all_holidays, &[]);
        assert!(windows.after_new_year.is_empty());
        assert!(windows.before_spring.is_empty());
        assert_eq!(windows.last_day_before_spring(), None);
    }
}
