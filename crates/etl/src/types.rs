//! 核心类型定义

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

pub type ETLResult<T> = Result<T, ETLError>;

#[derive(Debug, Error)]
pub enum ETLError {
    #[error("HTTP 请求失败: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("JSON 解析失败: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("节假日接口返回了无法识别的值: {date} => {value}")]
    HolidayCode { date: String, value: String },

    #[error("节假日接口没有返回日期 {0}")]
    HolidayMissing(String),

    #[error("缺少字段 `{column}` ({path})")]
    MissingColumn { column: String, path: PathBuf },

    #[error("第 {line} 行数据格式错误: {reason}")]
    MalformedRow { line: u64, reason: String },

    #[error("未配置 {0} 年的春节日期")]
    UnknownSpringFestival(i32),

    #[error("CSV 错误: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("无效的配置: {0}")]
    InvalidConfig(String),
}

/// 原始观测（一行输入）
///
/// `date` 是比赛数据里的日期编号，并不是真实日期；真实日期由
/// 周序号和星期几推算出来。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: i64,
    /// 1-7
    pub day_of_week: u32,
    pub brand: Option<i64>,
    /// 目标值，预测集中没有
    pub cnt: Option<f64>,
}

/// 预测结果的主键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PredictionKey {
    pub date: i64,
    pub brand: Option<i64>,
}

impl std::fmt::Display for PredictionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.brand {
            Some(brand) => write!(f, "date={} brand={}", self.date, brand),
            None => write!(f, "date={}", self.date),
        }
    }
}

/// 日期类型：0 工作日，1 休息日，2 节假日
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HolidayClass {
    Workday,
    Weekend,
    Holiday,
}

impl HolidayClass {
    pub const ALL: [HolidayClass; 3] =
        [HolidayClass::Workday, HolidayClass::Weekend, HolidayClass::Holiday];

    pub fn code(&self) -> i64 {
        match self {
            HolidayClass::Workday => 0,
            HolidayClass::Weekend => 1,
            HolidayClass::Holiday => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(HolidayClass::Workday),
            1 => Some(HolidayClass::Weekend),
            2 => Some(HolidayClass::Holiday),
            _ => None,
        }
    }

    pub fn is_workday(&self) -> bool {
        matches!(self, HolidayClass::Workday)
    }
}

impl std::fmt::Display for HolidayClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// 节假日窗口标记
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonalFlags {
    pub is_after_newyear: bool,
    /// 元旦后第 i 个工作日的权重为 N - i
    pub after_new_year_weight: u32,
    pub is_before_spring_fest: bool,
    pub last_day_before_spring: bool,
    pub is_after_spring_fest: bool,
    pub is_after_national: bool,
}

/// 带完整日历特征的一行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarRow {
    pub observation: Observation,
    pub week: i64,
    pub guess_date: NaiveDate,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    /// 从 0 开始，1 月 1 日为 0
    pub day_of_year: u32,
    /// month * 100 + day
    pub month_day: u32,
    pub holiday: HolidayClass,
    pub seasonal: SeasonalFlags,
}

impl CalendarRow {
    pub fn key(&self) -> PredictionKey {
        PredictionKey {
            date: self.observation.date,
            brand: self.observation.brand,
        }
    }
}

/// 春节日期未配置时的处理方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpringFestivalPolicy {
    /// 直接报错
    #[default]
    Fail,
    /// 跳过该年的春节标记
    Skip,
}

/// ETL 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ETLConfig {
    /// 节假日查询接口
    pub holiday_api_url: String,
    /// 请求超时（秒）
    pub request_timeout_secs: u64,
    /// 每次请求最多查询的日期数
    pub holiday_batch_size: usize,
    /// 第 0 周第 0 天对应的日期
    pub calendar_origin: NaiveDate,
    pub new_year_window: usize,
    pub spring_before_window: usize,
    pub spring_after_window: usize,
    pub national_day_window: usize,
    /// 每年春节（正月初一）的日期
    pub spring_festivals: BTreeMap<i32, NaiveDate>,
    pub unknown_spring_festival: SpringFestivalPolicy,
}

impl Default for ETLConfig {
    fn default() -> Self {
        let spring_festivals = [
            (2013, (2, 10)),
            (2014, (1, 31)),
            (2015, (2, 19)),
            (2016, (2, 8)),
            (2017, (1, 28)),
        ]
        .into_iter()
        .filter_map(|(y, (m, d))| NaiveDate::from_ymd_opt(y, m, d).map(|date| (y, date)))
        .collect();

        Self {
            holiday_api_url: "http://tool.bitefu.net/jiari/".to_string(),
            request_timeout_secs: 30,
            holiday_batch_size: 100,
            calendar_origin: NaiveDate::from_ymd_opt(2012, 12, 30).unwrap_or_default(),
            new_year_window: 5,
            spring_before_window: 9,
            spring_after_window: 5,
            national_day_window: 1,
            spring_festivals,
            unknown_spring_festival: SpringFestivalPolicy::Fail,
        }
    }
}

impl ETLConfig {
    pub fn validate(&self) -> ETLResult<()> {
        if self.holiday_batch_size == 0 {
            return Err(ETLError::InvalidConfig(
                "holiday_batch_size 必须大于 0".to_string(),
            ));
        }
        if self.holiday_api_url.is_empty() {
            return Err(ETLError::InvalidConfig("holiday_api_url 为空".to_string()));
        }
        for (year, date) in &self.spring_festivals {
            if chrono::Datelike::year(date) != *year {
                return Err(ETLError::InvalidConfig(format!(
                    "春节日期 {} 不属于 {} 年",
                    date, year
                )));
            }
        }
        Ok(())
    }
}
