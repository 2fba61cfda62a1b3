//! # ETL - Extract, Transform, Load
//!
//! 日销量预测的数据准备
//!
//! ## 功能
//!
//! - 读取分隔符文本表，按日期汇总
//! - 通过周序号和星期几推算真实日期
//! - 查询第三方节假日接口（同一次运行内缓存）
//! - 元旦后、春节前后、国庆后的工作日窗口标记

pub mod types;
pub mod holiday;
pub mod calendar;
pub mod seasonal;
pub mod table;
pub mod pipeline;

pub use types::{
    CalendarRow, ETLConfig, ETLError, ETLResult, HolidayClass, Observation, PredictionKey,
    SeasonalFlags, SpringFestivalPolicy,
};
pub use holiday::{HolidayOracle, HolidaySource};
pub use pipeline::{FeaturePipeline, FeaturePipelineBuilder};
