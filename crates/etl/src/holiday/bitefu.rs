//! tool.bitefu.net 节假日接口
//!
//! `GET <url>?d=20170101,20170102` 返回 `{"20170101": 2, "20170102": "1"}`，
//! 值有时是数字有时是字符串，这里统一转成整数。

use super::{create_http_client, format_date, HolidaySource};
use crate::types::{ETLConfig, ETLError, ETLResult, HolidayClass};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::HashMap;

pub struct BitefuHolidaySource {
    client: reqwest::Client,
    url: String,
}

impl BitefuHolidaySource {
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> ETLResult<Self> {
        Ok(Self {
            client: create_http_client(timeout_secs)?,
            url: url.into(),
        })
    }

    pub fn from_config(config: &ETLConfig) -> ETLResult<Self> {
        Self::new(config.holiday_api_url.clone(), config.request_timeout_secs)
    }
}

#[async_trait]
impl HolidaySource for BitefuHolidaySource {
    fn name(&self) -> &str {
        "bitefu"
    }

    async fn lookup(&self, dates: &[NaiveDate]) -> ETLResult<HashMap<NaiveDate, HolidayClass>> {
        if dates.is_empty() {
            return Ok(HashMap::new());
        }

        let query: Vec<String> = dates.iter().map(|d| format_date(*d)).collect();
        let body = self
            .client
            .get(&self.url)
            .query(&[("d", query.join(","))])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let classes = parse_response(&body)?;
        tracing::debug!("Fetched {} holiday classes from {}", classes.len(), self.url);

        dates
            .iter()
            .map(|d| {
                classes
                    .get(&format_date(*d))
                    .map(|class| (*d, *class))
                    .ok_or_else(|| ETLError::HolidayMissing(format_date(*d)))
            })
            .collect()
    }
}

/// 解析接口返回，键为 YYYYMMDD
pub fn parse_response(body: &str) -> ETLResult<HashMap<String, HolidayClass>> {
    let raw: HashMap<String, Value> = serde_json::from_str(body)?;
    raw.into_iter()
        .map(|(date, value)| {
            let class = normalize_code(&value).ok_or_else(|| ETLError::HolidayCode {
                date: date.clone(),
                value: value.to_string(),
            })?;
            Ok((date, class))
        })
        .collect()
}

fn normalize_code(value: &Value) -> Option<HolidayClass> {
    let code = match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0)
                .map(|f| f as i64)
        })?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    HolidayClass::from_code(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_value_types_are_normalized() {
        let body = r#"{"20170101": 2, "20170102": "2", "20170103": "0", "20170107": 1.0}"#;
        let parsed = parse_response(body).unwrap();

        assert_eq!(parsed["20170101"], HolidayClass::Holiday);
        assert_eq!(parsed["20170102"], HolidayClass::Holiday);
        assert_eq!(parsed["20170103"], HolidayClass::Workday);
        assert_eq!(parsed["20170107"], HolidayClass::Weekend);
    }

    #[test]
    fn test_unknown_code_is_rejected() {
        let err = parse_response(r#"{"20170101": "holiday"}"#).unwrap_err();
        assert!(matches!(err, ETLError::HolidayCode { .. }));

        let err = parse_response(r#"{"20170101": 5}"#).unwrap_err();
        assert!(matches!(err, ETLError::HolidayCode { .. }));
    }

    #[test]
    fn test_non_object_body_is_a_parse_error() {
        let err = parse_response("[0, 1, 2]").unwrap_err();
        assert!(matches!(err, ETLError::JsonParsing(_)));
    }
}
