//! 分隔符文本表的读写

use crate::types::{ETLError, ETLResult, HolidayClass, Observation, PredictionKey};
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::collections::BTreeMap;
use std::path::Path;

/// 参考表中的一行（上一阶段导出的完整预测表）
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceRow {
    pub key: PredictionKey,
    pub guess_date: Option<NaiveDate>,
    pub day_of_week: Option<u32>,
    pub holiday: Option<HolidayClass>,
}

/// 按列名取值的表头索引
struct Columns<'a> {
    headers: StringRecord,
    path: &'a Path,
}

impl<'a> Columns<'a> {
    fn required(&self, name: &str) -> ETLResult<usize> {
        self.optional(name).ok_or_else(|| ETLError::MissingColumn {
            column: name.to_string(),
            path: self.path.to_path_buf(),
        })
    }

    fn optional(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }
}

fn field<'r>(record: &'r StringRecord, idx: usize, line: u64) -> ETLResult<&'r str> {
    record
        .get(idx)
        .map(str::trim)
        .ok_or_else(|| ETLError::MalformedRow {
            line,
            reason: format!("缺少第 {} 列", idx + 1),
        })
}

fn parse_num<T: std::str::FromStr>(raw: &str, name: &str, line: u64) -> ETLResult<T> {
    raw.parse::<T>().map_err(|_| ETLError::MalformedRow {
        line,
        reason: format!("{} 无法解析: {:?}", name, raw),
    })
}

fn parse_opt<T: std::str::FromStr>(raw: &str, name: &str, line: u64) -> ETLResult<Option<T>> {
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        Ok(None)
    } else {
        parse_num(raw, name, line).map(Some)
    }
}

/// `date` 列既可能是日期编号，也可能被 pandas 写成浮点
fn parse_int_like(raw: &str, name: &str, line: u64) -> ETLResult<i64> {
    if let Ok(v) = raw.parse::<i64>() {
        return Ok(v);
    }
    let f: f64 = parse_num(raw, name, line)?;
    if f.fract() == 0.0 {
        Ok(f as i64)
    } else {
        Err(ETLError::MalformedRow {
            line,
            reason: format!("{} 不是整数: {:?}", name, raw),
        })
    }
}

fn line_of(record: &StringRecord, fallback: usize) -> u64 {
    record
        .position()
        .map(|p| p.line())
        .unwrap_or(fallback as u64 + 1)
}

/// 读取观测数据，必须包含 `date` 和 `day_of_week` 两列
pub fn read_observations(path: impl AsRef<Path>, delimiter: u8) -> ETLResult<Vec<Observation>> {
    read_observation_table(path.as_ref(), delimiter, false)
}

/// 读取训练数据，`cnt` 列也必须存在
pub fn read_training_observations(
    path: impl AsRef<Path>,
    delimiter: u8,
) -> ETLResult<Vec<Observation>> {
    read_observation_table(path.as_ref(), delimiter, true)
}

fn read_observation_table(
    path: &Path,
    delimiter: u8,
    require_cnt: bool,
) -> ETLResult<Vec<Observation>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_path(path)?;

    let columns = Columns {
        headers: reader.headers()?.clone(),
        path,
    };
    let date_idx = columns.required("date")?;
    let dow_idx = columns.required("day_of_week")?;
    let brand_idx = columns.optional("brand");
    let cnt_idx = if require_cnt {
        Some(columns.required("cnt")?)
    } else {
        columns.optional("cnt")
    };

    let mut observations = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let line = line_of(&record, i + 1);

        let brand = match brand_idx {
            Some(idx) => parse_opt::<i64>(field(&record, idx, line)?, "brand", line)?,
            None => None,
        };
        let cnt = match cnt_idx {
            Some(idx) => parse_opt::<f64>(field(&record, idx, line)?, "cnt", line)?,
            None => None,
        };

        observations.push(Observation {
            date: parse_int_like(field(&record, date_idx, line)?, "date", line)?,
            day_of_week: parse_num(field(&record, dow_idx, line)?, "day_of_week", line)?,
            brand,
            cnt,
        });
    }

    tracing::info!("Read {} observations from {}", observations.len(), path.display());
    Ok(observations)
}

/// 按 `date` 汇总：`cnt` 求和，`day_of_week` 取最大值，结果按 `date` 排序
///
/// 某个日期下所有行都没有 `cnt` 时，汇总结果也没有 `cnt`。
pub fn aggregate_by_date(observations: &[Observation]) -> Vec<Observation> {
    let mut grouped: BTreeMap<i64, Observation> = BTreeMap::new();

    for obs in observations {
        let entry = grouped.entry(obs.date).or_insert(Observation {
            date: obs.date,
            day_of_week: obs.day_of_week,
            brand: None,
            cnt: None,
        });
        entry.day_of_week = entry.day_of_week.max(obs.day_of_week);
        if let Some(cnt) = obs.cnt {
            entry.cnt = Some(entry.cnt.unwrap_or(0.0) + cnt);
        }
    }

    grouped.into_values().collect()
}

/// 读取无表头的预测结果：`date, brand, predict` 或 `date, predict`
pub fn read_prediction_series(
    path: impl AsRef<Path>,
    delimiter: u8,
) -> ETLResult<Vec<(PredictionKey, f64)>> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .from_path(path)?;

    let mut series = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let line = line_of(&record, i);

        let (key, value) = match record.len() {
            2 => (
                PredictionKey {
                    date: parse_int_like(field(&record, 0, line)?, "date", line)?,
                    brand: None,
                },
                field(&record, 1, line)?,
            ),
            3 => (
                PredictionKey {
                    date: parse_int_like(field(&record, 0, line)?, "date", line)?,
                    brand: Some(parse_int_like(field(&record, 1, line)?, "brand", line)?),
                },
                field(&record, 2, line)?,
            ),
            n => {
                return Err(ETLError::MalformedRow {
                    line,
                    reason: format!("预测结果应为 2 或 3 列，实际 {} 列", n),
                })
            }
        };
        series.push((key, parse_num(value, "predict", line)?));
    }

    tracing::info!("Read {} predictions from {}", series.len(), path.display());
    Ok(series)
}

/// 读取参考表，必须包含 `date`，其余列可选
pub fn read_reference_table(
    path: impl AsRef<Path>,
    delimiter: u8,
) -> ETLResult<Vec<ReferenceRow>> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_path(path)?;

    let columns = Columns {
        headers: reader.headers()?.clone(),
        path,
    };
    let date_idx = columns.required("date")?;
    let brand_idx = columns.optional("brand");
    let guess_idx = columns.optional("guess_date");
    let dow_idx = columns.optional("day_of_week");
    let holiday_idx = columns.optional("holiday");

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let line = line_of(&record, i + 1);

        let brand = match brand_idx {
            Some(idx) => {
                let raw = field(&record, idx, line)?;
                if raw.is_empty() {
                    None
                } else {
                    Some(parse_int_like(raw, "brand", line)?)
                }
            }
            None => None,
        };
        let guess_date = match guess_idx {
            Some(idx) => parse_guess_date(field(&record, idx, line)?, line)?,
            None => None,
        };
        let day_of_week = match dow_idx {
            Some(idx) => parse_opt::<u32>(field(&record, idx, line)?, "day_of_week", line)?,
            None => None,
        };
        let holiday = match holiday_idx {
            Some(idx) => match parse_opt::<i64>(field(&record, idx, line)?, "holiday", line)? {
                Some(code) => Some(HolidayClass::from_code(code).ok_or_else(|| {
                    ETLError::MalformedRow {
                        line,
                        reason: format!("holiday 取值无效: {}", code),
                    }
                })?),
                None => None,
            },
            None => None,
        };

        rows.push(ReferenceRow {
            key: PredictionKey {
                date: parse_int_like(field(&record, date_idx, line)?, "date", line)?,
                brand,
            },
            guess_date,
            day_of_week,
            holiday,
        });
    }

    tracing::info!("Read {} reference rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// 兼容 `2016-01-01` 和 `2016-01-01 00:00:00`
fn parse_guess_date(raw: &str, line: u64) -> ETLResult<Option<NaiveDate>> {
    if raw.is_empty() {
        return Ok(None);
    }
    let date_part = raw.split_whitespace().next().unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| ETLError::MalformedRow {
            line,
            reason: format!("guess_date 无法解析: {:?}", raw),
        })
}

/// 写出表格；`header` 为 `None` 时不写表头
pub fn write_table<I>(
    path: impl AsRef<Path>,
    delimiter: u8,
    header: Option<&[&str]>,
    rows: I,
) -> ETLResult<usize>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .from_path(path)?;

    if let Some(header) = header {
        writer.write_record(header)?;
    }
    let mut count = 0;
    for row in rows {
        writer.write_record(&row)?;
        count += 1;
    }
    writer.flush()?;

    tracing::info!("Wrote {} rows to {}", count, path.display());
    Ok(count)
}

/// 导出 `date[, brand], predict`，无表头
pub fn write_prediction_series(
    path: impl AsRef<Path>,
    delimiter: u8,
    series: &[(PredictionKey, f64)],
) -> ETLResult<usize> {
    let rows = series.iter().map(|(key, value)| {
        let mut row = vec![key.date.to_string()];
        if let Some(brand) = key.brand {
            row.push(brand.to_string());
        }
        row.push(value.to_string());
        row
    });
    write_table(path, delimiter, None, rows)
}
