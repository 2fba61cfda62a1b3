//! 多个模型输出的加权平均

use crate::config::{delimiter_byte, EnsembleConfig};
use crate::types::ForecastResult;
use etl::table::{read_prediction_series, read_reference_table, write_prediction_series, write_table, ReferenceRow};
use etl::PredictionKey;
use ml::{BlendedRow, EnsembleMember, WeightedEnsemble};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct EnsembleSummary {
    pub members: Vec<String>,
    pub rows: Vec<BlendedRow<PredictionKey>>,
    pub table_path: PathBuf,
    pub series_path: PathBuf,
}

pub struct EnsembleWorkflow {
    config: EnsembleConfig,
    member_delimiter: u8,
    reference_delimiter: u8,
}

impl EnsembleWorkflow {
    pub fn new(config: EnsembleConfig) -> ForecastResult<Self> {
        config.validate()?;
        Ok(Self {
            member_delimiter: delimiter_byte(config.member_delimiter)?,
            reference_delimiter: delimiter_byte(config.reference_delimiter)?,
            config,
        })
    }

    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    pub fn load_members(&self) -> ForecastResult<WeightedEnsemble<PredictionKey>> {
        let members = self
            .config
            .members
            .iter()
            .map(|m| {
                let series = read_prediction_series(&m.path, self.member_delimiter)?;
                Ok(EnsembleMember::new(m.name.clone(), m.weight, series)?)
            })
            .collect::<ForecastResult<Vec<_>>>()?;
        Ok(WeightedEnsemble::new(members)?)
    }

    pub fn load_reference(&self) -> ForecastResult<Option<Vec<ReferenceRow>>> {
        match &self.config.reference_path {
            Some(path) => Ok(Some(read_reference_table(path, self.reference_delimiter)?)),
            None => Ok(None),
        }
    }

    /// 以参考表的主键做左连接后融合；没有参考表时以第一个模型为准
    ///
    /// 参考表的主键不能重复，也不能漏掉任何模型给出的主键。
    pub fn blend(
        &self,
        ensemble: &WeightedEnsemble<PredictionKey>,
        reference: Option<&[ReferenceRow]>,
    ) -> ForecastResult<Vec<BlendedRow<PredictionKey>>> {
        let rows = match reference {
            Some(reference) => {
                let keys: Vec<PredictionKey> = reference.iter().map(|r| r.key).collect();
                ensemble.combine_over(&keys)?
            }
            None => ensemble.combine_all()?,
        };
        Ok(rows)
    }

    /// 写出 `<model>_predict.csv` 和 `<model>_out.txt`
    pub fn export(
        &self,
        ensemble: &WeightedEnsemble<PredictionKey>,
        rows: &[BlendedRow<PredictionKey>],
        reference: Option<&[ReferenceRow]>,
    ) -> ForecastResult<()> {
        let mut header: Vec<String> = vec!["date".to_string(), "brand".to_string()];
        header.extend(
            ensemble
                .member_names()
                .iter()
                .map(|name| format!("{}_predict", name)),
        );
        if reference.is_some() {
            header.extend(["guess_date", "day_of_week", "holiday"].map(String::from));
        }
        header.push("predict".to_string());
        let header: Vec<&str> = header.iter().map(String::as_str).collect();

        let table = rows.iter().enumerate().map(|(i, row)| {
            let mut record = vec![
                row.key.date.to_string(),
                row.key.brand.map(|b| b.to_string()).unwrap_or_default(),
            ];
            record.extend(row.members.iter().map(|v| v.to_string()));
            if let Some(reference) = reference {
                let r = &reference[i];
                record.push(
                    r.guess_date
                        .map(|d| d.format("%Y-%m-%d").to_string())
                        .unwrap_or_default(),
                );
                record.push(r.day_of_week.map(|d| d.to_string()).unwrap_or_default());
                record.push(r.holiday.map(|h| h.code().to_string()).unwrap_or_default());
            }
            record.push(row.value.to_string());
            record
        });
        write_table(self.config.table_path(), b',', Some(&header[..]), table)?;

        let series: Vec<(PredictionKey, f64)> = rows.iter().map(|r| (r.key, r.value)).collect();
        write_prediction_series(self.config.series_path(), b'\t', &series)?;
        Ok(())
    }

    pub fn run(&self) -> ForecastResult<EnsembleSummary> {
        let ensemble = self.load_members()?;
        let reference = self.load_reference()?;
        let rows = self.blend(&ensemble, reference.as_deref())?;
        self.export(&ensemble, &rows, reference.as_deref())?;

        tracing::info!(
            "Finished {}: {} rows blended",
            self.config.model_name,
            rows.len()
        );
        Ok(EnsembleSummary {
            members: ensemble.member_names().iter().map(|s| s.to_string()).collect(),
            rows,
            table_path: self.config.table_path(),
            series_path: self.config.series_path(),
        })
    }
}
