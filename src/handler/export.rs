//! Consumer-facing views: the supervised (X, Y) training matrix, the
//! all-counties predictor matrix, and the flat CSV export.

use std::fs::File;
use std::path::Path;

use polars::prelude::*;
use tracing::debug;

use super::{numeric_dtype, ChsiHandler};
use crate::error::{Error, Result};
use crate::schema::COUNTY_KEY;

impl ChsiHandler {
    /// Supervised training view: the pipeline run imputed and restricted
    /// to counties carrying the dependent column. Y is the dependent
    /// column, X every remaining numeric column. A dependent that is
    /// absent or non-numeric after preparation is a contract violation.
    pub fn training_data(&mut self) -> Result<(DataFrame, Series)> {
        let data = self.prepared_data(true, true)?;

        let dependent = match data.column(&self.dependent) {
            Ok(column) => column,
            Err(_) => {
                return Err(Error::Training {
                    reason: format!(
                        "dependent column `{}` absent after preparation",
                        self.dependent
                    ),
                })
            }
        };
        if !numeric_dtype(dependent.dtype()) {
            return Err(Error::Training {
                reason: format!(
                    "dependent column `{}` is not numeric ({})",
                    self.dependent,
                    dependent.dtype()
                ),
            });
        }
        let y = dependent.as_materialized_series().clone();

        let x = predictor_columns(&data, &self.dependent)?;
        debug!(rows = x.height(), features = x.width(), "training view");
        Ok((x, y))
    }

    /// Predictor matrix over every county, ground truth or not — the
    /// scoring-side counterpart of `training_data`.
    pub fn all_predictors(&mut self) -> Result<DataFrame> {
        let data = self.prepared_data(true, false)?;
        predictor_columns(&data, &self.dependent)
    }

    /// Write the unimputed, unfiltered prepared table as CSV: a synthetic
    /// 5-character `county_id` (state code as-is, county code zero-padded
    /// to three digits) as the first column, the raw key columns
    /// suppressed, missing cells as the literal `NA`. Extra columns, if
    /// given, are left-joined on the county key first.
    #[tracing::instrument(level = "debug", skip(self, extra_columns), fields(path = %path.as_ref().display()))]
    pub fn export(
        &mut self,
        path: impl AsRef<Path>,
        extra_columns: Option<&DataFrame>,
    ) -> Result<()> {
        let mut data = self.prepared_data(false, false)?;

        if let Some(extra) = extra_columns {
            let key_exprs: Vec<Expr> = COUNTY_KEY.iter().map(|key| col(*key)).collect();
            data = data
                .lazy()
                .join(
                    extra.clone().lazy(),
                    &key_exprs,
                    &key_exprs,
                    JoinArgs::new(JoinType::Left),
                )
                .collect()?;
        }

        let county_id = county_id_series(&data)?;
        data = data.drop(COUNTY_KEY[0])?.drop(COUNTY_KEY[1])?;
        data.insert_column(0, county_id)?;

        let file = File::create(path.as_ref()).map_err(PolarsError::from)?;
        CsvWriter::new(file)
            .include_header(true)
            .with_null_value("NA".into())
            .finish(&mut data)?;
        debug!(rows = data.height(), cols = data.width(), "exported csv");
        Ok(())
    }
}

/// Numeric feature columns: everything except the dependent, the county
/// keys, and non-numeric columns.
fn predictor_columns(data: &DataFrame, dependent: &str) -> Result<DataFrame> {
    let keep: Vec<String> = data
        .get_columns()
        .iter()
        .filter(|column| {
            let name = column.name().as_str();
            name != dependent
                && !COUNTY_KEY.contains(&name)
                && numeric_dtype(column.dtype())
        })
        .map(|column| column.name().to_string())
        .collect();
    Ok(data.select(keep)?)
}

/// Concatenation of the state code (as-is) and the zero-padded 3-digit
/// county code, e.g. state 1 / county 1 → `"1001"`.
fn county_id_series(data: &DataFrame) -> Result<Series> {
    let state = data.column(COUNTY_KEY[0])?.cast(&DataType::Int64)?;
    let county = data.column(COUNTY_KEY[1])?.cast(&DataType::Int64)?;

    let ids: StringChunked = state
        .as_materialized_series()
        .i64()?
        .into_iter()
        .zip(county.as_materialized_series().i64()?)
        .map(|(state, county)| match (state, county) {
            (Some(state), Some(county)) => Some(format!("{state}{county:03}")),
            _ => None,
        })
        .collect();
    Ok(ids.into_series().with_name("county_id".into()))
}
