//! The feature-preparation pipeline: column filtering, indicator fixing,
//! unit normalization, and missing-value imputation, in a fixed order.

use std::collections::HashMap;

use polars::prelude::*;
use tracing::debug;

use super::{has_column, numeric_dtype, ChsiHandler};
use crate::error::{Error, Result};
use crate::schema::{
    is_non_county_column, Page, ADMIN_COLUMNS, AREA_NORMALIZED, COUNTY_KEY, INDICATOR_SUFFIX,
    NATIONAL_PREFIX, POPULATION_NORMALIZED, TIME_SPAN_COLUMN, YEAR_NORMALIZED,
};

/// Working column holding each county's reporting-window span in years.
const SPAN_HELPER: &str = "__mobd_span_years";

impl ChsiHandler {
    /// The model-ready table. Steps run in a fixed order: select good
    /// columns, drop non-county and administrative columns, fix indicator
    /// encodings, normalize by population, area, and reporting span, then
    /// optionally impute. Normalization precedes imputation so defaults
    /// reflect the normalized scale.
    ///
    /// Returns a fresh table every call; downstream mutation never touches
    /// the cached assembled table.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn prepared_data(&mut self, impute: bool, require_dependent: bool) -> Result<DataFrame> {
        let mut data = self.select_good_columns(require_dependent)?;
        data = self.drop_feature_columns(data);
        data = fix_indicators(data)?;
        data = normalize_by_population(data)?;
        data = normalize_by_area(data)?;
        data = self.normalize_by_years(data)?;
        if impute {
            let columns: Vec<String> = data
                .get_column_names()
                .iter()
                .map(|name| name.to_string())
                .collect();
            let defaults = self.defaults_for(&columns)?;
            data = impute_missing(data, &defaults)?;
        }
        debug!(rows = data.height(), cols = data.width(), "prepared table");
        Ok(data)
    }

    /// Per-column imputation values for exactly this column set, memoized
    /// by the unordered set. Defaults are medians over the broadest
    /// unimputed table, with two overrides: indicator columns get the
    /// neutral midpoint 0.5, and a column with a `US_<name>` twin gets the
    /// national reference value from the assembled table's first row.
    /// Entries live as long as the handler; the underlying data never
    /// changes beneath them.
    pub fn defaults_for(&mut self, columns: &[String]) -> Result<HashMap<String, f64>> {
        let mut key: Vec<String> = columns.to_vec();
        key.sort();
        key.dedup();

        if !self.defaults.contains_key(&key) {
            let computed = self.compute_defaults(&key)?;
            self.defaults.insert(key.clone(), computed);
        }
        Ok(self.defaults.get(&key).expect("defaults just cached").clone())
    }

    fn compute_defaults(&mut self, columns: &[String]) -> Result<HashMap<String, f64>> {
        let base = self.prepared_data(false, false)?;
        let assembled = self.all_county_data()?;

        let mut out = HashMap::new();
        for name in columns {
            if COUNTY_KEY.contains(&name.as_str()) {
                continue;
            }

            let mut default = match base.column(name) {
                Ok(column) if numeric_dtype(column.dtype()) => {
                    column.as_materialized_series().median()
                }
                _ => None,
            };

            if name.ends_with(INDICATOR_SUFFIX) {
                // Imputation cannot be "right" for a binary flag; fall back
                // to the neutral midpoint.
                default = Some(0.5);
            } else if let Ok(us) = assembled.column(&format!("{NATIONAL_PREFIX}{name}")) {
                if let Ok(value) = us.get(0) {
                    if let Ok(national) = value.try_extract::<f64>() {
                        default = Some(national);
                    }
                }
            }

            if let Some(value) = default {
                out.insert(name.clone(), value);
            }
        }
        debug!(columns = columns.len(), defaults = out.len(), "computed defaults");
        Ok(out)
    }

    /// Drop confidence-interval/extremum/national/expected columns, the
    /// administrative columns, and any caller-configured exclusions. All
    /// present-only; the county key columns always stay.
    fn drop_feature_columns(&self, data: DataFrame) -> DataFrame {
        let drop: Vec<String> = data
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .filter(|name| {
                !COUNTY_KEY.contains(&name.as_str())
                    && (is_non_county_column(name)
                        || ADMIN_COLUMNS.contains(&name.as_str())
                        || self.excluded.iter().any(|excluded| excluded == name))
            })
            .collect();
        data.drop_many(drop)
    }

    /// Divide the per-period count columns by each county's reporting
    /// window, `"YYYY-YYYY"` inclusive, joined in from the birth/death
    /// measures page. A malformed span is fatal; absent target columns are
    /// skipped.
    fn normalize_by_years(&mut self, data: DataFrame) -> Result<DataFrame> {
        let mbd = self.store.get_page(Page::MeasuresOfBirthAndDeath)?;
        let spans = time_spans(mbd)?;

        let targets: Vec<String> = YEAR_NORMALIZED
            .iter()
            .filter(|name| has_column(&data, name))
            .map(|name| name.to_string())
            .collect();
        if targets.is_empty() {
            return Ok(data);
        }

        let key_exprs: Vec<Expr> = COUNTY_KEY.iter().map(|key| col(*key)).collect();
        let exprs: Vec<Expr> = targets
            .iter()
            .map(|name| {
                (col(name.as_str()).cast(DataType::Float64) / col(SPAN_HELPER))
                    .alias(name.as_str())
            })
            .collect();

        let joined = data
            .lazy()
            .join(
                spans.lazy(),
                &key_exprs,
                &key_exprs,
                JoinArgs::new(JoinType::Left),
            )
            .with_columns(exprs)
            .collect()?;
        Ok(joined.drop(SPAN_HELPER)?)
    }
}

/// Collapse each `*_Ind` column to `value mod 2`. The vendor's two-bit
/// encoding carries a paired "peer" bit that this intentionally discards;
/// the {0,1} result is the canonical encoding here.
fn fix_indicators(data: DataFrame) -> Result<DataFrame> {
    let exprs: Vec<Expr> = data
        .get_column_names()
        .iter()
        .filter(|name| name.ends_with(INDICATOR_SUFFIX))
        .map(|name| {
            (col(name.as_str()) % lit(2))
                .cast(DataType::Float64)
                .alias(name.as_str())
        })
        .collect();
    if exprs.is_empty() {
        return Ok(data);
    }
    Ok(data.lazy().with_columns(exprs).collect()?)
}

/// Rescale count columns to rates per 100 residents. Columns absent from
/// the table are skipped, not an error.
fn normalize_by_population(data: DataFrame) -> Result<DataFrame> {
    if !has_column(&data, "Population_Size") {
        return Ok(data);
    }
    let exprs: Vec<Expr> = POPULATION_NORMALIZED
        .iter()
        .filter(|name| has_column(&data, name))
        .map(|name| {
            (col(*name).cast(DataType::Float64) * lit(100.0)
                / col("Population_Size").cast(DataType::Float64))
            .alias(*name)
        })
        .collect();
    if exprs.is_empty() {
        return Ok(data);
    }
    Ok(data.lazy().with_columns(exprs).collect()?)
}

/// Divide by the derived county area, `Population_Size / Population_Density`.
fn normalize_by_area(data: DataFrame) -> Result<DataFrame> {
    let exprs: Vec<Expr> = AREA_NORMALIZED
        .iter()
        .filter(|name| has_column(&data, name))
        .map(|name| {
            (col(*name).cast(DataType::Float64) * col("Population_Density").cast(DataType::Float64)
                / col("Population_Size").cast(DataType::Float64))
            .alias(*name)
        })
        .collect();
    if exprs.is_empty() {
        return Ok(data);
    }
    Ok(data.lazy().with_columns(exprs).collect()?)
}

/// Fill missing cells from the default map. Columns without a default
/// (strings, keys) are left alone.
fn impute_missing(data: DataFrame, defaults: &HashMap<String, f64>) -> Result<DataFrame> {
    let exprs: Vec<Expr> = data
        .get_column_names()
        .iter()
        .filter_map(|name| {
            defaults
                .get(name.as_str())
                .map(|value| col(name.as_str()).fill_null(lit(*value)))
        })
        .collect();
    if exprs.is_empty() {
        return Ok(data);
    }
    Ok(data.lazy().with_columns(exprs).collect()?)
}

/// County keys plus the parsed span, in years, of each county's
/// `MOBD_Time_Span`.
fn time_spans(mbd: &DataFrame) -> Result<DataFrame> {
    let strings = mbd.column(TIME_SPAN_COLUMN)?.as_materialized_series().str()?;
    let mut spans: Vec<Option<f64>> = Vec::with_capacity(strings.len());
    for value in strings.into_iter() {
        match value {
            None => spans.push(None),
            Some(raw) => spans.push(Some(parse_time_span(raw)?)),
        }
    }

    let selection: Vec<String> = COUNTY_KEY.iter().map(|key| key.to_string()).collect();
    let mut out = mbd.select(selection)?;
    out.with_column(Series::new(SPAN_HELPER.into(), spans))?;
    Ok(out)
}

/// Inclusive span of `"YYYY-YYYY"`: end − start + 1.
fn parse_time_span(value: &str) -> Result<f64> {
    let malformed = || Error::TimeSpan {
        value: value.to_string(),
    };
    let (start, end) = value.split_once('-').ok_or_else(malformed)?;
    let start: i64 = start.trim().parse().map_err(|_| malformed())?;
    let end: i64 = end.trim().parse().map_err(|_| malformed())?;
    Ok((end - start + 1) as f64)
}
