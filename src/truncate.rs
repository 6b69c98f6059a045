//! Stateless out-of-range zeroing transform.

use polars::prelude::*;

use crate::error::Result;
use crate::handler::numeric_dtype;

/// Replaces numeric values outside `[minimum, maximum]` with zero. Note
/// that offenders are zeroed, not clamped to the nearest bound; missing
/// cells are left untouched.
#[derive(Debug, Clone, Copy)]
pub struct Truncator {
    minimum: f64,
    maximum: f64,
}

impl Truncator {
    pub fn new(minimum: f64, maximum: f64) -> Self {
        Truncator { minimum, maximum }
    }

    /// A copy of `data` with every out-of-range numeric cell zeroed.
    /// Non-numeric columns pass through unchanged.
    pub fn transform(&self, data: &DataFrame) -> Result<DataFrame> {
        let exprs: Vec<Expr> = data
            .get_columns()
            .iter()
            .filter(|column| numeric_dtype(column.dtype()))
            .map(|column| {
                let name = column.name().as_str();
                let value = col(name).cast(DataType::Float64);
                let in_range = value
                    .clone()
                    .gt_eq(lit(self.minimum))
                    .and(value.clone().lt_eq(lit(self.maximum)));
                when(value.clone().is_null().or(in_range))
                    .then(value)
                    .otherwise(lit(0.0))
                    .alias(name)
            })
            .collect();
        if exprs.is_empty() {
            return Ok(data.clone());
        }
        Ok(data.clone().lazy().with_columns(exprs).collect()?)
    }
}
