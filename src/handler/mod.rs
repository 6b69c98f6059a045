//! The CHSI handler: owns the table store and the memoized assembled
//! county table, and exposes the raw-page and prepared-data accessors.

mod export;
mod prepare;

use std::collections::HashMap;
use std::path::PathBuf;

use polars::prelude::*;
use tracing::debug;

use crate::error::Result;
use crate::schema::{Page, COMMON_COLUMNS, COUNTY_KEY, DEFAULT_DEPENDENT};
use crate::store::TableStore;

/// One handler instance owns every cache exclusively: the table store, the
/// assembled county table (computed at most once), and the per-column-set
/// imputation defaults. Not designed for concurrent use.
pub struct ChsiHandler {
    store: TableStore,
    dependent: String,
    excluded: Vec<String>,
    threshold: f64,
    assembled: Option<DataFrame>,
    defaults: HashMap<Vec<String>, HashMap<String, f64>>,
}

impl ChsiHandler {
    /// Handler over a directory of fixed-name CHSI CSV files, with the
    /// default dependent column, no forced exclusions, and a 0.9
    /// missing-fraction threshold.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        ChsiHandler {
            store: TableStore::new(data_dir),
            dependent: DEFAULT_DEPENDENT.to_string(),
            excluded: Vec::new(),
            threshold: 0.9,
            assembled: None,
            defaults: HashMap::new(),
        }
    }

    /// Use a different dependent/target column.
    pub fn with_dependent(mut self, dependent: impl Into<String>) -> Self {
        self.dependent = dependent.into();
        self
    }

    /// Force-exclude columns from every prepared table.
    pub fn with_excluded(mut self, excluded: Vec<String>) -> Self {
        self.excluded = excluded;
        self
    }

    /// Missing-data-fraction threshold used for column selection.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn dependent(&self) -> &str {
        &self.dependent
    }

    // ─── raw page accessors ──────────────────────────────────────────

    pub fn demographics(&mut self) -> Result<&DataFrame> {
        self.store.get_page(Page::Demographics)
    }

    pub fn lcd(&mut self) -> Result<&DataFrame> {
        self.store.get_page(Page::LeadingCausesOfDeath)
    }

    pub fn smh(&mut self) -> Result<&DataFrame> {
        self.store.get_page(Page::SummaryMeasuresOfHealth)
    }

    pub fn mbd(&mut self) -> Result<&DataFrame> {
        self.store.get_page(Page::MeasuresOfBirthAndDeath)
    }

    pub fn rhi(&mut self) -> Result<&DataFrame> {
        self.store.get_page(Page::RelativeHealthImportance)
    }

    pub fn vpeh(&mut self) -> Result<&DataFrame> {
        self.store.get_page(Page::VulnerablePopsAndEnvHealth)
    }

    pub fn rfac(&mut self) -> Result<&DataFrame> {
        self.store.get_page(Page::RiskFactorsAndAccessToCare)
    }

    pub fn psu(&mut self) -> Result<&DataFrame> {
        self.store.get_page(Page::PreventiveServicesUse)
    }

    /// The data-element description catalog, optionally restricted to one
    /// page's entries via its `PAGE_NAME`.
    pub fn data_descriptions(&mut self, page: Option<Page>) -> Result<DataFrame> {
        let df = self.store.get_page(Page::DataElementDescription)?.clone();
        match page {
            None => Ok(df),
            Some(page) => {
                let mask = df
                    .column("PAGE_NAME")?
                    .as_materialized_series()
                    .str()?
                    .equal(page.display_name().as_str());
                Ok(df.filter(&mask)?)
            }
        }
    }

    /// Catalog entries of one page with a given `DATA_TYPE`.
    pub fn elements_by_type(&mut self, page: Page, dtype: &str) -> Result<DataFrame> {
        let df = self.data_descriptions(Some(page))?;
        let mask = df
            .column("DATA_TYPE")?
            .as_materialized_series()
            .str()?
            .equal(dtype);
        Ok(df.filter(&mask)?)
    }

    // ─── county table assembly ───────────────────────────────────────

    /// The wide per-county table: every county page joined column-wise on
    /// the county key, the four common descriptive columns contributed
    /// once. Computed on first call and memoized for the handler lifetime.
    pub fn all_county_data(&mut self) -> Result<&DataFrame> {
        if self.assembled.is_none() {
            let df = self.assemble()?;
            self.assembled = Some(df);
        }
        Ok(self.assembled.as_ref().expect("assembled just computed"))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    fn assemble(&mut self) -> Result<DataFrame> {
        let pages = Page::county_pages();
        let key_exprs: Vec<Expr> = COUNTY_KEY.iter().map(|k| col(*k)).collect();

        // Common descriptive columns come from the first page only.
        let first = self.store.get_page(pages[0])?.clone();
        let mut selection: Vec<String> = COUNTY_KEY.iter().map(|s| s.to_string()).collect();
        selection.extend(COMMON_COLUMNS.iter().map(|s| s.to_string()));
        let mut acc = first.select(selection)?;

        for page in pages {
            let piece = self
                .store
                .get_page(page)?
                .clone()
                .drop_many(COMMON_COLUMNS.iter().copied());
            let args = JoinArgs::new(JoinType::Full).with_coalesce(JoinCoalesce::CoalesceColumns);
            acc = acc
                .lazy()
                .join(piece.lazy(), &key_exprs, &key_exprs, args)
                .collect()?;
        }

        // Full joins do not guarantee row order.
        let by: Vec<String> = COUNTY_KEY.iter().map(|s| s.to_string()).collect();
        let acc = acc.sort(by, SortMultipleOptions::default())?;
        debug!(rows = acc.height(), cols = acc.width(), "assembled county table");
        Ok(acc)
    }

    /// Rows of the assembled table where the dependent column is present.
    pub fn county_data_with_dependent(&mut self) -> Result<DataFrame> {
        let dependent = self.dependent.clone();
        let df = self.all_county_data()?;
        let mask = df
            .column(&dependent)?
            .as_materialized_series()
            .is_not_null();
        Ok(df.filter(&mask)?)
    }

    /// Columns whose missing fraction over the dependent-filtered rows is
    /// strictly below `threshold`, in table order. The county key columns
    /// act as the row index and are not part of the mask. The mask is
    /// always computed from the dependent-filtered table so that column
    /// selection is identical between filtered and unfiltered modes.
    pub fn good_columns(&mut self, threshold: f64) -> Result<Vec<String>> {
        let filtered = self.county_data_with_dependent()?;
        if filtered.height() == 0 {
            return Ok(Vec::new());
        }
        let rows = filtered.height() as f64;
        let mut keep = Vec::new();
        for column in filtered.get_columns() {
            let name = column.name().as_str();
            if COUNTY_KEY.contains(&name) {
                continue;
            }
            if (column.null_count() as f64) / rows < threshold {
                keep.push(name.to_string());
            }
        }
        Ok(keep)
    }

    /// Dependent-filtered or full rows, restricted to the good-column mask
    /// at the configured threshold. The county key columns always ride
    /// along.
    pub fn select_good_columns(&mut self, require_dependent: bool) -> Result<DataFrame> {
        let mask = self.good_columns(self.threshold)?;
        let df = if require_dependent {
            self.county_data_with_dependent()?
        } else {
            self.all_county_data()?.clone()
        };
        let mut selection: Vec<String> = COUNTY_KEY.iter().map(|s| s.to_string()).collect();
        selection.extend(mask);
        Ok(df.select(selection)?)
    }
}

pub(crate) fn numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float32
            | DataType::Float64
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

pub(crate) fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}


#[cfg(test)]
mod tests {
    use super::fixture;
    use super::*;
    use anyhow::Result;

    #[test]
    fn assembled_rows_are_the_union_of_county_keys() -> Result<()> {
        let (_dir, mut handler) = fixture::handler();
        let df = handler.all_county_data()?;

        // Three demographics counties plus the preventive-services-only one.
        assert_eq!(df.height(), 4);

        let states: Vec<Option<i64>> = df
            .column("State_FIPS_Code")?
            .as_materialized_series()
            .i64()?
            .into_iter()
            .collect();
        assert_eq!(states, vec![Some(1), Some(1), Some(2), Some(3)]);

        // The preventive-services-only county still got its measure.
        assert_eq!(df.column("Pap_Smear")?.null_count(), 1);
        Ok(())
    }

    #[test]
    fn common_columns_appear_exactly_once() -> Result<()> {
        let (_dir, mut handler) = fixture::handler();
        let df = handler.all_county_data()?;
        for name in COMMON_COLUMNS {
            let hits = df
                .get_column_names()
                .iter()
                .filter(|c| c.as_str() == *name)
                .count();
            assert_eq!(hits, 1, "column {name} duplicated");
        }
        Ok(())
    }

    #[test]
    fn assembly_is_memoized() -> Result<()> {
        let (dir, mut handler) = fixture::handler();
        let first = handler.all_county_data()?.clone();

        // Remove every source file: a second call must not reload.
        for page in Page::county_pages() {
            std::fs::remove_file(dir.path().join(page.filename()))?;
        }
        let second = handler.all_county_data()?;
        assert_eq!(second.height(), first.height());
        Ok(())
    }

    #[test]
    fn dependent_filter_drops_missing_rows() -> Result<()> {
        let (_dir, mut handler) = fixture::handler();
        // (1,3) has a sentinel Health_Status and (3,5) has none at all.
        let df = handler.county_data_with_dependent()?;
        assert_eq!(df.height(), 2);
        Ok(())
    }

    #[test]
    fn good_columns_is_monotonic_in_threshold() -> Result<()> {
        let (_dir, mut handler) = fixture::handler();
        let tight = handler.good_columns(0.1)?;
        let mid = handler.good_columns(0.5)?;
        let loose = handler.good_columns(0.95)?;
        assert!(tight.len() <= mid.len());
        assert!(mid.len() <= loose.len());
        for name in &tight {
            assert!(mid.contains(name));
        }
        for name in &mid {
            assert!(loose.contains(name));
        }
        Ok(())
    }

    #[test]
    fn good_columns_use_the_dependent_filtered_rows() -> Result<()> {
        let (_dir, mut handler) = fixture::handler();
        // Poverty is missing in half of the full table but present for both
        // dependent-carrying counties. The mask is computed from the
        // filtered rows, so a 0.4 threshold still keeps it.
        let keep = handler.good_columns(0.4)?;
        assert!(keep.contains(&"Poverty".to_string()));
        assert!(keep.contains(&"Health_Status".to_string()));
        Ok(())
    }

    #[test]
    fn select_good_columns_keeps_rows_per_mode() -> Result<()> {
        let (_dir, mut handler) = fixture::handler();
        let filtered = handler.select_good_columns(true)?;
        let full = handler.select_good_columns(false)?;
        assert_eq!(filtered.height(), 2);
        assert_eq!(full.height(), 4);
        // Same column selection in both modes.
        assert_eq!(filtered.get_column_names(), full.get_column_names());
        Ok(())
    }

    #[test]
    fn description_catalog_filters_by_page() -> Result<()> {
        let (_dir, mut handler) = fixture::handler();
        let all = handler.data_descriptions(None)?;
        assert_eq!(all.height(), 3);

        let demo = handler.data_descriptions(Some(Page::Demographics))?;
        assert_eq!(demo.height(), 2);

        let numeric = handler.elements_by_type(Page::Demographics, "numeric")?;
        assert_eq!(numeric.height(), 1);
        Ok(())
    }
}
