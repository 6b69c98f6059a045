//! Loading and caching of raw CHSI tables, one per page.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::debug;

use crate::error::Result;
use crate::schema::Page;

/// Caches one loaded `DataFrame` per page. A page is read from disk at most
/// once per store lifetime; there is no eviction. The owning handler holds
/// the store exclusively, so no locking is involved.
pub struct TableStore {
    data_dir: PathBuf,
    cache: HashMap<Page, DataFrame>,
}

impl TableStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        TableStore {
            data_dir: data_dir.into(),
            cache: HashMap::new(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// On-disk location of a page, per the registry's file-name rule.
    pub fn csv_path(&self, page: Page) -> PathBuf {
        self.data_dir.join(page.filename())
    }

    /// The table for `page`, reading and sorting it on first access and
    /// serving the cached frame afterwards.
    pub fn get_page(&mut self, page: Page) -> Result<&DataFrame> {
        if !self.cache.contains_key(&page) {
            let df = self.load_csv(page)?;
            self.cache.insert(page, df);
        }
        Ok(self.cache.get(&page).expect("page just cached"))
    }

    /// Read one page with its index and sentinel parameters, then sort by
    /// the index so downstream joins are deterministic.
    #[tracing::instrument(level = "debug", skip(self), fields(page = %page))]
    fn load_csv(&self, page: Page) -> Result<DataFrame> {
        let path = self.csv_path(page);

        let mut parse_options = CsvParseOptions::default();
        let tokens = page.na_tokens();
        if !tokens.is_empty() {
            parse_options = parse_options.with_null_values(Some(NullValues::AllColumns(
                tokens.iter().map(|t| PlSmallStr::from_static(t)).collect(),
            )));
        }

        let mut df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(10_000))
            .with_parse_options(parse_options)
            .try_into_reader_with_file_path(Some(path.clone()))?
            .finish()?;

        let index = page.index().columns();
        if !index.is_empty() {
            let by: Vec<String> = index.iter().map(|s| s.to_string()).collect();
            df = df.sort(by, SortMultipleOptions::default())?;
        }

        debug!(
            rows = df.height(),
            cols = df.width(),
            path = %path.display(),
            "loaded page"
        );
        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use anyhow::Result;
    use std::fs;
    use tempfile::TempDir;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,chsiprep=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    fn write_demographics(dir: &Path) -> Result<()> {
        // Rows deliberately out of county-key order; one sentinel value.
        let content = "\
State_FIPS_Code,County_FIPS_Code,CHSI_State_Name,CHSI_County_Name,CHSI_State_Abbr,Strata_ID_Number,Population_Size,Poverty
2,20,Alaska,Anchorage,AK,1,279671,-1111
1,1,Alabama,Autauga,AL,29,43671,10.4
1,3,Alabama,Baldwin,AL,16,140415,10.2
";
        fs::write(dir.join(Page::Demographics.filename()), content)?;
        Ok(())
    }

    #[test]
    fn loads_sorted_by_county_key_with_sentinels_as_null() -> Result<()> {
        init_test_logging();
        let dir = TempDir::new()?;
        write_demographics(dir.path())?;

        let mut store = TableStore::new(dir.path());
        let df = store.get_page(Page::Demographics)?;

        assert_eq!(df.height(), 3);
        let states: Vec<Option<i64>> = df
            .column("State_FIPS_Code")?
            .as_materialized_series()
            .i64()?
            .into_iter()
            .collect();
        assert_eq!(states, vec![Some(1), Some(1), Some(2)]);

        // "-1111" must come back as missing, not as a literal value.
        assert_eq!(df.column("Poverty")?.null_count(), 1);
        Ok(())
    }

    #[test]
    fn caches_after_first_read() -> Result<()> {
        init_test_logging();
        let dir = TempDir::new()?;
        write_demographics(dir.path())?;

        let mut store = TableStore::new(dir.path());
        let first_height = store.get_page(Page::Demographics)?.height();

        // Remove the file: a second access must be served from the cache
        // without touching disk.
        fs::remove_file(store.csv_path(Page::Demographics))?;
        let df = store.get_page(Page::Demographics)?;
        assert_eq!(df.height(), first_height);
        Ok(())
    }

    #[test]
    fn missing_file_propagates() {
        init_test_logging();
        let dir = TempDir::new().unwrap();
        let mut store = TableStore::new(dir.path());
        let err = store.get_page(Page::Demographics).unwrap_err();
        assert!(matches!(err, Error::Polars(_)));
    }
}
