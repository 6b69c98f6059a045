//! Static registry of the CHSI pages: file-name mapping, index columns,
//! sentinel missing values, and the fixed column lists driving the
//! preparation pipeline. Pure lookups, no I/O.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;

use crate::error::Error;

/// The two-part county key shared by every county-scoped page.
pub static COUNTY_KEY: &[&str] = &["State_FIPS_Code", "County_FIPS_Code"];

/// Index of the data-element description catalog.
pub static DESCRIPTION_KEY: &[&str] = &["PAGE_NAME", "COLUMN_NAME"];

/// Descriptive columns physically present on every county page. They are
/// contributed once, from the first county page, during assembly.
pub static COMMON_COLUMNS: &[&str] = &[
    "CHSI_State_Name",
    "CHSI_County_Name",
    "CHSI_State_Abbr",
    "Strata_ID_Number",
];

/// Numeric codes the vendor uses for "no data". Interpreted as missing at
/// load time, never as literal values.
pub static NA_TOKENS: &[&str] = &[
    "-9999", "-2222", "-2222.2", "-2", "-1111", "-1111.1", "-1", "-9998.9",
];

/// Count columns rescaled to per-100-residents rates.
pub static POPULATION_NORMALIZED: &[&str] = &[
    "Uninsured",
    "Disabled_Medicare",
    "Elderly_Medicare",
    "Unemployed",
    "Ecol_Rpt",
    "Salm_Rpt",
    "Shig_Rpt",
    "CRS_Rpt",
    "FluB_Rpt",
    "HepA_Rpt",
    "HepB_Rpt",
    "Pert_Rpt",
    "Syphilis_Rpt",
    "Meas_Rpt",
    "Total_Births",
    "Total_Deaths",
    "Recent_Drug_Use",
    "Sev_Work_Disabled",
    "Major_Depression",
];

/// Columns divided by the derived county area.
pub static AREA_NORMALIZED: &[&str] = &["Toxic_Chem"];

/// Per-period counts divided by the reporting-window span in years.
pub static YEAR_NORMALIZED: &[&str] = &[
    "Ecol_Rpt",
    "Salm_Rpt",
    "Shig_Rpt",
    "CRS_Rpt",
    "FluB_Rpt",
    "HepA_Rpt",
    "HepB_Rpt",
    "Pert_Rpt",
    "Syphilis_Rpt",
    "Meas_Rpt",
    "Total_Births",
    "Total_Deaths",
];

/// First underscore-token marking a column as a confidence interval,
/// extremum, or national-reference value rather than a county measurement.
pub static NON_COUNTY_PREFIXES: &[&str] = &["CI", "Min", "Max", "US"];

/// Last underscore-token marking an expected-value column.
pub static NON_COUNTY_SUFFIXES: &[&str] = &["Exp"];

/// Administrative columns dropped unconditionally before modeling.
pub static ADMIN_COLUMNS: &[&str] = &["Strata_ID_Number", "Number_Counties"];

/// Reporting-window column on the birth/death measures page, `"YYYY-YYYY"`.
pub const TIME_SPAN_COLUMN: &str = "MOBD_Time_Span";

/// Suffix marking binary health-importance indicator columns.
pub const INDICATOR_SUFFIX: &str = "_Ind";

/// Prefix of national-reference twins (`US_<column>`).
pub const NATIONAL_PREFIX: &str = "US_";

/// Default dependent column for supervised preparation.
pub const DEFAULT_DEPENDENT: &str = "Health_Status";

/// One named raw CHSI dataset. The variants are the complete, fixed set of
/// pages shipped by the vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Page {
    Demographics,
    LeadingCausesOfDeath,
    SummaryMeasuresOfHealth,
    MeasuresOfBirthAndDeath,
    RelativeHealthImportance,
    VulnerablePopsAndEnvHealth,
    PreventiveServicesUse,
    RiskFactorsAndAccessToCare,
    DataElementDescription,
    DefinedDataValue,
    HealthyPeople2010,
}

/// How the rows of a page are keyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageIndex {
    /// `(State_FIPS_Code, County_FIPS_Code)`.
    County,
    /// `(PAGE_NAME, COLUMN_NAME)` in the description catalog.
    Description,
    /// `Data_Value` in the defined-data-value lookup.
    DataValue,
    /// No index at all.
    Unindexed,
}

impl PageIndex {
    /// Index column names, empty for unindexed pages.
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            PageIndex::County => COUNTY_KEY,
            PageIndex::Description => DESCRIPTION_KEY,
            PageIndex::DataValue => &["Data_Value"],
            PageIndex::Unindexed => &[],
        }
    }
}

impl Page {
    pub const ALL: [Page; 11] = [
        Page::Demographics,
        Page::LeadingCausesOfDeath,
        Page::SummaryMeasuresOfHealth,
        Page::MeasuresOfBirthAndDeath,
        Page::RelativeHealthImportance,
        Page::VulnerablePopsAndEnvHealth,
        Page::PreventiveServicesUse,
        Page::RiskFactorsAndAccessToCare,
        Page::DataElementDescription,
        Page::DefinedDataValue,
        Page::HealthyPeople2010,
    ];

    /// The canonical `UPPER_SNAKE` page name.
    pub fn name(self) -> &'static str {
        match self {
            Page::Demographics => "DEMOGRAPHICS",
            Page::LeadingCausesOfDeath => "LEADING_CAUSES_OF_DEATH",
            Page::SummaryMeasuresOfHealth => "SUMMARY_MEASURES_OF_HEALTH",
            Page::MeasuresOfBirthAndDeath => "MEASURES_OF_BIRTH_AND_DEATH",
            Page::RelativeHealthImportance => "RELATIVE_HEALTH_IMPORTANCE",
            Page::VulnerablePopsAndEnvHealth => "VULNERABLE_POPS_AND_ENV_HEALTH",
            Page::PreventiveServicesUse => "PREVENTIVE_SERVICES_USE",
            Page::RiskFactorsAndAccessToCare => "RISK_FACTORS_AND_ACCESS_TO_CARE",
            Page::DataElementDescription => "DATA_ELEMENT_DESCRIPTION",
            Page::DefinedDataValue => "DEFINED_DATA_VALUE",
            Page::HealthyPeople2010 => "HEALTHY_PEOPLE_2010",
        }
    }

    /// The on-disk CSV file name: underscores stripped, uppercased, `.csv`
    /// appended. One vendor file carries a historical typo that has to be
    /// reproduced verbatim, not fixed.
    pub fn filename(self) -> String {
        let base = match self {
            Page::VulnerablePopsAndEnvHealth => "VUNERABLEPOPSANDENVHEALTH".to_string(),
            _ => self.name().replace('_', ""),
        };
        format!("{base}.csv")
    }

    /// CamelCase form used as `PAGE_NAME` in the description catalog, e.g.
    /// `LEADING_CAUSES_OF_DEATH` → `LeadingCausesOfDeath`.
    pub fn display_name(self) -> String {
        self.name()
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => {
                        first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                    }
                    None => String::new(),
                }
            })
            .collect()
    }

    /// Row-key convention of this page.
    pub fn index(self) -> PageIndex {
        match self {
            Page::DataElementDescription => PageIndex::Description,
            Page::DefinedDataValue => PageIndex::DataValue,
            Page::HealthyPeople2010 => PageIndex::Unindexed,
            _ => PageIndex::County,
        }
    }

    /// Sentinel tokens read as missing for this page. The Healthy People
    /// 2010 targets page uses none.
    pub fn na_tokens(self) -> &'static [&'static str] {
        match self {
            Page::HealthyPeople2010 => &[],
            _ => NA_TOKENS,
        }
    }

    /// The ordered county-indexed pages that contribute to the assembled
    /// county table. The order fixes the column order of the result.
    pub fn county_pages() -> [Page; 8] {
        [
            Page::Demographics,
            Page::LeadingCausesOfDeath,
            Page::SummaryMeasuresOfHealth,
            Page::MeasuresOfBirthAndDeath,
            Page::RelativeHealthImportance,
            Page::RiskFactorsAndAccessToCare,
            Page::PreventiveServicesUse,
            Page::VulnerablePopsAndEnvHealth,
        ]
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

static PAGE_BY_NAME: Lazy<HashMap<&'static str, Page>> =
    Lazy::new(|| Page::ALL.into_iter().map(|page| (page.name(), page)).collect());

impl FromStr for Page {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PAGE_BY_NAME
            .get(s)
            .copied()
            .ok_or_else(|| Error::UnknownPage { name: s.to_string() })
    }
}

/// Whether a column is a confidence-interval, extremum, national-reference,
/// or expected-value column. Present in the raw tables but meaningless as
/// a per-county predictor.
pub fn is_non_county_column(name: &str) -> bool {
    let first = name.split('_').next().unwrap_or("");
    let last = name.rsplit('_').next().unwrap_or("");
    NON_COUNTY_PREFIXES.contains(&first) || NON_COUNTY_SUFFIXES.contains(&last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_is_deterministic_and_strips_underscores() {
        assert_eq!(Page::Demographics.filename(), "DEMOGRAPHICS.csv");
        assert_eq!(
            Page::LeadingCausesOfDeath.filename(),
            "LEADINGCAUSESOFDEATH.csv"
        );
        // Same answer on repeated calls.
        assert_eq!(
            Page::MeasuresOfBirthAndDeath.filename(),
            Page::MeasuresOfBirthAndDeath.filename()
        );
    }

    #[test]
    fn vendor_typo_is_preserved() {
        assert_eq!(
            Page::VulnerablePopsAndEnvHealth.filename(),
            "VUNERABLEPOPSANDENVHEALTH.csv"
        );
    }

    #[test]
    fn display_name_is_camel_case() {
        assert_eq!(
            Page::LeadingCausesOfDeath.display_name(),
            "LeadingCausesOfDeath"
        );
        assert_eq!(Page::Demographics.display_name(), "Demographics");
    }

    #[test]
    fn parse_round_trips_every_page() {
        for page in Page::ALL {
            assert_eq!(page.name().parse::<Page>().unwrap(), page);
        }
    }

    #[test]
    fn unknown_page_is_a_lookup_error() {
        let err = "NOT_A_PAGE".parse::<Page>().unwrap_err();
        assert!(matches!(err, Error::UnknownPage { name } if name == "NOT_A_PAGE"));
    }

    #[test]
    fn county_pages_are_eight_and_start_with_demographics() {
        let pages = Page::county_pages();
        assert_eq!(pages.len(), 8);
        assert_eq!(pages[0], Page::Demographics);
        for page in pages {
            assert_eq!(page.index(), PageIndex::County);
        }
    }

    #[test]
    fn non_county_classification() {
        assert!(is_non_county_column("CI_Min_Health_Status"));
        assert!(is_non_county_column("Min_ALE"));
        assert!(is_non_county_column("Max_ALE"));
        assert!(is_non_county_column("US_Health_Status"));
        assert!(is_non_county_column("Lung_Cancer_Exp"));
        assert!(!is_non_county_column("Health_Status"));
        assert!(!is_non_county_column("Toxic_Chem"));
    }
}
