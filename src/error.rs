use polars::error::PolarsError;
use thiserror::Error;

/// Failure kinds of the preparation chain. Everything propagates to the
/// caller; nothing is retried.
#[derive(Debug, Error)]
pub enum Error {
    /// A page name that is not part of the CHSI dataset.
    #[error("unknown CHSI page `{name}`")]
    UnknownPage { name: String },

    /// I/O and parse failures surfaced by the tabular engine, including a
    /// missing source file.
    #[error(transparent)]
    Polars(#[from] PolarsError),

    /// An `MOBD_Time_Span` value that is not two hyphen-separated years.
    #[error("malformed time span `{value}`, expected \"YYYY-YYYY\"")]
    TimeSpan { value: String },

    /// The dependent column is absent or non-numeric when building the
    /// supervised training view.
    #[error("training contract violated: {reason}")]
    Training { reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
