use crate::schema::AccountClass;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DistributionError {
    #[error("Invalid row {line} (code '{code}'): {reason}")]
    InvalidRow {
        line: usize,
        code: String,
        reason: String,
    },

    #[error("Balance is empty: no valid account rows were found")]
    EmptyBalance,

    #[error("No leaf accounts to distribute")]
    EmptyInput,

    #[error("Invalid bucket weights: {0}")]
    InvalidWeights(String),

    #[error("Arithmetic overflow while {0}")]
    ArithmeticOverflow(String),

    #[error("Class total mismatch for {class}: leaf accounts sum to {expected}, buckets sum to {actual}")]
    ClassTotalMismatch {
        class: AccountClass,
        expected: i64,
        actual: i64,
    },

    #[error("Accounting equation violation in bucket '{bucket}': Assets ({assets}) != Liabilities ({liabilities}) + Equity ({equity}), gap {gap}")]
    AccountingEquationViolation {
        bucket: String,
        assets: i64,
        liabilities: i64,
        equity: i64,
        gap: i64,
    },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DistributionError>;
