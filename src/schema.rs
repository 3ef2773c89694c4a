use crate::error::Result;
use crate::weights::WeightSet;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level account class, keyed by the first digit of a PUC code.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema,
)]
#[serde(rename_all = "PascalCase")]
pub enum AccountClass {
    #[schemars(description = "Class 1: resources controlled by the entity (debit balance)")]
    Assets,

    #[schemars(description = "Class 2: obligations owed to third parties (credit balance)")]
    Liabilities,

    #[schemars(description = "Class 3: residual interest of the owners (credit balance)")]
    Equity,

    #[schemars(description = "Class 4: operating and non-operating income")]
    Income,

    #[schemars(description = "Class 5: administrative and operating expenses")]
    Expense,

    #[schemars(description = "Class 6: cost of sales and services")]
    Cost,

    #[schemars(description = "Class 7: production and operation costs")]
    ProductionCost,

    #[schemars(description = "Class 8: debit memorandum accounts")]
    MemoDebit,

    #[schemars(description = "Class 9: credit memorandum accounts")]
    MemoCredit,

    #[schemars(description = "Code starts with a digit outside 1-9")]
    Unknown,
}

impl AccountClass {
    pub const ALL: [AccountClass; 10] = [
        AccountClass::Assets,
        AccountClass::Liabilities,
        AccountClass::Equity,
        AccountClass::Income,
        AccountClass::Expense,
        AccountClass::Cost,
        AccountClass::ProductionCost,
        AccountClass::MemoDebit,
        AccountClass::MemoCredit,
        AccountClass::Unknown,
    ];

    pub fn from_digit(digit: char) -> Self {
        match digit {
            '1' => AccountClass::Assets,
            '2' => AccountClass::Liabilities,
            '3' => AccountClass::Equity,
            '4' => AccountClass::Income,
            '5' => AccountClass::Expense,
            '6' => AccountClass::Cost,
            '7' => AccountClass::ProductionCost,
            '8' => AccountClass::MemoDebit,
            '9' => AccountClass::MemoCredit,
            _ => AccountClass::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AccountClass::Assets => "Assets",
            AccountClass::Liabilities => "Liabilities",
            AccountClass::Equity => "Equity",
            AccountClass::Income => "Income",
            AccountClass::Expense => "Expense",
            AccountClass::Cost => "Cost",
            AccountClass::ProductionCost => "Production Cost",
            AccountClass::MemoDebit => "Memo Debit",
            AccountClass::MemoCredit => "Memo Credit",
            AccountClass::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for AccountClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Hierarchy depth, derived from the digit length of a code.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema,
)]
#[serde(rename_all = "PascalCase")]
pub enum AccountLevel {
    #[schemars(description = "1-digit code")]
    Class,
    #[schemars(description = "2-digit code")]
    Group,
    #[schemars(description = "4-digit code")]
    Account,
    #[schemars(description = "6-digit code")]
    Subaccount,
    #[schemars(description = "Any other length (typically 7 or more digits)")]
    Auxiliary,
}

impl AccountLevel {
    /// Numeric depth, 1 through 5.
    pub fn depth(&self) -> u8 {
        match self {
            AccountLevel::Class => 1,
            AccountLevel::Group => 2,
            AccountLevel::Account => 3,
            AccountLevel::Subaccount => 4,
            AccountLevel::Auxiliary => 5,
        }
    }
}

/// A flat balance row as handed over by the spreadsheet reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RawRow {
    #[schemars(
        description = "Account code, digits optionally separated by dots, spaces or hyphens (e.g. '11.05.05')"
    )]
    pub code: String,

    #[schemars(description = "Account name as it appears in the balance")]
    pub name: String,

    #[schemars(description = "Balance in whole currency units")]
    pub value: i64,
}

impl RawRow {
    pub fn new(code: impl Into<String>, name: impl Into<String>, value: i64) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Account {
    /// Normalized, digits-only code.
    pub code: String,
    pub name: String,
    pub value: i64,
    pub level: AccountLevel,
    pub class: AccountClass,
    /// True iff no other account code extends this one.
    pub is_leaf: bool,
}

/// One leaf account's share in one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Allocation {
    pub bucket: String,
    pub code: String,
    pub value: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DistributionConfig {
    #[schemars(
        description = "Ordered list of buckets and their percentages. Percentages must sum to 100 (within 0.01). Order matters: earlier buckets win remainder ties."
    )]
    pub weights: WeightSet,

    #[serde(default)]
    #[schemars(
        description = "Optional maximum absolute Assets - (Liabilities + Equity) gap per bucket. When set, a larger gap fails processing; when absent the gap is only reported."
    )]
    pub equation_tolerance: Option<u64>,
}

impl DistributionConfig {
    pub fn new(weights: WeightSet) -> Self {
        Self {
            weights,
            equation_tolerance: None,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(DistributionConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}
