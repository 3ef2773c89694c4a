//! # PUC Distribution
//!
//! A library for rebuilding a consolidated chart-of-accounts balance from flat
//! coded rows and splitting it across service ledgers without rounding drift.
//!
//! ## Core Concepts
//!
//! - **PUC Codes**: Numeric account codes whose length encodes hierarchy depth and whose
//!   first digit encodes the account class (1 Assets, 2 Liabilities, 3 Equity, ...)
//! - **Leaf Accounts**: Accounts no other code extends. Only leaves are summed or split,
//!   so aggregate parent rows never double count
//! - **Buckets**: Named destination ledgers (e.g. public services), each with a percentage
//! - **Largest Remainder Method**: Every leaf value is split into integers whose sum is the
//!   original value exactly; leftover units go to the largest fractional remainders, ties
//!   to the bucket listed first
//! - **Accounting Identity**: Assets = Liabilities + Equity is reported per bucket as a
//!   diagnostic gap, never forced
//!
//! ## Example
//!
//! ```rust
//! use puc_distribution::*;
//! use rust_decimal::Decimal;
//!
//! let rows = vec![
//!     RawRow::new("1", "ACTIVO", 1000),
//!     RawRow::new("11.05", "CAJA", 1000),
//!     RawRow::new("24.05", "IMPUESTOS", 400),
//!     RawRow::new("31.05", "CAPITAL", 600),
//! ];
//!
//! let config = DistributionConfig::new(WeightSet::new(vec![
//!     BucketWeight::new("Water", Decimal::from(50)),
//!     BucketWeight::new("Sewer", Decimal::from(30)),
//!     BucketWeight::new("Waste", Decimal::from(20)),
//! ]));
//!
//! let report = process_balance(&rows, &config).unwrap();
//! assert_eq!(report.allocations.len(), 9);
//! assert!(report.equation_checks.iter().all(|c| c.gap == 0));
//! ```

pub mod balancer;
pub mod chart_of_accounts;
pub mod classification;
pub mod engine;
pub mod error;
pub mod ingestion;
pub mod schema;
pub mod weights;

pub use balancer::{
    equation_gap, verify_accounting_equation, AccountingBalancer, ClassReconciliation,
    EquationCheck,
};
pub use chart_of_accounts::{ChartOfAccounts, SkippedRow};
pub use classification::{classify, level_for_code, normalize_code};
pub use engine::{bucket_class_totals, class_totals, distribute, DistributionEngine};
pub use error::{DistributionError, Result};
pub use ingestion::{parse_row, parse_value};
pub use schema::*;
pub use weights::{BucketWeight, WeightSet};

use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeMap;

/// Everything derived from one balance load.
#[derive(Debug, Clone, Serialize)]
pub struct DistributionReport {
    pub chart: ChartOfAccounts,
    pub allocations: Vec<Allocation>,
    /// Per-bucket class totals, keyed by bucket name.
    pub bucket_totals: BTreeMap<String, BTreeMap<AccountClass, i64>>,
    /// One entry per bucket, in weight-set order.
    pub equation_checks: Vec<EquationCheck>,
    pub reconciliation: Vec<ClassReconciliation>,
}

impl DistributionReport {
    pub fn allocations_for<'a>(&'a self, bucket: &'a str) -> impl Iterator<Item = &'a Allocation> {
        self.allocations.iter().filter(move |a| a.bucket == bucket)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub struct BalanceProcessor;

impl BalanceProcessor {
    pub fn process(rows: &[RawRow], config: &DistributionConfig) -> Result<DistributionReport> {
        let engine = DistributionEngine::new(&config.weights)?;

        info!(
            "Processing balance: {} rows across {} buckets",
            rows.len(),
            config.weights.len()
        );

        let chart = ChartOfAccounts::build(rows)?;
        Self::run(&engine, chart, config)
    }

    /// Distributes an already built chart, e.g. one from
    /// [`ChartOfAccounts::build_from_text`].
    pub fn process_chart(
        chart: ChartOfAccounts,
        config: &DistributionConfig,
    ) -> Result<DistributionReport> {
        let engine = DistributionEngine::new(&config.weights)?;
        Self::run(&engine, chart, config)
    }

    fn run(
        engine: &DistributionEngine<'_>,
        chart: ChartOfAccounts,
        config: &DistributionConfig,
    ) -> Result<DistributionReport> {
        let allocations = engine.distribute(chart.accounts())?;
        let bucket_totals = bucket_class_totals(&allocations, &config.weights)?;

        let balancer = AccountingBalancer::new(&chart, &allocations);
        let equation_checks = balancer.equation_checks(&config.weights)?;
        let reconciliation = balancer.reconcile_classes()?;
        balancer.verify_class_consistency()?;

        if let Some(tolerance) = config.equation_tolerance {
            verify_accounting_equation(&equation_checks, tolerance)?;
        }

        debug!(
            "Balance processed: {} allocations, gaps {:?}",
            allocations.len(),
            equation_checks.iter().map(|c| c.gap).collect::<Vec<_>>()
        );

        Ok(DistributionReport {
            chart,
            allocations,
            bucket_totals,
            equation_checks,
            reconciliation,
        })
    }
}

pub fn process_balance(rows: &[RawRow], config: &DistributionConfig) -> Result<DistributionReport> {
    BalanceProcessor::process(rows, config)
}
