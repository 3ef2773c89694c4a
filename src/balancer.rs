use crate::chart_of_accounts::ChartOfAccounts;
use crate::engine::class_totals;
use crate::error::{DistributionError, Result};
use crate::schema::{AccountClass, Allocation};
use crate::weights::WeightSet;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Adds `value` to the running total of `class`, failing instead of wrapping.
pub(crate) fn add_to_class(
    totals: &mut BTreeMap<AccountClass, i64>,
    class: AccountClass,
    value: i64,
) -> Result<()> {
    let total = totals.entry(class).or_insert(0);
    *total = total.checked_add(value).ok_or_else(|| {
        DistributionError::ArithmeticOverflow(format!("summing {} totals", class))
    })?;
    Ok(())
}

/// `Assets - (Liabilities + Equity)`; classes missing from `totals` count as zero.
pub fn equation_gap(totals: &BTreeMap<AccountClass, i64>) -> Result<i64> {
    let get = |class: AccountClass| i128::from(totals.get(&class).copied().unwrap_or(0));
    let gap =
        get(AccountClass::Assets) - (get(AccountClass::Liabilities) + get(AccountClass::Equity));
    i64::try_from(gap).map_err(|_| {
        DistributionError::ArithmeticOverflow(format!("computing equation gap {}", gap))
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquationCheck {
    pub bucket: String,
    pub assets: i64,
    pub liabilities: i64,
    pub equity: i64,
    pub gap: i64,
}

impl EquationCheck {
    pub fn from_totals(bucket: &str, totals: &BTreeMap<AccountClass, i64>) -> Result<Self> {
        let get = |class: AccountClass| totals.get(&class).copied().unwrap_or(0);
        Ok(Self {
            bucket: bucket.to_string(),
            assets: get(AccountClass::Assets),
            liabilities: get(AccountClass::Liabilities),
            equity: get(AccountClass::Equity),
            gap: equation_gap(totals)?,
        })
    }

    pub fn is_balanced(&self) -> bool {
        self.gap == 0
    }
}

/// Class total of the undistributed leaves next to the sum of that class over
/// all buckets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassReconciliation {
    pub class: AccountClass,
    pub source_total: i64,
    pub distributed_total: i64,
}

impl ClassReconciliation {
    pub fn is_consistent(&self) -> bool {
        self.source_total == self.distributed_total
    }
}

pub struct AccountingBalancer<'a> {
    chart: &'a ChartOfAccounts,
    allocations: &'a [Allocation],
}

impl<'a> AccountingBalancer<'a> {
    pub fn new(chart: &'a ChartOfAccounts, allocations: &'a [Allocation]) -> Self {
        Self { chart, allocations }
    }

    /// One identity check per bucket, in weight-set order. Gaps are reported,
    /// never corrected.
    pub fn equation_checks(&self, weights: &WeightSet) -> Result<Vec<EquationCheck>> {
        weights
            .bucket_names()
            .map(|bucket| -> Result<EquationCheck> {
                let check =
                    EquationCheck::from_totals(bucket, &class_totals(self.allocations, bucket)?)?;
                if !check.is_balanced() {
                    warn!(
                        "Bucket '{}' is out of balance: Assets {} vs Liabilities {} + Equity {} (gap {})",
                        check.bucket, check.assets, check.liabilities, check.equity, check.gap
                    );
                }
                Ok(check)
            })
            .collect()
    }

    pub fn reconcile_classes(&self) -> Result<Vec<ClassReconciliation>> {
        let source = self.chart.class_totals()?;

        let mut distributed: BTreeMap<AccountClass, i64> = BTreeMap::new();
        for allocation in self.allocations {
            let class = self
                .chart
                .find(&allocation.code)
                .map(|a| a.class)
                .unwrap_or(AccountClass::Unknown);
            add_to_class(&mut distributed, class, allocation.value)?;
        }

        Ok(AccountClass::ALL
            .into_iter()
            .filter(|class| source.contains_key(class) || distributed.contains_key(class))
            .map(|class| ClassReconciliation {
                class,
                source_total: source.get(&class).copied().unwrap_or(0),
                distributed_total: distributed.get(&class).copied().unwrap_or(0),
            })
            .collect())
    }

    /// Fails on the first class whose bucket totals do not add back up to the
    /// leaf total.
    pub fn verify_class_consistency(&self) -> Result<()> {
        match self.reconcile_classes()?.into_iter().find(|r| !r.is_consistent()) {
            Some(row) => Err(DistributionError::ClassTotalMismatch {
                class: row.class,
                expected: row.source_total,
                actual: row.distributed_total,
            }),
            None => Ok(()),
        }
    }
}

/// Opt-in hard check: fails when any bucket's absolute gap exceeds `tolerance`.
pub fn verify_accounting_equation(checks: &[EquationCheck], tolerance: u64) -> Result<()> {
    for check in checks {
        if check.gap.unsigned_abs() > tolerance {
            return Err(DistributionError::AccountingEquationViolation {
                bucket: check.bucket.clone(),
                assets: check.assets,
                liabilities: check.liabilities,
                equity: check.equity,
                gap: check.gap,
            });
        }
    }

    Ok(())
}
