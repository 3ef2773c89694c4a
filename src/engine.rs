use crate::balancer::add_to_class;
use crate::classification::classify;
use crate::error::{DistributionError, Result};
use crate::schema::{Account, AccountClass, Allocation};
use crate::weights::WeightSet;
use log::{debug, info};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Splits leaf account values across weighted buckets using the largest
/// remainder method.
///
/// Percentages are rescaled to integers sharing one scale, so every raw share
/// `value * p_i / total` is an exact rational with a common denominator. Floors
/// and remainders are computed on integers only; output is reproducible bit
/// for bit.
pub struct DistributionEngine<'a> {
    weights: &'a WeightSet,
    scaled: Vec<i128>,
    denominator: i128,
}

impl<'a> DistributionEngine<'a> {
    pub fn new(weights: &'a WeightSet) -> Result<Self> {
        weights.validate()?;

        let scale = weights
            .buckets()
            .iter()
            .map(|w| w.percentage.normalize().scale())
            .max()
            .unwrap_or(0);

        let scaled = weights
            .buckets()
            .iter()
            .map(|w| rescale(w.percentage, scale))
            .collect::<Option<Vec<i128>>>()
            .ok_or_else(|| {
                DistributionError::InvalidWeights(
                    "Percentages carry more precision than can be represented".to_string(),
                )
            })?;

        let denominator: i128 = scaled.iter().sum();

        debug!(
            "Distribution engine ready: {} buckets, scale {}, denominator {}",
            scaled.len(),
            scale,
            denominator
        );

        Ok(Self {
            weights,
            scaled,
            denominator,
        })
    }

    /// Splits one integer value; the result is in bucket order and sums to `value`.
    pub fn split_value(&self, value: i64) -> Result<Vec<i64>> {
        self.split(value)
            .ok_or_else(|| DistributionError::ArithmeticOverflow(format!("splitting value {}", value)))
    }

    fn split(&self, value: i64) -> Option<Vec<i64>> {
        let value = i128::from(value);
        let mut floors = Vec::with_capacity(self.scaled.len());
        let mut remainders = Vec::with_capacity(self.scaled.len());

        for &weight in &self.scaled {
            let numerator = value.checked_mul(weight)?;
            floors.push(numerator.div_euclid(self.denominator));
            remainders.push(numerator.rem_euclid(self.denominator));
        }

        // Remainders share one denominator and each is below it, so the
        // shortfall is a whole number of units smaller than the bucket count.
        let deficit = value.checked_sub(floors.iter().sum::<i128>())?;
        let deficit = usize::try_from(deficit).ok()?;

        let mut order: Vec<usize> = (0..floors.len()).collect();
        // Stable: equal remainders keep bucket order.
        order.sort_by(|&a, &b| remainders[b].cmp(&remainders[a]));

        for &idx in order.iter().take(deficit) {
            floors[idx] += 1;
        }

        floors.into_iter().map(|f| i64::try_from(f).ok()).collect()
    }

    /// Allocates every leaf account in `accounts`; non-leaf accounts are ignored.
    pub fn distribute(&self, accounts: &[Account]) -> Result<Vec<Allocation>> {
        let leaves: Vec<&Account> = accounts.iter().filter(|a| a.is_leaf).collect();
        if leaves.is_empty() {
            return Err(DistributionError::EmptyInput);
        }

        let mut allocations = Vec::with_capacity(leaves.len() * self.scaled.len());

        for account in &leaves {
            let shares = self.split(account.value).ok_or_else(|| {
                DistributionError::ArithmeticOverflow(format!(
                    "splitting account {} value {}",
                    account.code, account.value
                ))
            })?;

            for (weight, value) in self.weights.buckets().iter().zip(shares) {
                allocations.push(Allocation {
                    bucket: weight.bucket.clone(),
                    code: account.code.clone(),
                    value,
                });
            }
        }

        info!(
            "Distributed {} leaf accounts across {} buckets ({} allocations)",
            leaves.len(),
            self.scaled.len(),
            allocations.len()
        );

        Ok(allocations)
    }
}

fn rescale(percentage: Decimal, scale: u32) -> Option<i128> {
    let normalized = percentage.normalize();
    let factor = 10i128.checked_pow(scale.checked_sub(normalized.scale())?)?;
    normalized.mantissa().checked_mul(factor)
}

/// Validates `weights` and splits every leaf account in `accounts`.
pub fn distribute(accounts: &[Account], weights: &WeightSet) -> Result<Vec<Allocation>> {
    DistributionEngine::new(weights)?.distribute(accounts)
}

/// Per-class totals of one bucket's allocations.
pub fn class_totals(
    allocations: &[Allocation],
    bucket: &str,
) -> Result<BTreeMap<AccountClass, i64>> {
    let mut totals = BTreeMap::new();
    for allocation in allocations.iter().filter(|a| a.bucket == bucket) {
        add_to_class(&mut totals, classify(&allocation.code), allocation.value)?;
    }
    Ok(totals)
}

/// Per-class totals for every bucket in `weights`, keyed by bucket name.
pub fn bucket_class_totals(
    allocations: &[Allocation],
    weights: &WeightSet,
) -> Result<BTreeMap<String, BTreeMap<AccountClass, i64>>> {
    weights
        .bucket_names()
        .map(|bucket| -> Result<(String, BTreeMap<AccountClass, i64>)> {
            Ok((bucket.to_string(), class_totals(allocations, bucket)?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weights::BucketWeight;

    fn weights(entries: &[(&str, &str)]) -> WeightSet {
        entries
            .iter()
            .map(|(name, pct)| BucketWeight::new(*name, pct.parse().unwrap()))
            .collect()
    }

    fn leaf(code: &str, value: i64) -> Account {
        Account {
            code: code.to_string(),
            name: format!("Account {}", code),
            value,
            level: crate::classification::level_for_code(code),
            class: classify(code),
            is_leaf: true,
        }
    }

    #[test]
    fn test_largest_remainder_gets_extra_unit() {
        let set = weights(&[("A", "50"), ("B", "30"), ("C", "20")]);
        let engine = DistributionEngine::new(&set).unwrap();
        assert_eq!(engine.split_value(101).unwrap(), vec![51, 30, 20]);
    }

    #[test]
    fn test_tie_broken_by_bucket_order() {
        let set = weights(&[("A", "34"), ("B", "33"), ("C", "33")]);
        let engine = DistributionEngine::new(&set).unwrap();
        // Remainders 0.4, 0.3, 0.3: A wins outright.
        assert_eq!(engine.split_value(10).unwrap(), vec![4, 3, 3]);
        // Remainders 0.8, 0.6, 0.6: A and then B, by listed order.
        assert_eq!(engine.split_value(20).unwrap(), vec![7, 7, 6]);

        let set = weights(&[("A", "25"), ("B", "25"), ("C", "25"), ("D", "25")]);
        let engine = DistributionEngine::new(&set).unwrap();
        assert_eq!(engine.split_value(3).unwrap(), vec![1, 1, 1, 0]);
        assert_eq!(engine.split_value(6).unwrap(), vec![2, 2, 1, 1]);
    }

    #[test]
    fn test_exact_split_has_no_deficit() {
        let set = weights(&[("A", "50"), ("B", "30"), ("C", "20")]);
        let engine = DistributionEngine::new(&set).unwrap();
        assert_eq!(engine.split_value(1000).unwrap(), vec![500, 300, 200]);
        assert_eq!(engine.split_value(0).unwrap(), vec![0, 0, 0]);
    }

    #[test]
    fn test_negative_values_sum_exactly() {
        let set = weights(&[("A", "50"), ("B", "30"), ("C", "20")]);
        let engine = DistributionEngine::new(&set).unwrap();
        // Raw -50.5, -30.3, -20.2; floors -51, -31, -21; remainders .5, .7, .8.
        let shares = engine.split_value(-101).unwrap();
        assert_eq!(shares, vec![-51, -30, -20]);
        assert_eq!(shares.iter().sum::<i64>(), -101);
    }

    #[test]
    fn test_fractional_percentages() {
        let set = weights(&[("A", "33.34"), ("B", "33.33"), ("C", "33.33")]);
        let engine = DistributionEngine::new(&set).unwrap();
        let shares = engine.split_value(1_000_001).unwrap();
        assert_eq!(shares.iter().sum::<i64>(), 1_000_001);
        assert_eq!(shares, vec![333_401, 333_300, 333_300]);
    }

    #[test]
    fn test_weights_short_of_hundred_still_sum_exactly() {
        let set = weights(&[("A", "33.33"), ("B", "33.33"), ("C", "33.33")]);
        let engine = DistributionEngine::new(&set).unwrap();
        for value in [1, 2, 100, 999_999_999, -7] {
            let shares = engine.split_value(value).unwrap();
            assert_eq!(shares.iter().sum::<i64>(), value, "value {}", value);
        }
        assert_eq!(engine.split_value(300).unwrap(), vec![100, 100, 100]);
    }

    #[test]
    fn test_distribute_skips_non_leaf_accounts() {
        let set = weights(&[("Water", "60"), ("Sewer", "40")]);
        let mut parent = leaf("11", 1000);
        parent.is_leaf = false;
        let accounts = vec![parent, leaf("1105", 1000), leaf("2405", 7)];

        let allocations = distribute(&accounts, &set).unwrap();
        assert_eq!(allocations.len(), 4);
        assert!(allocations.iter().all(|a| a.code != "11"));

        assert_eq!(allocations[0].bucket, "Water");
        assert_eq!(allocations[0].code, "1105");
        assert_eq!(allocations[0].value, 600);
        assert_eq!(allocations[2].value, 4);
        assert_eq!(allocations[3].value, 3);
    }

    #[test]
    fn test_distribute_errors() {
        let good = weights(&[("A", "100")]);
        let bad = weights(&[("A", "90")]);

        let result = distribute(&[leaf("1105", 10)], &bad);
        assert!(matches!(result, Err(DistributionError::InvalidWeights(_))));

        let result = distribute(&[], &good);
        assert!(matches!(result, Err(DistributionError::EmptyInput)));

        let mut parent = leaf("1", 10);
        parent.is_leaf = false;
        let result = distribute(&[parent], &good);
        assert!(matches!(result, Err(DistributionError::EmptyInput)));

        // Weights are checked before the input.
        let result = distribute(&[], &bad);
        assert!(matches!(result, Err(DistributionError::InvalidWeights(_))));
    }

    #[test]
    fn test_distribute_is_idempotent() {
        let set = weights(&[("A", "12.5"), ("B", "37.5"), ("C", "50")]);
        let accounts: Vec<Account> = (1..=50)
            .map(|i| leaf(&format!("51{:02}", i), i * 7))
            .collect();

        let first = distribute(&accounts, &set).unwrap();
        let second = distribute(&accounts, &set).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_class_totals_per_bucket() {
        let set = weights(&[("A", "50"), ("B", "50")]);
        let accounts = vec![leaf("1105", 101), leaf("2405", 40), leaf("3105", 61)];
        let allocations = distribute(&accounts, &set).unwrap();

        let a = class_totals(&allocations, "A").unwrap();
        let b = class_totals(&allocations, "B").unwrap();
        assert_eq!(a[&AccountClass::Assets], 51);
        assert_eq!(b[&AccountClass::Assets], 50);
        assert_eq!(a[&AccountClass::Equity] + b[&AccountClass::Equity], 61);
        assert!(class_totals(&allocations, "Missing").unwrap().is_empty());

        let all = bucket_class_totals(&allocations, &set).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["B"][&AccountClass::Liabilities], 20);
    }

    #[test]
    fn test_bucket_totals_overflow_is_an_error() {
        let set = weights(&[("A", "100")]);
        let half = i64::MAX / 2 + 1;
        let accounts = vec![leaf("1105", half), leaf("1110", half)];

        let allocations = distribute(&accounts, &set).unwrap();
        assert!(matches!(
            class_totals(&allocations, "A"),
            Err(DistributionError::ArithmeticOverflow(_))
        ));
        assert!(matches!(
            bucket_class_totals(&allocations, &set),
            Err(DistributionError::ArithmeticOverflow(_))
        ));
    }

    #[test]
    fn test_extreme_value_splits_exactly() {
        let set = weights(&[("A", "50"), ("B", "50")]);
        let engine = DistributionEngine::new(&set).unwrap();
        let shares = engine.split_value(i64::MAX).unwrap();
        let total: i128 = shares.iter().map(|&s| i128::from(s)).sum();
        assert_eq!(total, i128::from(i64::MAX));
    }
}
