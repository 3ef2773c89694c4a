use crate::error::{DistributionError, Result};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Allowed drift of the percentage sum away from 100.
pub const WEIGHT_SUM_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BucketWeight {
    #[schemars(description = "Name of the destination ledger (e.g. a public service)")]
    pub bucket: String,

    #[schemars(description = "Share of every leaf account assigned to this bucket, in percent")]
    pub percentage: Decimal,
}

impl BucketWeight {
    pub fn new(bucket: impl Into<String>, percentage: Decimal) -> Self {
        Self {
            bucket: bucket.into(),
            percentage,
        }
    }
}

/// Ordered bucket weights. Order is significant: it breaks remainder ties.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct WeightSet(Vec<BucketWeight>);

impl WeightSet {
    pub fn new(buckets: Vec<BucketWeight>) -> Self {
        Self(buckets)
    }

    pub fn buckets(&self) -> &[BucketWeight] {
        &self.0
    }

    pub fn bucket_names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|w| w.bucket.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total(&self) -> Decimal {
        self.0.iter().map(|w| w.percentage).sum()
    }

    pub fn validate(&self) -> Result<()> {
        if self.0.is_empty() {
            return Err(DistributionError::InvalidWeights(
                "At least one bucket is required".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for weight in &self.0 {
            if weight.bucket.trim().is_empty() {
                return Err(DistributionError::InvalidWeights(
                    "Bucket names must not be empty".to_string(),
                ));
            }
            if !names.insert(weight.bucket.as_str()) {
                return Err(DistributionError::InvalidWeights(format!(
                    "Duplicate bucket '{}'",
                    weight.bucket
                )));
            }
            if weight.percentage < Decimal::ZERO {
                return Err(DistributionError::InvalidWeights(format!(
                    "Bucket '{}' has negative percentage {}",
                    weight.bucket, weight.percentage
                )));
            }
        }

        let total = self.total();
        if (total - Decimal::ONE_HUNDRED).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(DistributionError::InvalidWeights(format!(
                "Percentages must sum to 100 (got {})",
                total
            )));
        }

        Ok(())
    }
}

impl FromIterator<BucketWeight> for WeightSet {
    fn from_iter<T: IntoIterator<Item = BucketWeight>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights(entries: &[(&str, &str)]) -> WeightSet {
        entries
            .iter()
            .map(|(name, pct)| BucketWeight::new(*name, pct.parse().unwrap()))
            .collect()
    }

    #[test]
    fn test_valid_weights() {
        let set = weights(&[("Water", "50"), ("Sewer", "30"), ("Waste", "20")]);
        assert!(set.validate().is_ok());
        assert_eq!(set.total(), Decimal::ONE_HUNDRED);
        assert_eq!(
            set.bucket_names().collect::<Vec<_>>(),
            vec!["Water", "Sewer", "Waste"]
        );
    }

    #[test]
    fn test_sum_within_tolerance() {
        let set = weights(&[("A", "33.33"), ("B", "33.33"), ("C", "33.33")]);
        assert!(set.validate().is_ok());

        let set = weights(&[("A", "33.33"), ("B", "33.33"), ("C", "33.32")]);
        assert!(matches!(
            set.validate(),
            Err(DistributionError::InvalidWeights(_))
        ));
    }

    #[test]
    fn test_invalid_weights() {
        assert!(WeightSet::default().validate().is_err());
        assert!(weights(&[("A", "60"), ("B", "30")]).validate().is_err());
        assert!(weights(&[("A", "50"), ("A", "50")]).validate().is_err());
        assert!(weights(&[("A", "110"), ("B", "-10")]).validate().is_err());
        assert!(weights(&[(" ", "100")]).validate().is_err());
    }

    #[test]
    fn test_zero_percentage_bucket_is_allowed() {
        let set = weights(&[("A", "100"), ("B", "0")]);
        assert!(set.validate().is_ok());
    }
}
