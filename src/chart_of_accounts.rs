use crate::balancer::add_to_class;
use crate::classification::{classify, is_numeric_code, level_for_code, normalize_code};
use crate::error::{DistributionError, Result};
use crate::ingestion::{invalid_value_reason, parse_value};
use crate::schema::{Account, AccountClass, RawRow};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// A row dropped by the data-quality filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRow {
    /// 1-based position in the input.
    pub line: usize,
    pub code: String,
    pub reason: String,
}

/// Account tree rebuilt from flat coded rows.
///
/// Accounts keep their input order; `sorted` indexes them by code so prefix
/// relationships can be found without a parent/child object graph.
#[derive(Debug, Clone, Serialize)]
pub struct ChartOfAccounts {
    accounts: Vec<Account>,
    #[serde(skip)]
    sorted: Vec<usize>,
    skipped: Vec<SkippedRow>,
}

impl ChartOfAccounts {
    pub fn build(rows: &[RawRow]) -> Result<Self> {
        Self::assemble(
            rows.iter().enumerate().map(|(idx, row)| (idx + 1, row)),
            Vec::new(),
        )
    }

    /// Builds from `(code, name, value)` text cells as read from a spreadsheet.
    ///
    /// Cells whose value does not parse are skipped and recorded like any other
    /// malformed row; they never abort the load.
    pub fn build_from_text<'a, I>(cells: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str, &'a str)>,
    {
        let mut rows = Vec::new();
        let mut skipped = Vec::new();

        for (idx, (code, name, value)) in cells.into_iter().enumerate() {
            let line = idx + 1;
            match parse_value(value) {
                Some(parsed) => rows.push((line, RawRow::new(code, name, parsed))),
                None => skipped.push(skip_row(line, code, &invalid_value_reason(value))),
            }
        }

        Self::assemble(rows.iter().map(|(line, row)| (*line, row)), skipped)
    }

    fn assemble<'r, I>(rows: I, mut skipped: Vec<SkippedRow>) -> Result<Self>
    where
        I: Iterator<Item = (usize, &'r RawRow)>,
    {
        let mut accounts = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for (line, row) in rows {
            let code = normalize_code(&row.code);
            let name = row.name.trim();

            let rejection = if code.is_empty() {
                Some("empty code")
            } else if name.is_empty() {
                Some("empty name")
            } else if !is_numeric_code(&code) {
                Some("code is not numeric")
            } else if seen.contains(&code) {
                Some("duplicate code")
            } else {
                None
            };

            if let Some(reason) = rejection {
                skipped.push(skip_row(line, &row.code, reason));
                continue;
            }

            seen.insert(code.clone());
            accounts.push(Account {
                level: level_for_code(&code),
                class: classify(&code),
                code,
                name: name.to_string(),
                value: row.value,
                is_leaf: true,
            });
        }

        if accounts.is_empty() {
            return Err(DistributionError::EmptyBalance);
        }

        skipped.sort_by_key(|s| s.line);
        let sorted = sorted_index(&accounts);
        mark_leaves(&mut accounts, &sorted);

        let chart = Self {
            accounts,
            sorted,
            skipped,
        };

        info!(
            "Built chart of accounts: {} accounts ({} leaves), {} rows skipped",
            chart.accounts.len(),
            chart.leaves().count(),
            chart.skipped.len()
        );

        Ok(chart)
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn skipped(&self) -> &[SkippedRow] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn leaves(&self) -> impl Iterator<Item = &Account> {
        self.accounts.iter().filter(|a| a.is_leaf)
    }

    /// Looks up an account by code; separators in `code` are ignored.
    pub fn find(&self, code: &str) -> Option<&Account> {
        let code = normalize_code(code);
        self.sorted
            .binary_search_by(|&i| self.accounts[i].code.as_str().cmp(code.as_str()))
            .ok()
            .map(|pos| &self.accounts[self.sorted[pos]])
    }

    /// Leaf accounts whose code starts with `prefix`, in code order. A leaf
    /// matching `prefix` exactly is included.
    pub fn leaf_descendants(&self, prefix: &str) -> Vec<&Account> {
        let prefix = normalize_code(prefix);
        let start = self
            .sorted
            .partition_point(|&i| self.accounts[i].code.as_str() < prefix.as_str());

        self.sorted[start..]
            .iter()
            .map(|&i| &self.accounts[i])
            .take_while(|a| a.code.starts_with(&prefix))
            .filter(|a| a.is_leaf)
            .collect()
    }

    /// Per-class totals summed over leaf accounts only.
    pub fn class_totals(&self) -> Result<BTreeMap<AccountClass, i64>> {
        let mut totals = BTreeMap::new();
        for account in self.leaves() {
            add_to_class(&mut totals, account.class, account.value)?;
        }
        debug!("Leaf class totals: {:?}", totals);
        Ok(totals)
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn skip_row(line: usize, code: &str, reason: &str) -> SkippedRow {
    let err = DistributionError::InvalidRow {
        line,
        code: code.to_string(),
        reason: reason.to_string(),
    };
    warn!("Skipping balance row: {}", err);
    SkippedRow {
        line,
        code: code.to_string(),
        reason: reason.to_string(),
    }
}

fn sorted_index(accounts: &[Account]) -> Vec<usize> {
    let mut sorted: Vec<usize> = (0..accounts.len()).collect();
    sorted.sort_by(|&a, &b| accounts[a].code.cmp(&accounts[b].code));
    sorted
}

// Codes sharing a prefix form a contiguous run right after that prefix in
// lexicographic order, so only the next neighbour needs checking.
fn mark_leaves(accounts: &mut [Account], sorted: &[usize]) {
    for pair in sorted.windows(2) {
        let (current, next) = (pair[0], pair[1]);
        let has_child = {
            let parent = &accounts[current].code;
            let candidate = &accounts[next].code;
            candidate.len() > parent.len() && candidate.starts_with(parent.as_str())
        };
        if has_child {
            accounts[current].is_leaf = false;
        }
    }
}
