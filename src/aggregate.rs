// Aggregation stage: partition by a categorical key, reduce numeric
// fields per partition.
//
// Groups come back sorted by key so results are deterministic regardless
// of record order. The missing-value sentinel forms its own group rather
// than being dropped; rows with unattributed amounts still count.
use std::collections::{BTreeMap, HashSet};

use crate::types::{Dataset, Value, MISSING_LABEL};

/// How a numeric field is reduced within a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Sum,
    /// Unique non-missing string values of the target field.
    DistinctCount,
}

#[derive(Debug, Clone)]
pub struct Reducer {
    pub field: String,
    pub reduction: Reduction,
}

impl Reducer {
    pub fn sum(field: &str) -> Reducer {
        Reducer {
            field: field.to_string(),
            reduction: Reduction::Sum,
        }
    }

    pub fn distinct(field: &str) -> Reducer {
        Reducer {
            field: field.to_string(),
            reduction: Reduction::DistinctCount,
        }
    }
}

/// One output row: the group key plus one reduced value per reducer, in
/// reducer declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRow {
    pub key: String,
    pub values: Vec<f64>,
    pub record_count: usize,
}

/// Result of one aggregation pass. Recomputed on every filter change,
/// never persisted. Zero groups is the explicit empty state.
#[derive(Debug, Clone)]
pub struct AggregationResult {
    pub groups: Vec<GroupRow>,
}

impl AggregationResult {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn group(&self, key: &str) -> Option<&GroupRow> {
        self.groups.iter().find(|g| g.key == key)
    }
}

/// Group `dataset` by `group_field` and apply each reducer per partition.
///
/// Sums over an empty partition yield 0, never NaN. Distinct counts skip
/// the missing sentinel. Unknown field names reduce to 0 for every group;
/// referencing an unmapped field is caught at pipeline construction.
pub fn aggregate(dataset: &Dataset, group_field: &str, reducers: &[Reducer]) -> AggregationResult {
    let group_idx = dataset.schema.field_index(group_field);
    let reducer_idx: Vec<Option<usize>> = reducers
        .iter()
        .map(|r| dataset.schema.field_index(&r.field))
        .collect();

    // BTreeMap keeps group keys in ascending order for determinism.
    let mut partitions: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (row, record) in dataset.records.iter().enumerate() {
        let key = match group_idx {
            Some(i) => record.get(i).label().to_string(),
            None => MISSING_LABEL.to_string(),
        };
        partitions.entry(key).or_default().push(row);
    }

    let groups = partitions
        .into_iter()
        .map(|(key, rows)| {
            let values = reducers
                .iter()
                .zip(reducer_idx.iter())
                .map(|(reducer, idx)| reduce(dataset, &rows, reducer, *idx))
                .collect();
            GroupRow {
                key,
                values,
                record_count: rows.len(),
            }
        })
        .collect();

    AggregationResult { groups }
}

fn reduce(dataset: &Dataset, rows: &[usize], reducer: &Reducer, idx: Option<usize>) -> f64 {
    let Some(idx) = idx else {
        return 0.0;
    };
    match reducer.reduction {
        Reduction::Sum => rows
            .iter()
            .map(|&r| dataset.records[r].get(idx).as_num().unwrap_or(0.0))
            .sum(),
        Reduction::DistinctCount => {
            let distinct: HashSet<&str> = rows
                .iter()
                .filter_map(|&r| match dataset.records[r].get(idx) {
                    Value::Str(s) if s != MISSING_LABEL => Some(s.as_str()),
                    _ => None,
                })
                .collect();
            distinct.len() as f64
        }
    }
}

/// Restrict an aggregation to the N largest groups by the reducer at
/// `primary`, descending; ties break by group key ascending so the view
/// is reproducible run to run.
pub fn top_n(mut result: AggregationResult, primary: usize, n: usize) -> AggregationResult {
    result.groups.sort_by(|a, b| {
        let av = a.values.get(primary).copied().unwrap_or(0.0);
        let bv = b.values.get(primary).copied().unwrap_or(0.0);
        bv.partial_cmp(&av)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.key.cmp(&b.key))
    });
    result.groups.truncate(n);
    result
}
