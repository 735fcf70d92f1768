// Cascading filter engine.
//
// Filters fold left-to-right in declared order. The contract that matters:
// the candidate list offered for step i is computed from the dataset
// already narrowed by steps 0..i-1, never from the unfiltered dataset.
// Selecting "ALL" at any step passes the dataset through untouched and
// restores the full candidate list downstream.
use std::collections::BTreeSet;

use tracing::warn;

use crate::types::{Dataset, Value, ALL_SENTINEL};

/// The choice made at one filter step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    Value(String),
}

impl Selection {
    pub fn label(&self) -> &str {
        match self {
            Selection::All => ALL_SENTINEL,
            Selection::Value(v) => v.as_str(),
        }
    }
}

/// One entry of the ordered filter sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterStep {
    pub field: String,
    pub selection: Selection,
}

impl FilterStep {
    pub fn all(field: &str) -> FilterStep {
        FilterStep {
            field: field.to_string(),
            selection: Selection::All,
        }
    }
}

/// Apply one step. "ALL" is a no-op; otherwise keep records whose field
/// equals the selected value exactly (no case folding).
fn apply_step(dataset: &Dataset, step: &FilterStep) -> Dataset {
    let selected = match &step.selection {
        Selection::All => return dataset.clone(),
        Selection::Value(v) => v.as_str(),
    };
    let Some(idx) = dataset.schema.field_index(&step.field) else {
        // Field names are validated at pipeline construction; reaching
        // this means the step was built outside that path.
        warn!(field = %step.field, "filter step references unmapped field; skipping");
        return dataset.clone();
    };
    let records = dataset
        .records
        .iter()
        .filter(|r| r.get(idx).label() == selected)
        .cloned()
        .collect();
    Dataset::new(dataset.schema.clone(), records)
}

/// Fold the ordered steps over the dataset.
pub fn apply_filters(dataset: &Dataset, steps: &[FilterStep]) -> Dataset {
    steps
        .iter()
        .fold(dataset.clone(), |ds, step| apply_step(&ds, step))
}

/// Distinct values of `field` present in `dataset`, sorted, with the "ALL"
/// sentinel prepended. An empty dataset yields just the sentinel.
pub fn candidates_for(dataset: &Dataset, field: &str) -> Vec<String> {
    let mut out = vec![ALL_SENTINEL.to_string()];
    let Some(idx) = dataset.schema.field_index(field) else {
        return out;
    };
    let distinct: BTreeSet<&str> = dataset
        .records
        .iter()
        .filter_map(|r| match r.get(idx) {
            Value::Str(s) => Some(s.as_str()),
            Value::Missing => None,
            Value::Num(_) => None,
        })
        .collect();
    out.extend(distinct.into_iter().map(str::to_string));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldDef, FieldKind, FieldSchema, Record};
    use std::sync::Arc;

    fn dataset(rows: &[(&str, &str)]) -> Dataset {
        let schema = Arc::new(
            FieldSchema::new(vec![
                FieldDef {
                    raw: "Division-1".to_string(),
                    name: "Division".to_string(),
                    kind: FieldKind::Categorical,
                },
                FieldDef {
                    raw: "DSO".to_string(),
                    name: "DSO".to_string(),
                    kind: FieldKind::Categorical,
                },
            ])
            .unwrap(),
        );
        let records = rows
            .iter()
            .map(|(div, dso)| {
                Record::new(vec![
                    Value::Str(div.to_string()),
                    Value::Str(dso.to_string()),
                ])
            })
            .collect();
        Dataset::new(schema, records)
    }

    fn pick(field: &str, value: &str) -> FilterStep {
        FilterStep {
            field: field.to_string(),
            selection: Selection::Value(value.to_string()),
        }
    }

    #[test]
    fn filtering_is_a_subset_and_monotonically_non_increasing() {
        let ds = dataset(&[("A", "x"), ("A", "y"), ("B", "x")]);
        let mut steps = Vec::new();
        let mut prev_len = ds.len();
        for step in [pick("Division", "A"), pick("DSO", "x")] {
            steps.push(step);
            let narrowed = apply_filters(&ds, &steps);
            assert!(narrowed.len() <= prev_len);
            for r in &narrowed.records {
                assert!(ds.records.contains(r));
            }
            prev_len = narrowed.len();
        }
        assert_eq!(prev_len, 1);
    }

    #[test]
    fn all_selection_is_a_no_op() {
        let ds = dataset(&[("A", "x"), ("B", "y")]);
        let steps = [FilterStep::all("Division"), FilterStep::all("DSO")];
        let out = apply_filters(&ds, &steps);
        assert_eq!(out.len(), ds.len());
        assert_eq!(out.records, ds.records);
    }

    #[test]
    fn candidates_cascade_with_prior_selections() {
        let ds = dataset(&[("A", "x"), ("A", "y"), ("B", "z")]);
        // Before any narrowing, every DSO value is on offer.
        assert_eq!(candidates_for(&ds, "DSO"), vec!["ALL", "x", "y", "z"]);
        // Narrowing Division to A must shrink the DSO choices.
        let narrowed = apply_filters(&ds, &[pick("Division", "A")]);
        assert_eq!(candidates_for(&narrowed, "DSO"), vec!["ALL", "x", "y"]);
        // Re-selecting ALL restores the full list.
        let restored = apply_filters(&ds, &[FilterStep::all("Division")]);
        assert_eq!(candidates_for(&restored, "DSO"), vec!["ALL", "x", "y", "z"]);
    }

    #[test]
    fn candidates_of_an_empty_dataset_are_just_the_sentinel() {
        let ds = dataset(&[("A", "x")]);
        let emptied = apply_filters(&ds, &[pick("Division", "nope")]);
        assert!(emptied.is_empty());
        assert_eq!(candidates_for(&emptied, "DSO"), vec!["ALL"]);
        // Further steps over an empty dataset stay empty without raising.
        let still_empty = apply_filters(&emptied, &[pick("DSO", "x")]);
        assert!(still_empty.is_empty());
    }

    #[test]
    fn applying_the_same_steps_twice_is_idempotent() {
        let ds = dataset(&[("A", "x"), ("A", "y"), ("B", "x")]);
        let steps = [pick("Division", "A"), pick("DSO", "x")];
        let once = apply_filters(&ds, &steps);
        let twice = apply_filters(&once, &steps);
        assert_eq!(once.records, twice.records);
    }

    #[test]
    fn equality_is_exact_not_case_folded() {
        let ds = dataset(&[("A", "x"), ("a", "y")]);
        let out = apply_filters(&ds, &[pick("Division", "A")]);
        assert_eq!(out.len(), 1);
        assert_eq!(out.value(0, "DSO"), Some(&Value::Str("x".to_string())));
    }

    #[test]
    fn candidates_are_sorted_and_deduplicated() {
        let ds = dataset(&[("B", "x"), ("A", "x"), ("B", "x")]);
        assert_eq!(candidates_for(&ds, "Division"), vec!["ALL", "A", "B"]);
    }
}
