// Cleaning stage: coerce raw string cells into the shapes downstream
// stages rely on.
//
// Numeric cells follow a fail-to-neutral policy: anything that does not
// parse after stripping formatting becomes numeric zero, so malformed
// cells never poison a sum. That policy silently hides data-quality
// problems, so every coercion is counted and the tally is reported with
// each load. Categorical cells are trimmed and absent values get an
// explicit sentinel label, because inconsistent whitespace or missing
// values would otherwise fracture exact-match filter keys and group keys.
use tracing::info;

use crate::types::{Dataset, FieldKind, Record, Value, MISSING_LABEL};

#[derive(Debug, Clone, Copy, Default)]
pub struct CleanStats {
    /// Numeric cells coerced to zero because they were absent, empty, or
    /// unparseable. Surfaced for data-quality auditing.
    pub coerced_cells: usize,
}

/// Normalize every cell per its declared field kind. Total: cleaning never
/// fails, it only coerces.
pub fn clean(dataset: Dataset) -> (Dataset, CleanStats) {
    let schema = dataset.schema.clone();
    let kinds: Vec<FieldKind> = schema.fields().iter().map(|f| f.kind).collect();
    let mut stats = CleanStats::default();

    let records = dataset
        .records
        .into_iter()
        .map(|record| {
            let values = record
                .into_values()
                .into_iter()
                .zip(kinds.iter())
                .map(|(value, kind)| match kind {
                    FieldKind::Numeric => {
                        let (n, coerced) = clean_numeric(&value);
                        if coerced {
                            stats.coerced_cells += 1;
                        }
                        Value::Num(n)
                    }
                    FieldKind::Categorical => clean_categorical(value),
                    // Derived fields are filled in after cleaning.
                    FieldKind::DerivedNumeric => value,
                })
                .collect();
            Record::new(values)
        })
        .collect();

    if stats.coerced_cells > 0 {
        info!(coerced = stats.coerced_cells, "numeric cells coerced to zero");
    }
    (Dataset::new(schema, records), stats)
}

/// Strip everything that is not a digit or decimal point, then parse.
/// `"₹1,234.50"` becomes `1234.50`; `"N/A"` and empty cells become `0`.
/// Returns the value and whether it was coerced to the neutral zero.
fn clean_numeric(value: &Value) -> (f64, bool) {
    let raw = match value {
        Value::Str(s) => s.as_str(),
        Value::Num(n) => return (*n, false),
        Value::Missing => return (0.0, true),
    };
    let stripped: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if stripped.is_empty() {
        return (0.0, true);
    }
    match stripped.parse::<f64>() {
        Ok(n) => (n, false),
        Err(_) => (0.0, true),
    }
}

fn clean_categorical(value: Value) -> Value {
    match value {
        Value::Str(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Value::Str(MISSING_LABEL.to_string())
            } else if trimmed.len() == s.len() {
                Value::Str(s)
            } else {
                Value::Str(trimmed.to_string())
            }
        }
        Value::Missing => Value::Str(MISSING_LABEL.to_string()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldDef, FieldSchema};
    use std::sync::Arc;

    fn dataset(cells: Vec<Vec<Value>>) -> Dataset {
        let schema = Arc::new(
            FieldSchema::new(vec![
                FieldDef {
                    raw: "Division-1".to_string(),
                    name: "Division".to_string(),
                    kind: FieldKind::Categorical,
                },
                FieldDef {
                    raw: "Vetting Amount (in INR)".to_string(),
                    name: "Vetting".to_string(),
                    kind: FieldKind::Numeric,
                },
            ])
            .unwrap(),
        );
        let records = cells.into_iter().map(Record::new).collect();
        Dataset::new(schema, records)
    }

    fn s(v: &str) -> Value {
        Value::Str(v.to_string())
    }

    #[test]
    fn currency_formatting_strips_to_a_number() {
        let ds = dataset(vec![vec![s("Hydrology"), s("₹1,234.50")]]);
        let (clean, stats) = clean(ds);
        assert_eq!(clean.value(0, "Vetting"), Some(&Value::Num(1234.50)));
        assert_eq!(stats.coerced_cells, 0);
    }

    #[test]
    fn unparseable_numeric_coerces_to_zero_and_is_counted() {
        let ds = dataset(vec![
            vec![s("A"), s("N/A")],
            vec![s("B"), s("")],
            vec![s("C"), Value::Missing],
            vec![s("D"), s("1.2.3")],
        ]);
        let (clean, stats) = clean(ds);
        for row in 0..4 {
            assert_eq!(clean.value(row, "Vetting"), Some(&Value::Num(0.0)));
        }
        assert_eq!(stats.coerced_cells, 4);
    }

    #[test]
    fn categorical_cells_are_trimmed_and_missing_gets_the_sentinel() {
        let ds = dataset(vec![
            vec![s("  Hydrology  "), s("1")],
            vec![s("   "), s("2")],
            vec![Value::Missing, s("3")],
        ]);
        let (clean, _) = clean(ds);
        assert_eq!(clean.value(0, "Division"), Some(&s("Hydrology")));
        assert_eq!(clean.value(1, "Division"), Some(&s(MISSING_LABEL)));
        assert_eq!(clean.value(2, "Division"), Some(&s(MISSING_LABEL)));
    }

    #[test]
    fn plain_integers_and_decimals_pass_through() {
        let ds = dataset(vec![vec![s("A"), s(" 42 ")], vec![s("B"), s("0.5")]]);
        let (clean, stats) = clean(ds);
        assert_eq!(clean.value(0, "Vetting"), Some(&Value::Num(42.0)));
        assert_eq!(clean.value(1, "Vetting"), Some(&Value::Num(0.5)));
        assert_eq!(stats.coerced_cells, 0);
    }
}
