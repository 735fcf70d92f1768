// Schema mapping: raw delimited text in, canonically-shaped dataset out.
//
// Mapping is total. Upstream spreadsheets routinely rename or drop columns
// between exports, so a raw header the schema expects but the file lacks
// degrades every cell of that field to `Missing` instead of failing the
// load. Extra raw columns are dropped. Whether a *required* field ended up
// unmapped is the pipeline constructor's problem, checked once up front.
use std::sync::Arc;

use csv::StringRecord;
use tracing::warn;

use crate::types::{Dataset, FieldKind, FieldSchema, PipelineError, Record, Value};

/// Parse raw bytes as UTF-8 delimited text with a header row.
pub fn parse_table(bytes: &[u8]) -> Result<(StringRecord, Vec<StringRecord>), PipelineError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| PipelineError::MalformedResponse(format!("not UTF-8: {}", e)))?;
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = rdr
        .headers()
        .map_err(|e| PipelineError::MalformedResponse(format!("unreadable header row: {}", e)))?
        .clone();
    if headers.is_empty() {
        return Err(PipelineError::MalformedResponse(
            "empty header row".to_string(),
        ));
    }
    let mut rows = Vec::new();
    for rec in rdr.records() {
        let rec =
            rec.map_err(|e| PipelineError::MalformedResponse(format!("unreadable row: {}", e)))?;
        rows.push(rec);
    }
    Ok((headers, rows))
}

/// Map raw rows onto the canonical field set. Never fails.
pub fn map_rows(
    headers: &StringRecord,
    rows: &[StringRecord],
    schema: &Arc<FieldSchema>,
) -> Dataset {
    // Raw header -> column position, resolved once for the whole table.
    let positions: Vec<Option<usize>> = schema
        .fields()
        .iter()
        .map(|def| {
            if def.kind == FieldKind::DerivedNumeric {
                return None;
            }
            let pos = headers.iter().position(|h| h.trim() == def.raw);
            if pos.is_none() {
                warn!(raw = %def.raw, field = %def.name, "raw header absent; field maps to missing");
            }
            pos
        })
        .collect();

    let records = rows
        .iter()
        .map(|row| {
            let values = positions
                .iter()
                .map(|pos| match pos.and_then(|p| row.get(p)) {
                    Some(cell) => Value::Str(cell.to_string()),
                    None => Value::Missing,
                })
                .collect();
            Record::new(values)
        })
        .collect();

    Dataset::new(Arc::clone(schema), records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldDef;

    fn schema() -> Arc<FieldSchema> {
        Arc::new(
            FieldSchema::new(vec![
                FieldDef {
                    raw: "Division-1".to_string(),
                    name: "Division".to_string(),
                    kind: FieldKind::Categorical,
                },
                FieldDef {
                    raw: "Credited Amount".to_string(),
                    name: "Released".to_string(),
                    kind: FieldKind::Numeric,
                },
                FieldDef {
                    raw: String::new(),
                    name: "Pending".to_string(),
                    kind: FieldKind::DerivedNumeric,
                },
            ])
            .unwrap(),
        )
    }

    #[test]
    fn maps_present_headers_and_drops_extras() {
        let bytes = b"Division-1,Credited Amount,Remarks\nHydrology,100,ok\n";
        let (headers, rows) = parse_table(bytes).unwrap();
        let ds = map_rows(&headers, &rows, &schema());
        assert_eq!(ds.len(), 1);
        assert_eq!(
            ds.value(0, "Division"),
            Some(&Value::Str("Hydrology".to_string()))
        );
        assert_eq!(
            ds.value(0, "Released"),
            Some(&Value::Str("100".to_string()))
        );
        // "Remarks" has no canonical field, so records stay three-wide.
        assert_eq!(ds.records[0].values().len(), 3);
    }

    #[test]
    fn absent_header_degrades_to_missing_for_every_row() {
        let bytes = b"Division-1\nHydrology\nIrrigation\n";
        let (headers, rows) = parse_table(bytes).unwrap();
        let ds = map_rows(&headers, &rows, &schema());
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.value(0, "Released"), Some(&Value::Missing));
        assert_eq!(ds.value(1, "Released"), Some(&Value::Missing));
    }

    #[test]
    fn derived_fields_start_as_missing_placeholders() {
        let bytes = b"Division-1,Credited Amount\nHydrology,100\n";
        let (headers, rows) = parse_table(bytes).unwrap();
        let ds = map_rows(&headers, &rows, &schema());
        assert_eq!(ds.value(0, "Pending"), Some(&Value::Missing));
    }

    #[test]
    fn short_rows_never_panic() {
        // flexible(true) admits ragged rows; absent cells map to Missing.
        let bytes = b"Division-1,Credited Amount\nHydrology\n";
        let (headers, rows) = parse_table(bytes).unwrap();
        let ds = map_rows(&headers, &rows, &schema());
        assert_eq!(ds.value(0, "Released"), Some(&Value::Missing));
    }

    #[test]
    fn non_utf8_bytes_are_malformed_response() {
        let bytes = vec![0xff, 0xfe, 0x00];
        match parse_table(&bytes) {
            Err(PipelineError::MalformedResponse(_)) => {}
            other => panic!("expected MalformedResponse, got {:?}", other),
        }
    }
}
