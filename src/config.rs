// Configuration surface for the dashboard pipeline.
//
// Everything that varied between the original feed revisions (column maps,
// filter order, KPI grouping) lives here, so one pipeline serves every
// variant. Defaults reproduce the live PFMS feed; a `dashboard.toml` next
// to the binary overrides them.
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::types::{FieldDef, FieldKind};

/// Where the raw table comes from: a local delimited-text export, or the
/// CSV export endpoint of a live spreadsheet. The document and sheet
/// identifiers are opaque configuration, never hard-coded in the fetcher.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceConfig {
    File { path: String },
    Sheet { doc_id: String, sheet_id: String },
}

/// The derived amount column: `name = minuend - subtrahend` per record.
#[derive(Debug, Clone, Deserialize)]
pub struct DerivedField {
    pub name: String,
    pub minuend: String,
    pub subtrahend: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchemaConfig {
    pub fields: Vec<FieldDef>,
    pub derived: DerivedField,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub source: SourceConfig,
    pub schema: SchemaConfig,
    /// Cascading filter order. Each prompt's choices come from the dataset
    /// already narrowed by the selections before it.
    pub filter_fields: Vec<String>,
    /// Group key for the KPI and chart aggregations.
    pub group_field: String,
    pub top_n: usize,
    pub freshness_window_secs: u64,
    pub fetch_timeout_secs: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            source: SourceConfig::File {
                path: "pfms_disbursements.csv".to_string(),
            },
            schema: SchemaConfig {
                fields: vec![
                    field("Division-1", "Division", FieldKind::Categorical),
                    field("DSO", "DSO", FieldKind::Categorical),
                    field("Scheme", "Scheme", FieldKind::Categorical),
                    field("Vetting Amount (in INR)", "Vetting", FieldKind::Numeric),
                    field("Credited Amount", "Released", FieldKind::Numeric),
                ],
                derived: DerivedField {
                    name: "Pending".to_string(),
                    minuend: "Vetting".to_string(),
                    subtrahend: "Released".to_string(),
                },
            },
            filter_fields: vec![
                "Division".to_string(),
                "DSO".to_string(),
                "Scheme".to_string(),
            ],
            group_field: "Division".to_string(),
            top_n: 10,
            freshness_window_secs: 60,
            fetch_timeout_secs: 15,
        }
    }
}

fn field(raw: &str, name: &str, kind: FieldKind) -> FieldDef {
    FieldDef {
        raw: raw.to_string(),
        name: name.to_string(),
        kind,
    }
}

impl DashboardConfig {
    /// Load from a TOML file if it exists, otherwise fall back to the
    /// built-in defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(DashboardConfig::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg: DashboardConfig = toml::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_maps_the_live_feed_columns() {
        let cfg = DashboardConfig::default();
        assert_eq!(cfg.group_field, "Division");
        assert_eq!(cfg.top_n, 10);
        assert_eq!(cfg.freshness_window_secs, 60);
        let vetting = cfg
            .schema
            .fields
            .iter()
            .find(|f| f.name == "Vetting")
            .unwrap();
        assert_eq!(vetting.raw, "Vetting Amount (in INR)");
        assert_eq!(vetting.kind, FieldKind::Numeric);
    }

    #[test]
    fn toml_round_trip_overrides_defaults() {
        let text = r#"
            filter_fields = ["DSO"]
            group_field = "DSO"
            top_n = 5

            [source.file]
            path = "export.csv"

            [[schema.fields]]
            raw = "DSO Name"
            name = "DSO"
            kind = "categorical"

            [[schema.fields]]
            raw = "Amount Vetted"
            name = "Vetting"
            kind = "numeric"

            [[schema.fields]]
            raw = "Amount Credited"
            name = "Released"
            kind = "numeric"

            [schema.derived]
            name = "Pending"
            minuend = "Vetting"
            subtrahend = "Released"
        "#;
        let cfg: DashboardConfig = toml::from_str(text).unwrap();
        assert_eq!(cfg.top_n, 5);
        assert_eq!(cfg.group_field, "DSO");
        assert_eq!(cfg.filter_fields, vec!["DSO".to_string()]);
        match cfg.source {
            SourceConfig::File { ref path } => assert_eq!(path, "export.csv"),
            _ => panic!("expected file source"),
        }
        // Unset keys keep their defaults.
        assert_eq!(cfg.freshness_window_secs, 60);
    }
}
