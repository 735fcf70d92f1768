// Presenter consumer interface: the structured values a UI renders.
//
// Nothing here draws anything. Each accessor re-runs the pure
// filter/aggregate stages over the immutable dataset, so a stale render
// is simply discarded by the next call (last write wins).
use serde_json::json;

use crate::aggregate::{self, Reducer};
use crate::config::DashboardConfig;
use crate::filter::{self, FilterStep, Selection};
use crate::pipeline::{Clock, LoadReport, Pipeline};
use crate::types::{Dataset, PipelineError, MISSING_LABEL};

/// Chart shapes the UI layer knows how to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    /// Grouped bars: released vs pending per top-N group.
    ReleasedVsPending,
    /// Share of the released and pending totals (pie).
    StatusShare,
}

/// One point of a chart series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    pub category: String,
    pub value: f64,
    pub series: String,
}

pub struct Dashboard {
    pipeline: Pipeline,
    steps: Vec<FilterStep>,
}

impl Dashboard {
    pub fn new(config: DashboardConfig, clock: Box<dyn Clock>) -> Result<Self, PipelineError> {
        let steps = config
            .filter_fields
            .iter()
            .map(|f| FilterStep::all(f))
            .collect();
        let pipeline = Pipeline::new(config, clock)?;
        Ok(Dashboard { pipeline, steps })
    }

    /// Force a reload from the source, bypassing the freshness window.
    pub fn refresh(&mut self) -> Result<LoadReport, PipelineError> {
        let (_, report) = self.pipeline.refresh()?;
        Ok(report)
    }

    pub fn filter_fields(&self) -> &[String] {
        &self.pipeline.config().filter_fields
    }

    pub fn filter_steps(&self) -> &[FilterStep] {
        &self.steps
    }

    pub fn group_field(&self) -> &str {
        &self.pipeline.config().group_field
    }

    /// Record a selection for one filter field. The field must be part of
    /// the configured cascade.
    pub fn set_filter(&mut self, field: &str, selection: Selection) -> Result<(), PipelineError> {
        let step = self
            .steps
            .iter_mut()
            .find(|s| s.field == field)
            .ok_or_else(|| PipelineError::SchemaMismatch {
                field: format!("`{}` is not a configured filter field", field),
            })?;
        step.selection = selection;
        Ok(())
    }

    pub fn clear_filters(&mut self) {
        for step in &mut self.steps {
            step.selection = Selection::All;
        }
    }

    /// Choices for one filter field, honoring the cascade: the list comes
    /// from the dataset narrowed by the steps declared before this field.
    pub fn filter_options(&mut self, field: &str) -> Result<Vec<String>, PipelineError> {
        let pos = self
            .steps
            .iter()
            .position(|s| s.field == field)
            .ok_or_else(|| PipelineError::SchemaMismatch {
                field: format!("`{}` is not a configured filter field", field),
            })?;
        let (dataset, _) = self.pipeline.dataset()?;
        let prior = self.steps[..pos].to_vec();
        let narrowed = filter::apply_filters(&dataset, &prior);
        Ok(filter::candidates_for(&narrowed, field))
    }

    /// The records behind the current view, after all filters.
    pub fn detail_rows(&mut self) -> Result<Dataset, PipelineError> {
        let (dataset, _) = self.pipeline.dataset()?;
        Ok(filter::apply_filters(&dataset, &self.steps))
    }

    /// KPI values for the current view, in display order. Sums of the two
    /// source amounts and the derived amount, the record count, and the
    /// distinct count of the grouping field.
    pub fn kpis(&mut self) -> Result<Vec<(String, f64)>, PipelineError> {
        let view = self.detail_rows()?;
        let cfg = self.pipeline.config();
        let vetting = cfg.schema.derived.minuend.clone();
        let released = cfg.schema.derived.subtrahend.clone();
        let pending = cfg.schema.derived.name.clone();
        let group = cfg.group_field.clone();

        let mut out = Vec::new();
        for field in [&vetting, &released, &pending] {
            out.push((format!("Total {}", field), sum_field(&view, field)));
        }
        out.push(("Records".to_string(), view.len() as f64));
        out.push((format!("Distinct {}", group), distinct_count(&view, &group)));
        Ok(out)
    }

    /// Series for one chart kind. `ReleasedVsPending` ranks groups by
    /// their combined total descending (ties by key) and keeps the top N
    /// configured; every group emits one point per series.
    pub fn chart_series(&mut self, kind: ChartKind) -> Result<Vec<SeriesPoint>, PipelineError> {
        let view = self.detail_rows()?;
        let cfg = self.pipeline.config();
        let combined = cfg.schema.derived.minuend.clone();
        let released = cfg.schema.derived.subtrahend.clone();
        let pending = cfg.schema.derived.name.clone();
        let group = cfg.group_field.clone();
        let top_n = cfg.top_n;

        match kind {
            ChartKind::ReleasedVsPending => {
                let result = aggregate::aggregate(
                    &view,
                    &group,
                    &[
                        Reducer::sum(&combined),
                        Reducer::sum(&released),
                        Reducer::sum(&pending),
                    ],
                );
                let ranked = aggregate::top_n(result, 0, top_n);
                let mut points = Vec::with_capacity(ranked.groups.len() * 2);
                for g in &ranked.groups {
                    points.push(SeriesPoint {
                        category: g.key.clone(),
                        value: g.values[1],
                        series: released.clone(),
                    });
                    points.push(SeriesPoint {
                        category: g.key.clone(),
                        value: g.values[2],
                        series: pending.clone(),
                    });
                }
                Ok(points)
            }
            ChartKind::StatusShare => {
                let mut points = Vec::with_capacity(2);
                for field in [&released, &pending] {
                    points.push(SeriesPoint {
                        category: field.clone(),
                        value: sum_field(&view, field),
                        series: "Status".to_string(),
                    });
                }
                Ok(points)
            }
        }
    }

    /// KPI snapshot as JSON, for the exported summary file.
    pub fn summary_json(&mut self) -> Result<serde_json::Value, PipelineError> {
        let kpis = self.kpis()?;
        let mut map = serde_json::Map::new();
        for (name, value) in kpis {
            map.insert(name, json!(value));
        }
        Ok(serde_json::Value::Object(map))
    }
}

fn sum_field(dataset: &Dataset, field: &str) -> f64 {
    let Some(idx) = dataset.schema.field_index(field) else {
        return 0.0;
    };
    dataset
        .records
        .iter()
        .map(|r| r.get(idx).as_num().unwrap_or(0.0))
        .sum()
}

/// Distinct non-missing values of `field`: group on the field itself and
/// count the groups, leaving the missing sentinel out.
fn distinct_count(dataset: &Dataset, field: &str) -> f64 {
    aggregate::aggregate(dataset, field, &[])
        .groups
        .iter()
        .filter(|g| g.key != MISSING_LABEL)
        .count() as f64
}
