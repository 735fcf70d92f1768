// Pipeline coordinator: fetch -> parse -> map -> clean -> derive, with a
// freshness-windowed cache in front of the fetch.
//
// Construction validates the configuration once: the derivation's source
// fields, every filter field, and the group field must all be mapped by
// the schema. After that, a run can only fail on fetch/parse problems;
// per-cell issues are absorbed by the cleaner.
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::clean;
use crate::config::DashboardConfig;
use crate::fetch::{self, Source};
use crate::schema;
use crate::types::{Dataset, FieldKind, FieldSchema, PipelineError, Record, Value};

/// Time source for cache freshness checks. Injected so tests can drive
/// staleness with a fake clock instead of sleeping.
pub trait Clock: Send {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl<C: Clock + Sync + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// One cached fetch: source identity, when it was loaded, and the
/// fully-cleaned dataset. The dataset is immutable after construction, so
/// rapid re-renders can share it freely.
struct CacheEntry {
    key: String,
    fetched_at: Instant,
    dataset: Arc<Dataset>,
    coerced_cells: usize,
}

/// What a load reported: row counts, the coercion tally, and whether the
/// cache answered instead of the source.
#[derive(Debug, Clone, Copy)]
pub struct LoadReport {
    pub rows: usize,
    pub coerced_cells: usize,
    pub from_cache: bool,
}

/// Indices resolved once at construction for the derivation stage.
#[derive(Clone, Copy)]
struct DerivedIdx {
    out: usize,
    minuend: usize,
    subtrahend: usize,
}

pub struct Pipeline {
    config: DashboardConfig,
    schema: Arc<FieldSchema>,
    derived: DerivedIdx,
    source: Source,
    clock: Box<dyn Clock>,
    cache: Option<CacheEntry>,
}

impl Pipeline {
    /// Validate the configuration and build the pipeline. All
    /// `SchemaMismatch` conditions surface here, never during a run.
    pub fn new(config: DashboardConfig, clock: Box<dyn Clock>) -> Result<Self, PipelineError> {
        let mut fields = config.schema.fields.clone();
        // The derived column is part of the canonical field set.
        fields.push(crate::types::FieldDef {
            raw: String::new(),
            name: config.schema.derived.name.clone(),
            kind: FieldKind::DerivedNumeric,
        });
        let schema = Arc::new(FieldSchema::new(fields)?);

        let derived = DerivedIdx {
            out: schema.require(&config.schema.derived.name)?,
            minuend: require_numeric(&schema, &config.schema.derived.minuend)?,
            subtrahend: require_numeric(&schema, &config.schema.derived.subtrahend)?,
        };
        for field in &config.filter_fields {
            schema.require(field)?;
        }
        schema.require(&config.group_field)?;

        let source = Source::from_config(&config.source);
        Ok(Pipeline {
            config,
            schema,
            derived,
            source,
            clock,
            cache: None,
        })
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// The current dataset, served from cache while fresh, refetched when
    /// stale. A failed refetch falls back to the last good dataset when
    /// one exists; with nothing cached the error is fatal to the cycle.
    pub fn dataset(&mut self) -> Result<(Arc<Dataset>, LoadReport), PipelineError> {
        let key = self.source.cache_key();
        let window = Duration::from_secs(self.config.freshness_window_secs);
        let now = self.clock.now();

        if let Some(entry) = &self.cache {
            if entry.key == key && now.duration_since(entry.fetched_at) < window {
                return Ok((
                    Arc::clone(&entry.dataset),
                    LoadReport {
                        rows: entry.dataset.len(),
                        coerced_cells: entry.coerced_cells,
                        from_cache: true,
                    },
                ));
            }
        }

        match self.load() {
            Ok((dataset, coerced_cells)) => {
                let dataset = Arc::new(dataset);
                let report = LoadReport {
                    rows: dataset.len(),
                    coerced_cells,
                    from_cache: false,
                };
                info!(rows = report.rows, coerced = coerced_cells, "dataset loaded");
                self.cache = Some(CacheEntry {
                    key,
                    fetched_at: now,
                    dataset: Arc::clone(&dataset),
                    coerced_cells,
                });
                Ok((dataset, report))
            }
            Err(e) => {
                if let Some(entry) = &self.cache {
                    if entry.key == key {
                        warn!(error = %e, "refetch failed; serving cached dataset");
                        return Ok((
                            Arc::clone(&entry.dataset),
                            LoadReport {
                                rows: entry.dataset.len(),
                                coerced_cells: entry.coerced_cells,
                                from_cache: true,
                            },
                        ));
                    }
                }
                Err(e)
            }
        }
    }

    /// Drop the cache and load from the source unconditionally.
    pub fn refresh(&mut self) -> Result<(Arc<Dataset>, LoadReport), PipelineError> {
        self.cache = None;
        self.dataset()
    }

    fn load(&self) -> Result<(Dataset, usize), PipelineError> {
        let timeout = Duration::from_secs(self.config.fetch_timeout_secs);
        let bytes = fetch::fetch(&self.source, timeout)?;
        let (headers, rows) = schema::parse_table(&bytes)?;
        let mapped = schema::map_rows(&headers, &rows, &self.schema);
        let (cleaned, stats) = clean::clean(mapped);
        let derived = self.derive(cleaned);
        Ok((derived, stats.coerced_cells))
    }

    /// Append the derived amount per record. Negative results are kept
    /// as-is; an over-release is a data condition worth seeing, not one to
    /// clamp away.
    fn derive(&self, dataset: Dataset) -> Dataset {
        let DerivedIdx {
            out,
            minuend,
            subtrahend,
        } = self.derived;
        let schema = dataset.schema.clone();
        let records = dataset
            .records
            .into_iter()
            .map(|record| {
                let mut values = record.into_values();
                let a = values[minuend].as_num().unwrap_or(0.0);
                let b = values[subtrahend].as_num().unwrap_or(0.0);
                values[out] = Value::Num(a - b);
                Record::new(values)
            })
            .collect();
        Dataset::new(schema, records)
    }
}

fn require_numeric(schema: &FieldSchema, name: &str) -> Result<usize, PipelineError> {
    let idx = schema.require(name)?;
    match schema.fields()[idx].kind {
        FieldKind::Numeric | FieldKind::DerivedNumeric => Ok(idx),
        FieldKind::Categorical => Err(PipelineError::SchemaMismatch {
            field: format!("field `{}` is categorical, expected numeric", name),
        }),
    }
}
