//! Bundle loading.
//!
//! An [`IngestSession`] drives one bundle through mapping, reference
//! resolution and validation, and can then plan the result against the portal.
//! The session owns every cache, so independent bundles can be loaded in
//! parallel with one session each.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value;

use crate::config::IngestConfig;
use crate::diff::{DiffPlan, DiffPlanner};
use crate::error::Result;
use crate::issues::{IssueKind, IssueLog, Provenance};
use crate::mapper::RowMapper;
use crate::portal::Portal;
use crate::reader::{Sheet, TableSet, load_table_set};
use crate::resolver::{PendingRef, ReferenceResolver};
use crate::schema::{LocationStep, Schema, SchemaCache, type_name};
use crate::utils::logging::{create_main_progress_bar, finish_progress_bar};
use crate::validate::Validator;

pub use crate::mapper::Candidate;

/// Mapped, resolved and validated objects of a bundle
#[derive(Debug, Clone, Default, Serialize)]
pub struct StructuredDataSet {
    /// Objects by type, in sheet and row order
    pub data: IndexMap<String, Vec<Candidate>>,
    pub issues: IssueLog,
    /// `/{Type}/{token}` references that were resolved
    pub resolved_refs: Vec<String>,
}

impl StructuredDataSet {
    /// Objects of one type
    #[must_use]
    pub fn objects(&self, type_name: &str) -> &[Candidate] {
        self.data.get(type_name).map_or(&[], Vec::as_slice)
    }

    /// Total number of objects
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.issues.has_errors()
    }

    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Outcome of ingesting one bundle
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub source: PathBuf,
    #[serde(flatten)]
    pub data: StructuredDataSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<DiffPlan>,
}

impl IngestReport {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.data.has_errors()
    }

    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// One bundle's pass through the pipeline
pub struct IngestSession<'p> {
    portal: &'p dyn Portal,
    config: IngestConfig,
    schemas: SchemaCache<'p>,
    resolver: ReferenceResolver,
    validator: Validator,
}

impl<'p> IngestSession<'p> {
    pub fn new(portal: &'p dyn Portal, config: IngestConfig) -> Self {
        let resolver = ReferenceResolver::new(&config.lookup);
        Self {
            portal,
            schemas: SchemaCache::new(portal),
            resolver,
            validator: Validator::new(),
            config,
        }
    }

    /// Use these schemas instead of the portal's for the same types
    #[must_use]
    pub fn with_schemas(mut self, schemas: impl IntoIterator<Item = (String, Value)>) -> Self {
        self.schemas = self.schemas.with_schemas(schemas);
        self
    }

    #[must_use]
    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Schema of a type through the session cache
    pub fn schema(&mut self, name: &str) -> Result<Arc<Schema>> {
        self.schemas.get_schema(name)
    }

    /// Map, resolve and validate a table set
    ///
    /// Problems with individual sheets, cells, references and objects are
    /// collected in the data set's issues.
    ///
    /// # Arguments
    /// * `tables` - The bundle as read
    ///
    /// # Returns
    /// * `Result<StructuredDataSet>` - Errors only for portal transport failures
    pub fn build(&mut self, tables: &TableSet) -> Result<StructuredDataSet> {
        let start = Instant::now();
        self.resolver.start_bundle();
        let reordered;
        let tables = if self.config.sheet_order.is_empty() {
            tables
        } else {
            let mut copy = tables.clone();
            copy.reorder(&self.config.sheet_order);
            reordered = copy;
            &reordered
        };

        let mut issues = tables.issues.clone();
        let mut data: IndexMap<String, Vec<Candidate>> = IndexMap::new();
        let mut refs = Vec::new();

        for sheet in tables.sheets() {
            self.map_sheet(sheet, &mut data, &mut refs, &mut issues)?;
        }

        if self.config.norefs {
            log::info!("Reference resolution disabled");
        } else {
            self.resolver
                .resolve_all(&mut data, refs, &mut self.schemas, self.portal, &mut issues)?;
        }

        if self.config.validate {
            for (type_name, candidates) in &data {
                if let Some(schema) = self.schemas.cached(type_name) {
                    self.validator.validate(&schema, candidates, &mut issues);
                }
            }
        }

        let dataset = StructuredDataSet {
            data,
            issues,
            resolved_refs: self.resolver.resolved_refs().to_vec(),
        };
        log::info!(
            "Built {} objects of {} types with {} issues in {:?}",
            dataset.len(),
            dataset.data.len(),
            dataset.issues.len(),
            start.elapsed()
        );
        Ok(dataset)
    }

    fn map_sheet(
        &mut self,
        sheet: &Sheet,
        data: &mut IndexMap<String, Vec<Candidate>>,
        refs: &mut Vec<PendingRef>,
        issues: &mut IssueLog,
    ) -> Result<()> {
        let type_name = type_name(&sheet.name);
        let file = sheet.file.as_deref();
        let sheet_src = || Provenance::sheet(type_name.clone()).with_file(file);

        for warning in &sheet.warnings {
            issues.note(IssueKind::Warning, sheet_src(), warning.clone());
        }

        let schema = match self.schemas.get_schema(&type_name) {
            Ok(schema) => Some(schema),
            Err(e) if e.is_local() => {
                issues.note(IssueKind::Schema, sheet_src(), e.to_string());
                None
            }
            Err(e) => return Err(e),
        };

        let mapper = match RowMapper::new(&type_name, &sheet.header, schema.as_deref(), &self.config) {
            Ok(mapper) => mapper,
            Err(e) if e.is_local() => {
                log::warn!("Skipping sheet {}: {e}", sheet.name);
                issues.note(IssueKind::Parse, sheet_src(), e.to_string());
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let candidates = data.entry(type_name.clone()).or_default();
        for row in &sheet.rows {
            let object = mapper.map_row(row, file, issues);
            if !self.config.norefs {
                if let Some(schema) = schema.as_deref() {
                    for site in schema.collect_refs(&object) {
                        let column = match site.location.first() {
                            Some(LocationStep::Key(key)) => key.clone(),
                            _ => String::new(),
                        };
                        refs.push(PendingRef {
                            type_name: type_name.clone(),
                            index: candidates.len(),
                            location: site.location,
                            link_to: site.link_to,
                            token: site.token,
                            src: sheet_src().with_row(row.number).with_column(column),
                        });
                    }
                }
            }
            candidates.push(Candidate {
                sheet: type_name.clone(),
                row: row.number,
                file: sheet.file.clone(),
                data: object,
            });
        }
        log::debug!("Mapped {} rows of {}", sheet.rows.len(), sheet.name);
        Ok(())
    }

    /// Plan creates and updates for a built data set
    pub fn plan(&mut self, dataset: &StructuredDataSet) -> Result<DiffPlan> {
        DiffPlanner::new(self.portal).plan(&dataset.data, &mut self.schemas)
    }
}

/// Read, build and (if configured) plan one bundle
///
/// # Arguments
/// * `path` - Bundle file or inserts directory
/// * `portal` - The portal to resolve and plan against
/// * `config` - Session configuration
///
/// # Returns
/// * `Result<IngestReport>` - The report; hard errors only for unreadable
///   input and portal transport failures
pub fn ingest_file(path: &Path, portal: &dyn Portal, config: &IngestConfig) -> Result<IngestReport> {
    let tables = load_table_set(path, &config.reader)?;
    let mut session = IngestSession::new(portal, config.clone());
    let data = session.build(&tables)?;
    let plan = if config.plan { Some(session.plan(&data)?) } else { None };
    Ok(IngestReport {
        source: path.to_path_buf(),
        data,
        plan,
    })
}

/// Ingest independent bundles in parallel, one session per bundle
///
/// # Returns
/// * `Result<Vec<IngestReport>>` - Reports in input order, or the first error
pub fn load_bundles_parallel(paths: &[PathBuf], portal: &dyn Portal, config: &IngestConfig) -> Result<Vec<IngestReport>> {
    let start = Instant::now();
    log::info!("Loading {} bundles", paths.len());

    let progress = config
        .show_progress
        .then(|| create_main_progress_bar(paths.len() as u64, Some("Loading bundles")));

    let results: Vec<Result<IngestReport>> = paths
        .par_iter()
        .map(|path| {
            let result = ingest_file(path, portal, config);
            if let Err(e) = &result {
                log::warn!("Failed to ingest {}: {e}", path.display());
            }
            if let Some(progress) = &progress {
                progress.inc(1);
            }
            result
        })
        .collect();

    if let Some(progress) = &progress {
        finish_progress_bar(progress, Some("Done"));
    }

    let reports = results.into_iter().collect::<Result<Vec<_>>>()?;
    let objects: usize = reports.iter().map(|report| report.data.len()).sum();
    log::info!(
        "Successfully loaded {objects} objects from {} bundles in {:?}",
        reports.len(),
        start.elapsed()
    );
    Ok(reports)
}
