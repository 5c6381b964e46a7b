//! Reference resolution.
//!
//! References found while mapping are resolved once every sheet has been
//! mapped, so a row may point at an object defined further down the bundle.
//! A token is looked up first among the bundle's own objects (by identifying
//! property values) and then on the portal; results are cached per
//! `(type, token)`. Portal hits outlive the bundle, everything else is
//! dropped when the next bundle starts.

pub mod lookup;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::LookupConfig;
use crate::error::Result;
use crate::issues::{Issue, IssueKind, IssueLog, Provenance};
use crate::mapper::Candidate;
use crate::portal::memory::identifier_values;
use crate::portal::{Portal, object_path};
use crate::schema::{LocationStep, SchemaCache, type_name};

pub use lookup::{LookupPlanner, PatternCache};

/// Outcome of resolving one `(type, token)` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Resolution {
    Resolved {
        /// Value written back into the referencing object
        canonical: String,
        /// Where the target was found
        path: String,
    },
    Ambiguous {
        types: Vec<String>,
    },
    Unresolved,
}

/// A reference waiting for resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRef {
    /// Type of the referencing object
    pub type_name: String,
    /// Position of the referencing object among its type's candidates
    pub index: usize,
    /// Where the token sits inside the referencing object
    pub location: Vec<LocationStep>,
    /// Referenced type
    pub link_to: String,
    pub token: String,
    pub src: Provenance,
}

#[derive(Debug, Clone)]
struct BundleEntry {
    index: usize,
    uuid: Option<String>,
}

/// Identifying values of every object in the bundle
#[derive(Debug, Default)]
pub struct BundleIndex {
    entries: FxHashMap<(String, String), Vec<BundleEntry>>,
}

impl BundleIndex {
    /// Index the candidates by `uuid`, `identifier` and their type's
    /// identifying properties
    pub fn build(data: &IndexMap<String, Vec<Candidate>>, schemas: &mut SchemaCache<'_>) -> Result<Self> {
        let mut entries: FxHashMap<(String, String), Vec<BundleEntry>> = FxHashMap::default();
        for (type_name, candidates) in data {
            let mut properties = vec!["uuid".to_string(), "identifier".to_string()];
            for property in schemas.identifying_properties(type_name)? {
                if !properties.contains(&property) {
                    properties.push(property);
                }
            }

            for (index, candidate) in candidates.iter().enumerate() {
                let uuid = candidate.data.get("uuid").and_then(Value::as_str).map(str::to_string);
                for property in &properties {
                    for value in identifier_values(candidate.data.get(property)) {
                        let slot = entries.entry((type_name.clone(), value)).or_default();
                        if !slot.iter().any(|entry| entry.index == index) {
                            slot.push(BundleEntry {
                                index,
                                uuid: uuid.clone(),
                            });
                        }
                    }
                }
            }
        }
        Ok(Self { entries })
    }

    fn get(&self, type_name: &str, token: &str) -> &[BundleEntry] {
        self.entries
            .get(&(type_name.to_string(), token.to_string()))
            .map_or(&[], Vec::as_slice)
    }
}

#[derive(Debug, Clone)]
struct Cached {
    resolution: Resolution,
    /// Found on the portal without help from the bundle
    from_portal: bool,
}

/// Resolves references for one session
///
/// Portal hits stay cached for the whole session. Anything that depended on
/// the bundle being resolved is dropped by [`ReferenceResolver::start_bundle`].
#[derive(Debug)]
pub struct ReferenceResolver {
    planner: LookupPlanner,
    cache: FxHashMap<(String, String), Cached>,
    resolved: Vec<String>,
}

impl ReferenceResolver {
    pub fn new(config: &LookupConfig) -> Self {
        Self {
            planner: LookupPlanner::new(config),
            cache: FxHashMap::default(),
            resolved: Vec::new(),
        }
    }

    /// Forget what the previous bundle resolved
    ///
    /// Only resolutions found on the portal alone are kept.
    pub fn start_bundle(&mut self) {
        self.cache.retain(|_, cached| cached.from_portal);
        self.resolved.clear();
    }

    /// `/{Type}/{token}` paths resolved so far, in first-resolution order
    #[must_use]
    pub fn resolved_refs(&self) -> &[String] {
        &self.resolved
    }

    /// Resolve one reference
    ///
    /// # Arguments
    /// * `link_to` - The referenced type
    /// * `token` - The reference value
    /// * `index` - Identifying values of the bundle's objects
    /// * `schemas` - The session's schema cache
    /// * `portal` - Portal for lookups outside the bundle
    ///
    /// # Returns
    /// * `Result<Resolution>` - Only portal transport failures are errors
    pub fn resolve(
        &mut self,
        link_to: &str,
        token: &str,
        index: &BundleIndex,
        schemas: &mut SchemaCache<'_>,
        portal: &dyn Portal,
    ) -> Result<Resolution> {
        let target = type_name(link_to);
        let key = (target.clone(), token.to_string());
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached.resolution.clone());
        }

        let subtypes = if self.planner.config().subtypes {
            schemas.subtypes(&target)?
        } else {
            Vec::new()
        };

        let mut matches: Vec<(&str, &BundleEntry)> = Vec::new();
        for candidate_type in std::iter::once(&target).chain(subtypes.iter()) {
            for entry in index.get(candidate_type, token) {
                matches.push((candidate_type, entry));
            }
        }

        let (resolution, from_portal) = match matches.as_slice() {
            [] => {
                let resolution = self.resolve_on_portal(&target, token, &subtypes, schemas, portal)?;
                let found = matches!(resolution, Resolution::Resolved { .. });
                (resolution, found)
            }
            [(found_type, entry)] => {
                let path = object_path(found_type, token);
                let canonical = match &entry.uuid {
                    Some(uuid) => uuid.clone(),
                    // A bundle object already submitted is linked by its portal uuid
                    None => portal
                        .get_metadata(&path)?
                        .and_then(|object| object.get("uuid").and_then(Value::as_str).map(str::to_string))
                        .unwrap_or_else(|| path.clone()),
                };
                (Resolution::Resolved { canonical, path }, false)
            }
            _ => {
                let mut types: Vec<String> = matches.iter().map(|(found_type, _)| (*found_type).to_string()).collect();
                types.dedup();
                (Resolution::Ambiguous { types }, false)
            }
        };

        log::debug!("Reference /{target}/{token}: {resolution:?}");
        self.cache.insert(
            key,
            Cached {
                resolution: resolution.clone(),
                from_portal,
            },
        );
        Ok(resolution)
    }

    fn resolve_on_portal(
        &mut self,
        target: &str,
        token: &str,
        subtypes: &[String],
        schemas: &mut SchemaCache<'_>,
        portal: &dyn Portal,
    ) -> Result<Resolution> {
        let schema = match schemas.get_schema(target) {
            Ok(schema) => Some(schema),
            Err(e) if e.is_local() => None,
            Err(e) => return Err(e),
        };

        for path in self.planner.paths(target, token, schema.as_deref(), subtypes) {
            if let Some(object) = portal.get_metadata(&path)? {
                let canonical = object
                    .get("uuid")
                    .and_then(Value::as_str)
                    .map_or_else(|| path.clone(), str::to_string);
                return Ok(Resolution::Resolved { canonical, path });
            }
        }
        Ok(Resolution::Unresolved)
    }

    /// Resolve every pending reference and rewrite the resolved ones in place
    ///
    /// Unresolved and ambiguous references are recorded as issues and left
    /// unchanged.
    pub fn resolve_all(
        &mut self,
        data: &mut IndexMap<String, Vec<Candidate>>,
        refs: Vec<PendingRef>,
        schemas: &mut SchemaCache<'_>,
        portal: &dyn Portal,
        issues: &mut IssueLog,
    ) -> Result<()> {
        if refs.is_empty() {
            return Ok(());
        }
        let index = BundleIndex::build(data, schemas)?;
        log::info!("Resolving {} references", refs.len());

        for pending in refs {
            let target = type_name(&pending.link_to);
            let ref_path = object_path(&target, &pending.token);
            match self.resolve(&target, &pending.token, &index, schemas, portal)? {
                Resolution::Resolved { canonical, .. } => {
                    let slot = data
                        .get_mut(&pending.type_name)
                        .and_then(|candidates| candidates.get_mut(pending.index))
                        .and_then(|candidate| value_at_mut(&mut candidate.data, &pending.location));
                    if let Some(slot) = slot {
                        *slot = Value::String(canonical);
                    }
                    if !self.resolved.contains(&ref_path) {
                        self.resolved.push(ref_path);
                    }
                }
                Resolution::Ambiguous { types } => {
                    issues.push(
                        Issue::new(
                            IssueKind::Reference,
                            pending.src,
                            format!("Ambiguous reference: {ref_path} matches objects of types {}", types.join(", ")),
                        )
                        .with_types(types),
                    );
                }
                Resolution::Unresolved => {
                    issues.push(Issue::new(
                        IssueKind::Reference,
                        pending.src,
                        format!("Unable to resolve reference: {ref_path}"),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Follow a location inside an object
fn value_at_mut<'v>(object: &'v mut Map<String, Value>, location: &[LocationStep]) -> Option<&'v mut Value> {
    let (first, rest) = location.split_first()?;
    let LocationStep::Key(key) = first else {
        return None;
    };
    let mut current = object.get_mut(key)?;
    for step in rest {
        current = match (step, current) {
            (LocationStep::Key(key), Value::Object(map)) => map.get_mut(key)?,
            (LocationStep::Index(index), Value::Array(items)) => items.get_mut(*index)?,
            _ => return None,
        };
    }
    Some(current)
}
