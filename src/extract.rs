use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::config::Options;
use crate::error::{Error, Result};
use crate::fragment::Fragment;
use crate::parser::blocks::{self, Scan};
use crate::parser::resources::{self, Resources};

const CHUNK_SIZE: usize = 200;

/// Something worth reporting about one document that did not stop the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    pub origin: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    /// The document contributed nothing to the inventory.
    pub rejected: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    pub options: Options,
    pub length: usize,
    pub length_unique: usize,
    pub length_total: usize,
    pub items: Vec<Fragment>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
}

impl Inventory {
    /// First occurrence of every fragment id, in discovery order.
    pub fn unique(&self) -> impl Iterator<Item = &Fragment> {
        let mut seen = HashSet::new();
        self.items.iter().filter(move |f| seen.insert(f.id.as_str()))
    }
}

/// A document that holds at least one region, scanned but not yet merged.
struct ScannedDocument {
    origin: String,
    scan: Scan,
    resources: Resources,
}

/// Extract every document in order.
pub fn run(documents: &[PathBuf], options: &Options) -> Result<Inventory> {
    run_with_progress(documents, options, |_| {})
}

/// Like [`run`], calling `progress` with the number of documents finished after each chunk.
///
/// Reads and scans may run in parallel within a chunk; merging always follows
/// input order, so the result does not depend on completion order.
pub fn run_with_progress(
    documents: &[PathBuf],
    options: &Options,
    mut progress: impl FnMut(usize),
) -> Result<Inventory> {
    let mut collector = Collector::new(options);

    for chunk in documents.chunks(CHUNK_SIZE) {
        for scanned in scan_chunk(chunk) {
            if let Some(doc) = scanned? {
                collector.add(doc)?;
            }
        }
        progress(chunk.len());
    }

    let inventory = collector.finish();
    info!(
        "Extracted {} blocks ({} unique) from {} documents",
        inventory.length_total,
        inventory.length_unique,
        documents.len()
    );
    Ok(inventory)
}

#[cfg(feature = "rayon")]
fn scan_chunk(chunk: &[PathBuf]) -> Vec<Result<Option<ScannedDocument>>> {
    chunk.par_iter().map(|p| scan_document(p)).collect()
}

#[cfg(not(feature = "rayon"))]
fn scan_chunk(chunk: &[PathBuf]) -> Vec<Result<Option<ScannedDocument>>> {
    chunk.iter().map(|p| scan_document(p)).collect()
}

fn scan_document(path: &Path) -> Result<Option<ScannedDocument>> {
    let text = fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;

    if !blocks::contains_marker(&text) {
        debug!("No markers in {}, skipping", path.display());
        return Ok(None);
    }

    Ok(Some(ScannedDocument {
        origin: path.display().to_string(),
        scan: blocks::scan(&text),
        resources: resources::extract(&text),
    }))
}

/// Sequential merge state for one run.
struct Collector<'a> {
    caller: &'a Options,
    options: Options,
    extracted: Map<String, Value>,
    seen: HashSet<String>,
    items: Vec<Fragment>,
    warnings: Vec<Warning>,
}

impl<'a> Collector<'a> {
    fn new(caller: &'a Options) -> Self {
        Collector {
            caller,
            options: caller.clone(),
            extracted: Map::new(),
            seen: HashSet::new(),
            items: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn add(&mut self, doc: ScannedDocument) -> Result<()> {
        let ScannedDocument { origin, scan, resources } = doc;

        for issue in &scan.issues {
            warn!("{}: {}", origin, issue);
        }

        if self.caller.strict && !scan.issues.is_empty() {
            let err = Error::Malformed {
                path: PathBuf::from(&origin),
                issues: scan.issues,
            };
            warn!("Rejecting {} (strict)", origin);
            self.warnings.push(Warning {
                origin,
                message: err.to_string(),
                line: None,
                rejected: true,
            });
            return Ok(());
        }

        self.warnings.extend(scan.issues.iter().map(|issue| Warning {
            origin: origin.clone(),
            message: issue.to_string(),
            line: Some(issue.line()),
            rejected: false,
        }));

        self.merge_resources(&resources)?;

        debug!("{}: {} blocks", origin, scan.blocks.len());
        for block in &scan.blocks {
            let fragment = Fragment::parse(block, &self.options).with_origin(origin.as_str());
            if !self.seen.insert(fragment.id.clone()) {
                debug!("Duplicate fragment {} in {}", fragment.id, origin);
            }
            self.items.push(fragment);
        }

        Ok(())
    }

    /// Later documents replace earlier ones per top-level key; caller overrides always win.
    fn merge_resources(&mut self, resources: &Resources) -> Result<()> {
        if let Value::Object(map) = serde_json::to_value(resources)? {
            self.extracted.extend(map);
        }
        let mut effective = self.extracted.clone();
        effective.extend(self.caller.resources.clone());
        self.options.resources = effective;
        Ok(())
    }

    fn finish(self) -> Inventory {
        let total = self.items.len();
        Inventory {
            options: self.options,
            length: total,
            length_unique: self.seen.len(),
            length_total: total,
            items: self.items,
            warnings: self.warnings,
        }
    }
}
