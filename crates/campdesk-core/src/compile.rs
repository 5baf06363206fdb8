//! The normalize, build, serialize pipeline and its report.

use serde::Serialize;
use serde_json::Value;

use crate::record;
use crate::tree;
use crate::view::{self, CompiledView};

/// What one compilation did, for logs and the CLI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileReport {
    pub records: usize,
    pub dropped: usize,
    pub nodes: usize,
    pub duplicates: usize,
    pub orphans: usize,
    pub cycles_broken: usize,
    pub partitions: usize,
}

#[derive(Debug, Clone)]
pub struct Compilation {
    pub view: CompiledView,
    pub report: CompileReport,
}

/// Run normalize → build → serialize over the full collection.
pub fn compile(records: &[Value]) -> Compilation {
    let normalized = record::normalize(records);
    let forest = tree::build(normalized.nodes);
    let built = forest.report();
    let view = view::serialize(&forest);

    let report = CompileReport {
        records: records.len(),
        dropped: normalized.dropped,
        nodes: built.nodes,
        duplicates: built.duplicates,
        orphans: built.orphans,
        cycles_broken: built.cycles_broken,
        partitions: view.partitions.len(),
    };
    Compilation { view, report }
}
