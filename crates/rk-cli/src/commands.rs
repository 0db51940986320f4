//! Command implementations

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use rk_document::{Application, Document, ExecReturn, ObjectId, RecomputeReport};
use serde::Serialize;

/// One object as listed by `inspect`
#[derive(Debug, Clone, Serialize)]
pub struct ObjectSummary {
    pub name: String,
    pub label: String,
    pub type_name: String,
    pub status: String,
    pub dependencies: Vec<String>,
    pub error: Option<String>,
}

/// A failed object in a recompute report
#[derive(Debug, Clone, Serialize)]
pub struct FailureSummary {
    pub name: String,
    pub reason: String,
}

/// Outcome of a recompute, by object name
#[derive(Debug, Clone, Serialize)]
pub struct RecomputeSummary {
    pub document: String,
    pub executed: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<FailureSummary>,
}

impl RecomputeSummary {
    fn from_report(doc: &Document, report: &RecomputeReport) -> Self {
        let names = |ids: &[ObjectId]| -> Vec<String> {
            ids.iter()
                .filter_map(|id| doc.object(*id))
                .map(|o| o.name().to_string())
                .collect()
        };
        Self {
            document: doc.name().to_string(),
            executed: names(&report.executed),
            skipped: names(&report.skipped),
            failed: report.failed.iter().map(FailureSummary::from).collect(),
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Plain text rendering, one object per line
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Recomputed {}", self.document);
        for name in &self.executed {
            let _ = writeln!(out, "  ok       {}", name);
        }
        for name in &self.skipped {
            let _ = writeln!(out, "  skipped  {}", name);
        }
        for failure in &self.failed {
            let _ = writeln!(out, "  error    {}: {}", failure.name, failure.reason);
        }
        out
    }
}

impl From<&ExecReturn> for FailureSummary {
    fn from(error: &ExecReturn) -> Self {
        Self {
            name: error.name.clone(),
            reason: error.failure.to_string(),
        }
    }
}

/// Build the demo document: a filleted box and an unrelated cylinder
pub fn demo(app: &mut Application, output: &Path) -> Result<RecomputeSummary> {
    let doc = app.new_document("Demo")?;
    let name = doc.name().to_string();

    doc.open_transaction(Some("Create demo"));
    let base = doc.add_object("Part::Box", None)?;
    doc.set_property(base, "Length", 20.0)?;
    let fillet = doc.add_object("Part::Fillet", None)?;
    doc.set_property(fillet, "Base", base)?;
    doc.set_property(fillet, "Radius", 2.0)?;
    doc.add_object("Part::Cylinder", None)?;
    doc.commit_transaction()?;

    let report = doc.recompute();
    let summary = RecomputeSummary::from_report(doc, &report);

    app.save_document(&name, output)
        .with_context(|| format!("failed to save {}", output.display()))?;
    tracing::info!("Wrote demo document to {}", output.display());
    Ok(summary)
}

/// Objects of a saved document in creation order
pub fn inspect(app: &mut Application, file: &Path) -> Result<Vec<ObjectSummary>> {
    let doc = open(app, file)?;
    let summaries = doc
        .iter_objects()
        .map(|object| ObjectSummary {
            name: object.name().to_string(),
            label: object.label().to_string(),
            type_name: object.type_name().to_string(),
            status: object.status().to_string(),
            dependencies: object
                .dependencies()
                .into_iter()
                .filter_map(|id| doc.object(id))
                .map(|d| d.name().to_string())
                .collect(),
            error: object.error_log().map(ExecReturn::message),
        })
        .collect();
    Ok(summaries)
}

/// Recompute a saved document, optionally writing it back
pub fn recompute(app: &mut Application, file: &Path, save: bool) -> Result<RecomputeSummary> {
    let doc = open(app, file)?;
    let report = doc.recompute();
    let summary = RecomputeSummary::from_report(doc, &report);

    if save {
        let name = doc.name().to_string();
        app.save_document(&name, file)
            .with_context(|| format!("failed to save {}", file.display()))?;
    }
    Ok(summary)
}

/// DOT dependency graph of a saved document
pub fn graph(app: &mut Application, file: &Path) -> Result<String> {
    let doc = open(app, file)?;
    Ok(doc.dependency_graph_dot())
}

fn open<'a>(app: &'a mut Application, file: &Path) -> Result<&'a mut Document> {
    app.open_document(file)
        .with_context(|| format!("failed to open {}", file.display()))
}

/// Aligned table of `inspect` output
pub fn format_objects(objects: &[ObjectSummary]) -> String {
    let width = objects.iter().map(|o| o.name.len()).max().unwrap_or(4).max(4);
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<width$}  {:<16}  {:<8}  DEPENDS ON",
        "NAME",
        "TYPE",
        "STATUS",
        width = width
    );
    for object in objects {
        let _ = writeln!(
            out,
            "{:<width$}  {:<16}  {:<8}  {}",
            object.name,
            object.type_name,
            object.status,
            object.dependencies.join(", "),
            width = width
        );
        if let Some(error) = &object.error {
            let _ = writeln!(out, "{:<width$}  ! {}", "", error, width = width);
        }
    }
    out
}
