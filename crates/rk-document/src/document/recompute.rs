//! Recompute scheduler
//!
//! A pass visits every object due for recompute, plus everything depending
//! on it, once, in dependency order. Failures stay local: a failing object
//! is marked `Error` and its dependents receive an upstream error without
//! being executed, while unrelated objects recompute normally.

use std::collections::VecDeque;

use super::graph::DependencyGraph;
use super::{Change, ChangeRecorder, Document, DocumentError, DocumentResult};
use crate::object::{ExecOutcome, ExecResult, ExecReturn, ObjectId, RecomputeFailure};

/// Per-object outcome of a recompute pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecomputeReport {
    /// Objects whose `execute()` ran and succeeded, in visiting order
    pub executed: Vec<ObjectId>,
    /// Objects visited but skipped by `must_execute()`
    pub skipped: Vec<ObjectId>,
    /// Objects that ended in `Error`
    pub failed: Vec<ExecReturn>,
    /// Objects touched during the pass, left for the next one
    pub deferred: Vec<ObjectId>,
}

impl RecomputeReport {
    /// No object failed
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty()
    }

    /// Number of objects visited
    pub fn visited(&self) -> usize {
        self.executed.len() + self.skipped.len() + self.failed.len()
    }
}

impl Document {
    /// Recompute every touched or new object and its dependents
    pub fn recompute(&mut self) -> RecomputeReport {
        let graph = self.dependency_graph();
        let seeds: Vec<usize> = (0..graph.len())
            .filter(|&n| {
                self.objects
                    .get(&graph.id(n))
                    .is_some_and(|o| o.is_touched())
            })
            .collect();
        let scope = graph.downstream(&seeds);
        self.run_pass(&graph, &scope)
    }

    /// Recompute one object after its transitive dependencies, leaving
    /// unrelated touched objects alone. Dependents of the object are left
    /// touched.
    pub fn recompute_feature(&mut self, id: ObjectId) -> DocumentResult<RecomputeReport> {
        let graph = self.dependency_graph();
        let node = graph
            .node(id)
            .ok_or_else(|| DocumentError::ObjectNotFound(id.to_string()))?;
        if let Some(object) = self.objects.get_mut(&id) {
            object.mark_touched(None);
        }
        let scope = graph.upstream(&[node]);
        Ok(self.run_pass(&graph, &scope))
    }

    fn run_pass(&mut self, graph: &DependencyGraph, scope: &[bool]) -> RecomputeReport {
        self.recompute_log.clear();
        let mut report = RecomputeReport::default();
        if !scope.contains(&true) {
            return report;
        }

        let blocked = self.fail_cycles(graph, scope, &mut report);
        let (order, stalled) = graph.topological_order(scope, &blocked);
        if !stalled.is_empty() {
            tracing::warn!("{} objects could not be ordered", stalled.len());
        }
        tracing::debug!("Recompute pass over {} objects", order.len());

        let mut upstream_recomputed = vec![false; graph.len()];
        let mut deferred: Vec<ObjectId> = Vec::new();

        for (position, &node) in order.iter().enumerate() {
            let id = graph.id(node);
            let Some(object) = self.objects.get(&id) else {
                continue;
            };

            let failed_dependency = object.dependencies().into_iter().find_map(|dep| {
                self.objects
                    .get(&dep)
                    .filter(|d| d.is_error())
                    .map(|d| d.name().to_string())
            });
            if let Some(dependency) = failed_dependency {
                self.fail(id, RecomputeFailure::UpstreamError(dependency), &mut report);
                continue;
            }

            if !object.must_execute(upstream_recomputed[node]) {
                if let Some(object) = self.objects.get_mut(&id) {
                    object.finish_skipped();
                }
                report.skipped.push(id);
                continue;
            }

            let mut touch_requests = Vec::new();
            let Some((result, changes)) = self.execute_object(id, &mut touch_requests) else {
                continue;
            };
            self.process_changes(changes, false);

            match result {
                Ok(outcome) => {
                    if let Some(object) = self.objects.get_mut(&id) {
                        object.set_valid();
                    }
                    report.executed.push(id);
                    if outcome == ExecOutcome::Recomputed {
                        for &dependent in graph.dependents(node) {
                            upstream_recomputed[dependent] = true;
                        }
                    }
                }
                Err(e) => self.fail(id, RecomputeFailure::Execution(e), &mut report),
            }

            for target in touch_requests {
                if target == id {
                    continue;
                }
                let later = graph
                    .node(target)
                    .is_some_and(|t| order[position + 1..].contains(&t));
                if later {
                    if let Some(object) = self.objects.get_mut(&target) {
                        object.mark_touched(None);
                    }
                } else if !deferred.contains(&target) {
                    deferred.push(target);
                }
            }
        }

        // Dependents outside the pass see the new results next time
        for node in 0..graph.len() {
            if upstream_recomputed[node]
                && !scope[node]
                && let Some(object) = self.objects.get_mut(&graph.id(node))
            {
                object.mark_touched(None);
            }
        }
        for target in deferred {
            if let Some(object) = self.objects.get_mut(&target) {
                object.mark_touched(None);
                report.deferred.push(target);
            }
        }

        tracing::info!(
            "Recomputed {}: {} executed, {} skipped, {} failed",
            self.name(),
            report.executed.len(),
            report.skipped.len(),
            report.failed.len()
        );
        report
    }

    /// Mark cycle members and everything downstream of them; returns the
    /// nodes excluded from ordering.
    fn fail_cycles(
        &mut self,
        graph: &DependencyGraph,
        scope: &[bool],
        report: &mut RecomputeReport,
    ) -> Vec<bool> {
        let cyclic = graph.cyclic_nodes(scope);
        let mut blocked = cyclic.clone();
        if !cyclic.contains(&true) {
            return blocked;
        }

        // Breadth-first from the cycles; each node blames the first cycle
        // member that reaches it
        let mut queue: VecDeque<(usize, usize)> = VecDeque::new();
        for node in (0..graph.len()).filter(|&n| cyclic[n]) {
            self.fail(graph.id(node), RecomputeFailure::CyclicDependency, report);
            queue.push_back((node, node));
        }
        while let Some((node, origin)) = queue.pop_front() {
            for &dependent in graph.dependents(node) {
                if !scope[dependent] || blocked[dependent] {
                    continue;
                }
                blocked[dependent] = true;
                let origin_name = self
                    .objects
                    .get(&graph.id(origin))
                    .map(|o| o.name().to_string())
                    .unwrap_or_default();
                self.fail(
                    graph.id(dependent),
                    RecomputeFailure::UpstreamCycle(origin_name),
                    report,
                );
                queue.push_back((dependent, origin));
            }
        }
        blocked
    }

    /// Run `execute()` with the object taken out of the map, so it can read
    /// the others while writing its own properties.
    fn execute_object(
        &mut self,
        id: ObjectId,
        touch_requests: &mut Vec<ObjectId>,
    ) -> Option<(ExecResult<ExecOutcome>, Vec<Change>)> {
        let mut object = self.objects.remove(&id)?;
        object.set_recomputing();
        let mut recorder = ChangeRecorder::new(None);
        let result = object.run_execute(&self.objects, &mut recorder, touch_requests);
        let changes = recorder.into_changes();
        self.objects.insert(id, object);
        Some((result, changes))
    }

    fn fail(&mut self, id: ObjectId, failure: RecomputeFailure, report: &mut RecomputeReport) {
        let Some(object) = self.objects.get_mut(&id) else {
            return;
        };
        let error = ExecReturn::new(id, object.name(), failure);
        tracing::warn!("Recompute of {} failed: {}", error.name, error.failure);
        object.set_error(error.clone());
        self.recompute_log.push(error.clone());
        report.failed.push(error);
    }
}
