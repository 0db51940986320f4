//! Dependency graph
//!
//! Snapshot of the object graph taken at the start of a recompute pass.
//! Nodes are numbered by creation order, so every tie in the topological
//! order resolves to the object created first.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, VecDeque};

use crate::object::{DocumentObject, ObjectId};

const UNVISITED: usize = usize::MAX;

/// Directed graph from each object to the objects it links to
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<ObjectId>,
    index: HashMap<ObjectId, usize>,
    /// node -> nodes it depends on
    dependencies: Vec<Vec<usize>>,
    /// node -> nodes depending on it
    dependents: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Build from objects in creation order; links to unknown ids are ignored
    pub fn build(order: &[ObjectId], objects: &HashMap<ObjectId, DocumentObject>) -> Self {
        let index: HashMap<ObjectId, usize> =
            order.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let mut dependencies = vec![Vec::new(); order.len()];
        let mut dependents = vec![Vec::new(); order.len()];

        for (node, id) in order.iter().enumerate() {
            let Some(object) = objects.get(id) else {
                continue;
            };
            for dep in object.dependencies() {
                if let Some(&target) = index.get(&dep) {
                    dependencies[node].push(target);
                    dependents[target].push(node);
                }
            }
        }

        Self {
            nodes: order.to_vec(),
            index,
            dependencies,
            dependents,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: ObjectId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn id(&self, node: usize) -> ObjectId {
        self.nodes[node]
    }

    pub fn dependencies(&self, node: usize) -> &[usize] {
        &self.dependencies[node]
    }

    pub fn dependents(&self, node: usize) -> &[usize] {
        &self.dependents[node]
    }

    /// Seeds plus everything that transitively depends on them
    pub fn downstream(&self, seeds: &[usize]) -> Vec<bool> {
        self.closure(seeds, &self.dependents)
    }

    /// Seeds plus everything they transitively depend on
    pub fn upstream(&self, seeds: &[usize]) -> Vec<bool> {
        self.closure(seeds, &self.dependencies)
    }

    fn closure(&self, seeds: &[usize], edges: &[Vec<usize>]) -> Vec<bool> {
        let mut reached = vec![false; self.nodes.len()];
        let mut queue: VecDeque<usize> = VecDeque::new();
        for &seed in seeds {
            if !reached[seed] {
                reached[seed] = true;
                queue.push_back(seed);
            }
        }
        while let Some(node) = queue.pop_front() {
            for &next in &edges[node] {
                if !reached[next] {
                    reached[next] = true;
                    queue.push_back(next);
                }
            }
        }
        reached
    }

    /// Whether any cycle exists (white/gray/black depth-first search)
    pub fn has_cycle(&self) -> bool {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let mut color = vec![Color::White; self.nodes.len()];
        for root in 0..self.nodes.len() {
            if color[root] != Color::White {
                continue;
            }
            color[root] = Color::Gray;
            let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
            while let Some(frame) = stack.last_mut() {
                let node = frame.0;
                if let Some(&next) = self.dependencies[node].get(frame.1) {
                    frame.1 += 1;
                    match color[next] {
                        Color::Gray => return true,
                        Color::White => {
                            color[next] = Color::Gray;
                            stack.push((next, 0));
                        }
                        Color::Black => {}
                    }
                } else {
                    color[node] = Color::Black;
                    stack.pop();
                }
            }
        }
        false
    }

    /// Nodes within `scope` that lie on a cycle of the scope's subgraph.
    ///
    /// Members of every strongly connected component (Tarjan) with more than
    /// one node, plus nodes linking to themselves.
    pub fn cyclic_nodes(&self, scope: &[bool]) -> Vec<bool> {
        let n = self.nodes.len();
        let mut cyclic = vec![false; n];
        let mut order = vec![UNVISITED; n];
        let mut low = vec![0; n];
        let mut on_stack = vec![false; n];
        let mut stack: Vec<usize> = Vec::new();
        let mut counter = 0;

        for root in 0..n {
            if !scope[root] || order[root] != UNVISITED {
                continue;
            }
            order[root] = counter;
            low[root] = counter;
            counter += 1;
            stack.push(root);
            on_stack[root] = true;
            let mut calls: Vec<(usize, usize)> = vec![(root, 0)];

            while let Some(frame) = calls.last_mut() {
                let node = frame.0;
                if let Some(&next) = self.dependencies[node].get(frame.1) {
                    frame.1 += 1;
                    if !scope[next] {
                        continue;
                    }
                    if order[next] == UNVISITED {
                        order[next] = counter;
                        low[next] = counter;
                        counter += 1;
                        stack.push(next);
                        on_stack[next] = true;
                        calls.push((next, 0));
                    } else if on_stack[next] {
                        low[node] = low[node].min(order[next]);
                    }
                    continue;
                }

                calls.pop();
                if let Some(&(parent, _)) = calls.last() {
                    low[parent] = low[parent].min(low[node]);
                }
                if low[node] != order[node] {
                    continue;
                }

                let mut component = Vec::new();
                while let Some(member) = stack.pop() {
                    on_stack[member] = false;
                    component.push(member);
                    if member == node {
                        break;
                    }
                }
                let self_loop = self.dependencies[node].contains(&node);
                if component.len() > 1 || self_loop {
                    for member in component {
                        cyclic[member] = true;
                    }
                }
            }
        }
        cyclic
    }

    /// Topological order (dependencies first) of the nodes in `scope` that
    /// are not `excluded`. Returns the order and the nodes left over when the
    /// remaining subgraph still contains a cycle.
    pub fn topological_order(&self, scope: &[bool], excluded: &[bool]) -> (Vec<usize>, Vec<usize>) {
        let included = |node: usize| scope[node] && !excluded[node];
        let mut in_degree = vec![0usize; self.nodes.len()];
        let mut ready: BinaryHeap<Reverse<usize>> = BinaryHeap::new();

        for node in (0..self.nodes.len()).filter(|&n| included(n)) {
            in_degree[node] = self.dependencies[node]
                .iter()
                .filter(|&&dep| included(dep))
                .count();
            if in_degree[node] == 0 {
                ready.push(Reverse(node));
            }
        }

        let mut order = Vec::new();
        while let Some(Reverse(node)) = ready.pop() {
            order.push(node);
            for &dependent in &self.dependents[node] {
                if !included(dependent) {
                    continue;
                }
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }

        let stalled: Vec<usize> = (0..self.nodes.len())
            .filter(|&n| included(n) && in_degree[n] > 0)
            .collect();
        (order, stalled)
    }
}
