// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Static analysis of the scheduler graph.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt::Write;

use petgraph::Direction;
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::core::scheduling::TaskSchedulerType;
use crate::core::wires::SolderType;

/// A scheduler as seen by the analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ModelVertex {
    pub name: String,
    pub scheduler_type: TaskSchedulerType,
    pub capacity: Option<u64>,
}

impl ModelVertex {
    /// Whether a PUT into this vertex can block its caller.
    fn can_block(&self) -> bool {
        match self.scheduler_type {
            TaskSchedulerType::Sequential | TaskSchedulerType::Concurrent => {
                self.capacity.is_some()
            }
            TaskSchedulerType::Direct | TaskSchedulerType::DirectThreadsafe => true,
            TaskSchedulerType::NoOp => false,
        }
    }
}

/// A soldered connection between two schedulers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ModelEdge {
    pub source: String,
    pub target: String,
    pub input_wire: String,
    pub solder: SolderType,
}

pub(crate) struct ModelGraph {
    graph: DiGraph<ModelVertex, ModelEdge>,
}

impl ModelGraph {
    pub(crate) fn build(vertices: Vec<ModelVertex>, edges: &[ModelEdge]) -> Self {
        let mut graph = DiGraph::new();
        let mut index: HashMap<String, NodeIndex> = HashMap::new();
        for vertex in vertices {
            let name = vertex.name.clone();
            index.insert(name, graph.add_node(vertex));
        }
        for edge in edges {
            match (index.get(&edge.source), index.get(&edge.target)) {
                (Some(&source), Some(&target)) => {
                    graph.add_edge(source, target, edge.clone());
                }
                _ => tracing::warn!(
                    "Edge {} -> {} references an unknown scheduler",
                    edge.source,
                    edge.target
                ),
            }
        }
        Self { graph }
    }

    /// Cycles of PUT edges through vertices that can block, as vertex names.
    pub(crate) fn backpressure_cycles(&self) -> Vec<Vec<String>> {
        let blocking = self.graph.filter_map(
            |_, vertex| vertex.can_block().then(|| vertex.name.clone()),
            |_, edge| (edge.solder == SolderType::Put).then_some(()),
        );

        tarjan_scc(&blocking)
            .into_iter()
            .filter(|component| {
                component.len() > 1 || blocking.contains_edge(component[0], component[0])
            })
            .map(|component| {
                let mut names: Vec<String> =
                    component.iter().map(|&n| blocking[n].clone()).collect();
                names.sort();
                names
            })
            .collect()
    }

    /// Descriptions of DIRECT schedulers reachable from a CONCURRENT scheduler
    /// or from more than one queued scheduler.
    pub(crate) fn illegal_direct_usage(&self) -> Vec<String> {
        let mut problems = Vec::new();

        for vertex in self.graph.node_indices() {
            if self.graph[vertex].scheduler_type != TaskSchedulerType::Direct {
                continue;
            }

            let callers = self.threaded_callers(vertex);
            let name = &self.graph[vertex].name;
            let concurrent: Vec<&str> = callers
                .iter()
                .filter(|&&c| self.graph[c].scheduler_type == TaskSchedulerType::Concurrent)
                .map(|&c| self.graph[c].name.as_str())
                .collect();

            if !concurrent.is_empty() {
                problems.push(format!(
                    "DIRECT scheduler {} is called from CONCURRENT scheduler(s) {}",
                    name,
                    concurrent.join(", ")
                ));
            } else if callers.len() > 1 {
                let names: Vec<&str> = callers
                    .iter()
                    .map(|&c| self.graph[c].name.as_str())
                    .collect();
                problems.push(format!(
                    "DIRECT scheduler {} is called from multiple threads via {}",
                    name,
                    names.join(", ")
                ));
            }
        }

        problems
    }

    /// Non-direct schedulers whose threads end up running `vertex`'s handler.
    fn threaded_callers(&self, vertex: NodeIndex) -> BTreeSet<NodeIndex> {
        let mut callers = BTreeSet::new();
        let mut visited = HashSet::from([vertex]);
        let mut frontier = VecDeque::from([vertex]);

        while let Some(current) = frontier.pop_front() {
            for edge in self.graph.edges_directed(current, Direction::Incoming) {
                let caller = edge.source();
                if !visited.insert(caller) {
                    continue;
                }
                if self.graph[caller].scheduler_type.is_direct() {
                    frontier.push_back(caller);
                } else {
                    callers.insert(caller);
                }
            }
        }

        callers
    }

    /// Upstream-first order for stopping. `None` if the graph has a cycle.
    pub(crate) fn topological_order(&self) -> Option<Vec<String>> {
        toposort(&self.graph, None).ok().map(|order| {
            order
                .into_iter()
                .map(|n| self.graph[n].name.clone())
                .collect()
        })
    }

    /// Render the graph as a mermaid flowchart.
    pub(crate) fn mermaid(&self) -> String {
        let mut out = String::from("flowchart TD\n");

        for vertex in self.graph.node_weights() {
            let label = match vertex.capacity {
                Some(capacity) => format!(
                    "{}<br/>{} {}",
                    vertex.name, vertex.scheduler_type, capacity
                ),
                None => format!("{}<br/>{}", vertex.name, vertex.scheduler_type),
            };
            let _ = match vertex.scheduler_type {
                TaskSchedulerType::Sequential => writeln!(out, "    {}[\"{}\"]", vertex.name, label),
                TaskSchedulerType::Concurrent => {
                    writeln!(out, "    {}[[\"{}\"]]", vertex.name, label)
                }
                TaskSchedulerType::Direct | TaskSchedulerType::DirectThreadsafe => {
                    writeln!(out, "    {}{{{{\"{}\"}}}}", vertex.name, label)
                }
                TaskSchedulerType::NoOp => writeln!(out, "    {}((\"{}\"))", vertex.name, label),
            };
        }

        for edge in self.graph.edge_references() {
            let arrow = match edge.weight().solder {
                SolderType::Put => "-->",
                SolderType::Offer => "--o",
                SolderType::Inject => "-.->",
            };
            let _ = writeln!(
                out,
                "    {} {}|\"{}\"| {}",
                self.graph[edge.source()].name,
                arrow,
                edge.weight().input_wire,
                self.graph[edge.target()].name
            );
        }

        out
    }
}
