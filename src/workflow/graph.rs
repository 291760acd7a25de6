/// Step graph for the question-answering loop
///
/// Steps and transitions are held in a petgraph `DiGraph`. Unlike a DAG
/// workflow this graph loops (generate → check → run → generate), so instead of
/// a topological sort it is validated structurally at construction: a single
/// decision point, no unconditional edge into `End`, and `End` reachable from
/// every step.

use crate::workflow::types::MessageLog;
use petgraph::{
    algo::has_path_connecting,
    graph::{DiGraph, NodeIndex},
    visit::EdgeRef,
    Direction,
};
use std::{collections::HashMap, fmt};
use thiserror::Error;

/// One unit of work in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    ListTables,
    DescribeSchemaRequest,
    DescribeSchemaExecute,
    GenerateQuery,
    CheckQuery,
    RunQuery,
    End,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ListTables => "list_tables",
            Self::DescribeSchemaRequest => "describe_schema_request",
            Self::DescribeSchemaExecute => "describe_schema_execute",
            Self::GenerateQuery => "generate_query",
            Self::CheckQuery => "check_query",
            Self::RunQuery => "run_query",
            Self::End => "end",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Edge label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Taken whenever the source step completes
    Always,
    /// Decision point: the latest assistant message requested a tool
    ToolCallRequested,
    /// Decision point: the latest assistant message is a final answer
    FinalAnswer,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("step '{0}' is not part of the graph")]
    UnknownStep(Step),

    #[error("step '{0}' has no outgoing transition")]
    DeadEnd(Step),

    #[error("step '{0}' must have one unconditional edge or exactly one edge per routing outcome")]
    AmbiguousTransitions(Step),

    #[error("step '{0}' reaches the end without passing the routing decision")]
    UnconditionalEnd(Step),

    #[error("graph must have exactly one routing decision point, found {0}")]
    DecisionPoints(usize),

    #[error("the end step must not have outgoing edges")]
    EndHasSuccessors,

    #[error("step '{0}' cannot reach the end")]
    NoPathToEnd(Step),
}

/// Validated step graph
#[derive(Debug)]
pub struct WorkflowGraph {
    graph: DiGraph<Step, Transition>,
    index: HashMap<Step, NodeIndex>,
    start: Step,
}

impl WorkflowGraph {
    /// The list → describe → generate → {end | check → run → generate} loop
    pub fn query_loop() -> Result<Self, GraphError> {
        use Step::*;
        use Transition::*;

        Self::from_edges(
            ListTables,
            &[
                (ListTables, DescribeSchemaRequest, Always),
                (DescribeSchemaRequest, DescribeSchemaExecute, Always),
                (DescribeSchemaExecute, GenerateQuery, Always),
                (GenerateQuery, End, FinalAnswer),
                (GenerateQuery, CheckQuery, ToolCallRequested),
                (CheckQuery, RunQuery, Always),
                (RunQuery, GenerateQuery, Always),
            ],
        )
    }

    /// Build and validate a graph from labelled edges
    pub fn from_edges(start: Step, edges: &[(Step, Step, Transition)]) -> Result<Self, GraphError> {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();

        let end_index = graph.add_node(Step::End);
        index.insert(Step::End, end_index);

        for &(from, to, transition) in edges {
            let from_index = *index.entry(from).or_insert_with(|| graph.add_node(from));
            let to_index = *index.entry(to).or_insert_with(|| graph.add_node(to));
            graph.add_edge(from_index, to_index, transition);
            tracing::debug!("  🔗 Added transition: '{}' → '{}' ({:?})", from, to, transition);
        }

        let start_index = *index.get(&start).ok_or(GraphError::UnknownStep(start))?;

        // Structural checks, in insertion order so the first error is stable
        let mut decision_points = 0;
        for node in graph.node_indices() {
            let step = graph[node];
            let outgoing: Vec<Transition> = graph
                .edges_directed(node, Direction::Outgoing)
                .map(|edge| *edge.weight())
                .collect();

            if step == Step::End {
                if !outgoing.is_empty() {
                    return Err(GraphError::EndHasSuccessors);
                }
                continue;
            }

            match outgoing.as_slice() {
                [] => return Err(GraphError::DeadEnd(step)),
                [Transition::Always] => {}
                [a, b] if is_decision_pair(*a, *b) => decision_points += 1,
                _ => return Err(GraphError::AmbiguousTransitions(step)),
            }

            for edge in graph.edges_directed(node, Direction::Outgoing) {
                if edge.target() == end_index && *edge.weight() != Transition::FinalAnswer {
                    return Err(GraphError::UnconditionalEnd(step));
                }
            }
        }

        if decision_points != 1 {
            return Err(GraphError::DecisionPoints(decision_points));
        }

        for node in graph.node_indices() {
            if has_path_connecting(&graph, start_index, node, None)
                && !has_path_connecting(&graph, node, end_index, None)
            {
                return Err(GraphError::NoPathToEnd(graph[node]));
            }
        }

        tracing::debug!("✅ Workflow graph validated: {} steps", graph.node_count());
        Ok(Self { graph, index, start })
    }

    pub fn start(&self) -> Step {
        self.start
    }

    /// Next step after `current` completes, given the log it left behind
    pub fn next(&self, current: Step, log: &MessageLog) -> Result<Step, GraphError> {
        let node = *self.index.get(&current).ok_or(GraphError::UnknownStep(current))?;

        let mut edges = self.graph.edges_directed(node, Direction::Outgoing).peekable();
        if edges.peek().is_none() {
            return Err(GraphError::DeadEnd(current));
        }

        let wanted = route(log);
        for edge in edges {
            match *edge.weight() {
                Transition::Always => return Ok(self.graph[edge.target()]),
                outcome if outcome == wanted => return Ok(self.graph[edge.target()]),
                _ => {}
            }
        }

        Err(GraphError::AmbiguousTransitions(current))
    }
}

/// Routing decision after query generation
///
/// A final answer is an assistant message without tool calls; anything else
/// keeps the loop going.
pub fn route(log: &MessageLog) -> Transition {
    match log.last_assistant() {
        Some(message) if !message.has_tool_calls() => Transition::FinalAnswer,
        _ => Transition::ToolCallRequested,
    }
}

fn is_decision_pair(a: Transition, b: Transition) -> bool {
    matches!(
        (a, b),
        (Transition::ToolCallRequested, Transition::FinalAnswer)
            | (Transition::FinalAnswer, Transition::ToolCallRequested)
    )
}
