//! Backward pass execution for reverse-mode automatic differentiation.

use std::collections::HashSet;

use tracing::{debug, debug_span, trace};

use super::graph::{ComputationGraph, NodeId};
use crate::buffer::Buffer;
use crate::error::{GradError, Result};

/// Options for a backward pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackwardOptions {
    /// Keep operator instances after use so the graph can be
    /// backpropagated again. Non-root gradients then accumulate across
    /// passes until zeroed.
    pub retain_graph: bool,
}

impl BackwardOptions {
    pub fn retain_graph(mut self, retain: bool) -> Self {
        self.retain_graph = retain;
        self
    }
}

/// Run a backward pass from `root` over the given graph.
///
/// 1. Topologically sort the nodes reachable from `root`.
/// 2. Seed `root.grad` with ones (the sum-of-elements convention for
///    non-scalar roots).
/// 3. Visit nodes in reverse order, handing each creator its node's grad
///    and adding the returned contributions into the parents' grads.
/// 4. Release each creator after use unless `retain_graph` is set.
///
/// # Errors
///
/// - `GradError::UnknownNode` if `root` is not in the graph
/// - `GradError::InvalidGraphState` if any reachable non-leaf was released
///   by an earlier pass; nothing is modified in that case
/// - any error from an operator's `backward`, which aborts the pass and
///   leaves the contributions applied so far in place
pub fn run_backward(
    graph: &mut ComputationGraph,
    root: NodeId,
    options: BackwardOptions,
) -> Result<()> {
    let order = topological_sort(graph, root)?;

    if let Some(&stale) = order.iter().find(|&&id| {
        graph
            .node(id)
            .map(|node| node.is_released())
            .unwrap_or(false)
    }) {
        return Err(GradError::InvalidGraphState(format!(
            "node {} was released by an earlier backward pass; \
             rebuild the expression or pass retain_graph",
            stale.index()
        )));
    }

    let span = debug_span!("backward", root = root.index(), nodes = order.len());
    let _guard = span.enter();

    let root_node = graph.node_mut(root)?;
    let seed = Buffer::ones(root_node.value().shape());
    *root_node.grad_mut() = seed;

    for &id in order.iter().rev() {
        let node = graph.node_mut(id)?;
        let Some(creator) = node.take_creator() else {
            continue;
        };
        let grad_output = node.grad().clone();

        trace!(node = id.index(), op = creator.name(), "backward");
        let result = creator
            .backward(&grad_output)
            .and_then(|contributions| accumulate(graph, contributions));

        let node = graph.node_mut(id)?;
        node.restore_creator(creator);
        result?;

        if options.retain_graph {
            debug!(node = id.index(), "retained creator");
        } else {
            node.release();
            debug!(node = id.index(), "released creator");
        }
    }

    Ok(())
}

fn accumulate(graph: &mut ComputationGraph, contributions: Vec<(NodeId, Buffer)>) -> Result<()> {
    for (parent, grad) in contributions {
        graph.node_mut(parent)?.grad_mut().accumulate(&grad)?;
    }
    Ok(())
}

/// Topological sort of the nodes reachable from `root`.
///
/// Iterative post-order DFS: a node is emitted only after every node it
/// depends on, so the reversed order visits each node after all of its
/// consumers. Shared sub-expressions are visited once.
pub fn topological_sort(graph: &ComputationGraph, root: NodeId) -> Result<Vec<NodeId>> {
    let mut order = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![(root, false)];

    while let Some((id, expanded)) = stack.pop() {
        if expanded {
            order.push(id);
            continue;
        }
        if !visited.insert(id) {
            continue;
        }

        stack.push((id, true));
        if let Some(creator) = graph.node(id)?.creator() {
            for parent in creator.inputs().into_iter().rev() {
                if !visited.contains(&parent) {
                    stack.push((parent, false));
                }
            }
        }
    }

    Ok(order)
}
