//! Graphviz export of the graph behind a tensor.

use std::collections::HashMap;

use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};

use super::backward::topological_sort;
use super::graph::{ComputationGraph, Node, NodeId, Parent, with_graph};
use super::tensor::Tensor;
use crate::error::Result;

fn node_label(id: NodeId, node: &Node) -> String {
    let name = if node.label().is_empty() {
        format!("#{}", id.index())
    } else {
        node.label().to_string()
    };
    format!("{name} {:?}", node.value().shape())
}

/// Build the display graph for everything reachable from `root`.
///
/// Tensor vertices are labelled with their label (or id) and shape;
/// operator vertices with the operator name. Constant parents get their
/// own vertex.
pub fn build_display_graph(
    graph: &ComputationGraph,
    root: NodeId,
) -> Result<DiGraph<String, &'static str>> {
    let order = topological_sort(graph, root)?;
    let mut display = DiGraph::new();
    let mut vertices: HashMap<NodeId, NodeIndex> = HashMap::new();

    for &id in &order {
        let node = graph.node(id)?;
        let vertex = display.add_node(node_label(id, node));
        vertices.insert(id, vertex);

        let Some(creator) = node.creator() else {
            continue;
        };
        let op = display.add_node(creator.name().to_string());
        display.add_edge(op, vertex, "");
        for parent in creator.parents() {
            let source = match *parent {
                // post-order: every node parent already has a vertex
                Parent::Node(parent) => match vertices.get(&parent) {
                    Some(&source) => source,
                    None => continue,
                },
                Parent::Constant(value) => display.add_node(format!("{value}")),
            };
            display.add_edge(source, op, "");
        }
    }

    Ok(display)
}

impl Tensor {
    /// Graphviz DOT description of the graph that produced this tensor.
    ///
    /// ```
    /// use ndgrad::Tensor;
    ///
    /// let x = Tensor::scalar(2.0).with_label("x");
    /// let y = (x * 3.0).unwrap().with_label("y");
    /// let dot = y.to_dot().unwrap();
    /// assert!(dot.contains("digraph"));
    /// assert!(dot.contains("Mul"));
    /// ```
    pub fn to_dot(&self) -> Result<String> {
        let display = with_graph(|g| build_display_graph(g, self.id()))?;
        Ok(format!(
            "{}",
            Dot::with_config(&display, &[Config::EdgeNoLabel])
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autodiff::clear_graph;

    #[test]
    fn test_display_graph_shape() {
        clear_graph();
        let a = Tensor::scalar(1.0).with_label("a");
        let b = Tensor::ones(&[2]).with_label("b");
        let c = (a * b).unwrap();
        let d = c.exp().unwrap();

        let display = with_graph(|g| build_display_graph(g, d.id())).unwrap();
        // a, b, c, d plus the Mul and Exp operator vertices
        assert_eq!(display.node_count(), 6);
        // a->Mul, b->Mul, Mul->c, c->Exp, Exp->d
        assert_eq!(display.edge_count(), 5);
    }

    #[test]
    fn test_to_dot_labels() {
        clear_graph();
        let w = Tensor::ones(&[2, 2]).with_label("w");
        let y = w.relu().unwrap();
        let dot = y.to_dot().unwrap();

        assert!(dot.contains("w [2, 2]"));
        assert!(dot.contains("ReLU"));
        assert!(dot.contains(&format!("#{} [2, 2]", y.id().index())));
    }

    #[test]
    fn test_released_graph_still_renders() {
        clear_graph();
        let x = Tensor::scalar(1.0);
        let y = x.exp().unwrap();
        y.backward().unwrap();

        let display = with_graph(|g| build_display_graph(g, y.id())).unwrap();
        assert_eq!(display.node_count(), 1);
    }
}
