//! Computation graphs submitted to the runtime.

use super::required_field;
use super::types::TierkreisType;
use super::values::{TierkreisValue, ValueError};
use crate::grpc::proto::graph as pg;

/// Position of a node within its graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    pub fn port(self, name: impl Into<String>) -> NodePort {
        NodePort {
            node: self,
            port: name.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodePort {
    pub node: NodeIndex,
    pub port: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TierkreisNode {
    Input,
    Output,
    Const(TierkreisValue),
    Function {
        name: String,
        retry_secs: Option<u32>,
    },
    Box {
        location: Vec<String>,
        graph: TierkreisGraph,
    },
    Match,
    Tag(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct TierkreisEdge {
    pub source: NodePort,
    pub target: NodePort,
    /// Filled in by type checking
    pub edge_type: Option<TierkreisType>,
}

/// A directed graph of nodes connected port to port.
///
/// Node 0 is always the input node and node 1 the output node.
#[derive(Clone, Debug, PartialEq)]
pub struct TierkreisGraph {
    name: String,
    nodes: Vec<TierkreisNode>,
    edges: Vec<TierkreisEdge>,
    input_order: Vec<String>,
    output_order: Vec<String>,
}

impl TierkreisGraph {
    pub const INPUT: NodeIndex = NodeIndex(0);
    pub const OUTPUT: NodeIndex = NodeIndex(1);

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: vec![TierkreisNode::Input, TierkreisNode::Output],
            edges: Vec::new(),
            input_order: Vec::new(),
            output_order: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &[TierkreisNode] {
        &self.nodes
    }

    pub fn node(&self, index: NodeIndex) -> Option<&TierkreisNode> {
        self.nodes.get(index.0 as usize)
    }

    pub fn edges(&self) -> &[TierkreisEdge] {
        &self.edges
    }

    pub fn input_order(&self) -> &[String] {
        &self.input_order
    }

    pub fn output_order(&self) -> &[String] {
        &self.output_order
    }

    pub fn add_node(&mut self, node: TierkreisNode) -> NodeIndex {
        self.nodes.push(node);
        NodeIndex(self.nodes.len() as u32 - 1)
    }

    pub fn add_const(&mut self, value: TierkreisValue) -> NodeIndex {
        self.add_node(TierkreisNode::Const(value))
    }

    /// Add a call to a function by qualified name, e.g. `pytket/compile_circuits`.
    pub fn add_func(&mut self, name: impl Into<String>) -> NodeIndex {
        self.add_node(TierkreisNode::Function {
            name: name.into(),
            retry_secs: None,
        })
    }

    pub fn add_edge(&mut self, source: NodePort, target: NodePort) {
        self.edges.push(TierkreisEdge {
            source,
            target,
            edge_type: None,
        });
    }

    /// Declare a graph input, returning the port it is available on.
    pub fn add_input(&mut self, name: impl Into<String>) -> NodePort {
        let name = name.into();
        if !self.input_order.contains(&name) {
            self.input_order.push(name.clone());
        }
        Self::INPUT.port(name)
    }

    /// Connect `source` to the graph output `name`.
    pub fn set_output(&mut self, name: impl Into<String>, source: NodePort) {
        let name = name.into();
        if !self.output_order.contains(&name) {
            self.output_order.push(name.clone());
        }
        self.add_edge(source, Self::OUTPUT.port(name));
    }

    /// True once every edge carries a type annotation
    pub fn is_annotated(&self) -> bool {
        self.edges.iter().all(|edge| edge.edge_type.is_some())
    }

    pub fn to_proto(&self) -> pg::Graph {
        pg::Graph {
            nodes: self.nodes.iter().map(node_to_proto).collect(),
            edges: self
                .edges
                .iter()
                .map(|edge| pg::Edge {
                    port_from: edge.source.port.clone(),
                    port_to: edge.target.port.clone(),
                    node_from: edge.source.node.0,
                    node_to: edge.target.node.0,
                    edge_type: edge.edge_type.as_ref().map(|ty| ty.to_proto().into()),
                })
                .collect(),
            name: self.name.clone(),
            input_order: self.input_order.clone(),
            output_order: self.output_order.clone(),
        }
    }

    pub fn from_proto(proto: &pg::Graph) -> Result<Self, ValueError> {
        let nodes = proto
            .nodes
            .iter()
            .map(node_from_proto)
            .collect::<Result<Vec<_>, _>>()?;

        let edges = proto
            .edges
            .iter()
            .map(|edge| {
                let edge_type = match edge.edge_type.as_ref() {
                    Some(ty) => Some(TierkreisType::from_proto(ty)?),
                    None => None,
                };
                Ok(TierkreisEdge {
                    source: NodeIndex(edge.node_from).port(edge.port_from.clone()),
                    target: NodeIndex(edge.node_to).port(edge.port_to.clone()),
                    edge_type,
                })
            })
            .collect::<Result<Vec<_>, ValueError>>()?;

        Ok(Self {
            name: proto.name.clone(),
            nodes,
            edges,
            input_order: proto.input_order.clone(),
            output_order: proto.output_order.clone(),
        })
    }
}

fn node_to_proto(node: &TierkreisNode) -> pg::Node {
    use pg::node::Node;

    let node = match node {
        TierkreisNode::Input => Node::Input(pg::Empty {}),
        TierkreisNode::Output => Node::Output(pg::Empty {}),
        TierkreisNode::Const(value) => Node::ConstValue(value.to_proto().into()),
        TierkreisNode::Function { name, retry_secs } => Node::Function(pg::FunctionNode {
            name: name.clone(),
            retry_secs: *retry_secs,
        }),
        TierkreisNode::Box { location, graph } => Node::BoxNode(
            pg::BoxNode {
                loc: Some(pg::Location {
                    location: location.clone(),
                }),
                graph: Some(graph.to_proto().into()),
            }
            .into(),
        ),
        TierkreisNode::Match => Node::MatchNode(pg::Empty {}),
        TierkreisNode::Tag(tag) => Node::Tag(tag.clone()),
    };

    pg::Node { node: Some(node) }
}

fn node_from_proto(proto: &pg::Node) -> Result<TierkreisNode, ValueError> {
    use pg::node::Node;

    let node = proto.node.as_ref().ok_or(ValueError::MissingTag("Node"))?;
    Ok(match node {
        Node::Input(_) => TierkreisNode::Input,
        Node::Output(_) => TierkreisNode::Output,
        Node::ConstValue(value) => TierkreisNode::Const(TierkreisValue::from_proto(value)?),
        Node::Function(function) => TierkreisNode::Function {
            name: function.name.clone(),
            retry_secs: function.retry_secs,
        },
        Node::BoxNode(boxed) => {
            let boxed: &pg::BoxNode = boxed;
            let graph = required_field(&boxed.graph, "BoxNode", "graph")?;
            TierkreisNode::Box {
                location: boxed
                    .loc
                    .as_ref()
                    .map(|loc| loc.location.clone())
                    .unwrap_or_default(),
                graph: TierkreisGraph::from_proto(graph)?,
            }
        }
        Node::MatchNode(_) => TierkreisNode::Match,
        Node::Tag(tag) => TierkreisNode::Tag(tag.clone()),
    })
}
