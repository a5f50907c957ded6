use std::collections::{HashMap, HashSet};

use crate::lexer::{Token, TokenKind};

/// Builds a graph of `equ` symbol dependencies.
///
/// Each key in `equs` maps to the graph node listing every other `equ` symbol
/// referenced by name within that symbol's token body. Tokens that reference
/// an undefined symbol (a label, or an expression term resolved later by the
/// compiler) are not edges in this graph; only inter-`equ` references matter
/// for cycle detection.
pub fn build_reference_graph(
    equs: &HashMap<String, Vec<Token>>,
) -> HashMap<String, HashSet<String>> {
    let mut graph = HashMap::with_capacity(equs.len());
    for (key, tokens) in equs {
        let mut refs = HashSet::new();
        for tok in tokens {
            if let TokenKind::Text(name) = &tok.kind {
                if equs.contains_key(name) {
                    refs.insert(name.clone());
                }
            }
        }
        graph.insert(key.clone(), refs);
    }
    graph
}

/// Depth-first search for a cycle reachable from `node`, tracking the nodes
/// visited on the current path.
fn node_contains_cycle<'a>(
    node: &'a str,
    graph: &'a HashMap<String, HashSet<String>>,
    visited: &mut Vec<&'a str>,
) -> Option<&'a str> {
    visited.push(node);

    let Some(refs) = graph.get(node) else {
        visited.pop();
        return None;
    };

    for r in refs {
        if visited.contains(&r.as_str()) {
            return Some(r.as_str());
        }
        if let Some(key) = node_contains_cycle(r, graph, visited) {
            return Some(key);
        }
    }

    visited.pop();
    None
}

/// Returns the name of a symbol participating in a reference cycle, if the
/// graph contains one.
#[must_use]
pub fn graph_contains_cycle(
    graph: &HashMap<String, HashSet<String>>,
) -> Option<String> {
    for key in graph.keys() {
        let mut visited = Vec::new();
        if let Some(found) = node_contains_cycle(key, graph, &mut visited) {
            return Some(found.to_owned());
        }
    }
    None
}
