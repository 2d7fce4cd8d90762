//! Reachability components.
//!
//! Spokes that share a hub route-table association can reach each other;
//! reachability is the transitive closure of that relation. Components are
//! found with a depth-first walk over the association graph, using ordered
//! collections so the result never depends on declaration order.

use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};

use crate::topology::types::{HubConfig, RouteTableMode, DEFAULT_HUB_TABLE};

/// A maximal set of mutually reachable spokes and the hub table serving it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub table: String,
    pub spokes: BTreeSet<String>,
}

/// Hub table name for a spoke that belongs to no association group
pub fn isolated_table_name(spoke: &str) -> String {
    format!("isolated-{}", spoke)
}

/// Partition the spokes into reachability components, sorted by table name
pub fn reachability_components(spokes: &BTreeSet<String>, hub: &HubConfig) -> Vec<Component> {
    if spokes.is_empty() {
        return Vec::new();
    }

    if hub.route_table_mode == RouteTableMode::SharedDefault {
        return vec![Component {
            table: DEFAULT_HUB_TABLE.to_string(),
            spokes: spokes.clone(),
        }];
    }

    let graph = build_association_graph(spokes, hub);
    let mut visited: BTreeSet<&str> = BTreeSet::new();
    let mut components = Vec::new();

    for start in spokes {
        if visited.contains(start.as_str()) {
            continue;
        }

        let mut members: BTreeSet<String> = BTreeSet::new();
        let mut stack: Vec<&str> = vec![start.as_str()];
        while let Some(node) = stack.pop() {
            if !visited.insert(node) {
                continue;
            }
            members.insert(node.to_string());
            if let Some(neighbors) = graph.get(node) {
                stack.extend(neighbors.iter().copied().filter(|n| !visited.contains(n)));
            }
        }

        let table = hub
            .associations
            .iter()
            .find(|(_, group)| group.iter().any(|s| members.contains(s)))
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| isolated_table_name(start));

        debug!("Reachability component {}: {:?}", table, members);
        components.push(Component { table, spokes: members });
    }

    components.sort_by(|a, b| a.table.cmp(&b.table));
    components
}

/// Adjacency between spokes that share at least one association group
fn build_association_graph<'a>(
    spokes: &'a BTreeSet<String>,
    hub: &'a HubConfig,
) -> BTreeMap<&'a str, BTreeSet<&'a str>> {
    let mut graph: BTreeMap<&str, BTreeSet<&str>> =
        spokes.iter().map(|s| (s.as_str(), BTreeSet::new())).collect();

    for (group, members) in &hub.associations {
        let known: Vec<&str> = members
            .iter()
            .map(String::as_str)
            .filter(|m| {
                let found = spokes.contains(*m);
                if !found {
                    warn!("Association group {} names unknown spoke {}", group, m);
                }
                found
            })
            .collect();

        for a in &known {
            if let Some(neighbors) = graph.get_mut(a) {
                neighbors.extend(known.iter().copied().filter(|b| b != a));
            }
        }
    }

    graph
}
