//! Route propagation.
//!
//! Computes the hub-side propagated entries and the spoke-side static
//! entries that make spoke-to-spoke traffic transit the hub, checks every
//! route table for ambiguous destinations, and reports spoke pairs that
//! end up in different reachability components.

use ipnet::Ipv4Net;
use log::{debug, info, warn};
use std::collections::BTreeSet;

use crate::error::{Diagnostic, PlanError, Result};
use crate::ip::cidr::{overlaps, summarize};
use crate::topology::components::{reachability_components, Component};
use crate::topology::types::{
    HubRouteTable, RouteEntry, RouteOrigin, RouteTableId, RouteTarget, SpokeRoutePolicy, TopologyPlan,
};

/// Everything the resolver adds to a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteResolution {
    pub route_tables: Vec<HubRouteTable>,
    pub routes: Vec<RouteEntry>,
    /// Unreachable spoke pairs, each pair sorted
    pub partitions: Vec<(String, String)>,
}

impl RouteResolution {
    /// One warning per unreachable pair
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.partitions
            .iter()
            .map(|(a, b)| Diagnostic::partitioned(a, b))
            .collect()
    }
}

fn default_route() -> Ipv4Net {
    Ipv4Net::default()
}

/// Resolve all routes for an attached topology.
///
/// Only spokes with an attachment take part. The output is sorted and a
/// pure function of the plan.
pub fn resolve_routes(plan: &TopologyPlan) -> Result<RouteResolution> {
    let attached: BTreeSet<String> = plan.attachments.iter().map(|a| a.spoke.clone()).collect();
    let components = reachability_components(&attached, &plan.hub);

    let mut routes = Vec::new();
    for component in &components {
        routes.extend(hub_entries(plan, component));
        routes.extend(spoke_entries(plan, component));
    }

    for spoke in plan.spokes.values().filter(|s| s.internet_access) {
        routes.push(RouteEntry {
            table: RouteTableId::Spoke(spoke.name.clone()),
            destination: default_route(),
            target: RouteTarget::InternetGateway(spoke.name.clone()),
            origin: RouteOrigin::Static,
        });
    }

    routes.sort();
    routes.dedup();
    detect_conflicts(&routes)?;

    let partitions = find_partitions(&components);
    for (a, b) in &partitions {
        warn!("Spokes {} and {} cannot reach each other through the hub", a, b);
    }

    let route_tables = components
        .iter()
        .map(|c| HubRouteTable {
            name: c.table.clone(),
            associated_spokes: c.spokes.iter().cloned().collect(),
        })
        .collect();

    info!(
        "Resolved {} routes in {} hub route table(s), {} unreachable pair(s)",
        routes.len(),
        components.len(),
        partitions.len()
    );
    Ok(RouteResolution {
        route_tables,
        routes,
        partitions,
    })
}

/// Each member's block, propagated into the component's hub table
fn hub_entries(plan: &TopologyPlan, component: &Component) -> Vec<RouteEntry> {
    component
        .spokes
        .iter()
        .filter_map(|name| plan.spokes.get(name))
        .map(|spoke| RouteEntry {
            table: RouteTableId::Hub(component.table.clone()),
            destination: spoke.cidr_block,
            target: RouteTarget::Attachment(spoke.name.clone()),
            origin: RouteOrigin::Propagated,
        })
        .collect()
}

/// Static entries sending peer traffic from each member to its attachment
fn spoke_entries(plan: &TopologyPlan, component: &Component) -> Vec<RouteEntry> {
    let mut entries = Vec::new();

    for name in &component.spokes {
        let peers: Vec<Ipv4Net> = component
            .spokes
            .iter()
            .filter(|peer| *peer != name)
            .filter_map(|peer| plan.spokes.get(peer))
            .map(|peer| peer.cidr_block)
            .collect();
        if peers.is_empty() {
            continue;
        }

        let destinations = match plan.hub.spoke_route_policy {
            SpokeRoutePolicy::PeerCidrs => summarize(&peers),
            SpokeRoutePolicy::DefaultRouteViaHub => vec![default_route()],
        };
        debug!("Spoke {} reaches {} peer(s) via {:?}", name, peers.len(), destinations);

        entries.extend(destinations.into_iter().map(|destination| RouteEntry {
            table: RouteTableId::Spoke(name.clone()),
            destination,
            target: RouteTarget::Attachment(name.clone()),
            origin: RouteOrigin::Static,
        }));
    }

    entries
}

/// Reject tables where longest-prefix matching cannot settle a destination.
///
/// Two entries with different targets conflict when their destinations are
/// identical, or when they overlap and the broader one is not a default
/// route. `routes` must be sorted so each table is contiguous.
pub fn detect_conflicts(routes: &[RouteEntry]) -> Result<()> {
    let mut start = 0;
    while start < routes.len() {
        let table = &routes[start].table;
        let end = routes[start..]
            .iter()
            .position(|r| &r.table != table)
            .map_or(routes.len(), |offset| start + offset);

        let entries = &routes[start..end];
        for (i, a) in entries.iter().enumerate() {
            for b in &entries[i + 1..] {
                if a.target == b.target || !overlaps(&a.destination, &b.destination) {
                    continue;
                }
                let broader = if a.destination.prefix_len() <= b.destination.prefix_len() { a } else { b };
                if a.destination == b.destination || !broader.is_default_route() {
                    return Err(PlanError::RouteConflict {
                        table: table.clone(),
                        first: a.clone(),
                        second: b.clone(),
                    });
                }
            }
        }
        start = end;
    }
    Ok(())
}

/// Every pair of spokes that sit in different components
fn find_partitions(components: &[Component]) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (i, left) in components.iter().enumerate() {
        for right in &components[i + 1..] {
            for a in &left.spokes {
                for b in &right.spokes {
                    let pair = if a <= b { (a.clone(), b.clone()) } else { (b.clone(), a.clone()) };
                    pairs.push(pair);
                }
            }
        }
    }
    pairs.sort();
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ip::allocator::plan_addresses;
    use crate::ip::cidr::contains;
    use crate::topology::builder::build_topology;
    use crate::topology::types::{HubConfig, RouteTableMode, SpokeDefinition};

    fn net(s: &str) -> Ipv4Net {
        s.parse().unwrap()
    }

    fn attached_plan(spokes: Vec<SpokeDefinition>, hub: HubConfig) -> TopologyPlan {
        let mut plan = TopologyPlan::new(&spokes, &hub);
        plan.subnets = plan_addresses(&spokes, &hub).unwrap();
        plan.attachments = build_topology(&spokes, &plan.subnets, &hub).unwrap();
        plan
    }

    fn lab_dev(hub: HubConfig) -> TopologyPlan {
        attached_plan(
            vec![
                SpokeDefinition::new("lab", net("10.200.0.0/16")),
                SpokeDefinition::new("dev", net("10.201.0.0/16")),
            ],
            hub,
        )
    }

    fn rows(routes: &[RouteEntry], table: &RouteTableId) -> Vec<String> {
        routes.iter().filter(|r| &r.table == table).map(|r| r.to_string()).collect()
    }

    #[test]
    fn test_shared_default_lab_dev() {
        let plan = lab_dev(HubConfig::new(64512, &["a", "b"]));
        let resolution = resolve_routes(&plan).unwrap();

        assert_eq!(
            rows(&resolution.routes, &RouteTableId::Hub("default".to_string())),
            vec!["10.200.0.0/16 -> lab-attachment", "10.201.0.0/16 -> dev-attachment"]
        );
        assert_eq!(
            rows(&resolution.routes, &RouteTableId::Spoke("lab".to_string())),
            vec!["10.201.0.0/16 -> lab-attachment"]
        );
        assert_eq!(
            rows(&resolution.routes, &RouteTableId::Spoke("dev".to_string())),
            vec!["10.200.0.0/16 -> dev-attachment"]
        );
        assert!(resolution.partitions.is_empty());
        assert!(resolution.diagnostics().is_empty());
    }

    #[test]
    fn test_hub_routes_scale_linearly() {
        let spokes: Vec<SpokeDefinition> = (0..20)
            .map(|i| SpokeDefinition::new(&format!("s{:02}", i), net(&format!("10.{}.0.0/16", i))))
            .collect();
        let plan = attached_plan(spokes, HubConfig::new(64512, &["a", "b"]));
        let resolution = resolve_routes(&plan).unwrap();

        let hub_routes = resolution
            .routes
            .iter()
            .filter(|r| matches!(r.table, RouteTableId::Hub(_)))
            .count();
        assert_eq!(plan.attachments.len(), 20);
        assert_eq!(hub_routes, 20);
    }

    #[test]
    fn test_peer_aggregation() {
        let plan = attached_plan(
            vec![
                SpokeDefinition::new("a", net("10.0.0.0/16")),
                SpokeDefinition::new("b", net("10.1.0.0/16")),
                SpokeDefinition::new("c", net("10.2.0.0/16")),
                SpokeDefinition::new("d", net("10.3.0.0/16")),
            ],
            HubConfig::new(64512, &["a", "b"]),
        );
        let resolution = resolve_routes(&plan).unwrap();

        // d's peers 10.0-10.2 collapse to a /15 plus a /16
        assert_eq!(
            rows(&resolution.routes, &RouteTableId::Spoke("d".to_string())),
            vec!["10.0.0.0/15 -> d-attachment", "10.2.0.0/16 -> d-attachment"]
        );

        // No spoke ever routes its own block through the hub
        for route in &resolution.routes {
            if let (RouteTableId::Spoke(owner), RouteTarget::Attachment(_)) = (&route.table, &route.target) {
                let own = plan.spokes[owner].cidr_block;
                assert!(!contains(&route.destination, &own), "{} covers {}", route, own);
                assert!(!contains(&own, &route.destination), "{} inside {}", route, own);
            }
        }
    }

    #[test]
    fn test_default_route_policy() {
        let plan = lab_dev(HubConfig::new(64512, &["a", "b"]).with_policy(SpokeRoutePolicy::DefaultRouteViaHub));
        let resolution = resolve_routes(&plan).unwrap();
        assert_eq!(
            rows(&resolution.routes, &RouteTableId::Spoke("lab".to_string())),
            vec!["0.0.0.0/0 -> lab-attachment"]
        );
    }

    #[test]
    fn test_isolated_partition_detected() {
        let hub = HubConfig::new(64512, &["a", "b"]).with_mode(RouteTableMode::PerSpokeIsolated);
        let plan = lab_dev(hub);
        let resolution = resolve_routes(&plan).unwrap();

        assert_eq!(resolution.partitions, vec![("dev".to_string(), "lab".to_string())]);
        let diagnostics = resolution.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, "PartitionedTopology");
        assert!(!diagnostics[0].is_error());

        // Each spoke only sees itself in its own hub table, no spoke routes at all
        assert!(rows(&resolution.routes, &RouteTableId::Spoke("lab".to_string())).is_empty());
        assert_eq!(
            rows(&resolution.routes, &RouteTableId::Hub("isolated-lab".to_string())),
            vec!["10.200.0.0/16 -> lab-attachment"]
        );
    }

    #[test]
    fn test_isolated_with_association() {
        let hub = HubConfig::new(64512, &["a", "b"])
            .with_mode(RouteTableMode::PerSpokeIsolated)
            .with_association("shared", &["lab", "dev"]);
        let resolution = resolve_routes(&lab_dev(hub)).unwrap();
        assert!(resolution.partitions.is_empty());
        assert_eq!(resolution.route_tables.len(), 1);
        assert_eq!(resolution.route_tables[0].name, "shared");
    }

    #[test]
    fn test_internet_gateway_coexists_with_peer_routes() {
        let plan = attached_plan(
            vec![
                SpokeDefinition::new("lab", net("10.200.0.0/16")).with_internet_access(true),
                SpokeDefinition::new("dev", net("10.201.0.0/16")),
            ],
            HubConfig::new(64512, &["a", "b"]),
        );
        let resolution = resolve_routes(&plan).unwrap();
        assert_eq!(
            rows(&resolution.routes, &RouteTableId::Spoke("lab".to_string())),
            vec!["0.0.0.0/0 -> lab-igw", "10.201.0.0/16 -> lab-attachment"]
        );
    }

    #[test]
    fn test_default_route_clashes_with_internet_gateway() {
        let plan = attached_plan(
            vec![
                SpokeDefinition::new("lab", net("10.200.0.0/16")).with_internet_access(true),
                SpokeDefinition::new("dev", net("10.201.0.0/16")),
            ],
            HubConfig::new(64512, &["a", "b"]).with_policy(SpokeRoutePolicy::DefaultRouteViaHub),
        );
        match resolve_routes(&plan) {
            Err(PlanError::RouteConflict { table, .. }) => {
                assert_eq!(table, RouteTableId::Spoke("lab".to_string()));
            }
            other => panic!("expected RouteConflict, got {:?}", other),
        }
    }

    #[test]
    fn test_aggregate_shadowed_by_specific_route() {
        let table = RouteTableId::Spoke("edge".to_string());
        let mut routes = vec![
            RouteEntry {
                table: table.clone(),
                destination: net("10.0.0.0/15"),
                target: RouteTarget::Attachment("edge".to_string()),
                origin: RouteOrigin::Static,
            },
            RouteEntry {
                table: table.clone(),
                destination: net("10.1.0.0/16"),
                target: RouteTarget::InternetGateway("edge".to_string()),
                origin: RouteOrigin::Static,
            },
        ];
        routes.sort();
        assert!(matches!(detect_conflicts(&routes), Err(PlanError::RouteConflict { .. })));

        // Same destinations in different tables never conflict
        routes[1].table = RouteTableId::Spoke("other".to_string());
        routes.sort();
        assert!(detect_conflicts(&routes).is_ok());
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let forward = lab_dev(HubConfig::new(64512, &["a", "b"]));
        let reverse = attached_plan(
            vec![
                SpokeDefinition::new("dev", net("10.201.0.0/16")),
                SpokeDefinition::new("lab", net("10.200.0.0/16")),
            ],
            HubConfig::new(64512, &["b", "a"]),
        );
        assert_eq!(resolve_routes(&forward).unwrap(), resolve_routes(&reverse).unwrap());
    }
}
