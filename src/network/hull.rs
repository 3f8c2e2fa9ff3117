use egui::{Pos2, Vec2};

use crate::network::{entity::EntityId, network_graph::NetworkGraph};

/// Default padding between a node centre and the hull outline, in model units.
pub const HULL_OFFSET: f32 = 30.0;

/// Outline grouping a network with the servers that are attached only to it.
#[derive(Debug, Clone, PartialEq)]
pub struct HullGroup {
    pub network_id: EntityId,
    pub polygon: Vec<Pos2>,
}

/// Compute one hull per visible network that has at least one singly-attached server.
///
/// Every member point is expanded by `offset` in the four diagonal directions before the
/// hull is taken, so single servers still produce a padded area around the pair.
pub fn hull_groups(graph: &NetworkGraph, offset: f32) -> Vec<HullGroup> {
    let mut groups = Vec::new();
    for (network, network_position) in graph
        .positioned_nodes()
        .filter(|(n, _)| n.data.kind().is_network())
    {
        let members: Vec<Pos2> = graph
            .positioned_nodes()
            .filter_map(|(node, position)| {
                let server = node.data.as_server()?;
                (server.sole_network().map(String::as_str) == Some(network.id()))
                    .then_some(position)
            })
            .collect();
        if members.is_empty() {
            continue;
        }

        let diagonals = [
            Vec2::new(-offset, -offset),
            Vec2::new(-offset, offset),
            Vec2::new(offset, -offset),
            Vec2::new(offset, offset),
        ];
        let points: Vec<Pos2> = std::iter::once(network_position)
            .chain(members)
            .flat_map(|p| diagonals.iter().map(move |d| p + *d))
            .collect();

        groups.push(HullGroup {
            network_id: network.id().to_string(),
            polygon: convex_hull(points),
        });
    }
    groups
}

/// Andrew's monotone chain. Returns the hull in counter-clockwise order without
/// repeating the first point.
pub fn convex_hull(mut points: Vec<Pos2>) -> Vec<Pos2> {
    points.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    points.dedup();
    if points.len() < 3 {
        return points;
    }

    fn cross(o: Pos2, a: Pos2, b: Pos2) -> f32 {
        (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
    }

    let mut lower: Vec<Pos2> = Vec::with_capacity(points.len());
    for p in points.iter() {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], *p) <= 0.0 {
            lower.pop();
        }
        lower.push(*p);
    }

    let mut upper: Vec<Pos2> = Vec::with_capacity(points.len());
    for p in points.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], *p) <= 0.0 {
            upper.pop();
        }
        upper.push(*p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::entity::{Entity, Network, Server};

    #[test]
    fn test_convex_hull_square() {
        let points = vec![
            Pos2::new(0.0, 0.0),
            Pos2::new(1.0, 1.0),
            Pos2::new(2.0, 0.0),
            Pos2::new(2.0, 2.0),
            Pos2::new(0.0, 2.0),
        ];
        let hull = convex_hull(points);
        assert_eq!(hull.len(), 4);
        assert!(!hull.contains(&Pos2::new(1.0, 1.0)));
    }

    #[test]
    fn test_hull_groups_only_singly_attached_servers() {
        let mut graph = NetworkGraph::default();
        for id in ["net1", "net2"] {
            graph.add_node(
                Entity::Network(Network {
                    id: id.to_string(),
                    name: id.to_string(),
                    url: None,
                    status: "ACTIVE".to_string(),
                    subnets: Vec::new(),
                    collapsed: false,
                    instance_count: 0,
                }),
                Some(Pos2::ZERO),
            );
        }
        let server = |id: &str, nets: &[&str]| {
            Entity::Server(Server {
                id: id.to_string(),
                name: id.to_string(),
                url: None,
                status: "ACTIVE".to_string(),
                console: None,
                attached_networks: nets.iter().map(|n| n.to_string()).collect(),
                ip_addresses: Vec::new(),
            })
        };
        graph.add_node(server("srv1", &["net1"]), Some(Pos2::new(100.0, 0.0)));
        graph.add_node(server("srv2", &["net1", "net2"]), Some(Pos2::new(0.0, 100.0)));

        let groups = hull_groups(&graph, 10.0);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].network_id, "net1");
        assert!(groups[0].polygon.contains(&Pos2::new(110.0, 10.0)));
        assert!(!groups[0].polygon.iter().any(|p| p.y > 50.0));
    }
}
