//! Connectivity analysis — the Analyze stage of the control loop.
//!
//! A pure function of the snapshot: global min-cut, component census,
//! articulation-style bottleneck detection, clustering, and path length.
//! Nothing here mutates or remembers; the self-model owns memory.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use crate::analysis::metrics::{recommendation_for, BottleneckInfo, ConnectivityMetrics};
use crate::analysis::mincut::stoer_wagner;
use crate::analysis::scoring::{CriticalityInput, CriticalityScorer, WeightedCriticalityScorer};
use crate::fleet::types::{NodeId, TopologySnapshot};

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Computes [`ConnectivityMetrics`] from snapshots.
pub struct ConnectivityAnalyzer {
    scorer: Arc<dyn CriticalityScorer>,
}

impl ConnectivityAnalyzer {
    /// Analyzer with a custom criticality scorer.
    pub fn new(scorer: Arc<dyn CriticalityScorer>) -> Self {
        Self { scorer }
    }

    /// Full analysis of one snapshot.
    pub fn analyze(&self, snapshot: &TopologySnapshot) -> ConnectivityMetrics {
        let n = snapshot.node_count();
        if n < 2 {
            return ConnectivityMetrics::undefined(n);
        }

        let components = component_groups(snapshot, None).len();
        let min_cut = if components > 1 {
            // Already partitioned: the cut is free. No point running the
            // contraction on a graph that is falling apart.
            Some(0.0)
        } else {
            Some(stoer_wagner(weight_matrix(snapshot)))
        };

        ConnectivityMetrics {
            min_cut,
            components,
            bottlenecks: self.find_bottlenecks(snapshot),
            avg_path_length: avg_path_length(snapshot),
            clustering_coefficient: clustering_coefficient(snapshot),
        }
    }

    /// Articulation-style bottleneck scan: a node is a bottleneck when its
    /// removal increases the component count. Results are sorted most
    /// critical first.
    pub fn find_bottlenecks(&self, snapshot: &TopologySnapshot) -> Vec<BottleneckInfo> {
        let n = snapshot.node_count();
        if n < 3 {
            return Vec::new();
        }

        let baseline_groups = component_groups(snapshot, None);
        let baseline = baseline_groups.len();
        let component_of: BTreeMap<&NodeId, usize> = baseline_groups
            .iter()
            .enumerate()
            .flat_map(|(idx, group)| group.iter().map(move |node| (node, idx)))
            .collect();

        let mut bottlenecks = Vec::new();
        for node in snapshot.nodes() {
            if snapshot.degree(node) == 0 {
                continue;
            }
            let remainder = component_groups(snapshot, Some(node));
            if remainder.len() <= baseline {
                continue;
            }

            // The node's former component shattered into pieces; everything
            // outside the largest piece is cut off.
            let home = component_of[node];
            let piece_sizes: Vec<usize> = remainder
                .iter()
                .filter(|group| group.first().map(|m| component_of[m] == home).unwrap_or(false))
                .map(|group| group.len())
                .collect();
            let stranded: usize = piece_sizes.iter().sum::<usize>()
                - piece_sizes.iter().copied().max().unwrap_or(0);

            let input = CriticalityInput {
                affected_fraction: stranded as f64 / (n - 1) as f64,
                degree_fraction: snapshot.degree(node) as f64 / (n - 1) as f64,
                load: snapshot
                    .node_health(node)
                    .map(|h| h.memory_utilization)
                    .unwrap_or(0.0),
            };
            let criticality = self.scorer.score(&input);

            bottlenecks.push(BottleneckInfo {
                node_id: node.clone(),
                criticality,
                affected_node_count: stranded,
                recommendation: recommendation_for(criticality),
            });
        }

        bottlenecks.sort_by(|a, b| {
            b.criticality
                .total_cmp(&a.criticality)
                .then_with(|| a.node_id.cmp(&b.node_id))
        });
        bottlenecks
    }
}

impl Default for ConnectivityAnalyzer {
    fn default() -> Self {
        Self::new(Arc::new(WeightedCriticalityScorer::default()))
    }
}

// ---------------------------------------------------------------------------
// Graph helpers
// ---------------------------------------------------------------------------

/// Connected components of the snapshot, optionally excluding one node.
///
/// Each group is sorted; groups are ordered largest first, ties broken by
/// smallest member, so output is deterministic.
pub fn component_groups(snapshot: &TopologySnapshot, skip: Option<&NodeId>) -> Vec<Vec<NodeId>> {
    let adjacency = unweighted_adjacency(snapshot, skip);
    let mut seen: BTreeSet<&NodeId> = BTreeSet::new();
    let mut groups = Vec::new();

    for start in adjacency.keys() {
        if seen.contains(*start) {
            continue;
        }
        let mut group = Vec::new();
        let mut queue = VecDeque::from([*start]);
        seen.insert(*start);
        while let Some(node) = queue.pop_front() {
            group.push(node.clone());
            for neighbor in adjacency.get(node).into_iter().flatten() {
                if seen.insert(*neighbor) {
                    queue.push_back(*neighbor);
                }
            }
        }
        group.sort();
        groups.push(group);
    }

    groups.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    groups
}

fn unweighted_adjacency<'a>(
    snapshot: &'a TopologySnapshot,
    skip: Option<&NodeId>,
) -> BTreeMap<&'a NodeId, Vec<&'a NodeId>> {
    let mut adjacency: BTreeMap<&NodeId, Vec<&NodeId>> = snapshot
        .nodes()
        .iter()
        .filter(|node| skip.map_or(true, |s| *node != s))
        .map(|node| (node, Vec::new()))
        .collect();
    for edge in snapshot.edges() {
        if skip.map_or(false, |s| edge.touches(s)) {
            continue;
        }
        if let Some(list) = adjacency.get_mut(&edge.a) {
            list.push(&edge.b);
        }
        if let Some(list) = adjacency.get_mut(&edge.b) {
            list.push(&edge.a);
        }
    }
    adjacency
}

/// Dense symmetric weight matrix over the snapshot's (sorted) node set.
fn weight_matrix(snapshot: &TopologySnapshot) -> Vec<Vec<f64>> {
    let index: BTreeMap<&NodeId, usize> = snapshot
        .nodes()
        .iter()
        .enumerate()
        .map(|(i, node)| (node, i))
        .collect();
    let n = index.len();
    let mut matrix = vec![vec![0.0; n]; n];
    for edge in snapshot.edges() {
        let (i, j) = (index[&edge.a], index[&edge.b]);
        matrix[i][j] += edge.weight;
        matrix[j][i] += edge.weight;
    }
    matrix
}

/// The pair of nodes that would benefit most from a direct link: the two
/// largest components' smallest members when the fleet is partitioned,
/// otherwise the lexicographically-first pair at maximum hop distance.
/// `None` for fleets with fewer than two nodes.
pub fn eccentric_pair(snapshot: &TopologySnapshot) -> Option<(NodeId, NodeId)> {
    if snapshot.node_count() < 2 {
        return None;
    }
    let groups = component_groups(snapshot, None);
    if groups.len() > 1 {
        let a = groups[0].first()?.clone();
        let b = groups[1].first()?.clone();
        return Some(if a <= b { (a, b) } else { (b, a) });
    }

    let adjacency = unweighted_adjacency(snapshot, None);
    let mut best: Option<(u64, NodeId, NodeId)> = None;
    for source in adjacency.keys() {
        let mut dist: BTreeMap<&NodeId, u64> = BTreeMap::from([(*source, 0)]);
        let mut queue = VecDeque::from([*source]);
        while let Some(node) = queue.pop_front() {
            let d = dist[node];
            for neighbor in adjacency.get(node).into_iter().flatten() {
                if !dist.contains_key(*neighbor) {
                    dist.insert(*neighbor, d + 1);
                    queue.push_back(*neighbor);
                }
            }
        }
        for (target, d) in dist {
            if target <= *source {
                continue;
            }
            let candidate = (d, (*source).clone(), target.clone());
            let better = match &best {
                None => true,
                Some((bd, ba, bb)) => {
                    d > *bd || (d == *bd && (&candidate.1, &candidate.2) < (ba, bb))
                }
            };
            if better {
                best = Some(candidate);
            }
        }
    }
    best.map(|(_, a, b)| (a, b))
}

/// Mean shortest-path hop count over all reachable ordered pairs. Pairs in
/// different components are excluded, not counted as infinite.
fn avg_path_length(snapshot: &TopologySnapshot) -> Option<f64> {
    let adjacency = unweighted_adjacency(snapshot, None);
    let mut total: u64 = 0;
    let mut pairs: u64 = 0;

    for source in adjacency.keys() {
        let mut dist: BTreeMap<&NodeId, u64> = BTreeMap::from([(*source, 0)]);
        let mut queue = VecDeque::from([*source]);
        while let Some(node) = queue.pop_front() {
            let d = dist[node];
            for neighbor in adjacency.get(node).into_iter().flatten() {
                if !dist.contains_key(*neighbor) {
                    dist.insert(*neighbor, d + 1);
                    queue.push_back(*neighbor);
                }
            }
        }
        for (target, d) in dist {
            if target != *source {
                total += d;
                pairs += 1;
            }
        }
    }

    if pairs == 0 {
        None
    } else {
        Some(total as f64 / pairs as f64)
    }
}

/// Mean local clustering over nodes with degree ≥ 2; lower-degree nodes
/// are excluded from the average, not counted as zero.
fn clustering_coefficient(snapshot: &TopologySnapshot) -> Option<f64> {
    let edge_set: BTreeSet<(&NodeId, &NodeId)> = snapshot
        .edges()
        .iter()
        .map(|edge| (&edge.a, &edge.b))
        .collect();
    let linked = |x: &NodeId, y: &NodeId| {
        let pair = if x <= y { (x, y) } else { (y, x) };
        edge_set.contains(&pair)
    };

    let mut sum = 0.0;
    let mut count = 0usize;
    for node in snapshot.nodes() {
        let neighbors = snapshot.neighbors(node);
        let k = neighbors.len();
        if k < 2 {
            continue;
        }
        let mut links = 0usize;
        for i in 0..k {
            for j in (i + 1)..k {
                if linked(neighbors[i], neighbors[j]) {
                    links += 1;
                }
            }
        }
        sum += 2.0 * links as f64 / (k * (k - 1)) as f64;
        count += 1;
    }

    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::fleet::types::{TopologyEdge, TopologyType};

    fn snapshot(names: &[&str], edges: &[(&str, &str)]) -> TopologySnapshot {
        weighted_snapshot(
            names,
            &edges.iter().map(|&(a, b)| (a, b, 1.0)).collect::<Vec<_>>(),
        )
    }

    fn weighted_snapshot(names: &[&str], edges: &[(&str, &str, f64)]) -> TopologySnapshot {
        TopologySnapshot::new(
            Utc::now(),
            TopologyType::Hybrid,
            names.iter().map(|n| NodeId::from(*n)),
            edges
                .iter()
                .map(|&(a, b, w)| TopologyEdge::new(NodeId::from(a), NodeId::from(b), w).unwrap()),
            Default::default(),
        )
    }

    #[test]
    fn test_empty_and_singleton_are_undefined() {
        let analyzer = ConnectivityAnalyzer::default();
        let empty = analyzer.analyze(&snapshot(&[], &[]));
        assert_eq!(empty.components, 0);
        assert!(empty.min_cut.is_none());

        let single = analyzer.analyze(&snapshot(&["a"], &[]));
        assert_eq!(single.components, 1);
        assert!(single.min_cut.is_none());
        assert!(single.avg_path_length.is_none());
    }

    #[test]
    fn test_complete_graph_min_cut() {
        let names = ["a", "b", "c", "d", "e"];
        let mut edges = Vec::new();
        for i in 0..names.len() {
            for j in (i + 1)..names.len() {
                edges.push((names[i], names[j]));
            }
        }
        let metrics = ConnectivityAnalyzer::default().analyze(&snapshot(&names, &edges));
        assert_eq!(metrics.components, 1);
        assert_relative_eq!(metrics.min_cut.unwrap(), 4.0);
        assert!(metrics.bottlenecks.is_empty());
    }

    #[test]
    fn test_disconnected_graph_has_zero_cut_and_true_component_count() {
        let metrics = ConnectivityAnalyzer::default().analyze(&snapshot(
            &["a", "b", "c", "d", "e"],
            &[("a", "b"), ("c", "d")],
        ));
        assert_eq!(metrics.components, 3);
        assert_eq!(metrics.min_cut, Some(0.0));
    }

    #[test]
    fn test_tree_articulation_node_is_flagged() {
        // Path a–b–c: b is the articulation node.
        let metrics =
            ConnectivityAnalyzer::default().analyze(&snapshot(&["a", "b", "c"], &[("a", "b"), ("b", "c")]));
        assert_eq!(metrics.bottlenecks.len(), 1);
        let b = &metrics.bottlenecks[0];
        assert_eq!(b.node_id, NodeId::from("b"));
        assert!(b.criticality > 0.0);
        assert_eq!(b.affected_node_count, 1);
    }

    #[test]
    fn test_star_hub_strands_all_spokes_but_one_group() {
        let metrics = ConnectivityAnalyzer::default().analyze(&snapshot(
            &["hub", "w1", "w2", "w3", "w4"],
            &[("hub", "w1"), ("hub", "w2"), ("hub", "w3"), ("hub", "w4")],
        ));
        assert_eq!(metrics.bottlenecks.len(), 1);
        let hub = &metrics.bottlenecks[0];
        assert_eq!(hub.node_id, NodeId::from("hub"));
        // Four spokes shatter into singletons; three are outside the
        // largest surviving piece.
        assert_eq!(hub.affected_node_count, 3);
        assert!(hub.criticality > 0.5);
        assert_eq!(metrics.min_cut, Some(1.0));
    }

    #[test]
    fn test_cycle_has_no_bottlenecks() {
        let metrics = ConnectivityAnalyzer::default().analyze(&snapshot(
            &["a", "b", "c", "d"],
            &[("a", "b"), ("b", "c"), ("c", "d"), ("a", "d")],
        ));
        assert!(metrics.bottlenecks.is_empty());
        assert_relative_eq!(metrics.min_cut.unwrap(), 2.0);
    }

    #[test]
    fn test_avg_path_length_on_path_graph() {
        let metrics =
            ConnectivityAnalyzer::default().analyze(&snapshot(&["a", "b", "c"], &[("a", "b"), ("b", "c")]));
        // Ordered pairs: (a,b)=1 (a,c)=2 (b,a)=1 (b,c)=1 (c,a)=2 (c,b)=1.
        assert_relative_eq!(metrics.avg_path_length.unwrap(), 8.0 / 6.0);
    }

    #[test]
    fn test_cross_component_pairs_are_excluded_from_path_length() {
        let metrics = ConnectivityAnalyzer::default()
            .analyze(&snapshot(&["a", "b", "c", "d"], &[("a", "b"), ("c", "d")]));
        assert_relative_eq!(metrics.avg_path_length.unwrap(), 1.0);
    }

    #[test]
    fn test_clustering_triangle_is_one_and_low_degree_excluded() {
        // Triangle plus a pendant: the pendant (degree 1) must not drag
        // the average down.
        let metrics = ConnectivityAnalyzer::default().analyze(&snapshot(
            &["a", "b", "c", "p"],
            &[("a", "b"), ("b", "c"), ("a", "c"), ("a", "p")],
        ));
        // b and c are fully clustered; a has 3 neighbors with 1 link out
        // of 3 possible.
        let expected = (1.0 + 1.0 + 1.0 / 3.0) / 3.0;
        assert_relative_eq!(metrics.clustering_coefficient.unwrap(), expected);
    }

    #[test]
    fn test_clustering_undefined_when_no_node_qualifies() {
        let metrics =
            ConnectivityAnalyzer::default().analyze(&snapshot(&["a", "b"], &[("a", "b")]));
        assert!(metrics.clustering_coefficient.is_none());
    }

    #[test]
    fn test_component_groups_ordering_is_deterministic() {
        let snap = snapshot(&["a", "b", "c", "x", "y", "z"], &[("x", "y"), ("y", "z"), ("a", "b")]);
        let groups = component_groups(&snap, None);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0], vec![NodeId::from("x"), NodeId::from("y"), NodeId::from("z")]);
        assert_eq!(groups[1], vec![NodeId::from("a"), NodeId::from("b")]);
        assert_eq!(groups[2], vec![NodeId::from("c")]);
    }

    #[test]
    fn test_property_partitioned_fleets_always_read_zero_cut() {
        let mut rng = StdRng::seed_from_u64(7);
        let analyzer = ConnectivityAnalyzer::default();
        for _ in 0..30 {
            // Build several disjoint cliques; the true component count is
            // the clique count.
            let cliques = rng.gen_range(2..5);
            let mut names: Vec<String> = Vec::new();
            let mut edges: Vec<(String, String)> = Vec::new();
            for c in 0..cliques {
                let size = rng.gen_range(1..4);
                let members: Vec<String> =
                    (0..size).map(|i| format!("c{}n{}", c, i)).collect();
                for i in 0..members.len() {
                    for j in (i + 1)..members.len() {
                        edges.push((members[i].clone(), members[j].clone()));
                    }
                }
                names.extend(members);
            }
            let name_refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
            let edge_refs: Vec<(&str, &str)> = edges
                .iter()
                .map(|(a, b)| (a.as_str(), b.as_str()))
                .collect();
            let metrics = analyzer.analyze(&snapshot(&name_refs, &edge_refs));
            if names.len() >= 2 {
                assert_eq!(metrics.components, cliques);
                assert_eq!(metrics.min_cut, Some(0.0));
            }
        }
    }

    #[test]
    fn test_eccentric_pair_spans_partition_or_diameter() {
        // Partitioned: connect the two largest components.
        let snap = snapshot(&["a", "b", "x", "y", "z"], &[("a", "b"), ("x", "y"), ("y", "z")]);
        assert_eq!(
            eccentric_pair(&snap),
            Some((NodeId::from("a"), NodeId::from("x")))
        );

        // Connected path: the endpoints are farthest apart.
        let snap = snapshot(&["a", "b", "c", "d"], &[("a", "b"), ("b", "c"), ("c", "d")]);
        assert_eq!(
            eccentric_pair(&snap),
            Some((NodeId::from("a"), NodeId::from("d")))
        );

        assert!(eccentric_pair(&snapshot(&["solo"], &[])).is_none());
    }

    #[test]
    fn test_weighted_min_cut_prefers_light_bridge() {
        let metrics = ConnectivityAnalyzer::default().analyze(&weighted_snapshot(
            &["a", "b", "c", "d"],
            &[("a", "b", 3.0), ("b", "c", 0.25), ("c", "d", 3.0)],
        ));
        assert_relative_eq!(metrics.min_cut.unwrap(), 0.25);
    }
}
