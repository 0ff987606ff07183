//! Healing decision engine — the Decide stage of the control loop.
//!
//! A pure function from `(snapshot, metrics, predictions)` to an ordered,
//! deduplicated, safety-checked list of actions. Rules fire in a fixed
//! order and every tie-break is total, so identical inputs always produce
//! identical output — the audit trail depends on it.

use std::collections::BTreeSet;

use crate::analysis::connectivity::{component_groups, eccentric_pair};
use crate::analysis::metrics::ConnectivityMetrics;
use crate::config::WardenConfig;
use crate::fleet::types::{NodeId, TopologySnapshot};
use crate::healing::action::{ActionPriority, HealingAction, HealingActionType};
use crate::model::predictor::{PredictedVulnerability, VulnerabilityKind};

/// Turns the analyzed state of the fleet into corrective actions.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    spawn_threshold: f64,
    connect_threshold: f64,
    probability_floor: f64,
    memory_pressure_threshold: f64,
    responsiveness_restart_threshold: f64,
}

impl DecisionEngine {
    /// Build from the warden configuration.
    pub fn from_config(config: &WardenConfig) -> Self {
        Self {
            spawn_threshold: config.spawn_criticality_threshold,
            connect_threshold: config.connect_criticality_threshold,
            probability_floor: config.prediction_probability_floor,
            memory_pressure_threshold: config.memory_pressure_threshold,
            responsiveness_restart_threshold: config.responsiveness_restart_threshold,
        }
    }

    /// Decide the cycle's actions.
    ///
    /// Rule order: critical bottlenecks, then bypass-worthy bottlenecks,
    /// then acted-on predictions, then health rules (memory pressure,
    /// chronic unresponsiveness). The combined list
    /// is deduplicated by `(kind, target)`, demoted where it violates the
    /// critical-implies-reversible invariant, ordered, and stripped of
    /// mutually exclusive same-target actions.
    pub fn decide(
        &self,
        snapshot: &TopologySnapshot,
        metrics: &ConnectivityMetrics,
        predictions: &[PredictedVulnerability],
    ) -> Vec<HealingAction> {
        let mut proposed = Vec::new();

        // Bottleneck rules. The metrics list is already ordered most
        // critical first.
        for bottleneck in &metrics.bottlenecks {
            if bottleneck.criticality > self.spawn_threshold {
                proposed.push(
                    HealingAction::new(
                        HealingActionType::SpawnRedundantAgent,
                        Some(bottleneck.node_id.clone()),
                    )
                    .with_priority(ActionPriority::Critical)
                    .with_impact(bottleneck.criticality)
                    .with_reason(format!(
                        "bottleneck {} has criticality {:.2}, stranding {} nodes if lost",
                        bottleneck.node_id, bottleneck.criticality, bottleneck.affected_node_count
                    )),
                );
            } else if bottleneck.criticality > self.connect_threshold {
                if let Some((a, b)) = bypass_endpoints(snapshot, &bottleneck.node_id) {
                    proposed.push(
                        HealingAction::new(HealingActionType::AddConnection, Some(a))
                            .with_peer(b)
                            .with_priority(ActionPriority::High)
                            .with_impact(bottleneck.criticality)
                            .with_reason(format!(
                                "bypass around bottleneck {} (criticality {:.2})",
                                bottleneck.node_id, bottleneck.criticality
                            )),
                    );
                }
            }
        }

        // Prediction rule: act on anything likelier than the floor, using
        // the fixed kind → action lookup.
        for prediction in predictions {
            if prediction.probability <= self.probability_floor {
                continue;
            }
            match prediction.kind {
                VulnerabilityKind::ConnectivityDegradation => {
                    if let Some((a, b)) = eccentric_pair(snapshot) {
                        proposed.push(
                            HealingAction::new(HealingActionType::AddConnection, Some(a))
                                .with_peer(b)
                                .with_priority(ActionPriority::High)
                                .with_impact(prediction.probability)
                                .with_reason(format!(
                                    "connectivity trending toward partition (p={:.2})",
                                    prediction.probability
                                )),
                        );
                    }
                }
                VulnerabilityKind::AgentDegradation => {
                    if let Some(node) = &prediction.node_id {
                        proposed.push(
                            HealingAction::new(
                                HealingActionType::RestartAgent,
                                Some(node.clone()),
                            )
                            .with_priority(ActionPriority::High)
                            .with_impact(prediction.probability)
                            .with_reason(format!(
                                "responsiveness of {} trending toward unusable (p={:.2})",
                                node, prediction.probability
                            )),
                        );
                    }
                }
            }
        }

        // Health rules. Snapshot health iterates in node order.
        for (node, health) in snapshot.health() {
            if health.memory_utilization > self.memory_pressure_threshold {
                proposed.push(
                    HealingAction::new(HealingActionType::RedistributeLoad, Some(node.clone()))
                        .with_priority(ActionPriority::High)
                        .with_impact(health.memory_utilization)
                        .with_reason(format!(
                            "memory utilization {:.2} on {}",
                            health.memory_utilization, node
                        )),
                );
            }
            if health.responsiveness < self.responsiveness_restart_threshold {
                proposed.push(
                    HealingAction::new(HealingActionType::RestartAgent, Some(node.clone()))
                        .with_priority(ActionPriority::High)
                        .with_impact(1.0 - health.responsiveness)
                        .with_reason(format!(
                            "responsiveness {:.2} on {}",
                            health.responsiveness, node
                        )),
                );
            }
        }

        self.sanitize_and_order(proposed)
    }

    /// Deduplicate, enforce the safety invariant, order, and drop
    /// conflicting same-target actions. Public so callers feeding the
    /// executor from their own sources get the same guarantees.
    pub fn sanitize_and_order(&self, mut actions: Vec<HealingAction>) -> Vec<HealingAction> {
        // One action per (kind, target); first proposal wins.
        let mut seen = BTreeSet::new();
        actions.retain(|action| seen.insert(action.dedup_key()));

        // Critical implies reversible: demote violations instead of ever
        // letting them run as critical.
        for action in &mut actions {
            if !action.is_safe() {
                log::warn!(
                    "demoting critical irreversible {} on {:?} to high",
                    action.action_type,
                    action.target
                );
                action.priority = ActionPriority::High;
                action
                    .reason
                    .push_str(" [demoted: critical actions must be reversible]");
            }
        }

        Self::prioritize(&mut actions);

        // Mutually exclusive kinds aimed at one node: after ordering, the
        // first (highest priority, then impact, then insertion) survives.
        let mut claimed: BTreeSet<NodeId> = BTreeSet::new();
        actions.retain(|action| {
            if !action.action_type.is_exclusive() {
                return true;
            }
            match &action.target {
                Some(target) => {
                    if claimed.contains(target) {
                        log::debug!(
                            "dropping {} on {}: conflicting action already scheduled",
                            action.action_type,
                            target
                        );
                        false
                    } else {
                        claimed.insert(target.clone());
                        true
                    }
                }
                None => true,
            }
        });

        actions
    }

    /// Stable ordering: priority descending, then estimated impact
    /// descending, then insertion order.
    pub fn prioritize(actions: &mut [HealingAction]) {
        actions.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.estimated_impact.total_cmp(&a.estimated_impact))
        });
    }
}

/// Endpoints for a bypass link around an articulation node: the smallest
/// neighbor of `node` in each of the two largest pieces its removal would
/// leave behind. Linking them keeps those pieces connected without `node`.
fn bypass_endpoints(snapshot: &TopologySnapshot, node: &NodeId) -> Option<(NodeId, NodeId)> {
    let neighbors: BTreeSet<&NodeId> = snapshot.neighbors(node).into_iter().collect();
    let pieces = component_groups(snapshot, Some(node));
    let mut anchors = pieces.iter().filter_map(|piece| {
        piece
            .iter()
            .find(|member| neighbors.contains(member))
            .cloned()
    });
    let a = anchors.next()?;
    let b = anchors.next()?;
    Some(if a <= b { (a, b) } else { (b, a) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::BTreeMap;

    use crate::analysis::ConnectivityAnalyzer;
    use crate::fleet::types::{NodeHealthMetrics, TopologyEdge, TopologyType};

    fn snapshot_with_health(
        names: &[&str],
        edges: &[(&str, &str)],
        health: BTreeMap<NodeId, NodeHealthMetrics>,
    ) -> TopologySnapshot {
        TopologySnapshot::new(
            Utc::now(),
            TopologyType::Hybrid,
            names.iter().map(|n| NodeId::from(*n)),
            edges
                .iter()
                .map(|&(a, b)| TopologyEdge::new(NodeId::from(a), NodeId::from(b), 1.0).unwrap()),
            health,
        )
    }

    fn healthy_map(names: &[&str]) -> BTreeMap<NodeId, NodeHealthMetrics> {
        names
            .iter()
            .map(|n| (NodeId::from(*n), NodeHealthMetrics::healthy()))
            .collect()
    }

    fn engine() -> DecisionEngine {
        DecisionEngine::from_config(&WardenConfig::default())
    }

    /// A star whose hub is loaded enough to cross the spawn band.
    fn hot_star() -> TopologySnapshot {
        let names = ["hub", "w1", "w2", "w3", "w4"];
        let mut health = healthy_map(&names);
        health.insert(
            NodeId::from("hub"),
            NodeHealthMetrics::healthy()
                .with_memory_utilization(0.95)
                .unwrap(),
        );
        snapshot_with_health(
            &names,
            &[("hub", "w1"), ("hub", "w2"), ("hub", "w3"), ("hub", "w4")],
            health,
        )
    }

    #[test]
    fn test_critical_bottleneck_spawns_redundancy() {
        let snapshot = hot_star();
        let metrics = ConnectivityAnalyzer::default().analyze(&snapshot);
        assert!(metrics.bottlenecks[0].criticality > 0.8);

        let actions = engine().decide(&snapshot, &metrics, &[]);
        let spawn = actions
            .iter()
            .find(|a| a.action_type == HealingActionType::SpawnRedundantAgent)
            .expect("spawn action expected");
        assert_eq!(spawn.target, Some(NodeId::from("hub")));
        assert_eq!(spawn.priority, ActionPriority::Critical);
        assert!(spawn.reversible);
    }

    #[test]
    fn test_mid_band_bottleneck_gets_bypass_connection() {
        // Path a–b–c: b sits in the (0.5, 0.8] band.
        let names = ["a", "b", "c"];
        let snapshot =
            snapshot_with_health(&names, &[("a", "b"), ("b", "c")], healthy_map(&names));
        let metrics = ConnectivityAnalyzer::default().analyze(&snapshot);
        let criticality = metrics.bottlenecks[0].criticality;
        assert!(criticality > 0.5 && criticality <= 0.8, "got {}", criticality);

        let actions = engine().decide(&snapshot, &metrics, &[]);
        let connect = actions
            .iter()
            .find(|a| a.action_type == HealingActionType::AddConnection)
            .expect("bypass expected");
        // The bypass joins b's two sides directly.
        assert_eq!(connect.target, Some(NodeId::from("a")));
        assert_eq!(connect.peer, Some(NodeId::from("c")));
        assert_eq!(connect.priority, ActionPriority::High);
    }

    #[test]
    fn test_agent_degradation_prediction_restarts_node() {
        let names = ["a", "b", "c"];
        let snapshot = snapshot_with_health(
            &names,
            &[("a", "b"), ("b", "c"), ("a", "c")],
            healthy_map(&names),
        );
        let metrics = ConnectivityAnalyzer::default().analyze(&snapshot);
        let prediction = PredictedVulnerability {
            kind: VulnerabilityKind::AgentDegradation,
            node_id: Some(NodeId::from("b")),
            probability: 0.9,
            time_to_occurrence_ms: 60_000,
            suggested_action: HealingActionType::RestartAgent,
        };

        let actions = engine().decide(&snapshot, &metrics, &[prediction]);
        let restart = actions
            .iter()
            .find(|a| a.action_type == HealingActionType::RestartAgent)
            .expect("restart expected");
        assert_eq!(restart.target, Some(NodeId::from("b")));
        // Restarts lose state: never critical, merely high.
        assert_eq!(restart.priority, ActionPriority::High);
        assert!(!restart.reversible);
    }

    #[test]
    fn test_low_probability_predictions_are_ignored() {
        let names = ["a", "b"];
        let snapshot = snapshot_with_health(&names, &[("a", "b")], healthy_map(&names));
        let metrics = ConnectivityAnalyzer::default().analyze(&snapshot);
        let prediction = PredictedVulnerability {
            kind: VulnerabilityKind::AgentDegradation,
            node_id: Some(NodeId::from("a")),
            probability: 0.3,
            time_to_occurrence_ms: 60_000,
            suggested_action: HealingActionType::RestartAgent,
        };
        assert!(engine().decide(&snapshot, &metrics, &[prediction]).is_empty());
    }

    #[test]
    fn test_memory_pressure_redistributes_load() {
        let names = ["a", "b"];
        let mut health = healthy_map(&names);
        health.insert(
            NodeId::from("a"),
            NodeHealthMetrics::healthy()
                .with_memory_utilization(0.97)
                .unwrap(),
        );
        let snapshot = snapshot_with_health(&names, &[("a", "b")], health);
        let metrics = ConnectivityAnalyzer::default().analyze(&snapshot);

        let actions = engine().decide(&snapshot, &metrics, &[]);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action_type, HealingActionType::RedistributeLoad);
        assert_eq!(actions[0].target, Some(NodeId::from("a")));
    }

    #[test]
    fn test_chronically_unresponsive_node_is_restarted() {
        let names = ["a", "b", "c"];
        let mut health = healthy_map(&names);
        health.insert(
            NodeId::from("b"),
            NodeHealthMetrics::healthy().with_responsiveness(0.2).unwrap(),
        );
        let snapshot = snapshot_with_health(
            &names,
            &[("a", "b"), ("b", "c"), ("a", "c")],
            health,
        );
        let metrics = ConnectivityAnalyzer::default().analyze(&snapshot);

        let actions = engine().decide(&snapshot, &metrics, &[]);
        let restart = actions
            .iter()
            .find(|a| a.action_type == HealingActionType::RestartAgent)
            .expect("restart expected");
        assert_eq!(restart.target, Some(NodeId::from("b")));
        assert_eq!(restart.priority, ActionPriority::High);
    }

    #[test]
    fn test_decide_is_deterministic() {
        let snapshot = hot_star();
        let metrics = ConnectivityAnalyzer::default().analyze(&snapshot);
        let predictions = vec![PredictedVulnerability {
            kind: VulnerabilityKind::AgentDegradation,
            node_id: Some(NodeId::from("w1")),
            probability: 0.8,
            time_to_occurrence_ms: 30_000,
            suggested_action: HealingActionType::RestartAgent,
        }];

        let engine = engine();
        let first = engine.decide(&snapshot, &metrics, &predictions);
        let second = engine.decide(&snapshot, &metrics, &predictions);
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn test_dedup_keeps_first_proposal() {
        let engine = engine();
        let duplicate = || {
            HealingAction::new(HealingActionType::RestartAgent, Some(NodeId::from("n")))
                .with_priority(ActionPriority::High)
        };
        let actions = engine.sanitize_and_order(vec![
            duplicate().with_impact(0.9).with_reason("first"),
            duplicate().with_impact(0.1).with_reason("second"),
        ]);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].reason, "first");
    }

    #[test]
    fn test_exclusive_actions_on_same_target_collapse() {
        let engine = engine();
        let target = NodeId::from("n");
        let actions = engine.sanitize_and_order(vec![
            HealingAction::new(HealingActionType::IsolateAgent, Some(target.clone()))
                .with_priority(ActionPriority::High)
                .with_impact(0.4),
            HealingAction::new(HealingActionType::RestartAgent, Some(target.clone()))
                .with_priority(ActionPriority::High)
                .with_impact(0.9),
            HealingAction::new(HealingActionType::SpawnRedundantAgent, Some(target.clone()))
                .with_priority(ActionPriority::Medium),
        ]);
        // Restart (higher impact) beat isolate; spawn is not exclusive
        // and survives alongside.
        let kinds: Vec<_> = actions.iter().map(|a| a.action_type).collect();
        assert_eq!(
            kinds,
            vec![
                HealingActionType::RestartAgent,
                HealingActionType::SpawnRedundantAgent
            ]
        );
    }

    #[test]
    fn test_ordering_by_priority_then_impact_then_insertion() {
        let engine = engine();
        let mk = |kind, priority, impact: f64, reason: &str| {
            HealingAction::new(kind, None)
                .with_priority(priority)
                .with_impact(impact)
                .with_reason(reason)
        };
        let actions = engine.sanitize_and_order(vec![
            mk(HealingActionType::AddConnection, ActionPriority::Medium, 0.9, "m-hi"),
            mk(HealingActionType::PromoteToCoordinator, ActionPriority::High, 0.2, "h-lo"),
            mk(HealingActionType::SpawnRedundantAgent, ActionPriority::Critical, 0.1, "crit"),
            mk(HealingActionType::RedistributeLoad, ActionPriority::High, 0.2, "h-lo-2"),
            mk(HealingActionType::IsolateAgent, ActionPriority::High, 0.8, "h-hi"),
        ]);
        let reasons: Vec<_> = actions.iter().map(|a| a.reason.as_str()).collect();
        assert_eq!(reasons, vec!["crit", "h-hi", "h-lo", "h-lo-2", "m-hi"]);
    }

    #[test]
    fn test_property_no_output_is_ever_critical_and_irreversible() {
        let engine = engine();
        let mut rng = StdRng::seed_from_u64(99);
        let kinds = [
            HealingActionType::SpawnRedundantAgent,
            HealingActionType::AddConnection,
            HealingActionType::RedistributeLoad,
            HealingActionType::RestartAgent,
            HealingActionType::IsolateAgent,
            HealingActionType::PromoteToCoordinator,
            HealingActionType::DemoteCoordinator,
            HealingActionType::TriggerFailover,
        ];
        let priorities = [
            ActionPriority::Low,
            ActionPriority::Medium,
            ActionPriority::High,
            ActionPriority::Critical,
        ];
        for _ in 0..200 {
            let count = rng.gen_range(0..10);
            let actions: Vec<HealingAction> = (0..count)
                .map(|i| {
                    let mut action = HealingAction::new(
                        kinds[rng.gen_range(0..kinds.len())],
                        Some(NodeId::new(format!("n{}", i % 4))),
                    )
                    .with_priority(priorities[rng.gen_range(0..priorities.len())])
                    .with_impact(rng.gen_range(0.0..1.0));
                    // Randomly violate the reversibility default.
                    action.reversible = rng.gen_bool(0.5);
                    action
                })
                .collect();
            for action in engine.sanitize_and_order(actions) {
                assert!(
                    action.is_safe(),
                    "critical irreversible action escaped: {:?}",
                    action
                );
            }
        }
    }
}
