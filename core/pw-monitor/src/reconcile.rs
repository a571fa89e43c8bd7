//! Diffs consecutive snapshots into stream start/stop events.
//!
//! Each relevant node goes through `transition`, a total table keyed on
//! whether the node is currently playing and its reported state. Nodes that
//! were relevant last time but are absent now go down the disappearance path
//! and stop with the name last recorded for them.
//!
//! ```text
//!              running   idle/suspended/paused   other
//! Inactive     Start     Ignore                  Ignore
//! Active       Rename    Stop                    Ignore
//! ```

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{NodeId, NodeState, RelevantNode, StopCause, StreamEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Inactive,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Start,
    Stop,
    /// Keep playing, refresh the recorded application name.
    Rename,
    Ignore,
}

pub fn transition(presence: Presence, state: NodeState) -> Transition {
    match (presence, state) {
        (Presence::Inactive, NodeState::Running) => Transition::Start,
        (Presence::Active, NodeState::Running) => Transition::Rename,
        (Presence::Active, NodeState::Idle | NodeState::Suspended | NodeState::Paused) => {
            Transition::Stop
        }
        (Presence::Inactive, NodeState::Idle | NodeState::Suspended | NodeState::Paused) => {
            Transition::Ignore
        }
        (_, NodeState::Other) => Transition::Ignore,
    }
}

/// Playback state carried between snapshots of one producer session.
#[derive(Debug, Default)]
pub struct Reconciler {
    active: BTreeMap<NodeId, String>,
    known: BTreeSet<NodeId>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Streams currently considered playing, keyed by node id.
    pub fn active_streams(&self) -> &BTreeMap<NodeId, String> {
        &self.active
    }

    /// Relevant node ids from the most recent snapshot.
    pub fn known_nodes(&self) -> &BTreeSet<NodeId> {
        &self.known
    }

    /// Applies one snapshot's relevant nodes and returns the resulting events.
    ///
    /// Events follow `nodes` order, then vanished nodes in ascending id order.
    pub fn reconcile(&mut self, nodes: &[RelevantNode]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        let current: BTreeSet<NodeId> = nodes.iter().map(|node| node.id).collect();

        for node in nodes {
            let presence = if self.active.contains_key(&node.id) {
                Presence::Active
            } else {
                Presence::Inactive
            };

            match transition(presence, node.state) {
                Transition::Start => {
                    self.active.insert(node.id, node.app_name.clone());
                    events.push(StreamEvent::Started {
                        node_id: node.id,
                        app_name: node.app_name.clone(),
                    });
                }
                Transition::Stop => {
                    if let Some(app_name) = self.active.remove(&node.id) {
                        events.push(StreamEvent::Stopped {
                            node_id: node.id,
                            app_name,
                            cause: StopCause::StateChange,
                        });
                    }
                }
                Transition::Rename => {
                    if let Some(app_name) = self.active.get_mut(&node.id) {
                        if *app_name != node.app_name {
                            app_name.clone_from(&node.app_name);
                        }
                    }
                }
                Transition::Ignore => {}
            }
        }

        for node_id in self.known.difference(&current) {
            if let Some(app_name) = self.active.remove(node_id) {
                events.push(StreamEvent::Stopped {
                    node_id: *node_id,
                    app_name,
                    cause: StopCause::Vanished,
                });
            }
        }

        self.known = current;
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(id: NodeId, app: &str) -> RelevantNode {
        RelevantNode::new(id, app, NodeState::Running)
    }

    fn with_state(id: NodeId, app: &str, state: NodeState) -> RelevantNode {
        RelevantNode::new(id, app, state)
    }

    fn started(id: NodeId, app: &str) -> StreamEvent {
        StreamEvent::Started {
            node_id: id,
            app_name: app.to_string(),
        }
    }

    fn stopped(id: NodeId, app: &str, cause: StopCause) -> StreamEvent {
        StreamEvent::Stopped {
            node_id: id,
            app_name: app.to_string(),
            cause,
        }
    }

    fn assert_active_subset_of_known(reconciler: &Reconciler) {
        for id in reconciler.active_streams().keys() {
            assert!(
                reconciler.known_nodes().contains(id),
                "active node {id} missing from known set"
            );
        }
    }

    #[test]
    fn transition_table_is_total() {
        let states = [
            NodeState::Running,
            NodeState::Idle,
            NodeState::Suspended,
            NodeState::Paused,
            NodeState::Other,
        ];
        let inactive: Vec<_> = states
            .iter()
            .map(|state| transition(Presence::Inactive, *state))
            .collect();
        let active: Vec<_> = states
            .iter()
            .map(|state| transition(Presence::Active, *state))
            .collect();

        assert_eq!(
            inactive,
            vec![
                Transition::Start,
                Transition::Ignore,
                Transition::Ignore,
                Transition::Ignore,
                Transition::Ignore
            ]
        );
        assert_eq!(
            active,
            vec![
                Transition::Rename,
                Transition::Stop,
                Transition::Stop,
                Transition::Stop,
                Transition::Ignore
            ]
        );
    }

    #[test]
    fn running_node_starts_once() {
        let mut reconciler = Reconciler::new();
        let events = reconciler.reconcile(&[running(5, "mpv")]);
        assert_eq!(events, vec![started(5, "mpv")]);

        for _ in 0..5 {
            assert!(reconciler.reconcile(&[running(5, "mpv")]).is_empty());
        }
        assert_eq!(reconciler.active_streams().len(), 1);
    }

    #[test]
    fn running_to_idle_stops_exactly_once() {
        let mut reconciler = Reconciler::new();
        reconciler.reconcile(&[running(5, "mpv")]);

        let events = reconciler.reconcile(&[with_state(5, "mpv", NodeState::Idle)]);
        assert_eq!(events, vec![stopped(5, "mpv", StopCause::StateChange)]);

        let events = reconciler.reconcile(&[with_state(5, "mpv", NodeState::Suspended)]);
        assert!(events.is_empty());
        assert!(reconciler.active_streams().is_empty());
        assert!(reconciler.known_nodes().contains(&5));
    }

    #[test]
    fn vanished_node_stops_with_last_recorded_name() {
        let mut reconciler = Reconciler::new();
        reconciler.reconcile(&[running(5, "mpv")]);

        let events = reconciler.reconcile(&[]);
        assert_eq!(events, vec![stopped(5, "mpv", StopCause::Vanished)]);
        assert!(reconciler.known_nodes().is_empty());

        assert!(reconciler.reconcile(&[]).is_empty());
    }

    #[test]
    fn rename_while_running_is_silent_and_reported_on_stop() {
        let mut reconciler = Reconciler::new();
        reconciler.reconcile(&[running(12, "Chromium")]);

        assert!(reconciler.reconcile(&[running(12, "YouTube Music")]).is_empty());
        assert_eq!(
            reconciler.active_streams().get(&12).map(String::as_str),
            Some("YouTube Music")
        );

        let events = reconciler.reconcile(&[with_state(12, "Chromium", NodeState::Paused)]);
        assert_eq!(
            events,
            vec![stopped(12, "YouTube Music", StopCause::StateChange)]
        );
    }

    #[test]
    fn idle_node_never_seen_running_is_ignored() {
        let mut reconciler = Reconciler::new();
        assert!(reconciler
            .reconcile(&[with_state(3, "mpv", NodeState::Idle)])
            .is_empty());
        assert!(reconciler.reconcile(&[]).is_empty());
    }

    #[test]
    fn other_state_keeps_stream_active() {
        let mut reconciler = Reconciler::new();
        reconciler.reconcile(&[running(3, "mpv")]);
        assert!(reconciler
            .reconcile(&[with_state(3, "mpv", NodeState::Other)])
            .is_empty());
        assert!(reconciler.active_streams().contains_key(&3));
    }

    #[test]
    fn events_follow_node_order_then_vanished_ids() {
        let mut reconciler = Reconciler::new();
        reconciler.reconcile(&[running(30, "c"), running(10, "a"), running(20, "b")]);

        let events = reconciler.reconcile(&[
            running(50, "e"),
            with_state(20, "b", NodeState::Idle),
            running(40, "d"),
        ]);
        assert_eq!(
            events,
            vec![
                started(50, "e"),
                stopped(20, "b", StopCause::StateChange),
                started(40, "d"),
                stopped(10, "a", StopCause::Vanished),
                stopped(30, "c", StopCause::Vanished),
            ]
        );
    }

    #[test]
    fn restarted_node_after_stop_starts_again() {
        let mut reconciler = Reconciler::new();
        reconciler.reconcile(&[running(5, "mpv")]);
        reconciler.reconcile(&[with_state(5, "mpv", NodeState::Idle)]);

        let events = reconciler.reconcile(&[running(5, "mpv")]);
        assert_eq!(events, vec![started(5, "mpv")]);
    }

    #[test]
    fn active_set_stays_within_known_set() {
        let mut reconciler = Reconciler::new();
        let snapshots = vec![
            vec![running(1, "a"), running(2, "b")],
            vec![running(2, "b"), with_state(3, "c", NodeState::Idle)],
            vec![running(3, "c"), with_state(2, "b", NodeState::Other)],
            vec![],
            vec![running(1, "a"), running(1, "a2")],
            vec![with_state(1, "a", NodeState::Paused), running(4, "d")],
        ];

        for snapshot in &snapshots {
            reconciler.reconcile(snapshot);
            assert_active_subset_of_known(&reconciler);
        }
    }
}
