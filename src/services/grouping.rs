//! Connected components over the candidate graph.
//!
//! Items and variants that reference each other must land in the same output
//! plugin, so each component becomes one [`EquipmentGroup`].

use crate::models::{FormKey, ModKey};
use crate::services::graph::CandidateGraph;
use indexmap::IndexSet;

/// A maximal connected set of items and variants, with its derived counts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquipmentGroup {
    /// Discovery order, starting at 0
    pub id: usize,
    pub equipment: Vec<FormKey>,
    pub variants: Vec<FormKey>,
    pub new_records: usize,
    pub override_records: usize,
    pub required_origins: IndexSet<ModKey>,
}

impl EquipmentGroup {
    /// Short label used in progress messages and errors
    pub fn label(&self) -> String {
        match self.equipment.first() {
            Some(first) if self.equipment.len() > 1 => {
                format!("group #{} ({} and {} more)", self.id + 1, first, self.equipment.len() - 1)
            }
            Some(first) => format!("group #{} ({})", self.id + 1, first),
            None => format!("group #{}", self.id + 1),
        }
    }
}

enum Node<'a> {
    Item(&'a FormKey),
    Variant(&'a FormKey),
}

/// Collect the component containing `start` and mark its items assigned.
///
/// Returns `None` when `start` is unknown or already assigned.
pub fn compile_group(graph: &mut CandidateGraph, start: &FormKey, id: usize) -> Option<EquipmentGroup> {
    if graph.equipment.get(start)?.is_assigned() {
        return None;
    }

    let mut items: IndexSet<FormKey> = IndexSet::new();
    let mut variants: IndexSet<FormKey> = IndexSet::new();
    {
        let mut stack = vec![Node::Item(start)];
        while let Some(node) = stack.pop() {
            match node {
                Node::Item(key) => {
                    if !items.insert(key.clone()) {
                        continue;
                    }
                    if let Some(info) = graph.equipment.get(key) {
                        stack.extend(
                            info.variants
                                .iter()
                                .rev()
                                .filter(|v| !variants.contains(*v))
                                .map(Node::Variant),
                        );
                    }
                }
                Node::Variant(key) => {
                    if !variants.insert(key.clone()) {
                        continue;
                    }
                    if let Some(info) = graph.variants.get(key) {
                        stack.extend(
                            info.equipment
                                .iter()
                                .rev()
                                .filter(|i| !items.contains(*i))
                                .map(Node::Item),
                        );
                    }
                }
            }
        }
    }

    let mut new_records = 0;
    let mut override_records = 0;
    let mut required_origins = IndexSet::new();

    for key in &items {
        if let Some(info) = graph.equipment.get_mut(key) {
            info.assigned = true;
            required_origins.insert(info.record.origin().clone());
        }
    }
    for key in &variants {
        if let Some(info) = graph.variants.get(key) {
            new_records += info.new_records();
            override_records += info.override_records();
            required_origins.insert(info.record.origin().clone());
        }
    }

    Some(EquipmentGroup {
        id,
        equipment: items.into_iter().collect(),
        variants: variants.into_iter().collect(),
        new_records,
        override_records,
        required_origins,
    })
}

/// Partition every item of the graph into groups, in item discovery order.
pub fn compile_groups(graph: &mut CandidateGraph) -> Vec<EquipmentGroup> {
    let keys: Vec<FormKey> = graph.equipment.keys().cloned().collect();
    let mut groups = Vec::new();
    for key in &keys {
        if let Some(group) = compile_group(graph, key, groups.len()) {
            groups.push(group);
        }
    }
    tracing::debug!("Compiled {} groups from {} items", groups.len(), keys.len());
    groups
}
