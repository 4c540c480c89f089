// Slot allocation from liveness.
//
// Nodes are the locals and temporaries of one method. `this` and parameters
// are pre-assigned and never coloured.
//
// Construction: for every instruction i that defines d, add edge (d, v) for
// every v in out(i), v != d. A definition interferes even when it is dead, since
// the store still overwrites the slot.
//
// Colouring is greedy in first-appearance order: each node takes the lowest
// colour no coloured neighbour holds. Colour c maps to slot first_free + c.

use crate::liveness::{self, Liveness};
use jmm_syntax::ir::{method_vars, IrMethod, VarTable};
use jmm_syntax::GenerationError;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug, Default)]
pub struct InterferenceGraph {
    /// Colouring order.
    pub nodes: Vec<String>,
    pub adj: BTreeMap<String, BTreeSet<String>>,
}

impl InterferenceGraph {
    pub fn interferes(&self, a: &str, b: &str) -> bool {
        self.adj.get(a).map_or(false, |n| n.contains(b))
    }

    fn add_edge(&mut self, a: &str, b: &str) {
        if a == b || !self.adj.contains_key(a) || !self.adj.contains_key(b) {
            return;
        }
        if let Some(n) = self.adj.get_mut(a) {
            n.insert(b.to_string());
        }
        if let Some(n) = self.adj.get_mut(b) {
            n.insert(a.to_string());
        }
    }
}

pub fn build_interference_graph(method: &IrMethod, lv: &Liveness) -> InterferenceGraph {
    let (fixed, _) = VarTable::with_fixed_slots(method);
    let mut ig = InterferenceGraph::default();
    for (name, _) in method_vars(method) {
        if !fixed.contains(&name) {
            ig.adj.insert(name.clone(), BTreeSet::new());
            ig.nodes.push(name);
        }
    }
    for instr in &method.instructions {
        let Some(d) = instr.kind.defined_var() else {
            continue;
        };
        if let Some(out) = lv.live_out.get(&instr.id) {
            for v in out {
                ig.add_edge(d, v);
            }
        }
    }
    ig
}

/// Colour `method`'s variables into slots. `limit` 0 means as few slots as the
/// colouring finds; otherwise at most `limit` slots after `this` and the
/// parameters.
pub fn allocate(method: &IrMethod, lv: &Liveness, limit: u32) -> Result<VarTable, GenerationError> {
    let ig = build_interference_graph(method, lv);
    let vars: BTreeMap<String, _> = method_vars(method).into_iter().collect();
    let (mut table, first_free) = VarTable::with_fixed_slots(method);

    let mut colour: BTreeMap<&str, u16> = BTreeMap::new();
    let mut needed = 0u16;
    for node in &ig.nodes {
        let taken: BTreeSet<u16> = ig.adj[node]
            .iter()
            .filter_map(|n| colour.get(n.as_str()).copied())
            .collect();
        let c = (0u16..).find(|c| !taken.contains(c)).unwrap_or(0);
        colour.insert(node, c);
        needed = needed.max(c + 1);
        if let Some(ty) = vars.get(node) {
            table.insert(node.clone(), first_free + c, ty.clone());
        }
    }

    if limit > 0 && u32::from(needed) > limit {
        return Err(GenerationError::RegisterLimit {
            method: method.name.clone(),
            needed,
            limit,
        });
    }
    log::debug!(
        "regalloc {}: {} variables in {} slots (+{} fixed)",
        method.name,
        ig.nodes.len(),
        needed,
        first_free
    );
    Ok(table)
}

/// Slot table for emission. `None` gives every variable its own slot.
pub fn var_table(method: &IrMethod, register_allocation: Option<u32>) -> Result<VarTable, GenerationError> {
    match register_allocation {
        None => Ok(VarTable::one_slot_per_var(method)),
        Some(limit) => {
            let lv = liveness::analyze(method);
            allocate(method, &lv, limit)
        }
    }
}
