//! Strongly connected components of the CFG.
//!
//! Only used to describe irreducible regions in error reports. Loop
//! detection itself never consults this module.

use fixedbitset::FixedBitSet;
use lir_ir::BlockId;

use crate::graph::Cfg;

/// Tarjan's algorithm, iterative.
///
/// Components come out in reverse topological order of the condensed
/// graph; blocks inside a component are ascending.
pub fn strongly_connected_components(cfg: &Cfg) -> Vec<Vec<BlockId>> {
    let n = cfg.num_blocks();
    let mut index: Vec<Option<usize>> = vec![None; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = FixedBitSet::with_capacity(n);
    let mut stack: Vec<usize> = Vec::new();
    let mut components = Vec::new();
    let mut next_index = 0;

    for root in 0..n {
        if index[root].is_some() {
            continue;
        }
        index[root] = Some(next_index);
        lowlink[root] = next_index;
        next_index += 1;
        stack.push(root);
        on_stack.insert(root);

        let mut call: Vec<(usize, usize)> = vec![(root, 0)];
        while let Some(&(v, next)) = call.last() {
            let succs = cfg.successors(BlockId::from_index(v));
            if let Some(w) = succs.get(next).map(|s| s.index()) {
                if let Some(top) = call.last_mut() {
                    top.1 += 1;
                }
                match index[w] {
                    None => {
                        index[w] = Some(next_index);
                        lowlink[w] = next_index;
                        next_index += 1;
                        stack.push(w);
                        on_stack.insert(w);
                        call.push((w, 0));
                    }
                    Some(w_index) if on_stack.contains(w) => {
                        lowlink[v] = lowlink[v].min(w_index);
                    }
                    Some(_) => {}
                }
                continue;
            }

            call.pop();
            if let Some(&(parent, _)) = call.last() {
                lowlink[parent] = lowlink[parent].min(lowlink[v]);
            }
            if Some(lowlink[v]) == index[v] {
                let mut component = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack.set(w, false);
                    component.push(BlockId::from_index(w));
                    if w == v {
                        break;
                    }
                }
                component.sort_unstable();
                components.push(component);
            }
        }
    }

    components
}

/// Whether `component` contains a cycle (more than one block, or a block
/// branching to itself).
pub fn is_cyclic(cfg: &Cfg, component: &[BlockId]) -> bool {
    match component {
        [] => false,
        [single] => cfg.successors(*single).contains(single),
        _ => true,
    }
}

/// Union of the cyclic components containing any of `blocks`, ascending.
pub(crate) fn region_around(cfg: &Cfg, blocks: &[BlockId]) -> Vec<BlockId> {
    let mut region: Vec<BlockId> = strongly_connected_components(cfg)
        .into_iter()
        .filter(|c| is_cyclic(cfg, c) && c.iter().any(|b| blocks.contains(b)))
        .flatten()
        .collect();
    region.sort_unstable();
    region
}

/// Blocks of `region` that control can reach from outside it. The function
/// entry counts as reached from outside.
pub(crate) fn region_entries(cfg: &Cfg, region: &[BlockId]) -> Vec<BlockId> {
    region
        .iter()
        .copied()
        .filter(|&b| {
            b == BlockId::ENTRY
                || cfg
                    .predecessors(b)
                    .iter()
                    .any(|p| region.binary_search(p).is_err())
        })
        .collect()
}
