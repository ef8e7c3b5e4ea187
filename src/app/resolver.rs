use crate::app::node::{CollectorMode, NodeTree, RunMode};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Resolution {
    pub only_exists: bool,
    pub run: usize,
    pub skip: usize,
    pub todo: usize,
}

/// Annotates every node of a fully collected tree with its [`RunMode`].
///
/// Without any `only` marker the declared mode is taken as is. As soon as one
/// node is declared `only`, the run is focused: only `only` nodes, their
/// ancestors and their descendants run, everything else is skipped. Explicit
/// `skip` and `todo` declarations always win.
pub fn resolve(tree: &mut NodeTree) -> Resolution {
    let size = tree.node_count();
    let declared: Vec<CollectorMode> = tree.ids().map(|id| tree[id].declared_mode()).collect();
    let parents: Vec<Option<usize>> = tree
        .ids()
        .map(|id| tree[id].parent().map(|parent| parent.index()))
        .collect();
    let only_exists = declared.iter().any(|mode| *mode == CollectorMode::Only);

    // Parents precede children in the arena: one backward pass marks
    // ancestors of `only` nodes, one forward pass marks descendants.
    let mut only_below = vec![false; size];
    let mut only_above = vec![false; size];
    if only_exists {
        for index in (1..size).rev() {
            if let Some(parent) = parents[index] {
                if declared[index] == CollectorMode::Only || only_below[index] {
                    only_below[parent] = true;
                }
            }
        }
        for index in 1..size {
            if let Some(parent) = parents[index] {
                only_above[index] = only_above[parent] || declared[parent] == CollectorMode::Only;
            }
        }
    }

    let mut resolution = Resolution {
        only_exists,
        ..Resolution::default()
    };
    let ids: Vec<_> = tree.ids().collect();
    for id in ids {
        let index = id.index();
        let related = only_above[index] || only_below[index];
        let mode = resolve_mode(declared[index], only_exists, related);
        match mode {
            RunMode::Run => resolution.run += 1,
            RunMode::Skip => resolution.skip += 1,
            RunMode::Todo => resolution.todo += 1,
        }
        tree.set_resolved(id, mode);
    }

    debug!(
        "Resolved {} nodes (run: {}, skip: {}, todo: {}, only focus: {})",
        size, resolution.run, resolution.skip, resolution.todo, only_exists
    );
    resolution
}

fn resolve_mode(declared: CollectorMode, only_exists: bool, related: bool) -> RunMode {
    match declared {
        CollectorMode::Skip => RunMode::Skip,
        CollectorMode::Todo => RunMode::Todo,
        CollectorMode::Only => RunMode::Run,
        CollectorMode::Run if !only_exists || related => RunMode::Run,
        CollectorMode::Run => RunMode::Skip,
    }
}
