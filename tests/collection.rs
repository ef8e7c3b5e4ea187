use futures::future::{ready, Ready};
use kurtex::{collect, resolve, CollectorMode, NodeTree, RunMode, Scope, StructuralError, TaskResult};
use pretty_assertions::assert_eq;

fn pass() -> Ready<TaskResult> {
    ready(Ok(()))
}

fn resolved(factory: impl FnOnce(&mut Scope<'_>)) -> NodeTree {
    let mut tree = collect(factory).unwrap();
    resolve(&mut tree);
    tree
}

fn mode_of(tree: &NodeTree, path: &[&str]) -> RunMode {
    let id = tree.find(path).unwrap();
    tree[id].resolved_mode().unwrap()
}

fn collapsed(mode: CollectorMode) -> RunMode {
    match mode {
        CollectorMode::Skip => RunMode::Skip,
        CollectorMode::Todo => RunMode::Todo,
        CollectorMode::Run | CollectorMode::Only => RunMode::Run,
    }
}

#[test]
fn test_without_only_resolved_mode_is_declared_mode() {
    let tree = resolved(|s| {
        s.test("plain", pass);
        s.skip().test("skipped", pass);
        s.todo().test("later", pass);
        s.skip().describe("quiet", |s| {
            s.test("inner", pass);
            s.todo().it("inner later", pass);
        });
        s.describe("loud", |s| {
            s.skip().it("inner skipped", pass);
        });
    });

    for id in tree.ids() {
        let node = &tree[id];
        assert_eq!(
            node.resolved_mode(),
            Some(collapsed(node.declared_mode())),
            "{}",
            tree.full_name(id)
        );
    }
    // A run child of a skipped suite keeps its own mode; the suite gates it at run time.
    assert_eq!(mode_of(&tree, &["quiet", "inner"]), RunMode::Run);
}

#[test]
fn test_only_focuses_ancestors_and_descendants() {
    let tree = resolved(|s| {
        s.describe("outer", |s| {
            s.describe("focused", |s| {
                s.only().test("target", pass);
                s.test("sibling", pass);
            });
            s.test("cousin", pass);
        });
        s.only().describe("group", |s| {
            s.test("member", pass);
            s.describe("deep", |s| {
                s.test("leaf", pass);
                s.skip().test("excluded", pass);
            });
            s.todo().test("planned", pass);
        });
        s.test("unrelated", pass);
        s.todo().test("unrelated later", pass);
    });

    assert_eq!(tree[tree.root()].resolved_mode(), Some(RunMode::Run));
    assert_eq!(mode_of(&tree, &["outer"]), RunMode::Run);
    assert_eq!(mode_of(&tree, &["outer", "focused"]), RunMode::Run);
    assert_eq!(mode_of(&tree, &["outer", "focused", "target"]), RunMode::Run);
    assert_eq!(mode_of(&tree, &["outer", "focused", "sibling"]), RunMode::Skip);
    assert_eq!(mode_of(&tree, &["outer", "cousin"]), RunMode::Skip);

    assert_eq!(mode_of(&tree, &["group"]), RunMode::Run);
    assert_eq!(mode_of(&tree, &["group", "member"]), RunMode::Run);
    assert_eq!(mode_of(&tree, &["group", "deep"]), RunMode::Run);
    assert_eq!(mode_of(&tree, &["group", "deep", "leaf"]), RunMode::Run);
    assert_eq!(mode_of(&tree, &["group", "deep", "excluded"]), RunMode::Skip);
    assert_eq!(mode_of(&tree, &["group", "planned"]), RunMode::Todo);

    assert_eq!(mode_of(&tree, &["unrelated"]), RunMode::Skip);
    assert_eq!(mode_of(&tree, &["unrelated later"]), RunMode::Todo);
}

#[test]
fn test_skip_wins_over_only_ancestry() {
    let tree = resolved(|s| {
        s.skip().describe("muted", |s| {
            s.only().test("focused", pass);
        });
    });

    assert_eq!(mode_of(&tree, &["muted"]), RunMode::Skip);
    assert_eq!(mode_of(&tree, &["muted", "focused"]), RunMode::Run);
}

#[test]
fn test_resolution_counts() {
    let mut tree = collect(|s| {
        s.only().it("x", pass);
        s.it("y", pass);
        s.todo().it("z", pass);
    })
    .unwrap();

    let resolution = resolve(&mut tree);

    assert!(resolution.only_exists);
    // root and x run
    assert_eq!(resolution.run, 2);
    assert_eq!(resolution.skip, 1);
    assert_eq!(resolution.todo, 1);
    assert!(tree.is_resolved());
}

#[test]
fn test_aliases_build_same_tree() {
    let tree = resolved(|s| {
        s.describe("a", |s| s.test("t", pass));
        s.suite("b", |s| s.it("t", pass));
        s.create_node("c", |s| s.it("t", pass));
        s.only().suite("d", |s| s.todo().it("t", pass));
        s.skip().create_node("e", |_| {});
    });

    let names: Vec<String> = tree.children(tree.root()).iter().map(|id| tree.full_name(*id)).collect();
    assert_eq!(names, vec!["a", "b", "c", "d", "e"]);
    for suite in &["a", "b", "c", "d", "e"] {
        assert!(tree[tree.find(&[*suite]).unwrap()].is_suite());
    }
    assert_eq!(tree[tree.find(&["d"]).unwrap()].declared_mode(), CollectorMode::Only);
    assert_eq!(mode_of(&tree, &["d", "t"]), RunMode::Todo);
    assert_eq!(mode_of(&tree, &["e"]), RunMode::Skip);
}

#[test]
fn test_structural_error_stops_collection() {
    let result = collect(|s| {
        s.describe("math", |s| {
            s.it("adds", pass);
            s.it("adds", pass);
        });
        s.it("never registered", pass);
    });

    assert_eq!(
        result.unwrap_err(),
        StructuralError::DuplicateIdentifier {
            parent: "math".to_owned(),
            identifier: "adds".to_owned(),
        }
    );
}

#[test]
fn test_empty_module_collects_root_only() {
    let mut tree = collect(|_| {}).unwrap();
    let resolution = resolve(&mut tree);

    assert_eq!(tree.node_count(), 1);
    assert!(tree.is_blank());
    assert!(!resolution.only_exists);
    assert_eq!(tree.path(tree.root()), Vec::<&str>::new());
}
