use crate::app::node::{NodeId, NodeTree, TestCallback};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifetimeHook {
    BeforeAll,
    AfterAll,
    BeforeEach,
    AfterEach,
}

impl LifetimeHook {
    pub fn as_str(self) -> &'static str {
        match self {
            LifetimeHook::BeforeAll => "beforeAll",
            LifetimeHook::AfterAll => "afterAll",
            LifetimeHook::BeforeEach => "beforeEach",
            LifetimeHook::AfterEach => "afterEach",
        }
    }
}

impl fmt::Display for LifetimeHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifetimeHook {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "beforeAll" | "before_all" => Ok(LifetimeHook::BeforeAll),
            "afterAll" | "after_all" => Ok(LifetimeHook::AfterAll),
            "beforeEach" | "before_each" => Ok(LifetimeHook::BeforeEach),
            "afterEach" | "after_each" => Ok(LifetimeHook::AfterEach),
            _ => Err(format!("Unknown lifetime hook '{}'", s)),
        }
    }
}

/// Hooks owned by one suite, kept in registration order per hook type.
#[derive(Default, Clone)]
pub struct HookRegistry {
    before_all: Vec<TestCallback>,
    after_all: Vec<TestCallback>,
    before_each: Vec<TestCallback>,
    after_each: Vec<TestCallback>,
}

impl HookRegistry {
    pub fn add(&mut self, hook: LifetimeHook, callback: TestCallback) {
        self.partition_mut(hook).push(callback);
    }

    pub fn get(&self, hook: LifetimeHook) -> &[TestCallback] {
        match hook {
            LifetimeHook::BeforeAll => &self.before_all,
            LifetimeHook::AfterAll => &self.after_all,
            LifetimeHook::BeforeEach => &self.before_each,
            LifetimeHook::AfterEach => &self.after_each,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.before_all.is_empty()
            && self.after_all.is_empty()
            && self.before_each.is_empty()
            && self.after_each.is_empty()
    }

    fn partition_mut(&mut self, hook: LifetimeHook) -> &mut Vec<TestCallback> {
        match hook {
            LifetimeHook::BeforeAll => &mut self.before_all,
            LifetimeHook::AfterAll => &mut self.after_all,
            LifetimeHook::BeforeEach => &mut self.before_each,
            LifetimeHook::AfterEach => &mut self.after_each,
        }
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("before_all", &self.before_all.len())
            .field("after_all", &self.after_all.len())
            .field("before_each", &self.before_each.len())
            .field("after_each", &self.after_each.len())
            .finish()
    }
}

impl NodeTree {
    /// `beforeAll`/`afterAll` hooks of a single suite.
    pub fn lifetime_hooks(&self, suite: NodeId, hook: LifetimeHook) -> &[TestCallback] {
        self.node(suite).hooks().get(hook)
    }

    /// `beforeEach` hooks applying to `test`, outermost suite first.
    pub fn before_each_chain(&self, test: NodeId) -> Vec<&TestCallback> {
        let mut suites: Vec<NodeId> = self.ancestors(test).collect();
        suites.reverse();
        self.collect_chain(suites, LifetimeHook::BeforeEach)
    }

    /// `afterEach` hooks applying to `test`, innermost suite first.
    pub fn after_each_chain(&self, test: NodeId) -> Vec<&TestCallback> {
        let suites: Vec<NodeId> = self.ancestors(test).collect();
        self.collect_chain(suites, LifetimeHook::AfterEach)
    }

    fn collect_chain(&self, suites: Vec<NodeId>, hook: LifetimeHook) -> Vec<&TestCallback> {
        suites
            .into_iter()
            .flat_map(|suite| self.node(suite).hooks().get(hook).iter())
            .collect()
    }
}
