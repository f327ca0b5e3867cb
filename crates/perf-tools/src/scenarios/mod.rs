//! Benchmark scenarios
//!
//! Every scenario reads its own section of the configuration, walks its test
//! cases and records one verification group per case. A failing case never
//! stops the scenario: its failure is recorded and the next case runs.

mod common;
mod e2e_perf;
mod node_fairness;
mod throughput;

pub use common::RunContext;
pub use e2e_perf::E2ePerf;
pub use node_fairness::NodeFairness;
pub use throughput::Throughput;

use anyhow::Result;
use async_trait::async_trait;
use perf_lib::ScenarioResult;

/// A named benchmark scenario
#[async_trait]
pub trait Scenario: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Run every configured case, recording outcomes in `result`
    ///
    /// Errors are reserved for problems that invalidate the whole scenario,
    /// such as a missing or malformed configuration section.
    async fn run(&self, ctx: &RunContext, result: &mut ScenarioResult) -> Result<()>;
}

/// Explicit set of available scenarios
pub struct ScenarioRegistry {
    scenarios: Vec<Box<dyn Scenario>>,
}

impl ScenarioRegistry {
    pub fn new() -> Self {
        Self {
            scenarios: Vec::new(),
        }
    }

    /// Registry with the built-in scenarios
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(Throughput));
        registry.register(Box::new(NodeFairness));
        registry.register(Box::new(E2ePerf));
        registry
    }

    /// Register a scenario, replacing any with the same name
    pub fn register(&mut self, scenario: Box<dyn Scenario>) {
        self.scenarios.retain(|s| s.name() != scenario.name());
        self.scenarios.push(scenario);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Scenario> {
        self.scenarios
            .iter()
            .find(|s| s.name() == name)
            .map(|s| s.as_ref())
    }

    /// Names in registration order
    pub fn names(&self) -> Vec<&'static str> {
        self.scenarios.iter().map(|s| s.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Scenario> {
        self.scenarios.iter().map(|s| s.as_ref())
    }

    /// Look up every requested name, failing on the first unknown one
    pub fn resolve(&self, names: &[String]) -> Result<Vec<&dyn Scenario>> {
        names
            .iter()
            .map(|name| {
                self.get(name).ok_or_else(|| {
                    anyhow::anyhow!(
                        "Unknown scenario {} (available: {})",
                        name,
                        self.names().join(", ")
                    )
                })
            })
            .collect()
    }
}

impl Default for ScenarioRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
