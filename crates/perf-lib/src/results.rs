//! Pass/fail verification tree of a benchmark run
//!
//! Each scenario collects verifications; groups nest (case → scheduler →
//! output). A failed verification fails every group above it once
//! `refresh_status` has run.

use serde::Serialize;
use std::fmt;

/// Outcome of a verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerificationStatus {
    Succeeded,
    Failed,
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationStatus::Succeeded => f.write_str("SUCCEEDED"),
            VerificationStatus::Failed => f.write_str("FAILED"),
        }
    }
}

/// A verification, or a group of nested verifications
#[derive(Debug, Clone, Serialize)]
pub struct Verification {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub status: VerificationStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Verification>,
}

impl Verification {
    fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        status: VerificationStatus,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            status,
            children: Vec::new(),
        }
    }

    /// Add a nested group and return it for further verifications
    pub fn add_group(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> &mut Verification {
        self.children
            .push(Verification::new(name, description, VerificationStatus::Succeeded));
        let index = self.children.len() - 1;
        &mut self.children[index]
    }

    /// Add a verification, failing this group when `status` is failed
    pub fn add(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        status: VerificationStatus,
    ) -> &mut Verification {
        if status == VerificationStatus::Failed {
            self.status = VerificationStatus::Failed;
        }
        self.children.push(Verification::new(name, description, status));
        let index = self.children.len() - 1;
        &mut self.children[index]
    }

    /// Add a verification from a result, appending the error to the description
    pub fn add_result<E: fmt::Display>(
        &mut self,
        result: &Result<(), E>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> &mut Verification {
        let mut description = description.into();
        match result {
            Ok(()) => self.add(name, description, VerificationStatus::Succeeded),
            Err(err) => {
                if !description.is_empty() {
                    description.push(',');
                }
                description.push_str(&format!(" err: {}", err.to_string().trim()));
                self.add(name, description, VerificationStatus::Failed)
            }
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == VerificationStatus::Failed
    }

    /// Recompute group statuses from the leaves up
    pub fn refresh_status(&mut self) -> VerificationStatus {
        if !self.children.is_empty() {
            let mut status = VerificationStatus::Succeeded;
            for child in &mut self.children {
                if child.refresh_status() == VerificationStatus::Failed {
                    status = VerificationStatus::Failed;
                }
            }
            self.status = status;
        }
        self.status
    }

    fn render(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        write!(f, "{}{} [{}]", "    ".repeat(depth), self.name, self.status)?;
        if !self.description.is_empty() {
            write!(f, " ({})", self.description)?;
        }
        writeln!(f)?;
        for child in &self.children {
            child.render(f, depth + 1)?;
        }
        Ok(())
    }
}

/// Verifications of one scenario
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub name: String,
    pub status: VerificationStatus,
    pub verifications: Vec<Verification>,
}

impl ScenarioResult {
    pub fn add_verification(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        status: VerificationStatus,
    ) {
        if status == VerificationStatus::Failed {
            self.status = VerificationStatus::Failed;
        }
        self.verifications.push(Verification::new(name, description, status));
    }

    pub fn add_verification_group(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> &mut Verification {
        self.verifications
            .push(Verification::new(name, description, VerificationStatus::Succeeded));
        let index = self.verifications.len() - 1;
        &mut self.verifications[index]
    }

    pub fn is_failed(&self) -> bool {
        self.status == VerificationStatus::Failed
    }
}

/// Results of a whole run
#[derive(Debug, Clone, Default, Serialize)]
pub struct Results {
    pub scenarios: Vec<ScenarioResult>,
}

impl Results {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_scenario_results(&mut self, name: impl Into<String>) -> &mut ScenarioResult {
        self.scenarios.push(ScenarioResult {
            name: name.into(),
            status: VerificationStatus::Succeeded,
            verifications: Vec::new(),
        });
        let index = self.scenarios.len() - 1;
        &mut self.scenarios[index]
    }

    pub fn refresh_status(&mut self) {
        for scenario in &mut self.scenarios {
            let mut status = VerificationStatus::Succeeded;
            for verification in &mut scenario.verifications {
                if verification.refresh_status() == VerificationStatus::Failed {
                    status = VerificationStatus::Failed;
                }
            }
            scenario.status = status;
        }
    }

    pub fn is_failed(&self) -> bool {
        self.scenarios.iter().any(ScenarioResult::is_failed)
    }
}

impl fmt::Display for Results {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for scenario in &self.scenarios {
            writeln!(f, "Scenario: {} [{}]", scenario.name, scenario.status)?;
            for verification in &scenario.verifications {
                verification.render(f, 1)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use VerificationStatus::{Failed, Succeeded};

    #[test]
    fn test_failed_leaf_fails_ancestors() {
        let mut results = Results::new();
        let s1 = results.create_scenario_results("s1");
        s1.add_verification("s1-v1", "des...", Succeeded);

        let s2 = results.create_scenario_results("s2");
        s2.add_verification("s2-v1", "des...", Succeeded);
        let vg1 = s2.add_verification_group("s2-vg1", "");
        vg1.add("s2-vg1-1", "des...", Succeeded);
        let vg2 = s2.add_verification_group("s2-vg2", "");
        vg2.add("s2-vg2-1", "des...", Succeeded);
        vg2.add("s2-vg2-2", "des...", Failed);

        let s3 = results.create_scenario_results("s3");
        let vg = s3.add_verification_group("s3-vg1", "");
        vg.add_group("s3-vg1-1", "").add("s3-vg1-1-1", "", Failed);

        results.refresh_status();
        assert_eq!(results.scenarios[0].status, Succeeded);
        assert_eq!(results.scenarios[1].status, Failed);
        assert_eq!(results.scenarios[1].verifications[1].status, Succeeded);
        assert_eq!(results.scenarios[1].verifications[2].status, Failed);
        assert_eq!(results.scenarios[2].status, Failed);
        assert_eq!(results.scenarios[2].verifications[0].status, Failed);
        assert_eq!(results.scenarios[2].verifications[0].children[0].status, Failed);
        assert!(results.is_failed());
    }

    #[test]
    fn test_render_tree() {
        let mut results = Results::new();
        let scenario = results.create_scenario_results("throughput");
        let case = scenario.add_verification_group("Case-0", "100 pods");
        case.add("output chart", "/tmp/out.json", Succeeded);
        results.refresh_status();

        let rendered = results.to_string();
        assert_eq!(
            rendered,
            "Scenario: throughput [SUCCEEDED]\n    Case-0 [SUCCEEDED] (100 pods)\n        output chart [SUCCEEDED] (/tmp/out.json)\n"
        );
    }

    #[test]
    fn test_add_result_appends_error() {
        let mut results = Results::new();
        let scenario = results.create_scenario_results("e2e_perf");
        let case = scenario.add_verification_group("Case-0", "");

        let failure: Result<(), String> = Err("timeout waiting for condition\n".to_string());
        let v = case.add_result(&failure, "test app", "case-0");
        assert_eq!(v.description, "case-0, err: timeout waiting for condition");
        assert!(case.is_failed());

        let ok: Result<(), String> = Ok(());
        assert!(!case.add_result(&ok, "cleanup", "").is_failed());
    }
}
