//! Per-module outcomes of a build or probe pass.

use std::fmt;

use serde::Serialize;

use crate::error::{ModuleError, ModuleStatus};

/// Which lifecycle operation a module ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Main,
    Secondary,
    Update,
    /// The module was never called.
    Skipped,
}

impl Phase {
    pub fn name(self) -> &'static str {
        match self {
            Phase::Main => "main",
            Phase::Secondary => "secondary",
            Phase::Update => "update",
            Phase::Skipped => "skipped",
        }
    }
}

/// One module's result in one phase.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleOutcome {
    pub module: &'static str,
    pub phase: Phase,
    pub status: ModuleStatus,
    /// Error message for failed operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ModuleOutcome {
    pub fn new(module: &'static str, phase: Phase, result: &Result<(), ModuleError>) -> Self {
        ModuleOutcome {
            module,
            phase,
            status: ModuleStatus::of(result),
            detail: result.as_ref().err().map(|e| e.to_string()),
        }
    }

    pub fn disabled(module: &'static str) -> Self {
        ModuleOutcome {
            module,
            phase: Phase::Skipped,
            status: ModuleStatus::Disabled,
            detail: None,
        }
    }

    /// Failed operations, ignoring unsupported ones and disabled modules.
    pub fn is_failure(&self) -> bool {
        !matches!(
            self.status,
            ModuleStatus::Success | ModuleStatus::NotSupported | ModuleStatus::Disabled
        )
    }
}

/// Outcomes of every module in one pass, in call order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    /// The module that built the base graph, if any.
    pub main_module: Option<&'static str>,
    pub outcomes: Vec<ModuleOutcome>,
}

impl BuildReport {
    pub fn push(&mut self, outcome: ModuleOutcome) {
        self.outcomes.push(outcome);
    }

    /// The last recorded status of `module`.
    pub fn status_of(&self, module: &str) -> Option<ModuleStatus> {
        self.outcomes
            .iter()
            .rev()
            .find(|o| o.module == module)
            .map(|o| o.status)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ModuleOutcome> {
        self.outcomes.iter().filter(|o| o.is_failure())
    }

    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for outcome in &self.outcomes {
            write!(
                f,
                "{:<12} {:<10} {}",
                outcome.module,
                outcome.phase.name(),
                outcome.status
            )?;
            if let Some(detail) = &outcome.detail {
                write!(f, " ({detail})")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
