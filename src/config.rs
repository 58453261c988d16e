//! Solver configuration shared by every construction.
use serde::{Deserialize, Serialize};

/// Options for solving an instance's equation system.
///
/// Deserializes from partial documents; missing fields take their defaults:
///
/// ```
/// use symbolic_model_core::SolverSettings;
/// let settings: SolverSettings = serde_json::from_str(r#"{ "max_solutions": 4 }"#).unwrap();
/// assert!(settings.enforce_assumptions);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Upper bound on the number of branches explored. Values below two are
    /// raised to two, so a second solution is always seen when one exists.
    pub max_solutions: usize,
    /// Reject solutions whose constant values violate variable assumptions.
    pub enforce_assumptions: bool,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self { max_solutions: 16, enforce_assumptions: true }
    }
}

impl SolverSettings {
    /// The number of solutions the solver may collect.
    pub fn branch_limit(&self) -> usize {
        self.max_solutions.max(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_use_defaults() {
        let settings: SolverSettings = serde_json::from_str(r#"{ "enforce_assumptions": false }"#).unwrap();
        assert_eq!(settings.max_solutions, 16);
        assert!(!settings.enforce_assumptions);
    }

    #[test]
    fn test_branch_limit_never_hides_a_second_solution() {
        for max_solutions in [0, 1, 2] {
            let settings = SolverSettings { max_solutions, ..SolverSettings::default() };
            assert_eq!(settings.branch_limit(), 2);
        }
        assert_eq!(SolverSettings::default().branch_limit(), 16);
    }

    #[test]
    fn test_settings_round_trip() {
        let settings = SolverSettings { max_solutions: 2, enforce_assumptions: false };
        let json = serde_json::to_string(&settings).unwrap();
        assert_eq!(serde_json::from_str::<SolverSettings>(&json).unwrap(), settings);
    }
}
