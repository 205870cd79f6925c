use serde::Serialize;

/// Result of probing one external dependency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationOutcome {
    pub success: bool,
    pub errors: Vec<String>,
}

impl ValidationOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            errors: Vec::new(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            errors: vec![message.into()],
        }
    }
}

/// Aggregate of every probe: success only when all succeeded, errors in
/// probe order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub success: bool,
    pub errors: Vec<String>,
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self {
            success: true,
            errors: Vec::new(),
        }
    }
}

impl ValidationReport {
    pub fn push(&mut self, outcome: ValidationOutcome) {
        self.success &= outcome.success;
        self.errors.extend(outcome.errors);
    }
}

impl FromIterator<ValidationOutcome> for ValidationReport {
    fn from_iter<I: IntoIterator<Item = ValidationOutcome>>(iter: I) -> Self {
        let mut report = Self::default();
        for outcome in iter {
            report.push(outcome);
        }
        report
    }
}
