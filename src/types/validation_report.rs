use std::fmt;
use std::time::Duration;

/// Detailed validation report returned by
/// [`Validator::validate_detailed()`](crate::Validator::validate_detailed).
///
/// Contains the verdict, the failure paths collected while checking, and the
/// wall-clock duration of the check.
#[derive(Debug, Clone)]
#[must_use]
pub struct ValidationReport {
    valid: bool,
    trace: Vec<String>,
    duration: Duration,
}

impl ValidationReport {
    pub(crate) fn new(valid: bool, trace: Vec<String>, duration: Duration) -> Self {
        Self {
            valid,
            trace,
            duration,
        }
    }

    /// Same as [`Validator::check()`](crate::Validator::check).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Failure paths, innermost first. Empty for validators compiled without
    /// trace collection.
    #[must_use]
    pub fn trace(&self) -> &[String] {
        &self.trace
    }

    /// Wall-clock duration of the check.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "valid: {}", self.valid)?;
        if !self.trace.is_empty() {
            write!(f, ", failed at: [{}]", self.trace.join(", "))?;
        }
        write!(f, ", duration: {:?}", self.duration)?;
        Ok(())
    }
}
