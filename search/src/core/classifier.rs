//! Turn an execution result into a journal entry (buggy flag + metric).

use crate::core::types::ExecutionResult;

/// Classify a finished execution.
///
/// A run that timed out or exited non-zero is buggy. Otherwise the metric is the
/// last non-empty output line when it parses as a finite number.
pub fn classify_execution(result: &ExecutionResult) -> (bool, Option<f64>) {
    if !result.succeeded() {
        return (true, None);
    }
    (false, parse_metric(&result.term_out))
}

fn parse_metric(term_out: &str) -> Option<f64> {
    let last = term_out.lines().map(str::trim).rfind(|line| !line.is_empty())?;
    let value = last
        .rsplit(|c: char| c.is_whitespace() || c == ':' || c == '=')
        .next()?
        .parse::<f64>()
        .ok()?;
    value.is_finite().then_some(value)
}
