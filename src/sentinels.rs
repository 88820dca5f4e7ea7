//! Readiness verdicts a supervisor child prints and `lid start` waits for.
//!
//! The supervisor writes these through its service logger; the detaching
//! controller tails the child's output for them. Both sides must use these
//! constants so the strings cannot drift apart.

pub const READINESS_CHECK_PASSED: &str = "Readiness check passed";
pub const READINESS_CHECK_FAILED: &str = "Readiness check failed";
pub const NO_READINESS_CHECK: &str = "No readiness check, assuming success";

/// Verdict carried by one line of supervisor output, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Ready,
    NotReady,
}

pub fn verdict(line: &str) -> Option<Verdict> {
    if line.contains(READINESS_CHECK_PASSED) || line.contains(NO_READINESS_CHECK) {
        Some(Verdict::Ready)
    } else if line.contains(READINESS_CHECK_FAILED) {
        Some(Verdict::NotReady)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdicts_match_logged_lines() {
        assert_eq!(
            verdict("[api] 2024/05/01 12:00:00 Readiness check passed"),
            Some(Verdict::Ready)
        );
        assert_eq!(
            verdict("[api] 2024/05/01 12:00:00 No readiness check, assuming success"),
            Some(Verdict::Ready)
        );
        assert_eq!(
            verdict("[api] 2024/05/01 12:00:00 Readiness check failed"),
            Some(Verdict::NotReady)
        );
        assert_eq!(verdict("[api] Server started at :8080"), None);
    }
}
