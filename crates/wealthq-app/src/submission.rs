// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::SubmissionId;

/// Issued submission handed to whoever performs the network call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionTicket {
    pub id: SubmissionId,
    pub question: String,
    /// In-flight submission this one replaced, if any. Its completion will be
    /// dropped.
    pub superseded: Option<SubmissionId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The completion belongs to the latest issued submission.
    Current,
    /// A newer submission was issued, or this one was canceled.
    Stale,
}

/// Sequencing for query submissions.
///
/// Every submission gets a fresh id. Only the most recently issued id may
/// apply its result; anything older is stale. The loading flag is exactly
/// `in_flight.is_some()`, so clearing `in_flight` on finish and cancel is the
/// release on every exit path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubmissionTracker {
    last_issued: SubmissionId,
    in_flight: Option<SubmissionId>,
}

impl SubmissionTracker {
    pub fn begin(&mut self) -> (SubmissionId, Option<SubmissionId>) {
        let id = self.last_issued.next();
        self.last_issued = id;
        let superseded = self.in_flight.replace(id);
        (id, superseded)
    }

    pub fn finish(&mut self, id: SubmissionId) -> Completion {
        if self.in_flight == Some(id) {
            self.in_flight = None;
            Completion::Current
        } else {
            Completion::Stale
        }
    }

    pub fn cancel(&mut self) -> Option<SubmissionId> {
        self.in_flight.take()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn in_flight(&self) -> Option<SubmissionId> {
        self.in_flight
    }
}

/// What happens to a failure once it has been written to the diagnostic log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Keep showing the last good data; the failure is only logged.
    #[default]
    KeepLastKnownGood,
    /// Keep the last good data and also put the failure on the status line.
    SurfaceStatus,
}

impl FailurePolicy {
    pub fn status_message(self, action: &str, error: &str) -> Option<String> {
        match self {
            Self::KeepLastKnownGood => None,
            Self::SurfaceStatus => Some(format!("{action} failed: {error}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Completion, FailurePolicy, SubmissionTracker};
    use crate::SubmissionId;

    #[test]
    fn begin_sets_loading_and_finish_clears_it() {
        let mut tracker = SubmissionTracker::default();
        assert!(!tracker.is_loading());
        assert_eq!(tracker.in_flight(), None);

        let (id, superseded) = tracker.begin();
        assert_eq!(id, SubmissionId::new(1));
        assert_eq!(superseded, None);
        assert!(tracker.is_loading());

        assert_eq!(tracker.finish(id), Completion::Current);
        assert!(!tracker.is_loading());
        assert_eq!(tracker.begin().0, id.next());
    }

    #[test]
    fn newer_submission_makes_older_completion_stale() {
        let mut tracker = SubmissionTracker::default();
        let (first, _) = tracker.begin();
        let (second, superseded) = tracker.begin();
        assert_eq!(superseded, Some(first));

        assert_eq!(tracker.finish(second), Completion::Current);
        assert!(!tracker.is_loading());
        assert_eq!(tracker.finish(first), Completion::Stale);
        assert!(!tracker.is_loading());
    }

    #[test]
    fn stale_completion_does_not_release_newer_flag() {
        let mut tracker = SubmissionTracker::default();
        let (first, _) = tracker.begin();
        let (second, _) = tracker.begin();

        assert_eq!(tracker.finish(first), Completion::Stale);
        assert!(tracker.is_loading());
        assert_eq!(tracker.in_flight(), Some(second));
    }

    #[test]
    fn cancel_releases_flag_and_stales_completion() {
        let mut tracker = SubmissionTracker::default();
        let (id, _) = tracker.begin();

        assert_eq!(tracker.cancel(), Some(id));
        assert!(!tracker.is_loading());
        assert_eq!(tracker.finish(id), Completion::Stale);
        assert_eq!(tracker.cancel(), None);
    }

    #[test]
    fn failure_policy_only_surfaces_when_asked() {
        assert_eq!(
            FailurePolicy::KeepLastKnownGood.status_message("query", "timeout"),
            None
        );
        assert_eq!(
            FailurePolicy::SurfaceStatus.status_message("query", "timeout"),
            Some("query failed: timeout".to_owned())
        );
    }
}
