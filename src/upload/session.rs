//! Remote multipart session state

use crate::backend::{Part, UploadTarget};
use std::fmt;

/// Lifecycle of one upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    /// No bytes read yet, no remote session
    Uninitialized,
    /// Remote session open, parts being uploaded
    Active,
    /// Input exhausted, commit in flight
    Completing,
    /// Discarding the remote session after a failure
    Aborting,
    /// Committed successfully
    Done,
    /// Terminal failure
    Failed,
}

impl UploadState {
    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(self, next: UploadState) -> bool {
        use UploadState::*;
        matches!(
            (self, next),
            (Uninitialized, Active)
                | (Uninitialized, Failed)
                | (Active, Active)
                | (Active, Completing)
                | (Active, Aborting)
                | (Active, Failed)
                | (Completing, Done)
                | (Completing, Failed)
                | (Aborting, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, UploadState::Done | UploadState::Failed)
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UploadState::Uninitialized => "uninitialized",
            UploadState::Active => "active",
            UploadState::Completing => "completing",
            UploadState::Aborting => "aborting",
            UploadState::Done => "done",
            UploadState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Identity and accumulated parts of one open multipart upload
///
/// Parts can only be appended with the next expected number, so the list is
/// always sorted and gap-free.
#[derive(Debug)]
pub struct Session {
    target: UploadTarget,
    parts: Vec<Part>,
    next_part_number: i32,
    total_bytes: u64,
}

impl Session {
    pub fn new(target: UploadTarget) -> Self {
        Self {
            target,
            parts: Vec::new(),
            next_part_number: 1,
            total_bytes: 0,
        }
    }

    pub fn target(&self) -> &UploadTarget {
        &self.target
    }

    pub fn upload_id(&self) -> &str {
        &self.target.upload_id
    }

    /// Completed parts in ascending part-number order
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn next_part_number(&self) -> i32 {
        self.next_part_number
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Append a completed part
    ///
    /// `part` must carry [`next_part_number`](Self::next_part_number); this is
    /// checked in debug builds.
    pub fn record(&mut self, part: Part) {
        debug_assert_eq!(
            part.part_number, self.next_part_number,
            "parts must be recorded in order"
        );
        self.total_bytes += part.size as u64;
        self.next_part_number += 1;
        self.parts.push(part);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(UploadTarget {
            bucket: "backups".to_string(),
            key: "dump.rdb".to_string(),
            upload_id: "abc".to_string(),
        })
    }

    #[test]
    fn test_record_advances_counter() {
        let mut session = session();
        assert_eq!(session.next_part_number(), 1);

        session.record(Part::new(1, "e1".to_string(), 100));
        session.record(Part::new(2, "e2".to_string(), 50));

        assert_eq!(session.next_part_number(), 3);
        assert_eq!(session.total_bytes(), 150);
        let numbers: Vec<i32> = session.parts().iter().map(|p| p.part_number).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert_eq!(session.upload_id(), "abc");
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "parts must be recorded in order")]
    fn test_record_rejects_gaps() {
        let mut session = session();
        session.record(Part::new(2, "e2".to_string(), 1));
    }

    #[test]
    fn test_state_transitions() {
        use UploadState::*;
        assert!(Uninitialized.can_transition_to(Active));
        assert!(Active.can_transition_to(Aborting));
        assert!(Aborting.can_transition_to(Failed));
        assert!(Completing.can_transition_to(Done));
        assert!(!Completing.can_transition_to(Aborting));
        assert!(!Done.can_transition_to(Failed));
        assert!(!Aborting.can_transition_to(Done));
        assert!(Failed.is_terminal());
        assert!(!Active.is_terminal());
    }
}
