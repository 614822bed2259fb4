//! FIFO request queue and response correlator.
//!
//! The device answers commands strictly in the order they were sent,
//! so every inbound non-event frame completes the head of the queue.

use std::collections::VecDeque;

use tracing::error;

use crate::error::EscvpError;
use crate::property::PropertyValue;
use crate::state::completion::Completion;

// ── PendingRequest ───────────────────────────────────────────────

/// A command awaiting its response.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    /// Exact command text, without the terminator.
    pub command: String,
    /// Value reported when the device answers with a bare ack.
    pub new_value: Option<PropertyValue>,
    pub completion: Completion,
}

impl PendingRequest {
    pub fn new(command: impl Into<String>, new_value: Option<PropertyValue>) -> Self {
        Self {
            command: command.into(),
            new_value,
            completion: Completion::new(),
        }
    }

    /// Resolve with the value a bare ack stands for.
    pub fn acknowledge(&self) -> bool {
        self.completion
            .resolve(self.new_value.clone().unwrap_or(PropertyValue::Empty))
    }
}

/// Outcome of [`RequestQueue::enqueue`].
#[derive(Debug, Clone)]
pub enum Enqueued {
    /// A new entry was appended. `previous` is the entry it must wait
    /// for before writing, if any.
    New {
        completion: Completion,
        previous: Option<Completion>,
    },
    /// An identical command is already queued; share its outcome.
    Duplicate(Completion),
}

// ── RequestQueue ─────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RequestQueue {
    entries: VecDeque<PendingRequest>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `command`, or share an identical entry that is still
    /// unsettled. A settled entry only waits for its late answer.
    pub fn enqueue(&mut self, command: &str, new_value: Option<PropertyValue>) -> Enqueued {
        if let Some(existing) = self
            .entries
            .iter()
            .find(|r| r.command == command && !r.completion.is_done())
        {
            return Enqueued::Duplicate(existing.completion.clone());
        }
        let previous = self.entries.back().map(|r| r.completion.clone());
        let request = PendingRequest::new(command, new_value);
        let completion = request.completion.clone();
        self.entries.push_back(request);
        Enqueued::New {
            completion,
            previous,
        }
    }

    /// Remove and return the oldest entry. An empty queue means the
    /// device sent an answer nobody asked for; that is logged only.
    pub fn dequeue_head(&mut self) -> Option<PendingRequest> {
        let head = self.entries.pop_front();
        if head.is_none() {
            error!("request queue is unexpectedly empty");
        }
        head
    }

    /// Remove the entry owning `completion`, if it is still queued.
    pub fn remove(&mut self, completion: &Completion) -> Option<PendingRequest> {
        let index = self
            .entries
            .iter()
            .position(|r| r.completion.same_as(completion))?;
        self.entries.remove(index)
    }

    /// Reject every queued entry with `ConnectionClosed` and clear.
    pub fn reject_all(&mut self) -> usize {
        let count = self.entries.len();
        for request in self.entries.drain(..) {
            request.completion.reject(EscvpError::ConnectionClosed);
        }
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn head(&self) -> Option<&PendingRequest> {
        self.entries.front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_completion(enqueued: Enqueued) -> (Completion, Option<Completion>) {
        match enqueued {
            Enqueued::New {
                completion,
                previous,
            } => (completion, previous),
            Enqueued::Duplicate(_) => panic!("expected a new entry"),
        }
    }

    #[test]
    fn fifo_order_and_predecessor() {
        let mut queue = RequestQueue::new();
        let (first, prev) = new_completion(queue.enqueue("PWR?", None));
        assert!(prev.is_none());
        let (second, prev) = new_completion(queue.enqueue("VOL?", None));
        assert!(prev.unwrap().same_as(&first));

        let head = queue.dequeue_head().unwrap();
        assert_eq!(head.command, "PWR?");
        assert!(head.completion.same_as(&first));
        let head = queue.dequeue_head().unwrap();
        assert!(head.completion.same_as(&second));
        assert!(queue.dequeue_head().is_none());
    }

    #[test]
    fn identical_commands_share_completion() {
        let mut queue = RequestQueue::new();
        let (first, _) = new_completion(queue.enqueue("PWR?", None));
        match queue.enqueue("PWR?", None) {
            Enqueued::Duplicate(shared) => assert!(shared.same_as(&first)),
            Enqueued::New { .. } => panic!("duplicate was enqueued"),
        }
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn settled_entry_is_not_shared() {
        let mut queue = RequestQueue::new();
        let (first, _) = new_completion(queue.enqueue("LAMP?", None));
        first.reject(EscvpError::Cancelled);

        let (second, previous) = new_completion(queue.enqueue("LAMP?", None));
        assert!(!second.same_as(&first));
        assert!(previous.unwrap().same_as(&first));
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn ack_reports_new_value() {
        let mut queue = RequestQueue::new();
        let (completion, _) = new_completion(queue.enqueue("VOL 0", Some(PropertyValue::Integer(0))));
        assert!(queue.dequeue_head().unwrap().acknowledge());
        assert_eq!(completion.wait().await.unwrap(), PropertyValue::Integer(0));

        let (completion, _) = new_completion(queue.enqueue("KEY D1", None));
        queue.dequeue_head().unwrap().acknowledge();
        assert_eq!(completion.wait().await.unwrap(), PropertyValue::Empty);
    }

    #[test]
    fn remove_by_identity() {
        let mut queue = RequestQueue::new();
        let (first, _) = new_completion(queue.enqueue("PWR?", None));
        let (second, _) = new_completion(queue.enqueue("VOL?", None));
        assert!(queue.remove(&second).is_some());
        assert!(queue.remove(&second).is_none());
        assert!(queue.head().unwrap().completion.same_as(&first));
    }

    #[tokio::test]
    async fn reject_all_clears_queue() {
        let mut queue = RequestQueue::new();
        let (first, _) = new_completion(queue.enqueue("PWR?", None));
        let (second, _) = new_completion(queue.enqueue("VOL?", None));
        assert_eq!(queue.reject_all(), 2);
        assert!(queue.is_empty());
        assert!(matches!(first.wait().await, Err(EscvpError::ConnectionClosed)));
        assert!(matches!(second.wait().await, Err(EscvpError::ConnectionClosed)));
    }

    #[test]
    fn late_resolution_is_noop() {
        let mut queue = RequestQueue::new();
        let (completion, _) = new_completion(queue.enqueue("LAMP?", None));
        completion.reject(EscvpError::RequestTimeout {
            command: "LAMP?".into(),
            after: std::time::Duration::from_secs(1),
        });
        let head = queue.dequeue_head().unwrap();
        assert!(!head.completion.resolve(PropertyValue::Integer(10)));
        assert!(matches!(
            completion.peek(),
            Some(Err(EscvpError::RequestTimeout { .. }))
        ));
    }
}
