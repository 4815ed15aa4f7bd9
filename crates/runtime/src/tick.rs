/// Cancelable next-tick task queue.
///
/// Key properties:
/// - Tasks run in submission order (FIFO).
/// - Cancellation does not perturb the order of remaining tasks.
/// - A batch drained by [`TickQueue::drain_batch`] contains only tasks
///   scheduled before the call; tasks pushed while a batch is being
///   processed land in the next batch.
///
/// This is intentionally simple (Vec-backed): the queue holds at most a
/// handful of tasks between two scheduling ticks.

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u64);

#[derive(Debug)]
struct Slot<T> {
    id: TaskId,
    payload: T,
    canceled: bool,
}

#[derive(Debug)]
pub struct TickQueue<T> {
    next_id: u64,
    slots: Vec<Slot<T>>,
}

impl<T> Default for TickQueue<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            slots: Vec::new(),
        }
    }
}

impl<T> TickQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| !s.canceled).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push(&mut self, payload: T) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.slots.push(Slot {
            id,
            payload,
            canceled: false,
        });
        id
    }

    /// Returns `true` if the task was still queued and is now canceled.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        if let Some(slot) = self.slots.iter_mut().find(|s| s.id == id && !s.canceled) {
            slot.canceled = true;
            return true;
        }
        false
    }

    /// Takes every task scheduled before this call, in submission order.
    pub fn drain_batch(&mut self) -> Vec<(TaskId, T)> {
        std::mem::take(&mut self.slots)
            .into_iter()
            .filter(|s| !s.canceled)
            .map(|s| (s.id, s.payload))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::TickQueue;

    #[test]
    fn drains_in_submission_order() {
        let mut q = TickQueue::new();
        q.push("a");
        q.push("b");
        q.push("c");

        let batch: Vec<_> = q.drain_batch().into_iter().map(|(_, p)| p).collect();
        assert_eq!(batch, vec!["a", "b", "c"]);
        assert!(q.is_empty());
    }

    #[test]
    fn cancel_skips_task() {
        let mut q = TickQueue::new();
        let a = q.push("a");
        q.push("b");

        assert!(q.cancel(a));
        assert!(!q.cancel(a));
        assert_eq!(q.len(), 1);

        let batch: Vec<_> = q.drain_batch().into_iter().map(|(_, p)| p).collect();
        assert_eq!(batch, vec!["b"]);
    }

    #[test]
    fn pushes_during_processing_land_in_next_batch() {
        let mut q = TickQueue::new();
        q.push(1);

        let first = q.drain_batch();
        for _ in &first {
            q.push(2);
        }
        assert_eq!(first.len(), 1);

        let second: Vec<_> = q.drain_batch().into_iter().map(|(_, p)| p).collect();
        assert_eq!(second, vec![2]);
    }

    #[test]
    fn cancel_after_drain_is_a_miss() {
        let mut q = TickQueue::new();
        let a = q.push("a");
        q.drain_batch();
        assert!(!q.cancel(a));
    }
}
