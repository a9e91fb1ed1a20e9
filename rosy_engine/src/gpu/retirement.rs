/// Deferred destruction of GPU resources.
///
/// A resource retired while frame slot `n` is being recorded may still be
/// referenced by that slot's submissions. It is handed back by `collect(n)`,
/// which the renderer calls only after slot `n`'s fences were waited on the
/// next time around.

pub struct RetirementQueue<T> {
    slots: Vec<Vec<T>>,
}

impl<T> RetirementQueue<T> {
    pub fn new(slot_count: usize) -> Self {
        Self {
            slots: (0..slot_count.max(1)).map(|_| Vec::new()).collect(),
        }
    }

    /// Queue `item` behind the submissions of `slot`
    pub fn retire(&mut self, slot: usize, item: T) {
        let index = slot % self.slots.len();
        self.slots[index].push(item);
    }

    /// Take everything retired on `slot`, oldest first
    pub fn collect(&mut self, slot: usize) -> Vec<T> {
        let index = slot % self.slots.len();
        std::mem::take(&mut self.slots[index])
    }

    /// Take everything (device idle, shutdown)
    pub fn drain_all(&mut self) -> Vec<T> {
        self.slots.iter_mut().flat_map(std::mem::take).collect()
    }

    pub fn pending(&self) -> usize {
        self.slots.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pending() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_only_returns_own_slot() {
        let mut queue = RetirementQueue::new(2);
        queue.retire(0, "staging-0");
        queue.retire(1, "mesh-1");
        queue.retire(0, "image-0");

        assert_eq!(queue.collect(0), vec!["staging-0", "image-0"]);
        assert_eq!(queue.pending(), 1);
        assert!(queue.collect(0).is_empty());
        assert_eq!(queue.collect(1), vec!["mesh-1"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_all() {
        let mut queue = RetirementQueue::new(2);
        queue.retire(0, 1);
        queue.retire(1, 2);
        queue.retire(1, 3);

        let mut drained = queue.drain_all();
        drained.sort();
        assert_eq!(drained, vec![1, 2, 3]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_slot_index_wraps() {
        let mut queue = RetirementQueue::new(2);
        queue.retire(3, 'a');
        assert_eq!(queue.collect(1), vec!['a']);
    }
}
