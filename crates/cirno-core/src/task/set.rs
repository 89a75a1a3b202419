use std::collections::{BTreeMap, VecDeque};

use cirno_model::{TaskId, TaskSpec};

use crate::config::SchedulerConfig;
use crate::task::Task;

/// Every task of one run, owned by the scheduler.
///
/// Live tasks are keyed by id; the queue keeps the order in which tasks entered `Queued`.
/// Terminal tasks move to a finished list and never come back.
#[derive(Debug)]
pub struct TaskSet {
    live: BTreeMap<TaskId, Task>,
    queue: VecDeque<TaskId>,
    finished: Vec<Task>,
    last_id: TaskId,
}

impl Default for TaskSet {
    fn default() -> Self {
        Self {
            live: BTreeMap::new(),
            queue: VecDeque::new(),
            finished: Vec::new(),
            last_id: TaskId::new(0),
        }
    }
}

impl TaskSet {
    /// Add a task at the back of the queue.
    pub(crate) fn insert(&mut self, spec: TaskSpec, config: &SchedulerConfig) -> TaskId {
        let id = self.last_id.next();
        self.last_id = id;
        self.live.insert(id, Task::new(id, spec, config));
        self.queue.push_back(id);
        id
    }

    /// Look up a task, live or finished.
    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.live
            .get(&id)
            .or_else(|| self.finished.iter().find(|t| t.id() == id))
    }

    pub(crate) fn get_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.live.get_mut(&id)
    }

    /// Queued tasks in admission order.
    pub fn queued(&self) -> impl Iterator<Item = &Task> {
        self.queue.iter().filter_map(|id| self.live.get(id))
    }

    /// Non-terminal tasks in id order.
    pub fn live(&self) -> impl Iterator<Item = &Task> {
        self.live.values()
    }

    /// Terminal tasks in the order they finished.
    pub fn finished(&self) -> &[Task] {
        &self.finished
    }

    /// Every task, live or finished, in id order.
    pub fn all(&self) -> Vec<&Task> {
        let mut all: Vec<&Task> = self.live.values().chain(self.finished.iter()).collect();
        all.sort_by_key(|t| t.id());
        all
    }

    pub fn len(&self) -> usize {
        self.live.len() + self.finished.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` once every task is terminal.
    pub fn is_drained(&self) -> bool {
        self.live.is_empty()
    }

    /// Ids of live tasks matching `pred`, in id order.
    pub(crate) fn ids_where(&self, pred: impl Fn(&Task) -> bool) -> Vec<TaskId> {
        self.live
            .values()
            .filter(|t| pred(t))
            .map(Task::id)
            .collect()
    }

    pub(crate) fn dequeue(&mut self, id: TaskId) -> bool {
        match self.queue.iter().position(|q| *q == id) {
            Some(pos) => self.queue.remove(pos).is_some(),
            None => false,
        }
    }

    /// Put a task back at the end of the queue.
    pub(crate) fn enqueue(&mut self, id: TaskId) {
        if self.live.contains_key(&id) && !self.queue.contains(&id) {
            self.queue.push_back(id);
        }
    }

    /// Move a terminal task out of the live set.
    pub(crate) fn retire(&mut self, id: TaskId) {
        let terminal = self
            .live
            .get(&id)
            .is_some_and(|t| t.state().is_terminal());
        if !terminal {
            return;
        }
        self.dequeue(id);
        if let Some(task) = self.live.remove(&id) {
            self.finished.push(task);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use cirno_model::TaskState;

    use super::*;

    fn set_of(n: usize) -> TaskSet {
        let cfg = SchedulerConfig::default();
        let mut set = TaskSet::default();
        for i in 0..n {
            set.insert(TaskSpec::new(format!("cmd{i}")), &cfg);
        }
        set
    }

    #[test]
    fn ids_are_sequential_from_one() {
        let set = set_of(3);
        let ids: Vec<u64> = set.queued().map(|t| t.id().get()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(set.len(), 3);
        assert!(!set.is_drained());
    }

    #[test]
    fn requeued_task_goes_to_the_back() {
        let mut set = set_of(3);
        let first = TaskId::new(1);
        assert!(set.dequeue(first));
        assert!(!set.dequeue(first));
        set.enqueue(first);
        set.enqueue(first);
        let ids: Vec<u64> = set.queued().map(|t| t.id().get()).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn retire_moves_only_terminal_tasks() {
        let mut set = set_of(2);
        let id = TaskId::new(2);
        set.retire(id);
        assert_eq!(set.live().count(), 2);

        if let Some(task) = set.get_mut(id) {
            task.finish(TaskState::Canceled, Instant::now());
        }
        set.retire(id);
        assert_eq!(set.live().count(), 1);
        assert_eq!(set.finished().len(), 1);
        let queued: Vec<u64> = set.queued().map(|t| t.id().get()).collect();
        assert_eq!(queued, vec![1]);
        assert_eq!(set.get(id).map(Task::state), Some(TaskState::Canceled));
        assert_eq!(
            set.all().iter().map(|t| t.id().get()).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }
}
