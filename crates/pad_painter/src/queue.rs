//! Per-pad serialization of structural draw operations.
//!
//! Only the head of the queue runs. Every other caller holds a
//! [`DrawTurn`] that resolves once the entries before it were confirmed.

use smol::channel::{self, Receiver, Sender};
use std::cell::RefCell;
use std::collections::VecDeque;
use strum_macros::Display;

/// Reason for a structural draw operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum DrawKind {
    Redraw,
    Resize,
    CanvasResize,
    /// Always queued, never merged with a waiting entry.
    Forced,
}

struct QueueEntry {
    kind: DrawKind,
    wake: Option<Sender<()>>,
}

/// Permission to run a draw operation once [`DrawTurn::ready`] resolves.
///
/// A turn must be awaited and then released with
/// [`DrawQueue::confirm_draw`], otherwise later entries never run.
#[must_use]
pub struct DrawTurn {
    wait: Option<Receiver<()>>,
}

impl DrawTurn {
    /// True when nothing was in flight and the operation may start now.
    pub fn is_immediate(&self) -> bool {
        self.wait.is_none()
    }

    pub async fn ready(self) {
        if let Some(wait) = self.wait {
            // A closed channel means the queue was dropped; run anyway.
            let _ = wait.recv().await;
        }
    }
}

#[derive(Default)]
pub struct DrawQueue {
    entries: RefCell<Option<VecDeque<QueueEntry>>>,
}

impl DrawQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a draw operation.
    ///
    /// Returns `None` when an entry of the same non-forced kind is already
    /// waiting behind the running one; the caller must skip its work.
    pub fn sync_draw(&self, kind: DrawKind) -> Option<DrawTurn> {
        let mut entries = self.entries.borrow_mut();
        let Some(queue) = entries.as_mut() else {
            *entries = Some(VecDeque::from([QueueEntry { kind, wake: None }]));
            return Some(DrawTurn { wait: None });
        };

        if kind != DrawKind::Forced && queue.iter().skip(1).any(|entry| entry.kind == kind) {
            log::debug!("draw of kind {} already queued", kind);
            return None;
        }

        let (wake, wait) = channel::bounded(1);
        queue.push_back(QueueEntry {
            kind,
            wake: Some(wake),
        });
        Some(DrawTurn { wait: Some(wait) })
    }

    /// Finish the running operation and release the next one.
    pub fn confirm_draw(&self) {
        let mut entries = self.entries.borrow_mut();
        let Some(queue) = entries.as_mut() else {
            log::error!("confirm_draw called while no draw operation is in flight");
            return;
        };

        queue.pop_front();
        match queue.front_mut() {
            Some(next) => {
                if let Some(wake) = next.wake.take() {
                    let _ = wake.try_send(());
                }
            }
            None => *entries = None,
        }
    }

    pub fn doing_draw(&self) -> bool {
        self.entries.borrow().is_some()
    }

    /// Number of entries including the running one.
    pub fn len(&self) -> usize {
        self.entries.borrow().as_ref().map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Kind of the running operation, if any.
    pub fn running(&self) -> Option<DrawKind> {
        self.entries
            .borrow()
            .as_ref()
            .and_then(|queue| queue.front().map(|entry| entry.kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn first_request_runs_immediately() {
        let queue = DrawQueue::new();
        assert!(!queue.doing_draw());

        let turn = queue.sync_draw(DrawKind::Redraw).unwrap();
        assert!(turn.is_immediate());
        assert!(queue.doing_draw());
        assert_eq!(queue.running(), Some(DrawKind::Redraw));

        smol::block_on(turn.ready());
        queue.confirm_draw();
        assert!(!queue.doing_draw());
    }

    #[test]
    fn duplicate_waiting_requests_are_dropped() {
        let queue = DrawQueue::new();
        let _running = queue.sync_draw(DrawKind::Resize).unwrap();

        let waiting = queue.sync_draw(DrawKind::Resize);
        assert!(waiting.is_some());
        for _ in 0..10 {
            assert!(queue.sync_draw(DrawKind::Resize).is_none());
        }
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn forced_requests_are_always_queued() {
        let queue = DrawQueue::new();
        let _running = queue.sync_draw(DrawKind::Forced).unwrap();
        let _a = queue.sync_draw(DrawKind::Forced).unwrap();
        let _b = queue.sync_draw(DrawKind::Forced).unwrap();
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn confirm_without_draw_is_not_fatal() {
        let queue = DrawQueue::new();
        queue.confirm_draw();
        assert!(!queue.doing_draw());
    }

    #[test]
    fn at_most_one_operation_in_flight() {
        let ex = smol::LocalExecutor::new();
        let queue = Rc::new(DrawQueue::new());
        let in_flight = Rc::new(Cell::new(0usize));
        let max_seen = Rc::new(Cell::new(0usize));
        let finished = Rc::new(Cell::new(0usize));

        let kinds = [
            DrawKind::Redraw,
            DrawKind::Resize,
            DrawKind::Redraw,
            DrawKind::CanvasResize,
            DrawKind::Forced,
            DrawKind::Resize,
            DrawKind::Forced,
        ];

        smol::block_on(ex.run(async {
            let mut tasks = Vec::new();
            for kind in kinds {
                let Some(turn) = queue.sync_draw(kind) else {
                    continue;
                };
                let queue = queue.clone();
                let in_flight = in_flight.clone();
                let max_seen = max_seen.clone();
                let finished = finished.clone();
                tasks.push(ex.spawn(async move {
                    turn.ready().await;
                    in_flight.set(in_flight.get() + 1);
                    max_seen.set(max_seen.get().max(in_flight.get()));
                    smol::future::yield_now().await;
                    in_flight.set(in_flight.get() - 1);
                    finished.set(finished.get() + 1);
                    queue.confirm_draw();
                }));
            }
            for task in tasks {
                task.await;
            }
        }));

        assert_eq!(max_seen.get(), 1);
        // Only the second waiting Resize was merged
        assert_eq!(finished.get(), 6);
        assert!(!queue.doing_draw());
    }
}
