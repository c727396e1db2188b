// reliable/timer.rs - single background thread holding a min-heap of
// retransmission deadlines, replacing one-OS-timer-per-packet.
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Instant;

/// A scheduled deadline for sequence `seq`. `generation` lets a cancelled
/// entry be recognized and discarded cheaply when it fires instead of being
/// removed from the heap up front (removing an arbitrary heap element is
/// O(n); bumping a generation counter and ignoring stale fires is O(1)).
#[derive(Eq, PartialEq)]
struct Entry {
    deadline: Instant,
    seq: u16,
    generation: u64,
}

// `BinaryHeap` is a max-heap; we want the earliest deadline first, so
// reverse the comparison.
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
            .then_with(|| other.generation.cmp(&self.generation))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Shared {
    heap: Mutex<BinaryHeap<Entry>>,
    cond: Condvar,
    running: AtomicBool,
}

/// A background thread that fires a callback once per scheduled
/// `(seq, generation)` deadline, in deadline order, without spawning a
/// thread or `std::thread::sleep` per in-flight packet.
pub struct TimerWheel {
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TimerWheel {
    pub fn spawn<F>(on_fire: F) -> Self
    where
        F: Fn(u16, u64) + Send + Sync + 'static,
    {
        let shared = Arc::new(Shared {
            heap: Mutex::new(BinaryHeap::new()),
            cond: Condvar::new(),
            running: AtomicBool::new(true),
        });

        let worker_shared = Arc::clone(&shared);
        let handle = std::thread::spawn(move || Self::run(worker_shared, on_fire));

        Self {
            shared,
            handle: Mutex::new(Some(handle)),
        }
    }

    fn run<F>(shared: Arc<Shared>, on_fire: F)
    where
        F: Fn(u16, u64) + Send + Sync + 'static,
    {
        let mut heap = shared.heap.lock().unwrap();
        loop {
            if !shared.running.load(AtomicOrdering::Acquire) {
                return;
            }

            match heap.peek() {
                None => {
                    heap = shared.cond.wait(heap).unwrap();
                }
                Some(earliest) => {
                    let now = Instant::now();
                    if earliest.deadline <= now {
                        let fired = heap.pop().unwrap();
                        drop(heap);
                        on_fire(fired.seq, fired.generation);
                        heap = shared.heap.lock().unwrap();
                    } else {
                        let wait_for = earliest.deadline - now;
                        let (guard, _timeout) =
                            shared.cond.wait_timeout(heap, wait_for).unwrap();
                        heap = guard;
                    }
                }
            }
        }
    }

    /// Schedules a deadline for `seq` tagged with `generation`; the caller
    /// is expected to discard a fire whose `generation` no longer matches
    /// what it currently has recorded for `seq` (i.e. the entry was
    /// cancelled or superseded before it fired).
    pub fn schedule(&self, seq: u16, generation: u64, deadline: Instant) {
        let mut heap = self.shared.heap.lock().unwrap();
        heap.push(Entry {
            deadline,
            seq,
            generation,
        });
        self.shared.cond.notify_one();
    }

    /// Stops the background thread and joins it. Idempotent — a second
    /// call finds the handle already taken and is a no-op.
    pub fn stop(&self) {
        self.shared.running.store(false, AtomicOrdering::Release);
        self.shared.cond.notify_all();
        if let Some(handle) = self.handle.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for TimerWheel {
    fn drop(&mut self) {
        self.stop();
    }
}
