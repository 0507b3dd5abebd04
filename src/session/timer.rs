//! Single-shot countdown with a one-second tick observer.
//!
//! Implemented by monotonic-clock sampling: the running task recomputes
//! the integer ceiling of time left on every wakeup, so emitted ticks are
//! integer, monotone non-increasing, and clamped at zero. Pause freezes
//! the ceiling and suppresses completion; resume re-arms with the frozen
//! remainder; clear aborts the task so nothing fires afterwards.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

pub type TickFn = Arc<dyn Fn(u64) + Send + Sync>;
pub type ExpireFn = Arc<dyn Fn() + Send + Sync>;

pub struct Countdown {
    tick: Option<TickFn>,
    expire: ExpireFn,
    deadline: Instant,
    /// Whole seconds left, snapshotted while paused.
    frozen: Option<u64>,
    task: Option<JoinHandle<()>>,
}

fn ceil_secs(left: Duration) -> u64 {
    let whole = left.as_secs();
    if left.subsec_nanos() > 0 {
        whole + 1
    } else {
        whole
    }
}

impl Countdown {
    /// Start a countdown of `duration`. The first tick (carrying ⌈D⌉)
    /// fires immediately; the completion callback fires at most once.
    pub fn start(duration: Duration, tick: Option<TickFn>, expire: ExpireFn) -> Self {
        let mut countdown = Self {
            tick,
            expire,
            deadline: Instant::now() + duration,
            frozen: None,
            task: None,
        };
        countdown.arm();
        countdown
    }

    fn arm(&mut self) {
        let deadline = self.deadline;
        let tick = self.tick.clone();
        let expire = Arc::clone(&self.expire);
        self.task = Some(tokio::spawn(async move {
            loop {
                let left = deadline.saturating_duration_since(Instant::now());
                if let Some(tick) = &tick {
                    tick(ceil_secs(left));
                }
                if left.is_zero() {
                    expire();
                    return;
                }
                tokio::time::sleep(left.min(Duration::from_secs(1))).await;
            }
        }));
    }

    fn abort_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Freeze the countdown. No further ticks; completion is suppressed.
    pub fn pause(&mut self) {
        if self.frozen.is_some() {
            return;
        }
        self.abort_task();
        let left = self.deadline.saturating_duration_since(Instant::now());
        self.frozen = Some(ceil_secs(left));
    }

    pub fn is_paused(&self) -> bool {
        self.frozen.is_some()
    }

    /// Restart a fresh countdown of the frozen remainder.
    pub fn resume(&mut self) {
        let Some(secs) = self.frozen.take() else {
            return;
        };
        self.deadline = Instant::now() + Duration::from_secs(secs);
        self.arm();
    }

    /// Cancel every future callback. Idempotent.
    pub fn clear(&mut self) {
        self.abort_task();
        self.frozen = None;
        self.deadline = Instant::now();
    }

    /// ⌈time left⌉ whether paused or running; 0 after natural completion.
    pub fn remaining_secs(&self) -> u64 {
        match self.frozen {
            Some(secs) => secs,
            None => ceil_secs(self.deadline.saturating_duration_since(Instant::now())),
        }
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.abort_task();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use super::*;

    struct Probe {
        ticks: Arc<Mutex<Vec<u64>>>,
        completions: Arc<AtomicU32>,
    }

    fn probed(duration_secs: u64) -> (Countdown, Probe) {
        let ticks: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
        let completions = Arc::new(AtomicU32::new(0));
        let tick_sink = Arc::clone(&ticks);
        let done = Arc::clone(&completions);
        let countdown = Countdown::start(
            Duration::from_secs(duration_secs),
            Some(Arc::new(move |secs| {
                tick_sink.lock().unwrap().push(secs);
            })),
            Arc::new(move || {
                done.fetch_add(1, Ordering::SeqCst);
            }),
        );
        (countdown, Probe { ticks, completions })
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_count_down_and_complete_once() {
        let (_countdown, probe) = probed(3);
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(*probe.ticks.lock().unwrap(), vec![3, 2, 1, 0]);
        assert_eq!(probe.completions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn initial_tick_fires_immediately() {
        let (countdown, probe) = probed(30);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(*probe.ticks.lock().unwrap(), vec![30]);
        assert_eq!(countdown.remaining_secs(), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_freezes_remaining_and_suppresses_completion() {
        let (mut countdown, probe) = probed(10);
        tokio::time::sleep(Duration::from_millis(3500)).await;
        countdown.pause();
        let frozen = countdown.remaining_secs();
        assert_eq!(frozen, 7);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(countdown.remaining_secs(), 7);
        assert_eq!(probe.completions.load(Ordering::SeqCst), 0);
        let ticks_while_paused = probe.ticks.lock().unwrap().len();

        countdown.resume();
        tokio::time::sleep(Duration::from_secs(8)).await;
        assert_eq!(probe.completions.load(Ordering::SeqCst), 1);
        assert!(probe.ticks.lock().unwrap().len() > ticks_while_paused);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_cancels_all_callbacks() {
        let (mut countdown, probe) = probed(5);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        countdown.clear();
        countdown.clear();
        let seen = probe.ticks.lock().unwrap().clone();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(*probe.ticks.lock().unwrap(), seen);
        assert_eq!(probe.completions.load(Ordering::SeqCst), 0);
        assert_eq!(countdown.remaining_secs(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_are_monotone_non_increasing() {
        let (_countdown, probe) = probed(6);
        tokio::time::sleep(Duration::from_secs(7)).await;
        let ticks = probe.ticks.lock().unwrap().clone();
        assert!(ticks.windows(2).all(|w| w[0] >= w[1]), "{ticks:?}");
    }
}
