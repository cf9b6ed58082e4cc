//! Counting of outstanding requests for the progress display.

use super::progress::Progress;
use core::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use owo_colors::OwoColorize;
use std::sync::Arc;

/// Kinds of requests shown separately in the progress line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TrackedTopic {
    /// Lookups needed to obtain the awesome list itself.
    Source,
    /// Star-count lookups for the listed repositories.
    Repos,
}

impl TrackedTopic {
    const fn name(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Repos => "repos",
        }
    }

    const fn all() -> [Self; 2] {
        [Self::Source, Self::Repos]
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// Display state of a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TopicStatus {
    Active = 0,
    /// Waiting out a rate limit; shown blinking yellow.
    Blocked = 1,
    /// Everything issued has completed; shown green.
    Done = 2,
}

#[derive(Debug, Default)]
struct RequestCounter {
    issued: AtomicU64,
    completed: AtomicU64,
    status: AtomicU8,
}

impl RequestCounter {
    fn snapshot(&self, topic: TrackedTopic) -> TopicSnapshot {
        let status = match self.status.load(Ordering::Relaxed) {
            1 => TopicStatus::Blocked,
            2 => TopicStatus::Done,
            _ => TopicStatus::Active,
        };

        TopicSnapshot {
            topic,
            issued: self.issued.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            status,
        }
    }
}

/// Point-in-time view of one topic, rendered into the progress line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TopicSnapshot {
    topic: TrackedTopic,
    issued: u64,
    completed: u64,
    status: TopicStatus,
}

impl TopicSnapshot {
    fn label(&self) -> String {
        format!("{}/{} {}", self.completed, self.issued, self.topic.name())
    }

    fn render(&self, use_colors: bool, blink_on: bool) -> String {
        let label = self.label();
        match self.status {
            TopicStatus::Done if use_colors => label.green().to_string(),
            TopicStatus::Blocked if use_colors && blink_on => label.yellow().to_string(),
            _ => label,
        }
    }
}

/// Build the `(total, position, message)` triple for topics that have seen any requests.
fn status_line(snapshots: &[TopicSnapshot], use_colors: bool, blink_on: bool) -> (u64, u64, String) {
    let shown: Vec<&TopicSnapshot> = snapshots.iter().filter(|s| s.issued > 0).collect();
    if shown.is_empty() {
        return (0, 0, "No requests".to_string());
    }

    let total = shown.iter().map(|s| s.issued).sum();
    let position = shown.iter().map(|s| s.completed).sum();
    let message = shown.iter().map(|s| s.render(use_colors, blink_on)).collect::<Vec<_>>().join(", ");
    (total, position, message)
}

/// Blocked topics flash on a half-second cadence.
fn blink_phase() -> bool {
    let ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    (ms / 500).is_multiple_of(2)
}

/// Shared request counters feeding a [`Progress`] implementation.
///
/// Clones share the same counters.
#[derive(Clone)]
pub struct RequestTracker {
    counters: Arc<[RequestCounter; 2]>,
    progress: Arc<dyn Progress>,
}

impl core::fmt::Debug for RequestTracker {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RequestTracker")
            .field("counters", &self.counters)
            .field("progress", &"<dyn Progress>")
            .finish()
    }
}

impl RequestTracker {
    #[must_use]
    pub fn new(progress: &Arc<dyn Progress>) -> Self {
        let counters: Arc<[RequestCounter; 2]> = Arc::default();

        let counters_clone = Arc::clone(&counters);
        let use_colors = progress.use_colors();
        progress.set_determinate(Box::new(move || {
            status_line(&Self::snapshots(&counters_clone), use_colors, use_colors && blink_phase())
        }));

        Self {
            counters,
            progress: Arc::clone(progress),
        }
    }

    /// A tracker whose progress goes nowhere.
    #[must_use]
    pub fn silent() -> Self {
        Self::new(&(Arc::new(super::progress::SilentProgress) as Arc<dyn Progress>))
    }

    #[must_use]
    pub fn progress(&self) -> &Arc<dyn Progress> {
        &self.progress
    }

    /// Print a message line without disrupting the progress indicator.
    pub fn println(&self, msg: &str) {
        self.progress.println(msg);
    }

    pub fn add_requests(&self, topic: TrackedTopic, count: u64) {
        let _ = self.counters[topic.index()].issued.fetch_add(count, Ordering::Relaxed);
    }

    /// Record one finished request, flipping the topic to [`TopicStatus::Done`] once all are in.
    pub fn complete_request(&self, topic: TrackedTopic) {
        let counter = &self.counters[topic.index()];
        let completed = counter.completed.fetch_add(1, Ordering::Relaxed) + 1;
        let issued = counter.issued.load(Ordering::Relaxed);
        if completed >= issued && issued > 0 {
            counter.status.store(TopicStatus::Done as u8, Ordering::Relaxed);
        }
    }

    pub fn set_topic_status(&self, topic: TrackedTopic, status: TopicStatus) {
        self.counters[topic.index()].status.store(status as u8, Ordering::Relaxed);
    }

    /// Returns `(issued, completed)` for a topic.
    #[must_use]
    pub fn counts(&self, topic: TrackedTopic) -> (u64, u64) {
        let counter = &self.counters[topic.index()];
        (counter.issued.load(Ordering::Relaxed), counter.completed.load(Ordering::Relaxed))
    }

    fn snapshots(counters: &[RequestCounter; 2]) -> [TopicSnapshot; 2] {
        TrackedTopic::all().map(|topic| counters[topic.index()].snapshot(topic))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn line(tracker: &RequestTracker, use_colors: bool, blink_on: bool) -> (u64, u64, String) {
        status_line(&RequestTracker::snapshots(&tracker.counters), use_colors, blink_on)
    }

    #[test]
    fn test_no_requests() {
        let tracker = RequestTracker::silent();
        assert_eq!(line(&tracker, true, true), (0, 0, "No requests".to_string()));
    }

    #[test]
    fn test_counts_per_topic_in_fixed_order() {
        let tracker = RequestTracker::silent();
        tracker.add_requests(TrackedTopic::Repos, 5);
        tracker.add_requests(TrackedTopic::Source, 2);
        tracker.complete_request(TrackedTopic::Source);
        tracker.complete_request(TrackedTopic::Repos);
        tracker.complete_request(TrackedTopic::Repos);

        assert_eq!(line(&tracker, false, false), (7, 3, "1/2 source, 2/5 repos".to_string()));
        assert_eq!(tracker.counts(TrackedTopic::Repos), (5, 2));
    }

    #[test]
    fn test_idle_topic_is_hidden() {
        let tracker = RequestTracker::silent();
        tracker.add_requests(TrackedTopic::Repos, 2);
        assert_eq!(line(&tracker, false, false).2, "0/2 repos");
    }

    #[test]
    fn test_completed_topic_colored_green() {
        let tracker = RequestTracker::silent();
        tracker.add_requests(TrackedTopic::Source, 1);
        tracker.add_requests(TrackedTopic::Repos, 1);
        tracker.complete_request(TrackedTopic::Repos);

        let (_, _, message) = line(&tracker, true, false);
        assert_eq!(message, format!("0/1 source, {}", "1/1 repos".green()));
        assert_eq!(line(&tracker, false, false).2, "0/1 source, 1/1 repos");
    }

    #[test]
    fn test_blocked_topic_follows_blink_phase() {
        let tracker = RequestTracker::silent();
        tracker.add_requests(TrackedTopic::Repos, 3);
        tracker.set_topic_status(TrackedTopic::Repos, TopicStatus::Blocked);

        assert_eq!(line(&tracker, true, true).2, "0/3 repos".yellow().to_string());
        assert_eq!(line(&tracker, true, false).2, "0/3 repos");
        assert_eq!(line(&tracker, false, true).2, "0/3 repos");
    }

    #[test]
    fn test_unblocked_topic_returns_to_plain() {
        let tracker = RequestTracker::silent();
        tracker.add_requests(TrackedTopic::Repos, 3);
        tracker.set_topic_status(TrackedTopic::Repos, TopicStatus::Blocked);
        tracker.set_topic_status(TrackedTopic::Repos, TopicStatus::Active);

        assert_eq!(line(&tracker, true, true).2, "0/3 repos");
    }

    #[test]
    fn test_clones_share_counters() {
        let tracker = RequestTracker::silent();
        let clone = tracker.clone();
        clone.add_requests(TrackedTopic::Repos, 4);
        tracker.complete_request(TrackedTopic::Repos);
        assert_eq!(clone.counts(TrackedTopic::Repos), (4, 1));
    }

    #[test]
    fn test_println_and_callback_reach_progress() {
        #[derive(Default)]
        struct RecordingProgress {
            messages: Mutex<Vec<String>>,
            callback: Mutex<Option<Box<dyn Fn() -> (u64, u64, String) + Send + Sync>>>,
        }

        impl Progress for RecordingProgress {
            fn set_phase(&self, _phase: &str) {}
            fn set_determinate(&self, callback: Box<dyn Fn() -> (u64, u64, String) + Send + Sync + 'static>) {
                *self.callback.lock().unwrap() = Some(callback);
            }
            fn println(&self, msg: &str) {
                self.messages.lock().unwrap().push(msg.to_string());
            }
            fn done(&self) {}
            fn use_colors(&self) -> bool {
                false
            }
        }

        let progress = Arc::new(RecordingProgress::default());
        let tracker = RequestTracker::new(&(Arc::clone(&progress) as Arc<dyn Progress>));
        tracker.println("hello");
        tracker.add_requests(TrackedTopic::Repos, 2);

        assert_eq!(*progress.messages.lock().unwrap(), ["hello"]);
        let callback = progress.callback.lock().unwrap();
        let (total, _, message) = callback.as_ref().unwrap()();
        assert_eq!(total, 2);
        assert_eq!(message, "0/2 repos");
    }
}
