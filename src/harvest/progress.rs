/// Receives progress updates from long-running harvesting work.
pub trait Progress: Send + Sync {
    /// Set the label for the current phase (e.g. "Resolving", "Fetching").
    fn set_phase(&self, phase: &str);

    /// Install a callback returning `(total, current, message)`, polled while the phase runs.
    fn set_determinate(&self, callback: Box<dyn Fn() -> (u64, u64, String) + Send + Sync + 'static>);

    /// Print a line without disturbing the progress indicator.
    fn println(&self, msg: &str);

    /// Finish and clear the indicator.
    fn done(&self);

    fn use_colors(&self) -> bool;
}

/// Discards every update; messages passed to [`Progress::println`] go to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentProgress;

impl Progress for SilentProgress {
    fn set_phase(&self, _phase: &str) {}

    fn set_determinate(&self, _callback: Box<dyn Fn() -> (u64, u64, String) + Send + Sync + 'static>) {}

    fn println(&self, msg: &str) {
        eprintln!("{msg}");
    }

    fn done(&self) {}

    fn use_colors(&self) -> bool {
        false
    }
}
