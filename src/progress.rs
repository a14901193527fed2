/// Coarse progress reporting for long scans and repacks. Implementations
/// are polled only at checkpoint boundaries; cancellation between
/// checkpoints is not observed until the next one.
pub trait ProgressSink {
    fn begin(&mut self, _label: &str, _total: u64) {}
    fn advance(&mut self, _amount: u64) {}
    fn cancelled(&self) -> bool {
        false
    }
}

/// Default sink: reports nothing, never cancels.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {}
