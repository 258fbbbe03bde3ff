/// Events emitted while a workflow or batch advances.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    PhaseStart { name: &'static str },
    PhaseFinish,

    BatchStart { total_runs: u64 },
    RunFinished { run: u64, success: bool },
    BatchFinish { succeeded: u64, failed: u64 },

    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

/// Optional sink for [`Progress`] events; without a callback every report is dropped.
#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }

    pub fn message(&self, text: impl Into<String>) {
        self.report(Progress::Message(text.into()));
    }

    /// Runs `f` between a `PhaseStart`/`PhaseFinish` pair.
    pub fn phase<T>(&self, name: &'static str, f: impl FnOnce() -> T) -> T {
        self.report(Progress::PhaseStart { name });
        let result = f();
        self.report(Progress::PhaseFinish);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn reporter_without_callback_ignores_events() {
        let reporter = ProgressReporter::new();
        reporter.report(Progress::BatchStart { total_runs: 3 });
        assert_eq!(reporter.phase("noop", || 7), 7);
    }

    #[test]
    fn phase_wraps_the_closure_in_start_and_finish_events() {
        let seen = Mutex::new(Vec::new());
        {
            let reporter = ProgressReporter::with_callback(Box::new(|event| {
                seen.lock().unwrap().push(event);
            }));
            reporter.phase("Scoring", || reporter.message("halfway"));
        }
        let seen = seen.into_inner().unwrap();
        assert_eq!(
            seen,
            vec![
                Progress::PhaseStart { name: "Scoring" },
                Progress::Message("halfway".to_string()),
                Progress::PhaseFinish,
            ]
        );
    }
}
