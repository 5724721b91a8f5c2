use std::cell::RefCell;
use std::time::{Duration, Instant};

/// Wall-clock per build stage, reported on `--verbose`. Stages run
/// strictly one after another in the orchestrator, so a plain list is
/// enough.
pub struct StageTimer {
    enabled: bool,
    start: Instant,
    stages: RefCell<Vec<(&'static str, Duration)>>,
}

impl StageTimer {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            start: Instant::now(),
            stages: RefCell::new(Vec::new()),
        }
    }

    /// Runs `f` and records its elapsed time under `label`.
    pub fn time<T>(&self, label: &'static str, f: impl FnOnce() -> T) -> T {
        let began = Instant::now();
        let out = f();
        self.stages.borrow_mut().push((label, began.elapsed()));
        out
    }

    pub fn report(&self, title: &str) {
        if !self.enabled {
            return;
        }
        eprintln!("==== timing report: {title} ====");
        for (label, elapsed) in self.stages.borrow().iter() {
            eprintln!("{label:24} {:>10.3} s", elapsed.as_secs_f64());
        }
        eprintln!("{:24} {:>10.3} s", "total", self.start.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_passes_the_result_through() {
        let timer = StageTimer::new(false);
        let value = timer.time("stage", || 21 * 2);
        assert_eq!(value, 42);
        assert_eq!(timer.stages.borrow().len(), 1);
        assert_eq!(timer.stages.borrow()[0].0, "stage");
    }
}
