use std::collections::HashMap;
use std::fmt::Write;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct TaskExecution {
    pub start: Instant,
    pub duration: Duration,
}

impl TaskExecution {
    pub fn end(&self) -> Instant {
        self.start + self.duration
    }
}

/// Build diagnostics and performance metrics.
///
/// This struct is returned by [`Blueprint::build`](crate::Blueprint::build)
/// and records which targets actually ran their command, and for how long.
#[derive(Debug, Default)]
pub struct Diagnostics {
    /// Targets whose command ran, in the order they finished.
    pub executed: Vec<String>,
    /// Targets whose output was already newer than their dependencies.
    pub up_to_date: Vec<String>,
    /// Timing of every executed command, by target name.
    pub execution_times: HashMap<String, TaskExecution>,
}

impl Diagnostics {
    pub fn ran(&self, name: &str) -> bool {
        self.execution_times.contains_key(name)
    }

    /// Renders a plain text timeline, one line per executed command,
    /// relative to the first command's start.
    pub fn render_timeline(&self) -> String {
        let mut f = String::new();

        let Some(origin) = self.execution_times.values().map(|t| t.start).min() else {
            return f;
        };

        let mut rows: Vec<_> = self.execution_times.iter().collect();
        rows.sort_by_key(|(_, t)| t.start);

        let width = rows.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
        for (name, t) in rows {
            let offset = t.start.duration_since(origin);
            let _ = writeln!(f, "{name:<width$}  +{offset:.2?}  {:.2?}", t.duration);
        }

        f
    }
}
