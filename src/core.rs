use camino::{Utf8Path, Utf8PathBuf};

/// Stable handle to a target inside a build graph.
///
/// Handles index the graph's arena, so they stay valid while new targets are
/// appended during discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct TargetId(pub(crate) usize);

impl TargetId {
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

/// Configuration for a single build invocation.
///
/// ```rust
/// use construct::Options;
///
/// let options = Options::default().jobs(4).directory("project");
/// assert_eq!(options.max_jobs(), 4);
/// ```
#[derive(Debug, Clone)]
pub struct Options {
    pub(crate) jobs: usize,
    pub(crate) directory: Utf8PathBuf,
    pub(crate) shell: String,
    pub(crate) echo: bool,
}

impl Options {
    /// Maximum number of commands running at the same time. Clamped to at
    /// least one.
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Directory that target names are resolved against, and in which the
    /// commands are run.
    pub fn directory(mut self, directory: impl Into<Utf8PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    /// Program used to run commands, invoked as `<shell> -c <command>`.
    pub fn shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Whether each command is printed to stdout before it runs.
    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn max_jobs(&self) -> usize {
        self.jobs
    }

    pub(crate) fn path(&self, name: &str) -> Utf8PathBuf {
        self.directory.join(name)
    }

    pub(crate) fn root(&self) -> &Utf8Path {
        &self.directory
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            jobs: 1,
            directory: Utf8PathBuf::from("."),
            shell: String::from("sh"),
            echo: true,
        }
    }
}
