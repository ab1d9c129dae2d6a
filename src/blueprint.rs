use crate::core::Options;
use crate::engine::Diagnostics;
use crate::error::BuildError;
use crate::registry::Registry;
use crate::template::Template;

/// A declared target, as written by the user.
#[derive(Debug, Clone)]
pub(crate) struct Declaration {
    pub name: String,
    pub command: Option<Template>,
    pub needs: Vec<String>,
}

/// The set of targets your project knows how to build.
///
/// Targets are declared by name, with an ordered list of the names they need
/// and an optional command. A target without a command is phony: it never
/// runs anything, but still gates everything that depends on it.
///
/// # Example
///
/// ```rust,no_run
/// use construct::Blueprint;
///
/// let mut project = Blueprint::new();
/// project
///     .target("main", ["main.o", "util.o"], "cc -o $@ $^")
///     .target("main.o", ["main.c"], "cc -c -o $@ $<")
///     .target("util.o", ["util.c"], "cc -c -o $@ $<");
///
/// project.build("main", 2).expect("build failed");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Blueprint {
    pub(crate) targets: Vec<Declaration>,
    pub(crate) index: Registry<usize>,
}

impl Blueprint {
    /// Creates a new, empty blueprint.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a target. Declaring an existing name replaces it.
    ///
    /// An empty command is treated the same as no command.
    pub fn declare_target<I, S>(
        &mut self,
        name: impl Into<String>,
        command: Option<Template>,
        needs: I,
    ) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let declaration = Declaration {
            name: name.into(),
            command: command.filter(|command| !command.is_empty()),
            needs: needs.into_iter().map(Into::into).collect(),
        };

        match self.index.find(&declaration.name).copied() {
            Some(slot) => {
                tracing::debug!("redeclaring target {}", declaration.name);
                self.targets[slot] = declaration;
            }
            None => {
                self.index.insert(declaration.name.clone(), self.targets.len());
                self.targets.push(declaration);
            }
        }

        self
    }

    /// Declares a target built by `command`, in macro form or as a
    /// [`Template`].
    pub fn target<I, S>(
        &mut self,
        name: impl Into<String>,
        needs: I,
        command: impl Into<Template>,
    ) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.declare_target(name, Some(command.into()), needs)
    }

    /// Declares a target without a command.
    pub fn phony<I, S>(&mut self, name: impl Into<String>, needs: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.declare_target(name, None, needs)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// The command template declared for `name`, if any.
    pub fn command(&self, name: &str) -> Option<&Template> {
        let slot = *self.index.find(name)?;
        self.targets[slot].command.as_ref()
    }

    /// Builds `goal` in the current directory with at most `max_jobs`
    /// commands running at once.
    pub fn build(&self, goal: &str, max_jobs: usize) -> Result<Diagnostics, BuildError> {
        self.build_with(goal, &Options::default().jobs(max_jobs))
    }

    /// Builds `goal` using the given [`Options`].
    ///
    /// This will:
    /// 1. Discover everything `goal` transitively needs, failing before any
    ///    command runs if a name can't be resolved or the graph has a cycle.
    /// 2. Run the stale commands in dependency order, in parallel.
    ///
    /// On a failed command no new commands are started, those already running
    /// finish, and the failure is returned.
    pub fn build_with(&self, goal: &str, options: &Options) -> Result<Diagnostics, BuildError> {
        let graph = crate::graph::Graph::discover(self, goal, options)?;
        crate::engine::run(graph, goal, options)
    }
}
