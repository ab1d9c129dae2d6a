use thiserror::Error;

fn describe_status(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status {code}"),
        None => String::from("no exit status (terminated by signal)"),
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Target '{0}' is neither declared nor an existing file")]
    UnknownGoal(String),

    #[error("Target '{target}' needs '{dependency}', which is neither declared nor an existing file")]
    Unresolved { target: String, dependency: String },

    #[error("Dependency cycle detected at target '{0}'")]
    Cycle(String),

    #[error("Target '{target}' failed with {}", describe_status(.code))]
    Job { target: String, code: Option<i32> },

    #[error("Couldn't run the command for target '{target}'.\n{source}")]
    Spawn {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Couldn't start the worker pool.\n{0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Style(#[from] indicatif::style::TemplateError),

    #[error("Build stalled with {0} targets that can never become ready")]
    Stalled(usize),
}

impl BuildError {
    /// Process exit code matching this error.
    ///
    /// A failed command passes its own status through, everything else
    /// maps to `1`.
    pub fn exit_code(&self) -> i32 {
        match self {
            BuildError::Job {
                code: Some(code), ..
            } if *code != 0 => *code,
            _ => 1,
        }
    }
}
