use std::fs;
use std::process::Command;
use std::time::SystemTime;

use camino::Utf8Path;

use crate::core::{Options, TargetId};
use crate::graph::{Graph, Node};

/// What happened to a dispatched target.
#[derive(Debug)]
pub(crate) enum Outcome {
    /// No command declared.
    Phony,
    /// Output is newer than all of its dependencies.
    UpToDate,
    /// The command ran and exited successfully.
    Ran,
    /// The command ran and failed.
    Failed(Option<i32>),
    /// The command could not be started at all.
    Spawn(std::io::Error),
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed(_) | Outcome::Spawn(_))
    }

    pub fn executed(&self) -> bool {
        matches!(self, Outcome::Ran | Outcome::Failed(_))
    }
}

fn mtime(path: &Utf8Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

/// Decides whether `node` has to run its command.
///
/// A node with a command and no dependencies always runs. Otherwise it runs
/// if its own file or any dependency's file is missing, or if any dependency
/// was modified after it.
pub(crate) fn is_stale(graph: &Graph, node: &Node, options: &Options) -> bool {
    if node.command.is_none() {
        return false;
    }
    if node.deps.is_empty() {
        return true;
    }

    let Some(own) = mtime(&options.path(&node.name)) else {
        return true;
    };

    node.deps.iter().any(|&dep| {
        match mtime(&options.path(&graph.node(dep).name)) {
            Some(time) => time > own,
            None => true,
        }
    })
}

/// Runs one target to completion: checks staleness, then echoes and executes
/// its command.
pub(crate) fn run(graph: &Graph, id: TargetId, options: &Options) -> Outcome {
    let node = graph.node(id);

    let Some(command) = node.render() else {
        return Outcome::Phony;
    };
    if !is_stale(graph, node, options) {
        tracing::debug!("{} is up to date", node.name);
        return Outcome::UpToDate;
    }

    // Routed around the progress bars so the command line isn't torn.
    if options.echo {
        tracing_indicatif::indicatif_println!("{command}");
    }

    let status = Command::new(&options.shell)
        .arg("-c")
        .arg(&command)
        .current_dir(options.root())
        .status();

    match status {
        Ok(status) if status.success() => Outcome::Ran,
        Ok(status) => Outcome::Failed(status.code()),
        Err(err) => Outcome::Spawn(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::Blueprint;
    use std::fs::File;
    use std::time::Duration;

    fn touch(dir: &std::path::Path, name: &str, age: u64) {
        let file = File::create(dir.join(name)).unwrap();
        let time = SystemTime::now() - Duration::from_secs(age);
        file.set_modified(time).unwrap();
    }

    fn stale(project: &Blueprint, dir: &std::path::Path, goal: &str) -> bool {
        let options = Options::default().directory(dir.to_str().unwrap());
        let graph = Graph::discover(project, goal, &options).unwrap();
        let node = graph.node(graph.find(goal).unwrap());
        is_stale(&graph, node, &options)
    }

    fn project() -> Blueprint {
        let mut project = Blueprint::new();
        project.target("out", ["in"], "cp $< $@");
        project
    }

    #[test]
    fn test_newer_output_is_fresh() {
        let temp = tempfile::tempdir().unwrap();
        touch(temp.path(), "in", 100);
        touch(temp.path(), "out", 10);

        assert!(!stale(&project(), temp.path(), "out"));
    }

    #[test]
    fn test_newer_dependency_is_stale() {
        let temp = tempfile::tempdir().unwrap();
        touch(temp.path(), "out", 100);
        touch(temp.path(), "in", 10);

        assert!(stale(&project(), temp.path(), "out"));
    }

    #[test]
    fn test_equal_times_are_fresh() {
        let temp = tempfile::tempdir().unwrap();
        touch(temp.path(), "in", 50);
        touch(temp.path(), "out", 50);
        let time = fs::metadata(temp.path().join("in")).unwrap().modified().unwrap();
        File::options()
            .write(true)
            .open(temp.path().join("out"))
            .unwrap()
            .set_modified(time)
            .unwrap();

        assert!(!stale(&project(), temp.path(), "out"));
    }

    #[test]
    fn test_missing_output_is_stale() {
        let temp = tempfile::tempdir().unwrap();
        touch(temp.path(), "in", 10);

        assert!(stale(&project(), temp.path(), "out"));
    }

    #[test]
    fn test_missing_dependency_file_is_stale() {
        let temp = tempfile::tempdir().unwrap();
        touch(temp.path(), "out", 10);

        let mut project = Blueprint::new();
        project
            .target("out", ["gen"], "cp $< $@")
            .phony("gen", Vec::<String>::new());

        assert!(stale(&project, temp.path(), "out"));
    }

    #[test]
    fn test_leaf_with_command_always_runs() {
        let temp = tempfile::tempdir().unwrap();
        touch(temp.path(), "stamp", 0);

        let mut project = Blueprint::new();
        project.target("stamp", Vec::<String>::new(), "touch $@");

        assert!(stale(&project, temp.path(), "stamp"));
    }

    #[test]
    fn test_phony_never_runs() {
        let temp = tempfile::tempdir().unwrap();

        let mut project = Blueprint::new();
        project.phony("all", Vec::<String>::new());
        let options = Options::default().directory(temp.path().to_str().unwrap());
        let graph = Graph::discover(&project, "all", &options).unwrap();

        let outcome = run(&graph, graph.find("all").unwrap(), &options);
        assert!(matches!(outcome, Outcome::Phony));
        assert!(!outcome.executed());
    }

    #[test]
    fn test_failing_command_reports_code() {
        let temp = tempfile::tempdir().unwrap();

        let mut project = Blueprint::new();
        project.target("bad", Vec::<String>::new(), "exit 3");
        let options = Options::default()
            .directory(temp.path().to_str().unwrap())
            .echo(false);
        let graph = Graph::discover(&project, "bad", &options).unwrap();

        let outcome = run(&graph, graph.find("bad").unwrap(), &options);
        assert!(matches!(outcome, Outcome::Failed(Some(3))));
        assert!(outcome.is_failure());
    }

    #[test]
    fn test_echoed_command_still_runs() {
        let temp = tempfile::tempdir().unwrap();

        let mut project = Blueprint::new();
        project.target("out", Vec::<String>::new(), "printf '%s' $@ > $@");
        let options = Options::default()
            .directory(temp.path().to_str().unwrap())
            .echo(true);
        let graph = Graph::discover(&project, "out", &options).unwrap();

        let outcome = run(&graph, graph.find("out").unwrap(), &options);
        assert!(matches!(outcome, Outcome::Ran));
        assert_eq!(std::fs::read_to_string(temp.path().join("out")).unwrap(), "out");
    }
}
