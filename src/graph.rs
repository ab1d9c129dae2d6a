//! The build graph for a single invocation.
//!
//! A [`Graph`] is an arena of [`Node`]s addressed by [`TargetId`]. It starts
//! out as a copy of the [`Blueprint`]'s declarations and is then grown by
//! [`Graph::discover`], which walks breadth-first from the goal over
//! dependency edges:
//!
//! * names that are declared are followed,
//! * names that aren't declared but exist on disk become synthesized leaves,
//! * anything else fails the build before a single command runs.
//!
//! Every edge walked is mirrored as a co-dependency back-edge, so after
//! discovery `codeps` is exactly the inverse of `deps` within the closure.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::blueprint::Blueprint;
use crate::core::{Options, TargetId};
use crate::error::BuildError;
use crate::registry::Registry;
use crate::template::Template;

/// Traversal state of a node, owned by whichever phase is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Visit {
    Undiscovered,
    Discovered,
    Enqueued,
    Dispatched,
    Finished,
}

#[derive(Debug)]
pub(crate) struct Node {
    pub name: String,
    pub command: Option<Template>,
    /// Dependency names, in declaration order.
    pub needs: Vec<String>,
    /// Resolved dependencies, parallel to `needs`. Filled during discovery.
    pub deps: Vec<TargetId>,
    /// Nodes that depend on this one, within the closure.
    pub codeps: Vec<TargetId>,
    /// How many dependencies have finished.
    pub satisfied: AtomicUsize,
}

impl Node {
    fn new(name: String, command: Option<Template>, needs: Vec<String>) -> Self {
        Self {
            name,
            command,
            needs,
            deps: Vec::new(),
            codeps: Vec::new(),
            satisfied: AtomicUsize::new(0),
        }
    }

    /// All dependencies have reported completion.
    pub fn is_ready(&self) -> bool {
        self.satisfied.load(Ordering::SeqCst) >= self.deps.len()
    }

    /// The command this node would run, rendered.
    pub fn render(&self) -> Option<String> {
        self.command
            .as_ref()
            .map(|command| command.render(&self.name, &self.needs))
    }
}

#[derive(Debug)]
pub(crate) struct Graph {
    pub nodes: Vec<Node>,
    registry: Registry<TargetId>,
    /// Nodes reachable from the goal, in discovery order.
    pub closure: Vec<TargetId>,
    /// Closure nodes without dependencies.
    pub leaves: Vec<TargetId>,
}

impl Graph {
    fn from_blueprint(blueprint: &Blueprint) -> Self {
        let mut registry = Registry::new();
        let nodes = blueprint
            .targets
            .iter()
            .enumerate()
            .map(|(index, target)| {
                registry.insert(target.name.clone(), TargetId(index));
                Node::new(
                    target.name.clone(),
                    target.command.clone(),
                    target.needs.clone(),
                )
            })
            .collect();

        Self {
            nodes,
            registry,
            closure: Vec::new(),
            leaves: Vec::new(),
        }
    }

    pub fn node(&self, id: TargetId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn find(&self, name: &str) -> Option<TargetId> {
        self.registry.find(name).copied()
    }

    /// Looks `name` up, synthesizing a leaf if it only exists as a file.
    fn resolve(&mut self, name: &str, options: &Options) -> Option<TargetId> {
        if let Some(id) = self.find(name) {
            return Some(id);
        }

        if !options.path(name).exists() {
            return None;
        }

        tracing::debug!("synthesizing leaf for file {}", name);
        let id = TargetId(self.nodes.len());
        self.nodes.push(Node::new(name.to_string(), None, Vec::new()));
        self.registry.insert(name, id);
        Some(id)
    }

    /// Builds the closure of everything `goal` transitively needs.
    pub fn discover(
        blueprint: &Blueprint,
        goal: &str,
        options: &Options,
    ) -> Result<Self, BuildError> {
        let mut graph = Graph::from_blueprint(blueprint);

        let root = graph
            .resolve(goal, options)
            .ok_or_else(|| BuildError::UnknownGoal(goal.to_string()))?;

        let mut visit = vec![Visit::Undiscovered; graph.nodes.len()];
        let mut queue = VecDeque::from([root]);
        visit[root.0] = Visit::Discovered;
        graph.closure.push(root);

        while let Some(id) = queue.pop_front() {
            if graph.nodes[id.0].needs.is_empty() {
                graph.leaves.push(id);
                continue;
            }

            for position in 0..graph.nodes[id.0].needs.len() {
                let name = graph.nodes[id.0].needs[position].clone();
                let dep = graph.resolve(&name, options).ok_or_else(|| BuildError::Unresolved {
                    target: graph.nodes[id.0].name.clone(),
                    dependency: name.clone(),
                })?;

                graph.nodes[id.0].deps.push(dep);
                graph.nodes[dep.0].codeps.push(id);

                visit.resize(graph.nodes.len(), Visit::Undiscovered);
                if visit[dep.0] == Visit::Undiscovered {
                    visit[dep.0] = Visit::Discovered;
                    graph.closure.push(dep);
                    queue.push_back(dep);
                }
            }
        }

        tracing::debug!(
            "discovered {} targets ({} leaves) for {}",
            graph.closure.len(),
            graph.leaves.len(),
            goal
        );

        graph.check_acyclic()?;
        Ok(graph)
    }

    /// Fails with the name of a node on a cycle, if the closure has one.
    fn check_acyclic(&self) -> Result<(), BuildError> {
        let mut dag = DiGraph::<TargetId, ()>::with_capacity(self.closure.len(), 0);
        let mut indices = vec![NodeIndex::end(); self.nodes.len()];

        for &id in &self.closure {
            indices[id.0] = dag.add_node(id);
        }

        for &id in &self.closure {
            for dep in &self.nodes[id.0].deps {
                dag.add_edge(indices[dep.0], indices[id.0], ());
            }
        }

        toposort(&dag, None)
            .map(|_| ())
            .map_err(|cycle| BuildError::Cycle(self.nodes[dag[cycle.node_id()].0].name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn names(graph: &Graph, ids: &[TargetId]) -> Vec<String> {
        ids.iter().map(|&id| graph.node(id).name.clone()).collect()
    }

    #[test]
    fn test_back_edges_mirror_deps() {
        let mut project = Blueprint::new();
        project
            .phony("all", ["a", "b"])
            .target("a", ["c"], "touch a")
            .target("b", ["c"], "touch b")
            .target("c", Vec::<String>::new(), "touch c")
            .target("unrelated", ["c"], "touch unrelated");

        let graph = Graph::discover(&project, "all", &Options::default()).unwrap();

        assert_eq!(names(&graph, &graph.closure), ["all", "a", "b", "c"]);
        assert_eq!(names(&graph, &graph.leaves), ["c"]);

        let c = graph.find("c").unwrap();
        assert_eq!(names(&graph, &graph.node(c).codeps), ["a", "b"]);

        for &id in &graph.closure {
            for &dep in &graph.node(id).deps {
                let back = graph.node(dep).codeps.iter().filter(|&&x| x == id).count();
                let forward = graph.node(id).deps.iter().filter(|&&x| x == dep).count();
                assert_eq!(back, forward);
            }
        }
    }

    #[test]
    fn test_handles_index_the_arena() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("src.c"), "").unwrap();
        let options = Options::default().directory(temp.path().to_str().unwrap());

        let mut project = Blueprint::new();
        project.target("obj", ["src.c"], "cp $< $@");

        let graph = Graph::discover(&project, "obj", &options).unwrap();

        // `src.c` is appended during discovery, after the declared targets.
        let src = graph.find("src.c").unwrap();
        assert_eq!(src.index(), graph.nodes.len() - 1);
        for (index, node) in graph.nodes.iter().enumerate() {
            assert_eq!(graph.find(&node.name).map(TargetId::index), Some(index));
        }
    }

    #[test]
    fn test_synthesizes_file_leaves() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("main.c"), "int main() {}").unwrap();

        let mut project = Blueprint::new();
        project.target("main", ["main.c"], "cc -o $@ $<");

        let options = Options::default().directory(temp.path().to_str().unwrap());
        let graph = Graph::discover(&project, "main", &options).unwrap();

        let leaf = graph.find("main.c").unwrap();
        assert!(graph.node(leaf).command.is_none());
        assert!(graph.node(leaf).needs.is_empty());
        assert_eq!(names(&graph, &graph.leaves), ["main.c"]);
    }

    #[test]
    fn test_unresolved_dependency() {
        let temp = tempfile::tempdir().unwrap();

        let mut project = Blueprint::new();
        project.target("main", ["missing.c"], "cc -o $@ $<");

        let options = Options::default().directory(temp.path().to_str().unwrap());
        let err = Graph::discover(&project, "main", &options).unwrap_err();

        match err {
            BuildError::Unresolved { target, dependency } => {
                assert_eq!(target, "main");
                assert_eq!(dependency, "missing.c");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_goal() {
        let temp = tempfile::tempdir().unwrap();
        let options = Options::default().directory(temp.path().to_str().unwrap());

        let err = Graph::discover(&Blueprint::new(), "nothing", &options).unwrap_err();
        assert!(matches!(err, BuildError::UnknownGoal(name) if name == "nothing"));
    }

    #[test]
    fn test_cycle_detected() {
        let mut project = Blueprint::new();
        project
            .target("a", ["b"], "true")
            .target("b", ["c"], "true")
            .target("c", ["a"], "true");

        let err = Graph::discover(&project, "a", &Options::default()).unwrap_err();
        assert!(matches!(err, BuildError::Cycle(_)));
    }

    #[test]
    fn test_render_uses_needs() {
        let mut project = Blueprint::new();
        project
            .target("out", ["x", "y"], "cat $^> $@")
            .phony("x", Vec::<String>::new())
            .phony("y", Vec::<String>::new());

        let graph = Graph::discover(&project, "out", &Options::default()).unwrap();
        let out = graph.find("out").unwrap();

        assert_eq!(graph.node(out).render().unwrap(), "cat x y > out");
        assert!(graph.node(out).deps.len() == 2 && !graph.node(out).is_ready());
    }
}
