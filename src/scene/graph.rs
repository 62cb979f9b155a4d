//! Placement hierarchy view
//!
//! A [`SceneGraph`] is a read-only forest derived from the entities' current
//! placements. Entities placed in room coordinates (or only turned to face
//! another entity) hang directly under the synthetic root.

use crate::error::SceneError;

use super::Scene;

/// Placement forest over the scene's entities, indexed like [`Scene::entities`]
#[derive(Debug, Clone)]
pub struct SceneGraph {
    names: Vec<String>,
    parents: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
}

impl SceneGraph {
    /// Build the forest, failing on anchors that no longer resolve or that
    /// loop back on themselves.
    pub fn build(scene: &Scene) -> Result<Self, SceneError> {
        let entities = scene.entities();
        let names: Vec<String> = entities.iter().map(|e| e.name().to_string()).collect();
        let mut parents = Vec::with_capacity(entities.len());
        for entity in entities {
            let parent = match entity.placement().anchor() {
                Some(anchor) => Some(
                    scene
                        .position(anchor)
                        .ok_or_else(|| SceneError::dangling(entity.name(), anchor))?,
                ),
                None => None,
            };
            parents.push(parent);
        }

        let mut children = vec![Vec::new(); entities.len()];
        for (i, parent) in parents.iter().enumerate() {
            if let Some(p) = parent {
                children[*p].push(i);
            }
        }

        let graph = Self {
            names,
            parents,
            children,
        };
        graph.check_acyclic()?;
        Ok(graph)
    }

    fn check_acyclic(&self) -> Result<(), SceneError> {
        for start in 0..self.parents.len() {
            let mut path = vec![start];
            let mut node = start;
            while let Some(p) = self.parents[node] {
                if let Some(pos) = path.iter().position(|&n| n == p) {
                    let mut cycle: Vec<String> =
                        path[pos..].iter().map(|&n| self.names[n].clone()).collect();
                    cycle.push(self.names[p].clone());
                    return Err(SceneError::cycle(cycle));
                }
                path.push(p);
                node = p;
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, node: usize) -> &str {
        &self.names[node]
    }

    /// `None` means the node hangs under the root
    pub fn parent(&self, node: usize) -> Option<usize> {
        self.parents[node]
    }

    pub fn children(&self, node: usize) -> &[usize] {
        &self.children[node]
    }

    /// Nodes directly under the root
    pub fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len()).filter(|&n| self.parents[n].is_none())
    }

    /// Ancestors nearest first, root excluded
    pub fn ancestors(&self, node: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut cur = node;
        while let Some(p) = self.parents[cur] {
            out.push(p);
            cur = p;
        }
        out
    }

    /// Every node below `node`, breadth first
    pub fn descendants(&self, node: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut queue = std::collections::VecDeque::from_iter(self.children[node].iter().copied());
        while let Some(n) = queue.pop_front() {
            out.push(n);
            queue.extend(self.children[n].iter().copied());
        }
        out
    }

    /// The node's ancestor directly under the root (itself when top level)
    pub fn top_level(&self, node: usize) -> usize {
        self.ancestors(node).last().copied().unwrap_or(node)
    }

    /// Whether both nodes hang under the same top-level entity
    pub fn same_subtree(&self, a: usize, b: usize) -> bool {
        self.top_level(a) == self.top_level(b)
    }

    pub fn depth(&self, node: usize) -> usize {
        self.ancestors(node).len()
    }
}
