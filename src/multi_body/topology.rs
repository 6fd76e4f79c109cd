use std::collections::HashSet;

use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Bfs;

use super::tree::{Actuator, Body, BodyIndex, Joint, JointIndex, WORLD_INDEX};
use crate::error::{MultibodyError, Result};
use crate::joint::JointModel;

/// Tree structure and state layout frozen by `lock()`.
#[derive(Debug, Clone)]
pub(crate) struct Topology {
    // body index graph, edges point from parent to child
    graph: DiGraphMap<usize, ()>,
    /// Non-world bodies, parents before children.
    pub(crate) order: Vec<BodyIndex>,
    /// Inboard joint of every body, `None` for the world.
    pub(crate) inboard: Vec<Option<JointIndex>>,
    /// Offsets into q and v, indexed by joint.
    pub(crate) q_offsets: Vec<usize>,
    pub(crate) v_offsets: Vec<usize>,
    /// Offsets into the actuation input, indexed by actuator.
    pub(crate) u_offsets: Vec<usize>,
    pub(crate) num_positions: usize,
    pub(crate) num_velocities: usize,
    pub(crate) num_actuated_dofs: usize,
}

struct BfsIter<'a> {
    graph: &'a DiGraphMap<usize, ()>,
    bfs: Bfs<usize, HashSet<usize>>,
}

impl<'a> Iterator for BfsIter<'a> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        self.bfs.next(self.graph)
    }
}

impl Topology {
    /// Every non-world body must already have exactly one inboard joint.
    pub(crate) fn build(bodies: &[Body], joints: &[Joint], actuators: &[Actuator]) -> Result<Topology> {
        let mut graph = DiGraphMap::new();
        for body in bodies {
            graph.add_node(body.index.0);
        }
        let mut inboard = vec![None; bodies.len()];
        for joint in joints {
            graph.add_edge(joint.parent.0, joint.child.0, ());
            inboard[joint.child.0] = Some(joint.index);
        }

        let bfs = Bfs::new(&graph, WORLD_INDEX.0);
        let visited: Vec<usize> = BfsIter { graph: &graph, bfs }.collect();
        if visited.len() != bodies.len() {
            let reached: HashSet<usize> = visited.iter().copied().collect();
            let stranded = bodies
                .iter()
                .find(|b| !reached.contains(&b.index.0))
                .map(|b| b.name.clone())
                .unwrap_or_default();
            return Err(MultibodyError::Cycle { body: stranded });
        }
        let order: Vec<BodyIndex> = visited
            .into_iter()
            .filter(|&b| b != WORLD_INDEX.0)
            .map(BodyIndex)
            .collect();

        let mut q_offsets = vec![0; joints.len()];
        let mut v_offsets = vec![0; joints.len()];
        let (mut nq, mut nv) = (0, 0);
        for body in &order {
            if let Some(j) = inboard[body.0] {
                let kind = &joints[j.0].kind;
                q_offsets[j.0] = nq;
                v_offsets[j.0] = nv;
                nq += kind.num_positions();
                nv += kind.num_velocities();
            }
        }

        let mut u_offsets = Vec::with_capacity(actuators.len());
        let mut nu = 0;
        for actuator in actuators {
            u_offsets.push(nu);
            nu += actuator.num_inputs();
        }

        Ok(Topology {
            graph,
            order,
            inboard,
            q_offsets,
            v_offsets,
            u_offsets,
            num_positions: nq,
            num_velocities: nv,
            num_actuated_dofs: nu,
        })
    }

    pub(crate) fn parent(&self, body: BodyIndex) -> Option<BodyIndex> {
        self.graph
            .neighbors_directed(body.0, petgraph::Direction::Incoming)
            .next()
            .map(BodyIndex)
    }

    pub(crate) fn children(&self, body: BodyIndex) -> Vec<BodyIndex> {
        self.graph
            .neighbors_directed(body.0, petgraph::Direction::Outgoing)
            .map(BodyIndex)
            .collect()
    }

    /// Bodies with no children.
    pub(crate) fn leaves(&self) -> Vec<BodyIndex> {
        self.order
            .iter()
            .copied()
            .filter(|b| self.children(*b).is_empty())
            .collect()
    }
}
