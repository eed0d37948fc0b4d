use std::collections::{HashSet, VecDeque};

use keel_kernel_topo::{FaceId, ShellId, Topology};
use tracing::debug;

/// Make face winding consistent across a shell.
///
/// Breadth-first from the shell's first face: a neighbour whose shared
/// half-edge starts at the same vertex as ours is flipped. Faces not
/// reachable across shared edges keep their winding. Returns the number of
/// faces flipped.
pub fn orient_faces(topo: &mut Topology, shell: ShellId) -> usize {
    let Some(faces) = topo.shells.get(shell).map(|s| s.faces.clone()) else {
        return 0;
    };
    let members: HashSet<FaceId> = faces.iter().copied().collect();
    let Some(&seed) = faces.first() else {
        return 0;
    };

    let mut flipped = 0;
    let mut visited = HashSet::from([seed]);
    let mut queue = VecDeque::from([seed]);
    while let Some(f) = queue.pop_front() {
        for l in topo.face_loops(f) {
            let hes: Vec<_> = topo.loop_half_edges(l).collect();
            for h in hes {
                let Some(he) = topo.half_edges.get(h) else {
                    continue;
                };
                let origin = he.origin;
                let Some(twin) = topo.half_edges.get(he.twin) else {
                    continue;
                };
                let neighbour = twin
                    .loop_id
                    .and_then(|tl| topo.loops.get(tl))
                    .and_then(|lp| lp.face)
                    .filter(|g| members.contains(g) && !visited.contains(g));
                let Some(g) = neighbour else {
                    continue;
                };
                if twin.origin == origin && topo.flip_face(g).is_ok() {
                    flipped += 1;
                }
                visited.insert(g);
                queue.push_back(g);
            }
        }
    }

    debug!(?shell, flipped, "orient_faces");
    flipped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{tetrahedron, tetrahedron_with, OUTWARD};
    use crate::{validate_manifold, ValidationFinding};
    use keel_kernel_math::Point3;
    use keel_kernel_topo::{Orientation, Session, ShellType};

    #[test]
    fn test_consistent_shell_needs_no_flips() {
        let mut topo = Topology::new(&Session::new());
        let (_, faces) = tetrahedron(&mut topo);
        let shell = topo.add_shell(faces, ShellType::Outer).unwrap();
        assert_eq!(orient_faces(&mut topo, shell), 0);
    }

    #[test]
    fn test_wrongly_wound_face_is_flipped() {
        let mut topo = Topology::new(&Session::new());
        // last face wound the wrong way round
        let cycles = [OUTWARD[1], OUTWARD[2], OUTWARD[3], [0, 1, 2]];
        let (_, faces) = tetrahedron_with(&mut topo, Point3::origin(), 1.0, &cycles);
        let bad = faces[3];
        let shell = topo.add_shell(faces, ShellType::Outer).unwrap();
        assert!(validate_manifold(&topo, shell)
            .has(|f| matches!(f, ValidationFinding::TwinMismatch(_))));

        assert_eq!(orient_faces(&mut topo, shell), 1);
        assert_eq!(topo.faces[bad].orientation, Orientation::Reversed);
        let report = validate_manifold(&topo, shell);
        assert!(report.is_valid, "{report}");
    }

    #[test]
    fn test_missing_shell_flips_nothing() {
        let mut topo = Topology::new(&Session::new());
        let (_, faces) = tetrahedron(&mut topo);
        let shell = topo.add_shell(faces, ShellType::Outer).unwrap();
        topo.shells.remove(shell);
        assert_eq!(orient_faces(&mut topo, shell), 0);
    }
}
