use std::collections::HashSet;

use keel_kernel_topo::{HalfEdgeId, LoopId, ShellId, Topology, VertexId};
use tracing::debug;

use crate::{ValidationFinding, ValidationReport};

/// Check the half-edge structure of one shell.
///
/// Boundary edges (one incident face) are allowed, so an open sheet such
/// as a single triangle is valid. The faces must hang together across
/// edges; a shell holding two separate skins is reported as disconnected.
/// The graph is never modified.
pub fn validate_manifold(topo: &Topology, shell: ShellId) -> ValidationReport {
    let mut errors = Vec::new();
    let Some(sh) = topo.shells.get(shell) else {
        errors.push(ValidationFinding::DanglingReference(format!(
            "shell {shell:?}"
        )));
        return ValidationReport::from_findings(errors);
    };

    let mut shell_loops = HashSet::new();
    for &f in &sh.faces {
        if !topo.faces.contains_key(f) {
            errors.push(ValidationFinding::DanglingReference(format!(
                "face {f:?} of shell {shell:?}"
            )));
            continue;
        }
        for l in topo.face_loops(f) {
            if !topo.loops.contains_key(l) {
                errors.push(ValidationFinding::DanglingReference(format!(
                    "loop {l:?} of face {f:?}"
                )));
                continue;
            }
            shell_loops.insert(l);
            check_loop(topo, l, &mut errors);
        }
    }

    for e in topo.shell_edges(shell) {
        let Some(edge) = topo.edges.get(e) else {
            errors.push(ValidationFinding::DanglingReference(format!("edge {e:?}")));
            continue;
        };
        if edge.faces.len() > 2 {
            errors.push(ValidationFinding::NonManifoldEdge {
                edge: e,
                faces: edge.faces.len(),
            });
        }
        for f in &edge.faces {
            if !topo.faces.contains_key(*f) {
                errors.push(ValidationFinding::DanglingReference(format!(
                    "face {f:?} on edge {e:?}"
                )));
            }
        }
    }

    let live: Vec<_> = sh
        .faces
        .iter()
        .copied()
        .filter(|f| topo.faces.contains_key(*f))
        .collect();
    let components = topo.face_components(&live).len();
    if components > 1 {
        errors.push(ValidationFinding::DisconnectedShell { shell, components });
    }

    for v in topo.shell_vertices(shell) {
        if !topo.vertices.contains_key(v) {
            errors.push(ValidationFinding::DanglingReference(format!("vertex {v:?}")));
        } else if !single_fan(topo, v, &shell_loops) {
            errors.push(ValidationFinding::NonManifoldVertex(v));
        }
    }

    let report = ValidationReport::from_findings(errors);
    debug!(?shell, issues = report.issue_count(), "validate_manifold");
    report
}

fn check_loop(topo: &Topology, l: LoopId, errors: &mut Vec<ValidationFinding>) {
    let start = topo.loops[l].half_edge;
    let mut h = start;
    let mut steps = 0;
    loop {
        let Some(he) = topo.half_edges.get(h) else {
            errors.push(ValidationFinding::DanglingReference(format!(
                "half-edge {h:?} in loop {l:?}"
            )));
            return;
        };
        let twin = topo.half_edges.get(he.twin);
        match twin {
            None => errors.push(ValidationFinding::DanglingReference(format!(
                "twin of half-edge {h:?}"
            ))),
            Some(t) if t.twin != h || t.origin == he.origin => {
                errors.push(ValidationFinding::TwinMismatch(h));
            }
            Some(t) => {
                // the next half-edge must start where this one ends
                let chained = he
                    .next
                    .and_then(|n| topo.half_edges.get(n))
                    .is_some_and(|n| n.origin == t.origin);
                if !chained {
                    errors.push(ValidationFinding::OpenLoop(l));
                    return;
                }
            }
        }
        let Some(next) = he.next else {
            errors.push(ValidationFinding::OpenLoop(l));
            return;
        };
        if topo.half_edges.get(next).and_then(|n| n.prev) != Some(h) {
            errors.push(ValidationFinding::OpenLoop(l));
            return;
        }
        steps += 1;
        if next == start {
            return;
        }
        if steps > topo.half_edges.len() {
            errors.push(ValidationFinding::OpenLoop(l));
            return;
        }
        h = next;
    }
}

/// True if the shell faces around `v` form one edge-connected fan.
fn single_fan(topo: &Topology, v: VertexId, shell_loops: &HashSet<LoopId>) -> bool {
    let in_shell = |h: HalfEdgeId| {
        topo.half_edges
            .get(h)
            .and_then(|he| he.loop_id)
            .is_some_and(|l| shell_loops.contains(&l))
    };
    let outgoing: Vec<HalfEdgeId> = topo.vertices[v]
        .edges
        .iter()
        .filter_map(|e| topo.edges.get(*e))
        .flat_map(|edge| [edge.half_edges.0, edge.half_edges.1])
        .filter(|h| topo.half_edges.get(*h).is_some_and(|he| he.origin == v))
        .filter(|h| in_shell(*h))
        .collect();
    let Some(&first) = outgoing.first() else {
        return true;
    };

    let mut seen = HashSet::from([first]);
    // clockwise: prev then twin
    let mut h = first;
    while let Some(n) = topo
        .half_edges
        .get(h)
        .and_then(|he| he.prev)
        .and_then(|p| topo.half_edges.get(p))
        .map(|p| p.twin)
        .filter(|t| in_shell(*t))
    {
        if !seen.insert(n) {
            break;
        }
        h = n;
    }
    // counter-clockwise: twin then next
    h = first;
    while let Some(n) = topo
        .half_edges
        .get(h)
        .map(|he| he.twin)
        .filter(|t| in_shell(*t))
        .and_then(|t| topo.half_edges[t].next)
    {
        if !seen.insert(n) {
            break;
        }
        h = n;
    }
    outgoing.iter().all(|h| seen.contains(h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{tetrahedron, tetrahedron_with, torus_grid, OUTWARD};
    use keel_kernel_math::Point3;
    use keel_kernel_topo::{Session, ShellType};

    #[test]
    fn test_tetrahedron_is_valid() {
        let mut topo = Topology::new(&Session::new());
        let (_, faces) = tetrahedron(&mut topo);
        let shell = topo.add_shell(faces, ShellType::Outer).unwrap();
        let report = validate_manifold(&topo, shell);
        assert!(report.is_valid, "{report}");
    }

    #[test]
    fn test_single_triangle_has_no_errors() {
        let mut topo = Topology::new(&Session::new());
        let v: Vec<_> = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]
            .iter()
            .map(|&(x, y)| topo.add_vertex(Point3::new(x, y, 0.0)))
            .collect();
        let f = topo.add_face_from_vertices(&v, None).unwrap();
        let shell = topo.add_shell(vec![f], ShellType::Outer).unwrap();
        let report = validate_manifold(&topo, shell);
        assert!(report.is_valid);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_three_face_edge_is_flagged() {
        let mut topo = Topology::new(&Session::new());
        let p = |x, y, z| Point3::new(x, y, z);
        let a = topo.add_vertex(p(0.0, 0.0, 0.0));
        let b = topo.add_vertex(p(1.0, 0.0, 0.0));
        let wings: Vec<_> = [p(0.5, 1.0, 0.0), p(0.5, -1.0, 0.0), p(0.5, 0.0, 1.0)]
            .into_iter()
            .map(|q| topo.add_vertex(q))
            .collect();
        let spine = topo.add_edge(a, b).unwrap();
        let (ab, ba) = topo.edges[spine].half_edges;

        let mut faces = Vec::new();
        for (i, &w) in wings.iter().enumerate() {
            // the third wing reuses a half-edge already in a loop
            let (start, end, h) = if i % 2 == 0 { (a, b, ab) } else { (b, a, ba) };
            let e1 = topo.add_edge(end, w).unwrap();
            let e2 = topo.add_edge(w, start).unwrap();
            let l = topo
                .add_loop(&[h, topo.edges[e1].half_edges.0, topo.edges[e2].half_edges.0])
                .unwrap();
            faces.push(topo.add_face(None, l, &[]).unwrap());
        }
        let shell = topo.add_shell(faces, ShellType::Outer).unwrap();

        let report = validate_manifold(&topo, shell);
        assert!(!report.is_valid);
        assert!(report.has(|f| matches!(
            f,
            ValidationFinding::NonManifoldEdge { edge, faces: 3 } if *edge == spine
        )));
    }

    #[test]
    fn test_bowtie_vertex_is_flagged() {
        let mut topo = Topology::new(&Session::new());
        let (v1, f1) = tetrahedron(&mut topo);
        // second tetrahedron touching the first only at vertex 0
        let (v2, f2) = tetrahedron_with(&mut topo, Point3::new(-1.0, -1.0, -1.0), 1.0, &OUTWARD);
        let apex = v2[0];
        let mut faces = f1;
        faces.extend(f2);
        let shell = topo.add_shell(faces, ShellType::Outer).unwrap();
        assert!(!validate_manifold(&topo, shell)
            .has(|f| matches!(f, ValidationFinding::NonManifoldVertex(_))));

        // glue: re-point the second solid's corner half-edges at vertex 0
        let shared = v1[0];
        let hes: Vec<HalfEdgeId> = topo
            .half_edges
            .iter()
            .filter(|(_, he)| he.origin == apex)
            .map(|(h, _)| h)
            .collect();
        for h in hes {
            topo.half_edges[h].origin = shared;
        }
        let moved = topo.vertices[apex].edges.clone();
        for e in moved {
            let edge = &mut topo.edges[e];
            if edge.vertices.0 == apex {
                edge.vertices.0 = shared;
            }
            if edge.vertices.1 == apex {
                edge.vertices.1 = shared;
            }
            topo.vertices[shared].edges.push(e);
        }
        topo.vertices[apex].edges.clear();

        let report = validate_manifold(&topo, shell);
        assert!(report.has(|f| *f == ValidationFinding::NonManifoldVertex(shared)));
    }

    #[test]
    fn test_two_skins_in_one_shell_are_disconnected() {
        let mut topo = Topology::new(&Session::new());
        let (_, mut faces) = tetrahedron(&mut topo);
        let (_, far) = tetrahedron_with(&mut topo, Point3::new(5.0, 0.0, 0.0), 1.0, &OUTWARD);
        faces.extend(far);
        let shell = topo.add_shell(faces, ShellType::Outer).unwrap();
        let report = validate_manifold(&topo, shell);
        assert_eq!(
            report.errors,
            vec![ValidationFinding::DisconnectedShell {
                shell,
                components: 2
            }]
        );
    }

    #[test]
    fn test_torus_grid_is_valid() {
        let mut topo = Topology::new(&Session::new());
        let faces = torus_grid(&mut topo);
        let shell = topo.add_shell(faces, ShellType::Outer).unwrap();
        assert!(validate_manifold(&topo, shell).is_valid);
    }

    #[test]
    fn test_conflicting_winding_is_twin_mismatch() {
        let mut topo = Topology::new(&Session::new());
        let mut cycles = OUTWARD;
        cycles[0] = [0, 1, 2];
        let (_, faces) = tetrahedron_with(&mut topo, Point3::origin(), 1.0, &cycles);
        let shell = topo.add_shell(faces, ShellType::Outer).unwrap();
        let report = validate_manifold(&topo, shell);
        assert!(report.has(|f| matches!(f, ValidationFinding::TwinMismatch(_))));
    }

    #[test]
    fn test_missing_shell_is_dangling() {
        let mut topo = Topology::new(&Session::new());
        let (_, faces) = tetrahedron(&mut topo);
        let shell = topo.add_shell(faces, ShellType::Outer).unwrap();
        topo.shells.remove(shell);
        let report = validate_manifold(&topo, shell);
        assert!(matches!(
            report.errors.as_slice(),
            [ValidationFinding::DanglingReference(_)]
        ));
    }
}
