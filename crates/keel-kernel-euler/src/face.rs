use keel_kernel_math::{newell_normal, Point3};
use keel_kernel_topo::{EdgeId, FaceId, HalfEdgeId, LoopId, Topology, TopoError, VertexId};
use tracing::debug;

use crate::{EulerError, Result};

/// Crossing-number test of `p` against `polygon`, projected along its
/// dominant normal axis.
fn point_in_polygon(p: &Point3, polygon: &[Point3]) -> bool {
    let n = newell_normal(polygon);
    let (i, j) = if n.x.abs() >= n.y.abs() && n.x.abs() >= n.z.abs() {
        (1, 2)
    } else if n.y.abs() >= n.z.abs() {
        (2, 0)
    } else {
        (0, 1)
    };
    let (px, py) = (p[i], p[j]);
    let mut inside = false;
    for (k, a) in polygon.iter().enumerate() {
        let b = polygon[(k + 1) % polygon.len()];
        let (ax, ay, bx, by) = (a[i], a[j], b[i], b[j]);
        if (ay > py) != (by > py) && px < ax + (py - ay) * (bx - ax) / (by - ay) {
            inside = !inside;
        }
    }
    inside
}

/// Checked endpoints of a chord across the outer loop of `f`.
struct Chord {
    outer: LoopId,
    at_a: HalfEdgeId,
    at_b: HalfEdgeId,
}

fn plan_chord(topo: &Topology, f: FaceId, va: VertexId, vb: VertexId) -> Result<Chord> {
    let face = topo.faces.get(f).ok_or(TopoError::MissingFace(f))?;
    if va == vb {
        return Err(EulerError::NotSplittable("chord endpoints coincide".into()));
    }
    let outer = face.outer_loop;
    let find = |v: VertexId| {
        topo.find_half_edge(outer, v)
            .filter(|h| topo.half_edges[*h].prev.is_some())
            .ok_or_else(|| EulerError::NotSplittable("vertex is not on the outer boundary".into()))
    };
    Ok(Chord {
        outer,
        at_a: find(va)?,
        at_b: find(vb)?,
    })
}

/// Insert edge `va -> vb` across the outer loop. The original loop keeps the
/// `vb -> va` side; returns the new edge and the half-edges of the other
/// side, starting with the new `va -> vb` half-edge.
fn insert_chord(
    topo: &mut Topology,
    chord: &Chord,
    va: VertexId,
    vb: VertexId,
) -> Result<(EdgeId, Vec<HalfEdgeId>)> {
    let e = topo.add_edge(va, vb)?;
    let (n1, n2) = topo.edges[e].half_edges;
    let (ha, hb) = (chord.at_a, chord.at_b);
    let pa = topo.half_edges[ha].prev;
    let pb = topo.half_edges[hb].prev;

    topo.half_edges[n1].prev = pa;
    topo.half_edges[n1].next = Some(hb);
    if let Some(p) = pa {
        topo.half_edges[p].next = Some(n1);
    }
    topo.half_edges[hb].prev = Some(n1);

    topo.half_edges[n2].prev = pb;
    topo.half_edges[n2].next = Some(ha);
    if let Some(p) = pb {
        topo.half_edges[p].next = Some(n2);
    }
    topo.half_edges[ha].prev = Some(n2);

    topo.half_edges[n2].loop_id = Some(chord.outer);
    topo.loops[chord.outer].half_edge = n2;

    let mut side = vec![n1];
    let mut h = hb;
    while h != n1 && side.len() <= topo.half_edges.len() {
        side.push(h);
        match topo.half_edges[h].next {
            Some(next) => h = next,
            None => break,
        }
    }
    Ok((e, side))
}

fn loop_edges(topo: &Topology, l: LoopId) -> Vec<EdgeId> {
    topo.loop_half_edges(l)
        .filter_map(|h| topo.half_edges.get(h).map(|he| he.edge))
        .collect()
}

/// Move the holes of `from` that lie inside `to`'s outer loop over to `to`.
fn redistribute_holes(topo: &mut Topology, from: FaceId, to: FaceId) {
    let boundary = topo.loop_points(topo.faces[to].outer_loop);
    let holes = topo.faces[from].inner_loops.clone();
    for hole in holes {
        let inside = topo
            .loop_points(hole)
            .first()
            .is_some_and(|p| point_in_polygon(p, &boundary));
        if inside {
            topo.faces[from].inner_loops.retain(|l| *l != hole);
            topo.faces[to].inner_loops.push(hole);
            topo.loops[hole].face = Some(to);
            for e in loop_edges(topo, hole) {
                topo.refresh_edge_faces(e);
            }
        }
    }
}

/// Make Edge Face: split face `f` with a new edge from `va` to `vb`.
///
/// Both vertices must lie on the outer loop. The original face keeps the
/// `vb -> va` side; one new face (same surface and orientation) takes the
/// `va -> vb` side together with any holes inside it. Returns the new edge
/// and the new face.
pub fn make_edge_face(
    topo: &mut Topology,
    f: FaceId,
    va: VertexId,
    vb: VertexId,
) -> Result<(EdgeId, FaceId)> {
    let chord = plan_chord(topo, f, va, vb)?;
    let (e, side) = insert_chord(topo, &chord, va, vb)?;

    let (surface, orientation, shell) = {
        let face = &topo.faces[f];
        (face.surface, face.orientation, face.shell)
    };
    let l1 = topo.add_loop(&side)?;
    let f_new = topo.add_face(surface, l1, &[])?;
    topo.faces[f_new].orientation = orientation;
    if let Some(s) = shell {
        topo.faces[f_new].shell = Some(s);
        topo.shells[s].faces.push(f_new);
    }
    redistribute_holes(topo, f, f_new);
    for edge in loop_edges(topo, l1) {
        topo.refresh_edge_faces(edge);
    }

    debug!(?f, ?f_new, ?e, "make_edge_face");
    Ok((e, f_new))
}

/// Split face `f` along a new edge between two outer-boundary vertices.
///
/// Like [`make_edge_face`], but the original face is released and two new
/// faces are returned: the `vb -> va` side first, then the `va -> vb` side.
pub fn split_face(
    topo: &mut Topology,
    f: FaceId,
    va: VertexId,
    vb: VertexId,
) -> Result<(FaceId, FaceId)> {
    let (e, f_b) = make_edge_face(topo, f, va, vb)?;

    let old = topo.faces.remove(f).ok_or(TopoError::MissingFace(f))?;
    let f_a = topo.add_face(old.surface, old.outer_loop, &old.inner_loops)?;
    topo.faces[f_a].orientation = old.orientation;
    if let Some(s) = old.shell {
        topo.faces[f_a].shell = Some(s);
        for face in topo.shells[s].faces.iter_mut() {
            if *face == f {
                *face = f_a;
            }
        }
    }
    for l in topo.face_loops(f_a) {
        for edge in loop_edges(topo, l) {
            topo.refresh_edge_faces(edge);
        }
    }

    debug!(?f, ?f_a, ?f_b, ?e, "split_face");
    Ok((f_a, f_b))
}

/// Kill Edge Face: remove edge `e` and merge the two faces it separates.
///
/// Inverse of [`make_edge_face`]. The edge's half-edges must lie on the
/// outer loops of two distinct faces; the second face is merged into the
/// first, which is returned.
pub fn kill_edge_face(topo: &mut Topology, e: EdgeId) -> Result<FaceId> {
    let edge = topo.edges.get(e).ok_or(TopoError::MissingEdge(e))?;
    let (h1, h2) = edge.half_edges;
    let side = |h: HalfEdgeId| {
        let he = &topo.half_edges[h];
        let l = he.loop_id?;
        let f = topo.loops.get(l)?.face?;
        (topo.faces.get(f)?.outer_loop == l && he.prev.is_some() && he.next.is_some())
            .then_some((l, f))
    };
    let ((l1, f1), (l2, f2)) = match (side(h1), side(h2)) {
        (Some(a), Some(b)) if a.1 != b.1 => (a, b),
        (Some(_), Some(_)) => {
            return Err(EulerError::NotKillable(
                "edge does not separate two faces".into(),
            ))
        }
        _ => {
            return Err(EulerError::NotKillable(
                "edge must lie on the outer loops of two faces".into(),
            ))
        }
    };

    let link = |h: HalfEdgeId| {
        let he = &topo.half_edges[h];
        (he.prev.unwrap_or(h), he.next.unwrap_or(h))
    };
    let (a, b) = link(h1);
    let (c, d) = link(h2);
    topo.half_edges[a].next = Some(d);
    topo.half_edges[d].prev = Some(a);
    topo.half_edges[c].next = Some(b);
    topo.half_edges[b].prev = Some(c);

    topo.loops[l1].half_edge = a;
    let merged: Vec<HalfEdgeId> = topo.loop_half_edges(l1).collect();
    for &h in &merged {
        topo.half_edges[h].loop_id = Some(l1);
    }
    topo.loops.remove(l2);

    let gone = topo.faces.remove(f2).ok_or(TopoError::MissingFace(f2))?;
    for &hole in &gone.inner_loops {
        topo.loops[hole].face = Some(f1);
        topo.faces[f1].inner_loops.push(hole);
    }
    if let Some(shell) = gone.shell.and_then(|s| topo.shells.get_mut(s)) {
        shell.faces.retain(|x| *x != f2);
    }

    topo.remove_edge(e)?;
    for l in topo.face_loops(f1) {
        for edge in loop_edges(topo, l) {
            topo.refresh_edge_faces(edge);
        }
    }

    debug!(?e, ?f1, ?f2, "kill_edge_face");
    Ok(f1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_kernel_topo::{Session, ShellType};

    fn square(topo: &mut Topology) -> (Vec<VertexId>, FaceId) {
        let v: Vec<_> = [(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)]
            .iter()
            .map(|&(x, y)| topo.add_vertex(Point3::new(x, y, 0.0)))
            .collect();
        let f = topo.add_face_from_vertices(&v, None).unwrap();
        (v, f)
    }

    #[test]
    fn test_mef_then_kef_round_trip() {
        let mut topo = Topology::new(&Session::new());
        let (v, f) = square(&mut topo);

        let (e, f_new) = make_edge_face(&mut topo, f, v[0], v[2]).unwrap();
        assert_eq!(topo.faces.len(), 2);
        assert_eq!(topo.edges.len(), 5);
        assert_eq!(topo.loop_len(topo.faces[f].outer_loop), 3);
        assert_eq!(topo.loop_len(topo.faces[f_new].outer_loop), 3);
        let mut diag_faces = topo.edges[e].faces.clone();
        diag_faces.sort();
        let mut expected = vec![f, f_new];
        expected.sort();
        assert_eq!(diag_faces, expected);
        let e23 = topo.edge_between(v[2], v[3]).unwrap();
        assert_eq!(topo.edges[e23].faces, vec![f_new]);

        let survivor = kill_edge_face(&mut topo, e).unwrap();
        assert!(survivor == f || survivor == f_new);
        assert_eq!(topo.faces.len(), 1);
        assert_eq!(topo.edges.len(), 4);
        assert_eq!(topo.loops.len(), 1);
        assert_eq!(topo.loop_len(topo.faces[survivor].outer_loop), 4);
        assert!(topo.edges.values().all(|edge| edge.faces == vec![survivor]));
        let mut verts = topo.face_vertices(survivor);
        verts.sort();
        let mut expected = v.clone();
        expected.sort();
        assert_eq!(verts, expected);
    }

    #[test]
    fn test_split_face_releases_original() {
        let mut topo = Topology::new(&Session::new());
        let (v, f) = square(&mut topo);
        let shell = topo.add_shell(vec![f], ShellType::Outer).unwrap();

        let (fa, fb) = split_face(&mut topo, f, v[1], v[3]).unwrap();
        assert!(!topo.faces.contains_key(f));
        assert_eq!(topo.faces.len(), 2);
        assert_eq!(topo.shells[shell].faces.len(), 2);
        assert!(topo.shells[shell].faces.contains(&fa));
        assert!(topo.shells[shell].faces.contains(&fb));
        assert!(topo.edges.values().all(|e| !e.faces.contains(&f)));
        assert_eq!(topo.loop_len(topo.faces[fa].outer_loop), 3);
        assert_eq!(topo.loop_len(topo.faces[fb].outer_loop), 3);
    }

    #[test]
    fn test_split_face_requires_boundary_vertices() {
        let mut topo = Topology::new(&Session::new());
        let (v, f) = square(&mut topo);
        let inner = topo.add_vertex(Point3::new(2.0, 2.0, 0.0));
        let edges = topo.edges.len();

        assert!(matches!(
            split_face(&mut topo, f, v[0], inner),
            Err(EulerError::NotSplittable(_))
        ));
        assert!(matches!(
            split_face(&mut topo, f, v[0], v[0]),
            Err(EulerError::NotSplittable(_))
        ));
        assert_eq!(topo.edges.len(), edges);
        assert!(topo.faces.contains_key(f));
    }

    #[test]
    fn test_kef_rejects_boundary_edge() {
        let mut topo = Topology::new(&Session::new());
        let (v, _) = square(&mut topo);
        let e = topo.edge_between(v[0], v[1]).unwrap();
        assert!(matches!(
            kill_edge_face(&mut topo, e),
            Err(EulerError::NotKillable(_))
        ));
        assert_eq!(topo.edges.len(), 4);
    }

    #[test]
    fn test_mef_moves_enclosed_hole() {
        let mut topo = Topology::new(&Session::new());
        let (v, f) = square(&mut topo);
        // small triangular hole near the (0, 4) corner
        let h: Vec<_> = [(0.5, 3.0), (1.0, 3.5), (0.5, 3.5)]
            .iter()
            .map(|&(x, y)| topo.add_vertex(Point3::new(x, y, 0.0)))
            .collect();
        let e0 = topo.add_edge(h[0], h[1]).unwrap();
        let e1 = topo.add_edge(h[1], h[2]).unwrap();
        let e2 = topo.add_edge(h[2], h[0]).unwrap();
        let hes: Vec<_> = [e0, e1, e2]
            .iter()
            .map(|e| topo.edges[*e].half_edges.1)
            .rev()
            .collect();
        let hole = topo.add_loop(&hes).unwrap();
        topo.faces[f].inner_loops.push(hole);
        topo.attach_loop(hole, f);

        // the v0 -> v2 side contains v3 = (0, 4)
        let (_, f_new) = make_edge_face(&mut topo, f, v[0], v[2]).unwrap();
        assert_eq!(topo.faces[f_new].inner_loops, vec![hole]);
        assert!(topo.faces[f].inner_loops.is_empty());
        assert_eq!(topo.loops[hole].face, Some(f_new));
        assert_eq!(topo.edges[e0].faces, vec![f_new]);
    }
}
