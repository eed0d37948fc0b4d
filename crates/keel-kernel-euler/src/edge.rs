use keel_kernel_geom::{Curve, GeometryStore};
use keel_kernel_math::Point3;
use keel_kernel_topo::{EdgeCurve, EdgeId, HalfEdgeId, Topology, TopoError, VertexId};
use tracing::debug;

use crate::{EulerError, Result};

/// Parameter slack when deciding two curve intervals meet.
const PARAM_TOL: f64 = 1e-9;

/// The half-edge of `e` that starts at the edge's first vertex, and its twin.
fn oriented_halves(topo: &Topology, e: EdgeId) -> Result<(HalfEdgeId, HalfEdgeId)> {
    let edge = topo.edges.get(e).ok_or(TopoError::MissingEdge(e))?;
    let (h0, h1) = edge.half_edges;
    if topo.half_edges[h1].origin == edge.vertices.0 && topo.half_edges[h0].origin != edge.vertices.0
    {
        Ok((h1, h0))
    } else {
        Ok((h0, h1))
    }
}

fn point_on_edge(topo: &Topology, geom: &GeometryStore, e: EdgeId, t: f64) -> Result<Point3> {
    let edge = topo.edges.get(e).ok_or(TopoError::MissingEdge(e))?;
    if let Some(ec) = edge.curve {
        if let Some(curve) = geom.curve(ec.curve) {
            return Ok(curve.evaluate(ec.parameter_at(t)));
        }
    }
    let (a, b) = edge.vertices;
    let pa = topo.vertex_point(a).ok_or(TopoError::MissingVertex(a))?;
    let pb = topo.vertex_point(b).ok_or(TopoError::MissingVertex(b))?;
    Ok(pa + (pb - pa) * t)
}

/// Split edge `e` at normalized position `t ∈ (0, 1)`.
///
/// A new vertex is placed on the edge's curve (or chord) at `t`. The
/// original edge keeps the part from its first vertex to the new one; a new
/// edge covers the rest. Loops on both sides gain one half-edge each.
///
/// A closed edge (both ends on one vertex) becomes two edges between that
/// vertex and the new one.
///
/// Returns the new vertex and the new edge.
pub fn split_edge(
    topo: &mut Topology,
    geom: &GeometryStore,
    e: EdgeId,
    t: f64,
) -> Result<(VertexId, EdgeId)> {
    if !t.is_finite() || t <= 0.0 || t >= 1.0 {
        return Err(EulerError::InvalidParameter(t));
    }
    let (ha, hb) = oriented_halves(topo, e)?;
    let position = point_on_edge(topo, geom, e, t)?;
    let (v1, v2) = topo.edges[e].vertices;
    let curve = topo.edges[e].curve;
    let faces = topo.edges[e].faces.clone();

    let vm = topo.add_vertex(position);
    let e2 = topo.add_edge(vm, v2)?;
    let (hc, hd) = topo.edges[e2].half_edges;

    // e now runs v1 -> vm
    topo.half_edges[hb].origin = vm;
    topo.edges[e].vertices = (v1, vm);
    // a closed edge still touches v1 == v2 through its first half
    if v2 != v1 {
        topo.vertices[v2].edges.retain(|x| *x != e);
    }
    topo.vertices[vm].edges.push(e);

    // ha -> hc -> (old ha.next)
    if let Some(l) = topo.half_edges[ha].loop_id {
        let after = topo.half_edges[ha].next;
        topo.half_edges[hc].loop_id = Some(l);
        topo.half_edges[hc].prev = Some(ha);
        topo.half_edges[hc].next = after;
        if let Some(n) = after {
            topo.half_edges[n].prev = Some(hc);
        }
        topo.half_edges[ha].next = Some(hc);
    }
    // (old hb.prev) -> hd -> hb
    if let Some(l) = topo.half_edges[hb].loop_id {
        let before = topo.half_edges[hb].prev;
        topo.half_edges[hd].loop_id = Some(l);
        topo.half_edges[hd].next = Some(hb);
        topo.half_edges[hd].prev = before;
        if let Some(p) = before {
            topo.half_edges[p].next = Some(hd);
        }
        topo.half_edges[hb].prev = Some(hd);
    }

    if let Some(ec) = curve {
        let tm = ec.parameter_at(t);
        topo.edges[e].curve = Some(EdgeCurve { t_end: tm, ..ec });
        topo.edges[e2].curve = Some(EdgeCurve { t_start: tm, ..ec });
    }
    topo.edges[e2].faces = faces;

    debug!(?e, ?e2, ?vm, t, "split_edge");
    Ok((vm, e2))
}

/// Merge two edges that meet at a degree-2 vertex into one edge.
///
/// Inverse of [`split_edge`]. The edges must share exactly one vertex of
/// degree 2, bound the same faces, and be consecutive in every loop that
/// uses them. Contiguous intervals of one shared curve are merged into one
/// interval; otherwise a line carrier between the outer vertices is created.
///
/// `e1` survives; `e2` and the shared vertex are removed.
pub fn merge_edges(
    topo: &mut Topology,
    geom: &mut GeometryStore,
    e1: EdgeId,
    e2: EdgeId,
) -> Result<EdgeId> {
    if e1 == e2 {
        return Err(EulerError::NotMergeable("an edge cannot merge with itself".into()));
    }
    let edge1 = topo.edges.get(e1).ok_or(TopoError::MissingEdge(e1))?;
    let edge2 = topo.edges.get(e2).ok_or(TopoError::MissingEdge(e2))?;
    let (a1, b1) = edge1.vertices;
    let (a2, b2) = edge2.vertices;

    let shared: Vec<VertexId> = [a1, b1]
        .into_iter()
        .filter(|v| *v == a2 || *v == b2)
        .collect();
    let vm = match shared.as_slice() {
        [v] => *v,
        [] => return Err(EulerError::NotMergeable("edges share no vertex".into())),
        _ => return Err(EulerError::NotMergeable("edges share both vertices".into())),
    };
    if topo.degree(vm) != 2 {
        return Err(EulerError::NotMergeable(format!(
            "shared vertex has degree {}",
            topo.degree(vm)
        )));
    }
    let mut f1 = edge1.faces.clone();
    let mut f2 = edge2.faces.clone();
    f1.sort();
    f2.sort();
    if f1 != f2 {
        return Err(EulerError::NotMergeable("edges bound different faces".into()));
    }

    let a = if a1 == vm { b1 } else { a1 };
    let b = if a2 == vm { b2 } else { a2 };

    // p1: a -> vm, q1: vm -> a (e1); p2: vm -> b, q2: b -> vm (e2)
    let pick = |e: EdgeId, from: VertexId| -> Option<(HalfEdgeId, HalfEdgeId)> {
        let (h0, h1) = topo.edges[e].half_edges;
        match (topo.half_edges[h0].origin, topo.half_edges[h1].origin) {
            (o0, o1) if o0 == from && o1 != from => Some((h0, h1)),
            (o0, o1) if o1 == from && o0 != from => Some((h1, h0)),
            _ => None,
        }
    };
    let ((p1, q1), (p2, q2)) = match (pick(e1, a), pick(e2, vm)) {
        (Some(x), Some(y)) => (x, y),
        _ => {
            return Err(EulerError::NotMergeable(
                "half-edge origins are inconsistent".into(),
            ))
        }
    };
    let consecutive = |first: HalfEdgeId, second: HalfEdgeId| {
        let (h1, h2) = (&topo.half_edges[first], &topo.half_edges[second]);
        match (h1.loop_id, h2.loop_id) {
            (None, None) => true,
            (Some(l1), Some(l2)) => l1 == l2 && h1.next == Some(second),
            _ => false,
        }
    };
    if !consecutive(p1, p2) || !consecutive(q2, q1) {
        return Err(EulerError::NotMergeable(
            "edges are not consecutive in a loop".into(),
        ));
    }

    let merged_curve = merged_carrier(topo, geom, e1, e2, a, b);

    // splice e2's half-edges out of their loops
    if topo.half_edges[p1].loop_id.is_some() {
        let after = topo.half_edges[p2].next;
        topo.half_edges[p1].next = after;
        if let Some(n) = after {
            topo.half_edges[n].prev = Some(p1);
        }
    }
    if topo.half_edges[q1].loop_id.is_some() {
        let before = topo.half_edges[q2].prev;
        topo.half_edges[q1].prev = before;
        if let Some(p) = before {
            topo.half_edges[p].next = Some(q1);
        }
    }
    for (gone, keep) in [(p2, p1), (q2, q1)] {
        if let Some(l) = topo.half_edges[gone].loop_id {
            if topo.loops[l].half_edge == gone {
                topo.loops[l].half_edge = keep;
            }
        }
    }
    topo.half_edges[q1].origin = b;

    topo.remove_edge(e2)?;
    topo.remove_vertex(vm)?;
    topo.vertices[b].edges.push(e1);
    let edge = &mut topo.edges[e1];
    edge.vertices = if edge.vertices.0 == a { (a, b) } else { (b, a) };
    edge.curve = merged_curve;

    debug!(?e1, ?e2, ?vm, "merge_edges");
    Ok(e1)
}

/// Carrier for the merged edge running `a -> b`, expressed in the surviving
/// edge's vertex order.
fn merged_carrier(
    topo: &Topology,
    geom: &mut GeometryStore,
    e1: EdgeId,
    e2: EdgeId,
    a: VertexId,
    b: VertexId,
) -> Option<EdgeCurve> {
    let edge1 = &topo.edges[e1];
    let edge2 = &topo.edges[e2];
    let forward = edge1.vertices.0 == a;

    // parameters in a -> vm -> b order
    let along = |ec: EdgeCurve, starts_at_outer: bool| {
        if starts_at_outer {
            (ec.t_start, ec.t_end)
        } else {
            (ec.t_end, ec.t_start)
        }
    };
    let orient = |t_a: f64, t_b: f64| if forward { (t_a, t_b) } else { (t_b, t_a) };

    match (edge1.curve, edge2.curve) {
        (None, None) => None,
        (Some(c1), Some(c2)) if c1.curve == c2.curve => {
            let (pa, pm1) = along(c1, edge1.vertices.0 == a);
            let (pm2, pb) = along(c2, edge2.vertices.0 != b);
            let contiguous = (pm1 - pm2).abs() < PARAM_TOL && (pm1 - pa) * (pb - pm2) > 0.0;
            if contiguous {
                let (t_start, t_end) = orient(pa, pb);
                Some(EdgeCurve {
                    curve: c1.curve,
                    t_start,
                    t_end,
                })
            } else {
                Some(new_line(topo, geom, a, b, forward))
            }
        }
        _ => Some(new_line(topo, geom, a, b, forward)),
    }
}

fn new_line(
    topo: &Topology,
    geom: &mut GeometryStore,
    a: VertexId,
    b: VertexId,
    forward: bool,
) -> EdgeCurve {
    let pa = topo.vertex_point(a).unwrap_or_else(Point3::origin);
    let pb = topo.vertex_point(b).unwrap_or_else(Point3::origin);
    let (start, end) = if forward { (pa, pb) } else { (pb, pa) };
    EdgeCurve {
        curve: geom.add_curve(Curve::line(start, end)),
        t_start: 0.0,
        t_end: 1.0,
    }
}
