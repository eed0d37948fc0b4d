use keel_kernel_math::Point3;
use keel_kernel_topo::{EdgeId, LoopId, Topology, TopoError, VertexId};
use tracing::debug;

use crate::{EulerError, Result};

/// Make Edge Vertex: grow a new vertex at `position` from `v`.
///
/// With `within`, the new edge is spliced into that loop as a strut
/// (`... -> v -> new -> v -> ...`) and registered on the loop's face.
/// Returns the new vertex and edge.
pub fn make_edge_vertex(
    topo: &mut Topology,
    v: VertexId,
    position: Point3,
    within: Option<LoopId>,
) -> Result<(VertexId, EdgeId)> {
    topo.vertex_point(v).ok_or(TopoError::MissingVertex(v))?;
    let splice = match within {
        Some(l) => {
            if !topo.loops.contains_key(l) {
                return Err(TopoError::MissingLoop(l).into());
            }
            let incoming = topo
                .loop_half_edges(l)
                .find(|h| topo.half_edge_dest(*h) == Some(v))
                .ok_or(EulerError::VertexNotOnLoop)?;
            Some((l, incoming))
        }
        None => None,
    };

    let w = topo.add_vertex(position);
    let e = topo.add_edge(v, w)?;
    let (out, back) = topo.edges[e].half_edges;

    if let Some((l, incoming)) = splice {
        let outgoing = topo.half_edges[incoming].next;
        topo.half_edges[incoming].next = Some(out);
        let he = &mut topo.half_edges[out];
        he.prev = Some(incoming);
        he.next = Some(back);
        he.loop_id = Some(l);
        let he = &mut topo.half_edges[back];
        he.prev = Some(out);
        he.next = outgoing;
        he.loop_id = Some(l);
        if let Some(o) = outgoing {
            topo.half_edges[o].prev = Some(back);
        }
        if let Some(f) = topo.loops[l].face {
            topo.edges[e].faces.push(f);
        }
    }

    debug!(?v, ?w, ?e, ?within, "make_edge_vertex");
    Ok((w, e))
}

/// Kill Edge Vertex: remove edge `e` and its degree-1 end vertex `v`.
///
/// Inverse of [`make_edge_vertex`]. Returns the surviving end vertex.
pub fn kill_edge_vertex(topo: &mut Topology, e: EdgeId, v: VertexId) -> Result<VertexId> {
    let edge = topo.edges.get(e).ok_or(TopoError::MissingEdge(e))?;
    let (a, b) = edge.vertices;
    if v != a && v != b {
        return Err(EulerError::NotKillable(
            "vertex is not an end of the edge".into(),
        ));
    }
    if a == b {
        return Err(EulerError::NotKillable("edge is closed".into()));
    }
    let degree = topo.degree(v);
    if degree != 1 {
        return Err(EulerError::NotKillable(format!("vertex has degree {degree}")));
    }
    let u = if v == a { b } else { a };

    let (h0, h1) = edge.half_edges;
    let (outgoing, incoming) = if topo.half_edges[h0].origin == v {
        (h0, h1)
    } else {
        (h1, h0)
    };
    if topo.half_edges[incoming].origin != u {
        return Err(EulerError::NotKillable(
            "half-edge origins are inconsistent".into(),
        ));
    }

    let hin = &topo.half_edges[incoming];
    let hout = &topo.half_edges[outgoing];
    let bridge = match (hin.loop_id, hout.loop_id) {
        (None, None) => None,
        (Some(l1), Some(l2)) if l1 == l2 && hin.next == Some(outgoing) => {
            if hin.prev == Some(outgoing) {
                return Err(EulerError::NotKillable("loop would become empty".into()));
            }
            Some((l1, hin.prev, hout.next))
        }
        _ => {
            return Err(EulerError::NotKillable(
                "edge is not a strut of a single loop".into(),
            ))
        }
    };

    if let Some((l, before, after)) = bridge {
        if let Some(p) = before {
            topo.half_edges[p].next = after;
        }
        if let Some(n) = after {
            topo.half_edges[n].prev = before;
        }
        let start = topo.loops[l].half_edge;
        if start == incoming || start == outgoing {
            if let Some(n) = after {
                topo.loops[l].half_edge = n;
            }
        }
    }

    topo.remove_edge(e)?;
    topo.remove_vertex(v)?;
    debug!(?e, ?v, ?u, "kill_edge_vertex");
    Ok(u)
}
