use std::collections::{HashSet, VecDeque};

use keel_kernel_geom::SurfaceId;
use keel_kernel_math::Point3;
use slotmap::SlotMap;
use tracing::debug;

use crate::{
    Edge, EdgeCurve, EdgeId, Face, FaceId, HalfEdge, HalfEdgeId, Loop, LoopId, Orientation,
    Result, Session, Shell, ShellId, ShellType, Solid, SolidId, TopoError, Topology, Vertex,
    VertexId,
};

/// Iterator over the half-edges of a loop, starting at `Loop::half_edge`.
///
/// Stops when the chain returns to the start, breaks, or has yielded as
/// many half-edges as the arena holds (a corrupt chain never loops forever).
pub struct LoopIter<'a> {
    topo: &'a Topology,
    start: Option<HalfEdgeId>,
    current: Option<HalfEdgeId>,
    remaining: usize,
}

impl Iterator for LoopIter<'_> {
    type Item = HalfEdgeId;

    fn next(&mut self) -> Option<HalfEdgeId> {
        let h = self.current?;
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let next = self.topo.half_edges.get(h).and_then(|he| he.next);
        self.current = match next {
            Some(n) if Some(n) != self.start => Some(n),
            _ => None,
        };
        Some(h)
    }
}

/// How one side of a vertex cycle is realized.
enum Side {
    /// Existing half-edge, free and already running the right way.
    Free(HalfEdgeId),
    /// Existing free half-edge running the wrong way.
    Reorigin(HalfEdgeId),
    /// No edge between the two vertices yet.
    New,
}

impl Topology {
    /// Create an empty topology whose entity ids come from `session`.
    pub fn new(session: &Session) -> Self {
        Self {
            session: session.clone(),
            vertices: SlotMap::with_key(),
            half_edges: SlotMap::with_key(),
            edges: SlotMap::with_key(),
            loops: SlotMap::with_key(),
            faces: SlotMap::with_key(),
            shells: SlotMap::with_key(),
            solids: SlotMap::with_key(),
        }
    }

    /// The session this topology draws ids from.
    pub fn session(&self) -> &Session {
        &self.session
    }

    // =========================================================================
    // Constructors
    // =========================================================================

    /// Add an isolated vertex.
    pub fn add_vertex(&mut self, point: Point3) -> VertexId {
        let id = self.session.next_id();
        self.vertices.insert(Vertex {
            id,
            point,
            edges: Vec::new(),
        })
    }

    /// Add an edge from `v1` to `v2` with its twin half-edge pair.
    ///
    /// The first half-edge starts at `v1`. The edge is registered on both
    /// vertices; neither half-edge belongs to a loop yet.
    pub fn add_edge(&mut self, v1: VertexId, v2: VertexId) -> Result<EdgeId> {
        self.check_vertex(v1)?;
        self.check_vertex(v2)?;

        let he1 = self.half_edges.insert(HalfEdge {
            origin: v1,
            twin: HalfEdgeId::default(),
            edge: EdgeId::default(),
            loop_id: None,
            next: None,
            prev: None,
        });
        let he2 = self.half_edges.insert(HalfEdge {
            origin: v2,
            twin: he1,
            edge: EdgeId::default(),
            loop_id: None,
            next: None,
            prev: None,
        });
        let id = self.session.next_id();
        let e = self.edges.insert(Edge {
            id,
            half_edges: (he1, he2),
            vertices: (v1, v2),
            curve: None,
            faces: Vec::new(),
        });
        self.half_edges[he1].twin = he2;
        self.half_edges[he1].edge = e;
        self.half_edges[he2].edge = e;

        self.vertices[v1].edges.push(e);
        if v1 != v2 {
            self.vertices[v2].edges.push(e);
        }
        Ok(e)
    }

    /// Bind (or clear) the curve carrier of an edge.
    pub fn set_edge_curve(&mut self, e: EdgeId, curve: Option<EdgeCurve>) -> Result<()> {
        self.edges.get_mut(e).ok_or(TopoError::MissingEdge(e))?.curve = curve;
        Ok(())
    }

    /// Link half-edges into a cyclic loop in the given order.
    ///
    /// Sets `next`/`prev` and loop membership. Chaining (end of one
    /// half-edge equals start of the next) is not checked.
    pub fn add_loop(&mut self, half_edges: &[HalfEdgeId]) -> Result<LoopId> {
        if half_edges.is_empty() {
            return Err(TopoError::TooFew {
                needed: 1,
                actual: 0,
            });
        }
        for &h in half_edges {
            self.check_half_edge(h)?;
        }

        let id = self.session.next_id();
        let l = self.loops.insert(Loop {
            id,
            half_edge: half_edges[0],
            face: None,
        });
        let n = half_edges.len();
        for (i, &h) in half_edges.iter().enumerate() {
            let he = &mut self.half_edges[h];
            he.next = Some(half_edges[(i + 1) % n]);
            he.prev = Some(half_edges[(i + n - 1) % n]);
            he.loop_id = Some(l);
        }
        Ok(l)
    }

    /// Add a face bounded by `outer` and the holes `inner`.
    ///
    /// The face is registered on every edge its loops use.
    pub fn add_face(
        &mut self,
        surface: Option<SurfaceId>,
        outer: LoopId,
        inner: &[LoopId],
    ) -> Result<FaceId> {
        self.check_loop(outer)?;
        for &l in inner {
            self.check_loop(l)?;
        }

        let id = self.session.next_id();
        let f = self.faces.insert(Face {
            id,
            outer_loop: outer,
            inner_loops: inner.to_vec(),
            surface,
            orientation: Orientation::Forward,
            shell: None,
        });
        for l in std::iter::once(outer).chain(inner.iter().copied()) {
            self.attach_loop(l, f);
        }
        Ok(f)
    }

    /// Make `l` a boundary of `f` and register `f` on the loop's edges.
    pub fn attach_loop(&mut self, l: LoopId, f: FaceId) {
        if let Some(lp) = self.loops.get_mut(l) {
            lp.face = Some(f);
        }
        let edges: Vec<EdgeId> = self
            .loop_half_edges(l)
            .filter_map(|h| self.half_edges.get(h).map(|he| he.edge))
            .collect();
        for e in edges {
            if let Some(edge) = self.edges.get_mut(e) {
                if !edge.faces.contains(&f) {
                    edge.faces.push(f);
                }
            }
        }
    }

    /// Recompute an edge's incident faces from the loops its half-edges bound.
    pub fn refresh_edge_faces(&mut self, e: EdgeId) {
        let Some(edge) = self.edges.get(e) else {
            return;
        };
        let mut faces = Vec::with_capacity(2);
        for h in [edge.half_edges.0, edge.half_edges.1] {
            let face = self
                .half_edges
                .get(h)
                .and_then(|he| he.loop_id)
                .and_then(|l| self.loops.get(l))
                .and_then(|lp| lp.face);
            if let Some(f) = face {
                if !faces.contains(&f) {
                    faces.push(f);
                }
            }
        }
        self.edges[e].faces = faces;
    }

    /// Group faces into a shell.
    pub fn add_shell(&mut self, faces: Vec<FaceId>, shell_type: ShellType) -> Result<ShellId> {
        for &f in &faces {
            self.check_face(f)?;
        }
        let id = self.session.next_id();
        let s = self.shells.insert(Shell {
            id,
            faces: faces.clone(),
            shell_type,
            solid: None,
        });
        for f in faces {
            self.faces[f].shell = Some(s);
        }
        Ok(s)
    }

    /// Create a solid from an outer shell and void shells.
    pub fn add_solid(&mut self, outer: ShellId, inner: Vec<ShellId>) -> Result<SolidId> {
        self.check_shell(outer)?;
        for &s in &inner {
            self.check_shell(s)?;
        }
        let id = self.session.next_id();
        let solid = self.solids.insert(Solid {
            id,
            outer_shell: outer,
            inner_shells: inner.clone(),
        });
        for s in std::iter::once(outer).chain(inner) {
            self.shells[s].solid = Some(solid);
        }
        Ok(solid)
    }

    /// Add a face whose outer loop visits `vertices` in order.
    ///
    /// Existing edges between consecutive vertices are reused by taking
    /// their free half-edge in the requested direction. When only the
    /// opposite half-edge is free it is re-originated; the resulting twin
    /// clash marks an orientation conflict for the orientation pass to
    /// repair. When no half-edge is free the call fails with
    /// [`TopoError::HalfEdgeInUse`] and nothing is modified.
    pub fn add_face_from_vertices(
        &mut self,
        vertices: &[VertexId],
        surface: Option<SurfaceId>,
    ) -> Result<FaceId> {
        let (l, conflicts) = self.loop_from_vertices(vertices)?;
        let f = self.add_face(surface, l, &[])?;
        if conflicts > 0 {
            debug!(?f, conflicts, "face added with orientation conflicts");
        }
        Ok(f)
    }

    /// Add a hole to `face` whose loop visits `vertices` in order.
    ///
    /// Sides are resolved against existing edges the same way as in
    /// [`Topology::add_face_from_vertices`].
    pub fn add_hole_from_vertices(&mut self, face: FaceId, vertices: &[VertexId]) -> Result<LoopId> {
        if !self.faces.contains_key(face) {
            return Err(TopoError::MissingFace(face));
        }
        let (l, _) = self.loop_from_vertices(vertices)?;
        self.faces[face].inner_loops.push(l);
        self.attach_loop(l, face);
        Ok(l)
    }

    fn loop_from_vertices(&mut self, vertices: &[VertexId]) -> Result<(LoopId, usize)> {
        let n = vertices.len();
        if n < 3 {
            return Err(TopoError::TooFew {
                needed: 3,
                actual: n,
            });
        }
        for (i, &v) in vertices.iter().enumerate() {
            self.check_vertex(v)?;
            if v == vertices[(i + 1) % n] {
                return Err(TopoError::DegenerateSide(v));
            }
        }

        // dry run: every side must be realizable before anything changes
        let mut claimed = HashSet::new();
        let mut pending: Vec<(VertexId, VertexId)> = Vec::new();
        for i in 0..n {
            let (a, b) = (vertices[i], vertices[(i + 1) % n]);
            match self.resolve_side(a, b, &claimed)? {
                Side::Free(h) | Side::Reorigin(h) => {
                    claimed.insert(h);
                }
                Side::New => {
                    if pending.contains(&(a, b)) {
                        return Err(TopoError::DuplicateSide(a, b));
                    }
                    if let Some(pos) = pending.iter().position(|p| *p == (b, a)) {
                        pending.swap_remove(pos);
                    } else {
                        pending.push((a, b));
                    }
                }
            }
        }

        let mut claimed = HashSet::new();
        let mut loop_half_edges = Vec::with_capacity(n);
        let mut conflicts = 0usize;
        for i in 0..n {
            let (a, b) = (vertices[i], vertices[(i + 1) % n]);
            let h = match self.resolve_side(a, b, &claimed)? {
                Side::Free(h) => h,
                Side::Reorigin(h) => {
                    self.half_edges[h].origin = a;
                    conflicts += 1;
                    h
                }
                Side::New => {
                    let e = self.add_edge(a, b)?;
                    self.edges[e].half_edges.0
                }
            };
            claimed.insert(h);
            loop_half_edges.push(h);
        }

        let l = self.add_loop(&loop_half_edges)?;
        Ok((l, conflicts))
    }

    fn resolve_side(
        &self,
        a: VertexId,
        b: VertexId,
        claimed: &HashSet<HalfEdgeId>,
    ) -> Result<Side> {
        let mut reorigin = None;
        let mut blocked = None;
        let incident = &self.vertices.get(a).ok_or(TopoError::MissingVertex(a))?.edges;
        for &e in incident {
            let Some(edge) = self.edges.get(e) else {
                continue;
            };
            let (v0, v1) = edge.vertices;
            if !((v0 == a && v1 == b) || (v0 == b && v1 == a)) {
                continue;
            }
            blocked = Some(e);
            for h in [edge.half_edges.0, edge.half_edges.1] {
                let Some(he) = self.half_edges.get(h) else {
                    continue;
                };
                if he.loop_id.is_some() || claimed.contains(&h) {
                    continue;
                }
                if he.origin == a {
                    return Ok(Side::Free(h));
                }
                reorigin.get_or_insert(h);
            }
        }
        match (reorigin, blocked) {
            (Some(h), _) => Ok(Side::Reorigin(h)),
            (None, Some(e)) => Err(TopoError::HalfEdgeInUse(e)),
            (None, None) => Ok(Side::New),
        }
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Reverse every loop of a face and toggle its orientation.
    ///
    /// Each half-edge is re-originated at its former end vertex, so a face
    /// whose half-edges clashed with their twins becomes consistent.
    pub fn flip_face(&mut self, f: FaceId) -> Result<()> {
        self.check_face(f)?;
        for l in self.face_loops(f) {
            let hes: Vec<HalfEdgeId> = self.loop_half_edges(l).collect();
            let n = hes.len();
            let dests: Vec<VertexId> = (0..n)
                .map(|i| self.half_edges[hes[(i + 1) % n]].origin)
                .collect();
            for (h, dest) in hes.into_iter().zip(dests) {
                let he = &mut self.half_edges[h];
                let old_origin = std::mem::replace(&mut he.origin, dest);
                std::mem::swap(&mut he.next, &mut he.prev);
                // a twin outside any loop simply follows
                let twin = he.twin;
                if let Some(t) = self.half_edges.get_mut(twin) {
                    if t.loop_id.is_none() {
                        t.origin = old_origin;
                    }
                }
            }
        }
        let face = &mut self.faces[f];
        face.orientation = face.orientation.flipped();
        Ok(())
    }

    /// Give every entity a fresh session id. Used after cloning a topology
    /// so the copy does not repeat the original's ids.
    pub fn reissue_ids(&mut self) {
        let session = self.session.clone();
        self.vertices.values_mut().for_each(|x| x.id = session.next_id());
        self.edges.values_mut().for_each(|x| x.id = session.next_id());
        self.loops.values_mut().for_each(|x| x.id = session.next_id());
        self.faces.values_mut().for_each(|x| x.id = session.next_id());
        self.shells.values_mut().for_each(|x| x.id = session.next_id());
        self.solids.values_mut().for_each(|x| x.id = session.next_id());
    }

    /// Unlink a loop's half-edges and delete the loop.
    ///
    /// Face back-references on edges are left to the caller.
    pub fn remove_loop(&mut self, l: LoopId) -> Result<Vec<HalfEdgeId>> {
        self.check_loop(l)?;
        let hes: Vec<HalfEdgeId> = self.loop_half_edges(l).collect();
        for &h in &hes {
            let he = &mut self.half_edges[h];
            if he.loop_id == Some(l) {
                he.loop_id = None;
                he.next = None;
                he.prev = None;
            }
        }
        self.loops.remove(l);
        Ok(hes)
    }

    /// Delete an edge and its half-edges, detaching it from its vertices.
    ///
    /// Callers must have rewired any loop that still runs through it.
    pub fn remove_edge(&mut self, e: EdgeId) -> Result<Edge> {
        let edge = self.edges.remove(e).ok_or(TopoError::MissingEdge(e))?;
        self.half_edges.remove(edge.half_edges.0);
        self.half_edges.remove(edge.half_edges.1);
        for v in [edge.vertices.0, edge.vertices.1] {
            if let Some(vertex) = self.vertices.get_mut(v) {
                vertex.edges.retain(|x| *x != e);
            }
        }
        Ok(edge)
    }

    /// Delete a vertex. Callers must have removed its edges.
    pub fn remove_vertex(&mut self, v: VertexId) -> Result<Vertex> {
        self.vertices.remove(v).ok_or(TopoError::MissingVertex(v))
    }

    /// Release a face and its loops. Edges and vertices are kept.
    pub fn remove_face(&mut self, f: FaceId) -> Result<()> {
        self.check_face(f)?;
        let loops = self.face_loops(f);
        let mut touched = Vec::new();
        for l in loops {
            for h in self.remove_loop(l)? {
                touched.push(self.half_edges[h].edge);
            }
        }
        for e in touched {
            if let Some(edge) = self.edges.get_mut(e) {
                edge.faces.retain(|x| *x != f);
            }
        }
        if let Some(face) = self.faces.remove(f) {
            if let Some(shell) = face.shell.and_then(|s| self.shells.get_mut(s)) {
                shell.faces.retain(|x| *x != f);
            }
        }
        Ok(())
    }

    /// Release a void shell or a free-standing shell, pruning orphans.
    pub fn remove_shell(&mut self, s: ShellId) -> Result<()> {
        let shell = self.shells.get(s).ok_or(TopoError::MissingShell(s))?;
        if let Some(solid) = shell.solid.and_then(|sol| self.solids.get_mut(sol)) {
            if solid.outer_shell == s {
                return Err(TopoError::OuterShell(s));
            }
            solid.inner_shells.retain(|x| *x != s);
        }
        let (edges, vertices) = self.shell_edges_and_vertices(s);
        self.release_shell(s)?;
        self.prune(&edges, &vertices);
        Ok(())
    }

    /// Release a solid top-down: shells, faces, loops, then any edges and
    /// vertices nothing references any more.
    pub fn remove_solid(&mut self, solid: SolidId) -> Result<()> {
        let shells = self.solid_shells(solid)?;
        let mut edges = Vec::new();
        let mut vertices = Vec::new();
        for &s in &shells {
            let (e, v) = self.shell_edges_and_vertices(s);
            edges.extend(e);
            vertices.extend(v);
        }
        for s in shells {
            self.release_shell(s)?;
        }
        self.solids.remove(solid);
        self.prune(&edges, &vertices);
        debug!(?solid, edges = edges.len(), "solid removed");
        Ok(())
    }

    fn release_shell(&mut self, s: ShellId) -> Result<()> {
        let faces = self.shells.get(s).map(|sh| sh.faces.clone()).unwrap_or_default();
        for f in faces {
            self.remove_face(f)?;
        }
        self.shells.remove(s);
        Ok(())
    }

    /// Remove the given edges and vertices if nothing references them.
    fn prune(&mut self, edges: &[EdgeId], vertices: &[VertexId]) {
        for &e in edges {
            let unused = self.edges.get(e).is_some_and(|edge| {
                edge.faces.is_empty()
                    && [edge.half_edges.0, edge.half_edges.1].iter().all(|h| {
                        self.half_edges
                            .get(*h)
                            .map_or(true, |he| he.loop_id.is_none())
                    })
            });
            if unused {
                let _ = self.remove_edge(e);
            }
        }
        for &v in vertices {
            if self.vertices.get(v).is_some_and(|vx| vx.edges.is_empty()) {
                self.vertices.remove(v);
            }
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Position of a vertex.
    pub fn vertex_point(&self, v: VertexId) -> Option<Point3> {
        self.vertices.get(v).map(|vx| vx.point)
    }

    /// Number of incident edges (0 for an unknown vertex).
    pub fn degree(&self, v: VertexId) -> usize {
        self.vertices.get(v).map_or(0, |vx| vx.edges.len())
    }

    /// End vertex of a half-edge: the start of the next half-edge in its
    /// loop, or the twin's origin for a free half-edge.
    pub fn half_edge_dest(&self, h: HalfEdgeId) -> Option<VertexId> {
        let he = self.half_edges.get(h)?;
        match he.next {
            Some(n) => self.half_edges.get(n).map(|nh| nh.origin),
            None => self.half_edges.get(he.twin).map(|t| t.origin),
        }
    }

    /// Iterate the half-edges of a loop in order.
    pub fn loop_half_edges(&self, l: LoopId) -> LoopIter<'_> {
        let start = self.loops.get(l).map(|lp| lp.half_edge);
        LoopIter {
            topo: self,
            start,
            current: start,
            remaining: self.half_edges.len(),
        }
    }

    /// Number of half-edges in a loop.
    pub fn loop_len(&self, l: LoopId) -> usize {
        self.loop_half_edges(l).count()
    }

    /// Start vertices of a loop's half-edges, in order.
    pub fn loop_vertices(&self, l: LoopId) -> Vec<VertexId> {
        self.loop_half_edges(l)
            .filter_map(|h| self.half_edges.get(h).map(|he| he.origin))
            .collect()
    }

    /// Positions of a loop's vertices, in order.
    pub fn loop_points(&self, l: LoopId) -> Vec<Point3> {
        self.loop_vertices(l)
            .into_iter()
            .filter_map(|v| self.vertex_point(v))
            .collect()
    }

    /// The half-edge of loop `l` that starts at `v`.
    pub fn find_half_edge(&self, l: LoopId, v: VertexId) -> Option<HalfEdgeId> {
        self.loop_half_edges(l)
            .find(|h| self.half_edges.get(*h).is_some_and(|he| he.origin == v))
    }

    /// Outer loop followed by inner loops (empty for an unknown face).
    pub fn face_loops(&self, f: FaceId) -> Vec<LoopId> {
        self.faces.get(f).map_or_else(Vec::new, |face| {
            std::iter::once(face.outer_loop)
                .chain(face.inner_loops.iter().copied())
                .collect()
        })
    }

    /// Vertices of a face's outer loop.
    pub fn face_vertices(&self, f: FaceId) -> Vec<VertexId> {
        self.faces
            .get(f)
            .map_or_else(Vec::new, |face| self.loop_vertices(face.outer_loop))
    }

    /// Some edge joining `a` and `b`, in either direction.
    pub fn edge_between(&self, a: VertexId, b: VertexId) -> Option<EdgeId> {
        let vertex = self.vertices.get(a)?;
        vertex.edges.iter().copied().find(|e| {
            self.edges.get(*e).is_some_and(|edge| {
                edge.vertices == (a, b) || edge.vertices == (b, a)
            })
        })
    }

    /// End vertices of an edge in carrier direction.
    pub fn edge_vertices(&self, e: EdgeId) -> Option<(VertexId, VertexId)> {
        self.edges.get(e).map(|edge| edge.vertices)
    }

    /// Chord length between an edge's end vertices.
    pub fn edge_length(&self, e: EdgeId) -> Option<f64> {
        let (a, b) = self.edge_vertices(e)?;
        Some((self.vertex_point(b)? - self.vertex_point(a)?).norm())
    }

    /// Split `faces` into groups joined through shared edges.
    ///
    /// Groups and their faces come in first-seen order. Faces touching only
    /// at a vertex end up in different groups, and faces outside `faces`
    /// never join two groups.
    pub fn face_components(&self, faces: &[FaceId]) -> Vec<Vec<FaceId>> {
        let members: HashSet<FaceId> = faces.iter().copied().collect();
        let mut seen = HashSet::new();
        let mut components = Vec::new();
        for &start in faces {
            if !seen.insert(start) {
                continue;
            }
            let mut component = vec![start];
            let mut queue = VecDeque::from([start]);
            while let Some(f) = queue.pop_front() {
                let edges: Vec<EdgeId> = self
                    .face_loops(f)
                    .into_iter()
                    .flat_map(|l| self.loop_half_edges(l))
                    .filter_map(|h| self.half_edges.get(h).map(|he| he.edge))
                    .collect();
                for e in edges {
                    let Some(edge) = self.edges.get(e) else {
                        continue;
                    };
                    for &n in &edge.faces {
                        if members.contains(&n) && seen.insert(n) {
                            component.push(n);
                            queue.push_back(n);
                        }
                    }
                }
            }
            components.push(component);
        }
        components
    }

    /// Edges used by the faces of a shell, each once, in first-seen order.
    pub fn shell_edges(&self, s: ShellId) -> Vec<EdgeId> {
        self.shell_edges_and_vertices(s).0
    }

    /// Vertices used by the faces of a shell, each once, in first-seen order.
    pub fn shell_vertices(&self, s: ShellId) -> Vec<VertexId> {
        self.shell_edges_and_vertices(s).1
    }

    fn shell_edges_and_vertices(&self, s: ShellId) -> (Vec<EdgeId>, Vec<VertexId>) {
        let mut edges = Vec::new();
        let mut vertices = Vec::new();
        let mut seen_e = HashSet::new();
        let mut seen_v = HashSet::new();
        let Some(shell) = self.shells.get(s) else {
            return (edges, vertices);
        };
        for &f in &shell.faces {
            for l in self.face_loops(f) {
                for h in self.loop_half_edges(l) {
                    let Some(he) = self.half_edges.get(h) else {
                        continue;
                    };
                    if seen_e.insert(he.edge) {
                        edges.push(he.edge);
                    }
                    if seen_v.insert(he.origin) {
                        vertices.push(he.origin);
                    }
                }
            }
        }
        (edges, vertices)
    }

    /// Outer shell followed by void shells.
    pub fn solid_shells(&self, solid: SolidId) -> Result<Vec<ShellId>> {
        let s = self
            .solids
            .get(solid)
            .ok_or(TopoError::MissingSolid(solid))?;
        Ok(std::iter::once(s.outer_shell)
            .chain(s.inner_shells.iter().copied())
            .collect())
    }

    /// All faces of all shells of a solid.
    pub fn solid_faces(&self, solid: SolidId) -> Result<Vec<FaceId>> {
        Ok(self
            .solid_shells(solid)?
            .into_iter()
            .filter_map(|s| self.shells.get(s))
            .flat_map(|s| s.faces.iter().copied())
            .collect())
    }

    // =========================================================================
    // Key checks
    // =========================================================================

    fn check_vertex(&self, v: VertexId) -> Result<()> {
        self.vertices
            .contains_key(v)
            .then_some(())
            .ok_or(TopoError::MissingVertex(v))
    }

    fn check_half_edge(&self, h: HalfEdgeId) -> Result<()> {
        self.half_edges
            .contains_key(h)
            .then_some(())
            .ok_or(TopoError::MissingHalfEdge(h))
    }

    fn check_loop(&self, l: LoopId) -> Result<()> {
        self.loops
            .contains_key(l)
            .then_some(())
            .ok_or(TopoError::MissingLoop(l))
    }

    fn check_face(&self, f: FaceId) -> Result<()> {
        self.faces
            .contains_key(f)
            .then_some(())
            .ok_or(TopoError::MissingFace(f))
    }

    fn check_shell(&self, s: ShellId) -> Result<()> {
        self.shells
            .contains_key(s)
            .then_some(())
            .ok_or(TopoError::MissingShell(s))
    }
}
