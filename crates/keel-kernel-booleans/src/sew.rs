//! Topology reconstruction: sew selected fragments into a result solid.
//!
//! Fragment corners closer than the tolerance become one vertex and sides
//! shared by two fragments become one edge. A corner lying on another
//! fragment's side is inserted into that side first, so split faces stay
//! watertight against unsplit neighbours.
//!
//! Each edge-connected group of faces becomes its own shell. Groups
//! enclosing positive volume are lumps; inward-wound groups are cavities
//! and become void shells of the smallest lump whose box holds them.
//!
//! Fragments that must face the other way arrive already flipped: both
//! their winding and their orientation are reversed, so the loop order
//! and the carrier agree.

use keel_kernel_geom::{Curve, GeometryStore, Plane, Surface};
use keel_kernel_math::{Aabb3, Point3};
use keel_kernel_primitives::{signed_volume, BRepSolid, PrimitiveError};
use keel_kernel_topo::{
    EdgeCurve, EdgeId, FaceId, Orientation, Session, ShellId, ShellType, SolidId, Topology,
    VertexId,
};
use tracing::debug;

use crate::split::Fragment;

/// Vertices created so far, looked up by position.
struct VertexPool {
    tolerance: f64,
    entries: Vec<(Point3, VertexId)>,
}

impl VertexPool {
    fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            entries: Vec::new(),
        }
    }

    fn get(&mut self, topo: &mut Topology, p: &Point3) -> VertexId {
        let tol2 = self.tolerance * self.tolerance;
        if let Some(&(_, v)) = self
            .entries
            .iter()
            .find(|(q, _)| (q - p).norm_squared() <= tol2)
        {
            return v;
        }
        let v = topo.add_vertex(*p);
        self.entries.push((*p, v));
        v
    }

    /// Vertex ids for a ring with merged neighbours collapsed.
    fn ring(&mut self, topo: &mut Topology, points: &[Point3]) -> Vec<VertexId> {
        let mut ids: Vec<VertexId> = Vec::with_capacity(points.len());
        for p in points {
            let v = self.get(topo, p);
            if ids.last() != Some(&v) {
                ids.push(v);
            }
        }
        while ids.len() > 1 && ids.first() == ids.last() {
            ids.pop();
        }
        ids
    }
}

/// `ring` with every point of `corners` that lies strictly inside one of
/// its sides inserted in order along that side.
fn refine_ring(ring: &[Point3], corners: &[Point3], tolerance: f64) -> Vec<Point3> {
    let mut out = Vec::with_capacity(ring.len());
    for (i, a) in ring.iter().enumerate() {
        let b = &ring[(i + 1) % ring.len()];
        out.push(*a);
        let d = b - a;
        let len2 = d.norm_squared();
        if len2 <= tolerance * tolerance {
            continue;
        }
        let len = len2.sqrt();
        let mut inner: Vec<(f64, Point3)> = corners
            .iter()
            .filter_map(|p| {
                let t = (p - a).dot(&d) / len2;
                let along = t * len;
                if along <= tolerance || along >= len - tolerance {
                    return None;
                }
                let off = (p - (a + d * t)).norm();
                (off <= tolerance).then_some((t, *p))
            })
            .collect();
        inner.sort_by(|x, y| x.0.total_cmp(&y.0));
        inner.dedup_by(|x, y| (x.1 - y.1).norm() <= tolerance);
        out.extend(inner.into_iter().map(|(_, p)| p));
    }
    out
}

/// One edge-connected group of sewn faces.
struct Component {
    faces: Vec<FaceId>,
    volume: f64,
    bounds: Aabb3,
}

impl Component {
    fn new(topo: &Topology, faces: Vec<FaceId>) -> Self {
        let points: Vec<Point3> = faces
            .iter()
            .flat_map(|f| topo.face_vertices(*f))
            .filter_map(|v| topo.vertex_point(v))
            .collect();
        Self {
            volume: signed_volume(topo, &faces),
            bounds: Aabb3::from_points(&points),
            faces,
        }
    }
}

/// A lump under construction: its outer shell and the voids it holds.
struct Lump {
    shell: ShellId,
    volume: f64,
    bounds: Aabb3,
    voids: Vec<ShellId>,
}

/// Build shells and solids from sewn faces; returns the largest lump.
fn assemble_lumps(
    topo: &mut Topology,
    faces: &[FaceId],
    tolerance: f64,
    problems: &mut Vec<String>,
) -> Result<SolidId, PrimitiveError> {
    let components: Vec<Component> = topo
        .face_components(faces)
        .into_iter()
        .map(|group| Component::new(topo, group))
        .collect();
    let (skins, cavities): (Vec<Component>, Vec<Component>) =
        components.into_iter().partition(|c| c.volume >= 0.0);

    let mut lumps = Vec::with_capacity(skins.len());
    for skin in skins {
        lumps.push(Lump {
            shell: topo.add_shell(skin.faces, ShellType::Outer)?,
            volume: skin.volume,
            bounds: skin.bounds,
            voids: Vec::new(),
        });
    }

    let mut orphans = Vec::new();
    for cavity in cavities {
        let host = lumps
            .iter_mut()
            .filter(|l| l.bounds.contains_aabb(&cavity.bounds, tolerance))
            .min_by(|a, b| a.volume.total_cmp(&b.volume));
        match host {
            Some(lump) => lump.voids.push(topo.add_shell(cavity.faces, ShellType::Inner)?),
            None => orphans.push(cavity),
        }
    }
    for cavity in orphans {
        problems.push(format!(
            "inside-out component of {} faces kept as its own lump",
            cavity.faces.len()
        ));
        lumps.push(Lump {
            shell: topo.add_shell(cavity.faces, ShellType::Outer)?,
            volume: cavity.volume,
            bounds: cavity.bounds,
            voids: Vec::new(),
        });
    }

    lumps.sort_by(|a, b| b.volume.total_cmp(&a.volume));
    let mut primary = None;
    for lump in lumps {
        let solid = topo.add_solid(lump.shell, lump.voids)?;
        primary.get_or_insert(solid);
    }
    primary.ok_or_else(|| PrimitiveError::NotManifold("no faces to assemble".into()))
}

/// Sew fragments into a new solid drawing ids from `session`.
///
/// Fragments that cannot be placed (collapsed under the tolerance, or
/// whose sides are already used twice) are skipped and reported in the
/// returned list.
pub fn sew_fragments(
    session: &Session,
    fragments: &[Fragment],
    tolerance: f64,
) -> Result<(BRepSolid, Vec<String>), PrimitiveError> {
    let mut topo = Topology::new(session);
    let mut geom = GeometryStore::new();
    let mut pool = VertexPool::new(tolerance);
    let mut problems = Vec::new();
    let mut faces: Vec<FaceId> = Vec::with_capacity(fragments.len());
    let corners: Vec<Point3> = fragments
        .iter()
        .flat_map(|f| f.outer.iter().chain(f.holes.iter().flatten()))
        .copied()
        .collect();

    for fragment in fragments {
        let outer = pool.ring(&mut topo, &refine_ring(&fragment.outer, &corners, tolerance));
        if outer.len() < 3 {
            problems.push(format!(
                "fragment of face {:?} collapsed under tolerance",
                fragment.source
            ));
            continue;
        }
        let surface = match &fragment.surface {
            Some(s) => s.clone(),
            None => Surface::Plane(Plane::from_normal(fragment.outer[0], fragment.normal)),
        };
        let surface_id = geom.add_surface(surface);
        let face = match topo.add_face_from_vertices(&outer, Some(surface_id)) {
            Ok(f) => f,
            Err(e) => {
                geom.remove_surface(surface_id);
                problems.push(format!("fragment of face {:?} not sewn: {e}", fragment.source));
                continue;
            }
        };
        topo.faces[face].orientation = if fragment.is_planar() {
            Orientation::Forward
        } else {
            fragment.orientation
        };
        for hole in &fragment.holes {
            let ring = pool.ring(&mut topo, &refine_ring(hole, &corners, tolerance));
            if ring.len() < 3 {
                continue;
            }
            if let Err(e) = topo.add_hole_from_vertices(face, &ring) {
                problems.push(format!("hole of face {:?} not sewn: {e}", fragment.source));
            }
        }
        faces.push(face);
    }

    if faces.is_empty() {
        return Ok((BRepSolid::empty(session)?, problems));
    }

    let bare: Vec<EdgeId> = topo
        .edges
        .iter()
        .filter(|(_, e)| e.curve.is_none())
        .map(|(id, _)| id)
        .collect();
    for e in bare {
        let Some((a, b)) = topo.edge_vertices(e) else {
            continue;
        };
        let (Some(pa), Some(pb)) = (topo.vertex_point(a), topo.vertex_point(b)) else {
            continue;
        };
        let curve = geom.add_curve(Curve::line(pa, pb));
        topo.set_edge_curve(
            e,
            Some(EdgeCurve {
                curve,
                t_start: 0.0,
                t_end: 1.0,
            }),
        )?;
    }

    let solid_id = assemble_lumps(&mut topo, &faces, tolerance, &mut problems)?;
    debug!(
        faces = faces.len(),
        vertices = topo.vertices.len(),
        edges = topo.edges.len(),
        lumps = topo.solids.len(),
        voids = topo.shells.len() - topo.solids.len(),
        skipped = problems.len(),
        "fragments sewn"
    );
    Ok((
        BRepSolid {
            topology: topo,
            geometry: geom,
            solid_id,
        },
        problems,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use keel_kernel_math::Vec3;
    use keel_kernel_primitives::make_cube;
    use keel_kernel_validate::{solid_genus, validate_manifold, validate_solid};

    fn whole(brep: &BRepSolid) -> Vec<Fragment> {
        brep.faces()
            .into_iter()
            .filter_map(|f| Fragment::from_face(brep, f))
            .collect()
    }

    #[test]
    fn test_sew_cube_back_together() {
        let session = Session::new();
        let cube = make_cube(&session, 10.0, 10.0, 10.0).unwrap();
        let (sewn, problems) = sew_fragments(&session, &whole(&cube), 1e-6).unwrap();
        assert!(problems.is_empty());
        assert_eq!(sewn.topology.faces.len(), 6);
        assert_eq!(sewn.topology.edges.len(), 12);
        assert_eq!(sewn.topology.vertices.len(), 8);
        assert_relative_eq!(sewn.polyhedral_volume(), 1000.0, epsilon = 1e-9);
        let shell = sewn.topology.solids[sewn.solid_id].outer_shell;
        assert!(validate_manifold(&sewn.topology, shell).is_valid);
    }

    #[test]
    fn test_sew_two_separate_cubes() {
        let session = Session::new();
        let a = make_cube(&session, 10.0, 10.0, 10.0).unwrap();
        let b = a.translated(100.0, 0.0, 0.0);
        let mut fragments = whole(&a);
        fragments.extend(whole(&b));
        let (sewn, problems) = sew_fragments(&session, &fragments, 1e-6).unwrap();
        assert!(problems.is_empty());
        assert_eq!(sewn.topology.faces.len(), 12);
        assert_eq!(sewn.topology.vertices.len(), 16);

        // one lump per skin, each a single closed shell
        assert_eq!(sewn.lumps().len(), 2);
        assert_eq!(sewn.topology.shells.len(), 2);
        for lump in sewn.lumps() {
            let solid = &sewn.topology.solids[lump];
            assert!(solid.inner_shells.is_empty());
            assert_eq!(sewn.topology.shells[solid.outer_shell].faces.len(), 6);
            assert_eq!(solid_genus(&sewn.topology, lump), Ok(0));
            assert!(validate_solid(&sewn.topology, lump).is_valid);
        }
        assert_eq!(sewn.faces().len(), 12);
        assert_relative_eq!(sewn.polyhedral_volume(), 2000.0, epsilon = 1e-9);
        assert_relative_eq!(sewn.bounding_box().max.x, 110.0, epsilon = 1e-9);
    }

    #[test]
    fn test_enclosed_cavity_becomes_void_shell() {
        let session = Session::new();
        let block = make_cube(&session, 10.0, 10.0, 10.0).unwrap();
        let pocket = make_cube(&session, 2.0, 2.0, 2.0)
            .unwrap()
            .translated(4.0, 4.0, 4.0);
        let mut fragments: Vec<Fragment> =
            whole(&pocket).into_iter().map(Fragment::flipped).collect();
        fragments.extend(whole(&block));

        let (sewn, problems) = sew_fragments(&session, &fragments, 1e-6).unwrap();
        assert!(problems.is_empty());
        assert_eq!(sewn.lumps(), vec![sewn.solid_id]);
        let solid = &sewn.topology.solids[sewn.solid_id];
        assert_eq!(solid.inner_shells.len(), 1);
        let void = &sewn.topology.shells[solid.inner_shells[0]];
        assert_eq!(void.shell_type, ShellType::Inner);
        assert_eq!(void.faces.len(), 6);
        assert_eq!(sewn.topology.shells[solid.outer_shell].faces.len(), 6);
        assert_eq!(solid_genus(&sewn.topology, sewn.solid_id), Ok(0));
        assert!(validate_solid(&sewn.topology, sewn.solid_id).is_valid);
        assert_relative_eq!(sewn.polyhedral_volume(), 992.0, epsilon = 1e-9);
    }

    #[test]
    fn test_flipped_fragments_invert_volume() {
        let session = Session::new();
        let cube = make_cube(&session, 1.0, 2.0, 3.0).unwrap();
        let flipped: Vec<Fragment> = whole(&cube).into_iter().map(Fragment::flipped).collect();
        let (sewn, problems) = sew_fragments(&session, &flipped, 1e-6).unwrap();
        // nothing encloses the cavity, so it stands alone and is reported
        assert_eq!(problems.len(), 1);
        assert_eq!(sewn.lumps().len(), 1);
        assert_relative_eq!(sewn.polyhedral_volume(), -6.0, epsilon = 1e-9);
    }

    #[test]
    fn test_refine_ring_inserts_t_junctions() {
        let square = [
            Point3::origin(),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(10.0, 10.0, 0.0),
            Point3::new(0.0, 10.0, 0.0),
        ];
        let corners = [
            Point3::new(7.0, 0.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
            Point3::new(5.0, 5.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
        ];
        let refined = refine_ring(&square, &corners, 1e-6);
        assert_eq!(refined.len(), 6);
        assert_eq!(refined[1], Point3::new(3.0, 0.0, 0.0));
        assert_eq!(refined[2], Point3::new(7.0, 0.0, 0.0));
    }

    #[test]
    fn test_split_face_sews_watertight() {
        // the top face arrives in two halves, the front face whole
        let session = Session::new();
        let cube = make_cube(&session, 10.0, 10.0, 10.0).unwrap();
        let cut = crate::split::PlaneEq::new(&Point3::new(5.0, 0.0, 0.0), &Vec3::x()).unwrap();
        let mut fragments = Vec::new();
        for f in whole(&cube) {
            if f.normal.z > 0.5 {
                fragments.extend(crate::split::split_fragment(&f, &[cut], 1e-9));
            } else {
                fragments.push(f);
            }
        }
        assert_eq!(fragments.len(), 7);
        let (sewn, problems) = sew_fragments(&session, &fragments, 1e-6).unwrap();
        assert!(problems.is_empty());
        assert_eq!(sewn.topology.vertices.len(), 10);
        assert!(sewn.topology.edges.values().all(|e| e.faces.len() == 2));
        assert_relative_eq!(sewn.polyhedral_volume(), 1000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_near_points_merge() {
        let session = Session::new();
        let mut topo = Topology::new(&session);
        let mut pool = VertexPool::new(1e-6);
        let a = pool.get(&mut topo, &Point3::new(1.0, 2.0, 3.0));
        let b = pool.get(&mut topo, &Point3::new(1.0 + 1e-8, 2.0, 3.0));
        let c = pool.get(&mut topo, &Point3::new(10.0, 20.0, 30.0));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(topo.vertices.len(), 2);
    }

    #[test]
    fn test_collapsed_fragment_reported() {
        let session = Session::new();
        let sliver = Fragment {
            source: FaceId::default(),
            outer: vec![
                Point3::origin(),
                Point3::new(1e-9, 0.0, 0.0),
                Point3::new(0.0, 1e-9, 0.0),
            ],
            holes: Vec::new(),
            normal: Vec3::z(),
            sample: Point3::origin(),
            surface: None,
            orientation: Orientation::Forward,
        };
        let (sewn, problems) = sew_fragments(&session, &[sliver], 1e-6).unwrap();
        assert_eq!(problems.len(), 1);
        assert!(sewn.is_empty());
    }
}
