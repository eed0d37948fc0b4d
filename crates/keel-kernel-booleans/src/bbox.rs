//! Axis-aligned bounding boxes and face-pair filtering.
//!
//! Used as a broadphase filter: only face pairs with overlapping boxes
//! need a face/face intersection test.

use keel_kernel_geom::Surface;
use keel_kernel_math::Aabb3;
use keel_kernel_primitives::BRepSolid;
use keel_kernel_topo::FaceId;
use rayon::prelude::*;

/// Bounding box of a face.
///
/// Exact for planar faces. NURBS faces also include their control net,
/// which contains the surface.
pub fn face_aabb(brep: &BRepSolid, face_id: FaceId) -> Aabb3 {
    let topo = &brep.topology;
    let mut aabb = Aabb3::empty();
    let Some(face) = topo.faces.get(face_id) else {
        return aabb;
    };
    for l in topo.face_loops(face_id) {
        for p in topo.loop_points(l) {
            aabb.include_point(&p);
        }
    }
    if let Some(Surface::Nurbs(s)) = face.surface.and_then(|s| brep.geometry.surface(s)) {
        for p in s.control_points() {
            aabb.include_point(p);
        }
    }
    aabb
}

/// Bounding box of every face of the solid.
pub fn solid_aabb(brep: &BRepSolid) -> Aabb3 {
    let mut aabb = Aabb3::empty();
    for face_id in brep.faces() {
        aabb.include_aabb(&face_aabb(brep, face_id));
    }
    aabb
}

/// Face pairs `(face_from_a, face_from_b)` whose boxes, grown by
/// `tolerance`, overlap.
pub fn find_candidate_face_pairs(
    a: &BRepSolid,
    b: &BRepSolid,
    tolerance: f64,
) -> Vec<(FaceId, FaceId)> {
    let b_faces: Vec<(FaceId, Aabb3)> = b
        .faces()
        .into_iter()
        .map(|f| {
            let mut aabb = face_aabb(b, f);
            aabb.expand(tolerance);
            (f, aabb)
        })
        .collect();

    a.faces()
        .par_iter()
        .flat_map_iter(|&fa| {
            let aabb_a = face_aabb(a, fa);
            b_faces
                .iter()
                .filter(move |(_, aabb_b)| aabb_a.overlaps(aabb_b))
                .map(move |&(fb, _)| (fa, fb))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_kernel_math::Point3;
    use keel_kernel_primitives::make_cube;
    use keel_kernel_topo::Session;

    #[test]
    fn test_non_overlapping_cubes_no_pairs() {
        let session = Session::new();
        let a = make_cube(&session, 10.0, 10.0, 10.0).unwrap();
        let b = a.translated(100.0, 0.0, 0.0);
        assert!(find_candidate_face_pairs(&a, &b, 1e-6).is_empty());
    }

    #[test]
    fn test_identical_cubes_pair_every_touching_face() {
        let session = Session::new();
        let a = make_cube(&session, 10.0, 10.0, 10.0).unwrap();
        let b = make_cube(&session, 10.0, 10.0, 10.0).unwrap();
        let pairs = find_candidate_face_pairs(&a, &b, 1e-6);
        // each face touches every face except its opposite
        assert_eq!(pairs.len(), 6 * 5);
    }

    #[test]
    fn test_partially_overlapping_cubes() {
        let session = Session::new();
        let a = make_cube(&session, 10.0, 10.0, 10.0).unwrap();
        let b = a.translated(5.0, 0.0, 0.0);
        let pairs = find_candidate_face_pairs(&a, &b, 1e-6);
        assert!(!pairs.is_empty());
        assert!(pairs.len() < 36);
    }

    #[test]
    fn test_solid_aabb_cube() {
        let brep = make_cube(&Session::new(), 10.0, 10.0, 10.0).unwrap();
        let aabb = solid_aabb(&brep);
        assert_eq!(aabb.min, Point3::origin());
        assert_eq!(aabb.max, Point3::new(10.0, 10.0, 10.0));
    }
}
