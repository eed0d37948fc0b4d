use std::collections::HashSet;

use keel_kernel_topo::{FaceId, HalfEdgeId, ShellId, SolidId, Topology, TopoError};
use thiserror::Error;

/// Why a genus could not be computed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenusError {
    /// The shell has edges with fewer than two incident faces.
    #[error("shell is not closed ({open_edges} open edges)")]
    NotClosed {
        /// Edges bounding only one face.
        open_edges: usize,
    },
    /// The Euler characteristic cannot belong to a closed orientable surface.
    #[error("invalid Euler characteristic {0}")]
    InvalidCharacteristic(i64),
    /// A key was stale.
    #[error(transparent)]
    Topo(#[from] TopoError),
}

/// `V - E + F - R` over the faces of a shell, where `R` counts inner loops.
///
/// For a shell without holes in its faces this is the classic `V - E + F`.
pub fn euler_characteristic(topo: &Topology, shell: ShellId) -> i64 {
    let Some(sh) = topo.shells.get(shell) else {
        return 0;
    };
    let v = topo.shell_vertices(shell).len() as i64;
    let e = topo.shell_edges(shell).len() as i64;
    let f = sh.faces.len() as i64;
    let rings: usize = sh
        .faces
        .iter()
        .filter_map(|f| topo.faces.get(*f))
        .map(|face| face.inner_loops.len())
        .sum();
    v - e + f - rings as i64
}

fn open_edges(topo: &Topology, shell: ShellId) -> usize {
    let members: HashSet<FaceId> = topo
        .shells
        .get(shell)
        .map(|s| s.faces.iter().copied().collect())
        .unwrap_or_default();
    let bounds_member = |h: HalfEdgeId| {
        topo.half_edges
            .get(h)
            .and_then(|he| he.loop_id)
            .and_then(|l| topo.loops.get(l))
            .and_then(|lp| lp.face)
            .is_some_and(|f| members.contains(&f))
    };
    topo.shell_edges(shell)
        .into_iter()
        .filter_map(|e| topo.edges.get(e))
        .filter(|edge| !(bounds_member(edge.half_edges.0) && bounds_member(edge.half_edges.1)))
        .count()
}

/// Genus of a closed shell from `V - E + F - R = 2 (1 - G)`.
pub fn calculate_genus(topo: &Topology, shell: ShellId) -> Result<u32, GenusError> {
    if !topo.shells.contains_key(shell) {
        return Err(TopoError::MissingShell(shell).into());
    }
    let open = open_edges(topo, shell);
    if open > 0 {
        return Err(GenusError::NotClosed { open_edges: open });
    }
    let chi = euler_characteristic(topo, shell);
    if chi % 2 != 0 || chi > 2 {
        return Err(GenusError::InvalidCharacteristic(chi));
    }
    Ok(((2 - chi) / 2) as u32)
}

/// Total genus of a solid from `V - E + F - R = 2 (S - G)`.
pub fn solid_genus(topo: &Topology, solid: SolidId) -> Result<u32, GenusError> {
    let shells = topo.solid_shells(solid)?;
    let mut chi = 0;
    for &s in &shells {
        if !topo.shells.contains_key(s) {
            return Err(TopoError::MissingShell(s).into());
        }
        let open = open_edges(topo, s);
        if open > 0 {
            return Err(GenusError::NotClosed { open_edges: open });
        }
        chi += euler_characteristic(topo, s);
    }
    let count = shells.len() as i64;
    if chi % 2 != 0 || chi / 2 > count {
        return Err(GenusError::InvalidCharacteristic(chi));
    }
    Ok((count - chi / 2) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{tetrahedron, tetrahedron_with, torus_grid, OUTWARD};
    use keel_kernel_math::Point3;
    use keel_kernel_topo::{Session, ShellType};

    #[test]
    fn test_tetrahedron_genus_zero() {
        let mut topo = Topology::new(&Session::new());
        let (_, faces) = tetrahedron(&mut topo);
        let shell = topo.add_shell(faces, ShellType::Outer).unwrap();
        assert_eq!(euler_characteristic(&topo, shell), 2);
        assert_eq!(calculate_genus(&topo, shell), Ok(0));
    }

    #[test]
    fn test_torus_grid_genus_one() {
        let mut topo = Topology::new(&Session::new());
        let faces = torus_grid(&mut topo);
        let shell = topo.add_shell(faces, ShellType::Outer).unwrap();
        assert_eq!(topo.shell_vertices(shell).len(), 9);
        assert_eq!(topo.shell_edges(shell).len(), 18);
        assert_eq!(euler_characteristic(&topo, shell), 0);
        assert_eq!(calculate_genus(&topo, shell), Ok(1));
    }

    #[test]
    fn test_open_shell_has_no_genus() {
        let mut topo = Topology::new(&Session::new());
        let (_, faces) = tetrahedron(&mut topo);
        let shell = topo.add_shell(faces[..3].to_vec(), ShellType::Outer).unwrap();
        assert_eq!(
            calculate_genus(&topo, shell),
            Err(GenusError::NotClosed { open_edges: 3 })
        );
    }

    #[test]
    fn test_solid_with_void_genus_zero() {
        let mut topo = Topology::new(&Session::new());
        let (_, outer) = tetrahedron_with(&mut topo, Point3::origin(), 10.0, &OUTWARD);
        let (_, inner) =
            tetrahedron_with(&mut topo, Point3::new(1.0, 1.0, 1.0), 1.0, &OUTWARD);
        let s_out = topo.add_shell(outer, ShellType::Outer).unwrap();
        let s_in = topo.add_shell(inner, ShellType::Inner).unwrap();
        let solid = topo.add_solid(s_out, vec![s_in]).unwrap();
        assert_eq!(solid_genus(&topo, solid), Ok(0));
    }

    #[test]
    fn test_missing_solid_is_error() {
        let mut topo = Topology::new(&Session::new());
        let (_, faces) = tetrahedron(&mut topo);
        let shell = topo.add_shell(faces, ShellType::Outer).unwrap();
        let solid = topo.add_solid(shell, vec![]).unwrap();
        topo.solids.remove(solid);
        assert_eq!(
            solid_genus(&topo, solid),
            Err(GenusError::Topo(TopoError::MissingSolid(solid)))
        );
    }
}
