use keel_kernel_math::{Aabb3, Point3, Tolerance};
use keel_kernel_topo::{ShellId, ShellType, SolidId, Topology};
use tracing::debug;

use crate::{validate_manifold, ValidationFinding, ValidationReport};

fn shell_bounds(topo: &Topology, shell: ShellId) -> Aabb3 {
    let points: Vec<Point3> = topo
        .shell_vertices(shell)
        .into_iter()
        .filter_map(|v| topo.vertex_point(v))
        .collect();
    Aabb3::from_points(&points)
}

/// Check a solid: every shell manifold, exactly one outer shell, and every
/// void shell inside the outer shell's bounding box.
pub fn validate_solid(topo: &Topology, solid: SolidId) -> ValidationReport {
    let Some(s) = topo.solids.get(solid) else {
        return ValidationReport::from_findings(vec![ValidationFinding::DanglingReference(
            format!("solid {solid:?}"),
        )]);
    };

    let mut errors = Vec::new();
    let outer = s.outer_shell;
    if topo
        .shells
        .get(outer)
        .is_some_and(|sh| sh.shell_type != ShellType::Outer)
    {
        errors.push(ValidationFinding::ShellType(outer));
    }
    errors.extend(validate_manifold(topo, outer).errors);

    let bounds = shell_bounds(topo, outer);
    for &void in &s.inner_shells {
        let Some(sh) = topo.shells.get(void) else {
            errors.push(ValidationFinding::DanglingReference(format!(
                "void shell {void:?}"
            )));
            continue;
        };
        if sh.shell_type != ShellType::Inner {
            errors.push(ValidationFinding::ShellType(void));
        }
        errors.extend(validate_manifold(topo, void).errors);
        if !bounds.contains_aabb(&shell_bounds(topo, void), Tolerance::DEFAULT.linear) {
            errors.push(ValidationFinding::VoidOutside(void));
        }
    }

    let report = ValidationReport::from_findings(errors);
    debug!(?solid, issues = report.issue_count(), "validate_solid");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{tetrahedron_with, OUTWARD};
    use keel_kernel_topo::Session;

    fn solid_with_void(void_offset: Point3, void_type: ShellType) -> (Topology, SolidId, ShellId) {
        let mut topo = Topology::new(&Session::new());
        let (_, outer) = tetrahedron_with(&mut topo, Point3::origin(), 10.0, &OUTWARD);
        let (_, inner) = tetrahedron_with(&mut topo, void_offset, 1.0, &OUTWARD);
        let s_out = topo.add_shell(outer, ShellType::Outer).unwrap();
        let s_in = topo.add_shell(inner, void_type).unwrap();
        let solid = topo.add_solid(s_out, vec![s_in]).unwrap();
        (topo, solid, s_in)
    }

    #[test]
    fn test_contained_void_is_valid() {
        let (topo, solid, _) = solid_with_void(Point3::new(1.0, 1.0, 1.0), ShellType::Inner);
        let report = validate_solid(&topo, solid);
        assert!(report.is_valid, "{report}");
    }

    #[test]
    fn test_void_outside_outer_is_flagged() {
        let (topo, solid, void) =
            solid_with_void(Point3::new(50.0, 0.0, 0.0), ShellType::Inner);
        let report = validate_solid(&topo, solid);
        assert_eq!(report.errors, vec![ValidationFinding::VoidOutside(void)]);
    }

    #[test]
    fn test_second_outer_shell_is_flagged() {
        let (topo, solid, void) = solid_with_void(Point3::new(1.0, 1.0, 1.0), ShellType::Outer);
        let report = validate_solid(&topo, solid);
        assert!(report.has(|f| *f == ValidationFinding::ShellType(void)));
    }
}
