//! Native boolean pipeline: face splitting, classification, and sewing.

use std::collections::HashMap;

use keel_kernel_primitives::BRepSolid;
use keel_kernel_topo::FaceId;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::api::{BooleanOp, BooleanOptions, BooleanOutcome};
use crate::classify::{select, FaceClassification, Operand, Selection, SolidClassifier};
use crate::split::{intersect_planar, split_fragment, Contact, Fragment, PlaneEq};
use crate::{bbox, sew};

/// Per-face trace dump, only emitted with the `debug-boolean` feature.
#[allow(unused_macros)]
#[cfg(feature = "debug-boolean")]
macro_rules! face_trace {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

/// No-op version when `debug-boolean` is disabled.
#[allow(unused_macros)]
#[cfg(not(feature = "debug-boolean"))]
macro_rules! face_trace {
    ($($arg:tt)*) => {};
}

fn whole_fragments(brep: &BRepSolid, errors: &mut Vec<String>) -> HashMap<FaceId, Fragment> {
    let mut out = HashMap::new();
    for f in brep.faces() {
        match Fragment::from_face(brep, f) {
            Some(frag) => {
                out.insert(f, frag);
            }
            None => errors.push(format!("face {f:?} has no usable boundary; dropped")),
        }
    }
    out
}

/// Handle boolean operations on operands whose boxes do not meet.
pub(crate) fn non_overlapping_boolean(
    a: &BRepSolid,
    b: &BRepSolid,
    op: BooleanOp,
    options: &BooleanOptions,
) -> BooleanOutcome {
    match op {
        BooleanOp::Union => {
            let mut errors = Vec::new();
            let mut fragments: Vec<Fragment> =
                whole_fragments(a, &mut errors).into_values().collect();
            fragments.extend(whole_fragments(b, &mut errors).into_values());
            match sew::sew_fragments(a.session(), &fragments, options.tolerance) {
                Ok((solid, problems)) => {
                    errors.extend(problems);
                    BooleanOutcome::solved(solid, errors, 0)
                }
                Err(e) => BooleanOutcome::failed(format!("sewing failed: {e}")),
            }
        }
        BooleanOp::Subtract => BooleanOutcome::solved(a.clone(), Vec::new(), 0),
        BooleanOp::Intersect => match BRepSolid::empty(a.session()) {
            Ok(empty) => BooleanOutcome::solved(empty, Vec::new(), 0),
            Err(e) => BooleanOutcome::failed(format!("empty result could not be built: {e}")),
        },
    }
}

/// Split every fragment of one operand by the planes it met.
fn split_all(
    whole: &HashMap<FaceId, Fragment>,
    order: &[FaceId],
    cutters: &HashMap<FaceId, Vec<PlaneEq>>,
    tol: f64,
    unsplittable: &mut usize,
) -> Vec<Fragment> {
    let mut out = Vec::new();
    for f in order {
        let Some(frag) = whole.get(f) else {
            continue;
        };
        match cutters.get(f) {
            Some(planes) if frag.is_splittable(tol) => {
                let pieces = split_fragment(frag, planes, tol);
                face_trace!(face = ?f, pieces = pieces.len(), "face split");
                out.extend(pieces);
            }
            Some(_) => {
                *unsplittable += 1;
                out.push(frag.clone());
            }
            None => out.push(frag.clone()),
        }
    }
    out
}

/// Boolean pipeline for overlapping solids.
///
/// 1. candidate face pairs from boxes
/// 2. planar face/face intersection, collecting cutting planes
/// 3. splitting of convex planar faces
/// 4. classification of every fragment against the other solid
/// 5. selection and sewing
pub(crate) fn brep_boolean(
    a: &BRepSolid,
    b: &BRepSolid,
    op: BooleanOp,
    options: &BooleanOptions,
) -> BooleanOutcome {
    let tol = options.tolerance.max(f64::EPSILON);
    let mut errors = Vec::new();

    let pairs = bbox::find_candidate_face_pairs(a, b, tol);
    debug!(pairs = pairs.len(), "broadphase done");

    let order_a = a.faces();
    let order_b = b.faces();
    let whole_a = whole_fragments(a, &mut errors);
    let whole_b = whole_fragments(b, &mut errors);

    let contacts: Vec<(FaceId, FaceId, Option<Contact>)> = pairs
        .par_iter()
        .filter_map(|&(fa, fb)| {
            let (ga, gb) = (whole_a.get(&fa)?, whole_b.get(&fb)?);
            if !ga.is_planar() || !gb.is_planar() {
                return Some((fa, fb, None));
            }
            Some((fa, fb, Some(intersect_planar(ga, gb, tol))))
        })
        .collect();

    let mut cutters_a: HashMap<FaceId, Vec<PlaneEq>> = HashMap::new();
    let mut cutters_b: HashMap<FaceId, Vec<PlaneEq>> = HashMap::new();
    let (mut intersection_count, mut coplanar, mut touching, mut curved) = (0, 0, 0, 0);
    for (fa, fb, contact) in contacts {
        match contact {
            None => curved += 1,
            Some(Contact::Disjoint) => {}
            Some(Contact::Coplanar) => coplanar += 1,
            Some(contact) => {
                if let Contact::Crossing(segments) = &contact {
                    intersection_count += segments.len();
                } else {
                    touching += 1;
                }
                // planes are only cut along where the faces actually meet
                if let (Some(pa), Some(pb)) = (
                    whole_a.get(&fa).and_then(Fragment::plane),
                    whole_b.get(&fb).and_then(Fragment::plane),
                ) {
                    cutters_a.entry(fa).or_default().push(pb);
                    cutters_b.entry(fb).or_default().push(pa);
                }
            }
        }
    }
    debug!(
        intersections = intersection_count,
        coplanar, touching, curved, "face pairs intersected"
    );

    let mut unsplittable = 0;
    let frags_a = split_all(&whole_a, &order_a, &cutters_a, tol, &mut unsplittable);
    let frags_b = split_all(&whole_b, &order_b, &cutters_b, tol, &mut unsplittable);
    debug!(a = frags_a.len(), b = frags_b.len(), "fragments built");

    if coplanar > 0 {
        errors.push(format!("{coplanar} coplanar face pairs were not split against each other"));
    }
    if touching > 0 {
        errors.push(format!("{touching} face pairs meet only at a point"));
    }
    if curved > 0 {
        errors.push(format!("{curved} face pairs involve curved faces and were not intersected"));
    }
    if unsplittable > 0 {
        errors.push(format!(
            "{unsplittable} holed or non-convex faces could not be split and were classified whole"
        ));
    }
    for e in &errors {
        warn!(degeneracy = %e, "boolean degeneracy");
    }

    let classifier_a = SolidClassifier::new(a, tol);
    let classifier_b = SolidClassifier::new(b, tol);
    let classes_a: Vec<FaceClassification> = frags_a
        .par_iter()
        .map(|f| classifier_b.classify_fragment(f))
        .collect();
    let classes_b: Vec<FaceClassification> = frags_b
        .par_iter()
        .map(|f| classifier_a.classify_fragment(f))
        .collect();

    let mut kept = Vec::new();
    for (operand, frags, classes) in [
        (Operand::A, frags_a, classes_a),
        (Operand::B, frags_b, classes_b),
    ] {
        for (frag, class) in frags.into_iter().zip(classes) {
            let selection = select(op, operand, class);
            face_trace!(
                ?operand,
                face = ?frag.source,
                sample = ?frag.sample,
                ?class,
                ?selection,
                "fragment classified"
            );
            match selection {
                Selection::Discard => {}
                Selection::Keep => kept.push(frag),
                Selection::KeepFlipped => kept.push(frag.flipped()),
            }
        }
    }
    debug!(kept = kept.len(), "fragments selected");

    match sew::sew_fragments(a.session(), &kept, tol) {
        Ok((solid, problems)) => {
            errors.extend(problems);
            BooleanOutcome::solved(solid, errors, intersection_count)
        }
        Err(e) => {
            let mut outcome = BooleanOutcome::failed(format!("sewing failed: {e}"));
            errors.append(&mut outcome.errors);
            outcome.errors = errors;
            outcome.intersection_count = intersection_count;
            outcome
        }
    }
}
