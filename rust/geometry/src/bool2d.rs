// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! 2D winding rule resolution
//!
//! Planar contours coming from a chart are resolved into simple shapes with
//! the i_overlay crate. A shape is a list of paths: the first one is the
//! outer boundary (counter-clockwise), the others are holes (clockwise).

use std::sync::OnceLock;

use i_overlay::core::fill_rule::FillRule;
use i_overlay::core::overlay_rule::OverlayRule;
use i_overlay::float::single::SingleFloatOverlay;

/// Closed planar path, implicitly joined from last to first
pub type Path = Vec<[f64; 2]>;

/// Outer boundary followed by its holes
pub type Shape = Vec<Path>;

/// Shapes or holes with a smaller absolute area are dropped
const MIN_AREA_THRESHOLD: f64 = 1e-20;

/// Compute the signed area of a 2D path
/// Positive = counter-clockwise, Negative = clockwise
pub fn compute_signed_area(path: &[[f64; 2]]) -> f64 {
    if path.len() < 3 {
        return 0.0;
    }

    let mut area = 0.0;
    let n = path.len();

    for i in 0..n {
        let j = (i + 1) % n;
        area += path[i][0] * path[j][1];
        area -= path[j][0] * path[i][1];
    }

    area * 0.5
}

/// Ensure path has counter-clockwise winding (positive area)
pub fn ensure_ccw(path: &[[f64; 2]]) -> Path {
    if compute_signed_area(path) < 0.0 {
        path.iter().rev().copied().collect()
    } else {
        path.to_vec()
    }
}

/// Ensure path has clockwise winding (for holes)
pub fn ensure_cw(path: &[[f64; 2]]) -> Path {
    if compute_signed_area(path) > 0.0 {
        path.iter().rev().copied().collect()
    } else {
        path.to_vec()
    }
}

/// Fill rule that keeps areas of positive winding for counter-clockwise input
///
/// i_overlay's notion of a positive winding depends on its internal axis
/// orientation, so the rule is checked once on a counter-clockwise triangle.
fn positive_fill_rule() -> FillRule {
    static CCW_IS_POSITIVE: OnceLock<bool> = OnceLock::new();
    let ccw_is_positive = *CCW_IS_POSITIVE.get_or_init(|| {
        let triangle: Vec<Path> = vec![vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]];
        let empty: Vec<Path> = Vec::new();
        !triangle
            .overlay(&empty, OverlayRule::Subject, FillRule::Positive)
            .is_empty()
    });
    if ccw_is_positive {
        FillRule::Positive
    } else {
        FillRule::Negative
    }
}

/// Keep the regions where the winding number of `paths` is positive
pub fn resolve_positive(paths: &[Path]) -> Vec<Shape> {
    let subject: Vec<Path> = paths.iter().filter(|p| p.len() >= 3).cloned().collect();
    if subject.is_empty() {
        return Vec::new();
    }
    let clip: Vec<Path> = Vec::new();
    let result = subject.overlay(&clip, OverlayRule::Subject, positive_fill_rule());
    normalize_shapes(result)
}

/// Keep the regions covered by at least two of `groups`
///
/// Each group is first resolved with [`resolve_positive`]; coverage is then
/// accumulated as `twice = twice | (once & g)`, `once = once | g`.
pub fn resolve_abs_geq_two(groups: &[Vec<Path>]) -> Vec<Shape> {
    let mut once: Vec<Path> = Vec::new();
    let mut twice: Vec<Path> = Vec::new();

    for group in groups {
        let resolved = flatten(resolve_positive(group));
        if resolved.is_empty() {
            continue;
        }
        if !once.is_empty() {
            let overlap = flatten(boolean(&once, &resolved, OverlayRule::Intersect));
            if !overlap.is_empty() {
                twice = flatten(boolean(&twice, &overlap, OverlayRule::Union));
            }
        }
        once = flatten(boolean(&once, &resolved, OverlayRule::Union));
    }

    if twice.is_empty() {
        return Vec::new();
    }
    resolve_positive(&twice)
}

/// Boolean operation between two sets of simple, consistently oriented paths
fn boolean(subject: &[Path], clip: &[Path], rule: OverlayRule) -> Vec<Shape> {
    match (subject.is_empty(), clip.is_empty()) {
        (true, true) => Vec::new(),
        (true, false) | (false, true) if matches!(rule, OverlayRule::Intersect) => Vec::new(),
        (true, false) => resolve_positive(clip),
        (false, true) => resolve_positive(subject),
        (false, false) => {
            let subject = subject.to_vec();
            let clip = clip.to_vec();
            normalize_shapes(subject.overlay(&clip, rule, FillRule::EvenOdd))
        }
    }
}

/// Every path of every shape, orientation preserved
pub fn flatten(shapes: Vec<Shape>) -> Vec<Path> {
    shapes.into_iter().flatten().collect()
}

/// Orient outer boundaries counter-clockwise and holes clockwise, dropping
/// degenerate paths
fn normalize_shapes(shapes: Vec<Shape>) -> Vec<Shape> {
    let mut out = Vec::with_capacity(shapes.len());
    for shape in shapes {
        let mut paths = shape.into_iter();
        let Some(outer) = paths.next() else {
            continue;
        };
        if compute_signed_area(&outer).abs() <= MIN_AREA_THRESHOLD {
            continue;
        }
        let mut normalized = vec![ensure_ccw(&outer)];
        for hole in paths {
            if compute_signed_area(&hole).abs() > MIN_AREA_THRESHOLD {
                normalized.push(ensure_cw(&hole));
            }
        }
        out.push(normalized);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON_2D: f64 = 1e-9;

    fn square(x0: f64, y0: f64, size: f64) -> Path {
        vec![[x0, y0], [x0 + size, y0], [x0 + size, y0 + size], [x0, y0 + size]]
    }

    fn total_area(shapes: &[Shape]) -> f64 {
        shapes
            .iter()
            .flat_map(|s| s.iter())
            .map(|p| compute_signed_area(p))
            .sum()
    }

    #[test]
    fn test_compute_signed_area() {
        let ccw = square(0.0, 0.0, 1.0);
        assert!((compute_signed_area(&ccw) - 1.0).abs() < EPSILON_2D);
        let cw: Path = ccw.iter().rev().copied().collect();
        assert!((compute_signed_area(&cw) + 1.0).abs() < EPSILON_2D);
    }

    #[test]
    fn test_ensure_orientation() {
        let cw: Path = square(0.0, 0.0, 1.0).into_iter().rev().collect();
        assert!(compute_signed_area(&ensure_ccw(&cw)) > 0.0);
        assert!(compute_signed_area(&ensure_cw(&square(0.0, 0.0, 1.0))) < 0.0);
    }

    #[test]
    fn test_positive_keeps_ccw_drops_cw() {
        let ccw = square(0.0, 0.0, 1.0);
        assert_eq!(resolve_positive(&[ccw.clone()]).len(), 1);

        let cw: Path = ccw.iter().rev().copied().collect();
        assert!(resolve_positive(&[cw]).is_empty());
    }

    #[test]
    fn test_positive_cancels_opposite_windings() {
        let outer = square(0.0, 0.0, 4.0);
        let inner: Path = square(1.0, 1.0, 2.0).into_iter().rev().collect();
        let shapes = resolve_positive(&[outer, inner]);
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].len(), 2);
        assert!((total_area(&shapes) - 12.0).abs() < 1e-6);
    }

    #[test]
    fn test_positive_merges_overlaps() {
        let shapes = resolve_positive(&[square(0.0, 0.0, 2.0), square(1.0, 0.0, 2.0)]);
        assert_eq!(shapes.len(), 1);
        assert!((total_area(&shapes) - 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_abs_geq_two_is_overlap() {
        let groups = vec![vec![square(0.0, 0.0, 2.0)], vec![square(1.0, 1.0, 2.0)]];
        let shapes = resolve_abs_geq_two(&groups);
        assert_eq!(shapes.len(), 1);
        assert!((total_area(&shapes) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_abs_geq_two_disjoint_is_empty() {
        let groups = vec![vec![square(0.0, 0.0, 1.0)], vec![square(5.0, 5.0, 1.0)]];
        assert!(resolve_abs_geq_two(&groups).is_empty());
    }

    #[test]
    fn test_abs_geq_two_counts_groups_not_contours() {
        // two overlapping contours in the same group do not count twice
        let groups = vec![vec![square(0.0, 0.0, 2.0), square(1.0, 0.0, 2.0)]];
        assert!(resolve_abs_geq_two(&groups).is_empty());
    }
}
