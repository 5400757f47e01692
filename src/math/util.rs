use super::{Point2d, Vector2d};
use cgmath::prelude::*;
use std::f64::consts::PI;

/// Segments shorter than this are treated as this long when normalising.
const MIN_SEGMENT_LEN: f64 = 1.0;

/// Projects a point onto a local coordinate system.
///
/// # Parameters
/// * `point` - The point to project
/// * `origin` - The origin of the coordinate system
/// * `x_axis` - The basis vector pointing in the positive x-axis.
/// * `y_axis` - The basis vector pointing in the positive y-axis.
pub fn project_local(
    point: Point2d,
    origin: Point2d,
    x_axis: Vector2d,
    y_axis: Vector2d,
) -> Point2d {
    let point = point - origin;
    Point2d::new(point.dot(x_axis), point.dot(y_axis))
}

/// Rotates a vector 90 degrees clockwise.
pub fn rot90(vec: Vector2d) -> Vector2d {
    Vector2d::new(-vec.y, vec.x)
}

/// The unit vector pointing from `from` to `to`.
///
/// Coincident points produce a zero vector rather than NaNs.
pub fn direction(from: Point2d, to: Point2d) -> Vector2d {
    let delta = to - from;
    delta / f64::max(delta.magnitude(), MIN_SEGMENT_LEN)
}

/// The angle of a vector in radians, measured from the positive x axis.
pub fn heading_of(vec: Vector2d) -> f64 {
    vec.y.atan2(vec.x)
}

/// Wraps an angle into the range `[-π, π)`.
pub fn wrap_angle(angle: f64) -> f64 {
    (angle + PI).rem_euclid(2.0 * PI) - PI
}

/// Interpolates between two angles along the shortest arc.
///
/// # Parameters
/// * `from` - The starting angle in radians
/// * `to` - The target angle in radians
/// * `t` - The blend factor, where 0 returns `from` and 1 returns `to`
pub fn lerp_angle(from: f64, to: f64, t: f64) -> f64 {
    from + wrap_angle(to - from) * t
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn wraps_angles() {
        assert_approx_eq!(wrap_angle(0.0), 0.0);
        assert_approx_eq!(wrap_angle(1.5 * PI), -0.5 * PI);
        assert_approx_eq!(wrap_angle(-1.5 * PI), 0.5 * PI);
        assert_approx_eq!(wrap_angle(4.0 * PI + 0.25), 0.25);
    }

    #[test]
    fn lerp_takes_shortest_arc() {
        // From just below +π to just above -π is a small step across the seam
        let from = PI - 0.1;
        let to = -PI + 0.1;
        let mid = lerp_angle(from, to, 0.5);
        assert_approx_eq!(wrap_angle(mid - PI), 0.0, 1e-9);
        assert_approx_eq!(lerp_angle(0.0, 1.0, 0.15), 0.15);
    }

    #[test]
    fn direction_of_coincident_points() {
        let p = Point2d::new(3.0, 4.0);
        assert_eq!(direction(p, p), Vector2d::new(0.0, 0.0));

        let d = direction(Point2d::new(0.0, 0.0), Point2d::new(0.0, 10.0));
        assert_approx_eq!(d.x, 0.0);
        assert_approx_eq!(d.y, 1.0);
    }

    #[test]
    fn projects_onto_local_axes() {
        let tan = Vector2d::new(1.0, 0.0);
        let p = project_local(
            Point2d::new(5.0, 2.0),
            Point2d::new(1.0, 1.0),
            rot90(tan),
            tan,
        );
        assert_approx_eq!(p.x, 1.0);
        assert_approx_eq!(p.y, 4.0);
    }
}
