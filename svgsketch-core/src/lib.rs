pub mod geometry {
    use glam::{DQuat, DVec3};
    use serde::{Deserialize, Serialize};

    /// 三维点，内部以 `glam::DVec3` 表示，宿主文档中的所有坐标均为毫米。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point3(pub DVec3);

    impl Point3 {
        pub const ORIGIN: Point3 = Point3(DVec3::ZERO);

        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn z(self) -> f64 {
            self.0.z
        }

        #[inline]
        pub fn translate(self, offset: Vector3) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn vector_to(self, other: Point3) -> Vector3 {
            Vector3(other.0 - self.0)
        }

        #[inline]
        pub fn distance(self, other: Point3) -> f64 {
            self.0.distance(other.0)
        }

        #[inline]
        pub fn as_vec3(self) -> DVec3 {
            self.0
        }

        #[inline]
        pub fn is_finite(self) -> bool {
            self.0.is_finite()
        }
    }

    impl From<DVec3> for Point3 {
        fn from(value: DVec3) -> Self {
            Self(value)
        }
    }

    /// 三维向量，用于圆的法向与椭圆主轴方向。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector3(pub DVec3);

    impl Vector3 {
        pub const Z: Vector3 = Vector3(DVec3::Z);

        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn as_vec3(self) -> DVec3 {
            self.0
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn z(self) -> f64 {
            self.0.z
        }

        #[inline]
        pub fn length(self) -> f64 {
            self.0.length()
        }

        #[inline]
        pub fn length_squared(self) -> f64 {
            self.0.length_squared()
        }

        #[inline]
        pub fn normalize(self) -> Option<Self> {
            let len = self.0.length();
            if len <= f64::EPSILON || !len.is_finite() {
                None
            } else {
                Some(Self(self.0 / len))
            }
        }

        #[inline]
        pub fn dot(self, other: Vector3) -> f64 {
            self.0.dot(other.0)
        }

        #[inline]
        pub fn cross(self, other: Vector3) -> Vector3 {
            Self(self.0.cross(other.0))
        }
    }

    impl From<DVec3> for Vector3 {
        fn from(value: DVec3) -> Self {
            Self(value)
        }
    }

    /// 刚体放置：先旋转再平移，即 `translate(position) ∘ rotate(rotation)`。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Placement {
        pub position: DVec3,
        pub rotation: DQuat,
    }

    impl Default for Placement {
        fn default() -> Self {
            Self::IDENTITY
        }
    }

    impl Placement {
        pub const IDENTITY: Placement = Placement {
            position: DVec3::ZERO,
            rotation: DQuat::IDENTITY,
        };

        #[inline]
        pub fn new(position: DVec3, rotation: DQuat) -> Self {
            Self { position, rotation }
        }

        #[inline]
        pub fn from_translation(position: DVec3) -> Self {
            Self::new(position, DQuat::IDENTITY)
        }

        #[inline]
        pub fn transform_point(&self, point: Point3) -> Point3 {
            Point3(self.rotation * point.0 + self.position)
        }

        /// 方向量只受旋转影响。
        #[inline]
        pub fn transform_vector(&self, vector: Vector3) -> Vector3 {
            Vector3(self.rotation * vector.0)
        }

        pub fn approx_eq(&self, other: &Placement, tolerance: f64) -> bool {
            if !self.position.abs_diff_eq(other.position, tolerance) {
                return false;
            }
            // q 与 -q 表示同一旋转。
            self.rotation.abs_diff_eq(other.rotation, tolerance)
                || self.rotation.abs_diff_eq(-other.rotation, tolerance)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::f64::consts::FRAC_PI_2;

        #[test]
        fn placement_rotates_then_translates() {
            let placement = Placement::new(
                DVec3::new(10.0, 0.0, 5.0),
                DQuat::from_rotation_z(FRAC_PI_2),
            );
            let moved = placement.transform_point(Point3::new(1.0, 0.0, 0.0));
            assert!((moved.x() - 10.0).abs() < 1e-12);
            assert!((moved.y() - 1.0).abs() < 1e-12);
            assert!((moved.z() - 5.0).abs() < 1e-12);

            let axis = placement.transform_vector(Vector3::new(1.0, 0.0, 0.0));
            assert!(axis.x().abs() < 1e-12);
            assert!((axis.y() - 1.0).abs() < 1e-12);
        }

        #[test]
        fn approx_eq_treats_negated_quaternion_as_equal() {
            let a = Placement::new(DVec3::ONE, DQuat::from_rotation_z(0.7));
            let b = Placement::new(DVec3::ONE, -DQuat::from_rotation_z(0.7));
            assert!(a.approx_eq(&b, 1e-12));
            assert!(!a.approx_eq(&Placement::IDENTITY, 1e-12));
        }
    }
}

pub mod curve {
    use std::f64::consts::FRAC_PI_2;

    use glam::{DVec3, DVec4};
    use serde::{Deserialize, Serialize};
    use thiserror::Error;

    use crate::geometry::{Point3, Vector3};

    const WEIGHT_TOLERANCE: f64 = 1e-12;

    #[derive(Debug, Clone, PartialEq, Error)]
    pub enum CurveError {
        #[error("line segment has zero length")]
        DegenerateLine,
        #[error("radius must be positive and finite (got {0})")]
        InvalidRadius(f64),
        #[error("axis vector has zero length")]
        ZeroAxis,
        #[error("coordinates must be finite")]
        NonFinite,
        #[error("B-spline degree must be at least 1")]
        InvalidDegree,
        #[error("B-spline of degree {degree} needs at least {required} poles, got {actual}")]
        TooFewPoles {
            degree: u32,
            required: usize,
            actual: usize,
        },
        #[error("{knots} knots but {multiplicities} multiplicities")]
        KnotMismatch { knots: usize, multiplicities: usize },
        #[error("knots must be strictly increasing")]
        NonIncreasingKnots,
        #[error("knot multiplicity {multiplicity} exceeds the allowed maximum {max}")]
        MultiplicityTooHigh { multiplicity: u32, max: u32 },
        #[error("multiplicities sum to {actual}, expected {expected}")]
        MultiplicitySum { expected: usize, actual: usize },
        #[error("{actual} weights for {expected} poles")]
        WeightCount { expected: usize, actual: usize },
        #[error("weights must be positive and finite")]
        InvalidWeight,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct LineSegment {
        pub start: Point3,
        pub end: Point3,
    }

    impl LineSegment {
        #[inline]
        pub fn new(start: Point3, end: Point3) -> Self {
            Self { start, end }
        }

        #[inline]
        pub fn length(&self) -> f64 {
            self.start.distance(self.end)
        }

        pub fn validate(&self) -> Result<(), CurveError> {
            if !self.start.is_finite() || !self.end.is_finite() {
                return Err(CurveError::NonFinite);
            }
            if self.length() <= f64::EPSILON {
                return Err(CurveError::DegenerateLine);
            }
            Ok(())
        }
    }

    /// 完整的圆，`axis` 为圆所在平面的法向。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct CircleCurve {
        pub center: Point3,
        pub axis: Vector3,
        pub radius: f64,
    }

    impl CircleCurve {
        #[inline]
        pub fn new(center: Point3, axis: Vector3, radius: f64) -> Self {
            Self {
                center,
                axis,
                radius,
            }
        }

        pub fn validate(&self) -> Result<(), CurveError> {
            if !self.center.is_finite() {
                return Err(CurveError::NonFinite);
            }
            if !(self.radius.is_finite() && self.radius > 0.0) {
                return Err(CurveError::InvalidRadius(self.radius));
            }
            if self.axis.normalize().is_none() {
                return Err(CurveError::ZeroAxis);
            }
            Ok(())
        }
    }

    /// 完整椭圆，主轴方向与法向正交。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct EllipseCurve {
        pub center: Point3,
        pub axis: Vector3,
        pub major_direction: Vector3,
        pub major_radius: f64,
        pub minor_radius: f64,
    }

    impl EllipseCurve {
        pub fn validate(&self) -> Result<(), CurveError> {
            if !self.center.is_finite() {
                return Err(CurveError::NonFinite);
            }
            for radius in [self.major_radius, self.minor_radius] {
                if !(radius.is_finite() && radius > 0.0) {
                    return Err(CurveError::InvalidRadius(radius));
                }
            }
            if self.axis.normalize().is_none() || self.major_direction.normalize().is_none() {
                return Err(CurveError::ZeroAxis);
            }
            Ok(())
        }
    }

    /// B 样条曲线。`knots` 为去重后的节点，`multiplicities` 与之一一对应；
    /// `weights` 为 `None` 时表示非有理曲线。
    ///
    /// 非周期曲线满足 `Σ multiplicities == poles + degree + 1`；
    /// 周期曲线满足 `Σ multiplicities[..last] == poles`，首尾节点之差即周期。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct BSplineCurve {
        pub poles: Vec<Point3>,
        pub weights: Option<Vec<f64>>,
        pub knots: Vec<f64>,
        pub multiplicities: Vec<u32>,
        pub degree: u32,
        pub periodic: bool,
    }

    impl BSplineCurve {
        pub fn new(
            poles: Vec<Point3>,
            weights: Option<Vec<f64>>,
            knots: Vec<f64>,
            multiplicities: Vec<u32>,
            degree: u32,
            periodic: bool,
        ) -> Result<Self, CurveError> {
            let curve = Self {
                poles,
                weights,
                knots,
                multiplicities,
                degree,
                periodic,
            };
            curve.validate()?;
            Ok(curve)
        }

        /// 由 Bézier 控制点构造，次数为控制点数减一。
        pub fn bezier(control_points: Vec<Point3>) -> Result<Self, CurveError> {
            let degree = control_points.len().saturating_sub(1) as u32;
            Self::new(
                control_points,
                None,
                vec![0.0, 1.0],
                vec![degree + 1, degree + 1],
                degree,
                false,
            )
        }

        /// 以有理二次 B 样条精确表示椭圆弧 `C + U·cosθ + V·sinθ`，θ ∈ [start, start + sweep]。
        /// 每段跨度不超过 90°，仿射变换后的结果依然精确。
        pub fn conic_arc(
            center: Point3,
            u: Vector3,
            v: Vector3,
            start_angle: f64,
            sweep: f64,
        ) -> Result<Self, CurveError> {
            if !sweep.is_finite() || sweep.abs() <= f64::EPSILON {
                return Err(CurveError::DegenerateLine);
            }
            let segments = (sweep.abs() / FRAC_PI_2).ceil().max(1.0) as usize;
            let delta = sweep / segments as f64;
            let half_cos = (delta / 2.0).cos();
            let at = |theta: f64, scale: f64| {
                Point3(center.0 + (u.0 * theta.cos() + v.0 * theta.sin()) * scale)
            };

            let mut poles = Vec::with_capacity(2 * segments + 1);
            let mut weights = Vec::with_capacity(2 * segments + 1);
            poles.push(at(start_angle, 1.0));
            weights.push(1.0);
            for index in 0..segments {
                let theta0 = start_angle + delta * index as f64;
                poles.push(at(theta0 + delta / 2.0, 1.0 / half_cos));
                weights.push(half_cos);
                poles.push(at(theta0 + delta, 1.0));
                weights.push(1.0);
            }

            let knots = (0..=segments).map(|k| k as f64).collect();
            let mut multiplicities = vec![2; segments + 1];
            multiplicities[0] = 3;
            multiplicities[segments] = 3;
            Self::new(poles, Some(weights), knots, multiplicities, 2, false)
        }

        pub fn validate(&self) -> Result<(), CurveError> {
            if self.degree == 0 {
                return Err(CurveError::InvalidDegree);
            }
            let degree = self.degree as usize;
            let required = if self.periodic { 2 } else { degree + 1 };
            if self.poles.len() < required {
                return Err(CurveError::TooFewPoles {
                    degree: self.degree,
                    required,
                    actual: self.poles.len(),
                });
            }
            if self.poles.iter().any(|pole| !pole.is_finite()) {
                return Err(CurveError::NonFinite);
            }
            if self.knots.len() != self.multiplicities.len() || self.knots.len() < 2 {
                return Err(CurveError::KnotMismatch {
                    knots: self.knots.len(),
                    multiplicities: self.multiplicities.len(),
                });
            }
            if self.knots.iter().any(|knot| !knot.is_finite())
                || self.knots.windows(2).any(|pair| pair[1] <= pair[0])
            {
                return Err(CurveError::NonIncreasingKnots);
            }

            let last = self.multiplicities.len() - 1;
            for (index, &multiplicity) in self.multiplicities.iter().enumerate() {
                let end = index == 0 || index == last;
                let max = if end && !self.periodic {
                    self.degree + 1
                } else {
                    self.degree
                };
                if multiplicity == 0 || multiplicity > max {
                    return Err(CurveError::MultiplicityTooHigh { multiplicity, max });
                }
            }

            let (expected, actual) = if self.periodic {
                (
                    self.poles.len(),
                    self.multiplicities[..last]
                        .iter()
                        .map(|&m| m as usize)
                        .sum(),
                )
            } else {
                (
                    self.poles.len() + degree + 1,
                    self.multiplicities.iter().map(|&m| m as usize).sum(),
                )
            };
            if expected != actual {
                return Err(CurveError::MultiplicitySum { expected, actual });
            }

            if let Some(weights) = &self.weights {
                if weights.len() != self.poles.len() {
                    return Err(CurveError::WeightCount {
                        expected: self.poles.len(),
                        actual: weights.len(),
                    });
                }
                if weights.iter().any(|w| !(w.is_finite() && *w > 0.0)) {
                    return Err(CurveError::InvalidWeight);
                }
            }
            Ok(())
        }

        /// 存在不为 1 的权重时才视为有理曲线。
        pub fn is_rational(&self) -> bool {
            self.weights.as_ref().is_some_and(|weights| {
                weights
                    .iter()
                    .any(|w| (w - 1.0).abs() > WEIGHT_TOLERANCE)
            })
        }

        #[inline]
        pub fn weight(&self, index: usize) -> f64 {
            self.weights
                .as_ref()
                .and_then(|weights| weights.get(index).copied())
                .unwrap_or(1.0)
        }

        /// 展开后的节点向量；周期曲线会被展开为等价的非周期表示。
        pub fn flat_knots(&self) -> Vec<f64> {
            if !self.periodic {
                return self
                    .knots
                    .iter()
                    .zip(&self.multiplicities)
                    .flat_map(|(&knot, &mult)| std::iter::repeat_n(knot, mult as usize))
                    .collect();
            }

            let last = self.knots.len() - 1;
            let base: Vec<f64> = self.knots[..last]
                .iter()
                .zip(&self.multiplicities[..last])
                .flat_map(|(&knot, &mult)| std::iter::repeat_n(knot, mult as usize))
                .collect();
            let count = base.len() as i64;
            let period = self.knots[last] - self.knots[0];
            let degree = self.degree as i64;
            (-degree..=count + degree)
                .map(|i| base[i.rem_euclid(count) as usize] + period * i.div_euclid(count) as f64)
                .collect()
        }

        /// 参数定义域。
        pub fn domain(&self) -> (f64, f64) {
            let flat = self.flat_knots();
            let degree = self.degree as usize;
            (flat[degree], flat[flat.len() - degree - 1])
        }

        fn homogeneous_poles(&self) -> Vec<DVec4> {
            let count = self.poles.len();
            let total = if self.periodic {
                count + self.degree as usize
            } else {
                count
            };
            (0..total)
                .map(|i| {
                    let index = i % count;
                    let w = self.weight(index);
                    (self.poles[index].0 * w).extend(w)
                })
                .collect()
        }

        /// 使用 de Boor 算法在齐次坐标下求值，参数会被限制在定义域内。
        /// 曲线需先通过 [`BSplineCurve::validate`]。
        pub fn point_at(&self, parameter: f64) -> Point3 {
            let flat = self.flat_knots();
            let poles = self.homogeneous_poles();
            evaluate(&flat, &poles, self.degree as usize, parameter)
        }

        /// 在定义域内均匀取 `segments + 1` 个采样点。
        pub fn sample(&self, segments: usize) -> Vec<Point3> {
            let segments = segments.max(1);
            let flat = self.flat_knots();
            let poles = self.homogeneous_poles();
            let degree = self.degree as usize;
            let (start, end) = (flat[degree], flat[flat.len() - degree - 1]);
            (0..=segments)
                .map(|i| {
                    let t = start + (end - start) * i as f64 / segments as f64;
                    evaluate(&flat, &poles, degree, t)
                })
                .collect()
        }

        /// 仅对控制点施加变换，节点、重数、次数与权重保持不变。
        pub fn map_poles(&self, mut transform: impl FnMut(Point3) -> Point3) -> Self {
            Self {
                poles: self.poles.iter().map(|&pole| transform(pole)).collect(),
                ..self.clone()
            }
        }

        pub fn start_point(&self) -> Point3 {
            self.point_at(self.domain().0)
        }

        pub fn end_point(&self) -> Point3 {
            self.point_at(self.domain().1)
        }
    }

    fn evaluate(flat: &[f64], poles: &[DVec4], degree: usize, parameter: f64) -> Point3 {
        let start = flat[degree];
        let end = flat[poles.len()];
        let t = parameter.clamp(start, end);
        let span = find_span(flat, poles.len(), degree, t);

        let mut d: Vec<DVec4> = (0..=degree).map(|j| poles[j + span - degree]).collect();
        for r in 1..=degree {
            for j in (r..=degree).rev() {
                let left = flat[j + span - degree];
                let right = flat[j + 1 + span - r];
                let denom = right - left;
                let alpha = if denom.abs() <= f64::EPSILON {
                    0.0
                } else {
                    (t - left) / denom
                };
                d[j] = d[j - 1] * (1.0 - alpha) + d[j] * alpha;
            }
        }
        let h = d[degree];
        Point3(DVec3::new(h.x, h.y, h.z) / h.w)
    }

    fn find_span(flat: &[f64], pole_count: usize, degree: usize, t: f64) -> usize {
        (degree..pole_count)
            .rev()
            .find(|&k| flat[k] <= t && flat[k] < flat[k + 1])
            .unwrap_or(degree)
    }

    /// 宿主几何层中的曲线种类。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub enum Curve {
        Line(LineSegment),
        Circle(CircleCurve),
        Ellipse(EllipseCurve),
        BSpline(BSplineCurve),
    }

    impl Curve {
        /// 宿主侧的类型名，用于日志与不支持类型的提示。
        pub fn type_name(&self) -> &'static str {
            match self {
                Curve::Line(_) => "Line",
                Curve::Circle(_) => "Circle",
                Curve::Ellipse(_) => "Ellipse",
                Curve::BSpline(_) => "BSplineCurve",
            }
        }

        pub fn validate(&self) -> Result<(), CurveError> {
            match self {
                Curve::Line(line) => line.validate(),
                Curve::Circle(circle) => circle.validate(),
                Curve::Ellipse(ellipse) => ellipse.validate(),
                Curve::BSpline(spline) => spline.validate(),
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::f64::consts::{PI, TAU};

        fn cubic() -> BSplineCurve {
            BSplineCurve::new(
                vec![
                    Point3::new(0.0, 0.0, 0.0),
                    Point3::new(1.0, 2.0, 0.0),
                    Point3::new(3.0, 3.0, 0.0),
                    Point3::new(5.0, 1.0, 0.0),
                    Point3::new(6.0, -1.0, 0.0),
                ],
                None,
                vec![0.0, 0.5, 1.0],
                vec![4, 1, 4],
                3,
                false,
            )
            .expect("valid cubic")
        }

        #[test]
        fn clamped_spline_interpolates_end_poles() {
            let spline = cubic();
            assert_eq!(spline.flat_knots().len(), 9);
            assert_eq!(spline.domain(), (0.0, 1.0));
            assert!(spline.start_point().distance(Point3::new(0.0, 0.0, 0.0)) < 1e-12);
            assert!(spline.end_point().distance(Point3::new(6.0, -1.0, 0.0)) < 1e-12);
        }

        #[test]
        fn bezier_midpoint_matches_bernstein_form() {
            let p = [
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(0.0, 4.0, 0.0),
                Point3::new(4.0, 4.0, 0.0),
                Point3::new(4.0, 0.0, 0.0),
            ];
            let spline = BSplineCurve::bezier(p.to_vec()).expect("bezier");
            let mid = spline.point_at(0.5);
            let expected = (p[0].0 + p[1].0 * 3.0 + p[2].0 * 3.0 + p[3].0) / 8.0;
            assert!(mid.0.abs_diff_eq(expected, 1e-12));
        }

        #[test]
        fn conic_arc_points_lie_on_circle() {
            let arc = BSplineCurve::conic_arc(
                Point3::new(2.0, 3.0, 0.0),
                Vector3::new(5.0, 0.0, 0.0),
                Vector3::new(0.0, 5.0, 0.0),
                0.25,
                1.5 * PI,
            )
            .expect("arc");
            assert!(arc.is_rational());
            assert_eq!(arc.degree, 2);
            for point in arc.sample(64) {
                let radius = point.distance(Point3::new(2.0, 3.0, 0.0));
                assert!((radius - 5.0).abs() < 1e-9, "radius {radius}");
            }
            let end = arc.end_point();
            let expected = Point3::new(
                2.0 + 5.0 * (0.25 + 1.5 * PI).cos(),
                3.0 + 5.0 * (0.25 + 1.5 * PI).sin(),
                0.0,
            );
            assert!(end.distance(expected) < 1e-9);
        }

        #[test]
        fn periodic_spline_is_closed() {
            let spline = BSplineCurve::new(
                vec![
                    Point3::new(0.0, 0.0, 0.0),
                    Point3::new(4.0, 0.0, 0.0),
                    Point3::new(4.0, 4.0, 0.0),
                    Point3::new(0.0, 4.0, 0.0),
                ],
                None,
                vec![0.0, 1.0, 2.0, 3.0, 4.0],
                vec![1, 1, 1, 1, 1],
                2,
                true,
            )
            .expect("periodic spline");
            let (start, end) = spline.domain();
            assert_eq!((start, end), (0.0, 4.0));
            assert!(spline.point_at(start).distance(spline.point_at(end)) < 1e-12);
            let samples = spline.sample(10);
            assert_eq!(samples.len(), 11);
        }

        #[test]
        fn validation_rejects_bad_multiplicities() {
            let mut spline = cubic();
            spline.multiplicities = vec![4, 2, 4];
            assert!(matches!(
                spline.validate(),
                Err(CurveError::MultiplicitySum { .. })
            ));

            let mut spline = cubic();
            spline.weights = Some(vec![1.0; 3]);
            assert!(matches!(
                spline.validate(),
                Err(CurveError::WeightCount { .. })
            ));
        }

        #[test]
        fn unit_weights_are_not_rational() {
            let mut spline = cubic();
            spline.weights = Some(vec![1.0; 5]);
            assert!(!spline.is_rational());
            spline.weights = Some(vec![1.0, 0.5, 1.0, 1.0, 1.0]);
            assert!(spline.is_rational());
        }

        #[test]
        fn curve_validation_flags_degenerate_geometry() {
            let line = Curve::Line(LineSegment::new(Point3::ORIGIN, Point3::ORIGIN));
            assert_eq!(line.validate(), Err(CurveError::DegenerateLine));
            let circle = Curve::Circle(CircleCurve::new(Point3::ORIGIN, Vector3::Z, 0.0));
            assert_eq!(circle.validate(), Err(CurveError::InvalidRadius(0.0)));
            let circle = Curve::Circle(CircleCurve::new(Point3::ORIGIN, Vector3::Z, TAU));
            assert!(circle.validate().is_ok());
        }
    }
}

pub mod shape {
    use serde::{Deserialize, Serialize};

    use crate::curve::{Curve, CurveError};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Edge {
        pub curve: Curve,
    }

    impl Edge {
        #[inline]
        pub fn new(curve: Curve) -> Self {
            Self { curve }
        }
    }

    impl From<Curve> for Edge {
        fn from(curve: Curve) -> Self {
            Self::new(curve)
        }
    }

    /// 有序的边集合。
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct Shape {
        pub edges: Vec<Edge>,
    }

    impl Shape {
        pub fn new(edges: Vec<Edge>) -> Self {
            Self { edges }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.edges.is_empty()
        }

        #[inline]
        pub fn edges(&self) -> impl Iterator<Item = &Edge> {
            self.edges.iter()
        }

        pub fn push(&mut self, curve: Curve) {
            self.edges.push(Edge::new(curve));
        }

        /// 校验所有边，返回第一条无效边的序号与原因。
        pub fn validate(&self) -> Result<(), (usize, CurveError)> {
            for (index, edge) in self.edges.iter().enumerate() {
                edge.curve.validate().map_err(|err| (index, err))?;
            }
            Ok(())
        }
    }
}

pub mod document {
    use std::collections::HashSet;
    use std::fmt;

    use serde::{Deserialize, Serialize};
    use thiserror::Error;

    use crate::curve::{BSplineCurve, CircleCurve, Curve, LineSegment};
    use crate::geometry::Placement;
    use crate::shape::{Edge, Shape};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    pub struct ObjectId(u64);

    impl ObjectId {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        /// 提供原始数值，便于序列化或日志输出。
        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    impl fmt::Display for ObjectId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "#{}", self.0)
        }
    }

    #[derive(Debug, Error, PartialEq)]
    pub enum DocumentError {
        #[error("object {0} not found")]
        ObjectNotFound(ObjectId),
        #[error("object `{0}` is not a container")]
        NotAContainer(String),
        #[error("object `{0}` is not a sketch")]
        NotASketch(String),
        #[error("object `{child}` cannot be placed inside `{container}`")]
        InvalidNesting { container: String, child: String },
    }

    /// 草图中的一条几何。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub enum SketchEntry {
        LineSegment(LineSegment),
        Circle(CircleCurve),
        BSpline(BSplineCurve),
    }

    impl SketchEntry {
        pub fn to_curve(&self) -> Curve {
            match self {
                SketchEntry::LineSegment(line) => Curve::Line(line.clone()),
                SketchEntry::Circle(circle) => Curve::Circle(circle.clone()),
                SketchEntry::BSpline(spline) => Curve::BSpline(spline.clone()),
            }
        }
    }

    /// 草图对象：几何条目加上可选的支撑对象（重算时复制其放置）。
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct Sketch {
        pub entries: Vec<SketchEntry>,
        pub support: Option<ObjectId>,
        /// 重算后由条目派生的形状。
        #[serde(default)]
        pub shape: Shape,
    }

    impl Sketch {
        pub fn new(support: Option<ObjectId>) -> Self {
            Self {
                support,
                ..Self::default()
            }
        }

        /// 追加一条几何，返回其在草图中的序号。
        pub fn add_entry(&mut self, entry: SketchEntry) -> usize {
            self.entries.push(entry);
            self.entries.len() - 1
        }

        #[inline]
        pub fn entries(&self) -> &[SketchEntry] {
            &self.entries
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum ContainerKind {
        Body,
        Slice,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Container {
        pub kind: ContainerKind,
        pub children: Vec<ObjectId>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub enum ObjectKind {
        /// 导入得到的几何特征。
        Feature { shape: Shape },
        /// 无几何的放置锚点。
        ReferenceFrame,
        Sketch(Sketch),
        Container(Container),
    }

    impl ObjectKind {
        pub fn type_name(&self) -> &'static str {
            match self {
                ObjectKind::Feature { .. } => "Feature",
                ObjectKind::ReferenceFrame => "ReferenceFrame",
                ObjectKind::Sketch(_) => "Sketch",
                ObjectKind::Container(container) => match container.kind {
                    ContainerKind::Body => "Body",
                    ContainerKind::Slice => "Slice",
                },
            }
        }
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub enum ObjectStatus {
        #[default]
        Valid,
        Invalid(String),
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct DocumentObject {
        pub id: ObjectId,
        pub name: String,
        pub label: String,
        pub placement: Placement,
        pub parent: Option<ObjectId>,
        pub kind: ObjectKind,
        #[serde(default)]
        pub touched: bool,
        #[serde(default)]
        pub status: ObjectStatus,
    }

    impl DocumentObject {
        /// 带形状的对象：导入特征与草图。
        pub fn shape(&self) -> Option<&Shape> {
            match &self.kind {
                ObjectKind::Feature { shape } => Some(shape),
                ObjectKind::Sketch(sketch) => Some(&sketch.shape),
                ObjectKind::ReferenceFrame | ObjectKind::Container(_) => None,
            }
        }

        pub fn as_sketch(&self) -> Option<&Sketch> {
            match &self.kind {
                ObjectKind::Sketch(sketch) => Some(sketch),
                _ => None,
            }
        }

        fn dependencies(&self) -> Vec<ObjectId> {
            match &self.kind {
                ObjectKind::Sketch(sketch) => sketch.support.into_iter().collect(),
                ObjectKind::Container(container) => container.children.clone(),
                ObjectKind::Feature { .. } | ObjectKind::ReferenceFrame => Vec::new(),
            }
        }

        /// 执行单个对象的重算。`support` 为支撑对象的放置（`Some(None)` 表示支撑已丢失）。
        fn execute(&mut self, support: Option<Option<Placement>>) -> Result<(), String> {
            match &mut self.kind {
                ObjectKind::Feature { shape } => shape
                    .validate()
                    .map_err(|(index, err)| format!("edge {index}: {err}")),
                ObjectKind::ReferenceFrame | ObjectKind::Container(_) => Ok(()),
                ObjectKind::Sketch(sketch) => {
                    match support {
                        Some(Some(placement)) => self.placement = placement,
                        Some(None) => {
                            return Err(format!(
                                "support object {} no longer exists",
                                sketch.support.map(|id| id.get()).unwrap_or_default()
                            ));
                        }
                        None => {}
                    }
                    let shape = Shape::new(
                        sketch
                            .entries
                            .iter()
                            .map(|entry| Edge::new(entry.to_curve()))
                            .collect(),
                    );
                    shape
                        .validate()
                        .map_err(|(index, err)| format!("geometry {index}: {err}"))?;
                    sketch.shape = shape;
                    Ok(())
                }
            }
        }
    }

    /// 重算阶段收集到的单个对象错误。
    #[derive(Debug, Clone, PartialEq)]
    pub struct RecomputeFailure {
        pub object: ObjectId,
        pub name: String,
        pub message: String,
    }

    /// 某一时刻文档中对象 ID 的集合，按创建顺序保存。
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct ObjectSnapshot {
        ids: Vec<ObjectId>,
    }

    impl ObjectSnapshot {
        pub fn from_ids(ids: impl IntoIterator<Item = ObjectId>) -> Self {
            let mut ids: Vec<ObjectId> = ids.into_iter().collect();
            ids.sort();
            ids.dedup();
            Self { ids }
        }

        #[inline]
        pub fn len(&self) -> usize {
            self.ids.len()
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.ids.is_empty()
        }

        #[inline]
        pub fn contains(&self, id: ObjectId) -> bool {
            self.ids.binary_search(&id).is_ok()
        }

        #[inline]
        pub fn ids(&self) -> &[ObjectId] {
            &self.ids
        }

        /// `self − earlier`，按创建顺序返回。
        pub fn created_since(&self, earlier: &ObjectSnapshot) -> Vec<ObjectId> {
            self.ids
                .iter()
                .copied()
                .filter(|id| !earlier.contains(*id))
                .collect()
        }
    }

    /// 宿主文档：对象按创建顺序保存，名称在文档内唯一。
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct Document {
        name: String,
        objects: Vec<DocumentObject>,
        next_object_id: u64,
    }

    impl Document {
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                ..Self::default()
            }
        }

        #[inline]
        pub fn name(&self) -> &str {
            &self.name
        }

        #[inline]
        pub fn len(&self) -> usize {
            self.objects.len()
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.objects.is_empty()
        }

        #[inline]
        pub fn objects(&self) -> impl Iterator<Item = &DocumentObject> {
            self.objects.iter()
        }

        pub fn object(&self, id: ObjectId) -> Option<&DocumentObject> {
            self.index_of(id).map(|index| &self.objects[index])
        }

        pub fn object_by_name(&self, name: &str) -> Option<&DocumentObject> {
            self.objects.iter().find(|object| object.name == name)
        }

        /// 添加对象。名称冲突时追加三位序号（`path` → `path001`）。
        pub fn add_object(&mut self, name: &str, kind: ObjectKind) -> ObjectId {
            let id = self.next_id();
            let name = self.unique_name(name);
            self.objects.push(DocumentObject {
                id,
                label: name.clone(),
                name,
                placement: Placement::IDENTITY,
                parent: None,
                kind,
                touched: true,
                status: ObjectStatus::Valid,
            });
            id
        }

        pub fn add_feature(&mut self, name: &str, shape: Shape) -> ObjectId {
            self.add_object(name, ObjectKind::Feature { shape })
        }

        pub fn add_reference_frame(&mut self, name: &str, placement: Placement) -> ObjectId {
            let id = self.add_object(name, ObjectKind::ReferenceFrame);
            if let Some(index) = self.index_of(id) {
                self.objects[index].placement = placement;
            }
            id
        }

        pub fn add_sketch(
            &mut self,
            name: &str,
            placement: Placement,
            support: Option<ObjectId>,
        ) -> ObjectId {
            let id = self.add_object(name, ObjectKind::Sketch(Sketch::new(support)));
            if let Some(index) = self.index_of(id) {
                self.objects[index].placement = placement;
            }
            id
        }

        pub fn add_container(&mut self, name: &str, kind: ContainerKind) -> ObjectId {
            self.add_object(
                name,
                ObjectKind::Container(Container {
                    kind,
                    children: Vec::new(),
                }),
            )
        }

        /// 将对象移入容器；若对象已有父容器则先从原容器中移除。
        pub fn add_to_container(
            &mut self,
            container: ObjectId,
            child: ObjectId,
        ) -> Result<(), DocumentError> {
            let container_index = self
                .index_of(container)
                .ok_or(DocumentError::ObjectNotFound(container))?;
            let child_index = self
                .index_of(child)
                .ok_or(DocumentError::ObjectNotFound(child))?;
            if !matches!(self.objects[container_index].kind, ObjectKind::Container(_)) {
                return Err(DocumentError::NotAContainer(
                    self.objects[container_index].name.clone(),
                ));
            }
            if container == child || self.is_ancestor(child, container) {
                return Err(DocumentError::InvalidNesting {
                    container: self.objects[container_index].name.clone(),
                    child: self.objects[child_index].name.clone(),
                });
            }

            if let Some(previous) = self.objects[child_index].parent {
                self.unlink_child(previous, child);
            }
            if let ObjectKind::Container(group) = &mut self.objects[container_index].kind {
                group.children.push(child);
            }
            self.objects[container_index].touched = true;
            self.objects[child_index].parent = Some(container);
            Ok(())
        }

        /// 删除对象，并从其父容器中解除关联。
        pub fn remove_object(&mut self, id: ObjectId) -> Result<DocumentObject, DocumentError> {
            let index = self.index_of(id).ok_or(DocumentError::ObjectNotFound(id))?;
            let removed = self.objects.remove(index);
            if let Some(parent) = removed.parent {
                self.unlink_child(parent, id);
            }
            for object in &mut self.objects {
                if object.parent == Some(id) {
                    object.parent = None;
                }
            }
            Ok(removed)
        }

        pub fn set_placement(
            &mut self,
            id: ObjectId,
            placement: Placement,
        ) -> Result<(), DocumentError> {
            let index = self.index_of(id).ok_or(DocumentError::ObjectNotFound(id))?;
            self.objects[index].placement = placement;
            self.objects[index].touched = true;
            Ok(())
        }

        /// 获取草图的可变引用，同时将其标记为待重算。
        pub fn sketch_mut(&mut self, id: ObjectId) -> Result<&mut Sketch, DocumentError> {
            let index = self.index_of(id).ok_or(DocumentError::ObjectNotFound(id))?;
            let object = &mut self.objects[index];
            object.touched = true;
            match &mut object.kind {
                ObjectKind::Sketch(sketch) => Ok(sketch),
                _ => Err(DocumentError::NotASketch(object.name.clone())),
            }
        }

        pub fn snapshot(&self) -> ObjectSnapshot {
            ObjectSnapshot::from_ids(self.objects.iter().map(|object| object.id))
        }

        /// 传播依赖状态，返回本次执行的对象数量。
        pub fn recompute(&mut self) -> usize {
            self.run_recompute().0
        }

        /// 重算并收集失败对象。失败对象保持待重算状态，下一次重算会再次报告。
        pub fn recompute_collect(&mut self) -> Vec<RecomputeFailure> {
            self.run_recompute().1
        }

        fn run_recompute(&mut self) -> (usize, Vec<RecomputeFailure>) {
            let order = self.dependency_order();
            let mut executed: HashSet<ObjectId> = HashSet::new();
            let mut failures = Vec::new();

            for index in order {
                let dependencies = self.objects[index].dependencies();
                let dirty = self.objects[index].touched
                    || dependencies.iter().any(|dep| executed.contains(dep));
                if !dirty {
                    continue;
                }

                let support = self.objects[index]
                    .as_sketch()
                    .and_then(|sketch| sketch.support)
                    .map(|support| self.object(support).map(|object| object.placement));

                let object = &mut self.objects[index];
                executed.insert(object.id);
                match object.execute(support) {
                    Ok(()) => {
                        object.touched = false;
                        object.status = ObjectStatus::Valid;
                    }
                    Err(message) => {
                        object.touched = true;
                        object.status = ObjectStatus::Invalid(message.clone());
                        failures.push(RecomputeFailure {
                            object: object.id,
                            name: object.name.clone(),
                            message,
                        });
                    }
                }
            }
            (executed.len(), failures)
        }

        /// 依赖优先的执行顺序（深度优先后序），同层保持创建顺序。
        fn dependency_order(&self) -> Vec<usize> {
            fn visit(
                doc: &Document,
                index: usize,
                visited: &mut HashSet<usize>,
                order: &mut Vec<usize>,
            ) {
                if !visited.insert(index) {
                    return;
                }
                for dependency in doc.objects[index].dependencies() {
                    if let Some(dep_index) = doc.index_of(dependency) {
                        visit(doc, dep_index, visited, order);
                    }
                }
                order.push(index);
            }

            let mut visited = HashSet::new();
            let mut order = Vec::with_capacity(self.objects.len());
            for index in 0..self.objects.len() {
                visit(self, index, &mut visited, &mut order);
            }
            order
        }

        fn is_ancestor(&self, candidate: ObjectId, of: ObjectId) -> bool {
            let mut current = self.object(of).and_then(|object| object.parent);
            while let Some(parent) = current {
                if parent == candidate {
                    return true;
                }
                current = self.object(parent).and_then(|object| object.parent);
            }
            false
        }

        fn unlink_child(&mut self, container: ObjectId, child: ObjectId) {
            if let Some(index) = self.index_of(container) {
                if let ObjectKind::Container(group) = &mut self.objects[index].kind {
                    group.children.retain(|id| *id != child);
                    self.objects[index].touched = true;
                }
            }
        }

        fn unique_name(&self, base: &str) -> String {
            let base = if base.is_empty() { "Unnamed" } else { base };
            if self.object_by_name(base).is_none() {
                return base.to_string();
            }
            (1u32..)
                .map(|n| format!("{base}{n:03}"))
                .find(|candidate| self.object_by_name(candidate).is_none())
                .unwrap_or_else(|| base.to_string())
        }

        fn index_of(&self, id: ObjectId) -> Option<usize> {
            // 对象按 ID 递增保存。
            self.objects
                .binary_search_by_key(&id, |object| object.id)
                .ok()
        }

        fn next_id(&mut self) -> ObjectId {
            let id = self.next_object_id;
            self.next_object_id += 1;
            ObjectId(id)
        }
    }

}
