//! 导入边到曲线图元的分类。

use svgsketch_core::curve::Curve;
use svgsketch_core::geometry::{Point3, Vector3};
use svgsketch_core::shape::Edge;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum CurvePrimitive {
    Line {
        p0: Point3,
        p1: Point3,
    },
    Circle {
        center: Point3,
        axis: Vector3,
        radius: f64,
    },
    BSpline {
        poles: Vec<Point3>,
        multiplicities: Vec<u32>,
        knots: Vec<f64>,
        periodic: bool,
        degree: u32,
        /// 仅在有理曲线上存在。
        weights: Option<Vec<f64>>,
    },
    Unsupported {
        type_name: &'static str,
    },
}

impl CurvePrimitive {
    pub fn is_supported(&self) -> bool {
        !matches!(self, CurvePrimitive::Unsupported { .. })
    }
}

/// 分类总是成功；无法转换的曲线类型成为 [`CurvePrimitive::Unsupported`]。
pub fn classify(edge: &Edge) -> CurvePrimitive {
    match &edge.curve {
        Curve::Line(line) => CurvePrimitive::Line {
            p0: line.start,
            p1: line.end,
        },
        Curve::Circle(circle) => CurvePrimitive::Circle {
            center: circle.center,
            axis: circle.axis,
            radius: circle.radius,
        },
        Curve::BSpline(spline) => CurvePrimitive::BSpline {
            poles: spline.poles.clone(),
            multiplicities: spline.multiplicities.clone(),
            knots: spline.knots.clone(),
            periodic: spline.periodic,
            degree: spline.degree,
            weights: if spline.is_rational() {
                spline.weights.clone()
            } else {
                None
            },
        },
        Curve::Ellipse(_) => {
            let type_name = edge.curve.type_name();
            debug!(curve = type_name, "不支持的曲线类型");
            CurvePrimitive::Unsupported { type_name }
        }
    }
}

#[cfg(test)]
mod tests {
    use svgsketch_core::curve::{BSplineCurve, CircleCurve, EllipseCurve, LineSegment};

    use super::*;

    #[test]
    fn lines_and_circles_keep_their_parameters() {
        let line = Edge::new(Curve::Line(LineSegment::new(
            Point3::ORIGIN,
            Point3::new(3.0, 4.0, 0.0),
        )));
        assert_eq!(
            classify(&line),
            CurvePrimitive::Line {
                p0: Point3::ORIGIN,
                p1: Point3::new(3.0, 4.0, 0.0),
            }
        );

        let circle = Edge::new(Curve::Circle(CircleCurve::new(
            Point3::new(1.0, 1.0, 0.0),
            Vector3::Z,
            2.5,
        )));
        assert!(matches!(
            classify(&circle),
            CurvePrimitive::Circle { radius, .. } if radius == 2.5
        ));
    }

    #[test]
    fn polynomial_spline_drops_unit_weights() {
        let bezier = BSplineCurve::bezier(vec![
            Point3::ORIGIN,
            Point3::new(1.0, 2.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
        ])
        .expect("bezier");
        let mut with_unit_weights = bezier.clone();
        with_unit_weights.weights = Some(vec![1.0; 3]);

        match classify(&Edge::new(Curve::BSpline(with_unit_weights))) {
            CurvePrimitive::BSpline {
                weights,
                degree,
                multiplicities,
                ..
            } => {
                assert_eq!(weights, None);
                assert_eq!(degree, 2);
                assert_eq!(multiplicities, vec![3, 3]);
            }
            other => panic!("expected spline, got {other:?}"),
        }
    }

    #[test]
    fn rational_spline_keeps_weights() {
        let arc = BSplineCurve::conic_arc(
            Point3::ORIGIN,
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            0.0,
            std::f64::consts::FRAC_PI_2,
        )
        .expect("arc");
        match classify(&Edge::new(Curve::BSpline(arc))) {
            CurvePrimitive::BSpline { weights, .. } => {
                assert_eq!(weights.map(|w| w.len()), Some(3));
            }
            other => panic!("expected spline, got {other:?}"),
        }
    }

    #[test]
    fn ellipse_is_unsupported() {
        let ellipse = Edge::new(Curve::Ellipse(EllipseCurve {
            center: Point3::ORIGIN,
            axis: Vector3::Z,
            major_direction: Vector3::new(1.0, 0.0, 0.0),
            major_radius: 4.0,
            minor_radius: 2.0,
        }));
        let primitive = classify(&ellipse);
        assert_eq!(
            primitive,
            CurvePrimitive::Unsupported {
                type_name: "Ellipse"
            }
        );
        assert!(!primitive.is_supported());
    }
}
