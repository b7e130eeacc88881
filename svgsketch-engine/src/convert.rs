//! 曲线图元到草图几何的转换。

use glam::DVec3;
use svgsketch_core::curve::{BSplineCurve, CircleCurve, CurveError, LineSegment};
use svgsketch_core::document::SketchEntry;
use svgsketch_core::geometry::{Placement, Point3};
use svgsketch_core::shape::Shape;
use svgsketch_io::VectorDocument;
use thiserror::Error;
use tracing::debug;

use crate::classify::{CurvePrimitive, classify};
use crate::run_log::RunLog;

pub const DEFAULT_DISCRETIZE_SEGMENTS: usize = 20;

/// 样条的转换方式，取决于目标草图能否承载原始样条。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplineStrategy {
    /// 变换控制点，其余参数原样保留。
    #[default]
    Reconstruct,
    /// 按参数均匀采样 `segments + 1` 个点并以直线连接。
    Discretize { segments: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConversionOptions {
    pub spline_strategy: SplineStrategy,
    /// 是否让圆的法向随位姿旋转。
    pub rotate_circle_axis: bool,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConversionError {
    #[error("unsupported curve type {type_name}")]
    Unsupported { type_name: &'static str },
    #[error("invalid spline: {0}")]
    InvalidSpline(#[from] CurveError),
}

/// 单个对象的转换结果。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConvertedShape {
    pub entries: Vec<SketchEntry>,
    /// 成功转换的源边数量。
    pub edge_count: usize,
}

/// 坐标转换：先加上翻转偏移 `(0, H, 0)`，再施加位姿。
#[derive(Debug, Clone)]
pub struct GeometryConverter {
    offset: DVec3,
    placement: Placement,
    options: ConversionOptions,
}

impl GeometryConverter {
    pub fn new(drawing: &VectorDocument, placement: Placement, options: ConversionOptions) -> Self {
        Self {
            offset: DVec3::new(0.0, drawing.height, 0.0),
            placement,
            options,
        }
    }

    #[inline]
    pub fn offset(&self) -> DVec3 {
        self.offset
    }

    #[inline]
    pub fn map_point(&self, point: Point3) -> Point3 {
        self.placement.transform_point(Point3(point.0 + self.offset))
    }

    pub fn convert(&self, primitive: &CurvePrimitive) -> Result<Vec<SketchEntry>, ConversionError> {
        match primitive {
            CurvePrimitive::Line { p0, p1 } => Ok(vec![SketchEntry::LineSegment(
                LineSegment::new(self.map_point(*p0), self.map_point(*p1)),
            )]),
            CurvePrimitive::Circle {
                center,
                axis,
                radius,
            } => {
                let axis = if self.options.rotate_circle_axis {
                    self.placement.transform_vector(*axis)
                } else {
                    *axis
                };
                Ok(vec![SketchEntry::Circle(CircleCurve::new(
                    self.map_point(*center),
                    axis,
                    *radius,
                ))])
            }
            CurvePrimitive::BSpline {
                poles,
                multiplicities,
                knots,
                periodic,
                degree,
                weights,
            } => {
                let spline = BSplineCurve::new(
                    poles.clone(),
                    weights.clone(),
                    knots.clone(),
                    multiplicities.clone(),
                    *degree,
                    *periodic,
                )?;
                match self.options.spline_strategy {
                    SplineStrategy::Reconstruct => Ok(vec![SketchEntry::BSpline(
                        spline.map_poles(|pole| self.map_point(pole)),
                    )]),
                    SplineStrategy::Discretize { segments } => {
                        let points: Vec<Point3> = spline
                            .sample(segments)
                            .into_iter()
                            .map(|point| self.map_point(point))
                            .collect();
                        Ok(points
                            .windows(2)
                            .map(|pair| {
                                SketchEntry::LineSegment(LineSegment::new(pair[0], pair[1]))
                            })
                            .collect())
                    }
                }
            }
            CurvePrimitive::Unsupported { type_name } => {
                Err(ConversionError::Unsupported {
                    type_name: *type_name,
                })
            }
        }
    }

    /// 转换一个形状的全部边。无法转换的边记录后跳过，不计入边数。
    pub fn convert_shape(&self, shape: &Shape, log: &mut RunLog) -> ConvertedShape {
        let mut converted = ConvertedShape::default();
        for (index, edge) in shape.edges().enumerate() {
            let primitive = classify(edge);
            match self.convert(&primitive) {
                Ok(entries) => {
                    converted.entries.extend(entries);
                    converted.edge_count += 1;
                }
                Err(err) => {
                    debug!(edge = index, error = %err, "跳过边");
                    log.status(format!("  Skipping edge {index}: {err}"));
                }
            }
        }
        converted
    }
}

#[cfg(test)]
mod tests {
    use glam::DQuat;
    use svgsketch_core::curve::{Curve, EllipseCurve};
    use svgsketch_core::geometry::Vector3;
    use svgsketch_io::Unit;

    use super::*;
    use crate::pose::Pose;

    fn drawing(height: f64) -> VectorDocument {
        VectorDocument {
            width: 100.0,
            height,
            unit: Unit::Millimeter,
            view_box: None,
        }
    }

    fn converter(options: ConversionOptions) -> GeometryConverter {
        GeometryConverter::new(&drawing(50.0), Placement::IDENTITY, options)
    }

    fn sample_spline() -> BSplineCurve {
        BSplineCurve::new(
            vec![
                Point3::new(0.0, -40.0, 0.0),
                Point3::new(10.0, -20.0, 0.0),
                Point3::new(20.0, -45.0, 0.0),
                Point3::new(30.0, -10.0, 0.0),
                Point3::new(40.0, -30.0, 0.0),
            ],
            None,
            vec![0.0, 1.0, 2.0],
            vec![4, 1, 4],
            3,
            false,
        )
        .expect("spline")
    }

    #[test]
    fn offset_is_applied_with_identity_pose() {
        let converter = converter(ConversionOptions::default());
        let mapped = converter.map_point(Point3::new(3.0, -7.0, 2.0));
        assert_eq!(mapped, Point3::new(3.0, 43.0, 2.0));
    }

    #[test]
    fn pose_is_applied_after_offset() {
        let placement = Placement::new(
            DVec3::new(100.0, 0.0, 0.0),
            DQuat::from_rotation_z(std::f64::consts::FRAC_PI_2),
        );
        let converter =
            GeometryConverter::new(&drawing(10.0), placement, ConversionOptions::default());
        let mapped = converter.map_point(Point3::new(1.0, -10.0, 0.0));
        assert!(mapped.distance(Point3::new(100.0, 1.0, 0.0)) < 1e-12);
    }

    #[test]
    fn circle_axis_rotation_is_optional() {
        let placement =
            Placement::new(DVec3::ZERO, DQuat::from_rotation_x(std::f64::consts::FRAC_PI_2));
        let circle = CurvePrimitive::Circle {
            center: Point3::ORIGIN,
            axis: Vector3::Z,
            radius: 3.0,
        };

        let kept = GeometryConverter::new(&drawing(0.0), placement, ConversionOptions::default())
            .convert(&circle)
            .expect("circle");
        match &kept[0] {
            SketchEntry::Circle(c) => {
                assert_eq!(c.axis, Vector3::Z);
                assert_eq!(c.radius, 3.0);
            }
            other => panic!("unexpected entry {other:?}"),
        }

        let rotated = GeometryConverter::new(
            &drawing(0.0),
            placement,
            ConversionOptions {
                rotate_circle_axis: true,
                ..ConversionOptions::default()
            },
        )
        .convert(&circle)
        .expect("circle");
        match &rotated[0] {
            SketchEntry::Circle(c) => assert!((c.axis.y() + 1.0).abs() < 1e-12),
            other => panic!("unexpected entry {other:?}"),
        }
    }

    #[test]
    fn reconstructed_spline_matches_original_samples() {
        let spline = sample_spline();
        let converter = converter(ConversionOptions::default());
        let primitive = classify(&Curve::BSpline(spline.clone()).into());
        let entries = converter.convert(&primitive).expect("convert");
        assert_eq!(entries.len(), 1);
        let rebuilt = match &entries[0] {
            SketchEntry::BSpline(rebuilt) => rebuilt,
            other => panic!("unexpected entry {other:?}"),
        };
        assert_eq!(rebuilt.knots, spline.knots);
        assert_eq!(rebuilt.multiplicities, spline.multiplicities);

        for (original, rebuilt) in spline.sample(32).into_iter().zip(rebuilt.sample(32)) {
            assert!(converter.map_point(original).distance(rebuilt) < 1e-6);
        }
    }

    #[test]
    fn reconstructed_rational_arc_follows_the_pose() {
        let placement = Pose::parse("1,2,3", "0.2,0.3,0.4,0.8")
            .expect("pose")
            .placement();
        let converter =
            GeometryConverter::new(&drawing(50.0), placement, ConversionOptions::default());
        let arc = BSplineCurve::conic_arc(
            Point3::new(10.0, -20.0, 0.0),
            Vector3::new(6.0, 0.0, 0.0),
            Vector3::new(0.0, 4.0, 0.0),
            0.3,
            4.0,
        )
        .expect("arc");
        assert!(arc.is_rational());

        let primitive = classify(&Curve::BSpline(arc.clone()).into());
        let entries = converter.convert(&primitive).expect("convert");
        let rebuilt = match &entries[0] {
            SketchEntry::BSpline(rebuilt) => rebuilt,
            other => panic!("unexpected entry {other:?}"),
        };
        assert_eq!(rebuilt.weights, arc.weights);

        for (original, rebuilt) in arc.sample(48).into_iter().zip(rebuilt.sample(48)) {
            assert!(converter.map_point(original).distance(rebuilt) < 1e-6);
        }
    }

    #[test]
    fn discretized_spline_emits_chained_segments() {
        let converter = converter(ConversionOptions {
            spline_strategy: SplineStrategy::Discretize {
                segments: DEFAULT_DISCRETIZE_SEGMENTS,
            },
            rotate_circle_axis: false,
        });
        let spline = sample_spline();
        let primitive = classify(&Curve::BSpline(spline.clone()).into());
        let entries = converter.convert(&primitive).expect("convert");
        assert_eq!(entries.len(), DEFAULT_DISCRETIZE_SEGMENTS);

        let lines: Vec<&LineSegment> = entries
            .iter()
            .map(|entry| match entry {
                SketchEntry::LineSegment(line) => line,
                other => panic!("unexpected entry {other:?}"),
            })
            .collect();
        for pair in lines.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert!(lines[0].start.distance(converter.map_point(spline.start_point())) < 1e-9);
        assert!(
            lines[lines.len() - 1]
                .end
                .distance(converter.map_point(spline.end_point()))
                < 1e-9
        );
    }

    #[test]
    fn entry_count_excludes_unsupported_edges() {
        let mut shape = Shape::default();
        shape.push(Curve::Line(LineSegment::new(
            Point3::ORIGIN,
            Point3::new(1.0, 0.0, 0.0),
        )));
        shape.push(Curve::Ellipse(EllipseCurve {
            center: Point3::ORIGIN,
            axis: Vector3::Z,
            major_direction: Vector3::new(1.0, 0.0, 0.0),
            major_radius: 2.0,
            minor_radius: 1.0,
        }));
        shape.push(Curve::Circle(CircleCurve::new(Point3::ORIGIN, Vector3::Z, 1.0)));
        shape.push(Curve::BSpline(sample_spline()));

        let mut log = RunLog::in_memory();
        let converted = converter(ConversionOptions::default()).convert_shape(&shape, &mut log);
        assert_eq!(converted.edge_count, 3);
        assert_eq!(converted.entries.len(), shape.edges.len() - 1);
        assert!(log.contains("Ellipse"));
    }
}
