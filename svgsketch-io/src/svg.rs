//! SVG 读取：图纸尺寸解析，以及把图形元素导入为宿主文档中的特征对象。

use std::collections::HashMap;
use std::f64::consts::{FRAC_PI_2, PI, TAU};
use std::fs;
use std::path::Path;
use std::str::FromStr;

use glam::{DAffine2, DMat2, DVec2};
use quick_xml::Reader;
use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesStart, Event};
use serde::{Deserialize, Serialize};
use svgtypes::{Length, LengthUnit, PathParser, PathSegment, PointsParser, Transform};
use svgsketch_core::curve::{BSplineCurve, CircleCurve, Curve, EllipseCurve, LineSegment};
use svgsketch_core::document::{Document, ObjectId};
use svgsketch_core::geometry::{Point3, Vector3};
use svgsketch_core::shape::Shape;
use tracing::{debug, info, warn};

use crate::IoError;

const GEOMETRY_TOLERANCE: f64 = 1e-9;

/// 不参与渲染的子树，其中的图形不会被导入。
const NON_RENDERED: &[&str] = &[
    "defs",
    "clipPath",
    "mask",
    "marker",
    "pattern",
    "symbol",
    "metadata",
    "title",
    "desc",
    "style",
    "script",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    Millimeter,
    Centimeter,
    Inch,
    Unitless,
}

impl Unit {
    /// 换算到毫米的倍数。
    #[inline]
    pub fn factor(self) -> f64 {
        match self {
            Unit::Millimeter | Unit::Unitless => 1.0,
            Unit::Centimeter => 10.0,
            Unit::Inch => 25.4,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Unit::Millimeter => "mm",
            Unit::Centimeter => "cm",
            Unit::Inch => "in",
            Unit::Unitless => "",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewBox {
    pub min_x: f64,
    pub min_y: f64,
    pub width: f64,
    pub height: f64,
}

/// 图纸声明的物理尺寸（已换算为毫米）。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VectorDocument {
    pub width: f64,
    pub height: f64,
    /// `height` 属性声明的单位。
    pub unit: Unit,
    pub view_box: Option<ViewBox>,
}

impl VectorDocument {
    /// 读取根 `<svg>` 元素的 `width`/`height`/`viewBox`。
    pub fn from_svg_str(source: &str) -> Result<Self, IoError> {
        let root = read_root(source)?;
        let width_raw = root
            .attr("width")
            .ok_or(IoError::MissingDimension { attribute: "width" })?;
        let height_raw = root
            .attr("height")
            .ok_or(IoError::MissingDimension { attribute: "height" })?;

        let (width, _) = parse_length(width_raw).ok_or_else(|| IoError::InvalidDimension {
            attribute: "width",
            raw: width_raw.to_string(),
        })?;
        let (height, unit) = parse_length(height_raw).ok_or_else(|| IoError::InvalidDimension {
            attribute: "height",
            raw: height_raw.to_string(),
        })?;

        let view_box = match root.attr("viewBox") {
            Some(raw) => Some(parse_view_box(raw).ok_or_else(|| IoError::InvalidDimension {
                attribute: "viewBox",
                raw: raw.to_string(),
            })?),
            None => None,
        };

        Ok(Self {
            width,
            height,
            unit,
            view_box,
        })
    }

    /// 用户坐标到宿主坐标（毫米，Y 轴向上）的映射。
    ///
    /// 有 `viewBox` 时按其缩放到声明尺寸；否则一个用户单位等于一个声明单位。
    pub fn user_to_host(&self) -> DAffine2 {
        match self.view_box {
            Some(view_box) => {
                let scale = DVec2::new(
                    self.width / view_box.width,
                    self.height / view_box.height,
                );
                DAffine2::from_scale(DVec2::new(scale.x, -scale.y))
                    * DAffine2::from_translation(DVec2::new(-view_box.min_x, -view_box.min_y))
            }
            None => {
                let factor = self.unit.factor();
                DAffine2::from_scale(DVec2::new(factor, -factor))
            }
        }
    }
}

/// 读取文件并解析图纸尺寸。
pub fn parse_vector_document(path: &Path) -> Result<VectorDocument, IoError> {
    let source = fs::read_to_string(path).map_err(|source| IoError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    VectorDocument::from_svg_str(&source)
}

/// 数值加可选单位后缀；单位不在换算表中、数值非有限或不为正时返回 `None`。
pub fn parse_length(raw: &str) -> Option<(f64, Unit)> {
    let length = Length::from_str(raw.trim()).ok()?;
    let unit = match length.unit {
        LengthUnit::Mm => Unit::Millimeter,
        LengthUnit::Cm => Unit::Centimeter,
        LengthUnit::In => Unit::Inch,
        LengthUnit::None => Unit::Unitless,
        _ => return None,
    };
    if !length.number.is_finite() || length.number <= 0.0 {
        return None;
    }
    Some((length.number * unit.factor(), unit))
}

fn parse_view_box(raw: &str) -> Option<ViewBox> {
    let view_box = svgtypes::ViewBox::from_str(raw.trim()).ok()?;
    Some(ViewBox {
        min_x: view_box.x,
        min_y: view_box.y,
        width: view_box.w,
        height: view_box.h,
    })
}

/// 导入调用的结果。`NotReported` 表示导入已执行但未告知创建了哪些对象，
/// 与 `Created(vec![])`（明确报告零个对象）不同。
#[derive(Debug, Clone, PartialEq)]
pub enum ImportReport {
    Created(Vec<ObjectId>),
    NotReported,
}

/// 宿主的矢量导入调用。
pub trait VectorImporter {
    fn insert(&self, path: &Path, document: &mut Document) -> Result<ImportReport, IoError>;
}

/// 从 SVG 元素得到的一个导入对象。
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedShape {
    pub name: String,
    pub shape: Shape,
}

/// SVG 导入器：每个图形元素生成一个特征对象。
pub struct SvgImporter {
    report_created: bool,
}

impl SvgImporter {
    pub fn new() -> Self {
        Self {
            report_created: true,
        }
    }

    /// `report_created = false` 时导入结果为 [`ImportReport::NotReported`]。
    pub fn with_reporting(report_created: bool) -> Self {
        Self { report_created }
    }
}

impl Default for SvgImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl VectorImporter for SvgImporter {
    fn insert(&self, path: &Path, document: &mut Document) -> Result<ImportReport, IoError> {
        let source = fs::read_to_string(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let mapping = match VectorDocument::from_svg_str(&source) {
            Ok(drawing) => drawing.user_to_host(),
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "图纸尺寸不可用，按 1 用户单位 = 1 mm 导入"
                );
                DAffine2::from_scale(DVec2::new(1.0, -1.0))
            }
        };

        let shapes = read_shapes(&source, mapping)?;
        let created: Vec<ObjectId> = shapes
            .into_iter()
            .map(|imported| document.add_feature(&imported.name, imported.shape))
            .collect();
        info!(path = %path.display(), count = created.len(), "SVG 导入完成");

        if self.report_created {
            Ok(ImportReport::Created(created))
        } else {
            Ok(ImportReport::NotReported)
        }
    }
}

struct Element {
    tag: String,
    attributes: HashMap<String, String>,
}

impl Element {
    /// 属性值按 XML 规则解码（`&amp;`、`&#10;` 等）。
    fn from_start(start: &BytesStart<'_>, decoder: Decoder) -> Result<Self, IoError> {
        let tag = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attributes = HashMap::new();
        for attr in start.attributes().flatten() {
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr.decode_and_unescape_value(decoder).map_err(|err| {
                IoError::InvalidMarkup(format!("<{tag}> attribute `{key}`: {err}"))
            })?;
            attributes.insert(key, value.into_owned());
        }
        Ok(Self { tag, attributes })
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// 坐标属性，缺省为 0；允许 `px` 后缀。
    fn coordinate(&self, name: &str) -> Result<f64, String> {
        match self.attr(name) {
            None => Ok(0.0),
            Some(raw) => parse_coordinate(raw)
                .ok_or_else(|| format!("attribute `{name}` has invalid value \"{raw}\"")),
        }
    }

    fn display_name(&self) -> String {
        self.attr("id")
            .filter(|id| !id.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.tag.clone())
    }
}

fn parse_coordinate(raw: &str) -> Option<f64> {
    let length = Length::from_str(raw.trim()).ok()?;
    match length.unit {
        LengthUnit::None | LengthUnit::Px if length.number.is_finite() => Some(length.number),
        _ => None,
    }
}

fn read_root(source: &str) -> Result<Element, IoError> {
    let mut reader = Reader::from_str(source);
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let element = Element::from_start(e, reader.decoder())?;
                if element.tag != "svg" {
                    return Err(IoError::InvalidMarkup(format!(
                        "root element is <{}>, expected <svg>",
                        element.tag
                    )));
                }
                return Ok(element);
            }
            Ok(Event::Eof) => {
                return Err(IoError::InvalidMarkup("no <svg> element found".to_string()));
            }
            Err(err) => return Err(IoError::InvalidMarkup(err.to_string())),
            _ => {}
        }
    }
}

/// 遍历 SVG，按文档顺序收集图形元素。`mapping` 为根坐标映射。
pub fn read_shapes(source: &str, mapping: DAffine2) -> Result<Vec<ImportedShape>, IoError> {
    let mut reader = Reader::from_str(source);
    let mut transforms: Vec<DAffine2> = vec![mapping];
    let mut skip_depth = 0usize;
    let mut shapes = Vec::new();

    loop {
        let (start, is_empty) = match reader.read_event() {
            Ok(Event::Start(e)) => (e, false),
            Ok(Event::Empty(e)) => (e, true),
            Ok(Event::End(_)) => {
                if skip_depth > 0 {
                    skip_depth -= 1;
                } else if transforms.len() > 1 {
                    transforms.pop();
                }
                continue;
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(IoError::InvalidMarkup(err.to_string())),
            _ => continue,
        };

        if skip_depth > 0 {
            if !is_empty {
                skip_depth += 1;
            }
            continue;
        }

        let element = Element::from_start(&start, reader.decoder())?;
        if NON_RENDERED.contains(&element.tag.as_str()) {
            if !is_empty {
                skip_depth = 1;
            }
            continue;
        }

        let parent = transforms.last().copied().unwrap_or(mapping);
        let local = match element.attr("transform") {
            // 根元素上的 transform 不参与映射。
            Some(raw) if transforms.len() > 1 || element.tag != "svg" => {
                parse_transform(raw).map_err(|err| {
                    IoError::InvalidMarkup(format!(
                        "<{}> has invalid transform \"{raw}\": {err}",
                        element.tag
                    ))
                })?
            }
            _ => DAffine2::IDENTITY,
        };
        let transform = parent * local;

        match shape_edges(&element, &transform) {
            Ok(Some(shape)) if !shape.is_empty() => shapes.push(ImportedShape {
                name: element.display_name(),
                shape,
            }),
            Ok(Some(_)) => debug!(tag = %element.tag, "元素未产生任何边，已跳过"),
            Ok(None) => {}
            Err(message) => warn!(tag = %element.tag, %message, "跳过无法解析的元素"),
        }

        if !is_empty {
            transforms.push(transform);
        }
    }

    Ok(shapes)
}

/// 图形元素转为宿主形状；容器与非图形元素返回 `None`。
fn shape_edges(element: &Element, transform: &DAffine2) -> Result<Option<Shape>, String> {
    let mut builder = EdgeBuilder::new(*transform);
    match element.tag.as_str() {
        "line" => {
            let from = DVec2::new(element.coordinate("x1")?, element.coordinate("y1")?);
            let to = DVec2::new(element.coordinate("x2")?, element.coordinate("y2")?);
            builder.line(from, to);
        }
        "rect" => rect_edges(element, &mut builder)?,
        "circle" => {
            let center = DVec2::new(element.coordinate("cx")?, element.coordinate("cy")?);
            let radius = element.coordinate("r")?;
            builder.ellipse(center, radius, radius);
        }
        "ellipse" => {
            let center = DVec2::new(element.coordinate("cx")?, element.coordinate("cy")?);
            builder.ellipse(center, element.coordinate("rx")?, element.coordinate("ry")?);
        }
        "polyline" | "polygon" => {
            let raw = element.attr("points").unwrap_or("");
            let points: Vec<DVec2> = PointsParser::from(raw)
                .map(|(x, y)| DVec2::new(x, y))
                .collect();
            for pair in points.windows(2) {
                builder.line(pair[0], pair[1]);
            }
            if element.tag == "polygon" && points.len() > 2 {
                builder.line(points[points.len() - 1], points[0]);
            }
        }
        "path" => {
            let data = element.attr("d").unwrap_or("");
            let (segments, error) = path_segments(data);
            if let Some(error) = error {
                warn!(name = %element.display_name(), %error, "路径数据有误，保留出错前的部分");
            }
            for segment in segments {
                builder.segment(segment);
            }
        }
        "text" | "image" | "use" => {
            debug!(tag = %element.tag, "不支持的元素类型，已跳过");
            return Ok(None);
        }
        _ => return Ok(None),
    }
    Ok(Some(builder.finish()))
}

fn rect_edges(element: &Element, builder: &mut EdgeBuilder) -> Result<(), String> {
    let x = element.coordinate("x")?;
    let y = element.coordinate("y")?;
    let w = element.coordinate("width")?;
    let h = element.coordinate("height")?;
    if w <= 0.0 || h <= 0.0 {
        return Ok(());
    }

    let rx_attr = element.attr("rx").and_then(parse_coordinate);
    let ry_attr = element.attr("ry").and_then(parse_coordinate);
    let (rx, ry) = match (rx_attr, ry_attr) {
        (Some(rx), Some(ry)) => (rx, ry),
        (Some(r), None) | (None, Some(r)) => (r, r),
        (None, None) => (0.0, 0.0),
    };
    let rx = rx.clamp(0.0, w / 2.0);
    let ry = ry.clamp(0.0, h / 2.0);

    if rx <= 0.0 || ry <= 0.0 {
        let corners = [
            DVec2::new(x, y),
            DVec2::new(x + w, y),
            DVec2::new(x + w, y + h),
            DVec2::new(x, y + h),
        ];
        for i in 0..4 {
            builder.line(corners[i], corners[(i + 1) % 4]);
        }
        return Ok(());
    }

    let radii = DVec2::new(rx, ry);
    builder.line(DVec2::new(x + rx, y), DVec2::new(x + w - rx, y));
    builder.elliptic_arc(DVec2::new(x + w - rx, y + ry), radii, 0.0, -FRAC_PI_2, FRAC_PI_2);
    builder.line(DVec2::new(x + w, y + ry), DVec2::new(x + w, y + h - ry));
    builder.elliptic_arc(DVec2::new(x + w - rx, y + h - ry), radii, 0.0, 0.0, FRAC_PI_2);
    builder.line(DVec2::new(x + w - rx, y + h), DVec2::new(x + rx, y + h));
    builder.elliptic_arc(DVec2::new(x + rx, y + h - ry), radii, 0.0, FRAC_PI_2, FRAC_PI_2);
    builder.line(DVec2::new(x, y + h - ry), DVec2::new(x, y + ry));
    builder.elliptic_arc(DVec2::new(x + rx, y + ry), radii, 0.0, PI, FRAC_PI_2);
    Ok(())
}

/// 在用户坐标系下构造曲线，再统一映射到宿主坐标。
struct EdgeBuilder {
    transform: DAffine2,
    shape: Shape,
}

impl EdgeBuilder {
    fn new(transform: DAffine2) -> Self {
        Self {
            transform,
            shape: Shape::default(),
        }
    }

    fn finish(self) -> Shape {
        self.shape
    }

    fn map(&self, point: DVec2) -> Point3 {
        let mapped = self.transform.transform_point2(point);
        Point3::new(mapped.x, mapped.y, 0.0)
    }

    fn line(&mut self, from: DVec2, to: DVec2) {
        if from.distance(to) <= GEOMETRY_TOLERANCE {
            return;
        }
        let curve = Curve::Line(LineSegment::new(self.map(from), self.map(to)));
        self.shape.push(curve);
    }

    fn bezier(&mut self, points: &[DVec2]) {
        let poles: Vec<Point3> = points.iter().map(|&p| self.map(p)).collect();
        match BSplineCurve::bezier(poles) {
            Ok(spline) => self.shape.push(Curve::BSpline(spline)),
            Err(err) => debug!(error = %err, "跳过退化的 Bézier 段"),
        }
    }

    /// 完整的圆或椭圆；仿射变换不保持圆时得到椭圆。
    fn ellipse(&mut self, center: DVec2, rx: f64, ry: f64) {
        if !(rx > 0.0 && ry > 0.0) {
            return;
        }
        let linear = self.transform.matrix2 * DMat2::from_diagonal(DVec2::new(rx, ry));
        let (major, minor, direction) = principal_axes(linear);
        let center = self.map(center);
        if (major - minor).abs() <= GEOMETRY_TOLERANCE * major.max(1.0) {
            self.shape
                .push(Curve::Circle(CircleCurve::new(center, Vector3::Z, major)));
        } else {
            self.shape.push(Curve::Ellipse(EllipseCurve {
                center,
                axis: Vector3::Z,
                major_direction: Vector3::new(direction.x, direction.y, 0.0),
                major_radius: major,
                minor_radius: minor,
            }));
        }
    }

    /// 参数形式 `C + U·cosθ + V·sinθ` 的椭圆弧，其中 U、V 由半径与旋转角确定。
    fn elliptic_arc(&mut self, center: DVec2, radii: DVec2, rotation: f64, start: f64, sweep: f64) {
        let (sin, cos) = rotation.sin_cos();
        let u = DVec2::new(cos, sin) * radii.x;
        let v = DVec2::new(-sin, cos) * radii.y;
        let arc = BSplineCurve::conic_arc(
            Point3::new(center.x, center.y, 0.0),
            Vector3::new(u.x, u.y, 0.0),
            Vector3::new(v.x, v.y, 0.0),
            start,
            sweep,
        );
        match arc {
            Ok(spline) => {
                let mapped = spline.map_poles(|pole| self.map(DVec2::new(pole.x(), pole.y())));
                self.shape.push(Curve::BSpline(mapped));
            }
            Err(err) => debug!(error = %err, "跳过退化的圆弧"),
        }
    }

    fn segment(&mut self, segment: Segment) {
        match segment {
            Segment::Line { from, to } => self.line(from, to),
            Segment::Quadratic { from, control, to } => {
                let span = from.distance(control) + control.distance(to);
                if span > GEOMETRY_TOLERANCE {
                    self.bezier(&[from, control, to]);
                }
            }
            Segment::Cubic {
                from,
                control1,
                control2,
                to,
            } => {
                let span =
                    from.distance(control1) + control1.distance(control2) + control2.distance(to);
                if span > GEOMETRY_TOLERANCE {
                    self.bezier(&[from, control1, control2, to]);
                }
            }
            Segment::Arc {
                from,
                radii,
                x_axis_rotation,
                large_arc,
                sweep,
                to,
            } => self.endpoint_arc(from, radii, x_axis_rotation, large_arc, sweep, to),
        }
    }

    /// 端点参数化的弧转换为中心参数化。
    fn endpoint_arc(
        &mut self,
        from: DVec2,
        radii: DVec2,
        x_axis_rotation: f64,
        large_arc: bool,
        sweep: bool,
        to: DVec2,
    ) {
        if from.distance(to) <= GEOMETRY_TOLERANCE {
            return;
        }
        let mut rx = radii.x.abs();
        let mut ry = radii.y.abs();
        if rx <= GEOMETRY_TOLERANCE || ry <= GEOMETRY_TOLERANCE {
            self.line(from, to);
            return;
        }

        let phi = x_axis_rotation.to_radians();
        let (sin, cos) = phi.sin_cos();
        let half = (from - to) / 2.0;
        let p = DVec2::new(cos * half.x + sin * half.y, -sin * half.x + cos * half.y);

        let lambda = (p.x * p.x) / (rx * rx) + (p.y * p.y) / (ry * ry);
        if lambda > 1.0 {
            let scale = lambda.sqrt();
            rx *= scale;
            ry *= scale;
        }

        let numerator = rx * rx * ry * ry - rx * rx * p.y * p.y - ry * ry * p.x * p.x;
        let denominator = rx * rx * p.y * p.y + ry * ry * p.x * p.x;
        let sign = if large_arc == sweep { -1.0 } else { 1.0 };
        let coefficient = sign * (numerator / denominator).max(0.0).sqrt();
        let center_prime = DVec2::new(coefficient * rx * p.y / ry, -coefficient * ry * p.x / rx);
        let mid = (from + to) / 2.0;
        let center = DVec2::new(
            cos * center_prime.x - sin * center_prime.y + mid.x,
            sin * center_prime.x + cos * center_prime.y + mid.y,
        );

        let start_vector = DVec2::new((p.x - center_prime.x) / rx, (p.y - center_prime.y) / ry);
        let end_vector = DVec2::new((-p.x - center_prime.x) / rx, (-p.y - center_prime.y) / ry);
        let start = DVec2::X.angle_to(start_vector);
        let mut delta = start_vector.angle_to(end_vector);
        if !sweep && delta > 0.0 {
            delta -= TAU;
        } else if sweep && delta < 0.0 {
            delta += TAU;
        }

        self.elliptic_arc(center, DVec2::new(rx, ry), phi, start, delta);
    }
}

/// 线性映射 `m` 作用于单位圆后得到的椭圆：(长半轴, 短半轴, 长轴方向)。
fn principal_axes(m: DMat2) -> (f64, f64, DVec2) {
    let s = m * m.transpose();
    let p = s.x_axis.x;
    let q = s.y_axis.x;
    let r = s.y_axis.y;
    let mean = (p + r) / 2.0;
    let spread = (((p - r) / 2.0).powi(2) + q * q).sqrt();
    let major = (mean + spread).max(0.0).sqrt();
    let minor = (mean - spread).max(0.0).sqrt();
    let angle = 0.5 * (2.0 * q).atan2(p - r);
    (major, minor, DVec2::from_angle(angle))
}

/// 解析 `transform` 属性，按书写顺序从左到右复合。
pub fn parse_transform(raw: &str) -> Result<DAffine2, svgtypes::Error> {
    let Transform { a, b, c, d, e, f } = Transform::from_str(raw)?;
    Ok(DAffine2::from_cols_array(&[a, b, c, d, e, f]))
}

/// 用户坐标系下的绝对路径段。
#[derive(Debug, Clone, Copy, PartialEq)]
enum Segment {
    Line {
        from: DVec2,
        to: DVec2,
    },
    Quadratic {
        from: DVec2,
        control: DVec2,
        to: DVec2,
    },
    Cubic {
        from: DVec2,
        control1: DVec2,
        control2: DVec2,
        to: DVec2,
    },
    Arc {
        from: DVec2,
        radii: DVec2,
        x_axis_rotation: f64,
        large_arc: bool,
        sweep: bool,
        to: DVec2,
    },
}

/// 展开 `d` 属性。出错时保留出错前的路径段并一并返回错误。
fn path_segments(data: &str) -> (Vec<Segment>, Option<svgtypes::Error>) {
    let mut cursor = PathCursor::default();
    for item in PathParser::from(data) {
        match item {
            Ok(segment) => cursor.apply(segment),
            Err(err) => return (cursor.segments, Some(err)),
        }
    }
    (cursor.segments, None)
}

#[derive(Clone, Copy)]
enum Control {
    Cubic(DVec2),
    Quadratic(DVec2),
}

/// 相对坐标、H/V 与平滑曲线的展开状态。
#[derive(Default)]
struct PathCursor {
    current: DVec2,
    subpath_start: DVec2,
    previous: Option<Control>,
    segments: Vec<Segment>,
}

impl PathCursor {
    fn resolve(&self, abs: bool, x: f64, y: f64) -> DVec2 {
        let point = DVec2::new(x, y);
        if abs { point } else { self.current + point }
    }

    fn reflected(&self, previous: Option<Control>, cubic: bool) -> DVec2 {
        match (previous, cubic) {
            (Some(Control::Cubic(control)), true) | (Some(Control::Quadratic(control)), false) => {
                self.current * 2.0 - control
            }
            _ => self.current,
        }
    }

    fn apply(&mut self, segment: PathSegment) {
        let previous = self.previous.take();
        match segment {
            PathSegment::MoveTo { abs, x, y } => {
                self.current = self.resolve(abs, x, y);
                self.subpath_start = self.current;
            }
            PathSegment::LineTo { abs, x, y } => {
                let to = self.resolve(abs, x, y);
                self.line_to(to);
            }
            PathSegment::HorizontalLineTo { abs, x } => {
                let x = if abs { x } else { self.current.x + x };
                self.line_to(DVec2::new(x, self.current.y));
            }
            PathSegment::VerticalLineTo { abs, y } => {
                let y = if abs { y } else { self.current.y + y };
                self.line_to(DVec2::new(self.current.x, y));
            }
            PathSegment::CurveTo {
                abs,
                x1,
                y1,
                x2,
                y2,
                x,
                y,
            } => {
                let control1 = self.resolve(abs, x1, y1);
                let control2 = self.resolve(abs, x2, y2);
                let to = self.resolve(abs, x, y);
                self.cubic_to(control1, control2, to);
            }
            PathSegment::SmoothCurveTo { abs, x2, y2, x, y } => {
                let control1 = self.reflected(previous, true);
                let control2 = self.resolve(abs, x2, y2);
                let to = self.resolve(abs, x, y);
                self.cubic_to(control1, control2, to);
            }
            PathSegment::Quadratic { abs, x1, y1, x, y } => {
                let control = self.resolve(abs, x1, y1);
                let to = self.resolve(abs, x, y);
                self.quadratic_to(control, to);
            }
            PathSegment::SmoothQuadratic { abs, x, y } => {
                let control = self.reflected(previous, false);
                let to = self.resolve(abs, x, y);
                self.quadratic_to(control, to);
            }
            PathSegment::EllipticalArc {
                abs,
                rx,
                ry,
                x_axis_rotation,
                large_arc,
                sweep,
                x,
                y,
            } => {
                let to = self.resolve(abs, x, y);
                self.segments.push(Segment::Arc {
                    from: self.current,
                    radii: DVec2::new(rx, ry),
                    x_axis_rotation,
                    large_arc,
                    sweep,
                    to,
                });
                self.current = to;
            }
            PathSegment::ClosePath { .. } => {
                if self.current != self.subpath_start {
                    self.segments.push(Segment::Line {
                        from: self.current,
                        to: self.subpath_start,
                    });
                }
                self.current = self.subpath_start;
            }
        }
    }

    fn line_to(&mut self, to: DVec2) {
        self.segments.push(Segment::Line {
            from: self.current,
            to,
        });
        self.current = to;
    }

    fn cubic_to(&mut self, control1: DVec2, control2: DVec2, to: DVec2) {
        self.segments.push(Segment::Cubic {
            from: self.current,
            control1,
            control2,
            to,
        });
        self.current = to;
        self.previous = Some(Control::Cubic(control2));
    }

    fn quadratic_to(&mut self, control: DVec2, to: DVec2) {
        self.segments.push(Segment::Quadratic {
            from: self.current,
            control,
            to,
        });
        self.current = to;
        self.previous = Some(Control::Quadratic(control));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapped(affine: DAffine2, x: f64, y: f64) -> DVec2 {
        affine.transform_point2(DVec2::new(x, y))
    }

    #[test]
    fn lengths_are_normalized_to_millimeters() {
        assert_eq!(parse_length("10cm"), Some((100.0, Unit::Centimeter)));
        assert_eq!(parse_length("2in"), Some((50.8, Unit::Inch)));
        assert_eq!(parse_length("42"), Some((42.0, Unit::Unitless)));
        assert_eq!(parse_length(" 7.5mm "), Some((7.5, Unit::Millimeter)));
        assert_eq!(parse_length("abc"), None);
        assert_eq!(parse_length("12pt"), None);
        assert_eq!(parse_length("-3mm"), None);
        assert_eq!(parse_length("mm"), None);
    }

    #[test]
    fn dimensions_require_width_and_height() {
        let err = VectorDocument::from_svg_str(r#"<svg height="10mm"/>"#).unwrap_err();
        assert!(matches!(err, IoError::MissingDimension { attribute: "width" }));

        let err =
            VectorDocument::from_svg_str(r#"<svg width="10mm" height="1x0mm"/>"#).unwrap_err();
        match err {
            IoError::InvalidDimension { attribute, raw } => {
                assert_eq!(attribute, "height");
                assert_eq!(raw, "1x0mm");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn dimensions_and_view_box_are_read_from_root() {
        let doc = VectorDocument::from_svg_str(
            r#"<?xml version="1.0"?>
            <svg xmlns="http://www.w3.org/2000/svg" width="20cm" height="10cm" viewBox="0 0 200 100"></svg>"#,
        )
        .expect("dimensions");
        assert_eq!(doc.width, 200.0);
        assert_eq!(doc.height, 100.0);
        assert_eq!(doc.unit, Unit::Centimeter);
        assert_eq!(
            doc.view_box,
            Some(ViewBox {
                min_x: 0.0,
                min_y: 0.0,
                width: 200.0,
                height: 100.0,
            })
        );
    }

    #[test]
    fn user_to_host_flips_the_vertical_axis() {
        let doc = VectorDocument {
            width: 100.0,
            height: 50.0,
            unit: Unit::Millimeter,
            view_box: Some(ViewBox {
                min_x: 10.0,
                min_y: 0.0,
                width: 200.0,
                height: 100.0,
            }),
        };
        let p = mapped(doc.user_to_host(), 110.0, 100.0);
        assert!((p.x - 50.0).abs() < 1e-12);
        assert!((p.y + 50.0).abs() < 1e-12);

        let plain = VectorDocument {
            view_box: None,
            unit: Unit::Centimeter,
            ..doc
        };
        let p = mapped(plain.user_to_host(), 1.0, 2.0);
        assert!((p.x - 10.0).abs() < 1e-12);
        assert!((p.y + 20.0).abs() < 1e-12);
    }

    #[test]
    fn transforms_compose_left_to_right() {
        let t = parse_transform("translate(10, 0) scale(2)").expect("transform");
        let p = mapped(t, 1.0, 1.0);
        assert!((p - DVec2::new(12.0, 2.0)).length() < 1e-12);

        let r = parse_transform("rotate(90 5 5)").expect("rotate");
        let p = mapped(r, 10.0, 5.0);
        assert!((p - DVec2::new(5.0, 10.0)).length() < 1e-12);

        assert!(parse_transform("wobble(3)").is_err());
        assert!(parse_transform("matrix(1 0 0 1 0)").is_err());
    }

    #[test]
    fn rounded_rect_uses_rational_corner_arcs() {
        let shapes = read_shapes(
            r#"<svg><rect id="r" x="0" y="0" width="10" height="6" rx="2"/></svg>"#,
            DAffine2::IDENTITY,
        )
        .expect("shapes");
        assert_eq!(shapes.len(), 1);
        let edges = &shapes[0].shape.edges;
        assert_eq!(edges.len(), 8);
        let arcs = edges
            .iter()
            .filter(|edge| matches!(&edge.curve, Curve::BSpline(s) if s.is_rational()))
            .count();
        assert_eq!(arcs, 4);
    }

    #[test]
    fn non_uniform_scale_turns_circle_into_ellipse() {
        let shapes = read_shapes(
            r#"<svg><g transform="scale(2 1)"><circle cx="0" cy="0" r="3"/></g><circle r="1"/></svg>"#,
            DAffine2::IDENTITY,
        )
        .expect("shapes");
        assert_eq!(shapes.len(), 2);
        match &shapes[0].shape.edges[0].curve {
            Curve::Ellipse(ellipse) => {
                assert!((ellipse.major_radius - 6.0).abs() < 1e-9);
                assert!((ellipse.minor_radius - 3.0).abs() < 1e-9);
                assert!((ellipse.major_direction.x().abs() - 1.0).abs() < 1e-9);
            }
            other => panic!("expected ellipse, got {other:?}"),
        }
        assert!(matches!(
            &shapes[1].shape.edges[0].curve,
            Curve::Circle(c) if (c.radius - 1.0).abs() < 1e-12
        ));
    }

    #[test]
    fn defs_content_is_not_imported() {
        let shapes = read_shapes(
            r#"<svg><defs><path d="M0 0 L1 1"/><g><line x2="4"/></g></defs><line x2="5"/></svg>"#,
            DAffine2::IDENTITY,
        )
        .expect("shapes");
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].name, "line");
    }

    #[test]
    fn semicircle_arc_passes_through_expected_points() {
        let shapes = read_shapes(
            r#"<svg><path id="arc" d="M0 0 A5 5 0 0 1 10 0"/></svg>"#,
            DAffine2::IDENTITY,
        )
        .expect("shapes");
        let spline = match &shapes[0].shape.edges[0].curve {
            Curve::BSpline(spline) => spline.clone(),
            other => panic!("expected spline, got {other:?}"),
        };
        assert!(spline.start_point().distance(Point3::new(0.0, 0.0, 0.0)) < 1e-9);
        assert!(spline.end_point().distance(Point3::new(10.0, 0.0, 0.0)) < 1e-9);
        for point in spline.sample(16) {
            assert!((point.distance(Point3::new(5.0, 0.0, 0.0)) - 5.0).abs() < 1e-9);
        }
        // SVG 坐标 Y 轴向下，sweep=1 的弧位于 y < 0 一侧。
        assert!(spline.point_at(spline.domain().1 / 2.0).y() < 0.0);
    }

    #[test]
    fn relative_commands_and_close_path() {
        let (segments, error) = path_segments("m10 10 h20 v20 h-20 z");
        assert!(error.is_none());
        assert_eq!(segments.len(), 4);
        assert_eq!(
            segments[3],
            Segment::Line {
                from: DVec2::new(10.0, 30.0),
                to: DVec2::new(10.0, 10.0),
            }
        );
    }

    #[test]
    fn smooth_curves_reflect_previous_control() {
        let (segments, _) = path_segments("M0 0 C0 10 10 10 10 0 S20 -10 20 0 T30 0");
        match segments[1] {
            Segment::Cubic { control1, .. } => assert_eq!(control1, DVec2::new(10.0, -10.0)),
            other => panic!("expected cubic segment, got {other:?}"),
        }
        // T 前面不是二次曲线，控制点退化为当前点。
        match segments[2] {
            Segment::Quadratic { from, control, .. } => assert_eq!(control, from),
            other => panic!("expected quadratic segment, got {other:?}"),
        }
    }

    #[test]
    fn packed_arc_flags_keep_the_arc() {
        let (segments, error) = path_segments("M0 0 a5 5 0 105 5");
        assert!(error.is_none());
        assert_eq!(
            segments,
            vec![Segment::Arc {
                from: DVec2::ZERO,
                radii: DVec2::new(5.0, 5.0),
                x_axis_rotation: 0.0,
                large_arc: true,
                sweep: false,
                to: DVec2::new(5.0, 5.0),
            }]
        );
    }

    #[test]
    fn path_error_keeps_segments_parsed_so_far() {
        let (segments, error) = path_segments("M0 0 L10 0 L10 oops");
        assert_eq!(segments.len(), 1);
        assert!(error.is_some());

        let (segments, error) = path_segments("L10 10");
        assert!(segments.is_empty());
        assert!(error.is_some());
    }

    #[test]
    fn attribute_entities_are_decoded() {
        let shapes = read_shapes(
            r#"<svg><line id="a&amp;b" x2="5"/><path id="p" d="M0 0&#10;L5 5"/></svg>"#,
            DAffine2::IDENTITY,
        )
        .expect("shapes");
        let names: Vec<&str> = shapes.iter().map(|shape| shape.name.as_str()).collect();
        assert_eq!(names, ["a&b", "p"]);
        assert_eq!(shapes[1].shape.edges.len(), 1);
    }

    #[test]
    fn points_and_px_coordinates_are_accepted() {
        let shapes = read_shapes(
            r#"<svg><polyline points="0,0 10,0 10,10"/><circle cx="3px" cy="4" r="1px"/></svg>"#,
            DAffine2::IDENTITY,
        )
        .expect("shapes");
        assert_eq!(shapes[0].shape.edges.len(), 2);
        assert!(matches!(
            &shapes[1].shape.edges[0].curve,
            Curve::Circle(c) if c.center.distance(Point3::new(3.0, 4.0, 0.0)) < 1e-12
        ));
    }

    #[test]
    fn malformed_markup_is_reported() {
        let err = read_shapes("<svg><line></svg>", DAffine2::IDENTITY).unwrap_err();
        assert!(matches!(err, IoError::InvalidMarkup(_)));
    }
}
