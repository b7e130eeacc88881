//! 位姿字符串解析。

use glam::{DQuat, DVec3};
use svgsketch_core::geometry::Placement;

use crate::errors::PipelineError;

/// 用户给定的刚体位姿：先旋转后平移。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: DVec3,
    /// 已归一化。
    pub orientation: DQuat,
}

impl Pose {
    /// 解析 `"x,y,z"` 与 `"x,y,z,w"` 两个字符串，允许外层引号与空白。
    pub fn parse(position: &str, orientation: &str) -> Result<Self, PipelineError> {
        Ok(Self {
            position: parse_position(position)?,
            orientation: parse_orientation(orientation)?,
        })
    }

    /// 参考坐标系的放置：`translate(position) ∘ rotate(orientation)`。
    pub fn placement(&self) -> Placement {
        Placement::new(self.position, self.orientation)
    }
}

pub fn parse_position(raw: &str) -> Result<DVec3, PipelineError> {
    let [x, y, z] = components::<3>(raw)?;
    Ok(DVec3::new(x, y, z))
}

pub fn parse_orientation(raw: &str) -> Result<DQuat, PipelineError> {
    let [x, y, z, w] = components::<4>(raw)?;
    let quat = DQuat::from_xyzw(x, y, z, w);
    let length = quat.length();
    if length <= f64::EPSILON {
        return Err(PipelineError::parse(raw, "quaternion has zero length"));
    }
    Ok(quat / length)
}

/// 去掉外层空白与引号。
pub fn strip_quotes(raw: &str) -> &str {
    raw.trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
}

fn components<const N: usize>(raw: &str) -> Result<[f64; N], PipelineError> {
    let text = strip_quotes(raw);
    let parts: Vec<&str> = text.split(',').collect();
    if parts.len() != N {
        return Err(PipelineError::parse(
            raw,
            format!("expected {N} comma-separated components, found {}", parts.len()),
        ));
    }

    let mut values = [0.0; N];
    for (slot, part) in values.iter_mut().zip(&parts) {
        let value: f64 = part.trim().parse().map_err(|_| {
            PipelineError::parse(raw, format!("component \"{}\" is not a number", part.trim()))
        })?;
        if !value.is_finite() {
            return Err(PipelineError::parse(
                raw,
                format!("component \"{}\" is not finite", part.trim()),
            ));
        }
        *slot = value;
    }
    Ok(values)
}

/// 逗号分隔后的分量个数，用于在参数列表中定位位姿。
pub fn component_count(raw: &str) -> usize {
    strip_quotes(raw).split(',').count()
}
