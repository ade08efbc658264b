//! 视线追踪 - 参考 VRMC_vrm lookAt 定义
//!
//! 从世界空间目标点计算头部局部参考系下的 yaw/pitch（度），
//! 经非对称 range map 限幅后合成眼骨旋转：restPose ∘ euler。
//! 配置或目标缺失时静默跳过，无错误路径。

use glam::{EulerRot, Quat, Vec3};

use crate::humanoid::{HumanoidBone, HumanoidMap};
use crate::skeleton::BoneSet;

// ============================================================================
// Range map
// ============================================================================

/// 线性饱和映射：clamp(input, 0, max) / max * scale
#[derive(Clone, Copy, Debug)]
pub struct RangeMap {
    /// 输入饱和点（度）
    pub input_max_value: f32,
    /// 饱和时的输出（度）
    pub output_scale: f32,
}

impl RangeMap {
    pub fn new(input_max_value: f32, output_scale: f32) -> Self {
        Self {
            input_max_value,
            output_scale,
        }
    }

    /// 映射输入角（度）。input_max_value 非正时恒为 0。
    pub fn map(&self, input: f32) -> f32 {
        if self.input_max_value <= 0.0 {
            return 0.0;
        }
        input.clamp(0.0, self.input_max_value) / self.input_max_value * self.output_scale
    }
}

impl Default for RangeMap {
    fn default() -> Self {
        // VRMC_vrm 默认：90 度输入映射到 10 度眼球偏转
        Self::new(90.0, 10.0)
    }
}

// ============================================================================
// 配置
// ============================================================================

/// 视线配置（模型元数据读取一次，无状态）
#[derive(Clone, Copy, Debug, Default)]
pub struct LookAtConfig {
    /// 视线原点相对头骨的偏移（头骨局部空间）
    pub offset_from_head: Vec3,
    /// 水平内侧（朝鼻梁方向）
    pub horizontal_inner: RangeMap,
    /// 水平外侧（远离鼻梁方向）
    pub horizontal_outer: RangeMap,
    /// 垂直向上
    pub vertical_up: RangeMap,
    /// 垂直向下
    pub vertical_down: RangeMap,
}

// ============================================================================
// 解算器
// ============================================================================

/// 视线解算器
#[derive(Clone, Debug, Default)]
pub struct LookAtResolver {
    config: Option<LookAtConfig>,
    target: Option<Vec3>,
}

impl LookAtResolver {
    pub fn new(config: Option<LookAtConfig>) -> Self {
        Self {
            config,
            target: None,
        }
    }

    /// 设置世界空间目标点（None 表示停止追踪）
    #[inline]
    pub fn set_target(&mut self, target: Option<Vec3>) {
        self.target = target;
    }

    #[inline]
    pub fn target(&self) -> Option<Vec3> {
        self.target
    }

    #[inline]
    pub fn config(&self) -> Option<&LookAtConfig> {
        self.config.as_ref()
    }

    /// 解算并写入左右眼局部旋转
    ///
    /// 头骨或双眼缺失、配置或目标缺失时均为 no-op。
    pub fn resolve(&self, bones: &mut BoneSet, humanoid: &HumanoidMap) {
        let (config, target) = match (self.config, self.target) {
            (Some(c), Some(t)) => (c, t),
            _ => return,
        };
        let head_id = match humanoid.get(HumanoidBone::Head) {
            Some(id) => id,
            None => return,
        };

        let head = match bones.get(head_id) {
            Some(b) => b,
            None => return,
        };
        let head_rot = head.rotation_world();
        let origin = head.position_world() + head_rot * config.offset_from_head;

        let dir = (target - origin).normalize_or_zero();
        if dir.length_squared() < 1e-10 {
            return;
        }

        // 头部局部参考系的方向分量
        let right = head_rot * Vec3::X;
        let up = head_rot * Vec3::Y;
        let forward = head_rot * Vec3::Z;

        let x = dir.dot(right);
        let y = dir.dot(up);
        let z = dir.dot(forward);
        if z <= 1e-6 && x.abs() < 1e-6 && y.abs() < 1e-6 {
            return;
        }

        // yaw: 正值朝 +X（角色左侧）；pitch: 正值向上
        let yaw = x.atan2(z).to_degrees();
        let pitch = y.atan2((x * x + z * z).sqrt()).to_degrees();

        let pitch_mapped = if pitch >= 0.0 {
            config.vertical_up.map(pitch)
        } else {
            -config.vertical_down.map(-pitch)
        };

        // 左眼：+X 方向为外侧；右眼镜像
        if let Some(left_id) = humanoid.get(HumanoidBone::LeftEye) {
            let yaw_mapped = if yaw >= 0.0 {
                config.horizontal_outer.map(yaw)
            } else {
                -config.horizontal_inner.map(-yaw)
            };
            Self::apply_eye(bones, left_id, yaw_mapped, pitch_mapped);
        }
        if let Some(right_id) = humanoid.get(HumanoidBone::RightEye) {
            let yaw_mapped = if yaw >= 0.0 {
                config.horizontal_inner.map(yaw)
            } else {
                -config.horizontal_outer.map(-yaw)
            };
            Self::apply_eye(bones, right_id, yaw_mapped, pitch_mapped);
        }
    }

    /// eye.local = rest ∘ euler(yaw, pitch)
    fn apply_eye(bones: &mut BoneSet, eye: crate::skeleton::BoneId, yaw_deg: f32, pitch_deg: f32) {
        let rest = match bones.get(eye) {
            Some(b) => b.rest_rotation,
            None => return,
        };
        // 绕 Y 偏航，绕 X 俯仰（向上看绕 -X）
        let euler = Quat::from_euler(
            EulerRot::YXZ,
            yaw_deg.to_radians(),
            -pitch_deg.to_radians(),
            0.0,
        );
        bones.set_local_rotation(eye, rest * euler);
        bones.update_subtree(eye);
    }
}
