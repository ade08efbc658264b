//! 节点约束 - 参考 VRMC_node_constraint 定义
//!
//! 从源骨骼相对 rest pose 的旋转变化推导目标骨骼的旋转，
//! 按约束类型取三种代数形式之一（roll / aim / rotation），
//! 结果与目标 rest 旋转按权重球面插值后写入目标局部旋转。
//!
//! 约束按调用方提供的顺序依次解算：目标又作为后续约束源的场合，
//! 必须先被解算。本模块不做拓扑排序，仅提供 validate_order 做告警。

use glam::{Quat, Vec3};

use crate::skeleton::{BoneId, BoneSet};

// ============================================================================
// 约束类型
// ============================================================================

/// roll 约束的参考轴
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RollAxis {
    X,
    Y,
    Z,
}

impl RollAxis {
    #[inline]
    pub fn to_vec3(self) -> Vec3 {
        match self {
            RollAxis::X => Vec3::X,
            RollAxis::Y => Vec3::Y,
            RollAxis::Z => Vec3::Z,
        }
    }

    /// 解析 VRMC_node_constraint 的 rollAxis 字符串
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "X" => Some(RollAxis::X),
            "Y" => Some(RollAxis::Y),
            "Z" => Some(RollAxis::Z),
            _ => None,
        }
    }
}

/// aim 约束的参考轴（含方向）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AimAxis {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl AimAxis {
    #[inline]
    pub fn to_vec3(self) -> Vec3 {
        match self {
            AimAxis::PositiveX => Vec3::X,
            AimAxis::NegativeX => Vec3::NEG_X,
            AimAxis::PositiveY => Vec3::Y,
            AimAxis::NegativeY => Vec3::NEG_Y,
            AimAxis::PositiveZ => Vec3::Z,
            AimAxis::NegativeZ => Vec3::NEG_Z,
        }
    }

    /// 解析 VRMC_node_constraint 的 aimAxis 字符串
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "PositiveX" => Some(AimAxis::PositiveX),
            "NegativeX" => Some(AimAxis::NegativeX),
            "PositiveY" => Some(AimAxis::PositiveY),
            "NegativeY" => Some(AimAxis::NegativeY),
            "PositiveZ" => Some(AimAxis::PositiveZ),
            "NegativeZ" => Some(AimAxis::NegativeZ),
            _ => None,
        }
    }
}

/// 约束类型
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstraintKind {
    /// 仅传递绕单轴的旋转分量
    Roll { axis: RollAxis },
    /// 目标骨骼的 aim 轴指向源骨骼
    Aim { axis: AimAxis },
    /// 直接传递源骨骼的旋转变化
    Rotation,
}

/// 节点约束：源骨骼 → 目标骨骼
#[derive(Clone, Copy, Debug)]
pub struct NodeConstraint {
    pub source: BoneId,
    pub destination: BoneId,
    pub kind: ConstraintKind,
    /// 混合权重 [0, 1]
    pub weight: f32,
}

// ============================================================================
// 解算
// ============================================================================

impl NodeConstraint {
    /// 解算并写入目标骨骼的局部旋转，随后刷新目标子树
    pub fn apply(&self, bones: &mut BoneSet) {
        let target = match self.compute_target_rotation(bones) {
            Some(q) => q,
            None => return,
        };

        let dst_rest = match bones.get(self.destination) {
            Some(b) => b.rest_rotation,
            None => return,
        };

        let weight = self.weight.clamp(0.0, 1.0);
        let result = dst_rest.slerp(target, weight);
        bones.set_local_rotation(self.destination, result);
        bones.update_subtree(self.destination);
    }

    /// 计算权重为 1 时目标骨骼的局部旋转
    fn compute_target_rotation(&self, bones: &BoneSet) -> Option<Quat> {
        let src = bones.get(self.source)?;
        let dst = bones.get(self.destination)?;

        match self.kind {
            ConstraintKind::Rotation => {
                // 源局部旋转相对 rest 的增量直接叠加到目标 rest 上
                let delta = src.rest_rotation.inverse() * src.local_rotation;
                Some(dst.rest_rotation * delta)
            }
            ConstraintKind::Roll { axis } => {
                let axis = axis.to_vec3();
                // 源旋转增量换算到目标局部空间
                let delta_src = src.rest_rotation.inverse() * src.local_rotation;
                let delta_in_parent = src.rest_rotation * delta_src * src.rest_rotation.inverse();
                let delta_in_dst =
                    dst.rest_rotation.inverse() * delta_in_parent * dst.rest_rotation;

                // rotate-to-axis：剔除把参考轴转走的分量，只留下绕轴的 roll
                let to = (delta_in_dst * axis).normalize_or_zero();
                if to.length_squared() < 1e-10 {
                    return None;
                }
                let from_to = Quat::from_rotation_arc(axis, to);
                Some(dst.rest_rotation * from_to.inverse() * delta_in_dst)
            }
            ConstraintKind::Aim { axis } => {
                let axis = axis.to_vec3();
                let dst_parent_rot = dst.parent_rotation_world();

                // rest 姿态下 aim 轴的世界方向
                let from = (dst_parent_rot * dst.rest_rotation * axis).normalize_or_zero();
                // 指向源骨骼的实际方向
                let to = (src.position_world() - dst.position_world()).normalize_or_zero();
                if from.length_squared() < 1e-10 || to.length_squared() < 1e-10 {
                    return None;
                }

                let from_to = Quat::from_rotation_arc(from, to);
                Some(dst_parent_rot.inverse() * from_to * dst_parent_rot * dst.rest_rotation)
            }
        }
    }
}

/// 按提供顺序依次解算全部约束
pub fn apply_all(bones: &mut BoneSet, constraints: &[NodeConstraint]) {
    for constraint in constraints {
        constraint.apply(bones);
    }
}

/// 顺序校验（仅告警，不改变行为）
///
/// 若某个约束的源骨骼是更靠后约束的目标骨骼，说明其读取的是
/// 上一帧/未解算的值，行为依赖调用方给出的顺序。
pub fn validate_order(constraints: &[NodeConstraint]) {
    for i in 0..constraints.len() {
        for j in (i + 1)..constraints.len() {
            if constraints[i].source == constraints[j].destination {
                log::warn!(
                    "[Constraint] 约束 #{} 的源骨骼 {} 是约束 #{} 的目标，解算顺序可能有误",
                    i,
                    constraints[i].source,
                    j
                );
            }
        }
    }
}
