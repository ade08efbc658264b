//! 骨骼系统 - 扁平 arena 存储的关节层级
//!
//! 核心设计思想：
//! - BoneNode: 单个关节节点，静态数据（名称、父子关系、rest pose）与
//!   动态数据（当前局部姿态、缓存矩阵）分离
//! - BoneSet: 管理骨骼层级，要求父骨骼先于子骨骼入列
//! - TwoJointIk: 双关节 IK 闭式求解器

mod bone_node;
mod bone_set;
mod two_joint_ik;

pub use bone_node::{BoneNode, BoneRole};
pub use bone_set::BoneSet;
pub use two_joint_ik::TwoJointIk;

use glam::{Mat4, Quat, Vec3};

// ============================================================================
// 公共类型定义
// ============================================================================

/// 骨骼索引别名
pub type BoneId = usize;

/// 骨骼变换数据
#[derive(Clone, Copy, Debug)]
pub struct BoneTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for BoneTransform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl BoneTransform {
    /// 转换为 4x4 矩阵
    #[inline]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// 从矩阵分解
    #[inline]
    pub fn from_matrix(m: Mat4) -> Self {
        let (scale, rotation, translation) = m.to_scale_rotation_translation();
        Self {
            translation,
            rotation,
            scale,
        }
    }
}
