//! 骨骼节点
//!
//! BoneNode 是骨骼层级中的单个关节。rest pose 在 BoneSet::build 时捕获一次，
//! 之后不再变化，是约束解算和视线混合的参考系。

use bitflags::bitflags;
use glam::{Mat4, Quat, Vec3};

use super::BoneTransform;

bitflags! {
    /// 骨骼角色标志位（构建各子系统时打上，标记骨骼被哪些解算子系统驱动或引用）
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct BoneRole: u32 {
        /// 由弹簧骨骼模拟驱动旋转
        const SPRING_DRIVEN = 1 << 0;
        /// 节点约束的源骨骼
        const CONSTRAINT_SOURCE = 1 << 1;
        /// 节点约束的目标骨骼
        const CONSTRAINT_DESTINATION = 1 << 2;
        /// 视线追踪驱动的眼骨
        const EYE = 1 << 3;
        /// 挂有碰撞体
        const COLLIDER_HOST = 1 << 4;
    }
}

/// 骨骼节点
///
/// 设计原则：
/// - 静态数据：名称、父索引、rest pose（build 后不变）
/// - 动态数据：当前局部姿态与缓存矩阵（每帧更新）
/// - 变换计算：local_to_world = parent.local_to_world * local_to_parent
#[derive(Clone, Debug)]
pub struct BoneNode {
    // ========================================
    // 静态数据（build 后不变）
    // ========================================
    /// 骨骼名称
    pub name: String,

    /// 骨骼内部索引
    pub(crate) internal_id: usize,

    /// 父骨骼索引 (-1 表示根骨骼)
    pub parent_index: i32,

    /// 骨骼角色标志
    pub roles: BoneRole,

    /// rest pose 局部平移（build 时捕获）
    pub rest_translation: Vec3,

    /// rest pose 局部旋转（build 时捕获）
    pub rest_rotation: Quat,

    // ========================================
    // 动态数据（每帧更新）
    // ========================================
    /// 当前局部平移
    pub local_translation: Vec3,

    /// 当前局部旋转
    pub local_rotation: Quat,

    /// 本地变换矩阵 (local_to_parent)
    pub local_to_parent: Mat4,

    /// 全局变换矩阵 (local_to_world)
    pub local_to_world: Mat4,

    /// 父骨骼到世界的变换（缓存）
    pub(crate) parent_to_world: Mat4,

    /// 是否为叶节点（build 时标记）
    pub is_leaf: bool,
}

impl BoneNode {
    /// 创建新骨骼
    pub fn new(name: String, translation: Vec3, rotation: Quat) -> Self {
        Self {
            name,
            internal_id: 0,
            parent_index: -1,
            roles: BoneRole::empty(),
            rest_translation: translation,
            rest_rotation: rotation,
            local_translation: translation,
            local_rotation: rotation,
            local_to_parent: Mat4::IDENTITY,
            local_to_world: Mat4::IDENTITY,
            parent_to_world: Mat4::IDENTITY,
            is_leaf: true,
        }
    }

    /// 骨骼索引
    #[inline]
    pub fn id(&self) -> usize {
        self.internal_id
    }

    /// 父骨骼索引
    #[inline]
    pub fn parent_id(&self) -> Option<usize> {
        if self.parent_index >= 0 {
            Some(self.parent_index as usize)
        } else {
            None
        }
    }

    /// 是否为根骨骼
    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent_index < 0
    }

    /// 获取世界位置
    #[inline]
    pub fn position_world(&self) -> Vec3 {
        self.local_to_world.col(3).truncate()
    }

    /// 获取世界旋转
    #[inline]
    pub fn rotation_world(&self) -> Quat {
        Quat::from_mat4(&self.local_to_world)
    }

    /// 获取父骨骼世界旋转（根骨骼为单位旋转）
    #[inline]
    pub fn parent_rotation_world(&self) -> Quat {
        Quat::from_mat4(&self.parent_to_world)
    }

    /// 计算本地变换 (local_to_parent)
    #[inline]
    pub fn compute_local_transform(&mut self) {
        self.local_to_parent =
            Mat4::from_rotation_translation(self.local_rotation, self.local_translation);
    }

    /// 恢复到 rest pose
    #[inline]
    pub fn reset_to_rest(&mut self) {
        self.local_translation = self.rest_translation;
        self.local_rotation = self.rest_rotation;
    }

    /// rest pose 变换
    #[inline]
    pub fn rest_transform(&self) -> BoneTransform {
        BoneTransform {
            translation: self.rest_translation,
            rotation: self.rest_rotation,
            scale: Vec3::ONE,
        }
    }

    /// rest pose 的 local_to_parent 矩阵
    #[inline]
    pub fn rest_local_matrix(&self) -> Mat4 {
        self.rest_transform().to_matrix()
    }
}
