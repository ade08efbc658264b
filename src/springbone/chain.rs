//! 弹簧链定义与关节模拟状态
//!
//! SpringChain 是从模型元数据读出的静态描述；SpringJointState 是
//! 独立于骨骼节点的模拟记录 arena，initialize 时一次性建立。

use glam::{Mat4, Quat, Vec3};

use crate::skeleton::{BoneId, BoneSet};

/// 单个弹簧关节的物理参数
#[derive(Clone, Copy, Debug)]
pub struct SpringJointParams {
    /// 刚性：拉回 rest 方向的力
    pub stiffness: f32,
    /// 阻力：惯性衰减系数 [0, 1]
    pub drag_force: f32,
    /// 重力方向（单位向量）
    pub gravity_dir: Vec3,
    /// 重力强度
    pub gravity_power: f32,
    /// 关节碰撞半径
    pub hit_radius: f32,
}

impl Default for SpringJointParams {
    fn default() -> Self {
        // VRMC_springBone 默认值
        Self {
            stiffness: 1.0,
            drag_force: 0.5,
            gravity_dir: Vec3::NEG_Y,
            gravity_power: 0.0,
            hit_radius: 0.0,
        }
    }
}

/// 弹簧链（静态描述）
///
/// joints 按链条顺序排列（父先于子），最后一个关节只作为
/// 前一关节的尾端参照，自身不持有模拟状态。
#[derive(Clone, Debug)]
pub struct SpringChain {
    pub name: String,
    pub joints: Vec<(BoneId, SpringJointParams)>,
    /// 引用 SpringBoneWorld 中碰撞体 arena 的索引
    pub colliders: Vec<usize>,
    /// 可选的参考系骨骼：尾端位置存储在该骨骼空间，根部移动时保持稳定
    pub center: Option<BoneId>,
}

/// 关节模拟状态（initialize 时捕获，update 时演化）
#[derive(Clone, Debug)]
pub(crate) struct SpringJointState {
    /// 被驱动旋转的骨骼
    pub bone: BoneId,
    /// 链中的下一关节，尾端参照
    pub child: BoneId,
    /// 物理参数
    pub params: SpringJointParams,
    /// 上一帧尾端位置（center 空间）
    pub prev_tail: Vec3,
    /// 当前尾端位置（center 空间）
    pub current_tail: Vec3,
    /// rest pose 局部旋转
    pub initial_local_rotation: Quat,
    /// rest pose 的 local_to_parent 矩阵
    pub initial_local_matrix: Mat4,
    /// rest pose 下指向子骨骼的局部单位方向
    pub bone_axis: Vec3,
    /// 骨长（已抬到下限以上）
    pub bone_length: f32,
}

impl SpringJointState {
    /// 从当前姿态建立模拟状态
    ///
    /// `child` 是链条中的下一个关节；world_to_center 把世界空间
    /// 尾端转入 center 空间存储。
    pub(crate) fn capture(
        bones: &BoneSet,
        bone: BoneId,
        child: BoneId,
        params: SpringJointParams,
        length_floor: f32,
        world_to_center: Mat4,
    ) -> Option<Self> {
        let node = bones.get(bone)?;
        let child_node = bones.get(child)?;

        let child_local = child_node.rest_translation;
        let bone_length = child_local.length().max(length_floor);
        let bone_axis = child_local.normalize_or_zero();
        let bone_axis = if bone_axis.length_squared() < 1e-10 {
            // 零长骨骼没有自然方向，沿 -Y 垂下
            Vec3::NEG_Y
        } else {
            bone_axis
        };

        let tail = world_to_center.transform_point3(child_node.position_world());

        Some(Self {
            bone,
            child,
            params,
            prev_tail: tail,
            current_tail: tail,
            initial_local_rotation: node.rest_rotation,
            initial_local_matrix: node.rest_local_matrix(),
            bone_axis,
            bone_length,
        })
    }
}
