//! 骨骼集合 - 管理骨骼层级与世界变换传播
//!
//! 存储顺序约定：父骨骼先于子骨骼。该约定使全量世界变换更新
//! 可以用一次顺序遍历完成，无需拓扑排序。

use std::collections::HashMap;

use glam::{Quat, Vec3};

use crate::{Result, VrmError};

use super::bone_node::BoneNode;
use super::BoneId;

/// 骨骼集合
#[derive(Clone, Debug, Default)]
pub struct BoneSet {
    /// 骨骼 arena（父先于子）
    bones: Vec<BoneNode>,
    /// 子骨骼索引缓存（build 时计算）
    children: Vec<Vec<usize>>,
    /// 名称 → 索引
    name_index: HashMap<String, usize>,
    /// rest pose 是否已捕获
    built: bool,
}

impl BoneSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加骨骼，返回其索引
    ///
    /// 父骨骼必须已经存在（父先于子），否则返回 InvalidHierarchy。
    pub fn add_bone(
        &mut self,
        name: impl Into<String>,
        parent: Option<BoneId>,
        translation: Vec3,
        rotation: Quat,
    ) -> Result<BoneId> {
        if self.built {
            return Err(VrmError::AlreadyBuilt);
        }

        let id = self.bones.len();
        let parent_index = match parent {
            Some(p) => {
                if p >= id {
                    return Err(VrmError::InvalidHierarchy(format!(
                        "bone {} references forward parent {}",
                        id, p
                    )));
                }
                p as i32
            }
            None => -1,
        };

        let name = name.into();
        let mut bone = BoneNode::new(name.clone(), translation, rotation);
        bone.internal_id = id;
        bone.parent_index = parent_index;

        self.name_index.entry(name).or_insert(id);
        self.bones.push(bone);
        Ok(id)
    }

    /// 构建骨骼集合：捕获 rest pose、计算子骨骼缓存、刷新世界变换
    ///
    /// 只允许调用一次，重复调用返回 AlreadyBuilt。
    pub fn build(&mut self) -> Result<()> {
        if self.built {
            return Err(VrmError::AlreadyBuilt);
        }

        // 捕获 rest pose（此后不再变化）
        for bone in &mut self.bones {
            bone.rest_translation = bone.local_translation;
            bone.rest_rotation = bone.local_rotation;
        }

        // 子骨骼缓存与叶节点标记
        self.children = vec![Vec::new(); self.bones.len()];
        for i in 0..self.bones.len() {
            if let Some(p) = self.bones[i].parent_id() {
                self.children[p].push(i);
            }
        }
        for i in 0..self.bones.len() {
            self.bones[i].is_leaf = self.children[i].is_empty();
        }

        self.built = true;
        self.update_world_transforms();

        log::info!("[Skeleton] 骨架构建完成: {} 骨骼", self.bones.len());
        Ok(())
    }

    /// 是否已构建
    #[inline]
    pub fn is_built(&self) -> bool {
        self.built
    }

    /// 骨骼数量
    #[inline]
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// 按名称查找骨骼
    pub fn find_bone_by_name(&self, name: &str) -> Option<BoneId> {
        self.name_index.get(name).copied()
    }

    #[inline]
    pub fn get(&self, id: BoneId) -> Option<&BoneNode> {
        self.bones.get(id)
    }

    #[inline]
    pub fn get_mut(&mut self, id: BoneId) -> Option<&mut BoneNode> {
        self.bones.get_mut(id)
    }

    /// 骨骼切片（只读）
    #[inline]
    pub fn bones(&self) -> &[BoneNode] {
        &self.bones
    }

    /// 子骨骼索引
    pub fn children_of(&self, id: BoneId) -> &[usize] {
        self.children.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// 设置局部旋转（不触发世界变换更新）
    #[inline]
    pub fn set_local_rotation(&mut self, id: BoneId, rotation: Quat) {
        if let Some(bone) = self.bones.get_mut(id) {
            bone.local_rotation = rotation;
        }
    }

    /// 设置局部平移（不触发世界变换更新）
    #[inline]
    pub fn set_local_translation(&mut self, id: BoneId, translation: Vec3) {
        if let Some(bone) = self.bones.get_mut(id) {
            bone.local_translation = translation;
        }
    }

    /// 全量刷新世界变换（父先于子的顺序遍历）
    pub fn update_world_transforms(&mut self) {
        for i in 0..self.bones.len() {
            self.bones[i].compute_local_transform();
            let parent_index = self.bones[i].parent_index;
            if parent_index >= 0 {
                let parent_global = self.bones[parent_index as usize].local_to_world;
                self.bones[i].parent_to_world = parent_global;
                self.bones[i].local_to_world = parent_global * self.bones[i].local_to_parent;
            } else {
                self.bones[i].parent_to_world = glam::Mat4::IDENTITY;
                self.bones[i].local_to_world = self.bones[i].local_to_parent;
            }
        }
    }

    /// 递归刷新指定骨骼及其子树的世界变换
    pub fn update_subtree(&mut self, idx: BoneId) {
        if idx >= self.bones.len() {
            return;
        }

        self.bones[idx].compute_local_transform();
        let parent_index = self.bones[idx].parent_index;
        if parent_index >= 0 && (parent_index as usize) < self.bones.len() {
            let parent_global = self.bones[parent_index as usize].local_to_world;
            self.bones[idx].parent_to_world = parent_global;
            self.bones[idx].local_to_world = parent_global * self.bones[idx].local_to_parent;
        } else {
            self.bones[idx].parent_to_world = glam::Mat4::IDENTITY;
            self.bones[idx].local_to_world = self.bones[idx].local_to_parent;
        }

        if idx < self.children.len() {
            let children = self.children[idx].clone();
            for child_idx in children {
                self.update_subtree(child_idx);
            }
        }
    }

    /// 恢复全部骨骼到 rest pose 并刷新世界变换
    pub fn reset_to_rest(&mut self) {
        for bone in &mut self.bones {
            bone.reset_to_rest();
        }
        self.update_world_transforms();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};
    use std::f32::consts::FRAC_PI_2;

    fn three_bone_chain() -> BoneSet {
        let mut set = BoneSet::new();
        let root = set
            .add_bone("root", None, Vec3::ZERO, Quat::IDENTITY)
            .unwrap();
        let mid = set
            .add_bone("mid", Some(root), Vec3::new(0.0, 1.0, 0.0), Quat::IDENTITY)
            .unwrap();
        set.add_bone("tip", Some(mid), Vec3::new(0.0, 1.0, 0.0), Quat::IDENTITY)
            .unwrap();
        set.build().unwrap();
        set
    }

    #[test]
    fn world_positions_accumulate() {
        let set = three_bone_chain();
        let tip = set.find_bone_by_name("tip").unwrap();
        let pos = set.get(tip).unwrap().position_world();
        assert!((pos - Vec3::new(0.0, 2.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn forward_parent_is_rejected() {
        let mut set = BoneSet::new();
        let err = set.add_bone("a", Some(3), Vec3::ZERO, Quat::IDENTITY);
        assert!(matches!(err, Err(VrmError::InvalidHierarchy(_))));
    }

    #[test]
    fn rebuild_is_rejected() {
        let mut set = three_bone_chain();
        assert!(matches!(set.build(), Err(VrmError::AlreadyBuilt)));
    }

    #[test]
    fn rotation_propagates_to_subtree() {
        let mut set = three_bone_chain();
        let root = set.find_bone_by_name("root").unwrap();
        let tip = set.find_bone_by_name("tip").unwrap();

        // 根骨骼绕 Z 转 90 度，链条从 +Y 倒向 -X
        set.set_local_rotation(root, Quat::from_rotation_z(FRAC_PI_2));
        set.update_world_transforms();
        let pos = set.get(tip).unwrap().position_world();
        assert!((pos - Vec3::new(-2.0, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn reset_restores_rest_pose() {
        let mut set = three_bone_chain();
        let mid = set.find_bone_by_name("mid").unwrap();
        let rest = set.get(mid).unwrap().rest_rotation;

        set.set_local_rotation(mid, Quat::from_rotation_x(0.7));
        set.update_world_transforms();
        set.reset_to_rest();

        let bone = set.get(mid).unwrap();
        assert!((bone.local_rotation.dot(rest).abs() - 1.0).abs() < 1e-6);
        let tip = set.find_bone_by_name("tip").unwrap();
        let pos = set.get(tip).unwrap().position_world();
        assert!((pos - Vec3::new(0.0, 2.0, 0.0)).length() < 1e-6);
    }
}
