//! 人形骨骼映射
//!
//! VRMC_vrm humanoid 定义了一组固定命名的人形关节。这里用枚举索引的
//! 定长数组存储映射，"缺少某骨骼"是显式的 Option 而不是动态查表未命中。

use crate::skeleton::BoneId;
use crate::{Result, VrmError};

// ============================================================================
// 人形骨骼枚举
// ============================================================================

/// VRM 人形关节（VRMC_vrm humanoid 命名）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum HumanoidBone {
    // 躯干
    Hips,
    Spine,
    Chest,
    UpperChest,
    Neck,
    Head,
    LeftEye,
    RightEye,
    Jaw,
    // 腿
    LeftUpperLeg,
    LeftLowerLeg,
    LeftFoot,
    LeftToes,
    RightUpperLeg,
    RightLowerLeg,
    RightFoot,
    RightToes,
    // 臂
    LeftShoulder,
    LeftUpperArm,
    LeftLowerArm,
    LeftHand,
    RightShoulder,
    RightUpperArm,
    RightLowerArm,
    RightHand,
    // 左手指
    LeftThumbMetacarpal,
    LeftThumbProximal,
    LeftThumbDistal,
    LeftIndexProximal,
    LeftIndexIntermediate,
    LeftIndexDistal,
    LeftMiddleProximal,
    LeftMiddleIntermediate,
    LeftMiddleDistal,
    LeftRingProximal,
    LeftRingIntermediate,
    LeftRingDistal,
    LeftLittleProximal,
    LeftLittleIntermediate,
    LeftLittleDistal,
    // 右手指
    RightThumbMetacarpal,
    RightThumbProximal,
    RightThumbDistal,
    RightIndexProximal,
    RightIndexIntermediate,
    RightIndexDistal,
    RightMiddleProximal,
    RightMiddleIntermediate,
    RightMiddleDistal,
    RightRingProximal,
    RightRingIntermediate,
    RightRingDistal,
    RightLittleProximal,
    RightLittleIntermediate,
    RightLittleDistal,
}

impl HumanoidBone {
    /// 枚举成员数量
    pub const COUNT: usize = 55;

    /// 必需骨骼（缺失则模型无效）
    pub const REQUIRED: [HumanoidBone; 3] =
        [HumanoidBone::Hips, HumanoidBone::Spine, HumanoidBone::Head];

    /// 数组索引
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// VRMC_vrm 规范中的骨骼名称
    pub fn name(self) -> &'static str {
        use HumanoidBone::*;
        match self {
            Hips => "hips",
            Spine => "spine",
            Chest => "chest",
            UpperChest => "upperChest",
            Neck => "neck",
            Head => "head",
            LeftEye => "leftEye",
            RightEye => "rightEye",
            Jaw => "jaw",
            LeftUpperLeg => "leftUpperLeg",
            LeftLowerLeg => "leftLowerLeg",
            LeftFoot => "leftFoot",
            LeftToes => "leftToes",
            RightUpperLeg => "rightUpperLeg",
            RightLowerLeg => "rightLowerLeg",
            RightFoot => "rightFoot",
            RightToes => "rightToes",
            LeftShoulder => "leftShoulder",
            LeftUpperArm => "leftUpperArm",
            LeftLowerArm => "leftLowerArm",
            LeftHand => "leftHand",
            RightShoulder => "rightShoulder",
            RightUpperArm => "rightUpperArm",
            RightLowerArm => "rightLowerArm",
            RightHand => "rightHand",
            LeftThumbMetacarpal => "leftThumbMetacarpal",
            LeftThumbProximal => "leftThumbProximal",
            LeftThumbDistal => "leftThumbDistal",
            LeftIndexProximal => "leftIndexProximal",
            LeftIndexIntermediate => "leftIndexIntermediate",
            LeftIndexDistal => "leftIndexDistal",
            LeftMiddleProximal => "leftMiddleProximal",
            LeftMiddleIntermediate => "leftMiddleIntermediate",
            LeftMiddleDistal => "leftMiddleDistal",
            LeftRingProximal => "leftRingProximal",
            LeftRingIntermediate => "leftRingIntermediate",
            LeftRingDistal => "leftRingDistal",
            LeftLittleProximal => "leftLittleProximal",
            LeftLittleIntermediate => "leftLittleIntermediate",
            LeftLittleDistal => "leftLittleDistal",
            RightThumbMetacarpal => "rightThumbMetacarpal",
            RightThumbProximal => "rightThumbProximal",
            RightThumbDistal => "rightThumbDistal",
            RightIndexProximal => "rightIndexProximal",
            RightIndexIntermediate => "rightIndexIntermediate",
            RightIndexDistal => "rightIndexDistal",
            RightMiddleProximal => "rightMiddleProximal",
            RightMiddleIntermediate => "rightMiddleIntermediate",
            RightMiddleDistal => "rightMiddleDistal",
            RightRingProximal => "rightRingProximal",
            RightRingIntermediate => "rightRingIntermediate",
            RightRingDistal => "rightRingDistal",
            RightLittleProximal => "rightLittleProximal",
            RightLittleIntermediate => "rightLittleIntermediate",
            RightLittleDistal => "rightLittleDistal",
        }
    }

    /// 按规范名称解析，未知名称返回 None
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|b| b.name() == name)
    }

    /// 全部成员（按索引序）
    pub const ALL: [HumanoidBone; Self::COUNT] = {
        use HumanoidBone::*;
        [
            Hips,
            Spine,
            Chest,
            UpperChest,
            Neck,
            Head,
            LeftEye,
            RightEye,
            Jaw,
            LeftUpperLeg,
            LeftLowerLeg,
            LeftFoot,
            LeftToes,
            RightUpperLeg,
            RightLowerLeg,
            RightFoot,
            RightToes,
            LeftShoulder,
            LeftUpperArm,
            LeftLowerArm,
            LeftHand,
            RightShoulder,
            RightUpperArm,
            RightLowerArm,
            RightHand,
            LeftThumbMetacarpal,
            LeftThumbProximal,
            LeftThumbDistal,
            LeftIndexProximal,
            LeftIndexIntermediate,
            LeftIndexDistal,
            LeftMiddleProximal,
            LeftMiddleIntermediate,
            LeftMiddleDistal,
            LeftRingProximal,
            LeftRingIntermediate,
            LeftRingDistal,
            LeftLittleProximal,
            LeftLittleIntermediate,
            LeftLittleDistal,
            RightThumbMetacarpal,
            RightThumbProximal,
            RightThumbDistal,
            RightIndexProximal,
            RightIndexIntermediate,
            RightIndexDistal,
            RightMiddleProximal,
            RightMiddleIntermediate,
            RightMiddleDistal,
            RightRingProximal,
            RightRingIntermediate,
            RightRingDistal,
            RightLittleProximal,
            RightLittleIntermediate,
            RightLittleDistal,
        ]
    };
}

// ============================================================================
// 人形骨骼映射
// ============================================================================

/// 人形关节 → 骨骼索引的定长映射
#[derive(Clone, Debug)]
pub struct HumanoidMap {
    map: [Option<BoneId>; HumanoidBone::COUNT],
}

impl Default for HumanoidMap {
    fn default() -> Self {
        Self {
            map: [None; HumanoidBone::COUNT],
        }
    }
}

impl HumanoidMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 (规范名称, 骨骼索引) 序列构建
    ///
    /// 未知名称仅记录警告并跳过，不视为错误。
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = (&'a str, BoneId)>) -> Self {
        let mut map = Self::new();
        for (name, id) in entries {
            match HumanoidBone::from_name(name) {
                Some(bone) => map.set(bone, id),
                None => log::warn!("[Humanoid] 未知的人形骨骼名称 '{}'，已跳过", name),
            }
        }
        map
    }

    #[inline]
    pub fn get(&self, bone: HumanoidBone) -> Option<BoneId> {
        self.map[bone.index()]
    }

    #[inline]
    pub fn set(&mut self, bone: HumanoidBone, id: BoneId) {
        self.map[bone.index()] = Some(id);
    }

    /// 已映射的关节数量
    pub fn mapped_count(&self) -> usize {
        self.map.iter().filter(|m| m.is_some()).count()
    }

    /// 校验必需骨骼是否齐全
    pub fn validate_required(&self) -> Result<()> {
        for bone in HumanoidBone::REQUIRED {
            if self.get(bone).is_none() {
                return Err(VrmError::MissingRequiredBone(bone.name()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_round_trip() {
        for bone in HumanoidBone::ALL {
            assert_eq!(HumanoidBone::from_name(bone.name()), Some(bone));
        }
        assert_eq!(HumanoidBone::from_name("tail"), None);
    }

    #[test]
    fn all_indices_are_dense() {
        for (i, bone) in HumanoidBone::ALL.iter().enumerate() {
            assert_eq!(bone.index(), i);
        }
    }

    #[test]
    fn unknown_names_are_skipped() {
        let map = HumanoidMap::from_entries([("hips", 0), ("notABone", 1), ("head", 2)]);
        assert_eq!(map.get(HumanoidBone::Hips), Some(0));
        assert_eq!(map.get(HumanoidBone::Head), Some(2));
        assert_eq!(map.mapped_count(), 2);
    }

    #[test]
    fn required_validation() {
        let mut map = HumanoidMap::new();
        map.set(HumanoidBone::Hips, 0);
        map.set(HumanoidBone::Spine, 1);
        assert!(matches!(
            map.validate_required(),
            Err(VrmError::MissingRequiredBone("head"))
        ));
        map.set(HumanoidBone::Head, 2);
        assert!(map.validate_required().is_ok());
    }
}
