//! 双关节 IK - 余弦定理闭式求解
//!
//! 针对 root-middle-end 三点链的单遍直接解，不迭代。
//! 每帧从缓存的 rest pose 重新求解，避免增量误差漂移。
//! 可选 pole 目标用于消除弯曲轴方向的歧义（如保持膝盖朝前）。

use glam::{Quat, Vec3};

use crate::{Result, VrmError};

use super::{BoneId, BoneSet};

/// 可达距离钳制的最小余量
const REACH_EPS: f32 = 1.0e-4;

/// 双关节 IK 求解器
#[derive(Clone, Debug)]
pub struct TwoJointIk {
    /// 根关节（如大腿/上臂）
    pub root: BoneId,
    /// 中间关节（如膝盖/手肘）
    pub middle: BoneId,
    /// 末端关节（如脚踝/手腕）
    pub end: BoneId,
    /// rest pose 局部旋转缓存（创建时捕获）
    rest_root_rotation: Quat,
    rest_middle_rotation: Quat,
}

impl TwoJointIk {
    /// 创建求解器并捕获 rest pose
    ///
    /// 要求 end 的父链经过 middle，middle 的父链经过 root。
    pub fn new(bones: &BoneSet, root: BoneId, middle: BoneId, end: BoneId) -> Result<Self> {
        if !Self::is_ancestor(bones, middle, end) || !Self::is_ancestor(bones, root, middle) {
            return Err(VrmError::InvalidHierarchy(format!(
                "two-joint ik chain {}-{}-{} is not a parent chain",
                root, middle, end
            )));
        }

        let rest_root_rotation = bones
            .get(root)
            .map(|b| b.rest_rotation)
            .ok_or_else(|| VrmError::InvalidHierarchy(format!("unknown bone {}", root)))?;
        let rest_middle_rotation = bones
            .get(middle)
            .map(|b| b.rest_rotation)
            .ok_or_else(|| VrmError::InvalidHierarchy(format!("unknown bone {}", middle)))?;

        Ok(Self {
            root,
            middle,
            end,
            rest_root_rotation,
            rest_middle_rotation,
        })
    }

    fn is_ancestor(bones: &BoneSet, ancestor: BoneId, mut node: BoneId) -> bool {
        while let Some(bone) = bones.get(node) {
            match bone.parent_id() {
                Some(p) if p == ancestor => return true,
                Some(p) => node = p,
                None => return false,
            }
        }
        false
    }

    /// 求解并写入 root/middle 的局部旋转
    ///
    /// target 为世界空间目标点，pole 为可选的世界空间弯曲提示点。
    pub fn solve(&self, bones: &mut BoneSet, target: Vec3, pole: Option<Vec3>) {
        // 从 rest pose 重新开始，消除漂移
        bones.set_local_rotation(self.root, self.rest_root_rotation);
        bones.set_local_rotation(self.middle, self.rest_middle_rotation);
        bones.update_subtree(self.root);

        let (a, b, c) = match (
            bones.get(self.root),
            bones.get(self.middle),
            bones.get(self.end),
        ) {
            (Some(ra), Some(rb), Some(rc)) => (
                ra.position_world(),
                rb.position_world(),
                rc.position_world(),
            ),
            _ => return,
        };

        let lab = (b - a).length();
        let lcb = (c - b).length();
        if lab < REACH_EPS || lcb < REACH_EPS {
            return;
        }

        // 目标距离钳制在 [eps, lab+lcb-eps] 内
        let lat = (target - a).length().clamp(REACH_EPS, lab + lcb - REACH_EPS);

        // 当前与目标三角形的内角
        let ac_ab_0 = angle_between(c - a, b - a);
        let ba_bc_0 = angle_between(a - b, c - b);
        let ac_at_0 = angle_between(c - a, target - a);

        let ac_ab_1 =
            (((lcb * lcb - lab * lab - lat * lat) / (-2.0 * lab * lat)).clamp(-1.0, 1.0)).acos();
        let ba_bc_1 =
            (((lat * lat - lab * lab - lcb * lcb) / (-2.0 * lab * lcb)).clamp(-1.0, 1.0)).acos();

        // 弯曲轴：当前链平面的法线；链共线时退化，用目标平面或任意垂直轴兜底
        let mut axis0 = (c - a).cross(b - a).normalize_or_zero();
        if axis0.length_squared() < 1e-10 {
            axis0 = (c - a).cross(target - a).normalize_or_zero();
        }
        if axis0.length_squared() < 1e-10 {
            axis0 = any_perpendicular(c - a);
        }
        let axis1 = {
            let v = (c - a).cross(target - a).normalize_or_zero();
            if v.length_squared() < 1e-10 {
                axis0
            } else {
                v
            }
        };

        let a_gr = match bones.get(self.root) {
            Some(bone) => bone.rotation_world(),
            None => return,
        };
        let b_gr = match bones.get(self.middle) {
            Some(bone) => bone.rotation_world(),
            None => return,
        };

        // 轴转换到各关节局部空间后以局部旋转增量组合
        let r0 = Quat::from_axis_angle(a_gr.inverse() * axis0, ac_ab_1 - ac_ab_0);
        let r1 = Quat::from_axis_angle(b_gr.inverse() * axis0, ba_bc_1 - ba_bc_0);
        let r2 = Quat::from_axis_angle(a_gr.inverse() * axis1, ac_at_0);

        // 世界空间顺序：先绕 axis0 弯曲把 |a-c| 调到 lat，再绕 axis1
        // 把链整体摆向目标；局部组合因此是 r2 在前
        let root_local = self.rest_root_rotation * r2 * r0;
        let middle_local = self.rest_middle_rotation * r1;
        bones.set_local_rotation(self.root, root_local);
        bones.set_local_rotation(self.middle, middle_local);
        bones.update_subtree(self.root);

        if let Some(pole) = pole {
            self.apply_pole(bones, target, pole);
        }
    }

    /// 绕 root→target 轴扭转整条链，使中间关节落在 pole 所在半平面
    fn apply_pole(&self, bones: &mut BoneSet, target: Vec3, pole: Vec3) {
        let (a, b) = match (bones.get(self.root), bones.get(self.middle)) {
            (Some(ra), Some(rb)) => (ra.position_world(), rb.position_world()),
            _ => return,
        };

        let n = (target - a).normalize_or_zero();
        if n.length_squared() < 1e-10 {
            return;
        }

        let bend = reject(b - a, n);
        let want = reject(pole - a, n);
        if bend.length_squared() < 1e-10 || want.length_squared() < 1e-10 {
            return;
        }

        let angle = bend.cross(want).dot(n).atan2(bend.dot(want));
        if angle.abs() < 1e-6 {
            return;
        }

        if let Some(root) = bones.get(self.root) {
            let a_gr = root.rotation_world();
            let twist = Quat::from_axis_angle(a_gr.inverse() * n, angle);
            let local = root.local_rotation * twist;
            bones.set_local_rotation(self.root, local);
            bones.update_subtree(self.root);
        }
    }
}

/// 两向量夹角（输入退化时返回 0）
fn angle_between(u: Vec3, v: Vec3) -> f32 {
    let nu = u.normalize_or_zero();
    let nv = v.normalize_or_zero();
    if nu.length_squared() < 1e-10 || nv.length_squared() < 1e-10 {
        return 0.0;
    }
    nu.dot(nv).clamp(-1.0, 1.0).acos()
}

/// v 去掉沿单位向量 n 的分量
fn reject(v: Vec3, n: Vec3) -> Vec3 {
    v - n * v.dot(n)
}

/// 任意一条与 v 垂直的单位向量
fn any_perpendicular(v: Vec3) -> Vec3 {
    let axis = if v.x.abs() < 0.9 { Vec3::X } else { Vec3::Y };
    v.cross(axis).normalize_or_zero()
}
