//! 弹簧骨骼碰撞体
//!
//! 碰撞体挂在骨骼上，世界空间形状每帧从骨骼当前变换重算一次，
//! 缓存放在独立 arena 中，对链条解算只读。

use glam::Vec3;

use crate::skeleton::{BoneId, BoneSet};

/// 碰撞体形状（骨骼局部空间）
#[derive(Clone, Copy, Debug)]
pub enum ColliderShape {
    Sphere {
        offset: Vec3,
        radius: f32,
    },
    Capsule {
        offset: Vec3,
        tail: Vec3,
        radius: f32,
    },
}

/// 挂在骨骼上的碰撞体
#[derive(Clone, Copy, Debug)]
pub struct SpringCollider {
    pub bone: BoneId,
    pub shape: ColliderShape,
}

/// 世界空间碰撞体缓存（每帧重算）
#[derive(Clone, Copy, Debug)]
pub(crate) enum ColliderCache {
    Sphere {
        center: Vec3,
        radius: f32,
    },
    Capsule {
        head: Vec3,
        tail: Vec3,
        radius: f32,
    },
}

impl ColliderCache {
    /// 零值占位（骨骼缺失时使用，不会产生碰撞）
    pub(crate) const EMPTY: ColliderCache = ColliderCache::Sphere {
        center: Vec3::ZERO,
        radius: -1.0e3,
    };

    /// 从骨骼当前世界变换重算
    pub(crate) fn from_collider(collider: &SpringCollider, bones: &BoneSet) -> ColliderCache {
        let bone = match bones.get(collider.bone) {
            Some(b) => b,
            None => return ColliderCache::EMPTY,
        };
        let m = bone.local_to_world;
        match collider.shape {
            ColliderShape::Sphere { offset, radius } => ColliderCache::Sphere {
                center: m.transform_point3(offset),
                radius,
            },
            ColliderShape::Capsule {
                offset,
                tail,
                radius,
            } => ColliderCache::Capsule {
                head: m.transform_point3(offset),
                tail: m.transform_point3(tail),
                radius,
            },
        }
    }

    /// 穿透检测
    ///
    /// point 以 point_radius 为半径。穿透时返回 (分离法线, 穿透深度)，
    /// 未穿透返回 None。胶囊先把点投影到线段 head→tail 上再按球处理。
    pub(crate) fn resolve(&self, point: Vec3, point_radius: f32) -> Option<(Vec3, f32)> {
        let (center, radius) = match *self {
            ColliderCache::Sphere { center, radius } => (center, radius),
            ColliderCache::Capsule { head, tail, radius } => {
                let axis = tail - head;
                let len_sq = axis.length_squared();
                let center = if len_sq < 1e-10 {
                    head
                } else {
                    let t = ((point - head).dot(axis) / len_sq).clamp(0.0, 1.0);
                    head + axis * t
                };
                (center, radius)
            }
        };

        let delta = point - center;
        let distance = delta.length() - (radius + point_radius);
        if distance >= 0.0 {
            return None;
        }

        // 点与中心重合时退化，任选一个方向推出
        let normal = delta.normalize_or_zero();
        let normal = if normal.length_squared() < 1e-10 {
            Vec3::Y
        } else {
            normal
        };
        Some((normal, -distance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sphere_pushes_out_penetrating_point() {
        let cache = ColliderCache::Sphere {
            center: Vec3::ZERO,
            radius: 1.0,
        };
        let point = Vec3::new(0.5, 0.0, 0.0);
        let (normal, depth) = cache.resolve(point, 0.1).unwrap();

        let pushed = point + normal * depth;
        // 推出后恰好贴在表面
        assert!((pushed.length() - 1.1).abs() < 1e-5);
    }

    #[test]
    fn resolution_is_idempotent_outside() {
        let cache = ColliderCache::Sphere {
            center: Vec3::ZERO,
            radius: 1.0,
        };
        // 已在表面外的点不再被移动
        assert!(cache.resolve(Vec3::new(1.2, 0.0, 0.0), 0.1).is_none());

        // 推出后的点再检一次也不动
        let point = Vec3::new(0.5, 0.0, 0.0);
        let (normal, depth) = cache.resolve(point, 0.1).unwrap();
        let pushed = point + normal * depth;
        assert!(cache.resolve(pushed, 0.1).is_none());
    }

    #[test]
    fn capsule_projects_onto_segment() {
        let cache = ColliderCache::Capsule {
            head: Vec3::new(0.0, 0.0, 0.0),
            tail: Vec3::new(0.0, 2.0, 0.0),
            radius: 0.5,
        };

        // 线段中段侧面
        let (normal, depth) = cache.resolve(Vec3::new(0.3, 1.0, 0.0), 0.0).unwrap();
        assert!((normal - Vec3::X).length() < 1e-5);
        assert!((depth - 0.2).abs() < 1e-5);

        // 超出 tail 端，按端点球处理
        let (normal, _) = cache.resolve(Vec3::new(0.0, 2.3, 0.0), 0.0).unwrap();
        assert!((normal - Vec3::Y).length() < 1e-5);

        // 远处不碰
        assert!(cache.resolve(Vec3::new(3.0, 1.0, 0.0), 0.0).is_none());
    }

    #[test]
    fn degenerate_center_overlap_still_separates() {
        let cache = ColliderCache::Sphere {
            center: Vec3::ZERO,
            radius: 1.0,
        };
        let (normal, depth) = cache.resolve(Vec3::ZERO, 0.0).unwrap();
        assert!(normal.is_normalized());
        assert!((depth - 1.0).abs() < 1e-6);
    }
}
