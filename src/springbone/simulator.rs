//! 弹簧骨骼模拟器 - Verlet 式逐关节积分
//!
//! 每个关节维护 (prevTail, currentTail)，每帧按
//! 惯性 → 刚性力 → 外力 → 骨长约束 → 碰撞解算 → 旋转推导
//! 的顺序演化到 nextTail，并把尾端方向写回骨骼局部旋转。
//! 流程：add_collider/add_chain → initialize → 每帧 update。

use glam::{Mat4, Quat, Vec3};

use crate::skeleton::{BoneRole, BoneSet};
use crate::{Result, VrmError};

use super::chain::{SpringChain, SpringJointState};
use super::collider::{ColliderCache, SpringCollider};
use super::config::get_config;

/// 链条运行时：静态描述 + 模拟状态 arena
#[derive(Clone, Debug)]
struct ChainRuntime {
    chain: SpringChain,
    joints: Vec<SpringJointState>,
}

/// 弹簧骨骼世界
///
/// 碰撞体缓存与关节状态都放在独立 arena 中，按索引访问，
/// 不在骨骼节点上挂任何模拟数据。
#[derive(Clone, Debug, Default)]
pub struct SpringBoneWorld {
    colliders: Vec<SpringCollider>,
    /// 世界空间碰撞体缓存（与 colliders 同索引，每帧重算）
    collider_cache: Vec<ColliderCache>,
    chains: Vec<ChainRuntime>,
    initialized: bool,
}

impl SpringBoneWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册碰撞体，返回其 arena 索引
    pub fn add_collider(&mut self, collider: SpringCollider) -> usize {
        let idx = self.colliders.len();
        self.colliders.push(collider);
        self.collider_cache.push(ColliderCache::EMPTY);
        idx
    }

    /// 注册弹簧链（initialize 前调用）
    pub fn add_chain(&mut self, chain: SpringChain) {
        self.chains.push(ChainRuntime {
            chain,
            joints: Vec::new(),
        });
    }

    /// 碰撞体数量
    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }

    /// 链条数量
    pub fn chain_count(&self) -> usize {
        self.chains.len()
    }

    /// 模拟关节总数（initialize 之后有效）
    pub fn joint_count(&self) -> usize {
        self.chains.iter().map(|c| c.joints.len()).sum()
    }

    /// 建立全部关节模拟状态（骨架须已 build 且处于 rest pose）
    ///
    /// 只允许调用一次；非父子相邻的关节对、越界的碰撞体索引
    /// 记录警告并跳过。
    pub fn initialize(&mut self, bones: &mut BoneSet) -> Result<()> {
        if self.initialized {
            return Err(VrmError::AlreadyBuilt);
        }
        let config = get_config();

        for runtime in &mut self.chains {
            let world_to_center = center_to_world(&runtime.chain, bones).inverse();

            runtime.chain.colliders.retain(|&idx| {
                let ok = idx < self.colliders.len();
                if !ok {
                    log::warn!(
                        "[SpringBone] 链 '{}' 引用了越界碰撞体 #{}，已跳过",
                        runtime.chain.name,
                        idx
                    );
                }
                ok
            });

            for pair in runtime.chain.joints.windows(2) {
                let (bone, params) = pair[0];
                let (child, _) = pair[1];

                let is_child = bones
                    .get(child)
                    .and_then(|c| c.parent_id())
                    .map_or(false, |p| p == bone);
                if !is_child {
                    log::warn!(
                        "[SpringBone] 链 '{}' 中 {} 与 {} 不是父子关节，已跳过",
                        runtime.chain.name,
                        bone,
                        child
                    );
                    continue;
                }

                match SpringJointState::capture(
                    bones,
                    bone,
                    child,
                    params,
                    config.bone_length_floor,
                    world_to_center,
                ) {
                    Some(state) => {
                        if let Some(node) = bones.get_mut(bone) {
                            node.roles |= BoneRole::SPRING_DRIVEN;
                        }
                        runtime.joints.push(state);
                    }
                    None => log::warn!(
                        "[SpringBone] 链 '{}' 中关节 {} 无效，已跳过",
                        runtime.chain.name,
                        bone
                    ),
                }
            }
        }

        for collider in &self.colliders {
            if let Some(node) = bones.get_mut(collider.bone) {
                node.roles |= BoneRole::COLLIDER_HOST;
            }
        }

        self.initialized = true;
        log::info!(
            "[SpringBone] 模拟构建完成: {} 链, {} 关节, {} 碰撞体",
            self.chains.len(),
            self.joint_count(),
            self.colliders.len()
        );
        Ok(())
    }

    /// 把全部尾端状态重置到当前姿态（消除历史速度）
    pub fn reset_states(&mut self, bones: &BoneSet) {
        for runtime in &mut self.chains {
            let world_to_center = center_to_world(&runtime.chain, bones).inverse();
            for state in &mut runtime.joints {
                // 尾端即该关节记录的子骨骼的世界位置
                if let Some(node) = bones.get(state.child) {
                    let tail = world_to_center.transform_point3(node.position_world());
                    state.prev_tail = tail;
                    state.current_tail = tail;
                }
            }
        }
    }

    /// 步进一帧
    ///
    /// dt 非法（NaN / 非正）时整帧跳过；超过 max_delta_time 时截断。
    pub fn update(&mut self, bones: &mut BoneSet, dt: f32) {
        if !self.initialized || !dt.is_finite() || dt <= 0.0 {
            return;
        }
        let config = get_config();
        let dt = dt.min(config.max_delta_time);
        if config.debug_log {
            log::debug!(
                "[SpringBone] 步进: dt={:.4}s, {} 链, {} 关节",
                dt,
                self.chain_count(),
                self.joint_count()
            );
        }

        // 碰撞体世界缓存每帧重算一次
        for (cache, collider) in self.collider_cache.iter_mut().zip(&self.colliders) {
            *cache = ColliderCache::from_collider(collider, bones);
        }

        for runtime in &mut self.chains {
            let center_to_world = center_to_world(&runtime.chain, bones);
            let world_to_center = center_to_world.inverse();

            for state in &mut runtime.joints {
                step_joint(
                    bones,
                    state,
                    &runtime.chain.colliders,
                    &self.collider_cache,
                    center_to_world,
                    world_to_center,
                    dt,
                    &config,
                );
            }
        }
    }
}

/// center 骨骼的当前世界变换（未指定时为单位矩阵）
fn center_to_world(chain: &SpringChain, bones: &BoneSet) -> Mat4 {
    chain
        .center
        .and_then(|id| bones.get(id))
        .map(|b| b.local_to_world)
        .unwrap_or(Mat4::IDENTITY)
}

/// 单关节积分步
#[allow(clippy::too_many_arguments)]
fn step_joint(
    bones: &mut BoneSet,
    state: &mut SpringJointState,
    collider_indices: &[usize],
    collider_cache: &[ColliderCache],
    center_to_world: Mat4,
    world_to_center: Mat4,
    dt: f32,
    config: &super::config::SimulationConfig,
) {
    let (world_pos, parent_rot, parent_to_world) = match bones.get(state.bone) {
        Some(node) => (
            node.position_world(),
            node.parent_rotation_world(),
            node.parent_to_world,
        ),
        None => return,
    };

    let current_tail = center_to_world.transform_point3(state.current_tail);
    let prev_tail = center_to_world.transform_point3(state.prev_tail);

    // 1. 惯性（阻力衰减，center 空间保持根部移动稳定）
    let inertia = (current_tail - prev_tail) * (1.0 - state.params.drag_force);

    // 2. 刚性力：骨轴在 rest 姿态下的世界方向
    let rest_dir = (parent_rot * state.initial_local_rotation) * state.bone_axis;
    let stiffness = rest_dir * state.params.stiffness * config.stiffness_scale * dt;

    // 3. 外力
    let external =
        state.params.gravity_dir * state.params.gravity_power * config.gravity_scale * dt;

    let mut next_tail = current_tail + inertia + stiffness + external;

    // 4. 骨长约束（球面投影）
    next_tail = constrain_length(world_pos, next_tail, state.bone_length, rest_dir);

    // 5. 碰撞解算，每次推出后重新施加骨长约束
    if config.collision_enabled {
        for &idx in collider_indices {
            let cache = match collider_cache.get(idx) {
                Some(c) => c,
                None => continue,
            };
            if let Some((normal, depth)) = cache.resolve(next_tail, state.params.hit_radius) {
                next_tail += normal * depth;
                next_tail = constrain_length(world_pos, next_tail, state.bone_length, rest_dir);
            }
        }
    }

    // 6. 旋转推导：尾端转入 rest 局部空间，与骨轴求 from-to 旋转
    let to_rest_local = (parent_to_world * state.initial_local_matrix).inverse();
    let to = to_rest_local.transform_point3(next_tail).normalize_or_zero();
    if to.length_squared() > 1e-10 {
        let rotation = state.initial_local_rotation * Quat::from_rotation_arc(state.bone_axis, to);
        bones.set_local_rotation(state.bone, rotation);
        bones.update_subtree(state.bone);
    }

    // 7. 状态推进
    state.prev_tail = world_to_center.transform_point3(current_tail);
    state.current_tail = world_to_center.transform_point3(next_tail);
}

/// 把 tail 投影回以 world_pos 为球心、bone_length 为半径的球面
fn constrain_length(world_pos: Vec3, tail: Vec3, bone_length: f32, fallback_dir: Vec3) -> Vec3 {
    let dir = (tail - world_pos).normalize_or_zero();
    let dir = if dir.length_squared() < 1e-10 {
        // 尾端与关节重合时沿 rest 方向摆出
        fallback_dir.normalize_or_zero()
    } else {
        dir
    };
    world_pos + dir * bone_length
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::springbone::{ColliderShape, SpringChain, SpringCollider, SpringJointParams};
    use glam::{Quat, Vec3};

    fn pendulum_params(stiffness: f32, drag: f32, gravity: f32) -> SpringJointParams {
        SpringJointParams {
            stiffness,
            drag_force: drag,
            gravity_dir: Vec3::NEG_Y,
            gravity_power: gravity,
            hit_radius: 0.02,
        }
    }

    /// root → j0 → j1 的垂链，j0 被模拟
    fn build_world(params: SpringJointParams) -> (BoneSet, SpringBoneWorld, usize, usize) {
        let mut set = BoneSet::new();
        let root = set
            .add_bone("root", None, Vec3::new(0.0, 2.0, 0.0), Quat::IDENTITY)
            .unwrap();
        let j0 = set
            .add_bone("j0", Some(root), Vec3::new(0.0, -0.5, 0.0), Quat::IDENTITY)
            .unwrap();
        let j1 = set
            .add_bone("j1", Some(j0), Vec3::new(0.0, -0.5, 0.0), Quat::IDENTITY)
            .unwrap();
        set.build().unwrap();

        let mut world = SpringBoneWorld::new();
        world.add_chain(SpringChain {
            name: "test".into(),
            joints: vec![(j0, params), (j1, params)],
            colliders: vec![],
            center: None,
        });
        world.initialize(&mut set).unwrap();
        (set, world, j0, j1)
    }

    #[test]
    fn bone_length_holds_after_each_step() {
        let (mut set, mut world, j0, j1) = build_world(pendulum_params(1.0, 0.3, 2.0));

        for step in 0..120 {
            // 根部来回晃动，制造惯性
            let root = set.find_bone_by_name("root").unwrap();
            let sway = (step as f32 * 0.21).sin() * 0.3;
            set.set_local_translation(root, Vec3::new(sway, 2.0, 0.0));
            set.update_world_transforms();
            world.update(&mut set, 1.0 / 60.0);

            let p0 = set.get(j0).unwrap().position_world();
            let p1 = set.get(j1).unwrap().position_world();
            assert!(
                ((p1 - p0).length() - 0.5).abs() < 1e-4,
                "length violated at step {}",
                step
            );
        }
    }

    #[test]
    fn zero_forces_converge_to_fixed_point() {
        let (mut set, mut world, j0, j1) = build_world(pendulum_params(0.0, 0.0, 0.0));

        for _ in 0..200 {
            world.update(&mut set, 1.0 / 60.0);
        }

        let p0 = set.get(j0).unwrap().position_world();
        let p1 = set.get(j1).unwrap().position_world();
        // 尾端停在距关节恰好一个骨长处
        assert!(((p1 - p0).length() - 0.5).abs() < 1e-4);
    }

    #[test]
    fn gravity_swings_chain_sideways_then_length_recovers() {
        let (mut set, mut world, j0, j1) = build_world(SpringJointParams {
            stiffness: 0.0,
            drag_force: 0.3,
            gravity_dir: Vec3::X,
            gravity_power: 5.0,
            hit_radius: 0.0,
        });

        for _ in 0..120 {
            world.update(&mut set, 1.0 / 60.0);
        }

        let p0 = set.get(j0).unwrap().position_world();
        let p1 = set.get(j1).unwrap().position_world();
        // 沿 +X 的"重力"把尾端吹向侧面
        assert!(p1.x > p0.x + 0.3);
        assert!(((p1 - p0).length() - 0.5).abs() < 1e-4);
    }

    #[test]
    fn stiffness_restores_rest_direction() {
        let (mut set, mut world, j0, j1) = build_world(pendulum_params(30.0, 0.7, 0.0));

        // 把链条打歪后重置尾端状态，刚性力应把它拉回 rest 方向
        set.set_local_rotation(j0, Quat::from_rotation_z(0.8));
        set.update_world_transforms();
        world.reset_states(&set);

        for _ in 0..600 {
            world.update(&mut set, 1.0 / 60.0);
        }

        let p0 = set.get(j0).unwrap().position_world();
        let p1 = set.get(j1).unwrap().position_world();
        let dir = (p1 - p0).normalize();
        // 高刚性下回到 rest 方向（-Y）
        assert!(dir.dot(Vec3::NEG_Y) > 0.99);
    }

    #[test]
    fn collider_keeps_tail_outside() {
        let mut set = BoneSet::new();
        let root = set
            .add_bone("root", None, Vec3::new(0.0, 2.0, 0.0), Quat::IDENTITY)
            .unwrap();
        let j0 = set
            .add_bone("j0", Some(root), Vec3::new(0.0, -0.5, 0.0), Quat::IDENTITY)
            .unwrap();
        let j1 = set
            .add_bone("j1", Some(j0), Vec3::new(0.0, -0.5, 0.0), Quat::IDENTITY)
            .unwrap();
        let body = set
            .add_bone("body", None, Vec3::new(0.2, 1.0, 0.0), Quat::IDENTITY)
            .unwrap();
        set.build().unwrap();

        let params = SpringJointParams {
            stiffness: 0.0,
            drag_force: 0.5,
            gravity_dir: Vec3::NEG_Y,
            gravity_power: 3.0,
            hit_radius: 0.0,
        };
        let mut world = SpringBoneWorld::new();
        // 尾端 rest 位置 (0,1,0) 在球内，必须被侧向推出
        let sphere = world.add_collider(SpringCollider {
            bone: body,
            shape: ColliderShape::Sphere {
                offset: Vec3::ZERO,
                radius: 0.3,
            },
        });
        world.add_chain(SpringChain {
            name: "hair".into(),
            joints: vec![(j0, params), (j1, params)],
            colliders: vec![sphere],
            center: None,
        });
        world.initialize(&mut set).unwrap();

        for _ in 0..240 {
            world.update(&mut set, 1.0 / 60.0);
        }

        let p1 = set.get(j1).unwrap().position_world();
        let center = set.get(body).unwrap().position_world();
        // 稳定后尾端贴着球面外侧（骨长约束回投会留极小的残余穿透）
        assert!((p1 - center).length() > 0.3 - 0.05);
        // 被推向球心的 -X 一侧
        assert!(p1.x < 0.0);
    }

    #[test]
    fn center_space_ignores_root_teleport() {
        let mut set = BoneSet::new();
        let center = set
            .add_bone("center", None, Vec3::ZERO, Quat::IDENTITY)
            .unwrap();
        let root = set
            .add_bone("root", Some(center), Vec3::new(0.0, 2.0, 0.0), Quat::IDENTITY)
            .unwrap();
        let j0 = set
            .add_bone("j0", Some(root), Vec3::new(0.0, -0.5, 0.0), Quat::IDENTITY)
            .unwrap();
        let j1 = set
            .add_bone("j1", Some(j0), Vec3::new(0.0, -0.5, 0.0), Quat::IDENTITY)
            .unwrap();
        set.build().unwrap();

        let params = pendulum_params(1.0, 0.0, 0.0);
        let mut world = SpringBoneWorld::new();
        world.add_chain(SpringChain {
            name: "tail".into(),
            joints: vec![(j0, params), (j1, params)],
            colliders: vec![],
            center: Some(center),
        });
        world.initialize(&mut set).unwrap();

        // center 整体瞬移：center 空间内尾端不产生速度，链条不甩动
        set.set_local_translation(center, Vec3::new(10.0, 0.0, 0.0));
        set.update_world_transforms();
        for _ in 0..10 {
            world.update(&mut set, 1.0 / 60.0);
        }

        let p0 = set.get(j0).unwrap().position_world();
        let p1 = set.get(j1).unwrap().position_world();
        let dir = (p1 - p0).normalize();
        assert!(dir.dot(Vec3::NEG_Y) > 0.999);
    }

    #[test]
    fn reset_holds_pose_when_chain_has_skipped_pair() {
        let mut set = BoneSet::new();
        let root = set
            .add_bone("root", None, Vec3::new(0.0, 2.0, 0.0), Quat::IDENTITY)
            .unwrap();
        // 与链条无父子关系的游离骨骼，排在链首
        let stray = set
            .add_bone("stray", None, Vec3::new(5.0, 0.0, 0.0), Quat::IDENTITY)
            .unwrap();
        let j0 = set
            .add_bone("j0", Some(root), Vec3::new(0.0, -0.5, 0.0), Quat::IDENTITY)
            .unwrap();
        let j1 = set
            .add_bone("j1", Some(j0), Vec3::new(0.0, -0.5, 0.0), Quat::IDENTITY)
            .unwrap();
        set.build().unwrap();

        let params = pendulum_params(0.0, 0.0, 0.0);
        let mut world = SpringBoneWorld::new();
        world.add_chain(SpringChain {
            name: "tail".into(),
            joints: vec![(stray, params), (j0, params), (j1, params)],
            colliders: vec![],
            center: None,
        });
        // (stray, j0) 非父子，被跳过；只剩 j0→j1 一个模拟关节
        world.initialize(&mut set).unwrap();
        assert_eq!(world.joint_count(), 1);

        // 摆出姿态后重置：尾端必须贴到 j1 当前位置，而不是链首关节
        set.set_local_rotation(j0, Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));
        set.update_world_transforms();
        world.reset_states(&set);

        let before = set.get(j1).unwrap().position_world();
        for _ in 0..10 {
            world.update(&mut set, 1.0 / 60.0);
        }
        let after = set.get(j1).unwrap().position_world();
        assert!((after - before).length() < 1e-4);
    }

    #[test]
    fn invalid_dt_is_skipped() {
        let (mut set, mut world, _, j1) = build_world(pendulum_params(1.0, 0.3, 5.0));
        let before = set.get(j1).unwrap().position_world();
        world.update(&mut set, f32::NAN);
        world.update(&mut set, -1.0);
        world.update(&mut set, 0.0);
        let after = set.get(j1).unwrap().position_world();
        assert_eq!(before, after);
    }

    #[test]
    fn reinitialize_is_rejected() {
        let (mut set, mut world, _, _) = build_world(SpringJointParams::default());
        assert!(matches!(
            world.initialize(&mut set),
            Err(crate::VrmError::AlreadyBuilt)
        ));
    }
}
