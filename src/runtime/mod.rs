//! 运行时组件 - 生命周期与每帧解算管线
//!
//! 生命周期状态机：
//!
//! ```text
//! Uninitialized --start--> Started --activate--> Active
//!                                        |          |
//!                                   deactivate  deactivate
//!                                        v          v
//!                                     Inactive <----+
//!                                        |
//!                   （任意状态）--destroy--> Destroyed
//! ```
//!
//! update(dt) 只在 Active 下解算；Started / Inactive 下静默跳过，
//! Uninitialized / Destroyed 下返回 InvalidState。
//!
//! 每帧管线顺序固定：节点约束 → 视线 → 双关节 IK → 弹簧骨骼。
//! 弹簧骨骼最后跑，保证它读到的父骨骼姿态是本帧最终姿态。

use glam::Vec3;

use crate::constraint::{self, NodeConstraint};
use crate::humanoid::{HumanoidBone, HumanoidMap};
use crate::loader::VrmModel;
use crate::lookat::LookAtResolver;
use crate::skeleton::{BoneRole, BoneSet, TwoJointIk};
use crate::springbone::SpringBoneWorld;
use crate::{Result, VrmError};

/// 生命周期状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    /// 已创建，骨架与元数据未装配
    Uninitialized,
    /// 已装配，尚未进入解算
    Started,
    /// 每帧解算中
    Active,
    /// 暂停解算，保留全部状态
    Inactive,
    /// 已销毁，任何操作均为错误
    Destroyed,
}

impl LifecycleState {
    pub fn name(self) -> &'static str {
        match self {
            LifecycleState::Uninitialized => "Uninitialized",
            LifecycleState::Started => "Started",
            LifecycleState::Active => "Active",
            LifecycleState::Inactive => "Inactive",
            LifecycleState::Destroyed => "Destroyed",
        }
    }
}

/// IK 通道：解算器 + 目标
struct IkChannel {
    solver: TwoJointIk,
    target: Option<Vec3>,
    pole: Option<Vec3>,
}

/// VRM 运行时组件
///
/// 持有骨架与全部解算器，每帧调用一次 update(dt)。
/// 动画系统写入局部旋转后再调用 update，管线在其上叠加解算结果。
pub struct VrmRuntime {
    state: LifecycleState,
    bones: BoneSet,
    humanoid: HumanoidMap,
    constraints: Vec<NodeConstraint>,
    look_at: LookAtResolver,
    springs: SpringBoneWorld,
    ik_channels: Vec<IkChannel>,
}

impl VrmRuntime {
    /// 从加载完成的模型创建运行时（状态 Uninitialized）
    pub fn new(model: VrmModel) -> Self {
        let mut springs = SpringBoneWorld::new();
        for collider in &model.colliders {
            springs.add_collider(*collider);
        }
        for chain in model.springs {
            springs.add_chain(chain);
        }

        Self {
            state: LifecycleState::Uninitialized,
            bones: model.bone_set,
            humanoid: model.humanoid,
            constraints: model.constraints,
            look_at: LookAtResolver::new(model.look_at),
            springs,
            ik_channels: Vec::new(),
        }
    }

    #[inline]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    #[inline]
    pub fn bones(&self) -> &BoneSet {
        &self.bones
    }

    #[inline]
    pub fn bones_mut(&mut self) -> &mut BoneSet {
        &mut self.bones
    }

    #[inline]
    pub fn humanoid(&self) -> &HumanoidMap {
        &self.humanoid
    }

    fn invalid(&self, op: &'static str) -> VrmError {
        VrmError::InvalidState {
            current: self.state.name(),
            op,
        }
    }

    // ------------------------------------------------------------------
    // 生命周期
    // ------------------------------------------------------------------

    /// 装配：校验必需人形骨骼，初始化弹簧模拟
    ///
    /// 只能从 Uninitialized 调用一次。
    pub fn start(&mut self) -> Result<()> {
        if self.state != LifecycleState::Uninitialized {
            return Err(self.invalid("start"));
        }

        self.humanoid.validate_required()?;
        constraint::validate_order(&self.constraints);
        self.mark_bone_roles();
        self.springs.initialize(&mut self.bones)?;

        self.state = LifecycleState::Started;
        log::info!(
            "[Runtime] 组件装配完成: {} 骨骼, {} 约束, {} 弹簧关节, {} IK 通道",
            self.bones.len(),
            self.constraints.len(),
            self.springs.joint_count(),
            self.ik_channels.len()
        );
        Ok(())
    }

    /// 给约束端点和眼骨打角色标志（弹簧相关标志由模拟器自己打）
    fn mark_bone_roles(&mut self) {
        for constraint in &self.constraints {
            if let Some(node) = self.bones.get_mut(constraint.source) {
                node.roles |= BoneRole::CONSTRAINT_SOURCE;
            }
            if let Some(node) = self.bones.get_mut(constraint.destination) {
                node.roles |= BoneRole::CONSTRAINT_DESTINATION;
            }
        }
        for eye in [HumanoidBone::LeftEye, HumanoidBone::RightEye] {
            if let Some(id) = self.humanoid.get(eye) {
                if let Some(node) = self.bones.get_mut(id) {
                    node.roles |= BoneRole::EYE;
                }
            }
        }
    }

    /// 进入解算。重复调用为 no-op。
    ///
    /// 从 Inactive 恢复时弹簧状态重新贴合当前姿态，避免跳变。
    pub fn activate(&mut self) -> Result<()> {
        match self.state {
            LifecycleState::Active => Ok(()),
            LifecycleState::Started | LifecycleState::Inactive => {
                self.springs.reset_states(&self.bones);
                self.state = LifecycleState::Active;
                Ok(())
            }
            _ => Err(self.invalid("activate")),
        }
    }

    /// 暂停解算，保留全部状态。重复调用为 no-op。
    pub fn deactivate(&mut self) -> Result<()> {
        match self.state {
            LifecycleState::Inactive => Ok(()),
            LifecycleState::Started | LifecycleState::Active => {
                self.state = LifecycleState::Inactive;
                Ok(())
            }
            _ => Err(self.invalid("deactivate")),
        }
    }

    /// 销毁。从任意状态可达，幂等。
    pub fn destroy(&mut self) {
        self.state = LifecycleState::Destroyed;
    }

    // ------------------------------------------------------------------
    // 目标输入
    // ------------------------------------------------------------------

    /// 设置视线目标（世界空间，None 停止追踪）
    #[inline]
    pub fn set_look_at_target(&mut self, target: Option<Vec3>) {
        self.look_at.set_target(target);
    }

    /// 注册 IK 通道，返回通道索引
    pub fn add_ik(&mut self, solver: TwoJointIk) -> usize {
        self.ik_channels.push(IkChannel {
            solver,
            target: None,
            pole: None,
        });
        self.ik_channels.len() - 1
    }

    /// 设置 IK 目标（None 停用该通道）
    pub fn set_ik_target(&mut self, channel: usize, target: Option<Vec3>, pole: Option<Vec3>) {
        if let Some(entry) = self.ik_channels.get_mut(channel) {
            entry.target = target;
            entry.pole = pole;
        } else {
            log::warn!("[Runtime] IK 通道 {} 不存在", channel);
        }
    }

    /// IK 通道数量
    #[inline]
    pub fn ik_channel_count(&self) -> usize {
        self.ik_channels.len()
    }

    // ------------------------------------------------------------------
    // 每帧解算
    // ------------------------------------------------------------------

    /// 解算一帧
    ///
    /// Active 下按固定顺序跑完整管线；Started / Inactive 下跳过；
    /// Uninitialized / Destroyed 下返回 InvalidState。
    pub fn update(&mut self, dt: f32) -> Result<()> {
        match self.state {
            LifecycleState::Active => {}
            LifecycleState::Started | LifecycleState::Inactive => return Ok(()),
            _ => return Err(self.invalid("update")),
        }

        // 动画系统可能只写了局部旋转，先整体刷新一次
        self.bones.update_world_transforms();

        constraint::apply_all(&mut self.bones, &self.constraints);
        self.look_at.resolve(&mut self.bones, &self.humanoid);
        for channel in &self.ik_channels {
            if let Some(target) = channel.target {
                channel.solver.solve(&mut self.bones, target, channel.pole);
            }
        }
        self.springs.update(&mut self.bones, dt);

        Ok(())
    }

    /// 恢复 rest pose 并让弹簧状态贴合
    pub fn reset_to_rest(&mut self) {
        self.bones.reset_to_rest();
        self.springs.reset_states(&self.bones);
    }
}
