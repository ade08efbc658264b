//! vrm_engine - VRM 人形模型姿态解算运行时
//!
//! 从 glTF/GLB 容器中读取 VRMC_vrm / VRMC_node_constraint / VRMC_springBone
//! 扩展元数据，构建骨骼层级，并按帧解算：
//!
//! - 节点约束（roll / aim / rotation）
//! - 视线追踪（look-at，按左右眼非对称限幅）
//! - 弹簧骨骼（Verlet 积分 + 球/胶囊碰撞体）
//! - 双关节 IK（余弦定理闭式解）
//!
//! 解算全部发生在调用方线程的单次 `update(dt)` 内，无内部并发。

pub mod constraint;
pub mod humanoid;
pub mod loader;
pub mod lookat;
pub mod runtime;
pub mod skeleton;
pub mod springbone;

use thiserror::Error;

/// 引擎错误类型
#[derive(Debug, Error)]
pub enum VrmError {
    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// GLB 容器解析失败
    #[error("glb parse error: {0}")]
    GlbParse(String),

    /// glTF / VRM 扩展元数据无效
    #[error("vrm parse error: {0}")]
    VrmParse(String),

    /// 骨骼层级无效（父骨骼必须先于子骨骼）
    #[error("invalid bone hierarchy: {0}")]
    InvalidHierarchy(String),

    /// 缺少必需的人形骨骼
    #[error("missing required humanoid bone: {0}")]
    MissingRequiredBone(&'static str),

    /// 骨架已构建，禁止重复构建
    #[error("bone set already built")]
    AlreadyBuilt,

    /// 生命周期状态非法
    #[error("invalid lifecycle transition: {op} while {current}")]
    InvalidState {
        current: &'static str,
        op: &'static str,
    },
}

/// 引擎 Result 别名
pub type Result<T> = std::result::Result<T, VrmError>;

pub use constraint::{ConstraintKind, NodeConstraint};
pub use humanoid::{HumanoidBone, HumanoidMap};
pub use loader::VrmModel;
pub use lookat::{LookAtConfig, LookAtResolver, RangeMap};
pub use runtime::{LifecycleState, VrmRuntime};
pub use skeleton::{BoneId, BoneSet, BoneTransform, TwoJointIk};
pub use springbone::{ColliderShape, SpringBoneWorld, SpringChain, SpringCollider, SpringJointParams};
