//! 弹簧骨骼 - 参考 VRMC_springBone 定义
//!
//! 核心设计思想：
//! - SpringChain: 链条静态描述（关节 + 参数 + 碰撞体引用 + center）
//! - SpringJointState: 模拟状态 arena，独立于骨骼节点存储
//! - SpringBoneWorld: 管理碰撞体缓存与链条，每帧 update 一次
//! - config: 全局模拟参数（步长截断、骨长下限等）

mod chain;
mod collider;
pub mod config;
mod simulator;

pub use chain::{SpringChain, SpringJointParams};
pub use collider::{ColliderShape, SpringCollider};
pub use config::{get_config, reset_config, set_config, SimulationConfig};
pub use simulator::SpringBoneWorld;
