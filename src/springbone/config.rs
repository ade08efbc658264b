//! 弹簧骨骼模拟配置
//!
//! 所有参数扁平化，直接在代码中修改默认值即可。

use once_cell::sync::Lazy;
use std::sync::RwLock;

/// 模拟配置（扁平化，不嵌套）
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    // ========== 步长 ==========
    /// 单帧最大步长（秒），默认 1/30
    /// 卡顿帧的超大 dt 会让弹簧积分爆炸，超出部分直接截断
    pub max_delta_time: f32,

    // ========== 骨长 ==========
    /// 骨长下限（米），默认 0.01
    /// 零长骨骼会让长度约束除法发散，统一抬到 1 厘米
    pub bone_length_floor: f32,

    // ========== 全局缩放 ==========
    /// 刚性力缩放（乘以模型原值），默认 1.0
    pub stiffness_scale: f32,
    /// 重力缩放（乘以模型原值），默认 1.0
    pub gravity_scale: f32,

    // ========== 碰撞 ==========
    /// 是否启用碰撞解算，默认 true
    pub collision_enabled: bool,

    // ========== 调试 ==========
    /// 是否输出调试日志，默认 false
    pub debug_log: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            // ====== 步长 ======
            // 低于 30fps 的帧按 1/30 秒处理，宁可慢动作也不要弹飞
            max_delta_time: 1.0 / 30.0,

            // ====== 骨长 ======
            bone_length_floor: 0.01,

            // ====== 全局缩放 ======
            // 1.0 = 与模型元数据一致
            stiffness_scale: 1.0,
            gravity_scale: 1.0,

            // ====== 碰撞 ======
            collision_enabled: true,

            // ====== 调试 ======
            debug_log: false,
        }
    }
}

/// 全局配置实例
static SIMULATION_CONFIG: Lazy<RwLock<SimulationConfig>> =
    Lazy::new(|| RwLock::new(SimulationConfig::default()));

/// 获取当前配置（只读）
pub fn get_config() -> SimulationConfig {
    SIMULATION_CONFIG
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
}

/// 手动设置配置（用于运行时调试）
pub fn set_config(config: SimulationConfig) {
    *SIMULATION_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = config;
}

/// 重置为默认配置
pub fn reset_config() {
    *SIMULATION_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = SimulationConfig::default();
}
