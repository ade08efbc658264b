//! glTF JSON 文档结构（只保留本引擎关心的字段）
//!
//! 覆盖范围：节点层级 + VRMC_vrm（人形骨骼 / lookAt）
//! + VRMC_springBone + 节点级 VRMC_node_constraint。
//! mesh / material / accessor 等渲染数据一律忽略。

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct GltfDocument {
    #[serde(default)]
    pub nodes: Vec<GltfNode>,
    #[serde(default)]
    pub extensions: DocumentExtensions,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct GltfNode {
    pub name: Option<String>,
    #[serde(default)]
    pub children: Vec<usize>,
    pub translation: Option<[f32; 3]>,
    pub rotation: Option<[f32; 4]>,
    /// TRS 的替代形式，列主序 4x4
    pub matrix: Option<[f32; 16]>,
    #[serde(default)]
    pub extensions: NodeExtensions,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DocumentExtensions {
    #[serde(rename = "VRMC_vrm")]
    pub vrmc_vrm: Option<VrmcVrm>,
    #[serde(rename = "VRMC_springBone")]
    pub vrmc_spring_bone: Option<VrmcSpringBone>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct NodeExtensions {
    #[serde(rename = "VRMC_node_constraint")]
    pub vrmc_node_constraint: Option<VrmcNodeConstraint>,
}

// ---------------------------------------------------------------------------
// VRMC_vrm
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VrmcVrm {
    #[serde(default)]
    pub spec_version: String,
    #[serde(default)]
    pub humanoid: VrmcHumanoid,
    pub look_at: Option<VrmcLookAt>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VrmcHumanoid {
    #[serde(default)]
    pub human_bones: std::collections::BTreeMap<String, VrmcHumanBone>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VrmcHumanBone {
    pub node: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VrmcLookAt {
    pub offset_from_head_bone: Option<[f32; 3]>,
    pub range_map_horizontal_inner: Option<VrmcRangeMap>,
    pub range_map_horizontal_outer: Option<VrmcRangeMap>,
    pub range_map_vertical_down: Option<VrmcRangeMap>,
    pub range_map_vertical_up: Option<VrmcRangeMap>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VrmcRangeMap {
    #[serde(default = "default_input_max_value")]
    pub input_max_value: f32,
    #[serde(default)]
    pub output_scale: f32,
}

fn default_input_max_value() -> f32 {
    90.0
}

// ---------------------------------------------------------------------------
// VRMC_node_constraint
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct VrmcNodeConstraint {
    pub constraint: VrmcConstraintSet,
}

/// roll / aim / rotation 三选一
#[derive(Debug, Default, Deserialize)]
pub(crate) struct VrmcConstraintSet {
    pub roll: Option<VrmcRollConstraint>,
    pub aim: Option<VrmcAimConstraint>,
    pub rotation: Option<VrmcRotationConstraint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VrmcRollConstraint {
    pub source: usize,
    pub roll_axis: String,
    #[serde(default = "default_weight")]
    pub weight: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VrmcAimConstraint {
    pub source: usize,
    pub aim_axis: String,
    #[serde(default = "default_weight")]
    pub weight: f32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VrmcRotationConstraint {
    pub source: usize,
    #[serde(default = "default_weight")]
    pub weight: f32,
}

fn default_weight() -> f32 {
    1.0
}

// ---------------------------------------------------------------------------
// VRMC_springBone
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VrmcSpringBone {
    #[serde(default)]
    pub colliders: Vec<VrmcCollider>,
    #[serde(default)]
    pub collider_groups: Vec<VrmcColliderGroup>,
    #[serde(default)]
    pub springs: Vec<VrmcSpring>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VrmcCollider {
    pub node: usize,
    pub shape: VrmcColliderShape,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct VrmcColliderShape {
    pub sphere: Option<VrmcSphereShape>,
    pub capsule: Option<VrmcCapsuleShape>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VrmcSphereShape {
    #[serde(default)]
    pub offset: [f32; 3],
    #[serde(default)]
    pub radius: f32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VrmcCapsuleShape {
    #[serde(default)]
    pub offset: [f32; 3],
    #[serde(default)]
    pub radius: f32,
    #[serde(default)]
    pub tail: [f32; 3],
}

#[derive(Debug, Deserialize)]
pub(crate) struct VrmcColliderGroup {
    #[serde(default)]
    pub colliders: Vec<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VrmcSpring {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub joints: Vec<VrmcSpringJoint>,
    #[serde(default)]
    pub collider_groups: Vec<usize>,
    pub center: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VrmcSpringJoint {
    pub node: usize,
    #[serde(default)]
    pub hit_radius: f32,
    #[serde(default = "default_stiffness")]
    pub stiffness: f32,
    #[serde(default)]
    pub gravity_power: f32,
    #[serde(default = "default_gravity_dir")]
    pub gravity_dir: [f32; 3],
    #[serde(default = "default_drag_force")]
    pub drag_force: f32,
}

fn default_stiffness() -> f32 {
    1.0
}

fn default_gravity_dir() -> [f32; 3] {
    [0.0, -1.0, 0.0]
}

fn default_drag_force() -> f32 {
    0.5
}
