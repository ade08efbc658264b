//! 模型加载 - GLB/glTF 容器与 VRM 扩展元数据
//!
//! 加载流程：
//! 1. GLB 容器 → JSON chunk（裸 glTF JSON 直接跳过这一步）
//! 2. serde 反序列化节点层级与 VRM 扩展
//! 3. 按场景树 DFS 建立骨骼 arena（父先于子），捕获 rest pose
//! 4. 组装人形映射 / 视线配置 / 节点约束 / 弹簧链
//!
//! 元数据缺陷一律降级处理：非法的单条记录告警后跳过，
//! 只有容器损坏或 VRMC_vrm 缺失才整体报错。

mod glb;
mod gltf_json;

use std::path::Path;

use glam::{Mat4, Quat, Vec3};

use crate::constraint::{AimAxis, ConstraintKind, NodeConstraint, RollAxis};
use crate::humanoid::HumanoidMap;
use crate::lookat::{LookAtConfig, RangeMap};
use crate::skeleton::{BoneId, BoneSet, BoneTransform};
use crate::springbone::{ColliderShape, SpringChain, SpringCollider, SpringJointParams};
use crate::{Result, VrmError};

use gltf_json::GltfDocument;

/// 加载完成的 VRM 模型
///
/// bone_set 已构建（rest pose 已捕获），其余字段是纯数据描述，
/// 交给运行时组件在 start 阶段装配。
#[derive(Clone, Debug)]
pub struct VrmModel {
    pub bone_set: BoneSet,
    pub humanoid: HumanoidMap,
    pub look_at: Option<LookAtConfig>,
    pub constraints: Vec<NodeConstraint>,
    pub colliders: Vec<SpringCollider>,
    pub springs: Vec<SpringChain>,
}

impl VrmModel {
    /// 从文件加载（.vrm / .glb / .gltf 均可）
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::load_from_bytes(&bytes)
    }

    /// 从内存字节加载，自动识别 GLB 容器与裸 JSON
    pub fn load_from_bytes(bytes: &[u8]) -> Result<Self> {
        let json = if glb::is_glb(bytes) {
            glb::extract_json(bytes)?
        } else {
            bytes
        };
        let doc: GltfDocument = serde_json::from_slice(json)
            .map_err(|e| VrmError::VrmParse(format!("Failed to parse glTF JSON: {}", e)))?;
        Self::from_document(doc)
    }

    fn from_document(doc: GltfDocument) -> Result<Self> {
        let vrm = doc
            .extensions
            .vrmc_vrm
            .as_ref()
            .ok_or_else(|| VrmError::VrmParse("Missing VRMC_vrm extension".to_string()))?;
        if !vrm.spec_version.is_empty() && !vrm.spec_version.starts_with("1.") {
            log::warn!("[Loader] 未知的 VRMC_vrm specVersion: {}", vrm.spec_version);
        }

        let (bone_set, node_to_bone) = build_bone_set(&doc)?;

        // 人形映射：无效节点索引跳过，未知名称由 from_entries 自行告警
        let humanoid = HumanoidMap::from_entries(vrm.humanoid.human_bones.iter().filter_map(
            |(name, entry)| match resolve_node(&node_to_bone, entry.node) {
                Some(id) => Some((name.as_str(), id)),
                None => {
                    log::warn!("[Loader] 人形骨骼 {} 引用无效节点 {}", name, entry.node);
                    None
                }
            },
        ));

        let look_at = vrm.look_at.as_ref().map(convert_look_at);
        let constraints = collect_constraints(&doc, &node_to_bone);
        let (colliders, springs) = match doc.extensions.vrmc_spring_bone.as_ref() {
            Some(sb) => collect_springs(sb, &node_to_bone),
            None => (Vec::new(), Vec::new()),
        };

        log::info!(
            "[Loader] 模型加载完成: {} 骨骼, {} 人形映射, {} 约束, {} 弹簧链, {} 碰撞体",
            bone_set.len(),
            humanoid.mapped_count(),
            constraints.len(),
            springs.len(),
            colliders.len()
        );

        Ok(Self {
            bone_set,
            humanoid,
            look_at,
            constraints,
            colliders,
            springs,
        })
    }
}

#[inline]
fn resolve_node(node_to_bone: &[Option<BoneId>], node: usize) -> Option<BoneId> {
    node_to_bone.get(node).copied().flatten()
}

/// 按场景树 DFS 建立骨骼 arena
///
/// 根节点 = 未被任何 children 引用的节点。返回 glTF 节点索引 →
/// 骨骼索引的映射（环或越界引用导致的不可达节点为 None）。
fn build_bone_set(doc: &GltfDocument) -> Result<(BoneSet, Vec<Option<BoneId>>)> {
    let count = doc.nodes.len();
    let mut is_child = vec![false; count];
    for node in &doc.nodes {
        for &child in &node.children {
            if child < count {
                is_child[child] = true;
            } else {
                log::warn!("[Loader] 子节点索引 {} 越界，忽略", child);
            }
        }
    }

    let mut set = BoneSet::new();
    let mut node_to_bone: Vec<Option<BoneId>> = vec![None; count];
    let mut stack: Vec<(usize, Option<BoneId>)> = (0..count)
        .rev()
        .filter(|&i| !is_child[i])
        .map(|i| (i, None))
        .collect();

    while let Some((idx, parent)) = stack.pop() {
        if node_to_bone[idx].is_some() {
            log::warn!("[Loader] 节点 {} 被多个父节点引用，忽略后续引用", idx);
            continue;
        }
        let node = &doc.nodes[idx];
        let transform = node_transform(node);
        if (transform.scale - Vec3::ONE).length_squared() > 1e-6 {
            log::warn!("[Loader] 节点 {} 带非单位缩放，缩放被忽略", idx);
        }
        let name = node
            .name
            .clone()
            .unwrap_or_else(|| format!("node_{}", idx));

        let id = set.add_bone(name, parent, transform.translation, transform.rotation)?;
        node_to_bone[idx] = Some(id);

        for &child in node.children.iter().rev() {
            if child < count {
                stack.push((child, Some(id)));
            }
        }
    }

    set.build()?;
    Ok((set, node_to_bone))
}

/// 节点局部变换：matrix 优先，其次 TRS 字段
fn node_transform(node: &gltf_json::GltfNode) -> BoneTransform {
    if let Some(m) = node.matrix {
        return BoneTransform::from_matrix(Mat4::from_cols_array(&m));
    }
    BoneTransform {
        translation: node
            .translation
            .map(Vec3::from_array)
            .unwrap_or(Vec3::ZERO),
        rotation: node
            .rotation
            .map(Quat::from_array)
            .unwrap_or(Quat::IDENTITY),
        scale: Vec3::ONE,
    }
}

fn convert_look_at(look_at: &gltf_json::VrmcLookAt) -> LookAtConfig {
    let convert = |rm: &Option<gltf_json::VrmcRangeMap>| {
        rm.as_ref()
            .map(|rm| RangeMap::new(rm.input_max_value, rm.output_scale))
            .unwrap_or_default()
    };
    LookAtConfig {
        offset_from_head: look_at
            .offset_from_head_bone
            .map(Vec3::from_array)
            .unwrap_or(Vec3::ZERO),
        horizontal_inner: convert(&look_at.range_map_horizontal_inner),
        horizontal_outer: convert(&look_at.range_map_horizontal_outer),
        vertical_up: convert(&look_at.range_map_vertical_up),
        vertical_down: convert(&look_at.range_map_vertical_down),
    }
}

/// 按 glTF 节点顺序收集节点约束
fn collect_constraints(doc: &GltfDocument, node_to_bone: &[Option<BoneId>]) -> Vec<NodeConstraint> {
    let mut constraints = Vec::new();
    for (idx, node) in doc.nodes.iter().enumerate() {
        let ext = match node.extensions.vrmc_node_constraint.as_ref() {
            Some(e) => e,
            None => continue,
        };
        let destination = match resolve_node(node_to_bone, idx) {
            Some(id) => id,
            None => continue,
        };

        let set = &ext.constraint;
        let (source_node, kind, weight) = if let Some(roll) = set.roll.as_ref() {
            let axis = match RollAxis::from_name(&roll.roll_axis) {
                Some(a) => a,
                None => {
                    log::warn!("[Loader] 节点 {} 的 rollAxis {} 无效，忽略约束", idx, roll.roll_axis);
                    continue;
                }
            };
            (roll.source, ConstraintKind::Roll { axis }, roll.weight)
        } else if let Some(aim) = set.aim.as_ref() {
            let axis = match AimAxis::from_name(&aim.aim_axis) {
                Some(a) => a,
                None => {
                    log::warn!("[Loader] 节点 {} 的 aimAxis {} 无效，忽略约束", idx, aim.aim_axis);
                    continue;
                }
            };
            (aim.source, ConstraintKind::Aim { axis }, aim.weight)
        } else if let Some(rotation) = set.rotation.as_ref() {
            (rotation.source, ConstraintKind::Rotation, rotation.weight)
        } else {
            log::warn!("[Loader] 节点 {} 的约束为空，忽略", idx);
            continue;
        };

        let source = match resolve_node(node_to_bone, source_node) {
            Some(id) => id,
            None => {
                log::warn!("[Loader] 节点 {} 的约束源 {} 无效，忽略", idx, source_node);
                continue;
            }
        };

        constraints.push(NodeConstraint {
            source,
            destination,
            kind,
            weight,
        });
    }
    constraints
}

/// 收集弹簧骨骼元数据
///
/// 碰撞体组在这里展开成碰撞体 arena 索引列表，链条只持有索引。
fn collect_springs(
    sb: &gltf_json::VrmcSpringBone,
    node_to_bone: &[Option<BoneId>],
) -> (Vec<SpringCollider>, Vec<SpringChain>) {
    // 无效碰撞体被剔除，remap 记录原索引 → arena 索引
    let mut colliders = Vec::new();
    let mut remap: Vec<Option<usize>> = vec![None; sb.colliders.len()];
    for (idx, collider) in sb.colliders.iter().enumerate() {
        let bone = match resolve_node(node_to_bone, collider.node) {
            Some(id) => id,
            None => {
                log::warn!("[Loader] 碰撞体 {} 引用无效节点 {}", idx, collider.node);
                continue;
            }
        };
        let shape = if let Some(sphere) = collider.shape.sphere.as_ref() {
            ColliderShape::Sphere {
                offset: Vec3::from_array(sphere.offset),
                radius: sphere.radius,
            }
        } else if let Some(capsule) = collider.shape.capsule.as_ref() {
            ColliderShape::Capsule {
                offset: Vec3::from_array(capsule.offset),
                tail: Vec3::from_array(capsule.tail),
                radius: capsule.radius,
            }
        } else {
            log::warn!("[Loader] 碰撞体 {} 没有形状，忽略", idx);
            continue;
        };

        remap[idx] = Some(colliders.len());
        colliders.push(SpringCollider { bone, shape });
    }

    let groups: Vec<Vec<usize>> = sb
        .collider_groups
        .iter()
        .map(|group| {
            group
                .colliders
                .iter()
                .filter_map(|&idx| remap.get(idx).copied().flatten())
                .collect()
        })
        .collect();

    let mut springs = Vec::new();
    for (idx, spring) in sb.springs.iter().enumerate() {
        let joints: Vec<(BoneId, SpringJointParams)> = spring
            .joints
            .iter()
            .filter_map(|joint| {
                let bone = resolve_node(node_to_bone, joint.node)?;
                let params = SpringJointParams {
                    stiffness: joint.stiffness,
                    drag_force: joint.drag_force.clamp(0.0, 1.0),
                    gravity_dir: Vec3::from_array(joint.gravity_dir).normalize_or_zero(),
                    gravity_power: joint.gravity_power,
                    hit_radius: joint.hit_radius,
                };
                Some((bone, params))
            })
            .collect();
        if joints.len() < 2 {
            log::warn!("[Loader] 弹簧链 {} 有效关节不足两个，忽略", idx);
            continue;
        }

        let mut chain_colliders = Vec::new();
        for &group_idx in &spring.collider_groups {
            match groups.get(group_idx) {
                Some(group) => {
                    for &collider_idx in group {
                        if !chain_colliders.contains(&collider_idx) {
                            chain_colliders.push(collider_idx);
                        }
                    }
                }
                None => {
                    log::warn!("[Loader] 弹簧链 {} 引用无效碰撞体组 {}", idx, group_idx);
                }
            }
        }

        springs.push(SpringChain {
            name: spring.name.clone(),
            joints,
            colliders: chain_colliders,
            center: spring.center.and_then(|c| resolve_node(node_to_bone, c)),
        });
    }

    (colliders, springs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::humanoid::HumanoidBone;

    // 最小可用的 VRM 文档：hips → spine → head → 双眼，
    // 头发链两节挂在 head 下，头部挂一个球碰撞体。
    const MINIMAL_VRM: &str = r#"{
        "nodes": [
            {"name": "Hips", "translation": [0, 1, 0], "children": [1]},
            {"name": "Spine", "translation": [0, 0.3, 0], "children": [2]},
            {"name": "Head", "translation": [0, 0.5, 0], "children": [3, 4, 5],
             "extensions": {"VRMC_node_constraint": {"constraint": {
                 "roll": {"source": 1, "rollAxis": "Y", "weight": 0.5}}}}},
            {"name": "LeftEye", "translation": [0.03, 0.06, 0.1]},
            {"name": "RightEye", "translation": [-0.03, 0.06, 0.1]},
            {"name": "HairRoot", "translation": [0, 0.1, -0.05], "children": [6]},
            {"name": "HairTip", "translation": [0, -0.2, 0]}
        ],
        "extensions": {
            "VRMC_vrm": {
                "specVersion": "1.0",
                "humanoid": {"humanBones": {
                    "hips": {"node": 0},
                    "spine": {"node": 1},
                    "head": {"node": 2},
                    "leftEye": {"node": 3},
                    "rightEye": {"node": 4}
                }},
                "lookAt": {
                    "offsetFromHeadBone": [0, 0.06, 0],
                    "rangeMapHorizontalInner": {"inputMaxValue": 60, "outputScale": 8}
                }
            },
            "VRMC_springBone": {
                "colliders": [
                    {"node": 2, "shape": {"sphere": {"offset": [0, 0, 0], "radius": 0.08}}}
                ],
                "colliderGroups": [{"colliders": [0]}],
                "springs": [{
                    "name": "hair",
                    "joints": [
                        {"node": 5, "stiffness": 2.0, "dragForce": 0.4},
                        {"node": 6}
                    ],
                    "colliderGroups": [0]
                }]
            }
        }
    }"#;

    #[test]
    fn minimal_document_assembles() {
        let model = VrmModel::load_from_bytes(MINIMAL_VRM.as_bytes()).unwrap();

        assert_eq!(model.bone_set.len(), 7);
        assert!(model.bone_set.is_built());
        assert_eq!(model.humanoid.mapped_count(), 5);
        assert!(model.humanoid.validate_required().is_ok());

        // head 的世界位置 = hips + spine + head 的平移叠加
        let head = model.humanoid.get(HumanoidBone::Head).unwrap();
        let pos = model.bone_set.get(head).unwrap().position_world();
        assert!((pos - Vec3::new(0.0, 1.8, 0.0)).length() < 1e-5);
    }

    #[test]
    fn look_at_config_is_converted() {
        let model = VrmModel::load_from_bytes(MINIMAL_VRM.as_bytes()).unwrap();
        let look_at = model.look_at.unwrap();

        assert!((look_at.offset_from_head - Vec3::new(0.0, 0.06, 0.0)).length() < 1e-6);
        assert!((look_at.horizontal_inner.input_max_value - 60.0).abs() < 1e-6);
        assert!((look_at.horizontal_inner.output_scale - 8.0).abs() < 1e-6);
        // 未给出的 range map 取默认值
        assert!((look_at.vertical_up.input_max_value - 90.0).abs() < 1e-6);
    }

    #[test]
    fn constraints_and_springs_are_collected() {
        let model = VrmModel::load_from_bytes(MINIMAL_VRM.as_bytes()).unwrap();

        assert_eq!(model.constraints.len(), 1);
        let constraint = &model.constraints[0];
        assert!(matches!(
            constraint.kind,
            ConstraintKind::Roll {
                axis: RollAxis::Y
            }
        ));
        assert!((constraint.weight - 0.5).abs() < 1e-6);

        assert_eq!(model.colliders.len(), 1);
        assert_eq!(model.springs.len(), 1);
        let spring = &model.springs[0];
        assert_eq!(spring.joints.len(), 2);
        assert!((spring.joints[0].1.stiffness - 2.0).abs() < 1e-6);
        assert!((spring.joints[0].1.drag_force - 0.4).abs() < 1e-6);
        // 第二个关节未给参数，取 VRMC_springBone 默认值
        assert!((spring.joints[1].1.drag_force - 0.5).abs() < 1e-6);
        assert_eq!(spring.colliders, vec![0]);
    }

    #[test]
    fn matrix_transform_is_decomposed() {
        let json = r#"{
            "nodes": [{"name": "Root",
                       "matrix": [1,0,0,0, 0,1,0,0, 0,0,1,0, 0.5,1.0,0,1]}],
            "extensions": {"VRMC_vrm": {"humanoid": {"humanBones": {"hips": {"node": 0}}}}}
        }"#;
        let model = VrmModel::load_from_bytes(json.as_bytes()).unwrap();
        let root = model.bone_set.find_bone_by_name("Root").unwrap();
        let pos = model.bone_set.get(root).unwrap().position_world();
        assert!((pos - Vec3::new(0.5, 1.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn missing_vrm_extension_is_rejected() {
        let result = VrmModel::load_from_bytes(br#"{"nodes": []}"#);
        assert!(matches!(result, Err(VrmError::VrmParse(_))));
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let json = r#"{
            "nodes": [{"name": "Root"}],
            "extensions": {
                "VRMC_vrm": {"humanoid": {"humanBones": {
                    "hips": {"node": 0},
                    "head": {"node": 99}
                }}},
                "VRMC_springBone": {
                    "colliders": [{"node": 42, "shape": {"sphere": {"radius": 0.1}}}],
                    "springs": [{"joints": [{"node": 0}]}]
                }
            }
        }"#;
        let model = VrmModel::load_from_bytes(json.as_bytes()).unwrap();

        assert_eq!(model.humanoid.mapped_count(), 1);
        assert!(model.colliders.is_empty());
        // 单关节链无法模拟，被丢弃
        assert!(model.springs.is_empty());
    }
}
