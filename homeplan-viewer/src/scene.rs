use glam::DVec3;
use homeplan_core::document::EntityId;

use crate::mesh::Mesh;

/// 线性 RGB 颜色，分量取值 `[0, 1]`。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);

    pub const fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// 解析 `#rrggbb`，格式不符时返回 `None`。
    pub fn from_hex(raw: &str) -> Option<Self> {
        let hex = raw.strip_prefix('#')?;
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16)
                .ok()
                .map(|value| f64::from(value) / 255.0)
        };
        Some(Self::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    pub fn to_hex(self) -> String {
        let byte = |value: f64| (value.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("#{:02x}{:02x}{:02x}", byte(self.r), byte(self.g), byte(self.b))
    }

    pub fn lerp(self, other: Color, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        Self::rgb(
            self.r + (other.r - self.r) * t,
            self.g + (other.g - self.g) * t,
            self.b + (other.b - self.b) * t,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub color: Color,
    pub opacity: f64,
}

impl Material {
    pub const fn opaque(color: Color) -> Self {
        Self {
            color,
            opacity: 1.0,
        }
    }

    pub fn hex(raw: &str, fallback: Color) -> Self {
        Self::opaque(Color::from_hex(raw).unwrap_or(fallback))
    }
}

/// 三维场景节点的类别。交互只命中房间。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeCategory {
    Room { room_id: EntityId },
    Wall,
    OpeningFixture,
    Surface,
    Roof,
    Environment,
    Celestial,
    Light,
}

impl NodeCategory {
    #[inline]
    pub fn is_interactive(&self) -> bool {
        matches!(self, NodeCategory::Room { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            NodeCategory::Room { .. } => "room",
            NodeCategory::Wall => "wall",
            NodeCategory::OpeningFixture => "opening_fixture",
            NodeCategory::Surface => "surface",
            NodeCategory::Roof => "roof",
            NodeCategory::Environment => "environment",
            NodeCategory::Celestial => "celestial",
            NodeCategory::Light => "light",
        }
    }
}

/// 树的两种互斥表示：有叶树冠与落叶枝干。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoliagePart {
    Canopy,
    Branches,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: DVec3,
    pub color: Color,
    pub intensity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParticleField {
    pub positions: Vec<DVec3>,
    /// 每个粒子每帧的位移。
    pub velocity: DVec3,
    pub size: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeContent {
    Mesh(Mesh),
    Light(PointLight),
    Particles(ParticleField),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneNodeId(usize);

impl SceneNodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub name: String,
    pub category: NodeCategory,
    pub content: NodeContent,
    pub material: Material,
    pub visible: bool,
    pub highlighted: bool,
    pub foliage: Option<FoliagePart>,
}

impl SceneNode {
    pub fn mesh(
        name: impl Into<String>,
        category: NodeCategory,
        mesh: Mesh,
        material: Material,
    ) -> Self {
        Self {
            name: name.into(),
            category,
            content: NodeContent::Mesh(mesh),
            material,
            visible: true,
            highlighted: false,
            foliage: None,
        }
    }

    pub fn light(name: impl Into<String>, light: PointLight) -> Self {
        Self {
            name: name.into(),
            category: NodeCategory::Light,
            content: NodeContent::Light(light),
            material: Material::opaque(light.color),
            visible: true,
            highlighted: false,
            foliage: None,
        }
    }

    pub fn with_foliage(mut self, part: FoliagePart) -> Self {
        self.foliage = Some(part);
        self
    }

    pub fn as_mesh(&self) -> Option<&Mesh> {
        match &self.content {
            NodeContent::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }
}

/// 生成结果的扁平场景图，节点按添加顺序排列。
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    nodes: Vec<SceneNode>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: SceneNode) -> SceneNodeId {
        self.nodes.push(node);
        SceneNodeId(self.nodes.len() - 1)
    }

    pub fn extend(&mut self, nodes: impl IntoIterator<Item = SceneNode>) -> usize {
        let before = self.nodes.len();
        self.nodes.extend(nodes);
        self.nodes.len() - before
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: SceneNodeId) -> Option<&SceneNode> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: SceneNodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SceneNodeId, &SceneNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (SceneNodeId(index), node))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SceneNode> {
        self.nodes.iter_mut()
    }

    /// 按类别标签计数。
    pub fn count(&self, label: &str) -> usize {
        self.nodes
            .iter()
            .filter(|node| node.category.label() == label)
            .count()
    }

    pub fn room_node(&self, room_id: &EntityId) -> Option<SceneNodeId> {
        self.iter()
            .find(|(_, node)| {
                matches!(&node.category, NodeCategory::Room { room_id: id } if id == room_id)
            })
            .map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colors_round_trip_and_reject_garbage() {
        let color = Color::from_hex("#4a7c2f").expect("parse");
        assert_eq!(color.to_hex(), "#4a7c2f");
        assert!(Color::from_hex("4a7c2f").is_none());
        assert!(Color::from_hex("#12345").is_none());
        assert!(Color::from_hex("#zzzzzz").is_none());
    }

    #[test]
    fn lerp_is_clamped() {
        let black = Color::rgb(0.0, 0.0, 0.0);
        assert_eq!(black.lerp(Color::WHITE, 0.5), Color::rgb(0.5, 0.5, 0.5));
        assert_eq!(black.lerp(Color::WHITE, 3.0), Color::WHITE);
    }

    #[test]
    fn only_rooms_are_interactive() {
        let room = NodeCategory::Room {
            room_id: EntityId::new("r"),
        };
        assert!(room.is_interactive());
        for category in [
            NodeCategory::Wall,
            NodeCategory::OpeningFixture,
            NodeCategory::Surface,
            NodeCategory::Roof,
            NodeCategory::Environment,
            NodeCategory::Celestial,
            NodeCategory::Light,
        ] {
            assert!(!category.is_interactive(), "{}", category.label());
        }
    }
}
