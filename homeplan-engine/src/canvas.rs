use homeplan_core::document::EntityId;
use homeplan_core::geometry::{Point2, point_in_polygon};
use slotmap::{SlotMap, new_key_type};

use crate::errors::EngineError;
use crate::selection::EntityKind;

new_key_type! {
    /// 二维画布节点句柄。
    pub struct NodeId;
}

/// 画布节点的图形。坐标均为平面（世界）坐标。
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Group,
    Polygon {
        points: Vec<Point2>,
        fill: String,
        stroke: Option<String>,
    },
    Line {
        from: Point2,
        to: Point2,
        width: f64,
        color: String,
    },
    Circle {
        center: Point2,
        radius: f64,
        fill: String,
    },
    /// 方形拖拽手柄。
    Handle { center: Point2, size: f64 },
}

impl Shape {
    /// 命中测试，`Group` 本身不可命中。
    pub fn contains(&self, point: Point2) -> bool {
        match self {
            Shape::Group => false,
            Shape::Polygon { points, .. } => point_in_polygon(point, points),
            Shape::Line {
                from, to, width, ..
            } => distance_to_segment(point, *from, *to) <= width * 0.5,
            Shape::Circle { center, radius, .. } => center.distance(point) <= *radius,
            Shape::Handle { center, size } => {
                let half = size * 0.5;
                (point.x() - center.x()).abs() <= half && (point.y() - center.y()).abs() <= half
            }
        }
    }
}

/// 节点所属实体的哪一部分被按下。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Part {
    Body,
    LeftHandle,
    RightHandle,
    RadiusHandle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeOwner {
    pub kind: EntityKind,
    pub id: EntityId,
    pub part: Part,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub shape: Shape,
    pub owner: Option<NodeOwner>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[inline]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// 交给渲染协作方的二维场景图。子节点按顺序绘制，靠后的在上层。
#[derive(Debug)]
pub struct Canvas {
    nodes: SlotMap<NodeId, Node>,
    root: NodeId,
}

impl Canvas {
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node {
            shape: Shape::Group,
            owner: None,
            parent: None,
            children: Vec::new(),
        });
        Self { nodes, root }
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    /// 追加为 `parent` 的最后一个子节点。
    pub fn add(
        &mut self,
        parent: NodeId,
        shape: Shape,
        owner: Option<NodeOwner>,
    ) -> Result<NodeId, EngineError> {
        let index = self.children(parent).len();
        self.insert(parent, index, shape, owner)
    }

    /// 插入到 `parent` 子列表的 `index` 处（越界时追加）。
    pub fn insert(
        &mut self,
        parent: NodeId,
        index: usize,
        shape: Shape,
        owner: Option<NodeOwner>,
    ) -> Result<NodeId, EngineError> {
        if !self.nodes.contains_key(parent) {
            return Err(EngineError::NodeNotFound);
        }
        let id = self.nodes.insert(Node {
            shape,
            owner,
            parent: Some(parent),
            children: Vec::new(),
        });
        let children = &mut self.nodes[parent].children;
        let index = index.min(children.len());
        children.insert(index, id);
        Ok(id)
    }

    /// 递归删除节点，返回其父节点与原位置。根节点不可删除。
    pub fn remove(&mut self, id: NodeId) -> Option<(NodeId, usize)> {
        if id == self.root {
            return None;
        }
        let parent = self.nodes.get(id)?.parent?;
        let index = self
            .nodes
            .get(parent)?
            .children
            .iter()
            .position(|child| *child == id)?;
        self.nodes[parent].children.remove(index);

        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(current) {
                stack.extend(node.children);
            }
        }
        Some((parent, index))
    }

    /// 删除某节点的全部子节点。
    pub fn clear_children(&mut self, id: NodeId) {
        let children: Vec<NodeId> = self.children(id).to_vec();
        for child in children {
            self.remove(child);
        }
    }

    /// 把节点移到其父节点子列表末尾，使其在兄弟节点之上绘制与命中。
    pub fn bring_to_front(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.nodes.get(id).and_then(|node| node.parent) else {
            return false;
        };
        let children = &mut self.nodes[parent].children;
        let Some(index) = children.iter().position(|child| *child == id) else {
            return false;
        };
        let node = children.remove(index);
        children.push(node);
        true
    }

    /// 自上而下命中测试，返回第一个带归属的节点。
    pub fn hit_test(&self, point: Point2) -> Option<&NodeOwner> {
        self.hit_node(self.root, point)
            .and_then(|id| self.nodes.get(id))
            .and_then(|node| node.owner.as_ref())
    }

    fn hit_node(&self, id: NodeId, point: Point2) -> Option<NodeId> {
        let node = self.nodes.get(id)?;
        for child in node.children.iter().rev() {
            if let Some(hit) = self.hit_node(*child, point) {
                return Some(hit);
            }
        }
        (node.owner.is_some() && node.shape.contains(point)).then_some(id)
    }

    /// 深度优先遍历（绘制顺序）。
    pub fn walk(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(current) = stack.pop() {
            order.push(current);
            if let Some(node) = self.nodes.get(current) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        order
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

fn distance_to_segment(point: Point2, from: Point2, to: Point2) -> f64 {
    let segment = to.as_vec2() - from.as_vec2();
    let length_squared = segment.length_squared();
    if length_squared <= f64::EPSILON {
        return point.distance(from);
    }
    let t = ((point.as_vec2() - from.as_vec2()).dot(segment) / length_squared).clamp(0.0, 1.0);
    point.as_vec2().distance(from.as_vec2() + segment * t)
}
