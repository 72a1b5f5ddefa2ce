pub mod geometry {
    use std::collections::HashMap;

    use glam::{DVec2, DVec3};
    use serde::{Deserialize, Serialize};

    /// 几何比较使用的容差（平面单位）。
    pub const EPSILON: f64 = 1e-6;

    /// 二维点，内部以 `glam::DVec2` 表示。平面坐标沿用画布约定：x 向右，y 向下。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn vector_to(self, other: Point2) -> Vector2 {
            Vector2(other.0 - self.0)
        }

        #[inline]
        pub fn distance(self, other: Point2) -> f64 {
            self.0.distance(other.0)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量。拖拽增量、法向等都以它表示。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn zero() -> Self {
            Self(DVec2::ZERO)
        }

        #[inline]
        pub fn from_points(start: Point2, end: Point2) -> Self {
            Self(end.0 - start.0)
        }

        #[inline]
        pub fn length(self) -> f64 {
            self.0.length()
        }

        #[inline]
        pub fn length_squared(self) -> f64 {
            self.0.length_squared()
        }

        #[inline]
        pub fn scale(self, factor: f64) -> Self {
            Self(self.0 * factor)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 三维点。三维场景采用 z 轴向上，平面 (x, y) 直接映射到 (x, y)。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point3(pub DVec3);

    impl Point3 {
        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn on_plane(point: Point2, z: f64) -> Self {
            Self(point.0.extend(z))
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn z(self) -> f64 {
            self.0.z
        }

        #[inline]
        pub fn as_vec3(self) -> DVec3 {
            self.0
        }
    }

    impl From<DVec3> for Point3 {
        fn from(value: DVec3) -> Self {
            Self(value)
        }
    }

    /// 轴对齐边界框。空框以 ±∞ 表示，调用方需用 [`Bounds2D::or_fallback`] 兜底。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        #[inline]
        pub fn new(min: Point2, max: Point2) -> Self {
            Self { min, max }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        /// 以原点为中心、半边长为 `half_extent` 的对称框。
        #[inline]
        pub fn symmetric(half_extent: f64) -> Self {
            Self {
                min: Point2::new(-half_extent, -half_extent),
                max: Point2::new(half_extent, half_extent),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn is_finite(&self) -> bool {
            self.min.as_vec2().is_finite() && self.max.as_vec2().is_finite()
        }

        /// 非有限范围（空平面、无房间）时替换为固定对称框，避免无穷值进入布局计算。
        #[inline]
        pub fn or_fallback(self, half_extent: f64) -> Self {
            if self.is_finite() && !self.is_empty() {
                self
            } else {
                Self::symmetric(half_extent)
            }
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        #[inline]
        pub fn left(&self) -> f64 {
            self.min.x()
        }

        #[inline]
        pub fn right(&self) -> f64 {
            self.max.x()
        }

        #[inline]
        pub fn top(&self) -> f64 {
            self.min.y()
        }

        #[inline]
        pub fn bottom(&self) -> f64 {
            self.max.y()
        }

        #[inline]
        pub fn width(&self) -> f64 {
            self.max.x() - self.min.x()
        }

        #[inline]
        pub fn height(&self) -> f64 {
            self.max.y() - self.min.y()
        }

        /// 左上角 x，与 `left` 相同。
        #[inline]
        pub fn x(&self) -> f64 {
            self.left()
        }

        /// 左上角 y，与 `top` 相同。
        #[inline]
        pub fn y(&self) -> f64 {
            self.top()
        }

        pub fn include_point(&mut self, point: Point2) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            let min_vec = self.min.as_vec2().min(point.as_vec2());
            let max_vec = self.max.as_vec2().max(point.as_vec2());
            self.min = Point2::from_vec(min_vec);
            self.max = Point2::from_vec(max_vec);
        }

        pub fn include_bounds(&mut self, other: &Bounds2D) {
            if other.is_empty() {
                return;
            }
            self.include_point(other.min);
            self.include_point(other.max);
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            debug_assert!(!self.is_empty());
            let center = (self.min.as_vec2() + self.max.as_vec2()) * 0.5;
            Point2::from_vec(center)
        }

        /// 四周各扩展 `margin`。
        #[inline]
        pub fn expanded(&self, margin: f64) -> Self {
            Self {
                min: Point2::new(self.min.x() - margin, self.min.y() - margin),
                max: Point2::new(self.max.x() + margin, self.max.y() + margin),
            }
        }
    }

    pub fn polygon_bounds(points: &[Point2]) -> Bounds2D {
        let mut bounds = Bounds2D::empty();
        for point in points {
            bounds.include_point(*point);
        }
        bounds
    }

    /// 鞋带公式求有向面积。少于三个顶点时为 0。
    pub fn signed_area(points: &[Point2]) -> f64 {
        if points.len() < 3 {
            return 0.0;
        }
        let mut sum = 0.0;
        for (index, current) in points.iter().enumerate() {
            let next = points[(index + 1) % points.len()];
            sum += current.x() * next.y() - next.x() * current.y();
        }
        sum * 0.5
    }

    /// 多边形面积（绝对值），与顶点顺序无关。
    #[inline]
    pub fn polygon_area(points: &[Point2]) -> f64 {
        signed_area(points).abs()
    }

    pub fn polygon_centroid(points: &[Point2]) -> Option<Point2> {
        let area = signed_area(points);
        if area.abs() <= EPSILON {
            return None;
        }
        let mut cx = 0.0;
        let mut cy = 0.0;
        for (index, current) in points.iter().enumerate() {
            let next = points[(index + 1) % points.len()];
            let cross = current.x() * next.y() - next.x() * current.y();
            cx += (current.x() + next.x()) * cross;
            cy += (current.y() + next.y()) * cross;
        }
        let factor = 1.0 / (6.0 * area);
        Some(Point2::new(cx * factor, cy * factor))
    }

    /// 射线法判断点是否位于多边形内部（边界上的点视为不确定，不保证结果）。
    pub fn point_in_polygon(point: Point2, polygon: &[Point2]) -> bool {
        if polygon.len() < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = polygon.len() - 1;
        for i in 0..polygon.len() {
            let a = polygon[i];
            let b = polygon[j];
            if (a.y() > point.y()) != (b.y() > point.y()) {
                let t = (point.y() - a.y()) / (b.y() - a.y());
                if point.x() < a.x() + t * (b.x() - a.x()) {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    #[inline]
    fn cross(o: DVec2, a: DVec2, b: DVec2) -> f64 {
        (a - o).perp_dot(b - o)
    }

    #[inline]
    fn within_segment(a: DVec2, b: DVec2, p: DVec2) -> bool {
        p.x >= a.x.min(b.x) - EPSILON
            && p.x <= a.x.max(b.x) + EPSILON
            && p.y >= a.y.min(b.y) - EPSILON
            && p.y <= a.y.max(b.y) + EPSILON
    }

    /// 判断两条闭线段是否相交（含端点接触与共线重叠）。
    pub fn segments_intersect(a1: Point2, a2: Point2, b1: Point2, b2: Point2) -> bool {
        let (p1, p2, q1, q2) = (a1.0, a2.0, b1.0, b2.0);
        let d1 = cross(q1, q2, p1);
        let d2 = cross(q1, q2, p2);
        let d3 = cross(p1, p2, q1);
        let d4 = cross(p1, p2, q2);

        if ((d1 > EPSILON && d2 < -EPSILON) || (d1 < -EPSILON && d2 > EPSILON))
            && ((d3 > EPSILON && d4 < -EPSILON) || (d3 < -EPSILON && d4 > EPSILON))
        {
            return true;
        }

        (d1.abs() <= EPSILON && within_segment(q1, q2, p1))
            || (d2.abs() <= EPSILON && within_segment(q1, q2, p2))
            || (d3.abs() <= EPSILON && within_segment(p1, p2, q1))
            || (d4.abs() <= EPSILON && within_segment(p1, p2, q2))
    }

    /// 简单多边形判定：至少三个不重合顶点、面积非零、非相邻边互不相交、相邻边不折返。
    pub fn is_simple_polygon(points: &[Point2]) -> bool {
        let count = points.len();
        if count < 3 || polygon_area(points) <= EPSILON {
            return false;
        }
        for i in 0..count {
            let a1 = points[i];
            let a2 = points[(i + 1) % count];
            if a1.distance(a2) <= EPSILON {
                return false;
            }
            // 相邻边共线且方向相反即为尖刺
            let a3 = points[(i + 2) % count];
            let incoming = a2.0 - a1.0;
            let outgoing = a3.0 - a2.0;
            if incoming.perp_dot(outgoing).abs() <= EPSILON && incoming.dot(outgoing) < 0.0 {
                return false;
            }
            for j in (i + 2)..count {
                if i == 0 && j == count - 1 {
                    continue;
                }
                let b1 = points[j];
                let b2 = points[(j + 1) % count];
                if segments_intersect(a1, a2, b1, b2) {
                    return false;
                }
            }
        }
        true
    }

    /// 去掉重复顶点与共线中间点。
    pub fn simplify_polygon(points: &[Point2]) -> Vec<Point2> {
        let mut result: Vec<Point2> = Vec::with_capacity(points.len());
        for point in points {
            if result.last().is_some_and(|last| last.distance(*point) <= EPSILON) {
                continue;
            }
            result.push(*point);
        }
        while result.len() > 1 && result[0].distance(result[result.len() - 1]) <= EPSILON {
            result.pop();
        }

        let mut changed = true;
        while changed && result.len() >= 3 {
            changed = false;
            let count = result.len();
            for i in 0..count {
                let prev = result[(i + count - 1) % count].0;
                let current = result[i].0;
                let next = result[(i + 1) % count].0;
                let incoming = (current - prev).normalize_or_zero();
                let outgoing = (next - current).normalize_or_zero();
                if incoming.perp_dot(outgoing).abs() <= EPSILON && incoming.dot(outgoing) > 0.0 {
                    result.remove(i);
                    changed = true;
                    break;
                }
            }
        }
        result
    }

    type VertexKey = (i64, i64);

    fn vertex_key(point: Point2) -> VertexKey {
        let scale = 1.0 / EPSILON.sqrt();
        (
            (point.x() * scale).round() as i64,
            (point.y() * scale).round() as i64,
        )
    }

    /// 求一组多边形（同层房间）的外轮廓。
    ///
    /// 做法：统一为正向绕序，在共线的 T 形接点处拆分边，抵消方向相反的共享边，
    /// 再把剩余有向边串成环。仅返回正向（外边界）环，内洞被忽略。
    pub fn outline_loops(polygons: &[Vec<Point2>]) -> Vec<Vec<Point2>> {
        let oriented: Vec<Vec<Point2>> = polygons
            .iter()
            .map(|polygon| simplify_polygon(polygon))
            .filter(|polygon| polygon.len() >= 3 && polygon_area(polygon) > EPSILON)
            .map(|mut polygon| {
                if signed_area(&polygon) < 0.0 {
                    polygon.reverse();
                }
                polygon
            })
            .collect();

        let mut positions: HashMap<VertexKey, Point2> = HashMap::new();
        for polygon in &oriented {
            for point in polygon {
                positions.entry(vertex_key(*point)).or_insert(*point);
            }
        }
        let all_vertices: Vec<Point2> = positions.values().copied().collect();

        let mut directed: HashMap<(VertexKey, VertexKey), usize> = HashMap::new();
        for polygon in &oriented {
            for (index, start) in polygon.iter().enumerate() {
                let end = polygon[(index + 1) % polygon.len()];
                let mut splits = split_points_on_segment(*start, end, &all_vertices);
                splits.insert(0, *start);
                splits.push(end);
                for pair in splits.windows(2) {
                    let key = (vertex_key(pair[0]), vertex_key(pair[1]));
                    if key.0 != key.1 {
                        *directed.entry(key).or_insert(0) += 1;
                    }
                }
            }
        }

        let mut boundary: Vec<(VertexKey, VertexKey)> = directed
            .iter()
            .filter(|((from, to), count)| {
                let reverse = directed.get(&(*to, *from)).copied().unwrap_or(0);
                **count > reverse
            })
            .map(|(edge, _)| *edge)
            .collect();
        boundary.sort();

        let mut outgoing: HashMap<VertexKey, Vec<VertexKey>> = HashMap::new();
        for (from, to) in &boundary {
            outgoing.entry(*from).or_default().push(*to);
        }

        let mut loops = Vec::new();
        for (start, first) in boundary {
            let Some(candidates) = outgoing.get_mut(&start) else {
                continue;
            };
            let Some(position) = candidates.iter().position(|to| *to == first) else {
                continue;
            };
            candidates.remove(position);

            let mut ring = vec![start];
            let mut previous = start;
            let mut current = first;
            let mut closed = false;
            let limit = positions.len() + 1;
            while ring.len() <= limit {
                if current == start {
                    closed = true;
                    break;
                }
                ring.push(current);
                let Some(next) = take_leftmost(&mut outgoing, &positions, previous, current)
                else {
                    break;
                };
                previous = current;
                current = next;
            }
            if !closed {
                continue;
            }
            let points: Vec<Point2> = ring.iter().filter_map(|key| positions.get(key).copied()).collect();
            let simplified = simplify_polygon(&points);
            if simplified.len() >= 3 && signed_area(&simplified) > EPSILON {
                loops.push(simplified);
            }
        }
        loops
    }

    fn split_points_on_segment(start: Point2, end: Point2, vertices: &[Point2]) -> Vec<Point2> {
        let direction = end.0 - start.0;
        let length_squared = direction.length_squared();
        if length_squared <= EPSILON {
            return Vec::new();
        }
        let mut hits: Vec<(f64, Point2)> = vertices
            .iter()
            .filter_map(|vertex| {
                let offset = vertex.0 - start.0;
                let t = offset.dot(direction) / length_squared;
                if t <= EPSILON || t >= 1.0 - EPSILON {
                    return None;
                }
                let distance = direction.perp_dot(offset).abs() / length_squared.sqrt();
                (distance <= EPSILON.sqrt()).then_some((t, *vertex))
            })
            .collect();
        hits.sort_by(|a, b| a.0.total_cmp(&b.0));
        hits.into_iter().map(|(_, point)| point).collect()
    }

    fn take_leftmost(
        outgoing: &mut HashMap<VertexKey, Vec<VertexKey>>,
        positions: &HashMap<VertexKey, Point2>,
        previous: VertexKey,
        current: VertexKey,
    ) -> Option<VertexKey> {
        let candidates = outgoing.get_mut(&current)?;
        if candidates.is_empty() {
            return None;
        }
        let origin = positions.get(&current)?.0;
        let incoming = origin - positions.get(&previous)?.0;
        let mut best: Option<(usize, f64)> = None;
        for (index, key) in candidates.iter().enumerate() {
            let Some(target) = positions.get(key) else {
                continue;
            };
            let out = target.0 - origin;
            let turn = incoming.perp_dot(out).atan2(incoming.dot(out));
            if best.is_none_or(|(_, angle)| turn > angle) {
                best = Some((index, turn));
            }
        }
        best.map(|(index, _)| candidates.remove(index))
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn square(x: f64, y: f64, side: f64) -> Vec<Point2> {
            vec![
                Point2::new(x, y),
                Point2::new(x + side, y),
                Point2::new(x + side, y + side),
                Point2::new(x, y + side),
            ]
        }

        #[test]
        fn polygon_area_is_order_independent() {
            let points = square(0.0, 0.0, 100.0);
            assert!((polygon_area(&points) - 10_000.0).abs() < 1e-9);
            let mut reversed = points.clone();
            reversed.reverse();
            assert!((polygon_area(&reversed) - 10_000.0).abs() < 1e-9);
            assert!(signed_area(&points) * signed_area(&reversed) < 0.0);
        }

        #[test]
        fn polygon_area_of_degenerate_input_is_zero() {
            assert_eq!(polygon_area(&[]), 0.0);
            assert_eq!(
                polygon_area(&[Point2::new(0.0, 0.0), Point2::new(5.0, 5.0)]),
                0.0
            );
        }

        #[test]
        fn empty_bounds_fall_back_to_symmetric_box() {
            let bounds = polygon_bounds(&[]);
            assert!(!bounds.is_finite());
            let fallback = bounds.or_fallback(180.0);
            assert_eq!(fallback.left(), -180.0);
            assert_eq!(fallback.bottom(), 180.0);
            assert_eq!(fallback.width(), 360.0);
        }

        #[test]
        fn bounds_expose_box_fields() {
            let bounds = polygon_bounds(&square(10.0, 20.0, 30.0));
            assert_eq!(bounds.left(), 10.0);
            assert_eq!(bounds.right(), 40.0);
            assert_eq!(bounds.top(), 20.0);
            assert_eq!(bounds.bottom(), 50.0);
            assert_eq!(bounds.width(), 30.0);
            assert_eq!(bounds.height(), 30.0);
            assert_eq!((bounds.x(), bounds.y()), (10.0, 20.0));
        }

        #[test]
        fn bow_tie_is_not_simple() {
            let bow_tie = vec![
                Point2::new(0.0, 0.0),
                Point2::new(10.0, 10.0),
                Point2::new(10.0, 0.0),
                Point2::new(0.0, 10.0),
            ];
            assert!(!is_simple_polygon(&bow_tie));
            assert!(is_simple_polygon(&square(0.0, 0.0, 10.0)));
        }

        #[test]
        fn point_in_polygon_detects_inside() {
            let polygon = square(0.0, 0.0, 10.0);
            assert!(point_in_polygon(Point2::new(5.0, 5.0), &polygon));
            assert!(!point_in_polygon(Point2::new(15.0, 5.0), &polygon));
        }

        #[test]
        fn outline_of_adjacent_rooms_is_single_rectangle() {
            let loops = outline_loops(&[square(0.0, 0.0, 10.0), square(10.0, 0.0, 10.0)]);
            assert_eq!(loops.len(), 1);
            assert_eq!(loops[0].len(), 4);
            assert!((polygon_area(&loops[0]) - 200.0).abs() < 1e-6);
        }

        #[test]
        fn outline_splits_t_junctions() {
            // 一个大房间与两个小房间相邻，共享边在中点处形成 T 形接点
            let big = vec![
                Point2::new(0.0, 0.0),
                Point2::new(20.0, 0.0),
                Point2::new(20.0, 10.0),
                Point2::new(0.0, 10.0),
            ];
            let loops = outline_loops(&[big, square(0.0, 10.0, 10.0), square(10.0, 10.0, 10.0)]);
            assert_eq!(loops.len(), 1);
            assert_eq!(loops[0].len(), 4);
            assert!((polygon_area(&loops[0]) - 400.0).abs() < 1e-6);
        }

        #[test]
        fn separate_rooms_give_separate_outlines() {
            let loops = outline_loops(&[square(0.0, 0.0, 10.0), square(50.0, 0.0, 10.0)]);
            assert_eq!(loops.len(), 2);
        }

        #[test]
        fn simplify_removes_collinear_vertices() {
            let points = vec![
                Point2::new(0.0, 0.0),
                Point2::new(5.0, 0.0),
                Point2::new(10.0, 0.0),
                Point2::new(10.0, 10.0),
                Point2::new(0.0, 10.0),
            ];
            assert_eq!(simplify_polygon(&points).len(), 4);
        }
    }
}

pub mod document {
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    use crate::geometry::{Bounds2D, Point2, outline_loops, polygon_area, polygon_bounds};
    use crate::store::FloorPlanId;

    /// 开口最小宽度。
    pub const MIN_OPENING_WIDTH: f64 = 12.0;
    /// 树冠最小直径。
    pub const MIN_TREE_DIAMETER: f64 = 1.0;

    pub const DEFAULT_GROUP_HEIGHT: f64 = 96.0;
    pub const DEFAULT_OPENING_WIDTH: f64 = 36.0;
    pub const DEFAULT_OPENING_HEIGHT: f64 = 78.0;
    pub const DEFAULT_SURFACE_COLOR: &str = "#8c8c8c";
    pub const DEFAULT_TREE_HEIGHT: f64 = 240.0;
    pub const DEFAULT_TREE_DIAMETER: f64 = 120.0;
    pub const DEFAULT_GROUND_COLOR: &str = "#4a7c2f";
    pub const DEFAULT_LIGHT_TEMPERATURE: f64 = 3000.0;

    /// 不透明的实体标识。缺失时在首次加载（反序列化）时生成一次。
    #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct EntityId(String);

    impl EntityId {
        #[inline]
        pub fn new(raw: impl Into<String>) -> Self {
            Self(raw.into())
        }

        pub fn generate() -> Self {
            Self(Uuid::new_v4().to_string())
        }

        #[inline]
        pub fn as_str(&self) -> &str {
            &self.0
        }
    }

    impl std::fmt::Display for EntityId {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(&self.0)
        }
    }

    /// 与缓存/持久化协作方交换的完整文档。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct FloorPlanDocument {
        pub floor_plan_id: FloorPlanId,
        #[serde(default)]
        pub name: String,
        pub data: FloorPlan,
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct FloorPlan {
        #[serde(default)]
        pub groups: Vec<Group>,
        #[serde(default)]
        pub appearance: Appearance,
    }

    impl FloorPlan {
        /// 所有楼层的包围盒；空平面返回非有限框。
        pub fn bounding_box(&self) -> Bounds2D {
            let mut bounds = Bounds2D::empty();
            for group in &self.groups {
                bounds.include_bounds(&group.bounding_box());
            }
            bounds
        }

        /// 按标高自下而上排序的楼层下标。
        pub fn groups_by_elevation(&self) -> Vec<usize> {
            let mut order: Vec<usize> = (0..self.groups.len()).collect();
            order.sort_by(|a, b| {
                self.groups[*a]
                    .elevation
                    .total_cmp(&self.groups[*b].elevation)
            });
            order
        }

        /// 紧邻下方的楼层。
        pub fn group_below(&self, index: usize) -> Option<usize> {
            let order = self.groups_by_elevation();
            let position = order.iter().position(|candidate| *candidate == index)?;
            position.checked_sub(1).map(|below| order[below])
        }

        pub fn lowest_elevation(&self) -> f64 {
            self.groups
                .iter()
                .map(|group| group.elevation)
                .min_by(f64::total_cmp)
                .unwrap_or(0.0)
        }

        pub fn group(&self, index: usize) -> Option<&Group> {
            self.groups.get(index)
        }

        pub fn group_mut(&mut self, index: usize) -> Option<&mut Group> {
            self.groups.get_mut(index)
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Appearance {
        /// 三维视图绕竖直轴的旋转角（度）。
        #[serde(default)]
        pub rotation: f64,
        #[serde(default = "Appearance::default_ground_color")]
        pub ground_color: String,
    }

    impl Appearance {
        fn default_ground_color() -> String {
            DEFAULT_GROUND_COLOR.to_string()
        }
    }

    impl Default for Appearance {
        fn default() -> Self {
            Self {
                rotation: 0.0,
                ground_color: Self::default_ground_color(),
            }
        }
    }

    /// 一个楼层。`elevation` 与 `height` 决定竖向拉伸范围。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Group {
        #[serde(default = "EntityId::generate")]
        pub group_id: EntityId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub name: Option<String>,
        #[serde(default)]
        pub elevation: f64,
        #[serde(default = "Group::default_height")]
        pub height: f64,
        #[serde(default)]
        pub rooms: Vec<Room>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub walls: Option<Vec<Wall>>,
        #[serde(default)]
        pub openings: Vec<Opening>,
        #[serde(default)]
        pub surfaces: Vec<Surface>,
        #[serde(default)]
        pub trees: Vec<Tree>,
        #[serde(default)]
        pub light_sources: Vec<LightSource>,
    }

    impl Group {
        fn default_height() -> f64 {
            DEFAULT_GROUP_HEIGHT
        }

        pub fn new(elevation: f64, height: f64) -> Self {
            Self {
                group_id: EntityId::generate(),
                name: None,
                elevation,
                height,
                rooms: Vec::new(),
                walls: None,
                openings: Vec::new(),
                surfaces: Vec::new(),
                trees: Vec::new(),
                light_sources: Vec::new(),
            }
        }

        /// 各房间包围盒的并集。
        pub fn bounding_box(&self) -> Bounds2D {
            let mut bounds = Bounds2D::empty();
            for room in &self.rooms {
                bounds.include_bounds(&room.bounding_box());
            }
            bounds
        }

        #[inline]
        pub fn top(&self) -> f64 {
            self.elevation + self.height
        }

        /// 房间合并后的外轮廓，每个连通块一条闭合环。
        pub fn outlines(&self) -> Vec<Vec<Point2>> {
            let rooms: Vec<Vec<Point2>> =
                self.rooms.iter().map(|room| room.world_points()).collect();
            outline_loops(&rooms)
        }

        pub fn room(&self, id: &EntityId) -> Option<&Room> {
            self.rooms.iter().find(|room| &room.room_id == id)
        }

        pub fn room_mut(&mut self, id: &EntityId) -> Option<&mut Room> {
            self.rooms.iter_mut().find(|room| &room.room_id == id)
        }

        pub fn opening(&self, id: &EntityId) -> Option<&Opening> {
            self.openings.iter().find(|opening| &opening.opening_id == id)
        }

        pub fn opening_mut(&mut self, id: &EntityId) -> Option<&mut Opening> {
            self.openings
                .iter_mut()
                .find(|opening| &opening.opening_id == id)
        }

        pub fn surface(&self, id: &EntityId) -> Option<&Surface> {
            self.surfaces.iter().find(|surface| &surface.surface_id == id)
        }

        pub fn surface_mut(&mut self, id: &EntityId) -> Option<&mut Surface> {
            self.surfaces
                .iter_mut()
                .find(|surface| &surface.surface_id == id)
        }

        pub fn tree(&self, id: &EntityId) -> Option<&Tree> {
            self.trees.iter().find(|tree| &tree.tree_id == id)
        }

        pub fn tree_mut(&mut self, id: &EntityId) -> Option<&mut Tree> {
            self.trees.iter_mut().find(|tree| &tree.tree_id == id)
        }
    }

    /// 房间：`points` 相对于 `(x, y)`。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Room {
        #[serde(default = "EntityId::generate")]
        pub room_id: EntityId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub name: Option<String>,
        #[serde(default)]
        pub x: f64,
        #[serde(default)]
        pub y: f64,
        pub points: Vec<Point2>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub sensor_id: Option<u64>,
    }

    impl Room {
        pub fn new(x: f64, y: f64, points: Vec<Point2>) -> Self {
            Self {
                room_id: EntityId::generate(),
                name: None,
                x,
                y,
                points,
                sensor_id: None,
            }
        }

        #[inline]
        pub fn origin(&self) -> Point2 {
            Point2::new(self.x, self.y)
        }

        pub fn world_points(&self) -> Vec<Point2> {
            to_world(&self.points, self.x, self.y)
        }

        pub fn bounding_box(&self) -> Bounds2D {
            polygon_bounds(&self.world_points())
        }

        pub fn area(&self) -> f64 {
            polygon_area(&self.points)
        }
    }

    /// 显式墙段（世界坐标）。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Wall {
        #[serde(default = "EntityId::generate")]
        pub wall_id: EntityId,
        pub x1: f64,
        pub y1: f64,
        pub x2: f64,
        pub y2: f64,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum OpeningKind {
        #[default]
        Empty,
        Door,
        Window,
    }

    impl OpeningKind {
        pub fn parse(raw: &str) -> Option<Self> {
            match raw {
                "empty" => Some(Self::Empty),
                "door" => Some(Self::Door),
                "window" => Some(Self::Window),
                _ => None,
            }
        }
    }

    /// 开口沿其延伸的坐标轴。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum OpeningRotation {
        #[default]
        Horizontal,
        Vertical,
    }

    /// 墙上的门、窗或空洞，以 `(x, y)` 为中心，沿轴向半宽 `width / 2`。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Opening {
        #[serde(default = "EntityId::generate")]
        pub opening_id: EntityId,
        #[serde(rename = "type", default)]
        pub kind: OpeningKind,
        #[serde(default)]
        pub rotation: OpeningRotation,
        pub x: f64,
        pub y: f64,
        #[serde(default = "Opening::default_width")]
        pub width: f64,
        #[serde(default = "Opening::default_height")]
        pub height: f64,
    }

    impl Opening {
        fn default_width() -> f64 {
            DEFAULT_OPENING_WIDTH
        }

        fn default_height() -> f64 {
            DEFAULT_OPENING_HEIGHT
        }

        pub fn new(kind: OpeningKind, x: f64, y: f64) -> Self {
            Self {
                opening_id: EntityId::generate(),
                kind,
                rotation: OpeningRotation::Horizontal,
                x,
                y,
                width: DEFAULT_OPENING_WIDTH,
                height: DEFAULT_OPENING_HEIGHT,
            }
        }

        /// 沿轴向的中心坐标。
        #[inline]
        pub fn axis_coordinate(&self) -> f64 {
            match self.rotation {
                OpeningRotation::Horizontal => self.x,
                OpeningRotation::Vertical => self.y,
            }
        }

        #[inline]
        pub fn set_axis_coordinate(&mut self, value: f64) {
            match self.rotation {
                OpeningRotation::Horizontal => self.x = value,
                OpeningRotation::Vertical => self.y = value,
            }
        }

        /// 开口两端点（世界坐标），沿轴向由小到大。
        pub fn endpoints(&self) -> (Point2, Point2) {
            let half = self.width * 0.5;
            match self.rotation {
                OpeningRotation::Horizontal => (
                    Point2::new(self.x - half, self.y),
                    Point2::new(self.x + half, self.y),
                ),
                OpeningRotation::Vertical => (
                    Point2::new(self.x, self.y - half),
                    Point2::new(self.x, self.y + half),
                ),
            }
        }

        /// 保证 `width >= 12` 且开口沿轴向不超出 `[-half_grid, half_grid]`。
        pub fn clamp_to_grid(&mut self, half_grid: f64) {
            self.width = self.width.max(MIN_OPENING_WIDTH).min(2.0 * half_grid);
            let half = self.width * 0.5;
            let axis = self
                .axis_coordinate()
                .clamp(-half_grid + half, half_grid - half);
            self.set_axis_coordinate(axis);
        }
    }

    /// 非房间的彩色区域（露台、平台等）。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Surface {
        #[serde(default = "EntityId::generate")]
        pub surface_id: EntityId,
        #[serde(default)]
        pub x: f64,
        #[serde(default)]
        pub y: f64,
        pub points: Vec<Point2>,
        #[serde(default = "Surface::default_color")]
        pub color: String,
        #[serde(default)]
        pub height: f64,
    }

    impl Surface {
        fn default_color() -> String {
            DEFAULT_SURFACE_COLOR.to_string()
        }

        pub fn new(x: f64, y: f64, points: Vec<Point2>) -> Self {
            Self {
                surface_id: EntityId::generate(),
                x,
                y,
                points,
                color: Self::default_color(),
                height: 0.0,
            }
        }

        pub fn world_points(&self) -> Vec<Point2> {
            to_world(&self.points, self.x, self.y)
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum TreeKind {
        Conical,
        #[default]
        Round,
        Oval,
    }

    impl TreeKind {
        pub fn parse(raw: &str) -> Option<Self> {
            match raw {
                "conical" => Some(Self::Conical),
                "round" => Some(Self::Round),
                "oval" => Some(Self::Oval),
                _ => None,
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Tree {
        #[serde(default = "EntityId::generate")]
        pub tree_id: EntityId,
        pub x: f64,
        pub y: f64,
        #[serde(default = "Tree::default_height")]
        pub height: f64,
        #[serde(default = "Tree::default_diameter")]
        pub diameter: f64,
        #[serde(rename = "type", default)]
        pub kind: TreeKind,
    }

    impl Tree {
        fn default_height() -> f64 {
            DEFAULT_TREE_HEIGHT
        }

        fn default_diameter() -> f64 {
            DEFAULT_TREE_DIAMETER
        }

        pub fn new(kind: TreeKind, x: f64, y: f64) -> Self {
            Self {
                tree_id: EntityId::generate(),
                x,
                y,
                height: DEFAULT_TREE_HEIGHT,
                diameter: DEFAULT_TREE_DIAMETER,
                kind,
            }
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            Point2::new(self.x, self.y)
        }

        #[inline]
        pub fn radius(&self) -> f64 {
            self.diameter * 0.5
        }

        /// 当前中心下树冠允许的最大直径。
        #[inline]
        pub fn max_diameter(&self, half_grid: f64) -> f64 {
            2.0 * (half_grid - self.x.abs()).min(half_grid - self.y.abs())
        }

        /// 设置直径：不小于 1，且树冠不越出网格。
        pub fn set_diameter_clamped(&mut self, diameter: f64, half_grid: f64) {
            self.diameter = diameter
                .max(MIN_TREE_DIAMETER)
                .min(self.max_diameter(half_grid));
        }

        /// 移动中心，保证树冠圆完整落在网格内。
        pub fn set_center_clamped(&mut self, x: f64, y: f64, half_grid: f64) {
            let radius = self.radius().min(half_grid);
            self.x = x.clamp(-half_grid + radius, half_grid - radius);
            self.y = y.clamp(-half_grid + radius, half_grid - radius);
        }
    }

    /// 楼层内的点光源。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct LightSource {
        #[serde(default = "EntityId::generate")]
        pub light_source_id: EntityId,
        pub x: f64,
        pub y: f64,
        #[serde(default = "LightSource::default_brightness")]
        pub brightness: f64,
        /// 色温（开尔文）。
        #[serde(default = "LightSource::default_temperature")]
        pub temperature: f64,
    }

    impl LightSource {
        fn default_brightness() -> f64 {
            1.0
        }

        fn default_temperature() -> f64 {
            DEFAULT_LIGHT_TEMPERATURE
        }
    }

    fn to_world(points: &[Point2], x: f64, y: f64) -> Vec<Point2> {
        points
            .iter()
            .map(|point| Point2::new(point.x() + x, point.y() + y))
            .collect()
    }

}

/// 缓存与持久化协作方的边界。核心从不自行获取或存储文档。
pub mod store {
    use serde::{Deserialize, Serialize};
    use thiserror::Error;

    use crate::document::{FloorPlan, FloorPlanDocument};

    /// 平面图文档的不透明标识。
    #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct FloorPlanId(String);

    impl FloorPlanId {
        #[inline]
        pub fn new(raw: impl Into<String>) -> Self {
            Self(raw.into())
        }

        #[inline]
        pub fn as_str(&self) -> &str {
            &self.0
        }
    }

    impl std::fmt::Display for FloorPlanId {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(&self.0)
        }
    }

    #[derive(Debug, Error)]
    pub enum StoreError {
        #[error("floor plan {0} not found")]
        NotFound(String),
        #[error("storage backend failure: {message}")]
        Backend {
            message: String,
            #[source]
            source: Box<dyn std::error::Error + Send + Sync>,
        },
    }

    /// 缓存侧：按标识提供文档。
    pub trait FloorPlanCache {
        fn load(&self, id: &FloorPlanId) -> Result<FloorPlanDocument, StoreError>;
    }

    /// 持久化侧：整份 `data` 覆盖写入，后写者胜出。
    pub trait FloorPlanPersistence {
        fn update(&mut self, id: &FloorPlanId, data: FloorPlan) -> Result<(), StoreError>;
    }
}
