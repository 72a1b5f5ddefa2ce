use glam::{DVec2, DVec3};
use homeplan_core::geometry::{Point2, signed_area};

use crate::errors::ViewerError;
use crate::mesh::Mesh;

/// 三角剖分简单多边形，返回顶点下标三元组。
pub fn triangulate(points: &[DVec2]) -> Result<Vec<[usize; 3]>, ViewerError> {
    let count = points.len();
    if count < 3 {
        return Err(ViewerError::Triangulation(format!(
            "need at least 3 points, got {count}"
        )));
    }
    if count == 3 {
        return Ok(vec![[0, 1, 2]]);
    }
    let mut flat = Vec::with_capacity(count * 2);
    for point in points {
        flat.push(point.x);
        flat.push(point.y);
    }
    let indices = earcutr::earcut(&flat, &[], 2)
        .map_err(|err| ViewerError::Triangulation(format!("{err:?}")))?;
    if indices.is_empty() {
        return Err(ViewerError::Triangulation(
            "polygon produced no triangles".to_string(),
        ));
    }
    Ok(indices
        .chunks_exact(3)
        .map(|tri| [tri[0], tri[1], tri[2]])
        .collect())
}

/// 把平面多边形拉伸为 `[bottom, top]` 之间的实体：上下盖加侧面。
pub fn extrude_polygon(points: &[Point2], bottom: f64, top: f64) -> Result<Mesh, ViewerError> {
    if top <= bottom {
        return Err(ViewerError::InvalidExtrusion(format!(
            "top {top} must be above bottom {bottom}"
        )));
    }
    let mut ring: Vec<DVec2> = points.iter().map(|p| p.as_vec2()).collect();
    if signed_area(points) < 0.0 {
        ring.reverse();
    }
    let caps = triangulate(&ring)?;
    let count = ring.len();
    let mut mesh = Mesh::with_capacity(count * 6, caps.len() * 2 + count * 2);

    let lower: Vec<u32> = ring.iter().map(|p| mesh.push_vertex(p.extend(bottom))).collect();
    let upper: Vec<u32> = ring.iter().map(|p| mesh.push_vertex(p.extend(top))).collect();
    for [a, b, c] in &caps {
        mesh.push_triangle(lower[*a], lower[*c], lower[*b]);
        mesh.push_triangle(upper[*a], upper[*b], upper[*c]);
    }
    for i in 0..count {
        let j = (i + 1) % count;
        mesh.push_quad(
            ring[i].extend(bottom),
            ring[j].extend(bottom),
            ring[j].extend(top),
            ring[i].extend(top),
        );
    }
    Ok(mesh)
}

/// 平面多边形的单面网格，位于高度 `z`。
pub fn flat_polygon(points: &[Point2], z: f64) -> Result<Mesh, ViewerError> {
    let ring: Vec<DVec2> = points.iter().map(|p| p.as_vec2()).collect();
    let triangles = triangulate(&ring)?;
    let mut mesh = Mesh::with_capacity(ring.len(), triangles.len());
    let indices: Vec<u32> = ring.iter().map(|p| mesh.push_vertex(p.extend(z))).collect();
    for [a, b, c] in triangles {
        mesh.push_triangle(indices[a], indices[b], indices[c]);
    }
    Ok(mesh)
}

/// 以线段 `start → end` 为中线、厚 `thickness` 的竖直墙块。
pub fn wall_block(start: DVec2, end: DVec2, thickness: f64, bottom: f64, top: f64) -> Mesh {
    let direction = (end - start).normalize_or_zero();
    if direction == DVec2::ZERO || top <= bottom {
        return Mesh::new();
    }
    let half = direction.perp() * (thickness * 0.5);
    let footprint = [start - half, end - half, end + half, start + half];
    Mesh::prism_from_footprint(&footprint, bottom, top)
}

/// 三角形在水平面上投影面积之和。
pub fn projected_area(mesh: &Mesh) -> f64 {
    mesh.triangles()
        .map(|[a, b, c]| {
            let ab: DVec3 = b - a;
            let ac: DVec3 = c - a;
            ab.truncate().perp_dot(ac.truncate()).abs() * 0.5
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn l_shape() -> Vec<Point2> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(200.0, 0.0),
            Point2::new(200.0, 100.0),
            Point2::new(100.0, 100.0),
            Point2::new(100.0, 200.0),
            Point2::new(0.0, 200.0),
        ]
    }

    #[test]
    fn extruded_caps_cover_polygon_area() {
        let mesh = extrude_polygon(&l_shape(), 0.0, 96.0).expect("extrude");
        // 上下盖各 4 个三角形，侧面 6 个四边形
        assert_eq!(mesh.triangle_count(), 4 * 2 + 6 * 2);
        let top = flat_polygon(&l_shape(), 96.0).expect("flat");
        assert_relative_eq!(projected_area(&top), 30000.0, epsilon = 1e-6);
        let (min, max) = mesh.bounds().expect("bounds");
        assert_eq!(min.z, 0.0);
        assert_eq!(max.z, 96.0);
    }

    #[test]
    fn clockwise_input_is_accepted() {
        let mut points = l_shape();
        points.reverse();
        assert!(extrude_polygon(&points, 0.0, 10.0).is_ok());
    }

    #[test]
    fn degenerate_input_is_rejected() {
        let points = vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)];
        assert!(matches!(
            extrude_polygon(&points, 0.0, 10.0),
            Err(ViewerError::Triangulation(_))
        ));
        assert!(matches!(
            extrude_polygon(&l_shape(), 10.0, 10.0),
            Err(ViewerError::InvalidExtrusion(_))
        ));
    }

    #[test]
    fn wall_block_has_requested_thickness() {
        let mesh = wall_block(DVec2::ZERO, DVec2::new(0.0, 50.0), 4.0, 0.0, 96.0);
        let (min, max) = mesh.bounds().expect("bounds");
        assert_relative_eq!(max.x - min.x, 4.0, epsilon = 1e-9);
        assert_relative_eq!(max.y - min.y, 50.0, epsilon = 1e-9);
    }
}
