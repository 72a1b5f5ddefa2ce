use glam::{DVec2, DVec3};
use homeplan_core::geometry::{Bounds2D, Point2};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: DVec3,
    /// 单位向量。
    pub direction: DVec3,
}

impl Ray {
    /// 从 `height` 高处竖直向下穿过平面点 `point` 的视线，用于按平面坐标点选。
    pub fn vertical(point: Point2, height: f64) -> Self {
        Self {
            origin: DVec3::new(point.x(), point.y(), height),
            direction: DVec3::NEG_Z,
        }
    }

    #[inline]
    pub fn at(&self, distance: f64) -> DVec3 {
        self.origin + self.direction * distance
    }
}

/// 绕目标点旋转的透视相机，z 轴朝上。角度均以度计。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitCamera {
    pub target: DVec3,
    pub distance: f64,
    /// 绕竖直轴的方位角。
    pub yaw: f64,
    /// 俯仰角，限制在 (-89°, 89°)。
    pub pitch: f64,
    pub fov_y: f64,
    pub aspect: f64,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            target: DVec3::ZERO,
            distance: 600.0,
            yaw: -90.0,
            pitch: 35.0,
            fov_y: 45.0,
            aspect: 16.0 / 9.0,
        }
    }
}

impl OrbitCamera {
    pub fn eye(&self) -> DVec3 {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.clamp(-89.0, 89.0).to_radians());
        self.target
            + DVec3::new(
                pitch.cos() * yaw.cos(),
                pitch.cos() * yaw.sin(),
                pitch.sin(),
            ) * self.distance
    }

    pub fn set_yaw(&mut self, degrees: f64) {
        self.yaw = degrees.rem_euclid(360.0);
    }

    /// 对准包围盒中心，并拉远到整块包围盒都落在视野内。
    pub fn frame(&mut self, bounds: &Bounds2D, bottom: f64, top: f64) {
        if bounds.is_empty() || !bounds.is_finite() {
            return;
        }
        let center = bounds.center();
        self.target = DVec3::new(center.x(), center.y(), (bottom + top) * 0.5);
        let radius = DVec3::new(bounds.width(), bounds.height(), top - bottom).length() * 0.5;
        let half_fov = (self.fov_y.to_radians() * 0.5).max(1e-3);
        self.distance = (radius / half_fov.sin()).max(1.0);
    }

    /// 由归一化设备坐标（x、y 均在 [-1, 1]，y 向上）反投影出视线。
    pub fn ray(&self, ndc: DVec2) -> Ray {
        let eye = self.eye();
        let forward = (self.target - eye).normalize_or_zero();
        let mut right = forward.cross(DVec3::Z).normalize_or_zero();
        if right == DVec3::ZERO {
            right = DVec3::X;
        }
        let up = right.cross(forward);
        let tan = (self.fov_y.to_radians() * 0.5).tan();
        let direction = (forward + right * (ndc.x * tan * self.aspect) + up * (ndc.y * tan))
            .normalize_or_zero();
        Ray {
            origin: eye,
            direction,
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn center_ray_points_at_target() {
        let camera = OrbitCamera {
            target: DVec3::new(10.0, 20.0, 0.0),
            ..OrbitCamera::default()
        };
        let ray = camera.ray(DVec2::ZERO);
        let hit = ray.at(camera.distance);
        assert_relative_eq!(hit.x, 10.0, epsilon = 1e-9);
        assert_relative_eq!(hit.y, 20.0, epsilon = 1e-9);
        assert_relative_eq!(hit.z, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn vertical_ray_drops_through_plan_point() {
        let ray = Ray::vertical(Point2::new(84.0, -132.0), 500.0);
        let hit = ray.at(500.0);
        assert_eq!(hit, DVec3::new(84.0, -132.0, 0.0));
    }

    #[test]
    fn right_edge_of_screen_is_to_the_right() {
        let camera = OrbitCamera::default();
        // 默认从南侧看向北方，屏幕右侧为东（+x）。
        let ray = camera.ray(DVec2::new(0.5, 0.0));
        assert!(ray.direction.x > 0.0);
        assert_relative_eq!(ray.direction.length(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn frame_centres_bounds() {
        let mut camera = OrbitCamera::default();
        let bounds = Bounds2D::new(Point2::new(0.0, 0.0), Point2::new(200.0, 100.0));
        camera.frame(&bounds, 0.0, 96.0);
        assert_eq!(camera.target, DVec3::new(100.0, 50.0, 48.0));
        assert!(camera.distance > 120.0);
    }
}
