use chrono::{Datelike, NaiveDate};
use glam::DVec3;

use crate::mesh::Mesh;
use crate::scene::{Color, Material, NodeCategory, SceneNode};

const AXIAL_TILT_DEG: f64 = 23.44;
const DUSK_ELEVATION_DEG: f64 = 6.0;

pub const DAY_SKY: Color = Color::rgb(0.529, 0.808, 0.922);
pub const DUSK_SKY: Color = Color::rgb(0.957, 0.643, 0.376);
pub const NIGHT_SKY: Color = Color::rgb(0.043, 0.063, 0.149);

/// 天体在天空中的方位：仰角与方位角（度，方位角自北顺时针）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyPosition {
    pub elevation: f64,
    pub azimuth: f64,
}

impl SkyPosition {
    /// 指向天体的单位向量（x 东，y 北，z 上）。
    pub fn direction(&self) -> DVec3 {
        let (elevation, azimuth) = (self.elevation.to_radians(), self.azimuth.to_radians());
        DVec3::new(
            elevation.cos() * azimuth.sin(),
            elevation.cos() * azimuth.cos(),
            elevation.sin(),
        )
    }

    #[inline]
    pub fn is_above_horizon(&self) -> bool {
        self.elevation > 0.0
    }
}

/// 赤纬近似：`-23.44° · cos(360/365 · (N + 10))`。
pub fn solar_declination(date: NaiveDate) -> f64 {
    let day = f64::from(date.ordinal());
    -AXIAL_TILT_DEG * (360.0 / 365.0 * (day + 10.0)).to_radians().cos()
}

/// 当地太阳时 `hour` 下的太阳位置。
pub fn sun_position(date: NaiveDate, hour: f64, latitude: f64) -> SkyPosition {
    let declination = solar_declination(date).to_radians();
    let latitude = latitude.clamp(-90.0, 90.0).to_radians();
    let hour_angle = (15.0 * (hour - 12.0)).to_radians();

    let sin_elevation = latitude.sin() * declination.sin()
        + latitude.cos() * declination.cos() * hour_angle.cos();
    let elevation = sin_elevation.clamp(-1.0, 1.0).asin();
    let azimuth = hour_angle.sin().atan2(
        hour_angle.cos() * latitude.sin() - declination.tan() * latitude.cos(),
    ) + std::f64::consts::PI;
    SkyPosition {
        elevation: elevation.to_degrees(),
        azimuth: azimuth.to_degrees().rem_euclid(360.0),
    }
}

/// 月亮取太阳的对点，只用于画面点缀。
pub fn moon_position(sun: SkyPosition) -> SkyPosition {
    SkyPosition {
        elevation: -sun.elevation,
        azimuth: (sun.azimuth + 180.0).rem_euclid(360.0),
    }
}

/// 按太阳仰角分白天、黄昏、夜晚三档。
pub fn sky_color(sun: SkyPosition) -> Color {
    if sun.elevation > DUSK_ELEVATION_DEG {
        DAY_SKY
    } else if sun.elevation > -DUSK_ELEVATION_DEG {
        DUSK_SKY
    } else {
        NIGHT_SKY
    }
}

/// 日月两个节点，放在以 `center` 为心、半径 `distance` 的天球上，位于地平线下时隐藏。
pub fn build_celestial(
    date: NaiveDate,
    hour: f64,
    latitude: f64,
    center: DVec3,
    distance: f64,
) -> Vec<SceneNode> {
    let sun = sun_position(date, hour, latitude);
    let moon = moon_position(sun);
    let body = |name: &str, position: SkyPosition, radius: f64, color: Color| {
        let mut node = SceneNode::mesh(
            name,
            NodeCategory::Celestial,
            Mesh::ellipsoid(center + position.direction() * distance, radius, radius, 12, 8),
            Material::opaque(color),
        );
        node.visible = position.is_above_horizon();
        node
    };
    vec![
        body("sun", sun, distance * 0.05, Color::rgb(1.0, 0.95, 0.7)),
        body("moon", moon, distance * 0.03, Color::rgb(0.85, 0.85, 0.9)),
    ]
}
