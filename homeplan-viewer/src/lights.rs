use glam::DVec3;
use homeplan_core::document::Group;

use crate::scene::{Color, PointLight, SceneNode};

/// 光源距楼层顶面的下沉量。
pub const CEILING_OFFSET: f64 = 6.0;

/// 色温（开尔文）到 RGB 的经验近似，适用于 1000K–40000K。
pub fn kelvin_to_rgb(kelvin: f64) -> Color {
    let temperature = kelvin.clamp(1000.0, 40000.0) / 100.0;
    let red = if temperature <= 66.0 {
        255.0
    } else {
        329.698_727_446 * (temperature - 60.0).powf(-0.133_204_759_2)
    };
    let green = if temperature <= 66.0 {
        99.470_802_586_1 * temperature.ln() - 161.119_568_166_1
    } else {
        288.122_169_528_3 * (temperature - 60.0).powf(-0.075_514_849_2)
    };
    let blue = if temperature >= 66.0 {
        255.0
    } else if temperature <= 19.0 {
        0.0
    } else {
        138.517_731_223_1 * (temperature - 10.0).ln() - 305.044_792_730_7
    };
    Color::rgb(
        red.clamp(0.0, 255.0) / 255.0,
        green.clamp(0.0, 255.0) / 255.0,
        blue.clamp(0.0, 255.0) / 255.0,
    )
}

/// 楼层内的点光源，悬于顶面下方。
pub fn place_lights(group: &Group) -> Vec<SceneNode> {
    let z = group.top() - CEILING_OFFSET.min(group.height * 0.5);
    group
        .light_sources
        .iter()
        .map(|source| {
            SceneNode::light(
                format!("light:{}", source.light_source_id),
                PointLight {
                    position: DVec3::new(source.x, source.y, z),
                    color: kelvin_to_rgb(source.temperature),
                    intensity: source.brightness.max(0.0),
                },
            )
        })
        .collect()
}
