use glam::DVec3;
use homeplan_core::geometry::Bounds2D;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::scene::{Color, Material, NodeCategory, NodeContent, ParticleField, SceneNode};

/// 每一万平方单位的粒子数。
const PARTICLE_DENSITY: f64 = 2.0;
const MAX_PARTICLES: usize = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Weather {
    #[default]
    Clear,
    Rain,
    Snow,
}

impl Weather {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "clear" => Some(Self::Clear),
            "rain" => Some(Self::Rain),
            "snow" => Some(Self::Snow),
            _ => None,
        }
    }
}

/// 覆盖 `bounds` 的降水粒子场，`[floor, ceiling]` 为竖向范围。同一种子得到同一粒子场。
pub fn particle_field(
    weather: Weather,
    bounds: &Bounds2D,
    floor: f64,
    ceiling: f64,
    seed: u64,
) -> Option<SceneNode> {
    let (velocity, size, color) = match weather {
        Weather::Clear => return None,
        Weather::Rain => (DVec3::new(0.0, 0.0, -8.0), 0.4, Color::rgb(0.6, 0.7, 0.85)),
        Weather::Snow => (DVec3::new(0.3, 0.0, -1.0), 1.2, Color::WHITE),
    };
    if ceiling <= floor || bounds.is_empty() || !bounds.is_finite() {
        return None;
    }
    let area = bounds.width() * bounds.height();
    let count = ((area / 10_000.0 * PARTICLE_DENSITY).ceil() as usize).clamp(1, MAX_PARTICLES);

    let mut rng = StdRng::seed_from_u64(seed);
    let positions = (0..count)
        .map(|_| {
            DVec3::new(
                rng.gen_range(bounds.left()..=bounds.right()),
                rng.gen_range(bounds.top()..=bounds.bottom()),
                rng.gen_range(floor..=ceiling),
            )
        })
        .collect();
    Some(SceneNode {
        name: format!("weather:{weather:?}").to_lowercase(),
        category: NodeCategory::Environment,
        content: NodeContent::Particles(ParticleField {
            positions,
            velocity,
            size,
        }),
        material: Material::opaque(color),
        visible: true,
        highlighted: false,
        foliage: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions(node: &SceneNode) -> &[DVec3] {
        match &node.content {
            NodeContent::Particles(field) => &field.positions,
            _ => panic!("expected particles"),
        }
    }

    #[test]
    fn clear_weather_has_no_particles() {
        let bounds = Bounds2D::symmetric(100.0);
        assert!(particle_field(Weather::Clear, &bounds, 0.0, 100.0, 1).is_none());
    }

    #[test]
    fn same_seed_gives_same_field_inside_bounds() {
        let bounds = Bounds2D::symmetric(300.0);
        let a = particle_field(Weather::Snow, &bounds, 0.0, 200.0, 7).expect("snow");
        let b = particle_field(Weather::Snow, &bounds, 0.0, 200.0, 7).expect("snow");
        assert_eq!(positions(&a), positions(&b));
        assert_eq!(positions(&a).len(), 72);
        assert!(positions(&a).iter().all(|p| {
            p.x.abs() <= 300.0 && p.y.abs() <= 300.0 && (0.0..=200.0).contains(&p.z)
        }));
        assert_eq!(a.name, "weather:snow");
    }

    #[test]
    fn parse_accepts_known_names() {
        assert_eq!(Weather::parse("Rain"), Some(Weather::Rain));
        assert_eq!(Weather::parse("hail"), None);
    }
}
