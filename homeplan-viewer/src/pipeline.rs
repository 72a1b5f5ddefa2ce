//! 三维场景生成流水线。
//!
//! 阶段严格依次执行：结构（楼板、区域、墙体）、开口挖切、门窗构件、光源、屋顶、环境。
//! 环境依赖整个平面的包围盒，必须最后运行。各阶段只读数据模型。

use chrono::NaiveDate;
use glam::DVec3;
use homeplan_core::document::{FloorPlan, Group};
use homeplan_core::geometry::{Bounds2D, EPSILON, polygon_area};
use tracing::debug;

use crate::celestial::{build_celestial, sky_color, sun_position};
use crate::environment::{build_ground, build_trees, ground_bounds};
use crate::errors::ViewerError;
use crate::extrude::{extrude_polygon, flat_polygon};
use crate::fixtures::build_fixtures;
use crate::lights::place_lights;
use crate::openings::{Gap, WallSolid, cut_openings};
use crate::roof::synthesize_roof;
use crate::scene::{Color, Material, NodeCategory, SceneGraph, SceneNode};
use crate::season::{FoliageState, foliage_state};
use crate::walls::derive_walls;
use crate::weather::{Weather, particle_field};

const SLAB_THICKNESS: f64 = 1.0;
/// 区域贴面相对楼层标高的抬升，避免与楼板重叠闪烁。
const SURFACE_LIFT: f64 = 0.1;
const ROOM_COLOR: Color = Color::rgb(0.85, 0.82, 0.76);
const WALL_COLOR: Color = Color::rgb(0.93, 0.92, 0.89);
const ROOF_COLOR: Color = Color::rgb(0.55, 0.27, 0.21);
const SURFACE_FALLBACK: Color = Color::rgb(0.55, 0.55, 0.55);
/// 降水粒子场高出最高屋面的余量。
const WEATHER_HEADROOM: f64 = 120.0;

#[derive(Debug, Clone, PartialEq)]
pub struct GenerateOptions {
    pub wall_thickness: f64,
    /// 屋面坡度（升高 / 水平距离）。
    pub roof_pitch: f64,
    pub ground_padding: f64,
    pub fallback_half_extent: f64,
    pub latitude: f64,
    pub date: NaiveDate,
    pub hour: f64,
    pub weather: Weather,
    pub seed: u64,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            wall_thickness: 4.0,
            roof_pitch: 0.5,
            ground_padding: 120.0,
            fallback_half_extent: 180.0,
            latitude: 40.0,
            date: chrono::Local::now().date_naive(),
            hour: 12.0,
            weather: Weather::Clear,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Structure,
    Openings,
    Fixtures,
    Lights,
    Roofs,
    Environment,
}

impl Stage {
    pub const ORDER: [Stage; 6] = [
        Stage::Structure,
        Stage::Openings,
        Stage::Fixtures,
        Stage::Lights,
        Stage::Roofs,
        Stage::Environment,
    ];
}

#[derive(Debug, Clone)]
pub struct GeneratedScene {
    pub graph: SceneGraph,
    /// 各阶段按执行顺序及其新增节点数。
    pub stages: Vec<(Stage, usize)>,
    /// 地面范围。
    pub bounds: Bounds2D,
    pub sky: Color,
    pub foliage: FoliageState,
    pub roof_facets: usize,
}

impl GeneratedScene {
    pub fn stage_nodes(&self, stage: Stage) -> usize {
        self.stages
            .iter()
            .find(|(candidate, _)| *candidate == stage)
            .map_or(0, |(_, count)| *count)
    }
}

struct Builder<'a> {
    plan: &'a FloorPlan,
    options: &'a GenerateOptions,
    order: Vec<usize>,
    graph: SceneGraph,
    stages: Vec<(Stage, usize)>,
    walls: Vec<Vec<WallSolid>>,
    gaps: Vec<Gap>,
    roof_facets: usize,
}

impl<'a> Builder<'a> {
    fn groups(&self) -> impl Iterator<Item = &'a Group> + '_ {
        let plan = self.plan;
        self.order.iter().map(move |index| &plan.groups[*index])
    }

    fn run(&mut self, stage: Stage) -> Result<(), ViewerError> {
        let before = self.graph.len();
        match stage {
            Stage::Structure => self.structure()?,
            Stage::Openings => self.openings(),
            Stage::Fixtures => {
                let fixtures = build_fixtures(&self.gaps);
                self.graph.extend(fixtures);
            }
            Stage::Lights => {
                let lights: Vec<SceneNode> = self.groups().flat_map(place_lights).collect();
                self.graph.extend(lights);
            }
            Stage::Roofs => self.roofs()?,
            Stage::Environment => self.environment(),
        }
        let added = self.graph.len() - before;
        debug!(?stage, nodes = added, "流水线阶段完成");
        self.stages.push((stage, added));
        Ok(())
    }

    fn structure(&mut self) -> Result<(), ViewerError> {
        let mut nodes = Vec::new();
        let mut walls = Vec::with_capacity(self.order.len());
        for group in self.groups() {
            for room in &group.rooms {
                let points = room.world_points();
                if points.len() < 3 || polygon_area(&points) <= EPSILON {
                    debug!(room = %room.room_id, "房间多边形退化，跳过楼板");
                    continue;
                }
                let slab =
                    extrude_polygon(&points, group.elevation, group.elevation + SLAB_THICKNESS)?;
                nodes.push(SceneNode::mesh(
                    format!("room:{}", room.room_id),
                    NodeCategory::Room {
                        room_id: room.room_id.clone(),
                    },
                    slab,
                    Material::opaque(ROOM_COLOR),
                ));
            }
            for surface in &group.surfaces {
                let points = surface.world_points();
                if points.len() < 3 || polygon_area(&points) <= EPSILON {
                    continue;
                }
                let z = group.elevation + surface.height.max(0.0) + SURFACE_LIFT;
                nodes.push(SceneNode::mesh(
                    format!("surface:{}", surface.surface_id),
                    NodeCategory::Surface,
                    flat_polygon(&points, z)?,
                    Material::hex(&surface.color, SURFACE_FALLBACK),
                ));
            }
            walls.push(
                derive_walls(group)
                    .into_iter()
                    .map(|segment| {
                        WallSolid::new(
                            segment,
                            self.options.wall_thickness,
                            group.elevation,
                            group.top(),
                        )
                    })
                    .collect(),
            );
        }
        self.walls = walls;
        self.graph.extend(nodes);
        Ok(())
    }

    fn openings(&mut self) {
        let plan = self.plan;
        let mut gaps = Vec::new();
        for (index, solids) in self.order.iter().zip(self.walls.iter_mut()) {
            gaps.extend(cut_openings(solids, &plan.groups[*index]));
        }
        self.gaps = gaps;

        let nodes: Vec<SceneNode> = self
            .walls
            .iter()
            .flatten()
            .map(|solid| {
                SceneNode::mesh(
                    "wall",
                    NodeCategory::Wall,
                    solid.to_mesh(),
                    Material::opaque(WALL_COLOR),
                )
            })
            .filter(|node| node.as_mesh().is_some_and(|mesh| !mesh.is_empty()))
            .collect();
        self.graph.extend(nodes);
    }

    fn roofs(&mut self) -> Result<(), ViewerError> {
        let mut nodes = Vec::new();
        let groups: Vec<&'a Group> = self.groups().collect();
        for group in groups {
            for (index, outline) in group.outlines().iter().enumerate() {
                let Some(roof) = synthesize_roof(outline, group.top(), self.options.roof_pitch)
                else {
                    continue;
                };
                self.roof_facets += roof.facets.len();
                nodes.push(SceneNode::mesh(
                    format!("roof:{}:{index}", group.group_id),
                    NodeCategory::Roof,
                    roof.to_mesh()?,
                    Material::opaque(ROOF_COLOR),
                ));
            }
        }
        self.graph.extend(nodes);
        Ok(())
    }

    fn environment(&mut self) {
        let options = self.options;
        let bounds = ground_bounds(self.plan, options.ground_padding, options.fallback_half_extent);
        let ground = self.plan.lowest_elevation();
        self.graph.extend(build_ground(self.plan, &bounds));
        self.graph
            .extend(build_trees(self.plan, foliage_state(options.date)));

        let ceiling = self
            .groups()
            .map(Group::top)
            .fold(ground, f64::max)
            + WEATHER_HEADROOM;
        if let Some(field) = particle_field(options.weather, &bounds, ground, ceiling, options.seed)
        {
            self.graph.add(field);
        }

        let center = bounds.center();
        let distance = bounds.width().max(bounds.height()) * 1.5;
        self.graph.extend(build_celestial(
            options.date,
            options.hour,
            options.latitude,
            DVec3::new(center.x(), center.y(), ground),
            distance,
        ));
    }
}

/// 由平面生成完整三维场景。退化几何只记录日志并跳过，三角剖分失败才返回错误。
pub fn generate(plan: &FloorPlan, options: &GenerateOptions) -> Result<GeneratedScene, ViewerError> {
    let mut builder = Builder {
        plan,
        options,
        order: plan.groups_by_elevation(),
        graph: SceneGraph::new(),
        stages: Vec::with_capacity(Stage::ORDER.len()),
        walls: Vec::new(),
        gaps: Vec::new(),
        roof_facets: 0,
    };
    for stage in Stage::ORDER {
        builder.run(stage)?;
    }

    let sun = sun_position(options.date, options.hour, options.latitude);
    let scene = GeneratedScene {
        graph: builder.graph,
        stages: builder.stages,
        bounds: ground_bounds(plan, options.ground_padding, options.fallback_half_extent),
        sky: sky_color(sun),
        foliage: foliage_state(options.date),
        roof_facets: builder.roof_facets,
    };
    debug!(
        nodes = scene.graph.len(),
        roof_facets = scene.roof_facets,
        "场景生成完成"
    );
    Ok(scene)
}
