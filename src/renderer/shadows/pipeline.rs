use hecs::Entity;

use super::collector::CasterCollector;
use super::programs::ShadowPrograms;
use super::renderer::{ShadowFrameStats, ShadowMapRenderer};
use super::shadow::Shadow;
use crate::renderer::backend::ShadowBackend;
use crate::renderer::program::ProgramComposer;
use crate::scene::components::{AffectingShadows, TransformComponent, WorldTransform};
use crate::scene::{Camera, Light, Scene, Transform};

/// Runs the shadow passes of a frame in order: prepare faces, collect
/// casters, draw maps, release orphaned maps.
///
/// Expects the scene's transforms and bounds to be current, i.e.
/// `Scene::update` ran earlier in the frame.
pub struct ShadowPipeline {
    collector: CasterCollector,
    renderer: ShadowMapRenderer,
    last_camera: Option<Camera>,
    frame: u64,
}

impl ShadowPipeline {
    pub fn new(composer: &mut dyn ProgramComposer) -> Self {
        let programs = ShadowPrograms::register(composer);
        Self {
            collector: CasterCollector::new(),
            renderer: ShadowMapRenderer::new(programs),
            last_camera: None,
            frame: 0,
        }
    }

    pub fn renderer(&self) -> &ShadowMapRenderer {
        &self.renderer
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn run_frame<B: ShadowBackend + ?Sized>(
        &mut self,
        scene: &mut Scene,
        backend: &mut B,
    ) -> ShadowFrameStats {
        let mut stats = ShadowFrameStats::default();
        let camera = *scene.camera();
        let root = scene.root();
        let camera_changed = self.last_camera != Some(camera);
        self.last_camera = Some(camera);

        for (_, affecting) in scene.world.query_mut::<&mut AffectingShadows>() {
            affecting.clear();
        }

        let lights: Vec<Entity> = scene
            .world
            .query::<(&Light, &Shadow)>()
            .iter()
            .map(|(entity, _)| entity)
            .collect();

        let world = &scene.world;
        let assets = &mut scene.assets;

        for light_entity in lights {
            let Ok(light) = world.get::<&Light>(light_entity).map(|l| *l) else {
                continue;
            };
            let light_world = light_transform(world, light_entity);
            let Ok(mut shadow) = world.get::<&mut Shadow>(light_entity) else {
                continue;
            };

            shadow.prepare(&light, &light_world, &camera, camera_changed);
            if shadow.is_enabled() {
                self.collector.collect(world, root, light_entity, &mut shadow);
            }
            self.renderer
                .render(backend, world, assets, light_entity, &mut shadow, &mut stats);
        }

        self.renderer.release_orphans(backend, world, &mut stats);

        self.frame += 1;
        log::debug!("Shadow frame {}: {}", self.frame, stats);
        stats
    }

    /// Releases every shadow map; call before dropping the backend.
    pub fn shutdown<B: ShadowBackend + ?Sized>(&mut self, backend: &mut B) {
        self.renderer.release_all(backend);
        self.last_camera = None;
    }
}

fn light_transform(world: &hecs::World, light: Entity) -> Transform {
    if let Ok(world_transform) = world.get::<&WorldTransform>(light) {
        return world_transform.0;
    }
    world
        .get::<&TransformComponent>(light)
        .map(|t| t.0)
        .unwrap_or_default()
}
