use glam::Vec3;
use hecs::Entity;
use wgpu_shadows::asset::{Handle, MeshData};
use wgpu_shadows::renderer::shadows::{Shadow, ShadowConfig, ShadowFrameStats, ShadowPipeline};
use wgpu_shadows::renderer::{
    cube_mesh, plane_mesh, CommandRecorder, DepthTargetId, LayerContents, ProgramLibrary,
    ShadowCommand,
};
use wgpu_shadows::scene::{AffectingShadows, Light, Scene, ShadowRole, Transform};

struct Fixture {
    scene: Scene,
    pipeline: ShadowPipeline,
    recorder: CommandRecorder,
    cube: Handle<MeshData>,
    caster: Entity,
    ground: Entity,
}

impl Fixture {
    fn new() -> Self {
        let mut scene = Scene::new();
        let (vertices, indices) = plane_mesh(20.0);
        let plane = scene.add_mesh(MeshData::new(vertices, indices));
        let (vertices, indices) = cube_mesh();
        let cube = scene.add_mesh(MeshData::new(vertices, indices));

        let root = scene.root();
        let ground = scene
            .spawn_shape(root, plane, Transform::IDENTITY, ShadowRole::RECEIVER)
            .unwrap();
        let caster = scene
            .spawn_shape(
                root,
                cube,
                Transform::from_translation(Vec3::new(0.0, 1.0, 0.0)),
                ShadowRole::BOTH,
            )
            .unwrap();

        {
            let camera = scene.camera_mut();
            camera.eye = Vec3::new(0.0, 5.0, 10.0);
            camera.target = Vec3::ZERO;
            camera.far = 50.0;
        }

        let mut library = ProgramLibrary::new();
        let pipeline = ShadowPipeline::new(&mut library);

        Self {
            scene,
            pipeline,
            recorder: CommandRecorder::new(),
            cube,
            caster,
            ground,
        }
    }

    fn add_spot(&mut self) -> Entity {
        self.scene.add_light(
            Light::spot(Vec3::ONE, 1.0, 0.4, 0.6, 50.0),
            Transform::looking_at(Vec3::new(0.0, 10.0, 0.0), Vec3::ZERO, Vec3::Z),
        )
    }

    fn add_point(&mut self) -> Entity {
        self.scene.add_light(
            Light::point(Vec3::ONE, 1.0, 20.0),
            Transform::from_translation(Vec3::new(0.0, 4.0, 0.0)),
        )
    }

    fn frame(&mut self) -> ShadowFrameStats {
        self.recorder.clear_commands();
        self.scene.update();
        self.pipeline.run_frame(&mut self.scene, &mut self.recorder)
    }

    fn map_of(&self, light: Entity) -> Option<DepthTargetId> {
        self.scene.world.get::<&Shadow>(light).ok().and_then(|s| s.map())
    }

    fn with_shadow<R>(&self, light: Entity, f: impl FnOnce(&mut Shadow) -> R) -> R {
        let mut shadow = self.scene.world.get::<&mut Shadow>(light).unwrap();
        f(&mut shadow)
    }
}

#[test]
fn spot_shadow_draws_caster_and_links_receivers() {
    let mut fx = Fixture::new();
    let light = fx.add_spot();

    let stats = fx.frame();

    assert_eq!(stats.shadows, 1);
    assert_eq!(stats.faces_drawn, 1);
    assert_eq!(stats.casters, 1);
    assert_eq!(stats.draws, 1);
    assert_eq!(fx.recorder.draw_count(), 1);

    let target = fx.map_of(light).unwrap();
    assert_eq!(fx.recorder.layer_count(target), Some(1));
    assert_eq!(fx.recorder.target_size(target), Some(1024));
    assert_eq!(fx.recorder.layer_contents(target, 0), Some(LayerContents::Drawn(1)));

    let ground = fx.scene.world.get::<&AffectingShadows>(fx.ground).unwrap();
    assert!(ground.contains(light));
    let caster = fx.scene.world.get::<&AffectingShadows>(fx.caster).unwrap();
    assert!(caster.contains(light));
}

#[test]
fn every_face_is_cleared_before_drawing() {
    let mut fx = Fixture::new();
    let light = fx.add_spot();
    fx.frame();
    let target = fx.map_of(light).unwrap();

    let commands = fx.recorder.commands();
    let clear = commands
        .iter()
        .position(|c| {
            matches!(c, ShadowCommand::Clear { target: t, layer: Some(0) } if *t == target)
        })
        .unwrap();
    let draw = commands
        .iter()
        .position(|c| matches!(c, ShadowCommand::Draw { .. }))
        .unwrap();
    assert!(clear < draw);
}

#[test]
fn disabled_shadow_clears_map_even_with_stale_casters() {
    let mut fx = Fixture::new();
    let light = fx.add_spot();
    fx.frame();
    let target = fx.map_of(light).unwrap();

    fx.with_shadow(light, |shadow| {
        assert_eq!(shadow.caster_count(), 1);
        shadow.set_enabled(false);
        assert_eq!(shadow.caster_count(), 1);
    });

    let stats = fx.frame();

    assert_eq!(stats.disabled, 1);
    assert_eq!(stats.draws, 0);
    assert_eq!(fx.recorder.draw_count(), 0);
    assert!(fx
        .recorder
        .commands()
        .contains(&ShadowCommand::Clear { target, layer: None }));
    assert_eq!(fx.recorder.layer_contents(target, 0), Some(LayerContents::Cleared));
    fx.with_shadow(light, |shadow| assert_eq!(shadow.caster_count(), 0));

    let ground = fx.scene.world.get::<&AffectingShadows>(fx.ground).unwrap();
    assert!(!ground.contains(light));
}

#[test]
fn disabled_shadow_without_map_does_nothing() {
    let mut fx = Fixture::new();
    let light = fx.scene.add_light_with_shadow(
        Light::spot(Vec3::ONE, 1.0, 0.4, 0.6, 50.0),
        Transform::looking_at(Vec3::new(0.0, 10.0, 0.0), Vec3::ZERO, Vec3::Z),
        ShadowConfig::disabled(),
    );

    let stats = fx.frame();

    assert_eq!(stats.disabled, 1);
    assert_eq!(stats.targets_created, 0);
    assert!(fx.recorder.commands().is_empty());
    assert_eq!(fx.map_of(light), None);
}

#[test]
fn geometry_is_built_once_and_updated_when_dirty() {
    let mut fx = Fixture::new();
    fx.add_spot();

    let first = fx.frame();
    assert_eq!(first.geometry_built, 1);
    assert_eq!(first.geometry_updated, 0);

    let second = fx.frame();
    assert_eq!(second.geometry_built, 0);
    assert_eq!(second.geometry_updated, 0);

    fx.scene.assets.meshes.get_mut(fx.cube).unwrap().mark_dirty();
    let third = fx.frame();
    assert_eq!(third.geometry_built, 0);
    assert_eq!(third.geometry_updated, 1);
    assert_eq!(
        fx.recorder
            .count(|c| matches!(c, ShadowCommand::UpdateGeometry(mesh) if *mesh == fx.cube)),
        1
    );
    assert!(!fx.scene.assets.meshes.get(fx.cube).unwrap().is_dirty());
}

#[test]
fn variant_uniform_is_written_only_on_change() {
    let mut fx = Fixture::new();
    fx.add_spot();
    fx.scene.add_light(
        Light::spot(Vec3::ONE, 1.0, 0.4, 0.6, 50.0),
        Transform::looking_at(Vec3::new(3.0, 10.0, 0.0), Vec3::ZERO, Vec3::Z),
    );

    let first = fx.frame();
    assert_eq!(first.shadows, 2);
    assert_eq!(first.variant_switches, 1);
    assert_eq!(
        fx.recorder.count(|c| matches!(c, ShadowCommand::WriteVariant(_))),
        1
    );

    let second = fx.frame();
    assert_eq!(second.variant_switches, 0);
    assert_eq!(
        fx.recorder.active_variant(),
        Some(fx.pipeline.renderer().programs().depth)
    );
}

#[test]
fn point_shadow_renders_six_layers_with_cube_variant() {
    let mut fx = Fixture::new();
    let light = fx.add_point();

    let stats = fx.frame();
    let target = fx.map_of(light).unwrap();

    assert_eq!(fx.recorder.layer_count(target), Some(6));
    assert_eq!(stats.faces_drawn + stats.faces_cleared, 6);
    assert_eq!(stats.geometry_built, 1);
    assert_eq!(
        fx.recorder.active_variant(),
        Some(fx.pipeline.renderer().programs().depth_cube)
    );

    // The cube sits straight below the light.
    assert!(matches!(
        fx.recorder.layer_contents(target, 3),
        Some(LayerContents::Drawn(_))
    ));
    for layer in 0..6 {
        assert_ne!(fx.recorder.layer_contents(target, layer), Some(LayerContents::Undefined));
    }
}

#[test]
fn distant_shadow_gets_one_layer_per_cascade() {
    let mut fx = Fixture::new();
    let light = fx.scene.add_light(
        Light::distant(Vec3::ONE, 1.0),
        Transform::looking_at(Vec3::new(4.0, 10.0, 4.0), Vec3::ZERO, Vec3::Y),
    );

    fx.frame();
    let target = fx.map_of(light).unwrap();
    assert_eq!(fx.recorder.layer_count(target), Some(4));

    fx.with_shadow(light, |shadow| {
        let splits = shadow.cascade_splits().unwrap();
        assert_eq!(splits.count(), 4);
        assert_eq!(splits.far()[3], 50.0);
    });
}

#[test]
fn resolution_change_rebuilds_the_map() {
    let mut fx = Fixture::new();
    let light = fx.add_spot();
    fx.frame();
    let old = fx.map_of(light).unwrap();

    fx.with_shadow(light, |shadow| {
        let config = ShadowConfig {
            resolution: 512,
            ..*shadow.config()
        };
        shadow.set_config(config);
    });
    let stats = fx.frame();

    let new = fx.map_of(light).unwrap();
    assert_ne!(old, new);
    assert_eq!(stats.targets_released, 1);
    assert_eq!(stats.targets_created, 1);
    assert!(!fx.recorder.is_live(old));
    assert_eq!(fx.recorder.target_size(new), Some(512));
}

#[test]
fn removing_a_light_releases_its_map() {
    let mut fx = Fixture::new();
    let light = fx.add_spot();
    fx.frame();
    assert_eq!(fx.recorder.live_targets(), 1);

    fx.scene.remove(light).unwrap();
    let stats = fx.frame();

    assert_eq!(stats.shadows, 0);
    assert_eq!(stats.targets_released, 1);
    assert_eq!(fx.recorder.live_targets(), 0);
    assert_eq!(fx.pipeline.renderer().live_targets(), 0);
}

#[test]
fn groups_outside_the_light_are_pruned() {
    let mut fx = Fixture::new();
    fx.add_spot();
    let root = fx.scene.root();
    let far_group = fx
        .scene
        .spawn_child(root, Transform::from_translation(Vec3::new(500.0, 0.0, 500.0)))
        .unwrap();
    for i in 0..5 {
        fx.scene
            .spawn_shape(
                far_group,
                fx.cube,
                Transform::from_translation(Vec3::new(i as f32 * 2.0, 0.0, 0.0)),
                ShadowRole::BOTH,
            )
            .unwrap();
    }

    let stats = fx.frame();
    assert_eq!(stats.casters, 1);
    assert_eq!(stats.draws, 1);
}

#[test]
fn ambient_lights_have_no_shadow() {
    let mut fx = Fixture::new();
    let light = fx.scene.add_light(Light::ambient(Vec3::ONE, 0.2), Transform::IDENTITY);

    let stats = fx.frame();

    assert_eq!(stats.shadows, 0);
    assert!(fx.scene.world.get::<&Shadow>(light).is_err());
}

#[test]
fn shutdown_releases_every_map() {
    let mut fx = Fixture::new();
    fx.add_spot();
    fx.add_point();
    fx.frame();
    assert_eq!(fx.recorder.live_targets(), 2);

    fx.pipeline.shutdown(&mut fx.recorder);

    assert_eq!(fx.recorder.live_targets(), 0);
    assert_eq!(fx.pipeline.renderer().live_targets(), 0);
}
