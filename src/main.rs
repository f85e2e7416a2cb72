use glam::{Quat, Vec2, Vec3};
use hecs::Entity;
use wgpu_shadows::asset::MeshData;
use wgpu_shadows::renderer::shadows::{Shadow, ShadowFactorModel, ShadowUniform};
use wgpu_shadows::renderer::{
    cube_mesh, plane_mesh, sphere_mesh, CommandRecorder, ProgramLibrary, RenderContext,
    ShadowBackend, WgpuShadowBackend,
};
use wgpu_shadows::scene::{Light, Scene, SceneError, ShadowRole, Transform, WorldTransform};
use wgpu_shadows::{ShadowKind, ShadowPipeline, ShadowSettings};

const FRAMES: usize = 3;

struct DemoScene {
    scene: Scene,
    lights: Vec<Entity>,
    spinner: Entity,
}

fn build_scene(settings: &ShadowSettings) -> Result<DemoScene, SceneError> {
    let mut scene = Scene::new();

    let (vertices, indices) = plane_mesh(40.0);
    let ground_mesh = scene.add_mesh(MeshData::new(vertices, indices));
    let (vertices, indices) = cube_mesh();
    let cube = scene.add_mesh(MeshData::new(vertices, indices));
    let (vertices, indices) = sphere_mesh(24, 16);
    let sphere = scene.add_mesh(MeshData::new(vertices, indices));

    let root = scene.root();
    scene.spawn_shape(root, ground_mesh, Transform::IDENTITY, ShadowRole::RECEIVER)?;

    let crates = scene
        .build()
        .with_name("crates")
        .with_transform(Transform::from_translation(Vec3::new(0.0, 0.5, 0.0)))
        .spawn()?;
    for x in [-2.0, 0.0, 2.0] {
        scene.spawn_shape(
            crates,
            cube,
            Transform::from_translation(Vec3::new(x, 0.0, 0.0)),
            ShadowRole::BOTH,
        )?;
    }
    let spinner = scene.spawn_shape(
        crates,
        sphere,
        Transform::from_translation(Vec3::new(0.0, 1.5, 0.0)),
        ShadowRole::CASTER,
    )?;

    // Far off to the side; every shadow frustum should prune it whole.
    let distant_group =
        scene.spawn_child(root, Transform::from_translation(Vec3::new(500.0, 0.0, 500.0)))?;
    for z in 0..4 {
        scene.spawn_shape(
            distant_group,
            cube,
            Transform::from_translation(Vec3::new(0.0, 0.5, z as f32 * 2.0)),
            ShadowRole::BOTH,
        )?;
    }

    {
        let camera = scene.camera_mut();
        camera.eye = Vec3::new(0.0, 6.0, 12.0);
        camera.target = Vec3::ZERO;
        camera.far = 60.0;
    }

    let lights = vec![
        scene.add_light_with_shadow(
            Light::distant(Vec3::ONE, 1.0),
            Transform::looking_at(Vec3::new(5.0, 10.0, 5.0), Vec3::ZERO, Vec3::Y),
            settings.config_for(ShadowKind::Distant),
        ),
        scene.add_light_with_shadow(
            Light::spot(Vec3::new(1.0, 0.9, 0.7), 4.0, 0.4, 0.6, 30.0),
            Transform::looking_at(Vec3::new(-4.0, 6.0, 2.0), Vec3::new(0.0, 0.5, 0.0), Vec3::Y),
            settings.config_for(ShadowKind::Spot),
        ),
        scene.add_light_with_shadow(
            Light::point(Vec3::new(0.6, 0.7, 1.0), 2.0, 12.0),
            Transform::from_translation(Vec3::new(0.0, 4.0, 3.0)),
            settings.config_for(ShadowKind::Point),
        ),
    ];

    Ok(DemoScene {
        scene,
        lights,
        spinner,
    })
}

fn run_frames<B: ShadowBackend>(
    demo: &mut DemoScene,
    pipeline: &mut ShadowPipeline,
    backend: &mut B,
    mut end_frame: impl FnMut(&mut B),
) {
    for frame in 0..FRAMES {
        let angle = frame as f32 * 0.5;
        let spin = Transform::from_trs(
            Vec3::new(0.0, 1.5, 0.0),
            Quat::from_rotation_y(angle),
            Vec3::ONE,
        );
        if let Err(err) = demo.scene.set_transform(demo.spinner, spin) {
            log::warn!("Could not move spinner: {}", err);
        }
        if frame == 1 {
            demo.scene.camera_mut().eye.x += 2.0;
        }

        demo.scene.update();
        let stats = pipeline.run_frame(&mut demo.scene, backend);
        end_frame(backend);
        log::info!("Frame {}: {}", frame, stats);
    }
}

/// Logs the darkest factor each shadow can produce on the ground below the
/// crates, i.e. with every depth comparison failing.
fn log_receiver_factors(demo: &DemoScene) {
    let scene = &demo.scene;
    let camera = scene.camera();
    let sample_point = Vec3::ZERO;
    let occluded = |_layer: u32, _uv: Vec2, _reference: f32| -> f32 { 0.0 };

    for &light_entity in &demo.lights {
        let Ok(shadow) = scene.world.get::<&Shadow>(light_entity) else {
            continue;
        };
        let Ok(light) = scene.world.get::<&Light>(light_entity) else {
            continue;
        };
        let light_world = scene
            .world
            .get::<&WorldTransform>(light_entity)
            .map(|t| t.0)
            .unwrap_or_default();

        let model = ShadowFactorModel::new(ShadowUniform::from_shadow(&shadow, camera));
        let attenuation = light.attenuation(&light_world, sample_point);
        let depth = camera.view_depth(sample_point);
        let factor = model.factor(&occluded, sample_point, depth, attenuation);
        log::info!(
            "{:?} shadow: {} casters, factor {:.3} at {:?}",
            shadow.kind(),
            shadow.caster_count(),
            factor,
            sample_point
        );
    }
}

fn main() {
    wgpu_shadows::init_logging();

    let settings = ShadowSettings::load();
    let mut demo = match build_scene(&settings) {
        Ok(demo) => demo,
        Err(err) => {
            log::error!("Failed to build demo scene: {}", err);
            return;
        }
    };

    let mut library = ProgramLibrary::new();
    let mut pipeline = ShadowPipeline::new(&mut library);
    log::info!("Registered {} shader variants", library.variant_count());

    match RenderContext::headless_blocking() {
        Ok(context) => {
            let programs = *pipeline.renderer().programs();
            let mut backend = WgpuShadowBackend::new(&context, programs);
            run_frames(&mut demo, &mut pipeline, &mut backend, |b| b.submit());
            pipeline.shutdown(&mut backend);
            backend.submit();
        }
        Err(err) => {
            log::warn!("{}; recording shadow commands instead", err);
            let mut recorder = CommandRecorder::new();
            run_frames(&mut demo, &mut pipeline, &mut recorder, |r| {
                log::debug!("Recorded {} commands", r.commands().len());
                r.clear_commands();
            });
            pipeline.shutdown(&mut recorder);
        }
    }

    log_receiver_factors(&demo);
    log::info!("Shadow demo finished after {} frames", pipeline.frame());
}
