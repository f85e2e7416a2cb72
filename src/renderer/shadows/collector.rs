use hecs::{Entity, World};

use super::shadow::Shadow;
use crate::scene::components::{AffectingShadows, MeshComponent, ShadowRole};
use crate::scene::SceneTraverser;

/// Rebuilds per-face caster lists by walking the scene once per face.
#[derive(Default)]
pub struct CasterCollector {
    traverser: SceneTraverser,
}

impl CasterCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refills every face of `shadow` with the casters its frustum reaches
    /// and links `light` into the receivers it reaches. Returns the total
    /// number of casters collected.
    pub fn collect(
        &mut self,
        world: &World,
        root: Entity,
        light: Entity,
        shadow: &mut Shadow,
    ) -> usize {
        let mut total = 0;

        for (index, face) in shadow.faces_mut().iter_mut().enumerate() {
            face.casters.clear();
            let camera = face.camera;

            self.traverser.for_each_leaf(
                world,
                root,
                |bounds| camera.intersects(bounds),
                |entity| {
                    if world.get::<&MeshComponent>(entity).is_err() {
                        return;
                    }
                    let role = world
                        .get::<&ShadowRole>(entity)
                        .map(|r| *r)
                        .unwrap_or_default();
                    if role.caster {
                        face.casters.push(entity);
                    }
                    if role.receiver {
                        if let Ok(mut affecting) = world.get::<&mut AffectingShadows>(entity) {
                            affecting.link(light);
                        }
                    }
                },
            );

            log::trace!(
                "Light {:?} face {}: {} casters",
                light,
                index,
                face.casters.len()
            );
            total += face.casters.len();
        }

        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::MeshData;
    use crate::renderer::cube_mesh;
    use crate::renderer::shadows::{ShadowConfig, ShadowKind};
    use crate::scene::{Camera, Light, Scene, Transform};
    use glam::Vec3;

    fn scene_with_spot() -> (Scene, Entity) {
        let mut scene = Scene::new();
        let light = scene.add_light(
            Light::spot(Vec3::ONE, 1.0, 0.4, 0.6, 50.0),
            Transform::looking_at(Vec3::new(0.0, 10.0, 0.0), Vec3::ZERO, Vec3::Z),
        );
        (scene, light)
    }

    fn prepare(scene: &mut Scene, light: Entity) {
        scene.update();
        let transform = Transform::looking_at(Vec3::new(0.0, 10.0, 0.0), Vec3::ZERO, Vec3::Z);
        let light_value = *scene.world.get::<&Light>(light).unwrap();
        scene
            .world
            .get::<&mut Shadow>(light)
            .unwrap()
            .prepare(&light_value, &transform, &Camera::default(), true);
    }

    #[test]
    fn collects_casters_and_links_receivers() {
        let (mut scene, light) = scene_with_spot();
        let (vertices, indices) = cube_mesh();
        let mesh = scene.add_mesh(MeshData::new(vertices, indices));
        let root = scene.root();
        let caster = scene
            .spawn_shape(root, mesh, Transform::IDENTITY, ShadowRole::CASTER)
            .unwrap();
        let receiver = scene
            .spawn_shape(root, mesh, Transform::IDENTITY, ShadowRole::RECEIVER)
            .unwrap();
        let outside = scene
            .spawn_shape(root, mesh, Transform::from_translation(Vec3::X * 100.0), ShadowRole::BOTH)
            .unwrap();
        prepare(&mut scene, light);

        let mut collector = CasterCollector::new();
        let mut shadow = scene.world.get::<&mut Shadow>(light).unwrap();
        let total = collector.collect(&scene.world, root, light, &mut shadow);

        assert_eq!(total, 1);
        assert_eq!(shadow.faces()[0].casters, vec![caster]);
        assert!(scene.world.get::<&AffectingShadows>(receiver).unwrap().contains(light));
        assert!(!scene.world.get::<&AffectingShadows>(outside).unwrap().contains(light));
        assert!(!scene.world.get::<&AffectingShadows>(caster).unwrap().contains(light));
    }

    #[test]
    fn lists_are_rebuilt_not_appended() {
        let (mut scene, light) = scene_with_spot();
        let (vertices, indices) = cube_mesh();
        let mesh = scene.add_mesh(MeshData::new(vertices, indices));
        let root = scene.root();
        scene
            .spawn_shape(root, mesh, Transform::IDENTITY, ShadowRole::BOTH)
            .unwrap();
        prepare(&mut scene, light);

        let mut collector = CasterCollector::new();
        let mut shadow = scene.world.get::<&mut Shadow>(light).unwrap();
        collector.collect(&scene.world, root, light, &mut shadow);
        let first = shadow.faces()[0].casters.clone();
        collector.collect(&scene.world, root, light, &mut shadow);
        assert_eq!(shadow.faces()[0].casters, first);
        assert_eq!(shadow.caster_count(), 1);
    }

    #[test]
    fn every_point_face_is_walked() {
        let mut scene = Scene::new();
        let light = scene.add_light_with_shadow(
            Light::point(Vec3::ONE, 1.0, 30.0),
            Transform::IDENTITY,
            ShadowConfig::for_kind(ShadowKind::Point),
        );
        let (vertices, indices) = cube_mesh();
        let mesh = scene.add_mesh(MeshData::new(vertices, indices));
        let root = scene.root();
        for offset in [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z] {
            scene
                .spawn_shape(
                    root,
                    mesh,
                    Transform::from_translation(offset * 5.0),
                    ShadowRole::CASTER,
                )
                .unwrap();
        }
        scene.update();
        let light_value = *scene.world.get::<&Light>(light).unwrap();
        let mut shadow = scene.world.get::<&mut Shadow>(light).unwrap();
        shadow.prepare(&light_value, &Transform::IDENTITY, &Camera::default(), true);

        let mut collector = CasterCollector::new();
        collector.collect(&scene.world, root, light, &mut shadow);
        for face in shadow.faces() {
            assert_eq!(face.casters.len(), 1);
        }
    }
}
