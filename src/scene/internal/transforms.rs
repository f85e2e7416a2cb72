use crate::scene::components::{
    Children, LocalBounds, MeshComponent, NormalMatrix, Parent, TransformComponent, WorldBounds,
    WorldTransform,
};
use crate::asset::Assets;
use crate::scene::transform::Transform;
use crate::scene::Aabb;
use hecs::{Entity, World};

/// Copies each shape's mesh bounds into its `LocalBounds`, so edited
/// geometry refits before propagation.
pub(crate) fn refresh_mesh_bounds(world: &mut World, assets: &Assets) {
    let mut missing: Vec<(Entity, Aabb)> = Vec::new();

    for (entity, (mesh, local)) in world
        .query_mut::<(&MeshComponent, Option<&mut LocalBounds>)>()
    {
        let bounds = match assets.meshes.get(mesh.0) {
            Some(data) => data.bounds(),
            None => {
                log::warn!("Entity {:?} references missing mesh {:?}", entity, mesh.0);
                Aabb::EMPTY
            }
        };
        match local {
            Some(local) => local.0 = bounds,
            None => missing.push((entity, bounds)),
        }
    }

    for (entity, bounds) in missing {
        let _ = world.insert_one(entity, LocalBounds(bounds));
    }
}

/// Recomputes world transforms, normal matrices and world bounds for every
/// tree rooted at an entity without a `Parent`.
///
/// Transforms flow top-down. Bounds flow bottom-up: a node's world bounds are
/// its own local bounds (if any) transformed, merged with all of its
/// children's world bounds.
pub(crate) fn propagate_transforms(world: &mut World) {
    let roots: Vec<Entity> = world
        .query::<&TransformComponent>()
        .without::<&Parent>()
        .iter()
        .map(|(entity, _)| entity)
        .collect();

    log::trace!("Propagating transforms from {} root entities", roots.len());

    let mut stack: Vec<(Entity, Transform)> = Vec::new();
    let mut visit_order: Vec<Entity> = Vec::new();

    for root in roots {
        stack.push((root, Transform::IDENTITY));

        while let Some((entity, parent_world)) = stack.pop() {
            let local = match world.get::<&TransformComponent>(entity) {
                Ok(t) => t.0,
                Err(_) => {
                    log::trace!("Entity {:?} has no TransformComponent, skipping", entity);
                    continue;
                }
            };

            let world_transform = parent_world.mul_transform(&local);
            write_world_transform(world, entity, world_transform);
            update_normal_matrix(world, entity, &world_transform);
            visit_order.push(entity);

            if let Ok(children) = world.get::<&Children>(entity) {
                for &child in children.0.iter().rev() {
                    stack.push((child, world_transform));
                }
            }
        }
    }

    // Children always follow their parent in pre-order, so walking backwards
    // sees every child before its parent.
    for &entity in visit_order.iter().rev() {
        let own = match (
            world.get::<&LocalBounds>(entity),
            world.get::<&WorldTransform>(entity),
        ) {
            (Ok(local), Ok(wt)) => local.0.transformed(&wt.0.matrix()),
            _ => Aabb::EMPTY,
        };

        let merged = match world.get::<&Children>(entity) {
            Ok(children) => children.0.iter().fold(own, |acc, child| {
                match world.get::<&WorldBounds>(*child) {
                    Ok(bounds) => acc.union(&bounds.0),
                    Err(_) => acc,
                }
            }),
            Err(_) => own,
        };

        let updated = match world.get::<&mut WorldBounds>(entity) {
            Ok(mut bounds) => {
                bounds.0 = merged;
                true
            }
            Err(_) => false,
        };
        if !updated {
            if let Err(e) = world.insert_one(entity, WorldBounds(merged)) {
                log::error!("Failed to insert WorldBounds for entity {:?}: {:?}", entity, e);
            }
        }
    }
}

fn write_world_transform(world: &mut World, entity: Entity, value: Transform) {
    if let Ok(mut wt) = world.get::<&mut WorldTransform>(entity) {
        wt.0 = value;
        return;
    }
    if let Err(e) = world.insert_one(entity, WorldTransform(value)) {
        log::error!(
            "Failed to insert WorldTransform for entity {:?}: {:?}",
            entity,
            e
        );
    }
}

fn update_normal_matrix(world: &mut World, entity: Entity, world_transform: &Transform) {
    let Some(normal) = world_transform.normal_matrix() else {
        log::trace!(
            "Entity {:?} has a singular world transform, keeping previous normal matrix",
            entity
        );
        if world.get::<&NormalMatrix>(entity).is_err() {
            let _ = world.insert_one(entity, NormalMatrix::default());
        }
        return;
    };

    if let Ok(mut existing) = world.get::<&mut NormalMatrix>(entity) {
        existing.0 = normal;
        return;
    }
    let _ = world.insert_one(entity, NormalMatrix(normal));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::components::Name;
    use glam::{Mat3, Quat, Vec3};

    fn spawn_pair(world: &mut World, parent_t: Transform, child_t: Transform) -> (Entity, Entity) {
        let parent = world.spawn((Name::new("Parent"), TransformComponent(parent_t)));
        let child = world.spawn((Name::new("Child"), TransformComponent(child_t), Parent(parent)));
        world.insert_one(parent, Children(vec![child])).ok();
        (parent, child)
    }

    #[test]
    fn test_transform_propagation_simple() {
        let mut world = World::new();
        let (parent, child) = spawn_pair(
            &mut world,
            Transform::from_translation(Vec3::new(5.0, 0.0, 0.0)),
            Transform::from_translation(Vec3::new(2.0, 0.0, 0.0)),
        );

        propagate_transforms(&mut world);

        let parent_world = world.get::<&WorldTransform>(parent).unwrap();
        assert_eq!(parent_world.0.translation, Vec3::new(5.0, 0.0, 0.0));

        let child_world = world.get::<&WorldTransform>(child).unwrap();
        assert_eq!(child_world.0.translation, Vec3::new(7.0, 0.0, 0.0));
    }

    #[test]
    fn test_transform_propagation_scale() {
        let mut world = World::new();
        let (_, child) = spawn_pair(
            &mut world,
            Transform::from_trs(Vec3::ZERO, Quat::IDENTITY, Vec3::splat(2.0)),
            Transform::from_trs(Vec3::new(1.0, 0.0, 0.0), Quat::IDENTITY, Vec3::splat(0.5)),
        );

        propagate_transforms(&mut world);

        let child_world = world.get::<&WorldTransform>(child).unwrap();
        assert_eq!(child_world.0.translation, Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(child_world.0.scale, Vec3::splat(1.0));
    }

    #[test]
    fn group_bounds_enclose_children() {
        let mut world = World::new();
        let (parent, child) = spawn_pair(
            &mut world,
            Transform::from_translation(Vec3::new(10.0, 0.0, 0.0)),
            Transform::from_translation(Vec3::new(0.0, 3.0, 0.0)),
        );
        world
            .insert_one(child, LocalBounds(Aabb::from_center_half_extents(Vec3::ZERO, Vec3::ONE)))
            .unwrap();

        propagate_transforms(&mut world);

        let child_bounds = world.get::<&WorldBounds>(child).unwrap().0;
        assert!(child_bounds.center().abs_diff_eq(Vec3::new(10.0, 3.0, 0.0), 1e-5));
        let parent_bounds = world.get::<&WorldBounds>(parent).unwrap().0;
        assert_eq!(parent_bounds, child_bounds);
    }

    #[test]
    fn moved_child_refits_parent_bounds() {
        let mut world = World::new();
        let (parent, child) = spawn_pair(&mut world, Transform::IDENTITY, Transform::IDENTITY);
        world
            .insert_one(child, LocalBounds(Aabb::from_center_half_extents(Vec3::ZERO, Vec3::ONE)))
            .unwrap();
        propagate_transforms(&mut world);

        world.get::<&mut TransformComponent>(child).unwrap().0.translation =
            Vec3::new(0.0, 0.0, -20.0);
        propagate_transforms(&mut world);

        let parent_bounds = world.get::<&WorldBounds>(parent).unwrap().0;
        assert!((parent_bounds.min.z + 21.0).abs() < 1e-5);
    }

    #[test]
    fn singular_transform_keeps_previous_normal_matrix() {
        let mut world = World::new();
        let (_, child) = spawn_pair(
            &mut world,
            Transform::IDENTITY,
            Transform::from_trs(Vec3::ZERO, Quat::IDENTITY, Vec3::new(2.0, 1.0, 1.0)),
        );
        propagate_transforms(&mut world);
        let before = world.get::<&NormalMatrix>(child).unwrap().0;
        assert!((before.x_axis.x - 0.5).abs() < 1e-6);

        world.get::<&mut TransformComponent>(child).unwrap().0.scale = Vec3::new(2.0, 0.0, 1.0);
        propagate_transforms(&mut world);

        let after = world.get::<&NormalMatrix>(child).unwrap().0;
        assert_eq!(after, before);
        assert_ne!(after, Mat3::IDENTITY);
    }
}
