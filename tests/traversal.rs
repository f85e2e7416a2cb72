use glam::Vec3;
use hecs::{Entity, World};
use wgpu_shadows::scene::{
    Aabb, Children, EntityBuilder, Scene, SceneTraverser, Transform, TraversalEvent, WorldBounds,
};

/// Small deterministic generator so the tree shape is stable across runs.
struct Lcg(u64);

impl Lcg {
    fn next_u32(&mut self) -> u32 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 33) as u32
    }

    fn range(&mut self, max: usize) -> usize {
        self.next_u32() as usize % max
    }

    fn signed(&mut self, extent: f32) -> f32 {
        (self.next_u32() as f32 / (1u64 << 31) as f32) * 2.0 * extent - extent
    }
}

fn random_scene(seed: u64, nodes: usize) -> Scene {
    let mut scene = Scene::new();
    let mut rng = Lcg(seed);
    let mut spawned = vec![scene.root()];

    for _ in 0..nodes {
        let parent = spawned[rng.range(spawned.len())];
        let offset = Vec3::new(rng.signed(20.0), rng.signed(5.0), rng.signed(20.0));
        let entity = EntityBuilder::new(&mut scene.world)
            .with_transform(Transform::from_translation(offset))
            .with_bounds(Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(0.5)))
            .child_of(parent)
            .spawn()
            .unwrap();
        spawned.push(entity);
    }

    scene.update();
    scene
}

fn overlaps(a: &Aabb, b: &Aabb) -> bool {
    a.min.cmple(b.max).all() && b.min.cmple(a.max).all()
}

fn children(world: &World, entity: Entity) -> Vec<Entity> {
    world
        .get::<&Children>(entity)
        .map(|c| c.0.clone())
        .unwrap_or_default()
}

/// Recursive reference: leaves whose bounds and ancestors' bounds all pass.
fn reference_leaves(world: &World, entity: Entity, query: &Aabb, out: &mut Vec<Entity>) {
    let bounds = world.get::<&WorldBounds>(entity).unwrap().0;
    if !overlaps(&bounds, query) {
        return;
    }
    let kids = children(world, entity);
    if kids.is_empty() {
        out.push(entity);
        return;
    }
    for child in kids {
        reference_leaves(world, child, query, out);
    }
}

fn queries() -> Vec<Aabb> {
    vec![
        Aabb::new(Vec3::splat(-1000.0), Vec3::splat(1000.0)),
        Aabb::new(Vec3::new(-10.0, -10.0, -10.0), Vec3::new(10.0, 10.0, 10.0)),
        Aabb::new(Vec3::new(5.0, -50.0, -50.0), Vec3::new(60.0, 50.0, 0.0)),
        Aabb::new(Vec3::splat(900.0), Vec3::splat(901.0)),
    ]
}

#[test]
fn walk_matches_recursive_reference() {
    for seed in [1, 7, 42] {
        let scene = random_scene(seed, 300);
        let mut traverser = SceneTraverser::new();

        for query in queries() {
            let mut expected = Vec::new();
            reference_leaves(&scene.world, scene.root(), &query, &mut expected);
            let actual =
                traverser.collect_leaves(&scene.world, scene.root(), |b| overlaps(b, &query));
            assert_eq!(actual, expected, "seed {seed}, query {query:?}");
        }
    }
}

#[test]
fn repeated_walks_are_identical() {
    let scene = random_scene(3, 200);
    let query = Aabb::new(Vec3::new(-15.0, -15.0, -15.0), Vec3::new(15.0, 15.0, 15.0));
    let mut traverser = SceneTraverser::new();

    let first: Vec<TraversalEvent> = traverser
        .walk(&scene.world, scene.root(), |b| overlaps(b, &query))
        .collect();
    let second: Vec<TraversalEvent> = traverser
        .walk(&scene.world, scene.root(), |b| overlaps(b, &query))
        .collect();
    assert_eq!(first, second);
    assert_eq!(first.last(), Some(&TraversalEvent::BranchDone(scene.root())));
}

#[test]
fn every_admitted_branch_is_closed() {
    let scene = random_scene(11, 150);
    let mut traverser = SceneTraverser::new();
    let events: Vec<TraversalEvent> =
        traverser.walk(&scene.world, scene.root(), |_| true).collect();

    let leaves = events
        .iter()
        .filter(|e| matches!(e, TraversalEvent::Leaf(_)))
        .count();
    let branches = events
        .iter()
        .filter(|e| matches!(e, TraversalEvent::BranchDone(_)))
        .count();
    // Everything is admitted, so every node shows up exactly once.
    assert_eq!(leaves + branches, 151);
}

#[test]
fn pruned_groups_are_not_descended() {
    let scene = random_scene(5, 250);
    let query = Aabb::new(Vec3::splat(900.0), Vec3::splat(901.0));
    let mut tested = 0;
    let mut traverser = SceneTraverser::new();

    let leaves = traverser.collect_leaves(&scene.world, scene.root(), |b| {
        tested += 1;
        overlaps(b, &query)
    });

    assert!(leaves.is_empty());
    assert_eq!(tested, 1);
}

#[test]
fn moving_a_subtree_updates_what_the_walk_sees() {
    let mut scene = Scene::new();
    let root = scene.root();
    let group = scene.spawn_child(root, Transform::IDENTITY).unwrap();
    let leaf = EntityBuilder::new(&mut scene.world)
        .with_bounds(Aabb::from_center_half_extents(Vec3::ZERO, Vec3::ONE))
        .child_of(group)
        .spawn()
        .unwrap();
    scene.update();

    let query = Aabb::new(Vec3::splat(-2.0), Vec3::splat(2.0));
    let mut traverser = SceneTraverser::new();
    assert_eq!(
        traverser.collect_leaves(&scene.world, root, |b| overlaps(b, &query)),
        vec![leaf]
    );

    scene
        .set_transform(group, Transform::from_translation(Vec3::new(50.0, 0.0, 0.0)))
        .unwrap();
    scene.update();
    assert!(traverser
        .collect_leaves(&scene.world, root, |b| overlaps(b, &query))
        .is_empty());
}
