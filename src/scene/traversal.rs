//! Depth-first scene walk with frustum pruning.
//!
//! The walk keeps one cursor per node on the current path in a heap stack,
//! so walking the same tree once per cascade or cube face costs no recursion
//! and cannot overflow the call stack. Cursors live in the
//! [`SceneTraverser`] and are reset at the start of every walk; the `&mut`
//! borrow held by a [`Walk`] keeps two walks from sharing them.

use hecs::{Entity, World};

use crate::scene::components::{Children, WorldBounds};
use crate::scene::Aabb;

/// Notification emitted while walking.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraversalEvent {
    /// A node without children whose bounds, and all ancestors' bounds,
    /// passed the predicate.
    Leaf(Entity),
    /// An inner node whose admitted children have all been visited.
    BranchDone(Entity),
}

#[derive(Clone, Copy, Debug)]
struct Cursor {
    entity: Entity,
    next_child: usize,
}

#[derive(Default)]
pub struct SceneTraverser {
    cursors: Vec<Cursor>,
}

impl SceneTraverser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a walk below (and including) `root`.
    ///
    /// `intersects` is called once per candidate node with its world bounds;
    /// a `false` prunes that node and everything under it. Nodes without
    /// `WorldBounds` are always admitted.
    pub fn walk<'a, F>(
        &'a mut self,
        world: &'a World,
        root: Entity,
        mut intersects: F,
    ) -> Walk<'a, F>
    where
        F: FnMut(&Aabb) -> bool,
    {
        self.cursors.clear();
        if admits(world, root, &mut intersects) {
            self.cursors.push(Cursor {
                entity: root,
                next_child: 0,
            });
        }
        Walk {
            cursors: &mut self.cursors,
            world,
            intersects,
        }
    }

    /// Calls `visit` for every admitted leaf, in depth-first order.
    pub fn for_each_leaf<F, V>(&mut self, world: &World, root: Entity, intersects: F, mut visit: V)
    where
        F: FnMut(&Aabb) -> bool,
        V: FnMut(Entity),
    {
        for event in self.walk(world, root, intersects) {
            if let TraversalEvent::Leaf(entity) = event {
                visit(entity);
            }
        }
    }

    /// Admitted leaves, in depth-first order.
    pub fn collect_leaves<F>(&mut self, world: &World, root: Entity, intersects: F) -> Vec<Entity>
    where
        F: FnMut(&Aabb) -> bool,
    {
        let mut leaves = Vec::new();
        self.for_each_leaf(world, root, intersects, |entity| leaves.push(entity));
        leaves
    }
}

/// An in-progress walk. Dropping it abandons the walk; the next call to
/// [`SceneTraverser::walk`] starts over.
pub struct Walk<'a, F> {
    cursors: &'a mut Vec<Cursor>,
    world: &'a World,
    intersects: F,
}

impl<F> Walk<'_, F> {
    /// Depth of the current path, root included. Zero once the walk is done.
    pub fn depth(&self) -> usize {
        self.cursors.len()
    }
}

impl<F> Iterator for Walk<'_, F>
where
    F: FnMut(&Aabb) -> bool,
{
    type Item = TraversalEvent;

    fn next(&mut self) -> Option<TraversalEvent> {
        loop {
            let top = self.cursors.last_mut()?;
            let entity = top.entity;

            let next_child = match self.world.get::<&Children>(entity) {
                Ok(children) if !children.0.is_empty() => {
                    let child = children.0.get(top.next_child).copied();
                    if child.is_some() {
                        top.next_child += 1;
                    }
                    match child {
                        Some(child) => child,
                        None => {
                            self.cursors.pop();
                            return Some(TraversalEvent::BranchDone(entity));
                        }
                    }
                }
                _ => {
                    self.cursors.pop();
                    return Some(TraversalEvent::Leaf(entity));
                }
            };

            if admits(self.world, next_child, &mut self.intersects) {
                self.cursors.push(Cursor {
                    entity: next_child,
                    next_child: 0,
                });
            }
        }
    }
}

fn admits<F>(world: &World, entity: Entity, intersects: &mut F) -> bool
where
    F: FnMut(&Aabb) -> bool,
{
    match world.get::<&WorldBounds>(entity) {
        Ok(bounds) => intersects(&bounds.0),
        Err(_) => true,
    }
}
