//! The boundary with the renderer that presents the face.
//!
//! The renderer owns a [`Scene`] behind its render lock and presents it on
//! its own thread. Everything that changes the scene has to go through
//! [`Renderer::lock`], so a frame is never drawn from a half replaced node.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3};
use parking_lot::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

/// A triangle mesh placed in the scene.
#[derive(Debug, Clone)]
pub struct MeshNode {
    pub positions: Vec<Vec3>,
    pub normals: Arc<[Vec3]>,
    pub indices: Arc<[u32]>,
    pub uvs: Option<Arc<[Vec2]>>,
    pub transform: Mat4,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Light {
    Directional {
        color: Vec3,
        intensity: f32,
    },
    Spot {
        color: Vec3,
        intensity: f32,
        inner_cone_angle: f32,
        outer_cone_angle: f32,
    },
}

/// A strong white key light plus a softer spot light.
pub fn default_lights() -> [Light; 2] {
    [
        Light::Directional {
            color: Vec3::ONE,
            intensity: 5.0,
        },
        Light::Spot {
            color: Vec3::ONE,
            intensity: 2.0,
            inner_cone_angle: 0.05,
            outer_cone_angle: 0.5,
        },
    ]
}

#[derive(Debug, Default)]
pub struct Scene {
    nodes: Vec<(NodeId, MeshNode)>,
    lights: Vec<Light>,
    next_id: u64,
    revision: u64,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bumped on every change, lets the presenter skip unchanged frames.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn add_node(&mut self, node: MeshNode) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.push((id, node));
        self.revision += 1;
        id
    }

    pub fn remove_node(&mut self, id: NodeId) -> Option<MeshNode> {
        let position = self.nodes.iter().position(|(node_id, _)| *node_id == id)?;
        self.revision += 1;
        Some(self.nodes.remove(position).1)
    }

    pub fn node(&self, id: NodeId) -> Option<&MeshNode> {
        self.nodes.iter()
            .find(|(node_id, _)| *node_id == id)
            .map(|(_, node)| node)
    }

    pub fn nodes(&self) -> impl Iterator<Item=(NodeId, &MeshNode)> {
        self.nodes.iter().map(|(id, node)| (*id, node))
    }

    pub fn add_light(&mut self, light: Light) {
        self.lights.push(light);
        self.revision += 1;
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }
}

/// What the animation loop needs from whoever draws the scene.
pub trait Renderer: Send + Sync {
    /// False once the renderer has shut down, e.g. its window was closed.
    fn is_active(&self) -> bool;

    /// Takes the render lock. It is released when the guard drops, also
    /// while unwinding.
    fn lock(&self) -> MutexGuard<'_, Scene>;

    fn close(&self);
}

/// A scene shared between the animation loop and a presenter on another
/// thread.
#[derive(Debug)]
pub struct SharedScene {
    scene: Mutex<Scene>,
    active: AtomicBool,
}

impl Default for SharedScene {
    fn default() -> Self {
        Self::new(Scene::new())
    }
}

impl SharedScene {
    pub fn new(scene: Scene) -> Self {
        Self {
            scene: Mutex::new(scene),
            active: AtomicBool::new(true),
        }
    }

    pub fn with_default_lights() -> Self {
        let mut scene = Scene::new();
        for light in default_lights() {
            scene.add_light(light);
        }
        Self::new(scene)
    }

    pub fn try_lock(&self) -> Option<MutexGuard<'_, Scene>> {
        self.scene.try_lock()
    }
}

impl Renderer for SharedScene {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn lock(&self) -> MutexGuard<'_, Scene> {
        self.scene.lock()
    }

    fn close(&self) {
        self.active.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> MeshNode {
        MeshNode {
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            normals: vec![Vec3::Z; 3].into(),
            indices: vec![0, 1, 2].into(),
            uvs: None,
            transform: Mat4::IDENTITY,
        }
    }

    #[test]
    fn nodes_are_added_and_removed_by_id() {
        let mut scene = Scene::new();
        let first = scene.add_node(triangle());
        let second = scene.add_node(triangle());
        assert_ne!(first, second);
        assert_eq!(scene.revision(), 2);

        assert!(scene.remove_node(first).is_some());
        assert!(scene.remove_node(first).is_none());
        assert_eq!(scene.nodes().map(|(id, _)| id).collect::<Vec<_>>(), vec![second]);
        assert_eq!(scene.revision(), 3);
    }

    #[test]
    fn shared_scene_closes_once() {
        let shared = SharedScene::with_default_lights();
        assert!(shared.is_active());
        assert_eq!(shared.lock().lights().len(), 2);
        shared.close();
        assert!(!shared.is_active());
    }

    #[test]
    fn render_lock_is_released_after_a_panic() {
        let shared = SharedScene::default();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut scene = shared.lock();
            scene.add_node(triangle());
            panic!("mesh construction failed");
        }));
        assert!(result.is_err());
        assert!(shared.try_lock().is_some());
    }
}
