use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3};

use crate::assets::MeshAsset;
use crate::normals::vertex_normals;
use crate::scene::{MeshNode, NodeId, Renderer};

/// Swaps the face node in the renderer's scene for freshly deformed
/// geometry.
///
/// Normals are taken from the neutral mesh once and reused for every
/// frame. Shading is slightly off for strong expressions, in exchange the
/// cycle never recomputes normals.
pub struct FaceHandoff {
    normals: Arc<[Vec3]>,
    indices: Arc<[u32]>,
    uvs: Option<Arc<[Vec2]>>,
    transform: Mat4,
    node: Option<NodeId>,
}

impl FaceHandoff {
    pub fn new(mesh: &MeshAsset) -> Self {
        let normals = match &mesh.normals {
            Some(normals) => normals.clone(),
            None => vertex_normals(&mesh.positions, &mesh.indices),
        };
        Self {
            normals: normals.into(),
            indices: mesh.indices.clone().into(),
            uvs: mesh.uvs.clone().map(Into::into),
            transform: Mat4::IDENTITY,
            node: None,
        }
    }

    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    /// The face node currently in the scene, if anything was submitted yet.
    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    pub fn submit_vertices<R: Renderer + ?Sized>(&mut self, renderer: &R, vertices: Vec<Vec3>) -> NodeId {
        // Build outside of the lock, the renderer only waits for the swap.
        let node = MeshNode {
            positions: vertices,
            normals: self.normals.clone(),
            indices: self.indices.clone(),
            uvs: self.uvs.clone(),
            transform: self.transform,
        };

        let mut scene = renderer.lock();
        if let Some(previous) = self.node.take() {
            scene.remove_node(previous);
        }
        let id = scene.add_node(node);
        self.node = Some(id);
        id
    }
}
