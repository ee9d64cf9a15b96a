use std::path::PathBuf;
use std::sync::Arc;

use bevy::asset::AssetPlugin;
use bevy::log::LogPlugin;
use bevy::prelude::*;
use bevy::render::mesh::{Indices, PrimitiveTopology};
use bevy::render::render_asset::RenderAssetUsages;
use bevy::utils::HashMap;

use face_rig::{Light, MeshNode, NodeId, Renderer, SharedScene};

const DIRECTIONAL_LUX_PER_UNIT: f32 = 2_000.0;
const SPOT_LUMENS_PER_UNIT: f32 = 400_000.0;

#[derive(Resource, Clone)]
pub struct ViewerSettings {
    pub texture: Option<PathBuf>,
    pub focus: Vec3,
    pub distance: f32,
}

#[derive(Resource, Clone)]
struct SceneLink(Arc<SharedScene>);

#[derive(Resource)]
struct FaceMaterial(Handle<StandardMaterial>);

/// Scene nodes currently mirrored as entities.
#[derive(Resource, Default)]
struct Presented {
    revision: u64,
    entities: HashMap<NodeId, (Entity, Handle<Mesh>)>,
}

/// Presents `scene` in a window until the window is closed.
pub fn run(scene: Arc<SharedScene>, settings: ViewerSettings) -> AppExit {
    // Textures are loaded relative to their own directory.
    let asset_root = settings.texture.as_ref()
        .and_then(|path| path.parent())
        .map(|dir| dir.to_string_lossy().into_owned())
        .unwrap_or_else(|| "assets".to_owned());

    App::new()
        .add_plugins(DefaultPlugins
            .set(AssetPlugin {
                file_path: asset_root,
                ..default()
            })
            .disable::<LogPlugin>())
        .insert_resource(SceneLink(scene))
        .insert_resource(settings)
        .init_resource::<Presented>()
        .add_systems(Startup, init)
        .add_systems(Update, present_scene)
        .run()
}

fn init(
    mut commands: Commands,
    link: Res<SceneLink>,
    settings: Res<ViewerSettings>,
    asset_server: Res<AssetServer>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let eye = settings.focus + Vec3::Z * settings.distance;
    let looking_at_face = Transform::from_translation(eye)
        .looking_at(settings.focus, Vec3::Y);

    commands.spawn(Camera3dBundle {
        transform: looking_at_face,
        ..default()
    });

    for light in link.0.lock().lights() {
        match *light {
            Light::Directional { color, intensity } => {
                commands.spawn(DirectionalLightBundle {
                    directional_light: DirectionalLight {
                        color: Color::srgb(color.x, color.y, color.z),
                        illuminance: intensity * DIRECTIONAL_LUX_PER_UNIT,
                        ..default()
                    },
                    transform: looking_at_face,
                    ..default()
                });
            }
            Light::Spot { color, intensity, inner_cone_angle, outer_cone_angle } => {
                commands.spawn(SpotLightBundle {
                    spot_light: SpotLight {
                        color: Color::srgb(color.x, color.y, color.z),
                        intensity: intensity * SPOT_LUMENS_PER_UNIT,
                        inner_angle: inner_cone_angle,
                        outer_angle: outer_cone_angle,
                        range: settings.distance * 4.0,
                        ..default()
                    },
                    transform: looking_at_face,
                    ..default()
                });
            }
        }
    }

    let texture = settings.texture.as_ref()
        .and_then(|path| path.file_name())
        .map(|name| asset_server.load::<Image>(name.to_string_lossy().into_owned()));
    let material = materials.add(StandardMaterial {
        base_color_texture: texture,
        perceptual_roughness: 0.8,
        ..default()
    });
    commands.insert_resource(FaceMaterial(material));
}

fn to_bevy_mesh(node: &MeshNode) -> Mesh {
    let mut mesh = Mesh::new(
        PrimitiveTopology::TriangleList,
        RenderAssetUsages::MAIN_WORLD | RenderAssetUsages::RENDER_WORLD,
    );
    mesh.insert_attribute(
        Mesh::ATTRIBUTE_POSITION,
        node.positions.iter().map(|p| p.to_array()).collect::<Vec<_>>(),
    );
    mesh.insert_attribute(
        Mesh::ATTRIBUTE_NORMAL,
        node.normals.iter().map(|n| n.to_array()).collect::<Vec<_>>(),
    );
    if let Some(uvs) = &node.uvs {
        // OBJ puts the texture origin bottom left.
        mesh.insert_attribute(
            Mesh::ATTRIBUTE_UV_0,
            uvs.iter().map(|uv| [uv.x, 1.0 - uv.y]).collect::<Vec<_>>(),
        );
    }
    mesh.insert_indices(Indices::U32(node.indices.to_vec()));
    mesh
}

/// Mirrors the shared scene into the ECS whenever the animation thread has
/// swapped a node. Runs under the render lock.
fn present_scene(
    mut commands: Commands,
    link: Res<SceneLink>,
    material: Option<Res<FaceMaterial>>,
    mut presented: ResMut<Presented>,
    mut meshes: ResMut<Assets<Mesh>>,
) {
    let Some(material) = material else {
        return;
    };

    let scene = link.0.lock();
    if scene.revision() == presented.revision {
        return;
    }
    let presented = &mut *presented;
    presented.revision = scene.revision();

    presented.entities.retain(|id, (entity, _)| {
        let alive = scene.node(*id).is_some();
        if !alive {
            commands.entity(*entity).despawn();
        }
        alive
    });

    for (id, node) in scene.nodes() {
        if presented.entities.contains_key(&id) {
            continue;
        }
        let mesh = meshes.add(to_bevy_mesh(node));
        let entity = commands.spawn(PbrBundle {
            mesh: mesh.clone(),
            material: material.0.clone(),
            transform: Transform::from_matrix(node.transform),
            ..default()
        }).id();
        presented.entities.insert(id, (entity, mesh));
    }
}
