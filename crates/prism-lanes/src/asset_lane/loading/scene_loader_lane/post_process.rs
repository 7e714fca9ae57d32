// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Post-processing steps run on freshly imported meshes.
//!
//! Steps are applied in a fixed order by [`apply`]: triangulation, normal
//! generation, tangent space, UV flipping and bone weight limiting. Each step is
//! also usable on its own.

use ahash::AHashMap;
use prism_core::math::{Vec3, EPSILON};
use prism_core::scene::{ImportedScene, PrimitiveKind, SceneMesh, VertexWeight};

use super::ModelLoaderFlags;
use crate::asset_lane::ImportError;

/// Bone influences kept per vertex by [`ModelLoaderFlags::LIMIT_BONE_WEIGHTS`].
pub const MAX_BONE_INFLUENCES: usize = 4;

/// Runs every step selected by `flags` on every mesh of `scene`.
pub fn apply(scene: &mut ImportedScene, flags: ModelLoaderFlags) -> Result<(), ImportError> {
    if flags.contains(ModelLoaderFlags::SMOOTH_NORMALS | ModelLoaderFlags::FACE_NORMALS) {
        return Err(ImportError::IncompatibleFlags(
            "SMOOTH_NORMALS and FACE_NORMALS are mutually exclusive".to_string(),
        ));
    }

    for mesh in &mut scene.meshes {
        mesh.drop_incomplete_channels();
        if flags.contains(ModelLoaderFlags::TRIANGULATE) {
            triangulate(mesh);
        }
        if !mesh.has_normals() {
            if flags.contains(ModelLoaderFlags::SMOOTH_NORMALS) {
                generate_smooth_normals(mesh);
            } else if flags.contains(ModelLoaderFlags::FACE_NORMALS) {
                generate_face_normals(mesh);
            }
        }
        if flags.contains(ModelLoaderFlags::CALC_TANGENT_SPACE) && !mesh.has_tangents_and_bitangents()
        {
            calc_tangent_space(mesh);
        }
        if flags.contains(ModelLoaderFlags::FLIP_UVS) {
            flip_uvs(mesh);
        }
        if flags.contains(ModelLoaderFlags::LIMIT_BONE_WEIGHTS) {
            limit_bone_weights(mesh, MAX_BONE_INFLUENCES);
        }
    }
    Ok(())
}

/// Turns triangle strips and fans into triangle lists. Degenerate triangles are dropped.
pub fn triangulate(mesh: &mut SceneMesh) {
    let indices = &mesh.indices;
    let triangles: Vec<[u32; 3]> = match mesh.primitive {
        PrimitiveKind::TriangleStrip => indices
            .windows(3)
            .enumerate()
            .map(|(i, w)| {
                // Every other strip triangle has reversed winding.
                if i % 2 == 0 {
                    [w[0], w[1], w[2]]
                } else {
                    [w[1], w[0], w[2]]
                }
            })
            .collect(),
        PrimitiveKind::TriangleFan => match indices.split_first() {
            Some((&center, rest)) => rest.windows(2).map(|w| [center, w[0], w[1]]).collect(),
            None => Vec::new(),
        },
        _ => return,
    };

    mesh.indices = triangles
        .into_iter()
        .filter(|[a, b, c]| a != b && b != c && a != c)
        .flatten()
        .collect();
    mesh.primitive = PrimitiveKind::Triangles;
}

/// Valid triangles of a triangle-list mesh, as vertex indices.
fn triangles(mesh: &SceneMesh) -> impl Iterator<Item = [usize; 3]> + '_ {
    let vertex_count = mesh.vertex_count();
    let is_list = mesh.primitive == PrimitiveKind::Triangles;
    mesh.indices
        .chunks_exact(3)
        .filter(move |_| is_list)
        .map(|t| [t[0] as usize, t[1] as usize, t[2] as usize])
        .filter(move |t| t.iter().all(|&i| i < vertex_count))
}

/// Generates normals averaged over every face touching a position.
///
/// Vertices sharing the exact same position share the same normal, and larger
/// faces weigh more.
pub fn generate_smooth_normals(mesh: &mut SceneMesh) {
    if mesh.primitive != PrimitiveKind::Triangles {
        log::debug!("Skipping smooth normals for non-triangle mesh '{}'", mesh.name);
        return;
    }

    let mut groups: AHashMap<[u32; 3], usize> = AHashMap::new();
    let group_of: Vec<usize> = mesh
        .positions
        .iter()
        .map(|p| {
            let next = groups.len();
            *groups.entry(p.to_array().map(f32::to_bits)).or_insert(next)
        })
        .collect();

    let mut sums = vec![Vec3::ZERO; groups.len()];
    for [a, b, c] in triangles(mesh) {
        let p = &mesh.positions;
        // The unnormalized cross product is proportional to the face area.
        let face = (p[b] - p[a]).cross(p[c] - p[a]);
        for vertex in [a, b, c] {
            sums[group_of[vertex]] += face;
        }
    }

    mesh.normals = Some(
        group_of
            .iter()
            .map(|&group| sums[group].normalize_or_zero())
            .collect(),
    );
}

/// Gives every face its own vertices carrying the face normal.
///
/// All per-vertex channels and bone weights are duplicated along.
pub fn generate_face_normals(mesh: &mut SceneMesh) {
    if mesh.primitive != PrimitiveKind::Triangles {
        log::debug!("Skipping face normals for non-triangle mesh '{}'", mesh.name);
        return;
    }
    mesh.drop_incomplete_channels();

    let corners: Vec<usize> = triangles(mesh).flatten().collect();
    let positions: Vec<Vec3> = corners.iter().map(|&i| mesh.positions[i]).collect();
    let normals: Vec<Vec3> = positions
        .chunks_exact(3)
        .flat_map(|t| {
            let n = (t[1] - t[0]).cross(t[2] - t[0]).normalize_or_zero();
            [n; 3]
        })
        .collect();

    for set in mesh.tex_coords.iter_mut().flatten() {
        *set = corners.iter().map(|&i| set[i]).collect();
    }
    if let Some(colors) = &mut mesh.colors {
        *colors = corners.iter().map(|&i| colors[i]).collect();
    }
    for channel in [&mut mesh.tangents, &mut mesh.bitangents].into_iter().flatten() {
        *channel = corners.iter().map(|&i| channel[i]).collect();
    }

    let mut new_vertices_of: Vec<Vec<u32>> = vec![Vec::new(); mesh.vertex_count()];
    for (new_vertex, &old_vertex) in corners.iter().enumerate() {
        new_vertices_of[old_vertex].push(new_vertex as u32);
    }
    for bone in &mut mesh.bones {
        bone.weights = bone
            .weights
            .iter()
            .flat_map(|w| {
                new_vertices_of
                    .get(w.vertex_id as usize)
                    .into_iter()
                    .flatten()
                    .map(move |&vertex_id| VertexWeight {
                        vertex_id,
                        weight: w.weight,
                    })
            })
            .collect();
    }

    mesh.indices = (0..corners.len() as u32).collect();
    mesh.positions = positions;
    mesh.normals = Some(normals);
}

/// Computes per-vertex tangents and bitangents from the first UV set.
///
/// Requires normals and texture coordinates; meshes lacking either are left alone.
pub fn calc_tangent_space(mesh: &mut SceneMesh) {
    let (Some(normals), Some(uvs)) = (&mesh.normals, &mesh.tex_coords[0]) else {
        log::debug!(
            "Cannot compute tangent space for '{}' without normals and UVs",
            mesh.name
        );
        return;
    };
    if normals.len() != mesh.vertex_count() || uvs.len() != mesh.vertex_count() {
        log::warn!(
            "Cannot compute tangent space for '{}': normals or UVs do not cover every vertex",
            mesh.name
        );
        return;
    }

    let mut tangents = vec![Vec3::ZERO; mesh.vertex_count()];
    let mut bitangents = vec![Vec3::ZERO; mesh.vertex_count()];
    for [a, b, c] in triangles(mesh) {
        let p = &mesh.positions;
        let (edge1, edge2) = (p[b] - p[a], p[c] - p[a]);
        let (duv1, duv2) = (uvs[b] - uvs[a], uvs[c] - uvs[a]);
        let det = duv1.x * duv2.y - duv2.x * duv1.y;
        if det.abs() < EPSILON {
            continue;
        }
        let r = det.recip();
        let tangent = (edge1 * duv2.y - edge2 * duv1.y) * r;
        let bitangent = (edge2 * duv1.x - edge1 * duv2.x) * r;
        for vertex in [a, b, c] {
            tangents[vertex] += tangent;
            bitangents[vertex] += bitangent;
        }
    }

    for ((t, b), n) in tangents.iter_mut().zip(&mut bitangents).zip(normals) {
        // Gram-Schmidt against the normal, keeping the bitangent's handedness.
        let orthogonal = (*t - *n * n.dot(*t)).normalize_or_zero();
        let mut cross = n.cross(orthogonal);
        if cross.dot(*b) < 0.0 {
            cross = -cross;
        }
        *t = orthogonal;
        *b = cross;
    }

    mesh.tangents = Some(tangents);
    mesh.bitangents = Some(bitangents);
}

/// Replaces `v` with `1 - v` in every texture coordinate set.
pub fn flip_uvs(mesh: &mut SceneMesh) {
    for uv in mesh.tex_coords.iter_mut().flatten().flatten() {
        uv.y = 1.0 - uv.y;
    }
}

/// Keeps only the `max` strongest influences of each vertex and renormalizes them.
pub fn limit_bone_weights(mesh: &mut SceneMesh, max: usize) {
    if mesh.bones.is_empty() {
        return;
    }

    let mut per_vertex: AHashMap<u32, Vec<(usize, f32)>> = AHashMap::new();
    for (bone_index, bone) in mesh.bones.iter().enumerate() {
        for w in &bone.weights {
            per_vertex
                .entry(w.vertex_id)
                .or_default()
                .push((bone_index, w.weight));
        }
    }
    if per_vertex.values().all(|influences| influences.len() <= max) {
        return;
    }

    for bone in &mut mesh.bones {
        bone.weights.clear();
    }
    let mut vertices: Vec<_> = per_vertex.into_iter().collect();
    vertices.sort_unstable_by_key(|(vertex_id, _)| *vertex_id);
    for (vertex_id, mut influences) in vertices {
        if influences.len() > max {
            influences.sort_by(|a, b| b.1.total_cmp(&a.1));
            influences.truncate(max);
            let total: f32 = influences.iter().map(|(_, w)| w).sum();
            if total > EPSILON {
                influences.iter_mut().for_each(|(_, w)| *w /= total);
            }
        }
        for (bone_index, weight) in influences {
            mesh.bones[bone_index]
                .weights
                .push(VertexWeight { vertex_id, weight });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use prism_core::math::{Mat4, Vec2};
    use prism_core::scene::Bone;

    fn quad() -> SceneMesh {
        SceneMesh {
            name: "quad".into(),
            positions: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
            tex_coords: [
                Some(vec![
                    Vec2::new(0.0, 0.0),
                    Vec2::new(1.0, 0.0),
                    Vec2::new(1.0, 1.0),
                    Vec2::new(0.0, 1.0),
                ]),
                None,
                None,
            ],
            indices: vec![0, 1, 2, 0, 2, 3],
            ..Default::default()
        }
    }

    #[test]
    fn strips_alternate_winding() {
        let mut mesh = quad();
        mesh.primitive = PrimitiveKind::TriangleStrip;
        mesh.indices = vec![0, 1, 3, 2];
        triangulate(&mut mesh);
        assert_eq!(mesh.primitive, PrimitiveKind::Triangles);
        assert_eq!(mesh.indices, vec![0, 1, 3, 3, 1, 2]);
    }

    #[test]
    fn fans_share_first_vertex_and_drop_degenerates() {
        let mut mesh = quad();
        mesh.primitive = PrimitiveKind::TriangleFan;
        mesh.indices = vec![0, 1, 2, 2, 3];
        triangulate(&mut mesh);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn smooth_normals_of_flat_quad_point_up() {
        let mut mesh = quad();
        generate_smooth_normals(&mut mesh);
        for n in mesh.normals.unwrap() {
            assert_relative_eq!(n, Vec3::Z);
        }
    }

    #[test]
    fn face_normals_unshare_vertices_and_weights() {
        let mut mesh = quad();
        mesh.bones = vec![Bone {
            name: "b".into(),
            offset_matrix: Mat4::IDENTITY,
            weights: vec![VertexWeight {
                vertex_id: 0,
                weight: 1.0,
            }],
        }];
        generate_face_normals(&mut mesh);

        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.indices, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(mesh.tex_coords[0].as_ref().unwrap().len(), 6);
        let ids: Vec<u32> = mesh.bones[0].weights.iter().map(|w| w.vertex_id).collect();
        assert_eq!(ids, vec![0, 3]);
    }

    #[test]
    fn tangent_space_follows_uv_axes() {
        let mut mesh = quad();
        generate_smooth_normals(&mut mesh);
        calc_tangent_space(&mut mesh);
        for (t, b) in mesh.tangents.unwrap().iter().zip(mesh.bitangents.unwrap()) {
            assert_relative_eq!(*t, Vec3::X);
            assert_relative_eq!(b, Vec3::Y);
        }
    }

    #[test]
    fn tangent_space_needs_normals() {
        let mut mesh = quad();
        calc_tangent_space(&mut mesh);
        assert!(mesh.tangents.is_none());
    }

    #[test]
    fn face_normals_skip_short_uv_sets() {
        let mut mesh = quad();
        mesh.tex_coords[0].as_mut().unwrap().truncate(3);
        generate_face_normals(&mut mesh);

        assert_eq!(mesh.vertex_count(), 6);
        assert!(!mesh.has_tex_coords(0));
        assert_eq!(mesh.normals.unwrap().len(), 6);
    }

    #[test]
    fn tangent_space_skips_short_uv_sets() {
        let mut mesh = quad();
        generate_smooth_normals(&mut mesh);
        mesh.tex_coords[0].as_mut().unwrap().truncate(3);
        calc_tangent_space(&mut mesh);
        assert!(mesh.tangents.is_none());
    }

    #[test]
    fn flip_uvs_inverts_v() {
        let mut mesh = quad();
        flip_uvs(&mut mesh);
        assert_eq!(mesh.tex_coords[0].as_ref().unwrap()[0], Vec2::new(0.0, 1.0));
    }

    #[test]
    fn bone_weights_are_limited_and_renormalized() {
        let mut mesh = quad();
        mesh.bones = [0.1, 0.2, 0.3, 0.4, 0.5]
            .iter()
            .enumerate()
            .map(|(i, &weight)| Bone {
                name: format!("bone{i}"),
                offset_matrix: Mat4::IDENTITY,
                weights: vec![VertexWeight {
                    vertex_id: 2,
                    weight,
                }],
            })
            .collect();
        limit_bone_weights(&mut mesh, 4);

        assert!(mesh.bones[0].weights.is_empty());
        let total: f32 = mesh.bones.iter().flat_map(|b| &b.weights).map(|w| w.weight).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-6);
        assert_relative_eq!(mesh.bones[4].weights[0].weight, 0.5 / 1.4, epsilon = 1e-6);
    }

    #[test]
    fn smooth_and_face_normals_conflict() {
        let mut scene = ImportedScene::new("x.obj", "root");
        let flags = ModelLoaderFlags::SMOOTH_NORMALS | ModelLoaderFlags::FACE_NORMALS;
        assert!(matches!(
            apply(&mut scene, flags),
            Err(ImportError::IncompatibleFlags(_))
        ));
    }
}
