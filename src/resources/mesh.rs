use std::io::{BufReader, Cursor};

use futures::{
    StreamExt,
    future,
    stream::{self, LocalBoxStream},
};

use crate::{
    data_structures::{
        model::ModelVertex,
        object::{MeshData, ModelObject},
    },
    resources::fetch::{AssetFetcher, FetchChunk, FetchError},
};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error("failed to decode texture {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to parse model {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: tobj::LoadError,
    },
    #[error("model {url} contains no vertices")]
    EmptyModel { url: String },
}

impl LoadError {
    /// The asset that was being loaded when this went wrong.
    pub fn url(&self) -> &str {
        match self {
            LoadError::Fetch { url, .. }
            | LoadError::Decode { url, .. }
            | LoadError::Parse { url, .. }
            | LoadError::EmptyModel { url } => url,
        }
    }
}

/// What a model load reports while it runs. Exactly one `Success` or `Failure` ends it.
#[derive(Debug)]
pub enum ModelEvent {
    /// Percentage of bytes received; only emitted when the total size is known.
    Progress(u8),
    Success(ModelObject),
    Failure(LoadError),
}

/// `loaded / total` as a rounded percentage. `None` when there is no meaningful total.
pub fn progress_percent(loaded: u64, total: u64) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let percent = (loaded as f64 / total as f64 * 100.0).round();
    Some(percent.clamp(0.0, 100.0) as u8)
}

/// Streams the model at `url`: progress while bytes arrive, then the parsed model
/// or the reason it could not be loaded.
pub fn load_model<'a, F: AssetFetcher + ?Sized>(
    fetcher: &'a F,
    url: &'a str,
) -> LocalBoxStream<'a, ModelEvent> {
    enum Step<'a> {
        Receiving {
            chunks: LocalBoxStream<'a, Result<FetchChunk, FetchError>>,
            bytes: Vec<u8>,
        },
        Finished,
    }

    let start = Step::Receiving {
        chunks: fetcher.fetch_chunked(url),
        bytes: Vec::new(),
    };
    stream::unfold(start, move |step| async move {
        let (mut chunks, mut bytes) = match step {
            Step::Finished => return None,
            Step::Receiving { chunks, bytes } => (chunks, bytes),
        };
        match chunks.next().await {
            Some(Ok(chunk)) => {
                bytes.extend_from_slice(&chunk.bytes);
                let progress = chunk
                    .total
                    .and_then(|total| progress_percent(bytes.len() as u64, total))
                    .map(ModelEvent::Progress);
                Some((progress, Step::Receiving { chunks, bytes }))
            }
            Some(Err(source)) => {
                let error = LoadError::Fetch {
                    url: url.to_string(),
                    source,
                };
                Some((Some(ModelEvent::Failure(error)), Step::Finished))
            }
            None => {
                log::debug!("received {} ({} bytes), parsing", url, bytes.len());
                let event = match parse_obj(url, &bytes).await {
                    Ok(model) => ModelEvent::Success(model),
                    Err(error) => ModelEvent::Failure(error),
                };
                Some((Some(event), Step::Finished))
            }
        }
    })
    .filter_map(future::ready)
    .boxed_local()
}

/// Parses OBJ file contents into a [`ModelObject`].
///
/// Faces are triangulated and all attributes share one index buffer. Material
/// libraries referenced by the file are not fetched since the viewer assigns its
/// own material to every mesh.
pub async fn parse_obj(url: &str, bytes: &[u8]) -> Result<ModelObject, LoadError> {
    let mut reader = BufReader::new(Cursor::new(bytes));
    let (models, _) = tobj::load_obj_buf_async(
        &mut reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |mtl| async move {
            log::debug!("skipping material library {mtl}");
            let empty: tobj::MTLLoadResult = Ok((Vec::new(), Default::default()));
            empty
        },
    )
    .await
    .map_err(|source| LoadError::Parse {
        url: url.to_string(),
        source,
    })?;

    let meshes: Vec<MeshData> = models.into_iter().map(to_mesh_data).collect();
    let model = ModelObject::new(url, meshes);
    if model.vertex_count() == 0 {
        return Err(LoadError::EmptyModel {
            url: url.to_string(),
        });
    }
    log::info!(
        "parsed {} with {} meshes and {} vertices",
        url,
        model.meshes.len(),
        model.vertex_count()
    );
    Ok(model)
}

fn to_mesh_data(m: tobj::Model) -> MeshData {
    MeshData {
        name: m.name,
        positions: m
            .mesh
            .positions
            .chunks_exact(3)
            .map(|p| [p[0], p[1], p[2]])
            .collect(),
        normals: m
            .mesh
            .normals
            .chunks_exact(3)
            .map(|n| [n[0], n[1], n[2]])
            .collect(),
        tex_coords: m
            .mesh
            .texcoords
            .chunks_exact(2)
            .map(|t| [t[0], t[1]])
            .collect(),
        indices: m.mesh.indices,
        material: None,
    }
}

/**
 * Obj files don't come with tangents and bitangents so they have to be calculated for
 * the normal map to work correctly.
 */
pub fn build_vertices(mesh: &MeshData) -> Vec<ModelVertex> {
    let mut vertices = (0..mesh.positions.len())
        .map(|i| ModelVertex {
            position: mesh.positions[i],
            // OBJ has the v axis pointing up, wgpu samples top-down
            tex_coords: mesh
                .tex_coords
                .get(i)
                .map_or([0.0, 0.0], |t| [t[0], 1.0 - t[1]]),
            normal: mesh.normals.get(i).copied().unwrap_or([0.0, 0.0, 0.0]),
            tangent: [0.0; 3],
            bitangent: [0.0; 3],
        })
        .collect::<Vec<_>>();

    let mut triangles_included = vec![0u32; vertices.len()];

    for c in mesh.indices.chunks_exact(3) {
        let [i0, i1, i2] = [c[0] as usize, c[1] as usize, c[2] as usize];
        if i0 >= vertices.len() || i1 >= vertices.len() || i2 >= vertices.len() {
            continue;
        }
        let (v0, v1, v2) = (vertices[i0], vertices[i1], vertices[i2]);

        let pos0: cgmath::Vector3<_> = v0.position.into();
        let pos1: cgmath::Vector3<_> = v1.position.into();
        let pos2: cgmath::Vector3<_> = v2.position.into();

        let uv0: cgmath::Vector2<_> = v0.tex_coords.into();
        let uv1: cgmath::Vector2<_> = v1.tex_coords.into();
        let uv2: cgmath::Vector2<_> = v2.tex_coords.into();

        let delta_pos1 = pos1 - pos0;
        let delta_pos2 = pos2 - pos0;
        let delta_uv1 = uv1 - uv0;
        let delta_uv2 = uv2 - uv0;

        //     delta_pos1 = delta_uv1.x * T + delta_uv1.y * B
        //     delta_pos2 = delta_uv2.x * T + delta_uv2.y * B
        let det = delta_uv1.x * delta_uv2.y - delta_uv1.y * delta_uv2.x;
        if det.abs() < f32::EPSILON {
            // degenerate UVs, nothing sensible to contribute
            continue;
        }
        let r = 1.0 / det;
        let tangent = (delta_pos1 * delta_uv2.y - delta_pos2 * delta_uv1.y) * r;
        // flipped for right-handed normal maps in wgpu's texture space
        let bitangent = (delta_pos2 * delta_uv1.x - delta_pos1 * delta_uv2.x) * -r;

        for i in [i0, i1, i2] {
            vertices[i].tangent = (tangent + cgmath::Vector3::from(vertices[i].tangent)).into();
            vertices[i].bitangent =
                (bitangent + cgmath::Vector3::from(vertices[i].bitangent)).into();
            triangles_included[i] += 1;
        }
    }

    for (v, n) in vertices.iter_mut().zip(triangles_included) {
        if n == 0 {
            continue;
        }
        let denom = 1.0 / n as f32;
        v.tangent = (cgmath::Vector3::from(v.tangent) * denom).into();
        v.bitangent = (cgmath::Vector3::from(v.bitangent) * denom).into();
    }

    vertices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::fetch::MemoryFetcher;

    const QUAD: &str = "\
o quad
v -1.0 -1.0 0.0
v 1.0 -1.0 0.0
v 1.0 1.0 0.0
v -1.0 1.0 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
vn 0.0 0.0 1.0
f 1/1/1 2/2/1 3/3/1 4/4/1
";

    #[test]
    fn percent_is_rounded_and_needs_a_total() {
        assert_eq!(progress_percent(1, 3), Some(33));
        assert_eq!(progress_percent(2, 3), Some(67));
        assert_eq!(progress_percent(3, 3), Some(100));
        assert_eq!(progress_percent(5, 0), None);
    }

    #[tokio::test]
    async fn parses_and_triangulates_quads() {
        let model = parse_obj("quad.obj", QUAD.as_bytes()).await.unwrap();
        assert_eq!(model.meshes.len(), 1);
        let mesh = &model.meshes[0];
        assert_eq!(mesh.name, "quad");
        assert_eq!(mesh.indices.len(), 6);
        assert_eq!(mesh.positions.len(), mesh.tex_coords.len());
        assert_eq!(mesh.positions.len(), mesh.normals.len());
        assert!(mesh.material.is_none());
    }

    #[tokio::test]
    async fn material_libraries_are_not_required() {
        let obj = format!("mtllib apple02.mtl\nusemtl skin\n{QUAD}");
        let model = parse_obj("apple.obj", obj.as_bytes()).await.unwrap();
        assert_eq!(model.vertex_count(), 4);
    }

    #[tokio::test]
    async fn empty_file_is_rejected() {
        let err = parse_obj("empty.obj", b"# nothing here\n").await.unwrap_err();
        assert!(matches!(err, LoadError::EmptyModel { .. }));
    }

    #[tokio::test]
    async fn streams_progress_then_success() {
        let fetcher = MemoryFetcher::new()
            .with_asset("quad.obj", QUAD.as_bytes().to_vec())
            .with_chunk_size(QUAD.len() / 2 + 1);
        let events: Vec<_> = load_model(&fetcher, "quad.obj").collect().await;

        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], ModelEvent::Progress(p) if p > 0 && p < 100));
        assert!(matches!(events[1], ModelEvent::Progress(100)));
        assert!(matches!(events[2], ModelEvent::Success(_)));
    }

    #[tokio::test]
    async fn unknown_total_emits_no_progress() {
        let fetcher = MemoryFetcher::new()
            .with_asset("quad.obj", QUAD.as_bytes().to_vec())
            .with_chunk_size(8)
            .without_total();
        let events: Vec<_> = load_model(&fetcher, "quad.obj").collect().await;

        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ModelEvent::Success(_)));
    }

    #[tokio::test]
    async fn network_error_is_the_only_terminal_event() {
        let fetcher = MemoryFetcher::new().with_failure("apple.obj", "network down");
        let events: Vec<_> = load_model(&fetcher, "apple.obj").collect().await;

        assert_eq!(events.len(), 1);
        match &events[0] {
            ModelEvent::Failure(err) => {
                assert_eq!(err.url(), "apple.obj");
                assert!(err.to_string().contains("network down"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn tangents_follow_the_uv_layout() {
        let model = parse_obj("quad.obj", QUAD.as_bytes()).await.unwrap();
        let vertices = build_vertices(&model.meshes[0]);
        assert_eq!(vertices.len(), 4);
        for v in &vertices {
            // u grows along +x on this quad
            assert!(v.tangent[0] > 0.9, "tangent {:?}", v.tangent);
            assert!(v.tangent[1].abs() < 1e-5);
        }
    }
}
