//! Stage worker: one thread owning a tokio runtime and the HTTP client.
//! Commands arrive over a channel; completions go back to the event loop as
//! `StageEvent`s, so the controller never blocks the UI.

use std::path::PathBuf;
use std::sync::mpsc::{Sender, channel};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use winit::event_loop::EventLoopProxy;

use mm_core::{
    Category, EncodedImage, ForegroundImage, OrmTexture, PipelineError, PipelineParameters,
    SampleFolder, TexturedMeshBundle, ViewSet, WhiteModelBundle,
};

use crate::events::{MmEvent, StageEvent, StageKind, StageOutput};
use crate::pipeline::config::BackendConfig;
use crate::pipeline::protocol::{
    self, DisplayResponse, MaterializeResponse, OUTPUT_FOLDER_HEADER, RemoveBackgroundResponse,
    RenderViewsResponse, SegmentationResponse,
};

// Fixed timeout policy: generation is slow but must not hang forever.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug)]
pub enum StageCommand {
    RemoveBackground {
        image: Vec<u8>,
        file_name: String,
        foreground_ratio: f32,
    },
    GenerateMesh {
        image: Vec<u8>,
        params: PipelineParameters,
    },
    LoadWhiteModel {
        folder: SampleFolder,
    },
    RenderViews {
        folder: SampleFolder,
        category: Category,
    },
    Materialize {
        folder: SampleFolder,
        category: Category,
    },
    Export {
        folder: SampleFolder,
        dest: PathBuf,
    },
    Shutdown,
}

impl StageCommand {
    pub fn kind(&self) -> Option<StageKind> {
        match self {
            Self::RemoveBackground { .. } => Some(StageKind::RemoveBackground),
            Self::GenerateMesh { .. } => Some(StageKind::GenerateMesh),
            Self::LoadWhiteModel { .. } => Some(StageKind::WhiteModel),
            Self::RenderViews { .. } => Some(StageKind::RenderViews),
            Self::Materialize { .. } => Some(StageKind::Materialize),
            Self::Export { .. } => Some(StageKind::Export),
            Self::Shutdown => None,
        }
    }
}

pub struct StageWorker {
    command_tx: Sender<StageCommand>,
    thread_handle: Option<JoinHandle<()>>,
}

impl StageWorker {
    pub fn new(config: BackendConfig, proxy: EventLoopProxy<MmEvent>) -> Self {
        let (command_tx, command_rx) = channel::<StageCommand>();

        let thread_handle = thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("Failed to start tokio runtime");
            let client = reqwest::Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client");

            loop {
                let command = match command_rx.recv() {
                    Ok(StageCommand::Shutdown) | Err(_) => break,
                    Ok(command) => command,
                };
                let Some(kind) = command.kind() else { break };
                log::info!("{} request dispatched", kind.label());
                let outcome = runtime.block_on(execute(&client, &config, command));
                if let Err(err) = &outcome {
                    log::warn!("{} failed: {err}", kind.label());
                }
                let _ = proxy.send_event(MmEvent::Stage(StageEvent { kind, outcome }));
            }
        });

        Self {
            command_tx,
            thread_handle: Some(thread_handle),
        }
    }

    pub fn submit(&self, command: StageCommand) -> Result<(), PipelineError> {
        self.command_tx
            .send(command)
            .map_err(|e| PipelineError::Transport(format!("stage worker unavailable: {e}")))
    }

    pub fn shutdown(&mut self) {
        let _ = self.command_tx.send(StageCommand::Shutdown);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for StageWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn execute(
    client: &reqwest::Client,
    config: &BackendConfig,
    command: StageCommand,
) -> Result<StageOutput, PipelineError> {
    match command {
        StageCommand::RemoveBackground {
            image,
            file_name,
            foreground_ratio,
        } => remove_background(client, config, image, file_name, foreground_ratio).await,
        StageCommand::GenerateMesh { image, params } => {
            generate_mesh(client, config, image, params).await
        }
        StageCommand::LoadWhiteModel { folder } => load_white_model(client, config, folder).await,
        StageCommand::RenderViews { folder, category } => {
            render_views(client, config, folder, category).await
        }
        StageCommand::Materialize { folder, category } => {
            materialize(client, config, folder, category).await
        }
        StageCommand::Export { folder, dest } => export(client, config, folder, dest).await,
        StageCommand::Shutdown => unreachable!("handled by the worker loop"),
    }
}

async fn remove_background(
    client: &reqwest::Client,
    config: &BackendConfig,
    image: Vec<u8>,
    file_name: String,
    foreground_ratio: f32,
) -> Result<StageOutput, PipelineError> {
    let part = reqwest::multipart::Part::bytes(image)
        .file_name(file_name)
        .mime_str("image/png")
        .map_err(transport)?;
    let form = reqwest::multipart::Form::new()
        .part("image", part)
        .text("foreground_ratio", foreground_ratio.to_string());

    let response = client
        .post(format!("{}/remove_background", config.mesh_url))
        .multipart(form)
        .send()
        .await
        .map_err(transport)?;
    let response = check_status(response).await?;

    let body: RemoveBackgroundResponse = response.json().await.map_err(malformed)?;
    let image = protocol::decode_image_payload(&body.into_payload()?)?;
    Ok(StageOutput::Foreground(ForegroundImage { image }))
}

async fn generate_mesh(
    client: &reqwest::Client,
    config: &BackendConfig,
    image: Vec<u8>,
    params: PipelineParameters,
) -> Result<StageOutput, PipelineError> {
    let part = reqwest::multipart::Part::bytes(image)
        .file_name("processed.png")
        .mime_str("image/png")
        .map_err(transport)?;
    let form = reqwest::multipart::Form::new()
        .part("image", part)
        .text("foreground_ratio", params.foreground_ratio.to_string())
        .text("remesh_option", params.remesh.id().to_string())
        .text("vertex_count", params.vertex_count.to_string())
        .text("texture_size", params.texture_size.to_string());

    let response = client
        .post(format!("{}/run_model", config.mesh_url))
        .multipart(form)
        .send()
        .await
        .map_err(transport)?;
    let response = check_status(response).await?;

    // The token lives in a header, not the body; capture it verbatim.
    let folder = response
        .headers()
        .get(OUTPUT_FOLDER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .ok_or_else(|| {
            PipelineError::malformed(format!(
                "mesh generation response is missing the {OUTPUT_FOLDER_HEADER} header"
            ))
        })?;
    let folder = SampleFolder::new(folder)?;

    let bytes = response.bytes().await.map_err(transport)?;
    let archive = protocol::unpack_mesh_archive(&bytes)?;
    let albedo = EncodedImage::from_bytes(archive.albedo)?;

    Ok(StageOutput::TexturedMesh(TexturedMeshBundle {
        folder,
        geometry: archive.geometry,
        material: archive.material,
        albedo,
    }))
}

async fn load_white_model(
    client: &reqwest::Client,
    config: &BackendConfig,
    folder: SampleFolder,
) -> Result<StageOutput, PipelineError> {
    let response = client
        .post(format!("{}/display", config.material_url))
        .json(&protocol::display_request(&folder))
        .send()
        .await
        .map_err(transport)?;
    let response = check_status(response).await?;

    let body: DisplayResponse = response.json().await.map_err(malformed)?;
    let (uv_payload, mesh_path) = body.into_parts()?;

    let albedo_uv = fetch_image_payload(client, &config.material_url, &uv_payload).await?;
    let mesh_url = protocol::resolve_url(&config.material_url, &mesh_path);
    let mesh_response = check_status(client.get(mesh_url).send().await.map_err(transport)?).await?;
    let mesh = mesh_response.bytes().await.map_err(transport)?.to_vec();

    Ok(StageOutput::WhiteModel(WhiteModelBundle { mesh, albedo_uv }))
}

/// The render and segmentation requests run concurrently and settle as a
/// unit: if either fails, no view data survives.
async fn render_views(
    client: &reqwest::Client,
    config: &BackendConfig,
    folder: SampleFolder,
    category: Category,
) -> Result<StageOutput, PipelineError> {
    let (render_payloads, seg_payloads) = tokio::try_join!(
        fetch_renderings(client, config, &folder),
        fetch_segmentations(client, config, &folder, category),
    )?;

    let renders = decode_all(&render_payloads)?;
    let segmentations = decode_all(&seg_payloads)?;
    Ok(StageOutput::Views(ViewSet::new(
        renders,
        segmentations,
        category,
    )?))
}

async fn fetch_renderings(
    client: &reqwest::Client,
    config: &BackendConfig,
    folder: &SampleFolder,
) -> Result<Vec<String>, PipelineError> {
    let response = client
        .post(format!("{}/get_rendering", config.material_url))
        .json(&protocol::rendering_request(folder))
        .send()
        .await
        .map_err(transport)?;
    let response = check_status(response).await?;
    let body: RenderViewsResponse = response.json().await.map_err(malformed)?;
    body.into_payloads()
}

async fn fetch_segmentations(
    client: &reqwest::Client,
    config: &BackendConfig,
    folder: &SampleFolder,
    category: Category,
) -> Result<Vec<String>, PipelineError> {
    let response = client
        .post(format!("{}/get_segmentation", config.material_url))
        .json(&protocol::segmentation_request(folder, category))
        .send()
        .await
        .map_err(transport)?;
    let response = check_status(response).await?;
    let body: SegmentationResponse = response.json().await.map_err(malformed)?;
    body.into_payloads()
}

async fn materialize(
    client: &reqwest::Client,
    config: &BackendConfig,
    folder: SampleFolder,
    category: Category,
) -> Result<StageOutput, PipelineError> {
    let response = client
        .post(format!("{}/render_to_uv", config.material_url))
        .json(&protocol::materialize_request(&folder, category))
        .send()
        .await
        .map_err(transport)?;
    let response = check_status(response).await?;

    let body: MaterializeResponse = response.json().await.map_err(malformed)?;
    let image = fetch_image_payload(client, &config.material_url, &body.into_payload()?).await?;
    Ok(StageOutput::Orm(OrmTexture { image }))
}

async fn export(
    client: &reqwest::Client,
    config: &BackendConfig,
    folder: SampleFolder,
    dest: PathBuf,
) -> Result<StageOutput, PipelineError> {
    let response = client
        .get(format!("{}/download_material", config.material_url))
        .query(&protocol::export_query(&folder))
        .send()
        .await
        .map_err(transport)?;
    let response = check_status(response).await?;

    let bytes = response.bytes().await.map_err(transport)?;
    std::fs::write(&dest, &bytes)
        .map_err(|e| PipelineError::Transport(format!("failed to write {}: {e}", dest.display())))?;
    Ok(StageOutput::Exported(dest))
}

/// An embedded image payload is either inline base64 (possibly a data URL)
/// or a reference that has to be fetched from the service.
async fn fetch_image_payload(
    client: &reqwest::Client,
    base: &str,
    payload: &str,
) -> Result<EncodedImage, PipelineError> {
    if payload.starts_with("http://") || payload.starts_with("https://") || payload.starts_with('/')
    {
        let url = protocol::resolve_url(base, payload);
        let response = check_status(client.get(url).send().await.map_err(transport)?).await?;
        let bytes = response.bytes().await.map_err(transport)?;
        EncodedImage::from_bytes(bytes.to_vec())
    } else {
        protocol::decode_image_payload(payload)
    }
}

fn decode_all(payloads: &[String]) -> Result<Vec<EncodedImage>, PipelineError> {
    payloads
        .iter()
        .map(|payload| protocol::decode_image_payload(payload))
        .collect()
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, PipelineError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(PipelineError::Backend(format!("HTTP {status}: {body}")))
}

fn transport(error: reqwest::Error) -> PipelineError {
    PipelineError::Transport(error.to_string())
}

fn malformed(error: reqwest::Error) -> PipelineError {
    PipelineError::malformed(error.to_string())
}
