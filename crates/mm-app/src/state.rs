use std::sync::Arc;

use winit::event_loop::EventLoopProxy;
use winit::window::Window;

use mm_core::{PipelineError, SessionSignal};
use mm_view::{MaterialSpec, OrbitCamera, TextureData};

use crate::events::{AppEvent, MmEvent, StageEvent, StageKind};
use crate::gfx::GfxState;
use crate::loader::MeshLoader;
use crate::pipeline::PipelineController;
use crate::pipeline::config::BackendConfig;
use crate::pipeline::worker::StageWorker;
use crate::ui::{self, UiEvent, UiState, ViewerFrame};
use crate::viewer::{Viewer, ViewerKind};

pub struct AppState {
    pub(crate) window: Arc<Window>,

    pub gfx: GfxState,
    pub ui: UiState,

    viewer_a: Viewer,
    viewer_b: Viewer,

    controller: PipelineController,
    loader: MeshLoader,
}

impl AppState {
    pub async fn new(
        window: Arc<Window>,
        event_loop_proxy: Arc<EventLoopProxy<MmEvent>>,
    ) -> anyhow::Result<Self> {
        let gfx = GfxState::new(window.clone()).await?;
        let mut ui = UiState::new(&gfx, window.clone(), event_loop_proxy.clone());

        ui.add_component(Box::new(ui::TopPanel::default()));
        ui.add_component(Box::new(ui::SidePanel::default()));
        ui.add_component(Box::new(ui::ViewerPanel::default()));

        let config = BackendConfig::load();
        let worker = StageWorker::new(config, (*event_loop_proxy).clone());
        let mut controller = PipelineController::new(worker);

        // The materialized-viewer rebuild (and friends) is observer-driven:
        // session slot changes come back to us as user events.
        let signal_proxy = (*event_loop_proxy).clone();
        controller.session_mut().observe(move |signal| {
            let _ = signal_proxy.send_event(MmEvent::App(AppEvent::Session(*signal)));
        });

        let loader = MeshLoader::new((*event_loop_proxy).clone());

        Ok(Self {
            window,
            gfx,
            ui,
            viewer_a: Viewer::new(ViewerKind::Textured),
            viewer_b: Viewer::new(ViewerKind::Materialized),
            controller,
            loader,
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.gfx.resize(new_size);
        }
    }

    fn set_status(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::info!("{message}");
        self.ui.on_app_event(&AppEvent::Status(message.clone()));
        self.ui.ui_ctx.status = message;
        self.ui.ui_ctx.error = None;
    }

    fn report_error(&mut self, error: PipelineError) {
        log::warn!("{error}");
        self.ui.ui_ctx.error = Some(error.to_string());
    }

    /// Mirror controller state into the UI context before each frame.
    fn sync_ui(&mut self) {
        let session = self.controller.session();
        let stage = session.stage();
        let sample_folder = session.sample_folder().map(|f| f.as_str().to_owned());
        let busy = self.controller.in_flight();

        let ctx = &mut self.ui.ui_ctx;
        ctx.stage = stage;
        ctx.busy = busy;
        ctx.sample_folder = sample_folder;
    }

    pub fn on_ui_event(&mut self, event: UiEvent) {
        let result: Result<(), PipelineError> = match event {
            UiEvent::SelectSource { foreground_ratio } => {
                self.select_source_dialog(foreground_ratio)
            }
            UiEvent::RunGeneration { params } => {
                let result = self.controller.run_generation(params);
                if result.is_ok() {
                    self.set_status("Generating textured mesh…");
                }
                result
            }
            UiEvent::LoadWhiteModel => {
                let result = self.controller.load_white_model();
                if result.is_ok() {
                    self.set_status("Loading white model…");
                }
                result
            }
            UiEvent::RenderViews { category } => {
                let result = self.controller.render_views(category);
                if result.is_ok() {
                    self.set_status("Rendering views and segmentation…");
                }
                result
            }
            UiEvent::Materialize => {
                let result = self.controller.materialize();
                if result.is_ok() {
                    self.set_status("Materialising…");
                }
                result
            }
            UiEvent::Export => self.export_dialog(),
            UiEvent::OrbitViewer { viewer, dx, dy } => {
                if let Some(surface) = self.viewer_slot(viewer).surface_mut() {
                    surface.camera.rotate(dx, dy);
                }
                Ok(())
            }
            UiEvent::ZoomViewer { viewer, amount } => {
                if let Some(surface) = self.viewer_slot(viewer).surface_mut() {
                    surface.camera.zoom(amount);
                }
                Ok(())
            }
            UiEvent::ResetViewerCamera(viewer) => {
                if let Some(surface) = self.viewer_slot(viewer).surface_mut() {
                    let aspect = surface.camera.aspect_ratio;
                    surface.camera = OrbitCamera::default();
                    surface.camera.aspect_ratio = aspect;
                }
                Ok(())
            }
            UiEvent::ViewerResized {
                viewer,
                width,
                height,
            } => {
                match viewer {
                    ViewerKind::Textured => self.viewer_a.resize(
                        &self.gfx,
                        &mut self.ui.egui_renderer,
                        width,
                        height,
                    ),
                    ViewerKind::Materialized => self.viewer_b.resize(
                        &self.gfx,
                        &mut self.ui.egui_renderer,
                        width,
                        height,
                    ),
                }
                self.refresh_viewer_frame(viewer);
                Ok(())
            }
        };

        if let Err(error) = result {
            self.report_error(error);
        }
    }

    pub fn on_app_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Status(message) => {
                self.ui.on_app_event(&AppEvent::Status(message.clone()));
                self.ui.ui_ctx.status = message;
            }
            AppEvent::Session(signal) => self.on_session_signal(signal),
            AppEvent::MeshLoaded {
                viewer,
                generation,
                result,
            } => match result {
                Ok(mesh) => match viewer {
                    ViewerKind::Textured => {
                        self.viewer_a.attach_if_current(&self.gfx, generation, &mesh)
                    }
                    ViewerKind::Materialized => {
                        self.viewer_b.attach_if_current(&self.gfx, generation, &mesh)
                    }
                },
                Err(message) => self.report_error(PipelineError::Malformed(format!(
                    "mesh load failed: {message}"
                ))),
            },
        }
    }

    /// Completed backend transition: apply to the session, then refresh the
    /// artifact previews that changed.
    pub fn on_stage_event(&mut self, event: StageEvent) {
        match self.controller.on_stage_event(event) {
            Ok(kind) => {
                self.refresh_stage_previews(kind);
                let status = match kind {
                    StageKind::RemoveBackground => "Background removed.".to_string(),
                    StageKind::GenerateMesh => {
                        let folder = self
                            .controller
                            .session()
                            .sample_folder()
                            .map(|f| f.as_str().to_owned())
                            .unwrap_or_default();
                        format!("Textured mesh ready (sample folder: {folder}).")
                    }
                    StageKind::WhiteModel => "White model loaded.".to_string(),
                    StageKind::RenderViews => "Views and segmentation ready.".to_string(),
                    StageKind::Materialize => "Materialisation complete.".to_string(),
                    StageKind::Export => "Generated files saved.".to_string(),
                };
                self.set_status(status);
            }
            Err(error) => self.report_error(error),
        }
    }

    fn on_session_signal(&mut self, signal: SessionSignal) {
        match signal {
            SessionSignal::Reset => {
                self.viewer_a.teardown(&mut self.ui.egui_renderer);
                self.viewer_b.teardown(&mut self.ui.egui_renderer);
                self.ui.ui_ctx.set_viewer_frame(ViewerKind::Textured, None);
                self.ui.ui_ctx.set_viewer_frame(ViewerKind::Materialized, None);
                self.ui.ui_ctx.clear_previews();
                if let Some(pixels) = self
                    .controller
                    .session()
                    .source()
                    .map(|source| source.image.pixels.clone())
                {
                    self.ui.ui_ctx.source_preview =
                        Some(ui::preview_texture(&self.ui.egui_ctx, "source", &pixels));
                }
            }
            SessionSignal::TexturedMeshReady => self.rebuild_textured_viewer(),
            SessionSignal::MaterializedReady => self.rebuild_materialized_viewer(),
            _ => {}
        }
    }

    fn select_source_dialog(&mut self, foreground_ratio: f32) -> Result<(), PipelineError> {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Image", &["png", "jpg", "jpeg"])
            .pick_file()
        else {
            return Ok(());
        };
        self.controller.select_source(path, foreground_ratio)?;
        self.set_status("Removing background…");
        Ok(())
    }

    fn export_dialog(&mut self) -> Result<(), PipelineError> {
        // Export needs the token; check before bothering with a dialog.
        self.controller.session().require_sample_folder()?;
        let default_name = format!(
            "metamesh-{}.zip",
            chrono::Utc::now().format("%Y%m%d-%H%M%S")
        );
        let Some(dest) = rfd::FileDialog::new()
            .set_file_name(default_name)
            .save_file()
        else {
            return Ok(());
        };
        self.controller.export(dest)?;
        self.set_status("Downloading generated files…");
        Ok(())
    }

    fn viewer_slot(&mut self, kind: ViewerKind) -> &mut Viewer {
        match kind {
            ViewerKind::Textured => &mut self.viewer_a,
            ViewerKind::Materialized => &mut self.viewer_b,
        }
    }

    /// Viewer A consumes the stage-2 bundle: the supplied albedo texture is
    /// authoritative over whatever the MTL references.
    fn rebuild_textured_viewer(&mut self) {
        let Some((geometry, material, albedo)) =
            self.controller.session().textured_mesh().map(|bundle| {
                (
                    bundle.geometry.clone(),
                    bundle.material.clone(),
                    TextureData::from_pixels(&bundle.albedo.pixels),
                )
            })
        else {
            return;
        };

        let generation = self.viewer_a.rebuild(
            &self.gfx,
            &mut self.ui.egui_renderer,
            &albedo,
            None,
            MaterialSpec::albedo_only(),
        );
        self.loader.parse_textured(generation, geometry, material);
        self.refresh_viewer_frame(ViewerKind::Textured);
    }

    /// Viewer B consumes the white mesh re-textured with the stage-3 albedo
    /// and the stage-5 ORM map (metalness ← red, roughness ← green).
    fn rebuild_materialized_viewer(&mut self) {
        let session = self.controller.session();
        let (Some(white), Some(orm)) = (session.white_model(), session.orm()) else {
            return;
        };
        let mesh = white.mesh.clone();
        let albedo = TextureData::from_pixels(&white.albedo_uv.pixels);
        let orm_texture = TextureData::from_pixels(&orm.image.pixels);

        let generation = self.viewer_b.rebuild(
            &self.gfx,
            &mut self.ui.egui_renderer,
            &albedo,
            Some(&orm_texture),
            MaterialSpec::orm_packed(),
        );
        self.loader.parse_white(generation, mesh);
        self.refresh_viewer_frame(ViewerKind::Materialized);
    }

    fn refresh_viewer_frame(&mut self, kind: ViewerKind) {
        let viewer = match kind {
            ViewerKind::Textured => &self.viewer_a,
            ViewerKind::Materialized => &self.viewer_b,
        };
        let frame = match (viewer.texture_id(), viewer.surface()) {
            (Some(texture), Some(surface)) => {
                let (width, height) = surface.size();
                Some(ViewerFrame {
                    texture,
                    size: egui::vec2(width as f32, height as f32),
                })
            }
            _ => None,
        };
        self.ui.ui_ctx.set_viewer_frame(kind, frame);
    }

    fn refresh_stage_previews(&mut self, kind: StageKind) {
        let egui_ctx = self.ui.egui_ctx.clone();
        let session = self.controller.session();
        match kind {
            StageKind::RemoveBackground => {
                if let Some(foreground) = session.foreground() {
                    self.ui.ui_ctx.foreground_preview = Some(ui::preview_texture(
                        &egui_ctx,
                        "foreground",
                        &foreground.image.pixels,
                    ));
                }
            }
            StageKind::WhiteModel => {
                if let Some(white) = session.white_model() {
                    self.ui.ui_ctx.uv_preview = Some(ui::preview_texture(
                        &egui_ctx,
                        "albedo_uv",
                        &white.albedo_uv.pixels,
                    ));
                }
            }
            StageKind::RenderViews => {
                if let Some(views) = session.views() {
                    self.ui.ui_ctx.render_previews = views
                        .renders()
                        .iter()
                        .enumerate()
                        .map(|(i, image)| {
                            ui::preview_texture(&egui_ctx, &format!("view{i}"), &image.pixels)
                        })
                        .collect();
                    self.ui.ui_ctx.segmentation_previews = views
                        .segmentations()
                        .iter()
                        .enumerate()
                        .map(|(i, image)| {
                            ui::preview_texture(&egui_ctx, &format!("seg{i}"), &image.pixels)
                        })
                        .collect();
                }
            }
            StageKind::Materialize => {
                if let Some(orm) = session.orm() {
                    self.ui.ui_ctx.orm_preview =
                        Some(ui::preview_texture(&egui_ctx, "orm", &orm.image.pixels));
                }
            }
            StageKind::GenerateMesh | StageKind::Export => {}
        }
    }

    pub fn render(&mut self) -> anyhow::Result<()> {
        let size = self.window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Ok(());
        }

        self.sync_ui();

        let output = self.gfx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .gfx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        // Viewer render loops: every frame, into their offscreen targets,
        // regardless of whether a backend call is in flight.
        self.viewer_a.render(&self.gfx.queue, &mut encoder);
        self.viewer_b.render(&self.gfx.queue, &mut encoder);

        // Clear the window; egui draws everything on top.
        {
            let _ = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Clear Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.1,
                            g: 0.1,
                            b: 0.1,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                ..Default::default()
            });
        }

        // UI
        let full_output = self.ui.draw(&self.window);

        let platform_output = full_output.platform_output.clone();
        self.ui
            .egui_state
            .handle_platform_output(&self.window, platform_output);

        let shapes = full_output.shapes.clone();
        let pixels_per_point = full_output.pixels_per_point;
        let paint_jobs = self.ui.egui_ctx.tessellate(shapes, pixels_per_point);

        let size = self.window.inner_size();
        let screen_desc = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [size.width, size.height],
            pixels_per_point: self.window.scale_factor() as f32,
        };

        for (id, delta) in &full_output.textures_delta.set {
            self.ui
                .egui_renderer
                .update_texture(&self.gfx.device, &self.gfx.queue, *id, delta);
        }

        self.ui.egui_renderer.update_buffers(
            &self.gfx.device,
            &self.gfx.queue,
            &mut encoder,
            &paint_jobs,
            &screen_desc,
        );

        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                ..Default::default()
            });

            self.ui
                .egui_renderer
                .render(&mut rpass.forget_lifetime(), &paint_jobs, &screen_desc);
        }

        for id in &full_output.textures_delta.free {
            self.ui.egui_renderer.free_texture(id);
        }

        self.gfx.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}
