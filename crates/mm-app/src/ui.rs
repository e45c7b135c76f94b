mod side_panel;
mod top_panel;
mod viewer_panel;

pub use side_panel::SidePanel;
pub use top_panel::TopPanel;
pub use viewer_panel::ViewerPanel;

use std::sync::Arc;

use egui::Context;
use image::RgbaImage;
use winit::event_loop::EventLoopProxy;
use winit::window::Window;

use mm_core::{Category, PipelineParameters, PipelineStage};

use crate::events::{AppEvent, MmEvent, StageKind};
use crate::gfx::GfxState;
use crate::viewer::ViewerKind;

#[derive(Debug, Clone)]
pub enum UiEvent {
    SelectSource { foreground_ratio: f32 },
    RunGeneration { params: PipelineParameters },
    LoadWhiteModel,
    RenderViews { category: Category },
    Materialize,
    Export,

    // Viewer interactions
    OrbitViewer { viewer: ViewerKind, dx: f32, dy: f32 },
    ZoomViewer { viewer: ViewerKind, amount: f32 },
    ResetViewerCamera(ViewerKind),
    ViewerResized { viewer: ViewerKind, width: u32, height: u32 },
}

/// One viewer's presentable frame: the registered egui texture and the size
/// it was rendered at.
#[derive(Debug, Clone, Copy)]
pub struct ViewerFrame {
    pub texture: egui::TextureId,
    pub size: egui::Vec2,
}

/// Read-only app state shared with the panels each frame.
pub struct UiContext {
    pub stage: PipelineStage,
    pub busy: Option<StageKind>,
    pub sample_folder: Option<String>,
    pub status: String,
    pub error: Option<String>,

    pub source_preview: Option<egui::TextureHandle>,
    pub foreground_preview: Option<egui::TextureHandle>,
    pub uv_preview: Option<egui::TextureHandle>,
    pub orm_preview: Option<egui::TextureHandle>,
    pub render_previews: Vec<egui::TextureHandle>,
    pub segmentation_previews: Vec<egui::TextureHandle>,

    viewer_frames: [Option<ViewerFrame>; 2],

    pub event_loop_proxy: Arc<EventLoopProxy<MmEvent>>,
}

impl UiContext {
    pub fn new(event_loop_proxy: Arc<EventLoopProxy<MmEvent>>) -> Self {
        Self {
            stage: PipelineStage::Idle,
            busy: None,
            sample_folder: None,
            status: "Ready".into(),
            error: None,
            source_preview: None,
            foreground_preview: None,
            uv_preview: None,
            orm_preview: None,
            render_previews: Vec::new(),
            segmentation_previews: Vec::new(),
            viewer_frames: [None, None],
            event_loop_proxy,
        }
    }

    pub fn send_event(&self, event: UiEvent) {
        self.event_loop_proxy
            .send_event(MmEvent::Ui(event))
            .unwrap();
    }

    pub fn viewer_frame(&self, kind: ViewerKind) -> Option<ViewerFrame> {
        self.viewer_frames[kind.index()]
    }

    pub fn set_viewer_frame(&mut self, kind: ViewerKind, frame: Option<ViewerFrame>) {
        self.viewer_frames[kind.index()] = frame;
    }

    /// Drop every artifact preview; used on session reset.
    pub fn clear_previews(&mut self) {
        self.source_preview = None;
        self.foreground_preview = None;
        self.uv_preview = None;
        self.orm_preview = None;
        self.render_previews.clear();
        self.segmentation_previews.clear();
    }
}

/// Upload an artifact image as an egui texture for thumbnail display.
pub fn preview_texture(
    ctx: &egui::Context,
    name: &str,
    pixels: &RgbaImage,
) -> egui::TextureHandle {
    let size = [pixels.width() as usize, pixels.height() as usize];
    let color_image = egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_raw());
    ctx.load_texture(name, color_image, egui::TextureOptions::LINEAR)
}

pub struct UiState {
    pub(crate) egui_state: egui_winit::State,
    pub(crate) egui_ctx: egui::Context,
    pub(crate) egui_renderer: egui_wgpu::Renderer,

    components: Vec<Box<dyn UiComponent>>,
    pub(crate) ui_ctx: UiContext,
}

impl UiState {
    pub fn new(
        gfx: &GfxState,
        window: Arc<Window>,
        event_loop_proxy: Arc<EventLoopProxy<MmEvent>>,
    ) -> Self {
        let egui_ctx = egui::Context::default();

        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        let egui_renderer = egui_wgpu::Renderer::new(
            &gfx.device,
            gfx.config.format,
            egui_wgpu::RendererOptions::default(),
        );

        Self {
            egui_ctx,
            egui_state,
            egui_renderer,
            components: Vec::new(),
            ui_ctx: UiContext::new(event_loop_proxy),
        }
    }

    pub fn draw(&mut self, window: &Window) -> egui::FullOutput {
        let raw_input = self.egui_state.take_egui_input(window);

        self.egui_ctx.run(raw_input, |ctx| {
            for component in self.components.iter_mut() {
                component.show(ctx, &self.ui_ctx);
            }
        })
    }

    pub fn add_component(&mut self, component: Box<dyn UiComponent>) {
        self.components.push(component);
    }

    pub fn on_app_event(&mut self, event: &AppEvent) {
        for component in self.components.iter_mut() {
            component.on_app_event(event);
        }
    }
}

pub trait UiComponent: Send + Sync {
    fn show(&mut self, ctx: &Context, ui_ctx: &UiContext);

    fn on_app_event(&mut self, _event: &AppEvent) {}
}
