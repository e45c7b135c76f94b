//! A viewer slot: owns at most one live render surface plus its egui
//! texture registration, replaced as a unit whenever the input bundle
//! changes.

use mm_view::{MaterialSpec, MeshData, TextureData, ViewerSurface};

use crate::gfx::GfxState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerKind {
    Textured,
    Materialized,
}

impl ViewerKind {
    pub fn label(&self) -> &str {
        match self {
            Self::Textured => "Textured Mesh",
            Self::Materialized => "Materialised Model",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Self::Textured => 0,
            Self::Materialized => 1,
        }
    }
}

pub struct Viewer {
    kind: ViewerKind,
    surface: Option<ViewerSurface>,
    egui_id: Option<egui::TextureId>,
    generation: u64,
}

impl Viewer {
    const DEFAULT_SIZE: (u32, u32) = (960, 540);

    pub fn new(kind: ViewerKind) -> Self {
        Self {
            kind,
            surface: None,
            egui_id: None,
            generation: 0,
        }
    }

    pub fn surface(&self) -> Option<&ViewerSurface> {
        self.surface.as_ref()
    }

    pub fn surface_mut(&mut self) -> Option<&mut ViewerSurface> {
        self.surface.as_mut()
    }

    pub fn texture_id(&self) -> Option<egui::TextureId> {
        self.egui_id
    }

    /// Replace the render surface: the previous one is torn down completely
    /// (egui registration freed, GPU resources dropped) before the new one
    /// is constructed. Returns the new surface generation.
    pub fn rebuild(
        &mut self,
        gfx: &GfxState,
        egui_renderer: &mut egui_wgpu::Renderer,
        albedo: &TextureData,
        orm: Option<&TextureData>,
        spec: MaterialSpec,
    ) -> u64 {
        let (width, height) = self
            .surface
            .as_ref()
            .map(|s| s.size())
            .unwrap_or(Self::DEFAULT_SIZE);
        self.teardown(egui_renderer);

        let surface = ViewerSurface::new(
            &gfx.device,
            &gfx.queue,
            self.kind.label(),
            width,
            height,
            albedo,
            orm,
            spec,
        );
        let id = egui_renderer.register_native_texture(
            &gfx.device,
            surface.color_view(),
            wgpu::FilterMode::Linear,
        );
        self.surface = Some(surface);
        self.egui_id = Some(id);
        self.generation += 1;
        log::info!(
            "{} viewer surface rebuilt (generation {})",
            self.kind.label(),
            self.generation
        );
        self.generation
    }

    pub fn teardown(&mut self, egui_renderer: &mut egui_wgpu::Renderer) {
        if let Some(id) = self.egui_id.take() {
            egui_renderer.free_texture(&id);
        }
        self.surface = None;
    }

    /// Track host-panel size changes; re-registers the egui texture when the
    /// render target is recreated.
    pub fn resize(
        &mut self,
        gfx: &GfxState,
        egui_renderer: &mut egui_wgpu::Renderer,
        width: u32,
        height: u32,
    ) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        if surface.size() == (width.max(1), height.max(1)) {
            return;
        }
        surface.resize(&gfx.device, width, height);
        if let Some(old) = self.egui_id.take() {
            egui_renderer.free_texture(&old);
        }
        self.egui_id = Some(egui_renderer.register_native_texture(
            &gfx.device,
            surface.color_view(),
            wgpu::FilterMode::Linear,
        ));
    }

    /// Attach an asynchronously parsed mesh if it still belongs to the
    /// current surface.
    pub fn attach_if_current(&mut self, gfx: &GfxState, generation: u64, mesh: &MeshData) {
        if generation != self.generation {
            log::info!(
                "Dropping stale mesh for {} viewer (generation {} != {})",
                self.kind.label(),
                generation,
                self.generation
            );
            return;
        }
        if let Some(surface) = self.surface.as_mut() {
            surface.attach_mesh(&gfx.device, mesh);
        }
    }

    pub fn render(&mut self, queue: &wgpu::Queue, encoder: &mut wgpu::CommandEncoder) {
        if let Some(surface) = self.surface.as_mut() {
            surface.render(queue, encoder);
        }
    }
}
