use egui::{Color32, Context, RichText, TextureHandle};

use mm_core::{Category, PipelineParameters, PipelineStage, RemeshOption, UNCAPPED_VERTICES};

use crate::events::AppEvent;
use crate::ui::{UiComponent, UiContext, UiEvent};

pub struct SidePanel {
    pub params: PipelineParameters,
    pub category: Category,
    pub last_status: Option<String>,
}

impl Default for SidePanel {
    fn default() -> Self {
        Self {
            params: PipelineParameters::default(),
            category: Category::default(),
            last_status: None,
        }
    }
}

fn thumbnail(ui: &mut egui::Ui, handle: &TextureHandle, max_width: f32) {
    let size = handle.size_vec2();
    let scale = (max_width / size.x).min(1.0);
    ui.image((handle.id(), size * scale));
}

impl SidePanel {
    fn generation_section(&mut self, ui: &mut egui::Ui, ui_ctx: &UiContext) {
        let idle = ui_ctx.busy.is_none();

        ui.heading(RichText::new("1. Image → Textured Mesh").size(16.0));
        ui.add_space(5.0);

        if ui
            .add_enabled(idle, egui::Button::new("🖼 Select Image"))
            .clicked()
        {
            ui_ctx.send_event(UiEvent::SelectSource {
                foreground_ratio: self.params.foreground_ratio,
            });
        }

        if let Some(preview) = &ui_ctx.source_preview {
            ui.add_space(5.0);
            ui.label(RichText::new("Original").small().color(Color32::GRAY));
            thumbnail(ui, preview, 300.0);
        }
        if let Some(preview) = &ui_ctx.foreground_preview {
            ui.add_space(5.0);
            ui.label(
                RichText::new("Background removed")
                    .small()
                    .color(Color32::GRAY),
            );
            thumbnail(ui, preview, 300.0);
        }

        ui.add_space(8.0);
        ui.add(
            egui::Slider::new(
                &mut self.params.foreground_ratio,
                PipelineParameters::FOREGROUND_RATIO_RANGE,
            )
            .text("Foreground ratio"),
        );

        egui::ComboBox::from_label("Remesh option")
            .selected_text(self.params.remesh.label())
            .show_ui(ui, |ui| {
                for option in RemeshOption::all() {
                    ui.selectable_value(&mut self.params.remesh, option, option.label());
                }
            });

        ui.add(
            egui::Slider::new(
                &mut self.params.vertex_count,
                PipelineParameters::VERTEX_COUNT_RANGE,
            )
            .text("Target vertex count"),
        );
        if self.params.vertex_count == UNCAPPED_VERTICES {
            ui.label(RichText::new("-1 = uncapped").small().color(Color32::GRAY));
        }

        ui.add(
            egui::Slider::new(
                &mut self.params.texture_size,
                PipelineParameters::TEXTURE_SIZE_RANGE,
            )
            .text("Texture size"),
        );

        ui.add_space(8.0);
        let can_run = idle && ui_ctx.stage == PipelineStage::ForegroundReady;
        if ui
            .add_enabled(
                can_run,
                egui::Button::new(RichText::new("▶ Run Model").size(14.0))
                    .min_size(egui::vec2(ui.available_width(), 30.0)),
            )
            .clicked()
        {
            ui_ctx.send_event(UiEvent::RunGeneration {
                params: self.params.clone(),
            });
        }
    }

    fn materialisation_section(&mut self, ui: &mut egui::Ui, ui_ctx: &UiContext) {
        let idle = ui_ctx.busy.is_none();

        ui.heading(RichText::new("2. White Model → Materials").size(16.0));
        ui.add_space(5.0);

        match &ui_ctx.sample_folder {
            Some(folder) => {
                ui.horizontal_wrapped(|ui| {
                    ui.label(RichText::new("Sample folder:").strong());
                    ui.label(RichText::new(folder).small().monospace());
                });
            }
            None => {
                ui.label(
                    RichText::new("No sample folder available yet. Run section 1 first.")
                        .color(Color32::RED),
                );
            }
        }

        egui::ComboBox::from_label("Category")
            .selected_text(self.category.label())
            .show_ui(ui, |ui| {
                for category in Category::all() {
                    ui.selectable_value(&mut self.category, category, category.label());
                }
            });

        ui.add_space(5.0);
        if ui
            .add_enabled(
                idle && ui_ctx.stage == PipelineStage::MeshReady,
                egui::Button::new("Load White Model"),
            )
            .clicked()
        {
            ui_ctx.send_event(UiEvent::LoadWhiteModel);
        }
        if ui
            .add_enabled(
                idle && ui_ctx.stage == PipelineStage::WhiteModelReady,
                egui::Button::new("Render (Views & Segmentation)"),
            )
            .clicked()
        {
            ui_ctx.send_event(UiEvent::RenderViews {
                category: self.category,
            });
        }
        if ui
            .add_enabled(
                idle && ui_ctx.stage == PipelineStage::ViewsReady,
                egui::Button::new("Materialise"),
            )
            .clicked()
        {
            ui_ctx.send_event(UiEvent::Materialize);
        }
        if ui
            .add_enabled(
                idle && ui_ctx.sample_folder.is_some(),
                egui::Button::new("💾 Download All Generated Files"),
            )
            .clicked()
        {
            ui_ctx.send_event(UiEvent::Export);
        }

        if let Some(preview) = &ui_ctx.uv_preview {
            ui.collapsing("Albedo UV", |ui| thumbnail(ui, preview, 300.0));
        }
        if !ui_ctx.render_previews.is_empty() {
            ui.collapsing("Rendered Views", |ui| {
                egui::ScrollArea::horizontal()
                    .id_salt("render_views")
                    .show(ui, |ui| {
                        ui.horizontal(|ui| {
                            for preview in &ui_ctx.render_previews {
                                thumbnail(ui, preview, 96.0);
                            }
                        });
                    });
            });
        }
        if !ui_ctx.segmentation_previews.is_empty() {
            ui.collapsing("Segmentation Views", |ui| {
                egui::ScrollArea::horizontal()
                    .id_salt("segmentation_views")
                    .show(ui, |ui| {
                        ui.horizontal(|ui| {
                            for preview in &ui_ctx.segmentation_previews {
                                thumbnail(ui, preview, 96.0);
                            }
                        });
                    });
            });
        }
        if let Some(preview) = &ui_ctx.orm_preview {
            ui.collapsing("ORM UV Map", |ui| thumbnail(ui, preview, 300.0));
        }
    }
}

impl UiComponent for SidePanel {
    fn show(&mut self, ctx: &Context, ui_ctx: &UiContext) {
        egui::SidePanel::left("side_panel")
            .default_width(340.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    ui.heading("MetaMesh");
                    ui.separator();

                    self.generation_section(ui, ui_ctx);
                    ui.separator();
                    self.materialisation_section(ui, ui_ctx);
                    ui.separator();

                    if let Some(busy) = ui_ctx.busy {
                        ui.horizontal(|ui| {
                            ui.spinner();
                            ui.label(format!("{} in progress…", busy.label()));
                        });
                        if let Some(status) = &self.last_status {
                            ui.label(RichText::new(status).color(Color32::LIGHT_BLUE));
                        }
                    } else {
                        ui.label(RichText::new(&ui_ctx.status).color(Color32::LIGHT_BLUE));
                    }

                    if let Some(error) = &ui_ctx.error {
                        ui.label(RichText::new(format!("Error: {error}")).color(Color32::RED));
                    }
                });
            });
    }

    fn on_app_event(&mut self, event: &AppEvent) {
        if let AppEvent::Status(message) = event {
            self.last_status = Some(message.clone());
        }
    }
}
