use egui::{Color32, Context, RichText};

use crate::ui::{UiComponent, UiContext};

#[derive(Default)]
pub struct TopPanel {}

impl UiComponent for TopPanel {
    fn show(&mut self, ctx: &Context, ui_ctx: &UiContext) {
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("🧊 MetaMesh");
                ui.separator();
                ui.label(RichText::new("Stage:").color(Color32::LIGHT_BLUE));
                ui.label(ui_ctx.stage.label());
                if let Some(busy) = ui_ctx.busy {
                    ui.separator();
                    ui.spinner();
                    ui.label(format!("{}…", busy.label()));
                }
            });
        });
    }
}
