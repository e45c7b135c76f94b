use egui::{Color32, Context, RichText, Sense};

use crate::ui::{UiComponent, UiContext, UiEvent};
use crate::viewer::ViewerKind;

const DRAG_SENSITIVITY: f32 = 0.01;
const ZOOM_SENSITIVITY: f32 = 0.002;

/// Central panel hosting the two viewer viewports side by side. Each
/// viewport reports its size back so the render surface tracks it, and
/// routes drag/scroll input to the matching orbit camera.
#[derive(Default)]
pub struct ViewerPanel {}

fn draw_viewer(ui: &mut egui::Ui, ui_ctx: &UiContext, kind: ViewerKind) {
    ui.horizontal(|ui| {
        ui.label(RichText::new(kind.label()).strong());
        if ui_ctx.viewer_frame(kind).is_some() && ui.small_button("Reset Camera").clicked() {
            ui_ctx.send_event(UiEvent::ResetViewerCamera(kind));
        }
    });

    let desired = ui.available_size().max(egui::vec2(1.0, 1.0));
    match ui_ctx.viewer_frame(kind) {
        Some(frame) => {
            if (desired - frame.size).length() > 1.0 {
                ui_ctx.send_event(UiEvent::ViewerResized {
                    viewer: kind,
                    width: desired.x as u32,
                    height: desired.y as u32,
                });
            }

            let response = ui.add(
                egui::Image::new((frame.texture, desired)).sense(Sense::click_and_drag()),
            );
            if response.dragged() {
                let delta = response.drag_delta();
                if delta != egui::Vec2::ZERO {
                    ui_ctx.send_event(UiEvent::OrbitViewer {
                        viewer: kind,
                        dx: delta.x * DRAG_SENSITIVITY,
                        dy: -delta.y * DRAG_SENSITIVITY,
                    });
                }
            }
            if response.hovered() {
                let scroll = ui.input(|input| input.smooth_scroll_delta.y);
                if scroll != 0.0 {
                    ui_ctx.send_event(UiEvent::ZoomViewer {
                        viewer: kind,
                        amount: scroll * ZOOM_SENSITIVITY,
                    });
                }
            }
        }
        None => {
            let hint = match kind {
                ViewerKind::Textured => "Run the model to preview the textured mesh.",
                ViewerKind::Materialized => "Materialise to preview the ORM-textured white model.",
            };
            ui.centered_and_justified(|ui| {
                ui.label(RichText::new(hint).color(Color32::GRAY));
            });
        }
    }
}

impl UiComponent for ViewerPanel {
    fn show(&mut self, ctx: &Context, ui_ctx: &UiContext) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.columns(2, |columns| {
                draw_viewer(&mut columns[0], ui_ctx, ViewerKind::Textured);
                draw_viewer(&mut columns[1], ui_ctx, ViewerKind::Materialized);
            });
        });
    }
}
