use std::sync::Arc;

use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy};
use winit::window::{WindowAttributes, WindowId};

use crate::events::MmEvent;
use crate::state::AppState;

pub struct App {
    event_loop_proxy: Arc<EventLoopProxy<MmEvent>>,
    state: Option<AppState>,
}

impl App {
    pub fn new(event_loop: &mut EventLoop<MmEvent>) -> Self {
        let event_loop_proxy = Arc::new(event_loop.create_proxy());

        Self {
            event_loop_proxy,
            state: None,
        }
    }
}

impl ApplicationHandler<MmEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let window_attributes = WindowAttributes::default()
            .with_title("MetaMesh")
            .with_inner_size(winit::dpi::LogicalSize::new(1600.0, 900.0));

        let window = Arc::new(event_loop.create_window(window_attributes).unwrap());

        let state =
            pollster::block_on(AppState::new(window.clone(), self.event_loop_proxy.clone()))
                .unwrap();
        self.state = Some(state);
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: MmEvent) {
        let Some(state) = &mut self.state else {
            return;
        };

        match event {
            MmEvent::Ui(event) => state.on_ui_event(event),
            MmEvent::App(event) => state.on_app_event(event),
            MmEvent::Stage(event) => state.on_stage_event(event),
        }
        state.window.request_redraw();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = &mut self.state else {
            return;
        };

        if state.window.id() != window_id {
            return;
        }

        // Let egui handle the event first; viewer camera input arrives as
        // UiEvents from the viewer panel instead.
        let _ = state.ui.egui_state.on_window_event(&state.window, &event);

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                state.resize(physical_size);
            }
            WindowEvent::RedrawRequested => {
                if let Err(error) = state.render() {
                    log::warn!("render failed: {error}");
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        // Continuous render loop: viewers repaint every display refresh.
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }
}
