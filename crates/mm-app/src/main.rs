mod app;
mod events;
mod gfx;
mod loader;
mod pipeline;
mod state;
mod ui;
mod viewer;

use std::error::Error;

use winit::event_loop::{ControlFlow, EventLoop};

use crate::events::MmEvent;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();
    tracing::info!("MetaMesh starting");

    let mut event_loop: EventLoop<MmEvent> = EventLoop::with_user_event().build()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = app::App::new(&mut event_loop);
    event_loop.run_app(&mut app)?;

    Ok(())
}
