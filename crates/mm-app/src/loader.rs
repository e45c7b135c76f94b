//! Mesh parsing worker. Parsing happens off the event-loop thread; results
//! come back as user events and are attached to whichever surface is still
//! current.

use std::sync::mpsc::{Sender, channel};
use std::thread::{self, JoinHandle};

use winit::event_loop::EventLoopProxy;

use crate::events::{AppEvent, MmEvent};
use crate::viewer::ViewerKind;

pub enum LoaderCommand {
    ParseTextured {
        generation: u64,
        geometry: Vec<u8>,
        material: Vec<u8>,
    },
    ParseWhite {
        generation: u64,
        mesh: Vec<u8>,
    },
    Shutdown,
}

pub struct MeshLoader {
    command_tx: Sender<LoaderCommand>,
    thread_handle: Option<JoinHandle<()>>,
}

impl MeshLoader {
    pub fn new(proxy: EventLoopProxy<MmEvent>) -> Self {
        let (command_tx, command_rx) = channel::<LoaderCommand>();

        let thread_handle = thread::spawn(move || {
            loop {
                let (viewer, generation, result) = match command_rx.recv() {
                    Ok(LoaderCommand::ParseTextured {
                        generation,
                        geometry,
                        material,
                    }) => (
                        ViewerKind::Textured,
                        generation,
                        mm_view::mesh::from_obj_bytes(&geometry, &material)
                            .map_err(|e| e.to_string()),
                    ),
                    Ok(LoaderCommand::ParseWhite { generation, mesh }) => (
                        ViewerKind::Materialized,
                        generation,
                        mm_view::mesh::from_glb_bytes(&mesh).map_err(|e| e.to_string()),
                    ),
                    Ok(LoaderCommand::Shutdown) | Err(_) => break,
                };
                let _ = proxy.send_event(MmEvent::App(AppEvent::MeshLoaded {
                    viewer,
                    generation,
                    result,
                }));
            }
        });

        Self {
            command_tx,
            thread_handle: Some(thread_handle),
        }
    }

    pub fn parse_textured(&self, generation: u64, geometry: Vec<u8>, material: Vec<u8>) {
        let _ = self.command_tx.send(LoaderCommand::ParseTextured {
            generation,
            geometry,
            material,
        });
    }

    pub fn parse_white(&self, generation: u64, mesh: Vec<u8>) {
        let _ = self
            .command_tx
            .send(LoaderCommand::ParseWhite { generation, mesh });
    }

    pub fn shutdown(&mut self) {
        let _ = self.command_tx.send(LoaderCommand::Shutdown);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MeshLoader {
    fn drop(&mut self) {
        self.shutdown();
    }
}
