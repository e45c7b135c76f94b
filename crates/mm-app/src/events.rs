use std::path::PathBuf;

use mm_core::{
    ForegroundImage, OrmTexture, PipelineError, SessionSignal, TexturedMeshBundle, ViewSet,
    WhiteModelBundle,
};
use mm_view::MeshData;

use crate::ui::UiEvent;
use crate::viewer::ViewerKind;

#[derive(Debug)]
pub enum MmEvent {
    Ui(UiEvent),
    App(AppEvent),
    Stage(StageEvent),
}

#[derive(Debug)]
pub enum AppEvent {
    Status(String),
    Session(SessionSignal),
    MeshLoaded {
        viewer: ViewerKind,
        generation: u64,
        result: Result<MeshData, String>,
    },
}

/// Completion of one backend-driven transition, delivered from the stage
/// worker thread back to the event loop.
#[derive(Debug)]
pub struct StageEvent {
    pub kind: StageKind,
    pub outcome: Result<StageOutput, PipelineError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    RemoveBackground,
    GenerateMesh,
    WhiteModel,
    RenderViews,
    Materialize,
    Export,
}

impl StageKind {
    pub fn label(&self) -> &str {
        match self {
            Self::RemoveBackground => "Background removal",
            Self::GenerateMesh => "Mesh generation",
            Self::WhiteModel => "White model display",
            Self::RenderViews => "Views & segmentation",
            Self::Materialize => "Materialisation",
            Self::Export => "Export",
        }
    }
}

#[derive(Debug)]
pub enum StageOutput {
    Foreground(ForegroundImage),
    TexturedMesh(TexturedMeshBundle),
    WhiteModel(WhiteModelBundle),
    Views(ViewSet),
    Orm(OrmTexture),
    Exported(PathBuf),
}
