pub mod artifacts;
pub mod category;
pub mod error;
pub mod params;
pub mod session;

pub use artifacts::{
    EncodedImage, ForegroundImage, OrmTexture, SampleFolder, SourceImage, TexturedMeshBundle,
    ViewSet, WhiteModelBundle, VIEW_COUNT,
};
pub use category::Category;
pub use error::PipelineError;
pub use params::{PipelineParameters, RemeshOption, UNCAPPED_VERTICES};
pub use session::{PipelineSession, PipelineStage, SessionSignal};
