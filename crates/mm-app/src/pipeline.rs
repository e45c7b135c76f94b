//! Pipeline controller: validates preconditions against the session,
//! dispatches one stage command at a time to the worker, and applies
//! completed outcomes back onto the session.

use std::path::PathBuf;

use mm_core::{
    Category, EncodedImage, PipelineError, PipelineParameters, PipelineSession, PipelineStage,
    SourceImage,
};

use crate::events::{StageEvent, StageKind, StageOutput};
use crate::pipeline::worker::{StageCommand, StageWorker};

pub mod config;
pub mod protocol;
pub mod worker;

/// Where stage commands go. The worker implements this; tests record.
pub trait CommandSink {
    fn submit(&self, command: StageCommand) -> Result<(), PipelineError>;
}

impl CommandSink for StageWorker {
    fn submit(&self, command: StageCommand) -> Result<(), PipelineError> {
        StageWorker::submit(self, command)
    }
}

pub struct PipelineController<S: CommandSink = StageWorker> {
    session: PipelineSession,
    sink: S,
    in_flight: Option<StageKind>,
}

impl<S: CommandSink> PipelineController<S> {
    pub fn new(sink: S) -> Self {
        Self {
            session: PipelineSession::new(),
            sink,
            in_flight: None,
        }
    }

    pub fn session(&self) -> &PipelineSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut PipelineSession {
        &mut self.session
    }

    pub fn in_flight(&self) -> Option<StageKind> {
        self.in_flight
    }

    fn ensure_idle(&self) -> Result<(), PipelineError> {
        if let Some(active) = self.in_flight {
            return Err(PipelineError::precondition(format!(
                "{} is still running.",
                active.label()
            )));
        }
        Ok(())
    }

    fn dispatch(&mut self, kind: StageKind, command: StageCommand) -> Result<(), PipelineError> {
        self.ensure_idle()?;
        self.sink.submit(command)?;
        self.in_flight = Some(kind);
        Ok(())
    }

    /// New image selection: resets the whole session, then requests
    /// background removal with the current foreground ratio.
    pub fn select_source(
        &mut self,
        path: PathBuf,
        foreground_ratio: f32,
    ) -> Result<(), PipelineError> {
        self.ensure_idle()?;
        PipelineParameters {
            foreground_ratio,
            ..Default::default()
        }
        .validate()?;

        let bytes = std::fs::read(&path).map_err(|e| {
            PipelineError::precondition(format!("Failed to read {}: {e}", path.display()))
        })?;
        let image = EncodedImage::from_bytes(bytes.clone())?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image.png".to_string());

        self.session.reset(SourceImage { path, image });
        self.dispatch(
            StageKind::RemoveBackground,
            StageCommand::RemoveBackground {
                image: bytes,
                file_name,
                foreground_ratio,
            },
        )
    }

    /// Stage 2: sends the background-removed image plus all parameters.
    pub fn run_generation(&mut self, params: PipelineParameters) -> Result<(), PipelineError> {
        params.validate()?;
        let foreground = self.session.require_foreground()?;
        self.session.ensure_stage(PipelineStage::ForegroundReady)?;
        let image = foreground.image.bytes.clone();
        self.dispatch(
            StageKind::GenerateMesh,
            StageCommand::GenerateMesh { image, params },
        )
    }

    pub fn load_white_model(&mut self) -> Result<(), PipelineError> {
        let folder = self.session.require_sample_folder()?.clone();
        self.session.ensure_stage(PipelineStage::MeshReady)?;
        self.dispatch(
            StageKind::WhiteModel,
            StageCommand::LoadWhiteModel { folder },
        )
    }

    pub fn render_views(&mut self, category: Category) -> Result<(), PipelineError> {
        let folder = self.session.require_sample_folder()?.clone();
        self.session.ensure_stage(PipelineStage::WhiteModelReady)?;
        self.dispatch(
            StageKind::RenderViews,
            StageCommand::RenderViews { folder, category },
        )
    }

    /// Stage 5: the category comes from the recorded view set, so it always
    /// matches what segmentation ran with.
    pub fn materialize(&mut self) -> Result<(), PipelineError> {
        let folder = self.session.require_sample_folder()?.clone();
        let category = self.session.require_views()?.category();
        self.session.ensure_stage(PipelineStage::ViewsReady)?;
        self.dispatch(
            StageKind::Materialize,
            StageCommand::Materialize { folder, category },
        )
    }

    /// Export: repeatable and non-state-changing; only needs the token.
    pub fn export(&mut self, dest: PathBuf) -> Result<(), PipelineError> {
        let folder = self.session.require_sample_folder()?.clone();
        self.dispatch(StageKind::Export, StageCommand::Export { folder, dest })
    }

    /// Apply a completed stage outcome. On failure the session is left at
    /// the last successfully completed stage.
    pub fn on_stage_event(&mut self, event: StageEvent) -> Result<StageKind, PipelineError> {
        self.in_flight = None;
        let kind = event.kind;
        match event.outcome? {
            StageOutput::Foreground(foreground) => self.session.apply_foreground(foreground)?,
            StageOutput::TexturedMesh(bundle) => self.session.apply_textured_mesh(bundle)?,
            StageOutput::WhiteModel(bundle) => self.session.apply_white_model(bundle)?,
            StageOutput::Views(views) => self.session.apply_views(views)?,
            StageOutput::Orm(orm) => self.session.apply_orm(orm)?,
            StageOutput::Exported(path) => {
                log::info!("Export written to {}", path.display());
            }
        }
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::io::Cursor;
    use std::rc::Rc;

    use image::RgbaImage;

    use mm_core::{
        ForegroundImage, OrmTexture, SampleFolder, TexturedMeshBundle, ViewSet, WhiteModelBundle,
        VIEW_COUNT,
    };

    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        commands: Rc<RefCell<Vec<StageCommand>>>,
    }

    impl CommandSink for RecordingSink {
        fn submit(&self, command: StageCommand) -> Result<(), PipelineError> {
            self.commands.borrow_mut().push(command);
            Ok(())
        }
    }

    fn controller() -> (PipelineController<RecordingSink>, Rc<RefCell<Vec<StageCommand>>>) {
        let sink = RecordingSink::default();
        let commands = sink.commands.clone();
        (PipelineController::new(sink), commands)
    }

    fn tiny_image() -> EncodedImage {
        let img = RgbaImage::from_pixel(2, 2, image::Rgba([50, 60, 70, 255]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        EncodedImage::from_bytes(bytes).unwrap()
    }

    fn temp_png(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("mm-app-test-{name}.png"));
        std::fs::write(&path, &tiny_image().bytes).unwrap();
        path
    }

    fn ok_event(kind: StageKind, output: StageOutput) -> StageEvent {
        StageEvent {
            kind,
            outcome: Ok(output),
        }
    }

    fn views(category: Category) -> ViewSet {
        let five = || {
            (0..VIEW_COUNT)
                .map(|_| tiny_image())
                .collect::<Vec<_>>()
        };
        ViewSet::new(five(), five(), category).unwrap()
    }

    #[test]
    fn test_generation_before_foreground_sends_nothing() {
        let (mut controller, commands) = controller();
        let err = controller
            .run_generation(PipelineParameters::default())
            .unwrap_err();
        assert!(err.is_local());
        assert!(commands.borrow().is_empty(), "no command may be issued");
    }

    #[test]
    fn test_busy_controller_rejects_new_transitions() {
        let (mut controller, commands) = controller();
        let path = temp_png("busy");
        controller.select_source(path, 0.85).unwrap();
        assert!(controller.in_flight().is_some());
        assert_eq!(commands.borrow().len(), 1);

        let err = controller
            .run_generation(PipelineParameters::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Precondition(_)));
        assert_eq!(commands.borrow().len(), 1);
    }

    #[test]
    fn test_failed_transition_keeps_previous_stage() {
        let (mut controller, _commands) = controller();
        let path = temp_png("failure");
        controller.select_source(path, 0.85).unwrap();

        let err = controller
            .on_stage_event(StageEvent {
                kind: StageKind::RemoveBackground,
                outcome: Err(PipelineError::Backend("boom".into())),
            })
            .unwrap_err();
        assert!(matches!(err, PipelineError::Backend(_)));
        assert!(controller.in_flight().is_none(), "a new attempt must be possible");
        assert_eq!(controller.session().stage(), PipelineStage::Idle);
    }

    #[test]
    fn test_full_scenario_token_passed_verbatim() {
        let (mut controller, commands) = controller();
        let token = "outputs/sample 0042";

        // Select image -> stage 1 request carries the ratio.
        let path = temp_png("scenario");
        controller.select_source(path, 0.85).unwrap();
        match &commands.borrow()[0] {
            StageCommand::RemoveBackground {
                foreground_ratio, ..
            } => assert_eq!(*foreground_ratio, 0.85),
            other => panic!("unexpected command {other:?}"),
        }
        controller
            .on_stage_event(ok_event(
                StageKind::RemoveBackground,
                StageOutput::Foreground(ForegroundImage { image: tiny_image() }),
            ))
            .unwrap();
        assert_eq!(controller.session().stage(), PipelineStage::ForegroundReady);

        // Run generation with the scenario parameters.
        controller
            .run_generation(PipelineParameters {
                foreground_ratio: 0.85,
                remesh: mm_core::RemeshOption::None,
                vertex_count: -1,
                texture_size: 1024,
            })
            .unwrap();
        match &commands.borrow()[1] {
            StageCommand::GenerateMesh { params, .. } => {
                assert_eq!(params.vertex_count, -1);
                assert_eq!(params.texture_size, 1024);
            }
            other => panic!("unexpected command {other:?}"),
        }
        controller
            .on_stage_event(ok_event(
                StageKind::GenerateMesh,
                StageOutput::TexturedMesh(TexturedMeshBundle {
                    folder: SampleFolder::new(token).unwrap(),
                    geometry: b"v 0 0 0".to_vec(),
                    material: b"newmtl m".to_vec(),
                    albedo: tiny_image(),
                }),
            ))
            .unwrap();
        assert!(!controller
            .session()
            .sample_folder()
            .unwrap()
            .as_str()
            .is_empty());

        // White model, views, materialise, export: every command carries the
        // token byte-for-byte.
        controller.load_white_model().unwrap();
        controller
            .on_stage_event(ok_event(
                StageKind::WhiteModel,
                StageOutput::WhiteModel(WhiteModelBundle {
                    mesh: vec![1, 2, 3],
                    albedo_uv: tiny_image(),
                }),
            ))
            .unwrap();

        controller.render_views(Category::Car).unwrap();
        controller
            .on_stage_event(ok_event(
                StageKind::RenderViews,
                StageOutput::Views(views(Category::Car)),
            ))
            .unwrap();

        controller.materialize().unwrap();
        controller
            .on_stage_event(ok_event(
                StageKind::Materialize,
                StageOutput::Orm(OrmTexture { image: tiny_image() }),
            ))
            .unwrap();
        assert_eq!(controller.session().stage(), PipelineStage::Materialized);

        controller.export(PathBuf::from("/tmp/out.zip")).unwrap();

        let commands = commands.borrow();
        for command in commands.iter().skip(2) {
            let folder = match command {
                StageCommand::LoadWhiteModel { folder } => folder,
                StageCommand::RenderViews { folder, category } => {
                    assert_eq!(*category, Category::Car);
                    folder
                }
                StageCommand::Materialize { folder, category } => {
                    assert_eq!(*category, Category::Car, "category stable across 4 and 5");
                    folder
                }
                StageCommand::Export { folder, .. } => folder,
                other => panic!("unexpected command {other:?}"),
            };
            assert_eq!(folder.as_str(), token);
        }
        assert_eq!(commands.len(), 6);
    }

    #[test]
    fn test_rerun_requires_reset() {
        let (mut controller, _commands) = controller();
        let path = temp_png("rerun");
        controller.select_source(path.clone(), 0.85).unwrap();
        controller
            .on_stage_event(ok_event(
                StageKind::RemoveBackground,
                StageOutput::Foreground(ForegroundImage { image: tiny_image() }),
            ))
            .unwrap();
        controller.run_generation(PipelineParameters::default()).unwrap();
        controller
            .on_stage_event(ok_event(
                StageKind::GenerateMesh,
                StageOutput::TexturedMesh(TexturedMeshBundle {
                    folder: SampleFolder::new("outputs/a").unwrap(),
                    geometry: vec![],
                    material: vec![],
                    albedo: tiny_image(),
                }),
            ))
            .unwrap();

        // Mesh generation cannot be re-run in place.
        let err = controller
            .run_generation(PipelineParameters::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Precondition(_)));

        // A new selection starts over.
        controller.select_source(path, 0.9).unwrap();
        assert_eq!(controller.session().stage(), PipelineStage::Idle);
    }
}
