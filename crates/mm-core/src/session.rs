use log::info;

use crate::artifacts::{
    ForegroundImage, OrmTexture, SampleFolder, SourceImage, TexturedMeshBundle, ViewSet,
    WhiteModelBundle,
};
use crate::error::PipelineError;

/// Pipeline progress, derived from which session slots are populated rather
/// than tracked separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineStage {
    Idle,
    ForegroundReady,
    MeshReady,
    WhiteModelReady,
    ViewsReady,
    Materialized,
}

impl PipelineStage {
    pub fn label(&self) -> &str {
        match self {
            Self::Idle => "Idle",
            Self::ForegroundReady => "Foreground ready",
            Self::MeshReady => "Mesh ready",
            Self::WhiteModelReady => "White model ready",
            Self::ViewsReady => "Views ready",
            Self::Materialized => "Materialised",
        }
    }
}

/// Change notifications emitted by the session to registered observers.
///
/// `MaterializedReady` is keyed on exactly two slots — the white model and
/// the ORM texture — and fires iff both are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSignal {
    Reset,
    ForegroundReady,
    TexturedMeshReady,
    WhiteModelReady,
    ViewsReady,
    MaterializedReady,
}

type Observer = Box<dyn FnMut(&SessionSignal)>;

/// The asset cache for one pipeline run: every stage artifact as a named
/// optional slot, mutated only through the appliers below. Each applier
/// takes a fully-formed artifact, so a failed transition never leaves a
/// partial write behind.
#[derive(Default)]
pub struct PipelineSession {
    source: Option<SourceImage>,
    foreground: Option<ForegroundImage>,
    mesh: Option<TexturedMeshBundle>,
    white: Option<WhiteModelBundle>,
    views: Option<ViewSet>,
    orm: Option<OrmTexture>,
    observers: Vec<Observer>,
}

impl PipelineSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> PipelineStage {
        if self.orm.is_some() {
            PipelineStage::Materialized
        } else if self.views.is_some() {
            PipelineStage::ViewsReady
        } else if self.white.is_some() {
            PipelineStage::WhiteModelReady
        } else if self.mesh.is_some() {
            PipelineStage::MeshReady
        } else if self.foreground.is_some() {
            PipelineStage::ForegroundReady
        } else {
            PipelineStage::Idle
        }
    }

    /// Register a change observer. Observers live for the session's lifetime.
    pub fn observe(&mut self, observer: impl FnMut(&SessionSignal) + 'static) {
        self.observers.push(Box::new(observer));
    }

    fn emit(&mut self, signal: SessionSignal) {
        for observer in &mut self.observers {
            observer(&signal);
        }
    }

    // --- accessors -------------------------------------------------------

    pub fn source(&self) -> Option<&SourceImage> {
        self.source.as_ref()
    }

    pub fn foreground(&self) -> Option<&ForegroundImage> {
        self.foreground.as_ref()
    }

    pub fn textured_mesh(&self) -> Option<&TexturedMeshBundle> {
        self.mesh.as_ref()
    }

    pub fn white_model(&self) -> Option<&WhiteModelBundle> {
        self.white.as_ref()
    }

    pub fn views(&self) -> Option<&ViewSet> {
        self.views.as_ref()
    }

    pub fn orm(&self) -> Option<&OrmTexture> {
        self.orm.as_ref()
    }

    pub fn sample_folder(&self) -> Option<&SampleFolder> {
        self.mesh.as_ref().map(|m| &m.folder)
    }

    // --- preconditions ---------------------------------------------------

    pub fn require_source(&self) -> Result<&SourceImage, PipelineError> {
        self.source
            .as_ref()
            .ok_or_else(|| PipelineError::precondition("No image selected."))
    }

    pub fn require_foreground(&self) -> Result<&ForegroundImage, PipelineError> {
        self.foreground
            .as_ref()
            .ok_or_else(|| PipelineError::precondition("No processed image available."))
    }

    pub fn require_sample_folder(&self) -> Result<&SampleFolder, PipelineError> {
        self.sample_folder().ok_or_else(|| {
            PipelineError::precondition("First model must be run to produce output.")
        })
    }

    pub fn require_views(&self) -> Result<&ViewSet, PipelineError> {
        self.views
            .as_ref()
            .ok_or_else(|| PipelineError::precondition("Render views and segmentation first."))
    }

    /// Strict forward order: a transition may only fire from its exact
    /// predecessor stage.
    pub fn ensure_stage(&self, expected: PipelineStage) -> Result<(), PipelineError> {
        let stage = self.stage();
        if stage != expected {
            return Err(PipelineError::precondition(format!(
                "Pipeline is at \"{}\", expected \"{}\". Select a new image to start over.",
                stage.label(),
                expected.label()
            )));
        }
        Ok(())
    }

    // --- transitions -----------------------------------------------------

    /// New image selection: the only backward transition. Clears every slot
    /// from previous runs before the new source takes effect.
    pub fn reset(&mut self, source: SourceImage) {
        info!("Session reset with source {:?}", source.path);
        self.source = Some(source);
        self.foreground = None;
        self.mesh = None;
        self.white = None;
        self.views = None;
        self.orm = None;
        self.emit(SessionSignal::Reset);
    }

    pub fn apply_foreground(&mut self, foreground: ForegroundImage) -> Result<(), PipelineError> {
        self.require_source()?;
        self.ensure_stage(PipelineStage::Idle)?;
        self.foreground = Some(foreground);
        self.emit(SessionSignal::ForegroundReady);
        Ok(())
    }

    pub fn apply_textured_mesh(&mut self, bundle: TexturedMeshBundle) -> Result<(), PipelineError> {
        self.ensure_stage(PipelineStage::ForegroundReady)?;
        info!("Textured mesh ready, sample folder: {}", bundle.folder);
        self.mesh = Some(bundle);
        self.emit(SessionSignal::TexturedMeshReady);
        Ok(())
    }

    pub fn apply_white_model(&mut self, bundle: WhiteModelBundle) -> Result<(), PipelineError> {
        self.require_sample_folder()?;
        self.ensure_stage(PipelineStage::MeshReady)?;
        self.white = Some(bundle);
        self.emit(SessionSignal::WhiteModelReady);
        if self.orm.is_some() {
            self.emit(SessionSignal::MaterializedReady);
        }
        Ok(())
    }

    pub fn apply_views(&mut self, views: ViewSet) -> Result<(), PipelineError> {
        self.require_sample_folder()?;
        self.ensure_stage(PipelineStage::WhiteModelReady)?;
        self.views = Some(views);
        self.emit(SessionSignal::ViewsReady);
        Ok(())
    }

    pub fn apply_orm(&mut self, orm: OrmTexture) -> Result<(), PipelineError> {
        self.require_sample_folder()?;
        self.ensure_stage(PipelineStage::ViewsReady)?;
        self.orm = Some(orm);
        if self.white.is_some() {
            self.emit(SessionSignal::MaterializedReady);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::path::PathBuf;
    use std::rc::Rc;

    use super::*;
    use crate::artifacts::test_support::tiny_image;
    use crate::artifacts::VIEW_COUNT;
    use crate::category::Category;

    fn source() -> SourceImage {
        SourceImage {
            path: PathBuf::from("cat.png"),
            image: tiny_image([1, 2, 3, 255]),
        }
    }

    fn foreground() -> ForegroundImage {
        ForegroundImage {
            image: tiny_image([4, 5, 6, 255]),
        }
    }

    fn mesh_bundle(folder: &str) -> TexturedMeshBundle {
        TexturedMeshBundle {
            folder: SampleFolder::new(folder).unwrap(),
            geometry: b"v 0 0 0".to_vec(),
            material: b"newmtl m".to_vec(),
            albedo: tiny_image([7, 8, 9, 255]),
        }
    }

    fn white_bundle() -> WhiteModelBundle {
        WhiteModelBundle {
            mesh: vec![0x67, 0x6c, 0x54, 0x46],
            albedo_uv: tiny_image([10, 11, 12, 255]),
        }
    }

    fn views() -> ViewSet {
        let five = || {
            (0..VIEW_COUNT)
                .map(|_| tiny_image([1, 1, 1, 255]))
                .collect::<Vec<_>>()
        };
        ViewSet::new(five(), five(), Category::Car).unwrap()
    }

    fn orm() -> OrmTexture {
        OrmTexture {
            image: tiny_image([200, 90, 30, 255]),
        }
    }

    #[test]
    fn test_forward_progression() {
        let mut session = PipelineSession::new();
        assert_eq!(session.stage(), PipelineStage::Idle);

        session.reset(source());
        session.apply_foreground(foreground()).unwrap();
        assert_eq!(session.stage(), PipelineStage::ForegroundReady);

        session.apply_textured_mesh(mesh_bundle("outputs/s1")).unwrap();
        assert_eq!(session.stage(), PipelineStage::MeshReady);
        assert_eq!(session.sample_folder().unwrap().as_str(), "outputs/s1");

        session.apply_white_model(white_bundle()).unwrap();
        session.apply_views(views()).unwrap();
        session.apply_orm(orm()).unwrap();
        assert_eq!(session.stage(), PipelineStage::Materialized);
    }

    #[test]
    fn test_stage_two_blocked_before_foreground() {
        let mut session = PipelineSession::new();
        session.reset(source());
        let err = session.require_foreground().unwrap_err();
        assert!(err.is_local());
        // Applying out of order is also refused.
        assert!(session.apply_textured_mesh(mesh_bundle("f")).is_err());
        assert_eq!(session.stage(), PipelineStage::Idle);
    }

    #[test]
    fn test_token_required_for_later_stages() {
        let mut session = PipelineSession::new();
        session.reset(source());
        session.apply_foreground(foreground()).unwrap();

        assert!(matches!(
            session.require_sample_folder(),
            Err(PipelineError::Precondition(_))
        ));
        assert!(session.apply_white_model(white_bundle()).is_err());
        assert_eq!(session.stage(), PipelineStage::ForegroundReady);
    }

    #[test]
    fn test_no_skipping_forward() {
        let mut session = PipelineSession::new();
        session.reset(source());
        session.apply_foreground(foreground()).unwrap();
        session.apply_textured_mesh(mesh_bundle("s")).unwrap();

        // Views before the white model is a stage violation.
        assert!(session.apply_views(views()).is_err());
        assert_eq!(session.stage(), PipelineStage::MeshReady);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut session = PipelineSession::new();
        session.reset(source());
        session.apply_foreground(foreground()).unwrap();
        session.apply_textured_mesh(mesh_bundle("s")).unwrap();

        session.reset(source());
        assert_eq!(session.stage(), PipelineStage::Idle);
        assert!(session.sample_folder().is_none());
        assert!(session.foreground().is_none());
    }

    #[test]
    fn test_materialized_signal_requires_both_slots() {
        let mut session = PipelineSession::new();
        let fired = Rc::new(RefCell::new(0usize));
        let fired_in_observer = fired.clone();
        session.observe(move |signal| {
            if *signal == SessionSignal::MaterializedReady {
                *fired_in_observer.borrow_mut() += 1;
            }
        });

        session.reset(source());
        session.apply_foreground(foreground()).unwrap();
        session.apply_textured_mesh(mesh_bundle("s")).unwrap();
        session.apply_white_model(white_bundle()).unwrap();
        assert_eq!(*fired.borrow(), 0, "white model alone must not fire");

        session.apply_views(views()).unwrap();
        assert_eq!(*fired.borrow(), 0);

        session.apply_orm(orm()).unwrap();
        assert_eq!(*fired.borrow(), 1, "fires once both slots are present");
    }

    #[test]
    fn test_category_recorded_with_views() {
        let mut session = PipelineSession::new();
        session.reset(source());
        session.apply_foreground(foreground()).unwrap();
        session.apply_textured_mesh(mesh_bundle("s")).unwrap();
        session.apply_white_model(white_bundle()).unwrap();
        session.apply_views(views()).unwrap();
        assert_eq!(session.views().unwrap().category(), Category::Car);
    }
}
