//! Top-level assembly: configuration in, scene out.
//!
//! A [`RenderPipeline`] moves through three states. It starts in [`RenderState::NoMatrix`];
//! accepting a non-empty matrix resolves assets, reserves the logo zone and moves it to
//! [`RenderState::MatrixReady`]; rendering composes the scene and ends in
//! [`RenderState::Rendered`]. An empty matrix leaves it in `NoMatrix`, which renders nothing.
//!
//! [`QrRenderer`] drives a pipeline per call, fetching the matrix from a [`MatrixProvider`]
//! either synchronously or through a last-call-wins [`MatrixSession`].

use crate::asset::{Asset, AssetResolver, FileAssetResolver};
use crate::compositor::{self, Branch, Extras, Symbol};
use crate::config::RenderConfig;
use crate::error::{RenderError, Result};
use crate::logo::{logo_nodes, reserve_logo_zone, LogoLayout};
use crate::matrix::{MatrixProvider, ModuleMatrix, QrEncoder};
use crate::scene::Scene;
use crate::session::MatrixSession;
use std::sync::Arc;
use tracing::{debug, warn};

/// A matrix with its logo zone reserved and its assets resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedMatrix {
    pub matrix: ModuleMatrix,
    pub logo: Option<(LogoLayout, Asset)>,
    pub image: Option<Asset>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderState {
    NoMatrix,
    MatrixReady(PreparedMatrix),
    Rendered(Scene),
}

/// One render of one configuration.
pub struct RenderPipeline<'a, R: AssetResolver + ?Sized> {
    config: &'a RenderConfig,
    resolver: &'a R,
    state: RenderState,
}

impl<'a, R: AssetResolver + ?Sized> RenderPipeline<'a, R> {
    pub fn new(config: &'a RenderConfig, resolver: &'a R) -> Self {
        Self {
            config,
            resolver,
            state: RenderState::NoMatrix,
        }
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    fn resolve(&self, what: &str, source: &str) -> Option<Asset> {
        if source.is_empty() {
            warn!(what, "empty asset source, skipping");
            return None;
        }
        match self.resolver.resolve(source) {
            Ok(asset) => Some(asset),
            Err(err) => {
                warn!(what, source, error = %err, "asset unresolved, skipping");
                None
            }
        }
    }

    /// Takes the provider's matrix. Must be called in `NoMatrix`.
    pub fn accept_matrix(&mut self, matrix: ModuleMatrix) -> Result<()> {
        if !matches!(self.state, RenderState::NoMatrix) {
            return Err(RenderError::InvalidConfiguration(
                "pipeline already holds a matrix".to_string(),
            ));
        }
        if matrix.is_empty() {
            debug!("empty matrix, nothing to render");
            return Ok(());
        }

        let config = self.config;
        // The image clip only matters when no gradient takes precedence
        let image = match (&config.gradient, &config.image_clip) {
            (None, Some(clip)) => self.resolve("image", &clip.href),
            _ => None,
        };
        // The image branch draws no logo, so nothing is reserved for it
        let logo = match &config.logo {
            Some(opts) if image.is_none() => self
                .resolve("logo", &opts.source)
                .map(|asset| (LogoLayout::compute(config.size, opts), asset)),
            _ => None,
        };
        let matrix = match &logo {
            Some((layout, _)) => reserve_logo_zone(&matrix, layout).matrix,
            None => matrix,
        };

        self.state = RenderState::MatrixReady(PreparedMatrix { matrix, logo, image });
        Ok(())
    }

    /// Composes the scene. Returns `None` while there is no matrix.
    pub fn render(&mut self) -> Result<Option<&Scene>> {
        let prepared = match std::mem::replace(&mut self.state, RenderState::NoMatrix) {
            RenderState::MatrixReady(prepared) => prepared,
            other => {
                self.state = other;
                return Ok(self.scene());
            }
        };

        let config = self.config;
        let gradient = match &config.gradient {
            Some(spec) => match spec.resolve(config.size, config.size) {
                Ok(gradient) => Some(gradient),
                Err(err) => {
                    self.state = RenderState::MatrixReady(prepared);
                    return Err(err);
                }
            },
            None => None,
        };
        let logo = match (&prepared.logo, &config.logo) {
            (Some((layout, asset)), Some(opts)) => logo_nodes(layout, opts, asset.clone()),
            _ => Vec::new(),
        };
        let extras = Extras {
            gradient,
            mask_logo: config.gradient.as_ref().is_some_and(|g| g.mask_logo),
            image: prepared.image.clone(),
            logo,
        };

        let symbol = Symbol {
            matrix: &prepared.matrix,
            size: config.size,
            color: config.color,
            background: config.background_color,
            piece: &config.piece,
            eyes: &config.eye,
        };
        let (branch, nodes) = compositor::compose(&symbol, extras);
        if branch == Branch::ImageClip && config.logo.is_some() {
            debug!("logo not drawn over an image clip");
        }

        let scene = compositor::into_scene(
            nodes,
            config.size,
            config.background_color,
            config.include_background,
        );
        self.state = RenderState::Rendered(scene);
        Ok(self.scene())
    }

    pub fn scene(&self) -> Option<&Scene> {
        match &self.state {
            RenderState::Rendered(scene) => Some(scene),
            _ => None,
        }
    }

    pub fn into_scene(self) -> Option<Scene> {
        match self.state {
            RenderState::Rendered(scene) => Some(scene),
            _ => None,
        }
    }
}

/// Renders configurations into scenes.
pub struct QrRenderer<P = QrEncoder, R = FileAssetResolver> {
    provider: Arc<P>,
    resolver: R,
    session: MatrixSession<P>,
}

impl QrRenderer {
    /// The built-in encoder, loading assets from the filesystem.
    pub fn new() -> Self {
        Self::with_parts(QrEncoder, FileAssetResolver::new())
    }
}

impl Default for QrRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, R> QrRenderer<P, R>
where
    P: MatrixProvider + 'static,
    R: AssetResolver,
{
    pub fn with_parts(provider: P, resolver: R) -> Self {
        let provider = Arc::new(provider);
        Self {
            session: MatrixSession::from_arc(Arc::clone(&provider)),
            provider,
            resolver,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Renders synchronously. An empty matrix yields a scene with no nodes.
    pub fn render(&self, config: &RenderConfig) -> Result<Scene> {
        config.validate()?;
        let matrix = self.provider.generate(&config.matrix_request())?;
        self.finish(config, matrix)
    }

    /// Like [`render`](Self::render), but the matrix comes from this renderer's session.
    ///
    /// A call that is overtaken by a newer one fails with [`RenderError::Superseded`].
    pub async fn render_async(&self, config: &RenderConfig) -> Result<Scene> {
        config.validate()?;
        let matrix = self.session.generate(config.matrix_request()).await?;
        self.finish(config, matrix)
    }

    fn finish(&self, config: &RenderConfig, matrix: ModuleMatrix) -> Result<Scene> {
        let mut pipeline = RenderPipeline::new(config, &self.resolver);
        pipeline.accept_matrix(matrix)?;
        pipeline.render()?;
        Ok(pipeline.into_scene().unwrap_or_else(|| {
            compositor::into_scene(Vec::new(), config.size, config.background_color, false)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::MemoryAssetResolver;
    use crate::color::Color;
    use crate::geometry::{is_in_eye, EYE_ZONE};
    use crate::logo::LogoOptions;
    use crate::matrix::{EccLevel, MatrixRequest};
    use crate::scene::Node;
    use image::{Rgba, RgbaImage};
    use proptest::prelude::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<MatrixRequest>>,
    }

    impl MatrixProvider for Recording {
        fn generate(&self, request: &MatrixRequest) -> Result<ModuleMatrix> {
            self.seen.lock().unwrap().push(request.clone());
            QrEncoder.generate(request)
        }
    }

    fn resolver_with_logo() -> MemoryAssetResolver {
        let mut resolver = MemoryAssetResolver::new();
        resolver.insert("logo.png", RgbaImage::from_pixel(8, 8, Rgba([200, 0, 0, 255])));
        resolver
    }

    fn piece_count(scene: &Scene) -> usize {
        // Background rect plus three eye groups
        scene.nodes.len() - 1 - 3
    }

    #[test]
    fn test_default_scenario() {
        let scene = QrRenderer::new().render(&RenderConfig::new("Kudaliar")).unwrap();
        assert_eq!(scene.size, 200.0);
        assert_eq!(scene.output_size(), 200.0);
        assert!(scene.card.is_none());
        assert_eq!(scene.background, Color::WHITE);
        assert!(scene.images().is_empty());

        let fills = scene.fills();
        assert_eq!(fills[0].color(), Some(Color::WHITE));
        assert_eq!(fills[0].shape.bounding_box(), kurbo::Rect::new(0.0, 0.0, 200.0, 200.0));
        let colors: Vec<Color> = fills.iter().filter_map(|f| f.color()).collect();
        assert!(colors.iter().all(|&c| c == Color::BLACK || c == Color::WHITE));
        assert!(colors.iter().filter(|&&c| c == Color::BLACK).count() > 3);
    }

    #[test]
    fn test_logo_forces_high_ecc() {
        let renderer = QrRenderer::with_parts(Recording::default(), resolver_with_logo());
        let config = RenderConfig::new("https://example.com").with_logo(LogoOptions::new("logo.png"));
        let scene = renderer.render(&config).unwrap();
        assert_eq!(renderer.provider().seen.lock().unwrap()[0].ecc, EccLevel::H);
        assert_eq!(scene.images().len(), 1);

        let config = RenderConfig::new("https://example.com");
        renderer.render(&config).unwrap();
        assert_eq!(renderer.provider().seen.lock().unwrap()[1].ecc, EccLevel::M);
    }

    #[test]
    fn test_logo_clears_modules() {
        let renderer = QrRenderer::with_parts(QrEncoder, resolver_with_logo());
        let base = RenderConfig::new("https://example.com").with_ecc(EccLevel::H);
        let plain = renderer.render(&base).unwrap();
        let with_logo = renderer.render(&base.clone().with_logo(LogoOptions::new("logo.png"))).unwrap();
        // Logo adds border, background and image nodes
        assert!(piece_count(&with_logo) - 3 < piece_count(&plain));
    }

    #[test]
    fn test_missing_logo_is_skipped() {
        let renderer = QrRenderer::with_parts(Recording::default(), MemoryAssetResolver::new());
        let config = RenderConfig::new("https://example.com").with_logo(LogoOptions::new("absent.png"));
        let scene = renderer.render(&config).unwrap();
        assert!(scene.images().is_empty());
        assert_eq!(renderer.provider().seen.lock().unwrap()[0].ecc, EccLevel::H);

        let unlogoed = renderer.render(&RenderConfig::new("https://example.com").with_ecc(EccLevel::H)).unwrap();
        assert_eq!(scene, unlogoed);
    }

    #[test]
    fn test_eye_and_piece_exclusive() {
        let config = RenderConfig::new("https://example.com");
        let matrix = QrEncoder.generate(&config.matrix_request()).unwrap();
        let n = matrix.size();
        let scene = QrRenderer::new().render(&config).unwrap();
        let cell = 200.0 / n as f64;

        let pieces: Vec<_> = scene.nodes[1..].iter().filter_map(|node| match node {
            Node::Fill(fill) => Some(fill),
            _ => None,
        }).collect();
        let expected = matrix.cells().filter(|&(x, y, dark)| dark && !is_in_eye(x, y, n)).count();
        assert_eq!(pieces.len(), expected);
        for fill in pieces {
            let c = fill.shape.bounding_box().center();
            let (x, y) = ((c.x / cell) as usize, (c.y / cell) as usize);
            assert!(!is_in_eye(x, y, n), "piece drawn at eye cell ({x},{y})");
        }
        let eyes = scene.nodes.iter().filter(|n| matches!(n, Node::Group(_))).count();
        assert_eq!(eyes, 3);
        assert!(n > 2 * EYE_ZONE);
    }

    #[test]
    fn test_capacity_exceeded_propagates() {
        let config = RenderConfig::new("q".repeat(200)).with_max_version(2);
        assert!(matches!(
            QrRenderer::new().render(&config),
            Err(RenderError::CapacityExceeded { ecc: EccLevel::M, max_version: 2 })
        ));
    }

    #[test]
    fn test_invalid_config_rejected_before_encoding() {
        let renderer = QrRenderer::with_parts(Recording::default(), MemoryAssetResolver::new());
        assert!(renderer.render(&RenderConfig::new("")).is_err());
        assert!(renderer.provider().seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_pipeline_states() {
        let config = RenderConfig::new("abc");
        let resolver = MemoryAssetResolver::new();

        let mut pipeline = RenderPipeline::new(&config, &resolver);
        pipeline.accept_matrix(ModuleMatrix::new(0)).unwrap();
        assert_eq!(pipeline.state(), &RenderState::NoMatrix);
        assert!(pipeline.render().unwrap().is_none());

        let matrix = QrEncoder.generate(&config.matrix_request()).unwrap();
        pipeline.accept_matrix(matrix.clone()).unwrap();
        assert!(matches!(pipeline.state(), RenderState::MatrixReady(_)));
        assert!(pipeline.accept_matrix(matrix).is_err());
        assert!(pipeline.render().unwrap().is_some());
        assert!(matches!(pipeline.state(), RenderState::Rendered(_)));
    }

    #[test]
    fn test_gradient_and_image_branches() {
        let scene = QrRenderer::new().render(&RenderConfig::variant(crate::config::Variant::RadialGradient)).unwrap();
        assert!(scene.card.is_some());
        assert!(matches!(scene.nodes[1], Node::Mask { .. }));

        let renderer = QrRenderer::with_parts(QrEncoder, resolver_with_logo());
        let scene = renderer.render(&RenderConfig::variant(crate::config::Variant::ImageBackground)).unwrap();
        assert!(matches!(scene.nodes.last(), Some(Node::Clip { .. })));
        assert_eq!(scene.images().len(), 1);

        // Unresolved image falls back to flat colors
        let scene = QrRenderer::with_parts(QrEncoder, MemoryAssetResolver::new())
            .render(&RenderConfig::variant(crate::config::Variant::ImageBackground))
            .unwrap();
        assert!(scene.images().is_empty());
    }

    #[tokio::test]
    async fn test_render_async_matches_sync() {
        let renderer = QrRenderer::new();
        let config = RenderConfig::new("Kudaliar");
        let sync = renderer.render(&config).unwrap();
        let asynced = renderer.render_async(&config).await.unwrap();
        assert_eq!(sync, asynced);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]
        #[test]
        fn test_render_is_deterministic(value in "[ -~]{1,40}", size in 50.0f64..400.0) {
            let renderer = QrRenderer::new();
            let config = RenderConfig::new(value).with_size(size);
            prop_assert_eq!(renderer.render(&config).unwrap(), renderer.render(&config).unwrap());
        }
    }
}
