// ============================================================================
// POSTER GENERATION: form configuration and the three-variation batch
// ============================================================================

use image::RgbaImage;
use rayon::prelude::*;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::StudioError;
use crate::ops::ai::Collaborator;

/// Number of variations requested per generation.
pub const BATCH_SIZE: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Mood {
    #[default]
    Modern,
    Dark,
    Fresh,
    Corporate,
    Creative,
    Lifestyle,
}

impl Mood {
    pub fn all() -> &'static [Mood] {
        &[Mood::Modern, Mood::Dark, Mood::Fresh, Mood::Corporate, Mood::Creative, Mood::Lifestyle]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Mood::Modern => "Modern Minimal",
            Mood::Dark => "Dark Premium",
            Mood::Fresh => "Fresh & Energetic",
            Mood::Corporate => "Corporate Pro",
            Mood::Creative => "Creative Artistic",
            Mood::Lifestyle => "Natural Lifestyle",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Mood::Modern => "Clean tech layout, neutral background",
            Mood::Dark => "Cinematic lighting, black/navy background",
            Mood::Fresh => "Vibrant colors, youthful composition",
            Mood::Corporate => "Structured and blue-gray palette",
            Mood::Creative => "Abstract shapes, bold typography",
            Mood::Lifestyle => "Warm lighting, everyday usage",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AspectRatio {
    Square,
    Portrait3x4,
    Landscape4x3,
    #[default]
    Story9x16,
    Wide16x9,
}

impl AspectRatio {
    pub fn all() -> &'static [AspectRatio] {
        &[
            AspectRatio::Story9x16,
            AspectRatio::Portrait3x4,
            AspectRatio::Square,
            AspectRatio::Landscape4x3,
            AspectRatio::Wide16x9,
        ]
    }

    /// The `w:h` form handed to the generation service.
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait3x4 => "3:4",
            AspectRatio::Landscape4x3 => "4:3",
            AspectRatio::Story9x16 => "9:16",
            AspectRatio::Wide16x9 => "16:9",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1 (Square Post)",
            AspectRatio::Portrait3x4 => "3:4 (Instagram Feed)",
            AspectRatio::Landscape4x3 => "4:3 (Landscape)",
            AspectRatio::Story9x16 => "9:16 (TikTok / Reels)",
            AspectRatio::Wide16x9 => "16:9 (Landscape)",
        }
    }

    pub fn parse(s: &str) -> Option<AspectRatio> {
        Self::all().iter().copied().find(|r| r.as_str() == s.trim())
    }

    /// Width over height.
    pub fn ratio(&self) -> f32 {
        match self {
            AspectRatio::Square => 1.0,
            AspectRatio::Portrait3x4 => 3.0 / 4.0,
            AspectRatio::Landscape4x3 => 4.0 / 3.0,
            AspectRatio::Story9x16 => 9.0 / 16.0,
            AspectRatio::Wide16x9 => 16.0 / 9.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LogoPosition {
    TopLeft,
    #[default]
    TopCenter,
    TopRight,
    BottomCenter,
}

impl LogoPosition {
    pub fn all() -> &'static [LogoPosition] {
        &[LogoPosition::TopLeft, LogoPosition::TopCenter, LogoPosition::TopRight, LogoPosition::BottomCenter]
    }

    pub fn label(&self) -> &'static str {
        match self {
            LogoPosition::TopLeft => "Top Left",
            LogoPosition::TopCenter => "Top Center",
            LogoPosition::TopRight => "Top Right",
            LogoPosition::BottomCenter => "Bottom Center",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TitleSize {
    H1,
    #[default]
    H2,
    H3,
}

impl TitleSize {
    pub fn all() -> &'static [TitleSize] {
        &[TitleSize::H1, TitleSize::H2, TitleSize::H3]
    }

    pub fn label(&self) -> &'static str {
        match self {
            TitleSize::H1 => "H1 Ultra-Bold",
            TitleSize::H2 => "H2 Modern",
            TitleSize::H3 => "H3 Minimal",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MockupDevice {
    #[default]
    Smartphone,
    Laptop,
    Pc,
    Videotron,
}

impl MockupDevice {
    pub fn all() -> &'static [MockupDevice] {
        &[MockupDevice::Smartphone, MockupDevice::Laptop, MockupDevice::Pc, MockupDevice::Videotron]
    }

    pub fn label(&self) -> &'static str {
        match self {
            MockupDevice::Smartphone => "Smartphone",
            MockupDevice::Laptop => "Laptop",
            MockupDevice::Pc => "Desktop PC",
            MockupDevice::Videotron => "Videotron / Billboard",
        }
    }
}

/// Which brand rasters accompany a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BrandingAssets {
    IconAndText,
    IconOnly,
    TextOnly,
    /// Nothing supplied; the service invents a neutral placeholder mark.
    Placeholder,
}

/// Everything the poster form collects.
#[derive(Clone, Debug, Default)]
pub struct PosterConfig {
    pub title: String,
    pub tagline: String,
    pub marketing: String,
    pub mood: Mood,
    pub ratio: AspectRatio,
    pub logo_position: LogoPosition,
    pub title_size: TitleSize,
    pub mockup_device: MockupDevice,
    pub no_mockup: bool,
    pub background_only: bool,
    pub logo_icon: Option<Arc<RgbaImage>>,
    pub logo_text: Option<Arc<RgbaImage>>,
    pub mockup_screenshot: Option<Arc<RgbaImage>>,
}

impl PosterConfig {
    pub fn validate(&self) -> Result<(), StudioError> {
        if self.title.trim().is_empty() {
            return Err(StudioError::MissingHeadline);
        }
        Ok(())
    }

    pub fn branding(&self) -> BrandingAssets {
        match (self.logo_icon.is_some(), self.logo_text.is_some()) {
            (true, true) => BrandingAssets::IconAndText,
            (true, false) => BrandingAssets::IconOnly,
            (false, true) => BrandingAssets::TextOnly,
            (false, false) => BrandingAssets::Placeholder,
        }
    }

    /// Reference rasters in the order they are sent: icon, text logo, screenshot.
    pub fn reference_images(&self) -> Vec<Arc<RgbaImage>> {
        [&self.logo_icon, &self.logo_text, &self.mockup_screenshot]
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    }
}

/// One variation request within a batch.
#[derive(Clone, Debug)]
pub struct GenerationRequest {
    pub config: PosterConfig,
    /// 0-based index within the batch.
    pub variation: usize,
    /// Set when regenerating after the user flagged spelling mistakes.
    pub revision: bool,
}

#[derive(Clone, Debug)]
pub struct GeneratedResult {
    pub image: Arc<RgbaImage>,
    pub request: GenerationRequest,
}

#[derive(Clone, Debug)]
pub struct GeneratedBatch {
    pub results: Vec<GeneratedResult>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// Request all variations in parallel. The batch succeeds only if every
/// variation succeeds; the first failure is returned otherwise.
pub fn generate_batch<C: Collaborator + ?Sized>(
    collaborator: &C,
    config: &PosterConfig,
    revision: bool,
) -> Result<GeneratedBatch, StudioError> {
    config.validate()?;
    let results = (0..BATCH_SIZE)
        .into_par_iter()
        .map(|variation| -> Result<GeneratedResult, StudioError> {
            let request = GenerationRequest { config: config.clone(), variation, revision };
            let image = collaborator.generate(&request)?;
            Ok(GeneratedResult { image: Arc::new(image), request })
        })
        .collect::<Result<Vec<_>, StudioError>>()?;
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    Ok(GeneratedBatch { results, timestamp })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::ai::{CollaboratorError, EditRequest};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Painter {
        calls: AtomicUsize,
        fail_variation: Option<usize>,
    }

    impl Collaborator for Painter {
        fn edit(&self, request: &EditRequest) -> Result<RgbaImage, CollaboratorError> {
            Ok(request.image.clone())
        }

        fn generate(&self, request: &GenerationRequest) -> Result<RgbaImage, CollaboratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if Some(request.variation) == self.fail_variation {
                return Err(CollaboratorError::Request("model overloaded".into()));
            }
            let v = request.variation as u8;
            Ok(RgbaImage::from_pixel(9, 16, image::Rgba([v, v, v, 255])))
        }
    }

    fn config() -> PosterConfig {
        PosterConfig { title: "Galaxy X".into(), ..Default::default() }
    }

    #[test]
    fn defaults_follow_the_form() {
        let c = PosterConfig::default();
        assert_eq!(c.mood, Mood::Modern);
        assert_eq!(c.ratio.as_str(), "9:16");
        assert_eq!(c.logo_position, LogoPosition::TopCenter);
        assert_eq!(c.title_size, TitleSize::H2);
        assert_eq!(c.mockup_device, MockupDevice::Smartphone);
        assert_eq!(c.branding(), BrandingAssets::Placeholder);
    }

    #[test]
    fn empty_headline_is_rejected_before_any_request() {
        let painter = Painter { calls: AtomicUsize::new(0), fail_variation: None };
        let cfg = PosterConfig { title: "   ".into(), ..Default::default() };
        let err = generate_batch(&painter, &cfg, false).unwrap_err();
        assert_eq!(err.to_string(), "Please provide a product headline.");
        assert_eq!(painter.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn batch_has_three_ordered_variations() {
        let painter = Painter { calls: AtomicUsize::new(0), fail_variation: None };
        let batch = generate_batch(&painter, &config(), true).unwrap();
        assert_eq!(batch.results.len(), BATCH_SIZE);
        for (i, r) in batch.results.iter().enumerate() {
            assert_eq!(r.request.variation, i);
            assert!(r.request.revision);
            assert_eq!(r.image.get_pixel(0, 0).0[0], i as u8);
        }
    }

    #[test]
    fn one_failure_fails_the_batch() {
        let painter = Painter { calls: AtomicUsize::new(0), fail_variation: Some(1) };
        let err = generate_batch(&painter, &config(), false).unwrap_err();
        assert_eq!(err.to_string(), "model overloaded");
    }

    #[test]
    fn references_keep_their_order() {
        let icon = Arc::new(RgbaImage::new(1, 1));
        let shot = Arc::new(RgbaImage::new(2, 2));
        let cfg = PosterConfig { logo_icon: Some(icon.clone()), mockup_screenshot: Some(shot.clone()), ..config() };
        let refs = cfg.reference_images();
        assert_eq!(refs.len(), 2);
        assert!(Arc::ptr_eq(&refs[0], &icon));
        assert!(Arc::ptr_eq(&refs[1], &shot));
        assert_eq!(cfg.branding(), BrandingAssets::IconOnly);
        assert_eq!(AspectRatio::parse("16:9"), Some(AspectRatio::Wide16x9));
    }
}
