use kornia_image::{Image, allocator::CpuAllocator};
use kornia_vlm::paligemma::{Paligemma, PaligemmaConfig, PaligemmaError};

/// An 8-bit, three channel RGB image held in CPU memory.
pub type RgbImage = Image<u8, 3, CpuAllocator>;

/// Trait for image-to-text models that can be driven by the [`crate::CaptionEngine`].
///
/// The model is moved onto the engine's inference thread, so `caption` may
/// take `&mut self` and block for as long as it needs.
pub trait CaptionModel {
    /// The error type that can be returned during inference.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Produces a natural-language description of `image`.
    fn caption(&mut self, image: &RgbImage) -> Result<String, Self::Error>;
}

// defaults for the paligemma captioner
pub const DEFAULT_PROMPT: &str = "caption en";
pub const DEFAULT_SAMPLE_LEN: usize = 50;

/// Captioning model backed by Google Paligemma.
pub struct PaligemmaCaptioner {
    model: Paligemma,
    prompt: String,
    sample_len: usize,
}

impl PaligemmaCaptioner {
    /// Loads the Paligemma weights with the default configuration.
    pub fn new(prompt: impl Into<String>, sample_len: usize) -> Result<Self, PaligemmaError> {
        let model = Paligemma::new(PaligemmaConfig::default())?;
        Ok(Self {
            model,
            prompt: prompt.into(),
            sample_len,
        })
    }
}

impl CaptionModel for PaligemmaCaptioner {
    type Error = PaligemmaError;

    fn caption(&mut self, image: &RgbImage) -> Result<String, Self::Error> {
        let text = self
            .model
            .inference(image, &self.prompt, self.sample_len, false)?;
        Ok(text.trim().to_string())
    }
}
