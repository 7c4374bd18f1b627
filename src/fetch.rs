use crate::{error::CaptionError, model::RgbImage};
use kornia_image::{Image, ImageSize, allocator::CpuAllocator};
use reqwest::Url;
use std::time::Duration;

// defaults for outbound image requests
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Downloads remote images over HTTP(S).
///
/// Some image hosts refuse requests without a browser user agent, hence the
/// default above.
#[derive(Clone, Debug)]
pub struct ImageFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl ImageFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
        })
    }

    /// Sets the largest response body, in bytes, the fetcher will download.
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Fetches the body at `url`. Network failures, non-success statuses and
    /// bodies larger than the configured limit are all reported as
    /// [`CaptionError::Fetch`].
    pub async fn fetch(&self, url: Url) -> Result<Vec<u8>, CaptionError> {
        let mut response = self.client.get(url).send().await?.error_for_status()?;

        if let Some(len) = response.content_length() {
            if len > self.max_bytes as u64 {
                return Err(self.too_large());
            }
        }

        // the declared length may be absent or wrong, so count while reading
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(self.too_large());
            }
            body.extend_from_slice(&chunk);
        }

        log::debug!("Fetched {} bytes", body.len());
        Ok(body)
    }

    fn too_large(&self) -> CaptionError {
        CaptionError::Fetch(format!("image exceeds the {} byte limit", self.max_bytes))
    }
}

/// Decodes an encoded image (JPEG, PNG, GIF, WebP or BMP) into RGB8.
pub fn decode_rgb8(bytes: &[u8]) -> Result<RgbImage, CaptionError> {
    let rgb = image::load_from_memory(bytes)?.into_rgb8();
    let (width, height) = rgb.dimensions();

    Image::new(
        ImageSize {
            width: width as usize,
            height: height as usize,
        },
        rgb.into_raw(),
        CpuAllocator,
    )
    .map_err(|e| CaptionError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode(format: image::ImageFormat) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(3, 2, image::Rgb([200, 10, 10]));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        buf
    }

    #[test]
    fn decodes_png() {
        let decoded = decode_rgb8(&encode(image::ImageFormat::Png)).unwrap();
        assert_eq!(decoded.width(), 3);
        assert_eq!(decoded.height(), 2);
        assert_eq!(&decoded.as_slice()[..3], &[200, 10, 10]);
    }

    #[test]
    fn decodes_jpeg() {
        let decoded = decode_rgb8(&encode(image::ImageFormat::Jpeg)).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (3, 2));
    }

    #[test]
    fn rejects_garbage() {
        let err = decode_rgb8(b"<html>definitely not an image</html>").unwrap_err();
        assert!(matches!(err, CaptionError::Decode(_)));
    }

    #[test]
    fn rejects_truncated_png() {
        let mut bytes = encode(image::ImageFormat::Png);
        bytes.truncate(20);
        assert!(decode_rgb8(&bytes).is_err());
    }
}
