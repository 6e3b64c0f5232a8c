use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::GenericImageView;
use image::imageops::{self, FilterType};
use ndarray::Array4;
use std::borrow::Cow;

pub const INPUT_SIZE: u32 = 224;
pub const INPUT_CHANNELS: usize = 3;
pub const INPUT_SHAPE: [usize; 4] = [1, INPUT_SIZE as usize, INPUT_SIZE as usize, INPUT_CHANNELS];

/// Batch of one RGB image, NHWC, values in [0, 1].
pub type NormalizedTensor = Array4<f32>;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Invalid base64 image data: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("Image payload of {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: usize, limit: usize },
    #[error("Unreadable image: {0}")]
    UnreadableImage(#[from] image::ImageError),
    #[error("Image has zero width or height")]
    EmptyImage,
}

#[derive(Debug, Clone)]
pub struct ImageDecoder {
    max_image_bytes: usize,
}

impl ImageDecoder {
    pub fn new(max_image_bytes: usize) -> Self {
        Self { max_image_bytes }
    }

    pub fn max_image_bytes(&self) -> usize {
        self.max_image_bytes
    }

    pub fn decode(&self, payload: &str) -> Result<NormalizedTensor, DecodeError> {
        let bytes = self.decode_payload(payload)?;
        to_tensor(&bytes)
    }

    fn decode_payload(&self, payload: &str) -> Result<Vec<u8>, DecodeError> {
        let encoded = strip_data_url(payload);
        let cleaned: Cow<'_, str> = if encoded.bytes().any(|b| b.is_ascii_whitespace()) {
            Cow::Owned(encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect())
        } else {
            Cow::Borrowed(encoded)
        };

        // the estimate overshoots by at most two padding bytes
        let estimate = base64::decoded_len_estimate(cleaned.len());
        if estimate.saturating_sub(2) > self.max_image_bytes {
            return Err(DecodeError::TooLarge {
                size: estimate,
                limit: self.max_image_bytes,
            });
        }

        let bytes = STANDARD.decode(cleaned.as_bytes())?;
        if bytes.len() > self.max_image_bytes {
            return Err(DecodeError::TooLarge {
                size: bytes.len(),
                limit: self.max_image_bytes,
            });
        }
        Ok(bytes)
    }
}

/// Everything up to and including the first comma is a data-URL header.
pub fn strip_data_url(payload: &str) -> &str {
    match payload.find(',') {
        Some(idx) => &payload[idx + 1..],
        None => payload,
    }
}

fn to_tensor(bytes: &[u8]) -> Result<NormalizedTensor, DecodeError> {
    let image = image::load_from_memory(bytes)?;
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(DecodeError::EmptyImage);
    }

    let rgb = image.to_rgb8();
    let resized = imageops::resize(&rgb, INPUT_SIZE, INPUT_SIZE, FilterType::CatmullRom);

    let tensor = Array4::from_shape_fn(INPUT_SHAPE, |(_, y, x, c)| {
        resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
    });
    Ok(tensor)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Rgb, Rgba};
    use std::io::Cursor;

    pub(crate) fn png_base64(width: u32, height: u32, color: [u8; 3]) -> String {
        let img = ImageBuffer::from_pixel(width, height, Rgb(color));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        STANDARD.encode(buf.into_inner())
    }

    fn gradient_png_base64() -> String {
        let img = ImageBuffer::from_fn(97, 61, |x, y| Rgba([(x * 2) as u8, (y * 4) as u8, 128, 200]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        STANDARD.encode(buf.into_inner())
    }

    fn decoder() -> ImageDecoder {
        ImageDecoder::new(1024 * 1024)
    }

    #[test]
    fn white_image_normalizes_to_ones() {
        let tensor = decoder().decode(&png_base64(224, 224, [255, 255, 255])).unwrap();
        assert_eq!(tensor.shape(), &INPUT_SHAPE);
        assert!(tensor.iter().all(|v| (*v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn resizes_and_keeps_rgb_channel_order() {
        let tensor = decoder().decode(&png_base64(40, 30, [255, 0, 51])).unwrap();
        assert_eq!(tensor.shape(), &INPUT_SHAPE);
        assert!((tensor[[0, 100, 100, 0]] - 1.0).abs() < 1e-6);
        assert!(tensor[[0, 100, 100, 1]].abs() < 1e-6);
        assert!((tensor[[0, 100, 100, 2]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn data_url_prefix_is_stripped() {
        let raw = png_base64(8, 8, [10, 20, 30]);
        let with_prefix = format!("data:image/png;base64,{}", raw);
        assert_eq!(
            decoder().decode(&raw).unwrap(),
            decoder().decode(&with_prefix).unwrap()
        );
    }

    #[test]
    fn decoding_is_bit_identical_across_runs() {
        let payload = gradient_png_base64();
        let first = decoder().decode(&payload).unwrap();
        let second = decoder().decode(&payload).unwrap();
        let first_bits: Vec<u32> = first.iter().map(|v| v.to_bits()).collect();
        let second_bits: Vec<u32> = second.iter().map(|v| v.to_bits()).collect();
        assert_eq!(first_bits, second_bits);
        assert!(first.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn malformed_base64_is_rejected() {
        assert!(matches!(
            decoder().decode("not*base64!"),
            Err(DecodeError::InvalidBase64(_))
        ));
    }

    #[test]
    fn non_image_bytes_are_rejected() {
        let payload = STANDARD.encode(b"definitely not a png");
        assert!(matches!(
            decoder().decode(&payload),
            Err(DecodeError::UnreadableImage(_))
        ));
    }

    #[test]
    fn oversized_payload_is_rejected_before_decoding() {
        let small = ImageDecoder::new(16);
        // not valid base64, so only a length check can produce TooLarge
        let payload = format!("{}!", "A".repeat(400));
        assert!(matches!(
            small.decode(&payload),
            Err(DecodeError::TooLarge { limit: 16, .. })
        ));
    }

    #[test]
    fn payload_at_the_limit_is_not_rejected_by_estimate() {
        // 16 bytes encode to 24 chars with two padding bytes; estimate is 18
        let decoder = ImageDecoder::new(16);
        let payload = STANDARD.encode([0u8; 16]);
        assert!(matches!(
            decoder.decode(&payload),
            Err(DecodeError::UnreadableImage(_))
        ));
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let small = ImageDecoder::new(16);
        assert!(matches!(
            small.decode(&png_base64(32, 32, [0, 0, 0])),
            Err(DecodeError::TooLarge { limit: 16, .. })
        ));
    }
}
