use image::codecs::png::PngEncoder;
use image::{ImageEncoder, RgbaImage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::StudioError;

/// Decode raw file bytes (upload, drag-drop, collaborator reply) into RGBA.
///
/// Bytes that do not look like any known image format are rejected as
/// [`StudioError::UnsupportedFormat`] before any decoding is attempted.
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage, StudioError> {
    sniff_format(bytes)?;
    let img = image::load_from_memory(bytes)?;
    let rgba = img.to_rgba8();
    if rgba.width() == 0 || rgba.height() == 0 {
        return Err(StudioError::Decode("image has no pixels".to_string()));
    }
    Ok(rgba)
}

/// Cheap header check, usable before handing bytes to a background decoder.
pub fn sniff_format(bytes: &[u8]) -> Result<image::ImageFormat, StudioError> {
    image::guess_format(bytes).map_err(|_| StudioError::UnsupportedFormat)
}

/// Read only the header to learn the pixel size.
pub fn probe_dimensions(bytes: &[u8]) -> Result<(u32, u32), StudioError> {
    sniff_format(bytes)?;
    let (w, h) = image::io::Reader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()?
        .into_dimensions()?;
    if w == 0 || h == 0 {
        return Err(StudioError::Decode("image has no pixels".to_string()));
    }
    Ok((w, h))
}

pub fn load_image_file(path: &Path) -> Result<RgbaImage, StudioError> {
    let bytes = std::fs::read(path)?;
    decode_image(&bytes)
}

/// Encode to PNG in memory.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, StudioError> {
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(image.as_raw(), image.width(), image.height(), image::ColorType::Rgba8)
        .map_err(|e| StudioError::Encode(e.to_string()))?;
    Ok(out)
}

pub fn write_png(image: &RgbaImage, path: &Path) -> Result<(), StudioError> {
    let bytes = encode_png(image)?;
    write_bytes(&bytes, path)
}

pub fn write_bytes(bytes: &[u8], path: &Path) -> Result<(), StudioError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(bytes)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn png_round_trip_preserves_pixels() {
        let mut img = RgbaImage::new(4, 3);
        img.put_pixel(1, 2, Rgba([10, 20, 30, 128]));
        let bytes = encode_png(&img).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
        assert_eq!(decode_image(&bytes).unwrap(), img);
    }

    #[test]
    fn text_file_is_unsupported() {
        assert!(matches!(decode_image(b"hello, world"), Err(StudioError::UnsupportedFormat)));
    }

    #[test]
    fn truncated_png_is_a_decode_error() {
        let bytes = encode_png(&RgbaImage::new(8, 8)).unwrap();
        let err = decode_image(&bytes[..20]).unwrap_err();
        assert!(matches!(err, StudioError::Decode(_) | StudioError::Io(_)), "{err:?}");
    }

    #[test]
    fn dimensions_come_from_header_alone() {
        let bytes = encode_png(&RgbaImage::new(30, 12)).unwrap();
        assert_eq!(probe_dimensions(&bytes).unwrap(), (30, 12));
        assert!(probe_dimensions(b"not an image").is_err());
    }

    #[test]
    fn write_png_creates_parent_dirs() {
        let dir = std::env::temp_dir().join(format!("postercraft-io-{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested").join("out.png");
        write_png(&RgbaImage::new(2, 2), &path).unwrap();
        assert!(path.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
