use std::io::Cursor;

use image::{
    DynamicImage, GrayImage, ImageFormat, ImageReader, Luma, RgbImage,
    codecs::jpeg::JpegEncoder, imageops::FilterType,
};

use crate::error::Result;

pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    let image = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .decode()?;
    Ok(image)
}

/// Reads the pixel dimensions from the container header without decoding pixel data.
pub fn dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    let dims = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_dimensions()?;
    Ok(dims)
}

pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    image.write_with_encoder(encoder)?;
    Ok(buffer.into_inner())
}

pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

pub fn rgb_to_gray(image: &RgbImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut gray = GrayImage::new(width, height);

    for (x, y, pixel) in image.enumerate_pixels() {
        let lum =
            (0.299 * pixel[0] as f64 + 0.587 * pixel[1] as f64 + 0.114 * pixel[2] as f64) as u8;
        gray.put_pixel(x, y, Luma([lum]));
    }

    gray
}

/// Largest `(width, height)` with the same aspect ratio that fits inside a
/// `size×size` box. Smaller images are scaled up.
pub fn fit_inside(width: u32, height: u32, size: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width, height);
    }
    let scale = (size as f64 / width as f64).min(size as f64 / height as f64);
    let fit = |side: u32| ((side as f64 * scale).round() as u32).clamp(1, size);
    (fit(width), fit(height))
}

/// Grayscale working copy fitted inside `size×size`, aspect ratio kept.
/// Images that already fit exactly are passed through untouched.
pub fn gray_working_copy(image: &DynamicImage, size: u32) -> GrayImage {
    let gray = rgb_to_gray(&image.to_rgb8());
    let (width, height) = fit_inside(gray.width(), gray.height(), size);
    if gray.dimensions() == (width, height) {
        return gray;
    }
    image::imageops::resize(&gray, width, height, FilterType::Triangle)
}

pub fn extract_block(image: &GrayImage, x: u32, y: u32, size: u32) -> Vec<u8> {
    let mut block = Vec::with_capacity((size * size) as usize);

    for dy in 0..size {
        for dx in 0..size {
            if x + dx < image.width() && y + dy < image.height() {
                block.push(image.get_pixel(x + dx, y + dy)[0]);
            }
        }
    }

    block
}

pub fn block_mean(block: &[u8]) -> f64 {
    if block.is_empty() {
        return 0.0;
    }
    block.iter().map(|&v| v as f64).sum::<f64>() / block.len() as f64
}

pub fn block_variance(block: &[u8]) -> f64 {
    if block.is_empty() {
        return 0.0;
    }
    let mean = block_mean(block);
    block
        .iter()
        .map(|&v| {
            let diff = v as f64 - mean;
            diff * diff
        })
        .sum::<f64>()
        / block.len() as f64
}
