#![allow(dead_code)]

use std::io::Cursor;

use exif::{Field, In, Tag, Value, experimental::Writer};
use image::{Rgb, RgbImage};
use image_authenticity::image_utils::{encode_jpeg, encode_png};

pub const CAPTURED_AT: &str = "2024:03:09 14:22:05";

pub fn flat_image(size: u32, value: u8) -> RgbImage {
    RgbImage::from_pixel(size, size, Rgb([value, value, value]))
}

pub fn flat_jpeg(size: u32, value: u8) -> Vec<u8> {
    encode_jpeg(&flat_image(size, value), 95).unwrap()
}

/// Grayscale LCG noise with the 64×64 patch at (16, 16) pasted at (160, 160).
pub fn cloned_noise_png() -> Vec<u8> {
    let mut state = 7u32;
    let mut image = RgbImage::from_fn(256, 256, |_, _| {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        let v = (state >> 24) as u8;
        Rgb([v, v, v])
    });

    for y in 0..64 {
        for x in 0..64 {
            let p = *image.get_pixel(16 + x, 16 + y);
            image.put_pixel(160 + x, 160 + y, p);
        }
    }

    encode_png(&image).unwrap()
}

pub fn ascii(tag: Tag, text: &str) -> Field {
    Field {
        tag,
        ifd_num: In::PRIMARY,
        value: Value::Ascii(vec![text.as_bytes().to_vec()]),
    }
}

pub fn long(tag: Tag, value: u32) -> Field {
    Field {
        tag,
        ifd_num: In::PRIMARY,
        value: Value::Long(vec![value]),
    }
}

/// Tags a straight-out-of-camera JPEG would carry.
pub fn camera_fields(width: u32, height: u32) -> Vec<Field> {
    vec![
        ascii(Tag::Make, "Canon"),
        ascii(Tag::Model, "EOS R6"),
        ascii(Tag::DateTime, CAPTURED_AT),
        ascii(Tag::DateTimeOriginal, CAPTURED_AT),
        ascii(Tag::DateTimeDigitized, CAPTURED_AT),
        long(Tag::PixelXDimension, width),
        long(Tag::PixelYDimension, height),
    ]
}

/// Splices an APP1 Exif segment right after the SOI marker.
pub fn with_exif(jpeg: &[u8], fields: &[Field]) -> Vec<u8> {
    let mut writer = Writer::new();
    for field in fields {
        writer.push_field(field);
    }
    let mut tiff = Cursor::new(Vec::new());
    writer.write(&mut tiff, false).unwrap();
    let tiff = tiff.into_inner();

    let length = u16::try_from(2 + 6 + tiff.len()).unwrap();

    let mut out = Vec::with_capacity(jpeg.len() + tiff.len() + 10);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&length.to_be_bytes());
    out.extend_from_slice(b"Exif\0\0");
    out.extend_from_slice(&tiff);
    out.extend_from_slice(&jpeg[2..]);
    out
}

pub fn camera_jpeg(size: u32, value: u8) -> Vec<u8> {
    with_exif(&flat_jpeg(size, value), &camera_fields(size, size))
}

fn lcg(state: &mut u32) -> u32 {
    *state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
    *state >> 24
}

/// Smooth colour ramp with ±4 grain per channel, the texture of an
/// untouched photo of an evenly lit surface.
pub fn noisy_gradient(width: u32, height: u32) -> RgbImage {
    let mut state = 11u32;
    RgbImage::from_fn(width, height, |x, y| {
        let base = [
            40 + x * 160 / width,
            60 + y * 120 / height,
            90 + (x + y) * 80 / (width + height),
        ];
        Rgb(base.map(|v| (v as i32 + (lcg(&mut state) % 9) as i32 - 4) as u8))
    })
}

/// `noisy_gradient` saved at quality 92 with camera EXIF.
pub fn camera_gradient_jpeg(width: u32, height: u32) -> Vec<u8> {
    let jpeg = encode_jpeg(&noisy_gradient(width, height), 92).unwrap();
    with_exif(&jpeg, &camera_fields(width, height))
}
