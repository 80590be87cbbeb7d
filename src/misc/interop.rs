// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Interoperability conversions between frames, the image crate and matrices.

use image::{DynamicImage, GrayImage, RgbImage};
use nalgebra::DMatrix;
use std::path::Path;

use crate::core::types::{Frame, FrameMode, PixelDepth};
use crate::error::{Error, Result};

/// Convert a `GrayImage` into an 8 bits grayscale frame.
pub fn frame_from_gray_image(img: GrayImage) -> Result<Frame> {
    let (width, height) = img.dimensions();
    Frame::from_gray(width as usize, height as usize, img.into_raw())
}

/// Convert an `RgbImage` into an 8 bits RGB frame.
pub fn frame_from_rgb_image(img: RgbImage) -> Result<Frame> {
    let (width, height) = img.dimensions();
    Frame::from_data(
        width as usize,
        height as usize,
        FrameMode::Rgb,
        PixelDepth::U8,
        img.into_raw(),
    )
}

/// Load an image file as a grayscale frame.
pub fn read_gray_frame<P: AsRef<Path>>(file_path: P) -> Result<Frame> {
    frame_from_gray_image(image::open(file_path)?.to_luma8())
}

/// Convert an 8 bits frame into a `DynamicImage`.
fn dynamic_image(frame: &Frame) -> Result<DynamicImage> {
    let (w, h) = (frame.width() as u32, frame.height() as u32);
    let data = frame.data().to_vec();
    let not_enough = || Error::MalformedFrame("buffer not large enough".to_string());
    match (frame.mode(), frame.depth()) {
        (FrameMode::Grayscale, PixelDepth::U8) => Ok(DynamicImage::ImageLuma8(
            GrayImage::from_raw(w, h, data).ok_or_else(not_enough)?,
        )),
        (FrameMode::Rgb, PixelDepth::U8) => Ok(DynamicImage::ImageRgb8(
            RgbImage::from_raw(w, h, data).ok_or_else(not_enough)?,
        )),
        (FrameMode::Bgr, PixelDepth::U8) => {
            let swapped = data.chunks(3).flat_map(|p| vec![p[2], p[1], p[0]]).collect();
            Ok(DynamicImage::ImageRgb8(
                RgbImage::from_raw(w, h, swapped).ok_or_else(not_enough)?,
            ))
        }
        (FrameMode::Rgba, PixelDepth::U8) => Ok(DynamicImage::ImageRgba8(
            image::RgbaImage::from_raw(w, h, data).ok_or_else(not_enough)?,
        )),
        (mode, depth) => Err(Error::MalformedFrame(format!(
            "no image conversion for {:?} {:?}",
            mode, depth
        ))),
    }
}

/// Convert an 8 bits frame of any color mode into a `GrayImage`.
pub fn gray_image_from_frame(frame: &Frame) -> Result<GrayImage> {
    Ok(dynamic_image(frame)?.to_luma8())
}

/// Convert an 8 bits frame into an `u8` matrix of intensities
/// (rows are image lines).
pub fn matrix_from_frame(frame: &Frame) -> Result<DMatrix<u8>> {
    let img = gray_image_from_frame(frame)?;
    let (width, height) = img.dimensions();
    Ok(DMatrix::from_row_slice(
        height as usize,
        width as usize,
        &img.into_raw(),
    ))
}

/// Convert an `u8` matrix into an 8 bits grayscale frame.
/// Inverse operation of `matrix_from_frame`.
///
/// Performs a transposition to accomodate for the
/// column major matrix into the row major frame.
pub fn frame_from_matrix(mat: &DMatrix<u8>) -> Result<Frame> {
    let (nb_rows, nb_cols) = mat.shape();
    let data = mat.transpose().as_slice().to_vec();
    Frame::from_gray(nb_cols, nb_rows, data)
}

// TESTS #############################################################
