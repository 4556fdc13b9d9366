//! Texture descriptors and image loading

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread;

use image::DynamicImage;
use thiserror::Error;

use crate::backend::types::*;

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a [`TextureDescriptor`], used as the texture cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(u64);

impl TextureId {
    fn next() -> Self {
        Self(NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

#[derive(Error, Debug)]
pub enum TextureError {
    #[error("Failed to load image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("Texture has zero size")]
    ZeroSize,
    #[error("Pixel data is {actual} bytes, expected {expected}")]
    DataSizeMismatch { expected: usize, actual: usize },
    #[error("Texture loader for {0} stopped before producing a result")]
    LoaderDisconnected(PathBuf),
}

/// Where the pixels of a texture come from.
#[derive(Debug, Clone)]
pub enum TextureSource {
    /// Tightly packed rows, bottom row first.
    RawBuffer2D {
        width: u32,
        height: u32,
        data: Vec<u8>,
    },
    /// Decoded image, uploaded as RGBA8.
    DecodedImage2D(DynamicImage),
    /// Six square faces in +X, -X, +Y, -Y, +Z, -Z order.
    Cube { size: u32, faces: [Vec<u8>; 6] },
}

/// Sampling state applied once at upload time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerParams {
    pub wrap_s: AddressMode,
    pub wrap_t: AddressMode,
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    /// Generate a mip chain and sample it with `min_filter`.
    pub mipmaps: bool,
}

impl Default for SamplerParams {
    fn default() -> Self {
        Self {
            wrap_s: AddressMode::ClampToEdge,
            wrap_t: AddressMode::ClampToEdge,
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            mipmaps: false,
        }
    }
}

/// A single image ready for `tex_image_2d`.
pub struct TextureImageData<'a> {
    pub target: TexImageTarget,
    pub width: u32,
    pub height: u32,
    pub pixels: Cow<'a, [u8]>,
}

/// Pixel source plus format and sampling parameters.
#[derive(Debug)]
pub struct TextureDescriptor {
    id: TextureId,
    label: Option<String>,
    source: TextureSource,
    format: PixelFormat,
    internal_format: InternalFormat,
    pixel_type: PixelType,
    pub sampler: SamplerParams,
    /// Flip decoded images vertically on upload. Image files store the top
    /// row first while texture coordinates start at the bottom.
    pub flip_y: bool,
}

impl TextureDescriptor {
    /// Create a 2D texture from raw pixels.
    pub fn raw_2d(
        width: u32,
        height: u32,
        data: Vec<u8>,
        format: PixelFormat,
        internal_format: InternalFormat,
        pixel_type: PixelType,
    ) -> Result<Self, TextureError> {
        check_image_size(width, height, data.len(), format, pixel_type)?;
        Ok(Self::with_source(
            TextureSource::RawBuffer2D {
                width,
                height,
                data,
            },
            format,
            internal_format,
            pixel_type,
        ))
    }

    /// Create a 2D texture from a decoded image.
    pub fn from_image(image: DynamicImage) -> Result<Self, TextureError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(TextureError::ZeroSize);
        }
        let mut texture = Self::with_source(
            TextureSource::DecodedImage2D(image),
            PixelFormat::Rgba,
            InternalFormat::Rgba8,
            PixelType::UnsignedByte,
        );
        texture.flip_y = true;
        Ok(texture)
    }

    /// Create a cube map from six square faces.
    pub fn cube(
        size: u32,
        faces: [Vec<u8>; 6],
        format: PixelFormat,
        internal_format: InternalFormat,
        pixel_type: PixelType,
    ) -> Result<Self, TextureError> {
        for face in &faces {
            check_image_size(size, size, face.len(), format, pixel_type)?;
        }
        Ok(Self::with_source(
            TextureSource::Cube { size, faces },
            format,
            internal_format,
            pixel_type,
        ))
    }

    /// Create a 1x1 RGBA texture
    pub fn solid_color(color: [u8; 4]) -> Self {
        Self::with_source(
            TextureSource::RawBuffer2D {
                width: 1,
                height: 1,
                data: color.to_vec(),
            },
            PixelFormat::Rgba,
            InternalFormat::Rgba8,
            PixelType::UnsignedByte,
        )
    }

    pub fn white() -> Self {
        Self::solid_color([255, 255, 255, 255])
    }

    /// Flat tangent-space normal map
    pub fn default_normal() -> Self {
        Self::solid_color([128, 128, 255, 255])
    }

    fn with_source(
        source: TextureSource,
        format: PixelFormat,
        internal_format: InternalFormat,
        pixel_type: PixelType,
    ) -> Self {
        Self {
            id: TextureId::next(),
            label: None,
            source,
            format,
            internal_format,
            pixel_type,
            sampler: SamplerParams::default(),
            flip_y: false,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_sampler(mut self, sampler: SamplerParams) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn source(&self) -> &TextureSource {
        &self.source
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn internal_format(&self) -> InternalFormat {
        self.internal_format
    }

    pub fn pixel_type(&self) -> PixelType {
        self.pixel_type
    }

    pub fn target(&self) -> TextureTarget {
        match self.source {
            TextureSource::RawBuffer2D { .. } | TextureSource::DecodedImage2D(_) => {
                TextureTarget::Texture2D
            }
            TextureSource::Cube { .. } => TextureTarget::CubeMap,
        }
    }

    pub fn width(&self) -> u32 {
        match &self.source {
            TextureSource::RawBuffer2D { width, .. } => *width,
            TextureSource::DecodedImage2D(image) => image.width(),
            TextureSource::Cube { size, .. } => *size,
        }
    }

    pub fn height(&self) -> u32 {
        match &self.source {
            TextureSource::RawBuffer2D { height, .. } => *height,
            TextureSource::DecodedImage2D(image) => image.height(),
            TextureSource::Cube { size, .. } => *size,
        }
    }

    /// Images to upload, one per 2D target or cube face.
    pub fn images(&self) -> Vec<TextureImageData<'_>> {
        match &self.source {
            TextureSource::RawBuffer2D {
                width,
                height,
                data,
            } => vec![TextureImageData {
                target: TexImageTarget::Texture2D,
                width: *width,
                height: *height,
                pixels: Cow::Borrowed(data.as_slice()),
            }],
            TextureSource::DecodedImage2D(image) => {
                let mut rgba = image.to_rgba8();
                if self.flip_y {
                    image::imageops::flip_vertical_in_place(&mut rgba);
                }
                vec![TextureImageData {
                    target: TexImageTarget::Texture2D,
                    width: rgba.width(),
                    height: rgba.height(),
                    pixels: Cow::Owned(rgba.into_raw()),
                }]
            }
            TextureSource::Cube { size, faces } => CubeFace::ALL
                .iter()
                .zip(faces.iter())
                .map(|(face, data)| TextureImageData {
                    target: TexImageTarget::CubeFace(*face),
                    width: *size,
                    height: *size,
                    pixels: Cow::Borrowed(data.as_slice()),
                })
                .collect(),
        }
    }
}

fn check_image_size(
    width: u32,
    height: u32,
    actual: usize,
    format: PixelFormat,
    pixel_type: PixelType,
) -> Result<(), TextureError> {
    if width == 0 || height == 0 {
        return Err(TextureError::ZeroSize);
    }
    let expected = width as usize * height as usize * format.components() * pixel_type.size();
    if expected != actual {
        return Err(TextureError::DataSizeMismatch { expected, actual });
    }
    Ok(())
}

/// Load and decode an image file into a 2D texture.
pub fn load_texture_2d(path: impl AsRef<Path>) -> Result<TextureDescriptor, TextureError> {
    let path = path.as_ref();
    let image = image::open(path).map_err(|source| TextureError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();
    Ok(TextureDescriptor::from_image(image)?.with_label(name))
}

/// Decodes image files off the frame thread.
pub struct TextureLoader;

impl TextureLoader {
    /// Start decoding `path` on a worker thread.
    pub fn spawn(path: impl Into<PathBuf>) -> PendingTexture {
        let path = path.into();
        let (tx, rx) = mpsc::channel();
        let worker_path = path.clone();
        thread::spawn(move || {
            // The receiver may already be gone; the result is then discarded.
            let _ = tx.send(load_texture_2d(&worker_path));
        });
        PendingTexture {
            path,
            receiver: Some(rx),
        }
    }
}

/// Handle to an in-flight texture decode.
///
/// Dropping it does not cancel the decode; the worker finishes and its
/// result is thrown away.
pub struct PendingTexture {
    path: PathBuf,
    receiver: Option<mpsc::Receiver<Result<TextureDescriptor, TextureError>>>,
}

impl PendingTexture {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Non-blocking check. Yields the result exactly once, `None` before
    /// the decode finishes and after the result has been taken.
    pub fn poll(&mut self) -> Option<Result<TextureDescriptor, TextureError>> {
        let receiver = self.receiver.as_ref()?;
        let result = match receiver.try_recv() {
            Ok(result) => result,
            Err(mpsc::TryRecvError::Empty) => return None,
            Err(mpsc::TryRecvError::Disconnected) => {
                Err(TextureError::LoaderDisconnected(self.path.clone()))
            }
        };
        self.receiver = None;
        Some(result)
    }

    pub fn is_finished(&self) -> bool {
        self.receiver.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_raw_size_is_checked() {
        let err = TextureDescriptor::raw_2d(
            2,
            2,
            vec![0; 15],
            PixelFormat::Rgba,
            InternalFormat::Rgba8,
            PixelType::UnsignedByte,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TextureError::DataSizeMismatch {
                expected: 16,
                actual: 15
            }
        ));
    }

    #[test]
    fn test_float_texture_size() {
        let texture = TextureDescriptor::raw_2d(
            2,
            1,
            vec![0; 2 * 3 * 4],
            PixelFormat::Rgb,
            InternalFormat::Rgb32F,
            PixelType::Float,
        )
        .unwrap();
        assert_eq!(texture.target(), TextureTarget::Texture2D);
        assert_eq!(texture.images().len(), 1);
    }

    #[test]
    fn test_cube_yields_six_faces() {
        let faces: [Vec<u8>; 6] = std::array::from_fn(|i| vec![i as u8; 4]);
        let texture = TextureDescriptor::cube(
            1,
            faces,
            PixelFormat::Rgba,
            InternalFormat::Rgba8,
            PixelType::UnsignedByte,
        )
        .unwrap();
        assert_eq!(texture.target(), TextureTarget::CubeMap);
        let images = texture.images();
        assert_eq!(images.len(), 6);
        assert_eq!(images[2].target, TexImageTarget::CubeFace(CubeFace::PositiveY));
        assert_eq!(images[5].pixels.as_ref(), &[5, 5, 5, 5]);
    }

    #[test]
    fn test_decoded_image_flips_rows() {
        let mut image = RgbaImage::new(1, 2);
        image.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        image.put_pixel(0, 1, Rgba([0, 0, 255, 255]));
        let mut texture = TextureDescriptor::from_image(DynamicImage::ImageRgba8(image)).unwrap();
        assert!(texture.flip_y);
        assert_eq!(&texture.images()[0].pixels[..4], &[0, 0, 255, 255]);

        texture.flip_y = false;
        assert_eq!(&texture.images()[0].pixels[..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let mut pending = TextureLoader::spawn("does/not/exist.png");
        let result = loop {
            if let Some(result) = pending.poll() {
                break result;
            }
            std::thread::yield_now();
        };
        assert!(matches!(result, Err(TextureError::Decode { .. })));
        assert!(pending.is_finished());
        assert!(pending.poll().is_none());
    }
}
