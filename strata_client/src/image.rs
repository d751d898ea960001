// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Single-shot image transport.
//!
//! An [`ImageClient`] publishes whatever its [`ImageContainer`] currently
//! shows. There are three backends, chosen by the image kind:
//!
//! | Image | Client | Payload |
//! |---|---|---|
//! | [`Image::Surface`] | texture | one shared-memory buffer, pixels copied in |
//! | [`Image::Shared`] | shared | the GPU handle descriptor, no copy |
//! | [`Image::PlanarYCbCr`] | YCbCr | three shared-memory planes + picture rect |
//!
//! Buffers leave with the edit. The compositor returns the one it replaced
//! through [`EditReply::ReturnImage`](strata_core::protocol::EditReply), and
//! [`ImageClient::set_buffer`] rebinds it so the next frame paints into it.

use strata_core::descriptor::{
    CompositableKind, ContentType, Plane, SharedImage, SharedTextureDescriptor, SurfaceDescriptor,
    TextureIdentifier, TextureKind, YuvImage,
};
use strata_core::geometry::{IntPoint, IntRect, IntSize, dim};
use strata_core::layer::LayerId;
use strata_core::protocol::Edit;
use strata_surface::image::{ImageSurface, SurfaceMut};

use crate::error::ClientError;
use crate::forwarder::LayerForwarder;
use crate::texture_client::TextureClient;

// ---------------------------------------------------------------------------
// Images and their source
// ---------------------------------------------------------------------------

/// Caller-provided planar YCbCr frame. Rows may be padded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlanarYCbCrData {
    /// Luma samples.
    pub y: Vec<u8>,
    /// Luma row pitch in bytes.
    pub y_stride: usize,
    /// Luma plane size.
    pub y_size: IntSize,
    /// Blue-difference samples.
    pub cb: Vec<u8>,
    /// Red-difference samples.
    pub cr: Vec<u8>,
    /// Chroma row pitch in bytes.
    pub cbcr_stride: usize,
    /// Chroma plane size.
    pub cbcr_size: IntSize,
    /// Visible window within the luma plane.
    pub picture: IntRect,
}

impl PlanarYCbCrData {
    /// Samples, row pitch and size of `plane`.
    #[must_use]
    pub fn plane(&self, plane: Plane) -> (&[u8], usize, IntSize) {
        match plane {
            Plane::Y => (&self.y, self.y_stride, self.y_size),
            Plane::Cb => (&self.cb, self.cbcr_stride, self.cbcr_size),
            Plane::Cr => (&self.cr, self.cbcr_stride, self.cbcr_size),
        }
    }

    fn fits(&self, plane: Plane) -> bool {
        let (data, stride, size) = self.plane(plane);
        let row = dim(size.width);
        let rows = dim(size.height);
        stride >= row && (rows == 0 || data.len() >= stride * (rows - 1) + row)
    }
}

/// An image as produced by a decoder, canvas or video source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Image {
    /// CPU pixels.
    Surface(ImageSurface),
    /// Pixels already in a GPU-shareable handle.
    Shared(SharedTextureDescriptor),
    /// A planar YCbCr frame.
    PlanarYCbCr(PlanarYCbCrData),
}

impl Image {
    /// Display size.
    #[must_use]
    pub fn size(&self) -> IntSize {
        match self {
            Self::Surface(s) => s.size(),
            Self::Shared(d) => d.size,
            Self::PlanarYCbCr(d) => d.picture.size(),
        }
    }

    /// The compositable kind that can display this image.
    #[must_use]
    pub fn compositable(&self) -> CompositableKind {
        match self {
            Self::Surface(_) => CompositableKind::ImageTexture,
            Self::Shared(_) => CompositableKind::ImageShared,
            Self::PlanarYCbCr(_) => CompositableKind::ImageYuv,
        }
    }
}

/// Pull interface to an image producer.
pub trait ImageContainer {
    /// The current image and a serial that changes whenever it does.
    fn current_image(&self) -> Option<(&Image, u64)>;
}

/// Outcome of [`ImageClient::update_image`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageUpdate {
    /// An edit was queued.
    Updated,
    /// The container still shows the image already sent.
    Unchanged,
    /// The container is empty.
    NoImage,
    /// The image needs a different client kind.
    WrongKind,
}

/// Content type for uploading `image`.
///
/// Starts from the image's own content type (color with alpha if it has
/// none) and drops alpha for an opaque layer unless the image is alpha-only.
#[must_use]
pub fn image_content_type(image: &Image, opaque: bool) -> ContentType {
    let own = match image {
        Image::Surface(s) => s.format().content_type(),
        Image::Shared(_) | Image::PlanarYCbCr(_) => ContentType::ColorAlpha,
    };
    layer_content_type(own, opaque)
}

pub(crate) fn layer_content_type(own: ContentType, opaque: bool) -> ContentType {
    if opaque && own != ContentType::Alpha {
        ContentType::Color
    } else {
        own
    }
}

// ---------------------------------------------------------------------------
// Backends
// ---------------------------------------------------------------------------

/// Publishes CPU pixels through one shared-memory buffer.
#[derive(Debug)]
pub(crate) struct TextureImageClient {
    texture: TextureClient,
    last_serial: Option<u64>,
}

impl TextureImageClient {
    pub(crate) fn new(forwarder: &LayerForwarder, layer: LayerId, kind: CompositableKind) -> Self {
        Self {
            texture: forwarder.create_texture_client_for(TextureKind::Shmem, kind, layer, 0),
            last_serial: None,
        }
    }

    pub(crate) fn layer(&self) -> LayerId {
        self.texture.layer()
    }

    /// Fills a buffer of `size` through `paint` and queues it.
    pub(crate) fn publish(
        &mut self,
        forwarder: &mut LayerForwarder,
        size: IntSize,
        content_type: ContentType,
        paint: impl FnOnce(&mut SurfaceMut<'_>),
    ) -> Result<(), ClientError> {
        self.texture.ensure_allocated(size, content_type)?;
        {
            let lock = self.texture.lock()?;
            let mut pixels = lock.pixels()?;
            let mut surface = pixels.surface_mut();
            surface.fill_rect(surface.bounds(), [0; 4]);
            paint(&mut surface);
        }
        let desc = self.texture.take_descriptor().ok_or(ClientError::NoBuffer)?;
        forwarder.push(Edit::UpdateImage {
            layer: self.texture.layer(),
            identifier: self.texture.identifier(),
            image: SharedImage::Surface(desc),
        })
    }

    fn update(
        &mut self,
        forwarder: &mut LayerForwarder,
        image: &ImageSurface,
        serial: u64,
        opaque: bool,
    ) -> Result<ImageUpdate, ClientError> {
        if self.last_serial == Some(serial) {
            return Ok(ImageUpdate::Unchanged);
        }
        let content_type = layer_content_type(image.format().content_type(), opaque);
        self.publish(forwarder, image.size(), content_type, |dst| {
            dst.copy_from(&image.view(), IntRect::from_size(image.size()), IntPoint::ZERO);
        })?;
        self.last_serial = Some(serial);
        Ok(ImageUpdate::Updated)
    }

    /// Rebinds a returned buffer, or destroys it if one is already bound.
    pub(crate) fn set_buffer(&mut self, image: &SharedImage) {
        match image {
            SharedImage::Surface(desc @ SurfaceDescriptor::Shmem(_)) => {
                if self.texture.descriptor().is_none() {
                    self.texture.set_descriptor(Some(*desc));
                } else if let Err(e) = self.texture.pool().destroy_shared_surface(desc) {
                    log::warn!("{:?}: could not destroy returned {desc:?}: {e}", self.layer());
                }
            }
            other => log::warn!(
                "{:?}: ignoring returned {} image",
                self.layer(),
                other.variant_name()
            ),
        }
    }
}

/// Republishes a GPU handle with no pixel copy.
#[derive(Debug)]
struct SharedImageClient {
    layer: LayerId,
    identifier: TextureIdentifier,
    last_serial: Option<u64>,
}

impl SharedImageClient {
    fn update(
        &mut self,
        forwarder: &mut LayerForwarder,
        desc: &SharedTextureDescriptor,
        serial: u64,
    ) -> Result<ImageUpdate, ClientError> {
        if self.last_serial == Some(serial) {
            return Ok(ImageUpdate::Unchanged);
        }
        forwarder.push(Edit::UpdateImage {
            layer: self.layer,
            identifier: self.identifier,
            image: SharedImage::Surface(SurfaceDescriptor::SharedTexture(*desc)),
        })?;
        self.last_serial = Some(serial);
        Ok(ImageUpdate::Updated)
    }
}

/// Publishes three planes, each through its own texture client.
#[derive(Debug)]
struct YuvImageClient {
    planes: [TextureClient; 3],
    picture_rect: IntRect,
    last_serial: Option<u64>,
}

impl YuvImageClient {
    fn new(forwarder: &LayerForwarder, layer: LayerId) -> Self {
        let plane = |p: Plane| {
            forwarder.create_texture_client_for(
                TextureKind::Shmem,
                CompositableKind::ImageYuv,
                layer,
                p.index(),
            )
        };
        Self {
            planes: Plane::ALL.map(plane),
            picture_rect: IntRect::EMPTY,
            last_serial: None,
        }
    }

    fn update(
        &mut self,
        forwarder: &mut LayerForwarder,
        data: &PlanarYCbCrData,
        serial: u64,
    ) -> Result<ImageUpdate, ClientError> {
        if self.last_serial == Some(serial) {
            return Ok(ImageUpdate::Unchanged);
        }
        for plane in Plane::ALL {
            let (src, stride, size) = data.plane(plane);
            debug_assert!(
                data.fits(plane),
                "{plane:?} plane of {} bytes cannot hold {size:?} at stride {stride}",
                src.len()
            );
            let client = &mut self.planes[plane.index() as usize];
            client.ensure_allocated(size, ContentType::Alpha)?;
            let lock = client.lock()?;
            let mut pixels = lock.pixels()?;
            let copied = pixels.surface_mut().copy_plane(src, stride, size);
            if copied != size {
                log::warn!("{plane:?} plane clamped from {size:?} to {copied:?}");
            }
        }
        let mut descs = [None; 3];
        for plane in Plane::ALL {
            descs[plane.index() as usize] = self.planes[plane.index() as usize].take_descriptor();
        }
        let [Some(y), Some(u), Some(v)] = descs else {
            return Err(ClientError::NoBuffer);
        };
        let layer = self.planes[0].layer();
        let picture_rect = data.picture.intersect(&IntRect::from_size(y.size()));
        if picture_rect != data.picture {
            log::debug!("{layer:?}: picture rect {:?} clamped to {picture_rect:?}", data.picture);
        }
        self.picture_rect = picture_rect;
        forwarder.push(Edit::UpdateImage {
            layer,
            identifier: TextureIdentifier::plane(Plane::Y),
            image: SharedImage::Yuv(YuvImage {
                y,
                u,
                v,
                picture_rect,
            }),
        })?;
        self.last_serial = Some(serial);
        Ok(ImageUpdate::Updated)
    }

    fn set_buffer(&mut self, image: &SharedImage) {
        let SharedImage::Yuv(yuv) = image else {
            log::warn!("ignoring returned {} image", image.variant_name());
            return;
        };
        for plane in Plane::ALL {
            let client = &mut self.planes[plane.index() as usize];
            let desc = *yuv.plane(plane);
            if client.descriptor().is_none() {
                client.set_descriptor(Some(desc));
            } else if let Err(e) = client.pool().destroy_shared_surface(&desc) {
                log::warn!("could not destroy returned {plane:?} plane: {e}");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ImageClient
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Backend {
    Texture(TextureImageClient),
    Shared(SharedImageClient),
    Yuv(YuvImageClient),
}

/// Content-side publisher for one image layer.
#[derive(Debug)]
pub struct ImageClient {
    backend: Backend,
}

impl ImageClient {
    /// Creates a client for `layer`, whose compositable is `kind`.
    ///
    /// Returns `None` for painted-content kinds.
    #[must_use]
    pub fn new(forwarder: &LayerForwarder, layer: LayerId, kind: CompositableKind) -> Option<Self> {
        let backend = match kind {
            CompositableKind::ImageTexture => {
                Backend::Texture(TextureImageClient::new(forwarder, layer, kind))
            }
            CompositableKind::ImageShared => Backend::Shared(SharedImageClient {
                layer,
                identifier: TextureIdentifier::new(kind, TextureKind::SharedTexture),
                last_serial: None,
            }),
            CompositableKind::ImageYuv => Backend::Yuv(YuvImageClient::new(forwarder, layer)),
            CompositableKind::ContentDirect | CompositableKind::ContentTexture => return None,
        };
        Some(Self { backend })
    }

    /// The compositable kind this client feeds.
    #[must_use]
    pub fn compositable(&self) -> CompositableKind {
        match self.backend {
            Backend::Texture(_) => CompositableKind::ImageTexture,
            Backend::Shared(_) => CompositableKind::ImageShared,
            Backend::Yuv(_) => CompositableKind::ImageYuv,
        }
    }

    /// The layer.
    #[must_use]
    pub fn layer(&self) -> LayerId {
        match &self.backend {
            Backend::Texture(c) => c.layer(),
            Backend::Shared(c) => c.layer,
            Backend::Yuv(c) => c.planes[0].layer(),
        }
    }

    /// Picture rect of the last YCbCr frame sent.
    #[must_use]
    pub fn picture_rect(&self) -> Option<IntRect> {
        match &self.backend {
            Backend::Yuv(c) => Some(c.picture_rect),
            Backend::Texture(_) | Backend::Shared(_) => None,
        }
    }

    /// Texture client of a YCbCr plane.
    #[must_use]
    pub fn plane_client(&self, plane: Plane) -> Option<&TextureClient> {
        match &self.backend {
            Backend::Yuv(c) => Some(&c.planes[plane.index() as usize]),
            Backend::Texture(_) | Backend::Shared(_) => None,
        }
    }

    /// Publishes the container's current image if it changed.
    ///
    /// `opaque` selects an opaque content type for CPU images. Errors abort
    /// this frame only; nothing partial is queued.
    pub fn update_image(
        &mut self,
        forwarder: &mut LayerForwarder,
        container: &dyn ImageContainer,
        opaque: bool,
    ) -> Result<ImageUpdate, ClientError> {
        let Some((image, serial)) = container.current_image() else {
            return Ok(ImageUpdate::NoImage);
        };
        match (&mut self.backend, image) {
            (Backend::Texture(c), Image::Surface(s)) => c.update(forwarder, s, serial, opaque),
            (Backend::Shared(c), Image::Shared(d)) => c.update(forwarder, d, serial),
            (Backend::Yuv(c), Image::PlanarYCbCr(d)) => c.update(forwarder, d, serial),
            _ => {
                log::debug!(
                    "{:?}: {:?} client cannot send a {:?} image",
                    self.layer(),
                    self.compositable(),
                    image.compositable()
                );
                Ok(ImageUpdate::WrongKind)
            }
        }
    }

    /// Takes back a buffer the compositor no longer needs.
    pub fn set_buffer(&mut self, identifier: TextureIdentifier, image: &SharedImage) {
        log::trace!("{:?}: {identifier:?} returned", self.layer());
        match &mut self.backend {
            Backend::Texture(c) => c.set_buffer(image),
            Backend::Yuv(c) => c.set_buffer(image),
            // The producer owns shared handles.
            Backend::Shared(_) => {}
        }
    }
}
