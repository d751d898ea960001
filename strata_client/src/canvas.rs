// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::sync::Arc;

use strata_core::descriptor::{
    CompositableKind, ContentType, ShareType, SharedImage, SharedTextureDescriptor,
    SurfaceDescriptor, TextureIdentifier, TextureKind,
};
use strata_core::geometry::IntSize;
use strata_core::layer::LayerId;
use strata_core::protocol::Edit;
use strata_surface::image::SurfaceMut;
use strata_surface::shared_handle::SharedHandleTable;

use crate::error::ClientError;
use crate::forwarder::LayerForwarder;
use crate::image::{TextureImageClient, layer_content_type};

/// Push interface to a canvas producer.
pub trait CanvasSource {
    /// Renders the current canvas content into `target`, which is cleared
    /// and sized to the canvas.
    fn paint_into(&self, target: &mut SurfaceMut<'_>);

    /// Whether rows come out bottom-up (typical of GL readback).
    fn is_inverted(&self) -> bool {
        false
    }
}

#[derive(Debug)]
struct SharedCanvasClient {
    layer: LayerId,
    table: Arc<SharedHandleTable>,
    current: Option<SharedTextureDescriptor>,
}

impl SharedCanvasClient {
    fn update(
        &mut self,
        forwarder: &mut LayerForwarder,
        size: IntSize,
        source: &dyn CanvasSource,
    ) -> Result<(), ClientError> {
        let inverted = source.is_inverted();
        let reusable = self
            .current
            .is_some_and(|d| d.size == size && d.inverted == inverted);
        if !reusable {
            self.release();
            self.current = Some(self.table.create(size, ShareType::SameProcess, inverted)?);
        }
        let Some(desc) = self.current else {
            return Err(ClientError::NoBuffer);
        };
        let Some(surface) = self.table.surface(desc.handle) else {
            log::warn!("{:?}: {:?} vanished", self.layer, desc.handle);
            self.current = None;
            return Err(ClientError::NoBuffer);
        };
        {
            let mut pixels = surface.write();
            let mut target = pixels.view_mut();
            target.fill_rect(target.bounds(), [0; 4]);
            source.paint_into(&mut target);
        }
        forwarder.push(Edit::UpdateImage {
            layer: self.layer,
            identifier: TextureIdentifier::new(
                CompositableKind::ImageShared,
                TextureKind::SharedTexture,
            ),
            image: SharedImage::Surface(SurfaceDescriptor::SharedTexture(desc)),
        })
    }

    fn release(&mut self) {
        let Some(desc) = self.current.take() else {
            return;
        };
        if let Err(e) = self.table.release(&desc) {
            log::warn!("{:?}: leaked {:?}: {e}", self.layer, desc.handle);
        }
    }
}

impl Drop for SharedCanvasClient {
    fn drop(&mut self) {
        self.release();
    }
}

#[derive(Debug)]
enum Backend {
    Texture(TextureImageClient),
    Shared(SharedCanvasClient),
}

/// Publishes canvas output for one layer.
///
/// The texture backend copies the canvas into shared memory each update.
/// The shared backend renders into a GPU-shareable handle it owns and
/// releases on drop.
#[derive(Debug)]
pub struct CanvasClient {
    backend: Backend,
}

impl CanvasClient {
    /// A shared-memory canvas client for an
    /// [`ImageTexture`](CompositableKind::ImageTexture) layer.
    #[must_use]
    pub fn texture(forwarder: &LayerForwarder, layer: LayerId) -> Self {
        Self {
            backend: Backend::Texture(TextureImageClient::new(
                forwarder,
                layer,
                CompositableKind::ImageTexture,
            )),
        }
    }

    /// A shared-handle canvas client for an
    /// [`ImageShared`](CompositableKind::ImageShared) layer.
    #[must_use]
    pub fn shared(layer: LayerId, table: Arc<SharedHandleTable>) -> Self {
        Self {
            backend: Backend::Shared(SharedCanvasClient {
                layer,
                table,
                current: None,
            }),
        }
    }

    /// The compositable kind this client feeds.
    #[must_use]
    pub fn compositable(&self) -> CompositableKind {
        match self.backend {
            Backend::Texture(_) => CompositableKind::ImageTexture,
            Backend::Shared(_) => CompositableKind::ImageShared,
        }
    }

    /// The shared handle currently owned, if any.
    #[must_use]
    pub fn shared_descriptor(&self) -> Option<SharedTextureDescriptor> {
        match &self.backend {
            Backend::Shared(c) => c.current,
            Backend::Texture(_) => None,
        }
    }

    /// Publishes the canvas at `size`.
    ///
    /// `opaque` selects an opaque content type for the shared-memory path.
    pub fn update(
        &mut self,
        forwarder: &mut LayerForwarder,
        size: IntSize,
        opaque: bool,
        source: &dyn CanvasSource,
    ) -> Result<(), ClientError> {
        match &mut self.backend {
            Backend::Texture(c) => {
                let content_type = layer_content_type(ContentType::ColorAlpha, opaque);
                c.publish(forwarder, size, content_type, |target| source.paint_into(target))
            }
            Backend::Shared(c) => c.update(forwarder, size, source),
        }
    }

    /// Takes back a buffer the compositor no longer needs.
    pub fn set_buffer(&mut self, image: &SharedImage) {
        match &mut self.backend {
            Backend::Texture(c) => c.set_buffer(image),
            Backend::Shared(_) => {}
        }
    }
}
