// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::sync::Arc;

use strata_core::descriptor::{
    CompositableKind, SharedImage, SurfaceDescriptor, TextureIdentifier, TextureKind,
};
use strata_core::layer::{LayerAllocator, LayerId};
use strata_core::protocol::{Edit, LayerAttributes, Transaction};
use strata_surface::pool::SurfacePool;

use crate::error::ClientError;
use crate::texture_client::TextureClient;

/// Content-side layer table and outgoing edit batch.
///
/// Edits accumulate until [`take_transaction`](Self::take_transaction); the
/// caller encodes and sends the batch, then feeds the replies back to the
/// clients that own the layers.
pub struct LayerForwarder {
    pool: Arc<SurfacePool>,
    layers: LayerAllocator,
    pending: Transaction,
}

impl core::fmt::Debug for LayerForwarder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LayerForwarder")
            .field("layers", &self.layers.len())
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl LayerForwarder {
    /// Creates a forwarder allocating from `pool`.
    #[must_use]
    pub fn new(pool: Arc<SurfacePool>) -> Self {
        Self {
            pool,
            layers: LayerAllocator::new(),
            pending: Transaction::new(),
        }
    }

    /// The shared-memory pool.
    #[must_use]
    pub fn pool(&self) -> &Arc<SurfacePool> {
        &self.pool
    }

    /// Creates a layer with a compositable of `kind` attached.
    pub fn create_layer(&mut self, kind: CompositableKind) -> LayerId {
        let layer = self.layers.allocate();
        self.pending.push(Edit::CreateLayer { layer });
        self.pending.push(Edit::Attach { layer, kind });
        log::debug!("created {layer:?} as {kind:?}");
        layer
    }

    /// Replaces the compositable attached to `layer`.
    pub fn attach(&mut self, layer: LayerId, kind: CompositableKind) -> Result<(), ClientError> {
        self.push(Edit::Attach { layer, kind })
    }

    /// Queues new attributes for `layer`.
    pub fn set_attributes(
        &mut self,
        layer: LayerId,
        attributes: LayerAttributes,
    ) -> Result<(), ClientError> {
        self.push(Edit::SetAttributes { layer, attributes })
    }

    /// Destroys a layer. Returns `false` if it was already gone.
    pub fn destroy_layer(&mut self, layer: LayerId) -> bool {
        if !self.layers.free(layer) {
            return false;
        }
        self.pending.push(Edit::DestroyLayer { layer });
        log::debug!("destroyed {layer:?}");
        true
    }

    /// Returns `true` if `layer` is live.
    #[must_use]
    pub fn is_alive(&self, layer: LayerId) -> bool {
        self.layers.is_alive(layer)
    }

    /// Creates a texture client feeding one texture of `layer`'s
    /// compositable.
    #[must_use]
    pub fn create_texture_client_for(
        &self,
        texture: TextureKind,
        compositable: CompositableKind,
        layer: LayerId,
        index: u32,
    ) -> TextureClient {
        TextureClient::new(
            Arc::clone(&self.pool),
            layer,
            TextureIdentifier {
                compositable,
                texture,
                index,
            },
        )
    }

    /// Queues an edit.
    ///
    /// Edits for dead layers are discarded with
    /// [`ClientError::LayerGone`], and the shared-memory buffers they carry
    /// are destroyed.
    pub fn push(&mut self, edit: Edit) -> Result<(), ClientError> {
        let layer = edit.layer();
        if !self.layers.is_alive(layer) {
            log::warn!("dropping {} for dead {layer:?}", edit.name());
            self.destroy_payload(&edit);
            return Err(ClientError::LayerGone(layer));
        }
        self.pending.push(edit);
        Ok(())
    }

    fn destroy_payload(&self, edit: &Edit) {
        match edit {
            Edit::PaintThebes { buffer, .. } => self.destroy_shmem(&buffer.descriptor),
            Edit::UpdateImage {
                image: SharedImage::Surface(desc),
                ..
            } => self.destroy_shmem(desc),
            Edit::UpdateImage {
                image: SharedImage::Yuv(yuv),
                ..
            } => {
                for desc in yuv.planes() {
                    self.destroy_shmem(&desc);
                }
            }
            _ => {}
        }
    }

    fn destroy_shmem(&self, desc: &SurfaceDescriptor) {
        // Shared handles stay with their producer.
        if desc.as_shmem().is_none() {
            return;
        }
        if let Err(e) = self.pool.destroy_shared_surface(desc) {
            log::warn!("could not destroy undeliverable {desc:?}: {e}");
        }
    }

    /// Edits queued so far.
    #[must_use]
    pub fn pending(&self) -> &Transaction {
        &self.pending
    }

    /// Takes the queued edits, leaving an empty batch.
    pub fn take_transaction(&mut self) -> Transaction {
        core::mem::take(&mut self.pending)
    }
}
