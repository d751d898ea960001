// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary encoding of transactions and replies.
//!
//! Messages are little-endian, tag-prefixed records with no padding or
//! framing beyond a leading item count. [`encode_transaction`] and
//! [`encode_replies`] produce the bytes; [`decode_transaction`] and
//! [`decode_replies`] read them back and reject truncated input, unknown tags
//! and trailing garbage.

use alloc::vec::Vec;

use kurbo::Affine;

use crate::descriptor::{
    BufferId, BufferRect, CompositableKind, ContentType, Filter, ShareType, SharedHandle,
    SharedImage, SharedImageId, SharedTextureDescriptor, ShmemDescriptor, SurfaceDescriptor,
    TextureIdentifier, TextureKind, ThebesBuffer, YuvImage,
};
use crate::geometry::{IntPoint, IntRect, IntSize};
use crate::layer::LayerId;
use crate::protocol::{Edit, EditReply, LayerAttributes, ThebesSwap, Transaction};
use crate::region::IntRegion;

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

const TAG_CREATE_LAYER: u8 = 1;
const TAG_ATTACH: u8 = 2;
const TAG_SET_ATTRIBUTES: u8 = 3;
const TAG_PAINT_THEBES: u8 = 4;
const TAG_UPDATE_IMAGE: u8 = 5;
const TAG_UPDATE_PICTURE_RECT: u8 = 6;
const TAG_DESTROY_LAYER: u8 = 7;

const TAG_SWAP_THEBES: u8 = 1;
const TAG_RETURN_IMAGE: u8 = 2;

const TAG_DESC_SHMEM: u8 = 0;
const TAG_DESC_SHARED: u8 = 1;

const TAG_IMAGE_SURFACE: u8 = 0;
const TAG_IMAGE_YUV: u8 = 1;
const TAG_IMAGE_EXTERNAL: u8 = 2;

/// Failure to decode a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The input ended inside a record.
    #[error("message truncated at byte {0}")]
    Truncated(usize),
    /// A discriminant byte had no meaning.
    #[error("unknown {what} tag {tag} at byte {offset}")]
    UnknownTag {
        /// What was being decoded.
        what: &'static str,
        /// The offending byte.
        tag: u8,
        /// Where it was found.
        offset: usize,
    },
    /// Bytes remained after the last record.
    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),
    /// A size had a negative dimension.
    #[error("negative size at byte {0}")]
    InvalidSize(usize),
    /// A rect had a negative dimension or its far edge overflowed.
    #[error("rect at byte {0} is negative or out of range")]
    InvalidRect(usize),
}

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Encodes a transaction.
#[must_use]
pub fn encode_transaction(tx: &Transaction) -> Vec<u8> {
    let mut enc = Encoder::default();
    enc.write_len(tx.edits.len());
    for edit in &tx.edits {
        enc.write_edit(edit);
    }
    enc.buf
}

/// Decodes a transaction produced by [`encode_transaction`].
pub fn decode_transaction(bytes: &[u8]) -> Result<Transaction, DecodeError> {
    let mut dec = Decoder::new(bytes);
    let count = dec.read_u32()?;
    let mut tx = Transaction::new();
    for _ in 0..count {
        tx.push(dec.read_edit()?);
    }
    dec.finish()?;
    Ok(tx)
}

/// Encodes a batch of replies.
#[must_use]
pub fn encode_replies(replies: &[EditReply]) -> Vec<u8> {
    let mut enc = Encoder::default();
    enc.write_len(replies.len());
    for reply in replies {
        enc.write_reply(reply);
    }
    enc.buf
}

/// Decodes replies produced by [`encode_replies`].
pub fn decode_replies(bytes: &[u8]) -> Result<Vec<EditReply>, DecodeError> {
    let mut dec = Decoder::new(bytes);
    let count = dec.read_u32()?;
    let mut out = Vec::new();
    for _ in 0..count {
        out.push(dec.read_reply()?);
    }
    dec.finish()?;
    Ok(out)
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    // -- scalars --

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    fn write_len(&mut self, len: usize) {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "message item counts are far below u32::MAX"
        )]
        self.write_u32(len as u32);
    }

    // -- geometry --

    fn write_point(&mut self, p: IntPoint) {
        self.write_i32(p.x);
        self.write_i32(p.y);
    }

    fn write_size(&mut self, s: IntSize) {
        self.write_i32(s.width);
        self.write_i32(s.height);
    }

    fn write_rect(&mut self, r: IntRect) {
        self.write_i32(r.x);
        self.write_i32(r.y);
        self.write_i32(r.width);
        self.write_i32(r.height);
    }

    fn write_region(&mut self, r: &IntRegion) {
        self.write_len(r.rects().len());
        for rect in r.rects() {
            self.write_rect(*rect);
        }
    }

    // -- identifiers --

    fn write_layer(&mut self, id: LayerId) {
        self.write_u32(id.idx);
        self.write_u32(id.generation);
    }

    fn write_content_type(&mut self, c: ContentType) {
        self.write_u8(match c {
            ContentType::Color => 0,
            ContentType::ColorAlpha => 1,
            ContentType::Alpha => 2,
        });
    }

    fn write_compositable(&mut self, k: CompositableKind) {
        self.write_u8(match k {
            CompositableKind::ContentDirect => 0,
            CompositableKind::ContentTexture => 1,
            CompositableKind::ImageTexture => 2,
            CompositableKind::ImageShared => 3,
            CompositableKind::ImageYuv => 4,
        });
    }

    fn write_identifier(&mut self, id: &TextureIdentifier) {
        self.write_compositable(id.compositable);
        self.write_u8(match id.texture {
            TextureKind::Shmem => 0,
            TextureKind::SharedTexture => 1,
        });
        self.write_u32(id.index);
    }

    // -- payloads --

    fn write_descriptor(&mut self, d: &SurfaceDescriptor) {
        match d {
            SurfaceDescriptor::Shmem(s) => {
                self.write_u8(TAG_DESC_SHMEM);
                self.write_u64(s.id.0);
                self.write_size(s.size);
                self.write_content_type(s.content_type);
            }
            SurfaceDescriptor::SharedTexture(s) => {
                self.write_u8(TAG_DESC_SHARED);
                self.write_u8(match s.share_type {
                    ShareType::SameProcess => 0,
                    ShareType::CrossProcess => 1,
                });
                self.write_u64(s.handle.0);
                self.write_size(s.size);
                self.write_bool(s.inverted);
            }
        }
    }

    fn write_image(&mut self, image: &SharedImage) {
        match image {
            SharedImage::Surface(d) => {
                self.write_u8(TAG_IMAGE_SURFACE);
                self.write_descriptor(d);
            }
            SharedImage::Yuv(y) => {
                self.write_u8(TAG_IMAGE_YUV);
                self.write_descriptor(&y.y);
                self.write_descriptor(&y.u);
                self.write_descriptor(&y.v);
                self.write_rect(y.picture_rect);
            }
            SharedImage::External(id) => {
                self.write_u8(TAG_IMAGE_EXTERNAL);
                self.write_u64(id.0);
            }
        }
    }

    fn write_thebes_buffer(&mut self, b: &ThebesBuffer) {
        self.write_descriptor(&b.descriptor);
        self.write_rect(b.geometry.rect);
        self.write_point(b.geometry.rotation);
    }

    fn write_option_thebes_buffer(&mut self, b: Option<&ThebesBuffer>) {
        match b {
            Some(b) => {
                self.write_u8(1);
                self.write_thebes_buffer(b);
            }
            None => self.write_u8(0),
        }
    }

    fn write_attributes(&mut self, a: &LayerAttributes) {
        for c in a.transform.as_coeffs() {
            self.write_f64(c);
        }
        self.write_f32(a.opacity);
        match a.clip {
            Some(r) => {
                self.write_u8(1);
                self.write_rect(r);
            }
            None => self.write_u8(0),
        }
        self.write_u8(match a.filter {
            Filter::Nearest => 0,
            Filter::Linear => 1,
        });
        self.write_bool(a.hidden);
    }

    // -- records --

    fn write_edit(&mut self, edit: &Edit) {
        match edit {
            Edit::CreateLayer { layer } => {
                self.write_u8(TAG_CREATE_LAYER);
                self.write_layer(*layer);
            }
            Edit::Attach { layer, kind } => {
                self.write_u8(TAG_ATTACH);
                self.write_layer(*layer);
                self.write_compositable(*kind);
            }
            Edit::SetAttributes { layer, attributes } => {
                self.write_u8(TAG_SET_ATTRIBUTES);
                self.write_layer(*layer);
                self.write_attributes(attributes);
            }
            Edit::PaintThebes {
                layer,
                identifier,
                buffer,
                updated_region,
                valid_region,
            } => {
                self.write_u8(TAG_PAINT_THEBES);
                self.write_layer(*layer);
                self.write_identifier(identifier);
                self.write_thebes_buffer(buffer);
                self.write_region(updated_region);
                self.write_region(valid_region);
            }
            Edit::UpdateImage {
                layer,
                identifier,
                image,
            } => {
                self.write_u8(TAG_UPDATE_IMAGE);
                self.write_layer(*layer);
                self.write_identifier(identifier);
                self.write_image(image);
            }
            Edit::UpdatePictureRect { layer, rect } => {
                self.write_u8(TAG_UPDATE_PICTURE_RECT);
                self.write_layer(*layer);
                self.write_rect(*rect);
            }
            Edit::DestroyLayer { layer } => {
                self.write_u8(TAG_DESTROY_LAYER);
                self.write_layer(*layer);
            }
        }
    }

    fn write_reply(&mut self, reply: &EditReply) {
        match reply {
            EditReply::SwapThebes(swap) => {
                self.write_u8(TAG_SWAP_THEBES);
                self.write_layer(swap.layer);
                self.write_identifier(&swap.identifier);
                self.write_option_thebes_buffer(swap.new_back.as_ref());
                self.write_region(&swap.new_back_valid_region);
                self.write_option_thebes_buffer(swap.read_only_front.as_ref());
                self.write_region(&swap.front_updated_region);
            }
            EditReply::ReturnImage {
                layer,
                identifier,
                image,
            } => {
                self.write_u8(TAG_RETURN_IMAGE);
                self.write_layer(*layer);
                self.write_identifier(identifier);
                self.write_image(image);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

struct Decoder<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn finish(&self) -> Result<(), DecodeError> {
        match self.bytes.len() - self.pos {
            0 => Ok(()),
            n => Err(DecodeError::TrailingBytes(n)),
        }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let end = self.pos + N;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or(DecodeError::Truncated(self.pos))?;
        let mut out = [0_u8; N];
        out.copy_from_slice(slice);
        self.pos = end;
        Ok(out)
    }

    fn unknown(&self, what: &'static str, tag: u8) -> DecodeError {
        DecodeError::UnknownTag {
            what,
            tag,
            offset: self.pos - 1,
        }
    }

    // -- scalars --

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take::<1>()?[0])
    }

    fn read_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    fn read_i32(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_le_bytes(self.take()?))
    }

    fn read_u64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.take()?))
    }

    fn read_f32(&mut self) -> Result<f32, DecodeError> {
        Ok(f32::from_le_bytes(self.take()?))
    }

    fn read_f64(&mut self) -> Result<f64, DecodeError> {
        Ok(f64::from_le_bytes(self.take()?))
    }

    fn read_bool(&mut self) -> Result<bool, DecodeError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            t => Err(self.unknown("bool", t)),
        }
    }

    // -- geometry --

    fn read_point(&mut self) -> Result<IntPoint, DecodeError> {
        Ok(IntPoint::new(self.read_i32()?, self.read_i32()?))
    }

    fn read_size(&mut self) -> Result<IntSize, DecodeError> {
        let offset = self.pos;
        let size = IntSize::new(self.read_i32()?, self.read_i32()?);
        if size.width < 0 || size.height < 0 {
            return Err(DecodeError::InvalidSize(offset));
        }
        Ok(size)
    }

    /// Reads a rect whose edges are representable.
    fn read_rect(&mut self) -> Result<IntRect, DecodeError> {
        let offset = self.pos;
        let rect = IntRect::new(
            self.read_i32()?,
            self.read_i32()?,
            self.read_i32()?,
            self.read_i32()?,
        );
        let in_range = rect.width >= 0
            && rect.height >= 0
            && rect.x.checked_add(rect.width).is_some()
            && rect.y.checked_add(rect.height).is_some();
        if !in_range {
            return Err(DecodeError::InvalidRect(offset));
        }
        Ok(rect)
    }

    fn read_region(&mut self) -> Result<IntRegion, DecodeError> {
        let count = self.read_u32()?;
        let mut region = IntRegion::new();
        for _ in 0..count {
            region.union_rect(self.read_rect()?);
        }
        Ok(region)
    }

    // -- identifiers --

    fn read_layer(&mut self) -> Result<LayerId, DecodeError> {
        Ok(LayerId::from_raw(self.read_u32()?, self.read_u32()?))
    }

    fn read_content_type(&mut self) -> Result<ContentType, DecodeError> {
        match self.read_u8()? {
            0 => Ok(ContentType::Color),
            1 => Ok(ContentType::ColorAlpha),
            2 => Ok(ContentType::Alpha),
            t => Err(self.unknown("content type", t)),
        }
    }

    fn read_compositable(&mut self) -> Result<CompositableKind, DecodeError> {
        match self.read_u8()? {
            0 => Ok(CompositableKind::ContentDirect),
            1 => Ok(CompositableKind::ContentTexture),
            2 => Ok(CompositableKind::ImageTexture),
            3 => Ok(CompositableKind::ImageShared),
            4 => Ok(CompositableKind::ImageYuv),
            t => Err(self.unknown("compositable", t)),
        }
    }

    fn read_identifier(&mut self) -> Result<TextureIdentifier, DecodeError> {
        let compositable = self.read_compositable()?;
        let texture = match self.read_u8()? {
            0 => TextureKind::Shmem,
            1 => TextureKind::SharedTexture,
            t => return Err(self.unknown("texture kind", t)),
        };
        Ok(TextureIdentifier {
            compositable,
            texture,
            index: self.read_u32()?,
        })
    }

    // -- payloads --

    fn read_descriptor(&mut self) -> Result<SurfaceDescriptor, DecodeError> {
        match self.read_u8()? {
            TAG_DESC_SHMEM => Ok(SurfaceDescriptor::Shmem(ShmemDescriptor {
                id: BufferId(self.read_u64()?),
                size: self.read_size()?,
                content_type: self.read_content_type()?,
            })),
            TAG_DESC_SHARED => {
                let share_type = match self.read_u8()? {
                    0 => ShareType::SameProcess,
                    1 => ShareType::CrossProcess,
                    t => return Err(self.unknown("share type", t)),
                };
                Ok(SurfaceDescriptor::SharedTexture(SharedTextureDescriptor {
                    share_type,
                    handle: SharedHandle(self.read_u64()?),
                    size: self.read_size()?,
                    inverted: self.read_bool()?,
                }))
            }
            t => Err(self.unknown("descriptor", t)),
        }
    }

    fn read_image(&mut self) -> Result<SharedImage, DecodeError> {
        match self.read_u8()? {
            TAG_IMAGE_SURFACE => Ok(SharedImage::Surface(self.read_descriptor()?)),
            TAG_IMAGE_YUV => Ok(SharedImage::Yuv(YuvImage {
                y: self.read_descriptor()?,
                u: self.read_descriptor()?,
                v: self.read_descriptor()?,
                picture_rect: self.read_rect()?,
            })),
            TAG_IMAGE_EXTERNAL => Ok(SharedImage::External(SharedImageId(self.read_u64()?))),
            t => Err(self.unknown("shared image", t)),
        }
    }

    fn read_thebes_buffer(&mut self) -> Result<ThebesBuffer, DecodeError> {
        Ok(ThebesBuffer {
            descriptor: self.read_descriptor()?,
            geometry: BufferRect {
                rect: self.read_rect()?,
                rotation: self.read_point()?,
            },
        })
    }

    fn read_option_thebes_buffer(&mut self) -> Result<Option<ThebesBuffer>, DecodeError> {
        match self.read_u8()? {
            0 => Ok(None),
            1 => Ok(Some(self.read_thebes_buffer()?)),
            t => Err(self.unknown("optional buffer", t)),
        }
    }

    fn read_attributes(&mut self) -> Result<LayerAttributes, DecodeError> {
        let mut coeffs = [0.0_f64; 6];
        for c in &mut coeffs {
            *c = self.read_f64()?;
        }
        let opacity = self.read_f32()?;
        let clip = match self.read_u8()? {
            0 => None,
            1 => Some(self.read_rect()?),
            t => return Err(self.unknown("optional clip", t)),
        };
        let filter = match self.read_u8()? {
            0 => Filter::Nearest,
            1 => Filter::Linear,
            t => return Err(self.unknown("filter", t)),
        };
        Ok(LayerAttributes {
            transform: Affine::new(coeffs),
            opacity,
            clip,
            filter,
            hidden: self.read_bool()?,
        })
    }

    // -- records --

    fn read_edit(&mut self) -> Result<Edit, DecodeError> {
        match self.read_u8()? {
            TAG_CREATE_LAYER => Ok(Edit::CreateLayer {
                layer: self.read_layer()?,
            }),
            TAG_ATTACH => Ok(Edit::Attach {
                layer: self.read_layer()?,
                kind: self.read_compositable()?,
            }),
            TAG_SET_ATTRIBUTES => Ok(Edit::SetAttributes {
                layer: self.read_layer()?,
                attributes: self.read_attributes()?,
            }),
            TAG_PAINT_THEBES => Ok(Edit::PaintThebes {
                layer: self.read_layer()?,
                identifier: self.read_identifier()?,
                buffer: self.read_thebes_buffer()?,
                updated_region: self.read_region()?,
                valid_region: self.read_region()?,
            }),
            TAG_UPDATE_IMAGE => Ok(Edit::UpdateImage {
                layer: self.read_layer()?,
                identifier: self.read_identifier()?,
                image: self.read_image()?,
            }),
            TAG_UPDATE_PICTURE_RECT => Ok(Edit::UpdatePictureRect {
                layer: self.read_layer()?,
                rect: self.read_rect()?,
            }),
            TAG_DESTROY_LAYER => Ok(Edit::DestroyLayer {
                layer: self.read_layer()?,
            }),
            t => Err(self.unknown("edit", t)),
        }
    }

    fn read_reply(&mut self) -> Result<EditReply, DecodeError> {
        match self.read_u8()? {
            TAG_SWAP_THEBES => Ok(EditReply::SwapThebes(ThebesSwap {
                layer: self.read_layer()?,
                identifier: self.read_identifier()?,
                new_back: self.read_option_thebes_buffer()?,
                new_back_valid_region: self.read_region()?,
                read_only_front: self.read_option_thebes_buffer()?,
                front_updated_region: self.read_region()?,
            })),
            TAG_RETURN_IMAGE => Ok(EditReply::ReturnImage {
                layer: self.read_layer()?,
                identifier: self.read_identifier()?,
                image: self.read_image()?,
            }),
            t => Err(self.unknown("reply", t)),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;
    use crate::descriptor::Plane;

    fn shmem(id: u64, w: i32, h: i32, content_type: ContentType) -> SurfaceDescriptor {
        SurfaceDescriptor::Shmem(ShmemDescriptor {
            id: BufferId(id),
            size: IntSize::new(w, h),
            content_type,
        })
    }

    fn painted(layer: LayerId) -> Edit {
        Edit::PaintThebes {
            layer,
            identifier: TextureIdentifier::new(
                CompositableKind::ContentDirect,
                TextureKind::Shmem,
            ),
            buffer: ThebesBuffer {
                descriptor: shmem(4, 100, 100, ContentType::ColorAlpha),
                geometry: BufferRect {
                    rect: IntRect::new(0, 20, 100, 100),
                    rotation: IntPoint::new(0, 20),
                },
            },
            updated_region: IntRegion::from_rect(IntRect::new(0, 100, 100, 20)),
            valid_region: IntRegion::from_rect(IntRect::new(0, 20, 100, 100)),
        }
    }

    #[test]
    fn transaction_survives_the_wire() {
        let layer = LayerId::from_raw(3, 1);
        let mut tx = Transaction::new();
        tx.push(Edit::CreateLayer { layer });
        tx.push(Edit::Attach {
            layer,
            kind: CompositableKind::ImageYuv,
        });
        tx.push(Edit::SetAttributes {
            layer,
            attributes: LayerAttributes {
                transform: Affine::translate((4.0, 8.0)),
                opacity: 0.5,
                clip: Some(IntRect::new(0, 0, 32, 32)),
                filter: Filter::Nearest,
                hidden: false,
            },
        });
        tx.push(painted(layer));
        tx.push(Edit::UpdateImage {
            layer,
            identifier: TextureIdentifier::plane(Plane::Y),
            image: SharedImage::Yuv(YuvImage {
                y: shmem(1, 64, 48, ContentType::Alpha),
                u: shmem(2, 32, 24, ContentType::Alpha),
                v: shmem(3, 32, 24, ContentType::Alpha),
                picture_rect: IntRect::new(0, 0, 60, 44),
            }),
        });
        tx.push(Edit::UpdatePictureRect {
            layer,
            rect: IntRect::new(2, 2, 60, 44),
        });
        tx.push(Edit::DestroyLayer { layer });

        let bytes = encode_transaction(&tx);
        assert_eq!(
            decode_transaction(&bytes),
            Ok(tx),
            "decoded transaction must match"
        );
    }

    #[test]
    fn swap_reply_keeps_optional_buffers() {
        let layer = LayerId::from_raw(0, 0);
        let reply = EditReply::SwapThebes(ThebesSwap {
            layer,
            identifier: TextureIdentifier::new(
                CompositableKind::ContentDirect,
                TextureKind::Shmem,
            ),
            new_back: None,
            new_back_valid_region: IntRegion::new(),
            read_only_front: Some(ThebesBuffer {
                descriptor: shmem(8, 16, 16, ContentType::Color),
                geometry: BufferRect::unrotated(IntRect::new(0, 0, 16, 16)),
            }),
            front_updated_region: IntRegion::from_rect(IntRect::new(0, 0, 16, 16)),
        });
        let bytes = encode_replies(&[reply.clone()]);
        assert_eq!(
            decode_replies(&bytes),
            Ok(vec![reply]),
            "decoded replies must match"
        );
    }

    #[test]
    fn truncated_input_is_rejected() {
        let mut tx = Transaction::new();
        tx.push(painted(LayerId::from_raw(1, 0)));
        let bytes = encode_transaction(&tx);
        let cut = &bytes[..bytes.len() - 3];
        assert!(
            matches!(decode_transaction(cut), Err(DecodeError::Truncated(_))),
            "short input must report truncation"
        );
    }

    #[test]
    fn unknown_edit_tag_is_rejected() {
        let bytes = [1, 0, 0, 0, 0xEE];
        assert_eq!(
            decode_transaction(&bytes),
            Err(DecodeError::UnknownTag {
                what: "edit",
                tag: 0xEE,
                offset: 4
            }),
            "unknown tag reports its offset"
        );
    }

    #[test]
    fn overflowing_region_rect_is_rejected() {
        let mut enc = Encoder::default();
        enc.write_len(2);
        enc.write_rect(IntRect::new(0, 0, 10, 10));
        enc.write_rect(IntRect::new(i32::MAX - 1, 0, 10, 10));
        assert_eq!(
            Decoder::new(&enc.buf).read_region(),
            Err(DecodeError::InvalidRect(20)),
            "second rect's right edge overflows"
        );
    }

    #[test]
    fn negative_picture_rect_is_rejected() {
        let mut tx = Transaction::new();
        tx.push(Edit::UpdatePictureRect {
            layer: LayerId::from_raw(0, 0),
            rect: IntRect::new(0, 0, -4, 8),
        });
        assert!(
            matches!(
                decode_transaction(&encode_transaction(&tx)),
                Err(DecodeError::InvalidRect(_))
            ),
            "negative width must not decode"
        );
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = encode_transaction(&Transaction::new());
        bytes.push(0);
        assert_eq!(
            decode_transaction(&bytes),
            Err(DecodeError::TrailingBytes(1)),
            "garbage after the message"
        );
    }
}
