// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Content client to compositor session over the byte channel.

use std::sync::Arc;

use strata_client::{
    ContentClient, ContentPolicy, ContentState, Image, ImageClient, ImageContainer, ImageUpdate,
    LayerForwarder, PaintFlags, PaintState, PlanarYCbCrData,
};
use strata_compositor::{
    CompositorEndpoint, CompositorSession, ContentEndpoint, SessionConfig, SoftwareCompositor,
    SoftwareContext, channel,
};
use strata_core::descriptor::{CompositableKind, ContentType, Plane};
use strata_core::geometry::{IntPoint, IntRect, IntSize};
use strata_core::protocol::{EditReply, ThebesSwap};
use strata_core::region::IntRegion;
use strata_surface::handoff::TaskQueue;
use strata_surface::pool::SurfacePool;

const RED: [u8; 4] = [0, 0, 255, 255];
const BLUE: [u8; 4] = [255, 0, 0, 255];

struct Harness {
    pool: Arc<SurfacePool>,
    forwarder: LayerForwarder,
    content: ContentEndpoint,
    compositor: CompositorEndpoint,
    session: CompositorSession<SoftwareCompositor>,
}

impl Harness {
    fn new(size: IntSize) -> Self {
        let pool = Arc::new(SurfacePool::default());
        let queue = TaskQueue::for_current_thread();
        let context = Arc::new(SoftwareContext::new(queue.handle()));
        let session = CompositorSession::new(
            SoftwareCompositor::new(context, size),
            Arc::clone(&pool),
            queue,
            SessionConfig::default(),
        );
        let (content, compositor) = channel();
        Self {
            forwarder: LayerForwarder::new(Arc::clone(&pool)),
            pool,
            content,
            compositor,
            session,
        }
    }

    /// Sends the pending transaction and returns the compositor's answer.
    fn exchange(&mut self) -> Vec<EditReply> {
        let tx = self.forwarder.take_transaction();
        self.content.send(&tx).unwrap();
        self.session.pump(&self.compositor).unwrap();
        self.content.try_recv_replies().unwrap().unwrap_or_default()
    }

    fn pixel(&self, x: i32, y: i32) -> [u8; 4] {
        self.session.compositor().frame().pixel(x, y)
    }
}

fn swap_replies(replies: Vec<EditReply>) -> Vec<ThebesSwap> {
    replies
        .into_iter()
        .filter_map(|r| match r {
            EditReply::SwapThebes(swap) => Some(swap),
            EditReply::ReturnImage { .. } => None,
        })
        .collect()
}

fn paint(client: &mut ContentClient, visible: &IntRegion, rect: IntRect, px: [u8; 4]) -> PaintState {
    let state = client
        .begin_paint(visible, ContentType::ColorAlpha, PaintFlags::default())
        .unwrap();
    let mut target = client.lock_paint_target().unwrap();
    target.fill_rect(rect, px).unwrap();
    target.unlock();
    state
}

#[test]
fn direct_content_swaps_and_syncs() {
    let mut h = Harness::new(IntSize::new(100, 100));
    let layer = h.forwarder.create_layer(CompositableKind::ContentDirect);
    let mut client = ContentClient::new(&h.forwarder, layer, ContentPolicy::Direct);
    let bounds = IntRect::new(0, 0, 100, 100);
    let visible = IntRegion::from_rect(bounds);

    // Frame 1: a fresh buffer, painted everywhere.
    let state = client
        .begin_paint(&visible, ContentType::ColorAlpha, PaintFlags::default())
        .unwrap();
    assert_eq!(state.region_to_draw, visible, "fresh buffer draws everything");
    let mut target = client.lock_paint_target().unwrap();
    target.fill_rect(bounds, RED).unwrap();
    target.unlock();
    let edit = client.end_paint(&state, &visible).unwrap();
    h.forwarder.push(edit).unwrap();
    let swaps = swap_replies(h.exchange());
    assert_eq!(swaps.len(), 1, "one swap reply");
    assert_eq!(swaps[0].front_updated_region, visible, "whole buffer updated");
    assert!(swaps[0].new_back.is_none(), "no previous front to return");
    client.set_back_buffer_and_attrs(&swaps[0]);
    assert_eq!(client.state(), ContentState::ReadOnlyFrontPending, "must read back");

    h.session.composite();
    assert_eq!(h.pixel(50, 50), RED, "frame 1 drawn");

    // Frame 2: only the invalidated square is repainted.
    let damage = IntRect::new(10, 10, 20, 20);
    client.invalidate(&IntRegion::from_rect(damage));
    let state = paint(&mut client, &visible, damage, BLUE);
    assert_eq!(
        state.region_to_draw,
        IntRegion::from_rect(damage),
        "only the damage is drawn"
    );
    let edit = client.end_paint(&state, &visible).unwrap();
    h.forwarder.push(edit).unwrap();
    let swaps = swap_replies(h.exchange());
    assert_eq!(
        swaps[0].front_updated_region,
        IntRegion::from_rect(damage),
        "updated region is the damage"
    );
    assert!(swaps[0].new_back.is_some(), "old front comes back");
    client.set_back_buffer_and_attrs(&swaps[0]);
    assert_eq!(h.pool.live_buffers(), 2, "one front, one back");

    h.session.composite();
    assert_eq!(h.pixel(15, 15), BLUE, "damage repainted");
    assert_eq!(h.pixel(50, 50), RED, "rest carried over");

    // Frame 3: reading back makes the returned buffer match the front.
    let state = client
        .begin_paint(&visible, ContentType::ColorAlpha, PaintFlags::default())
        .unwrap();
    assert!(state.region_to_draw.is_empty(), "nothing invalid");
    let target = client.lock_paint_target().unwrap();
    assert_eq!(target.pixel(IntPoint::new(15, 15)).unwrap(), BLUE, "damage synced back");
    assert_eq!(target.pixel(IntPoint::new(50, 50)).unwrap(), RED, "old pixels kept");
}

struct Still(Image);

impl ImageContainer for Still {
    fn current_image(&self) -> Option<(&Image, u64)> {
        Some((&self.0, 1))
    }
}

#[test]
fn yuv_frame_draws_its_picture_rect() {
    let mut h = Harness::new(IntSize::new(100, 100));
    let layer = h.forwarder.create_layer(CompositableKind::ImageYuv);
    let mut client = ImageClient::new(&h.forwarder, layer, CompositableKind::ImageYuv).unwrap();
    let picture = IntRect::new(8, 8, 48, 32);
    let still = Still(Image::PlanarYCbCr(PlanarYCbCrData {
        y: vec![235; 64 * 48],
        y_stride: 64,
        y_size: IntSize::new(64, 48),
        cb: vec![128; 32 * 24],
        cr: vec![128; 32 * 24],
        cbcr_stride: 32,
        cbcr_size: IntSize::new(32, 24),
        picture,
    }));
    let outcome = client.update_image(&mut h.forwarder, &still, false).unwrap();
    assert_eq!(outcome, ImageUpdate::Updated, "frame queued");

    for reply in h.exchange() {
        if let EditReply::ReturnImage {
            identifier, image, ..
        } = reply
        {
            client.set_buffer(identifier, &image);
        }
    }
    assert!(
        client.plane_client(Plane::Y).unwrap().descriptor().is_some(),
        "planes handed back after upload"
    );

    let summary = h.session.composite();
    assert_eq!(summary.quads, 1, "one quad");
    let px = h.pixel(20, 20);
    assert!(px.iter().all(|&c| c >= 250), "video white is near white: {px:?}");
    assert_eq!(h.pixel(47, 31), h.pixel(0, 0), "picture starts at the origin");
    assert_eq!(h.pixel(60, 40), [0; 4], "outside the picture stays clear");
}

#[test_log::test]
fn destroying_a_layer_releases_its_front() {
    let mut h = Harness::new(IntSize::new(16, 16));
    let layer = h.forwarder.create_layer(CompositableKind::ContentDirect);
    let mut client = ContentClient::new(&h.forwarder, layer, ContentPolicy::Direct);
    let visible = IntRegion::from_rect(IntRect::new(0, 0, 16, 16));
    let state = client
        .begin_paint(&visible, ContentType::ColorAlpha, PaintFlags::default())
        .unwrap();
    let edit = client.end_paint(&state, &visible).unwrap();
    h.forwarder.push(edit).unwrap();
    h.exchange();
    assert_eq!(h.pool.live_buffers(), 1, "host holds the front");

    assert!(h.forwarder.destroy_layer(layer), "layer was live");
    h.exchange();
    assert_eq!(h.pool.live_buffers(), 0, "front destroyed with the layer");
    assert_eq!(h.session.layer_count(), 0, "no layers left");
    assert_eq!(h.session.composite().layers_drawn, 0, "nothing to draw");
}
