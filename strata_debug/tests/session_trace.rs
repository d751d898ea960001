// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A compositor session recorded end to end.

use std::sync::Arc;

use strata_compositor::{CompositorSession, SessionConfig, SoftwareCompositor, SoftwareContext};
use strata_core::descriptor::{CompositableKind, ContentType, SharedImage, TextureIdentifier, TextureKind};
use strata_core::geometry::IntSize;
use strata_core::layer::LayerId;
use strata_core::protocol::{Edit, Transaction};
use strata_core::trace::DropReason;
use strata_debug::recorder::{RecordedEvent, RecorderSink, decode};
use strata_surface::handoff::TaskQueue;
use strata_surface::pool::SurfacePool;

#[test]
fn session_events_are_recorded() {
    let pool = Arc::new(SurfacePool::default());
    let queue = TaskQueue::for_current_thread();
    let context = Arc::new(SoftwareContext::new(queue.handle()));
    let mut session = CompositorSession::new(
        SoftwareCompositor::new(context, IntSize::new(8, 8)),
        Arc::clone(&pool),
        queue,
        SessionConfig::default(),
    );
    let recorder = RecorderSink::new();
    let recording = recorder.recording();
    session.set_trace_sink(Box::new(recorder));

    let layer = LayerId::from_raw(0, 0);
    let stale = LayerId::from_raw(5, 0);
    let image = pool
        .alloc_buffer(IntSize::new(4, 4), ContentType::ColorAlpha)
        .unwrap();
    let mut tx = Transaction::new();
    tx.push(Edit::CreateLayer { layer });
    tx.push(Edit::Attach {
        layer,
        kind: CompositableKind::ImageTexture,
    });
    tx.push(Edit::UpdateImage {
        layer,
        identifier: TextureIdentifier::new(CompositableKind::ImageTexture, TextureKind::Shmem),
        image: SharedImage::Surface(image),
    });
    tx.push(Edit::DestroyLayer { layer: stale });
    session.apply(tx);
    session.composite();

    let events: Vec<_> = decode(&recording.bytes()).map(|r| r.event).collect();
    assert!(
        matches!(
            events.as_slice(),
            [
                RecordedEvent::ImageUpdate(_),
                RecordedEvent::EditDropped(d),
                RecordedEvent::Transaction(t),
                RecordedEvent::Composite(c),
                RecordedEvent::FrameSummary(s),
            ] if d.reason == DropReason::StaleLayer
                && t.edits == 4
                && t.dropped == 1
                && c.quads == 1
                && s.layers_drawn == 1
        ),
        "unexpected event stream: {events:?}"
    );
}
