// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Owner-thread task handoff.
//!
//! GPU resources must be released on the thread that owns their context. A
//! [`TaskQueue`] lives on that thread; any number of [`OwnerHandle`]s can be
//! cloned out of it and sent elsewhere. [`OwnerHandle::run_or_post`] runs a
//! task in place when called on the owner thread and queues it otherwise.
//! The owner drains the queue with [`TaskQueue::run_pending`], typically once
//! per composite.

use std::thread::{self, ThreadId};

use crossbeam_channel::{Receiver, Sender, unbounded};

/// Deferred work for the owner thread.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Where a task ran.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dispatch {
    /// Ran on the calling (owner) thread.
    Inline,
    /// Queued for the owner thread.
    Deferred,
}

/// The owner's queue was dropped; the task cannot run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("owner thread task queue is gone")]
pub struct OwnerGone;

/// The receiving end, held by the owner thread.
pub struct TaskQueue {
    owner: ThreadId,
    sender: Sender<Task>,
    receiver: Receiver<Task>,
}

impl core::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("owner", &self.owner)
            .field("pending", &self.receiver.len())
            .finish_non_exhaustive()
    }
}

impl TaskQueue {
    /// Creates a queue owned by the calling thread.
    #[must_use]
    pub fn for_current_thread() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            owner: thread::current().id(),
            sender,
            receiver,
        }
    }

    /// A handle other threads can post through.
    #[must_use]
    pub fn handle(&self) -> OwnerHandle {
        OwnerHandle {
            owner: self.owner,
            sender: self.sender.clone(),
        }
    }

    /// The owning thread.
    #[must_use]
    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    /// Runs every queued task. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        debug_assert_eq!(
            thread::current().id(),
            self.owner,
            "tasks must be drained on the owner thread"
        );
        let mut ran = 0;
        while let Ok(task) = self.receiver.try_recv() {
            task();
            ran += 1;
        }
        if ran > 0 {
            log::trace!("ran {ran} deferred tasks");
        }
        ran
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

/// A cloneable, sendable reference to an owner thread's queue.
#[derive(Clone)]
pub struct OwnerHandle {
    owner: ThreadId,
    sender: Sender<Task>,
}

impl core::fmt::Debug for OwnerHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OwnerHandle")
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

impl OwnerHandle {
    /// The owning thread.
    #[must_use]
    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    /// Returns `true` when called on the owning thread.
    #[must_use]
    pub fn is_owner_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Queues `task` for the owner thread.
    pub fn post(&self, task: Task) -> Result<(), OwnerGone> {
        self.sender.send(task).map_err(|_| OwnerGone)
    }

    /// Runs `task` now if on the owner thread, otherwise queues it.
    pub fn run_or_post(&self, task: Task) -> Result<Dispatch, OwnerGone> {
        if self.is_owner_thread() {
            task();
            Ok(Dispatch::Inline)
        } else {
            self.post(task)?;
            Ok(Dispatch::Deferred)
        }
    }
}
