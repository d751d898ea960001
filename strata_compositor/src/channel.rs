// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! In-process transport between a content thread and a compositor thread.
//!
//! Both directions carry encoded bytes, exactly what would cross a process
//! boundary. Each direction is a single FIFO, so messages from one sender
//! arrive in send order.

use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};
use strata_core::codec::{decode_replies, decode_transaction, encode_replies, encode_transaction};
use strata_core::protocol::{EditReply, Transaction};

use crate::error::ChannelError;

/// Creates a connected pair of endpoints.
#[must_use]
pub fn channel() -> (ContentEndpoint, CompositorEndpoint) {
    let (tx_sender, tx_receiver) = unbounded();
    let (reply_sender, reply_receiver) = unbounded();
    (
        ContentEndpoint {
            transactions: tx_sender,
            replies: reply_receiver,
        },
        CompositorEndpoint {
            transactions: tx_receiver,
            replies: reply_sender,
        },
    )
}

/// The content side: sends transactions, receives replies.
#[derive(Debug)]
pub struct ContentEndpoint {
    transactions: Sender<Vec<u8>>,
    replies: Receiver<Vec<u8>>,
}

impl ContentEndpoint {
    /// Encodes and sends `tx`.
    pub fn send(&self, tx: &Transaction) -> Result<(), ChannelError> {
        self.transactions
            .send(encode_transaction(tx))
            .map_err(|_| ChannelError::Disconnected)
    }

    /// Blocks until the next batch of replies arrives.
    pub fn recv_replies(&self) -> Result<Vec<EditReply>, ChannelError> {
        let bytes = self.replies.recv().map_err(|_| ChannelError::Disconnected)?;
        Ok(decode_replies(&bytes)?)
    }

    /// Returns the next batch of replies if one is waiting.
    pub fn try_recv_replies(&self) -> Result<Option<Vec<EditReply>>, ChannelError> {
        match self.replies.try_recv() {
            Ok(bytes) => Ok(Some(decode_replies(&bytes)?)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(ChannelError::Disconnected),
        }
    }
}

/// The compositor side: receives transactions, sends replies.
#[derive(Debug)]
pub struct CompositorEndpoint {
    transactions: Receiver<Vec<u8>>,
    replies: Sender<Vec<u8>>,
}

impl CompositorEndpoint {
    /// Blocks until the next transaction arrives.
    pub fn recv(&self) -> Result<Transaction, ChannelError> {
        let bytes = self
            .transactions
            .recv()
            .map_err(|_| ChannelError::Disconnected)?;
        Ok(decode_transaction(&bytes)?)
    }

    /// Returns the next transaction if one is waiting.
    pub fn try_recv(&self) -> Result<Option<Transaction>, ChannelError> {
        match self.transactions.try_recv() {
            Ok(bytes) => Ok(Some(decode_transaction(&bytes)?)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(ChannelError::Disconnected),
        }
    }

    /// Encodes and sends one batch of replies. An empty batch is not sent.
    pub fn send_replies(&self, replies: &[EditReply]) -> Result<(), ChannelError> {
        if replies.is_empty() {
            return Ok(());
        }
        self.replies
            .send(encode_replies(replies))
            .map_err(|_| ChannelError::Disconnected)
    }
}
