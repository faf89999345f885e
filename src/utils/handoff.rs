use ringbuffer::{AllocRingBuffer, RingBuffer};
use thiserror::Error;

use std::sync::{Arc, Condvar, Mutex};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("The channel was closed (peer dropped)")]
    Closed,

    #[error("No data available in channel")]
    Empty,
}

/// Bounded single-producer single-consumer handoff channel.
///
/// `capacity` must be at least 1. With capacity 1 this is a single-slot
/// buffer: a value sits in the slot until the consumer takes it, and the
/// producer either waits for the slot to drain ([`Sender::send`]) or
/// replaces the occupant ([`Sender::send_latest`]).
pub fn channel<T>(capacity: usize) -> (Sender<T>, Receiver<T>) {
    let shared = Arc::new(Shared {
        inner: Mutex::new(Inner {
            buf: AllocRingBuffer::new(capacity),
            lagged: 0,
            closed: false,
        }),
        readable: Condvar::default(),
        writable: Condvar::default(),
    });

    (
        Sender {
            shared: shared.clone(),
        },
        Receiver { shared },
    )
}

/// Capacity-1 [`channel`].
pub fn slot<T>() -> (Sender<T>, Receiver<T>) {
    channel(1)
}

#[derive(Debug)]
struct Shared<T> {
    inner: Mutex<Inner<T>>,
    readable: Condvar,
    writable: Condvar,
}

#[derive(Debug)]
struct Inner<T> {
    buf: AllocRingBuffer<T>,
    lagged: usize,
    closed: bool,
}

impl<T> Shared<T> {
    fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.closed = true;

        self.readable.notify_all();
        self.writable.notify_all();
    }
}

#[derive(Debug)]
pub struct Sender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Sender<T> {
    /// Publishes a value, waiting for space if the buffer is full.
    pub fn send(&self, value: T) -> Result<(), ChannelError> {
        let inner = self.shared.inner.lock().unwrap();

        let mut inner = self
            .shared
            .writable
            .wait_while(inner, |inner| inner.buf.is_full() && !inner.closed)
            .unwrap();

        if inner.closed {
            return Err(ChannelError::Closed);
        }

        inner.buf.push(value);
        self.shared.readable.notify_one();

        Ok(())
    }

    /// Publishes a value without waiting. If the buffer is full the oldest
    /// unconsumed value is replaced, counted, and returned.
    pub fn send_latest(&self, value: T) -> Result<Option<T>, ChannelError> {
        let mut inner = self.shared.inner.lock().unwrap();

        if inner.closed {
            return Err(ChannelError::Closed);
        }

        let displaced = if inner.buf.is_full() {
            inner.lagged += 1;
            inner.buf.dequeue()
        } else {
            None
        };

        inner.buf.push(value);
        self.shared.readable.notify_one();

        Ok(displaced)
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        self.shared.close();
    }
}

#[derive(Debug)]
pub struct Receiver<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Receiver<T> {
    /// Takes the next value, waiting for one if the buffer is empty.
    /// Buffered values are still delivered after the sender is gone.
    pub fn recv(&self) -> Result<T, ChannelError> {
        let inner = self.shared.inner.lock().unwrap();

        let mut inner = self
            .shared
            .readable
            .wait_while(inner, |inner| inner.buf.is_empty() && !inner.closed)
            .unwrap();

        match inner.buf.dequeue() {
            Some(value) => {
                self.shared.writable.notify_one();
                Ok(value)
            }
            None => Err(ChannelError::Closed),
        }
    }

    pub fn try_recv(&self) -> Result<T, ChannelError> {
        let mut inner = self.shared.inner.lock().unwrap();

        match inner.buf.dequeue() {
            Some(value) => {
                self.shared.writable.notify_one();
                Ok(value)
            }
            None if inner.closed => Err(ChannelError::Closed),
            None => Err(ChannelError::Empty),
        }
    }

    pub fn len(&self) -> usize {
        self.shared.inner.lock().unwrap().buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shared.inner.lock().unwrap().buf.capacity()
    }

    /// True once the sender is gone. Buffered values may still be pending.
    pub fn is_closed(&self) -> bool {
        self.shared.inner.lock().unwrap().closed
    }

    /// Number of values replaced before ever being consumed.
    pub fn num_lagged(&self) -> usize {
        self.shared.inner.lock().unwrap().lagged
    }
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        self.shared.close();
    }
}
