//! A `Tx`/`Rx` wrapper unifying bounded and unbounded `tokio::sync::mpsc`
//! channels behind one type, so the writer's input channel (C9) can switch
//! between the two without the worker loop caring which it got.

use tokio::sync::mpsc::{Receiver, Sender, UnboundedReceiver, UnboundedSender, error::SendError};

enum TxInner<T> {
    Bounded(Sender<T>),
    Unbounded(UnboundedSender<T>),
}

enum RxInner<T> {
    Bounded(Receiver<T>),
    Unbounded(UnboundedReceiver<T>),
}

impl<T> Clone for TxInner<T> {
    fn clone(&self) -> Self {
        match self {
            TxInner::Bounded(s) => TxInner::Bounded(s.clone()),
            TxInner::Unbounded(s) => TxInner::Unbounded(s.clone()),
        }
    }
}

pub struct Tx<T>(TxInner<T>);

impl<T: Send + 'static> Tx<T> {
    /// Send a value. Bounded channels wait for capacity; unbounded never wait.
    pub async fn send(&self, value: T) -> Result<(), SendError<T>> {
        match &self.0 {
            TxInner::Bounded(s) => s.send(value).await.map_err(|e| SendError(e.0)),
            TxInner::Unbounded(s) => s.send(value).map_err(|e| SendError(e.0)),
        }
    }
}

impl<T> Clone for Tx<T> {
    fn clone(&self) -> Self {
        Tx(self.0.clone())
    }
}

pub struct Rx<T>(RxInner<T>);

impl<T: Send + 'static> Rx<T> {
    /// Receive the next value. Returns `None` once the channel is closed
    /// and drained — the writer's shutdown signal.
    pub async fn recv(&mut self) -> Option<T> {
        match &mut self.0 {
            RxInner::Bounded(r) => r.recv().await,
            RxInner::Unbounded(r) => r.recv().await,
        }
    }
}

/// Unbounded writer channel — the default, matching the source behavior.
#[must_use]
pub fn unbounded<T>() -> (Tx<T>, Rx<T>) {
    let (s, r) = tokio::sync::mpsc::unbounded_channel();
    (Tx(TxInner::Unbounded(s)), Rx(RxInner::Unbounded(r)))
}

/// Bounded writer channel. Callers should size `cap >= BATCH_SIZE * 2` to
/// avoid head-of-line blocking at flush time (§5).
#[must_use]
pub fn bounded<T>(cap: usize) -> (Tx<T>, Rx<T>) {
    let (s, r) = tokio::sync::mpsc::channel(cap);
    (Tx(TxInner::Bounded(s)), Rx(RxInner::Bounded(r)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unbounded_roundtrips_values_in_order() {
        let (tx, mut rx) = unbounded::<u32>();
        tx.send(1).await.unwrap();
        tx.send(2).await.unwrap();
        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(2));
    }

    #[tokio::test]
    async fn closing_all_senders_yields_none() {
        let (tx, mut rx) = bounded::<u32>(4);
        drop(tx);
        assert_eq!(rx.recv().await, None);
    }
}
