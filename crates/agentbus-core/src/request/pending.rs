//! Future side of a request posted through `EventBusExt::request`.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use agentbus_types::error::BusError;
use tokio::sync::oneshot;
use uuid::Uuid;

use super::event::ResponseEvent;

/// Resolves to the response of one request.
///
/// Yields `BusError::Abandoned` when every handle to the request is dropped
/// without a response being completed.
pub struct PendingResponse<Q, A> {
    request: Uuid,
    rx: oneshot::Receiver<ResponseEvent<Q, A>>,
}

impl<Q, A> PendingResponse<Q, A> {
    pub(crate) fn new(request: Uuid, rx: oneshot::Receiver<ResponseEvent<Q, A>>) -> Self {
        Self { request, rx }
    }

    pub fn request_id(&self) -> Uuid {
        self.request
    }

    /// Wait at most `timeout` for the response.
    pub async fn recv_timeout(self, timeout: Duration) -> Result<ResponseEvent<Q, A>, BusError> {
        tokio::time::timeout(timeout, self)
            .await
            .map_err(|_| BusError::Timeout(timeout))?
    }
}

impl<Q, A> Future for PendingResponse<Q, A> {
    type Output = Result<ResponseEvent<Q, A>, BusError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let request = this.request;
        Pin::new(&mut this.rx)
            .poll(cx)
            .map(|result| result.map_err(|_| BusError::Abandoned { request }))
    }
}

impl<Q, A> std::fmt::Debug for PendingResponse<Q, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingResponse")
            .field("request", &self.request)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::event::{Dispatcher, EventBus, EventBusExt, typed_listener};
    use crate::request::RequestEvent;

    type Echo = RequestEvent<String, String>;

    fn echo_bus() -> Arc<Dispatcher> {
        let bus = Dispatcher::default().shared();
        bus.register_for::<Echo>(typed_listener("echo", |req: &Echo| {
            req.respond("echo", req.payload().to_uppercase())
                .map_err(anyhow::Error::from)?;
            Ok(())
        }))
        .unwrap();
        bus
    }

    #[tokio::test]
    async fn request_resolves_to_response() {
        let bus = echo_bus();
        let request = Echo::new("asker", "hello".to_string());
        let id = request.id();

        let pending = bus.request(request).unwrap();
        assert_eq!(pending.request_id(), id);

        let response = pending.await.unwrap();
        assert_eq!(response.payload(), "HELLO");
        assert_eq!(response.request().id(), id);
        assert_eq!(bus.stats().deliveries, 1);
    }

    #[tokio::test]
    async fn request_through_dyn_bus() {
        let bus: Arc<dyn EventBus> = echo_bus();
        let response = bus
            .request(Echo::new("asker", "dyn".to_string()))
            .unwrap()
            .recv_timeout(Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(response.into_payload(), "DYN");
    }

    #[tokio::test]
    async fn unanswered_request_is_abandoned() {
        // No listener: the bus drops its handle after dispatch.
        let bus = Dispatcher::default();
        let pending = bus.request(Echo::new("asker", "nobody".to_string())).unwrap();
        let id = pending.request_id();

        let err = pending.await.unwrap_err();
        assert!(matches!(err, BusError::Abandoned { request } if request == id));
    }

    #[tokio::test]
    async fn held_request_times_out() {
        let bus = Dispatcher::default();
        let held: Arc<std::sync::Mutex<Vec<Echo>>> = Arc::default();
        let sink = Arc::clone(&held);
        bus.register_for::<Echo>(typed_listener("hoarder", move |req: &Echo| {
            sink.lock().unwrap().push(req.clone());
            Ok(())
        }))
        .unwrap();

        let pending = bus.request(Echo::new("asker", "later".to_string())).unwrap();
        let err = pending
            .recv_timeout(Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, BusError::Timeout(_)));
        assert_eq!(held.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn completed_request_cannot_be_requested_again() {
        let bus = echo_bus();
        let request = Echo::new("asker", "once".to_string());
        bus.request(request.clone()).unwrap().await.unwrap();

        let err = bus.request(request).unwrap_err();
        assert!(matches!(err, BusError::AlreadyCompleted { .. }));
    }
}
