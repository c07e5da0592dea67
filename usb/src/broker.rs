use crate::error::CommandError;
use crate::message::UsbMessage;
use log::{debug, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;

pub type Matcher = Box<dyn Fn(&UsbMessage) -> bool + Send + Sync>;

/// Matches any message whose body begins with `header`.
pub fn header(header: &[u8]) -> Matcher {
    let header = header.to_vec();
    Box::new(move |message| message.starts_with(&header))
}

struct Pending {
    id: u64,
    name: String,
    matcher: Matcher,
    sender: oneshot::Sender<UsbMessage>,
}

/// Pairs incoming messages with the requests waiting on them.
///
/// Pending requests are kept in registration order, and a message completes the first one
/// whose matcher accepts it.
#[derive(Default)]
pub struct MessageBroker {
    pending: Mutex<Vec<Pending>>,
    next_id: AtomicU64,
}

impl MessageBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Pending>> {
        // A poisoned list is still a valid list.
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn expect(self: &Arc<Self>, name: &str, matcher: Matcher) -> Expectation {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = oneshot::channel();

        debug!("Expecting {} ({})", name, id);
        self.lock().push(Pending {
            id,
            name: name.to_string(),
            matcher,
            sender,
        });

        Expectation {
            id,
            name: name.to_string(),
            receiver,
            broker: self.clone(),
        }
    }

    /// Hands the message to the first pending request that matches it, returning the message
    /// if nobody wanted it.
    pub fn deliver(&self, message: UsbMessage) -> Option<UsbMessage> {
        let mut message = message;
        let mut pending = self.lock();

        let mut index = 0;
        while index < pending.len() {
            if !(pending[index].matcher)(&message) {
                index += 1;
                continue;
            }

            let request = pending.remove(index);
            match request.sender.send(message) {
                Ok(()) => {
                    debug!("Delivered to {} ({})", request.name, request.id);
                    return None;
                }
                Err(returned) => {
                    // The waiter went away before it could unregister.
                    warn!("Dropping abandoned request {} ({})", request.name, request.id);
                    message = returned;
                }
            }
        }
        Some(message)
    }

    pub fn cancel(&self, id: u64) -> bool {
        let mut pending = self.lock();
        let before = pending.len();
        pending.retain(|p| p.id != id);
        before != pending.len()
    }

    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    pub fn pending_names(&self) -> Vec<String> {
        self.lock().iter().map(|p| p.name.clone()).collect()
    }

    /// Drops every pending request, waking their waiters with a closed error.
    pub fn clear(&self) {
        self.lock().clear();
    }
}

/// A registered wait for a message. Dropping it unregisters the wait.
pub struct Expectation {
    id: u64,
    name: String,
    receiver: oneshot::Receiver<UsbMessage>,
    broker: Arc<MessageBroker>,
}

impl Expectation {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn wait(mut self, timeout: Duration) -> Result<UsbMessage, CommandError> {
        match tokio::time::timeout(timeout, &mut self.receiver).await {
            Ok(Ok(message)) => Ok(message),
            Ok(Err(_)) => Err(CommandError::Closed(self.name.clone())),
            Err(_) => Err(CommandError::Timeout(self.name.clone())),
        }
    }

    /// Takes the message if it has already arrived.
    pub fn try_take(&mut self) -> Option<UsbMessage> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Expectation {
    fn drop(&mut self) {
        if self.broker.cancel(self.id) {
            debug!("Cancelled {} ({})", self.name, self.id);
        }
    }
}
