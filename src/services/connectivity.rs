use tokio::sync::watch;

/// Shared online/offline flag with change notifications.
///
/// Whoever knows about the network (a platform callback, a reachability
/// probe, a test) calls [`Connectivity::set_online`]; listeners use
/// [`Connectivity::subscribe`] and wait for changes.
#[derive(Clone)]
pub struct Connectivity {
    tx: watch::Sender<bool>,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Updates the flag; listeners are only woken if the value changed
    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            if online {
                log::info!("Connectivity restored");
            } else {
                log::info!("Connectivity lost");
            }
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(true)
    }
}
