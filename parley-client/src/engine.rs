//! Engine - the main interface for parley.
//!
//! This module provides [`Engine`], which composes the directory, the
//! conversation book, the relay supervisor, and persistence behind one
//! object the presentation layer talks to.
//!
//! # Architecture
//!
//! ```text
//! Relay ─► Supervisor ─► Dispatcher ─► Model (Mutex) ─► change hook ─► UI
//!   ▲                                     │
//!   └──────────── Engine::send ◄──────────┘
//! ```
//!
//! All shared state lives in one [`Model`] behind a single lock. The lock is
//! never held across an `.await`, and hooks run after it is released with a
//! snapshot of the conversation that changed.
//!
//! # Example
//!
//! ```ignore
//! use parley_client::{Engine, EngineConfig, MockRelay, NoopNotifier};
//!
//! let config = EngineConfig::new("+15550000000");
//! let engine = Engine::open(config, MockRelay::new(), &listing, Arc::new(NoopNotifier)).await;
//! engine.on_change(|conv| println!("{} changed", conv.contact()));
//! engine.receive_forever().await;
//! engine.send(&"+15550001111".into(), "hi").await?;
//! engine.quit().await;
//! ```

use std::error::Error as StdError;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use parley_core::{
    Contact, Conversation, Directory, Dispatcher, EventKind, Message, Model, ObserverError,
};
use parley_types::{now_millis, ContactId, Envelope, Timestamp, UserData, WireError};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::notify::{Notification, Notifier};
use crate::persist::ConversationStore;
use crate::relay::{normalize_number, Relay, RelayError};
use crate::supervisor::{Supervisor, SupervisorError};
use crate::EngineConfig;

/// Called with a snapshot of every conversation that changed.
pub type ChangeHook = Arc<dyn Fn(&Conversation) + Send + Sync>;

/// Called with errors raised while receiving in the background.
pub type ErrorHook = Arc<dyn Fn(&(dyn StdError + 'static)) + Send + Sync>;

/// Engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The relay refused to send. The conversation keeps a failed-message
    /// entry.
    #[error("failed to send to {contact}: {source}")]
    Send {
        /// Intended recipient.
        contact: ContactId,
        /// Relay error.
        #[source]
        source: RelayError,
    },

    /// A relay invocation failed.
    #[error(transparent)]
    Relay(#[from] RelayError),

    /// Receiving stopped early.
    #[error(transparent)]
    Receive(#[from] SupervisorError),

    /// The account listing could not be read.
    #[error("account listing {path}: {source}")]
    ListingIo {
        /// Listing file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The account listing could not be parsed.
    #[error("invalid account listing: {0}")]
    Listing(#[from] WireError),
}

/// Read the relay's account listing from disk.
pub async fn load_listing(path: &Path) -> Result<UserData, EngineError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| EngineError::ListingIo {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(UserData::from_json(&bytes)?)
}

/// State shared between the engine and the dispatcher's observers.
struct Shared {
    config: EngineConfig,
    model: Mutex<Model>,
    on_change: RwLock<Option<ChangeHook>>,
    on_error: RwLock<Option<ErrorHook>>,
    notifier: Arc<dyn Notifier>,
}

impl Shared {
    fn model(&self) -> MutexGuard<'_, Model> {
        self.model.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn changed(&self, conversation: &Conversation) {
        let hook = self
            .on_change
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(hook) = hook {
            hook(conversation);
        }
    }

    fn error(&self, error: &(dyn StdError + 'static)) {
        let hook = self
            .on_error
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(hook) = hook {
            hook(error);
        }
    }

    fn on_sent(&self, envelope: &Envelope) -> Result<(), ObserverError> {
        let snapshot = {
            let mut model = self.model();
            let Some(arrival) = model.apply_sent(envelope) else {
                debug!("sent echo without destination");
                return Ok(());
            };
            debug!(conversation = %arrival.conversation, timestamp = arrival.timestamp, "sent echo");
            model.book.get(&arrival.conversation).cloned()
        };
        if let Some(conversation) = snapshot {
            self.changed(&conversation);
        }
        Ok(())
    }

    fn on_received(&self, envelope: &Envelope) -> Result<(), ObserverError> {
        let (snapshot, notification) = {
            let mut model = self.model();
            let Some(arrival) = model.apply_received(envelope) else {
                debug!("inbound message without source");
                return Ok(());
            };
            debug!(
                conversation = %arrival.conversation,
                timestamp = arrival.timestamp,
                inserted = arrival.inserted,
                "message received"
            );

            let notification = match (&arrival.sender, arrival.inserted) {
                (Some(sender), true) => {
                    let mut title = model.display_name(&arrival.conversation);
                    if arrival.is_group {
                        title = format!("{} in {}", model.display_name(sender), title);
                    }
                    let text = envelope
                        .data_message
                        .as_ref()
                        .map(|d| d.text())
                        .unwrap_or_default();
                    Notification::prepare(&self.config, title, sender, text)
                }
                _ => None,
            };
            (model.book.get(&arrival.conversation).cloned(), notification)
        };

        if let Some(conversation) = snapshot {
            self.changed(&conversation);
        }
        if let Some(notification) = notification {
            self.notify(notification);
        }
        Ok(())
    }

    fn on_receipt(&self, envelope: &Envelope) -> Result<(), ObserverError> {
        let snapshot = {
            let mut model = self.model();
            let Some(outcome) = model.apply_receipt(envelope) else {
                return Ok(());
            };
            for timestamp in &outcome.missing {
                warn!(
                    contact = %outcome.conversation,
                    timestamp,
                    "receipt for unknown message"
                );
            }
            model.book.get(&outcome.conversation).cloned()
        };
        if let Some(conversation) = snapshot {
            self.changed(&conversation);
        }
        Ok(())
    }

    fn notify(&self, notification: Notification) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("no runtime, dropping notification");
            return;
        };
        let notifier = self.notifier.clone();
        runtime.spawn(async move {
            notifier.notify(notification.resolve_avatar().await).await;
        });
    }
}

/// The synchronization engine.
///
/// Generic over the relay to allow mock injection for testing.
pub struct Engine<R: Relay + 'static> {
    shared: Arc<Shared>,
    relay: Arc<R>,
    supervisor: Arc<Supervisor<R>>,
    store: Option<ConversationStore>,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl<R: Relay + 'static> Engine<R> {
    /// Build the engine from the account listing and, when enabled, the
    /// saved conversations.
    ///
    /// Conversations that fail to load start empty. Nothing talks to the
    /// relay until `receive()`, `receive_forever()`, or `send()`.
    pub async fn open(
        config: EngineConfig,
        relay: R,
        listing: &UserData,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let directory = Directory::from_listing(listing, &config.directory_options());
        let mut model = Model::new(directory);

        let store = config
            .save_messages
            .then(|| ConversationStore::new(&config.conversation_dir));
        if let Some(store) = &store {
            let ids: Vec<ContactId> = model.directory.iter().map(|c| c.id.clone()).collect();
            for id in ids {
                match store.load(&id).await {
                    Ok(messages) if messages.is_empty() => {}
                    Ok(messages) => model.restore(&id, messages),
                    Err(e) => warn!(contact = %id, error = %e, "starting conversation empty"),
                }
            }
        }
        info!(
            contacts = model.directory.len(),
            conversations = model.book.len(),
            "engine ready"
        );

        let relay = Arc::new(relay);
        let cooldown = config.restart_cooldown;
        let shared = Arc::new(Shared {
            config,
            model: Mutex::new(model),
            on_change: RwLock::new(None),
            on_error: RwLock::new(None),
            notifier,
        });

        let mut dispatcher = Dispatcher::new();
        let s = shared.clone();
        dispatcher.on(EventKind::Sent, move |env| s.on_sent(env));
        let s = shared.clone();
        dispatcher.on(EventKind::Received, move |env| s.on_received(env));
        let s = shared.clone();
        dispatcher.on(EventKind::GroupReceived, move |env| s.on_received(env));
        let s = shared.clone();
        dispatcher.on(EventKind::Receipt, move |env| s.on_receipt(env));
        let s = shared.clone();
        dispatcher.on_error(move |e| s.error(e));

        let supervisor = Arc::new(Supervisor::new(
            relay.clone(),
            Arc::new(dispatcher),
            cooldown,
        ));

        Self {
            shared,
            relay,
            supervisor,
            store,
            task: tokio::sync::Mutex::new(None),
        }
    }

    /// Set the change hook, replacing any previous one.
    ///
    /// Runs on whichever task made the change.
    pub fn on_change<F>(&self, hook: F)
    where
        F: Fn(&Conversation) + Send + Sync + 'static,
    {
        *self
            .shared
            .on_change
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(hook));
    }

    /// Set the hook for errors raised while receiving in the background.
    pub fn on_error<F>(&self, hook: F)
    where
        F: Fn(&(dyn StdError + 'static)) + Send + Sync + 'static,
    {
        *self
            .shared
            .on_error
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(hook));
    }

    /// Send `text` to `contact` with any staged attachments.
    ///
    /// Peer numbers are stored under their `+`-prefixed form. On failure the
    /// message is still stored, with a visible failure marker, the staged
    /// files go back on the queue, and the error is returned. On success it
    /// is stored under the relay's timestamp and the draft is cleared.
    /// Files staged while the send is in flight stay queued either way.
    pub async fn send(&self, contact: &ContactId, text: &str) -> Result<Timestamp, EngineError> {
        let (contact, is_group, staged) = {
            let mut model = self.shared.model();
            let is_group = model.directory.get(contact).is_some_and(|c| c.is_group);
            let contact = if is_group {
                contact.clone()
            } else {
                ContactId::new(normalize_number(contact.as_str()))
            };
            model.directory.resolve(&contact);
            let staged = model.book.entry(&contact).take_staged_attachments();
            (contact, is_group, staged)
        };

        let mut message = Message::outgoing(now_millis(), text);
        let result = if is_group {
            self.relay.send_group(contact.as_str(), text, &staged).await
        } else {
            self.relay.send(contact.as_str(), text, &staged).await
        };

        let timestamp = match result {
            Ok(timestamp) => timestamp,
            Err(source) => {
                warn!(contact = %contact, error = %source, "send failed");
                message.mark_failed(&source);
                let snapshot = {
                    let mut model = self.shared.model();
                    let conversation = model.book.entry(&contact);
                    conversation.restage_attachments(staged);
                    conversation.upsert(message);
                    conversation.clone()
                };
                self.shared.changed(&snapshot);
                return Err(EngineError::Send { contact, source });
            }
        };

        let mut sized = Vec::with_capacity(staged.len());
        for path in staged {
            let size = tokio::fs::metadata(&path)
                .await
                .map(|m| m.len())
                .unwrap_or(0);
            sized.push((path, size));
        }
        message.timestamp = timestamp;
        message.add_staged_attachments(&sized);

        let snapshot = {
            let mut model = self.shared.model();
            let conversation = model.book.entry(&contact);
            conversation.caught_up();
            conversation.clear_draft();
            conversation.upsert(message);
            conversation.clone()
        };
        debug!(contact = %contact, timestamp, "sent");
        self.shared.changed(&snapshot);
        Ok(timestamp)
    }

    /// Queue a file for the next message to `contact`.
    pub fn add_attachment(&self, contact: &ContactId, path: impl Into<PathBuf>) {
        self.shared
            .model()
            .book
            .entry(contact)
            .stage_attachment(path);
    }

    /// Replace the draft for `contact`.
    pub fn set_draft(&self, contact: &ContactId, text: impl Into<String>) {
        self.shared.model().book.entry(contact).set_draft(text);
    }

    /// Drop the draft and queued files for `contact`.
    pub fn clear_staged(&self, contact: &ContactId) {
        if let Some(conversation) = self.shared.model().book.get_mut(contact) {
            conversation.clear_staged();
        }
    }

    /// Mark `contact`'s trailing unread messages as read.
    pub fn caught_up(&self, contact: &ContactId) {
        if let Some(conversation) = self.shared.model().book.get_mut(contact) {
            conversation.caught_up();
        }
    }

    /// Fetch and apply outstanding envelopes once. Returns the number of
    /// lines the relay produced.
    pub async fn receive(&self) -> Result<usize, EngineError> {
        let lines = self.relay.receive().await?;
        for line in &lines {
            self.supervisor
                .process_line(line)
                .map_err(SupervisorError::from)?;
        }
        debug!(count = lines.len(), "received");
        Ok(lines.len())
    }

    /// Run the relay daemon in the background, restarting it whenever it
    /// stops. Does nothing if it is already running.
    pub async fn receive_forever(&self) {
        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }
        let supervisor = self.supervisor.clone();
        *task = Some(tokio::spawn(async move { supervisor.forever().await }));
        info!("background receive started");
    }

    /// Interrupt the running daemon. Under `receive_forever()` it restarts
    /// after the cooldown.
    pub async fn close(&self) -> Result<(), EngineError> {
        Ok(self.supervisor.close().await?)
    }

    /// Save dirty conversations, stop the supervisor, and wait for it.
    pub async fn quit(&self) {
        let saved = self.flush().await;
        if self.store.is_some() {
            let unsaved = self.shared.model().book.dirty().count();
            if unsaved > 0 {
                warn!(unsaved, "conversations left unsaved");
            }
        }
        self.supervisor.stop();
        if let Err(e) = self.supervisor.close().await {
            warn!(error = %e, "failed to interrupt relay");
        }
        let task = self.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "supervisor task ended abnormally");
            }
        }
        info!(saved, "engine stopped");
    }

    /// Save every dirty conversation. Returns how many were saved.
    ///
    /// Conversations are marked clean when they are copied out, so changes
    /// that arrive during the save keep them dirty. Failed saves are logged
    /// and the conversation is marked dirty again.
    pub async fn flush(&self) -> usize {
        let Some(store) = &self.store else {
            return 0;
        };
        let dirty = self.shared.model().book.take_dirty();

        let mut saved = 0;
        for conversation in dirty {
            match store.save(&conversation).await {
                Ok(()) => saved += 1,
                Err(e) => {
                    error!(contact = %conversation.contact(), error = %e, "failed to save conversation");
                    if let Some(c) = self.shared.model().book.get_mut(conversation.contact()) {
                        c.mark_dirty();
                    }
                }
            }
        }
        saved
    }

    /// All contacts, by inbox position.
    pub fn contacts(&self) -> Vec<Contact> {
        self.shared
            .model()
            .directory
            .sorted_by_index()
            .into_iter()
            .cloned()
            .collect()
    }

    /// One contact by identifier.
    pub fn contact(&self, id: &ContactId) -> Option<Contact> {
        self.shared.model().directory.get(id).cloned()
    }

    /// Find a contact by identifier, alias, or name.
    pub fn find_contact(&self, query: &str) -> Option<Contact> {
        let model = self.shared.model();
        if let Some(contact) = model.directory.get(&ContactId::new(query)) {
            return Some(contact.clone());
        }
        let found = model
            .directory
            .iter()
            .find(|c| c.alias.as_deref() == Some(query))
            .or_else(|| model.directory.find_by_name(query))
            .cloned();
        found
    }

    /// Snapshot of every conversation.
    pub fn conversations(&self) -> Vec<Conversation> {
        self.shared.model().book.iter().cloned().collect()
    }

    /// Snapshot of one conversation.
    pub fn conversation(&self, id: &ContactId) -> Option<Conversation> {
        self.shared.model().book.get(id).cloned()
    }

    /// The configuration the engine was opened with.
    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// The relay.
    pub fn relay(&self) -> &Arc<R> {
        &self.relay
    }
}
