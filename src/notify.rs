//! Instance-scoped listener registries and transient user notifications.
//!
//! [`Listeners`] backs both the session observers and the [`NotificationHub`]. Each registration
//! returns a [`Subscription`]; dropping it removes the listener, so a torn-down view never
//! receives a late event.

// std
use std::sync::Weak;
// self
use crate::_prelude::*;

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Slots<T> {
	next_id: u64,
	entries: BTreeMap<u64, Listener<T>>,
}

/// Ordered set of callbacks notified with a shared event value.
///
/// Clones share one registry.
pub struct Listeners<T> {
	slots: Arc<Mutex<Slots<T>>>,
}
impl<T> Listeners<T>
where
	T: 'static,
{
	/// Registers `listener`; it stays active until the returned guard is dropped.
	pub fn subscribe<F>(&self, listener: F) -> Subscription
	where
		F: 'static + Fn(&T) + Send + Sync,
	{
		let id = {
			let mut slots = self.slots.lock();
			let id = slots.next_id;

			slots.next_id += 1;
			slots.entries.insert(id, Arc::new(listener));

			id
		};
		let slots: Weak<Mutex<Slots<T>>> = Arc::downgrade(&self.slots);

		Subscription {
			cancel: Some(Box::new(move || {
				if let Some(slots) = slots.upgrade() {
					slots.lock().entries.remove(&id);
				}
			})),
		}
	}

	/// Calls every registered listener in registration order.
	///
	/// Listeners run outside the registry lock and may subscribe or unsubscribe freely.
	pub fn emit(&self, event: &T) {
		let snapshot = self.slots.lock().entries.values().cloned().collect::<Vec<_>>();

		for listener in snapshot {
			listener(event);
		}
	}

	/// Number of active listeners.
	pub fn len(&self) -> usize {
		self.slots.lock().entries.len()
	}

	/// Returns `true` when nobody is listening.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
impl<T> Clone for Listeners<T> {
	fn clone(&self) -> Self {
		Self { slots: self.slots.clone() }
	}
}
impl<T> Default for Listeners<T> {
	fn default() -> Self {
		Self { slots: Arc::new(Mutex::new(Slots { next_id: 0, entries: BTreeMap::new() })) }
	}
}
impl<T> Debug for Listeners<T> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Listeners").field("len", &self.slots.lock().entries.len()).finish()
	}
}

/// Registration guard returned by `subscribe`; dropping it unsubscribes.
#[must_use = "dropping a subscription unsubscribes immediately"]
pub struct Subscription {
	cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}
impl Subscription {
	/// Unsubscribes now.
	pub fn unsubscribe(mut self) {
		self.cancel();
	}

	fn cancel(&mut self) {
		if let Some(cancel) = self.cancel.take() {
			cancel();
		}
	}
}
impl Drop for Subscription {
	fn drop(&mut self) {
		self.cancel();
	}
}
impl Debug for Subscription {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Subscription").field("active", &self.cancel.is_some()).finish()
	}
}

/// Notification category, used for styling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
	/// Completed action.
	Success,
	/// Failed action.
	Error,
	/// Neutral information.
	Info,
}

/// Transient user-facing message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
	/// Short heading.
	pub title: String,
	/// Body text.
	pub message: String,
	/// Category.
	pub kind: NotificationKind,
	/// Creation time.
	#[serde(with = "time::serde::rfc3339")]
	pub issued_at: OffsetDateTime,
}
impl Notification {
	/// How long a notification stays on screen.
	pub const DISPLAY_TTL: Duration = Duration::seconds(5);

	/// Creates a notification stamped with the current time.
	pub fn new(
		kind: NotificationKind,
		title: impl Into<String>,
		message: impl Into<String>,
	) -> Self {
		Self {
			title: title.into(),
			message: message.into(),
			kind,
			issued_at: OffsetDateTime::now_utc(),
		}
	}

	/// Success notification.
	pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
		Self::new(NotificationKind::Success, title, message)
	}

	/// Error notification.
	pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
		Self::new(NotificationKind::Error, title, message)
	}

	/// Moment the notification should disappear.
	pub fn expires_at(&self) -> OffsetDateTime {
		self.issued_at + Self::DISPLAY_TTL
	}

	/// Returns `true` once the display lifetime elapsed at `now`.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		now >= self.expires_at()
	}
}

/// Sink for user-facing notifications.
pub trait Notifier
where
	Self: Send + Sync,
{
	/// Delivers `notification`.
	fn notify(&self, notification: Notification);
}

/// Notifier that drops everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotifier;
impl Notifier for NoopNotifier {
	fn notify(&self, _: Notification) {}
}

/// Fan-out notifier that also keeps the notifications still on screen.
#[derive(Debug, Default)]
pub struct NotificationHub {
	listeners: Listeners<Notification>,
	active: Mutex<Vec<Notification>>,
}
impl NotificationHub {
	/// Registers a listener for future notifications.
	pub fn subscribe<F>(&self, listener: F) -> Subscription
	where
		F: 'static + Fn(&Notification) + Send + Sync,
	{
		self.listeners.subscribe(listener)
	}

	/// Notifications whose display lifetime has not elapsed at `now`.
	pub fn active(&self, now: OffsetDateTime) -> Vec<Notification> {
		let mut active = self.active.lock();

		active.retain(|notification| !notification.is_expired_at(now));
		active.clone()
	}

	/// Removes every on-screen notification.
	pub fn dismiss_all(&self) {
		self.active.lock().clear();
	}
}
impl Notifier for NotificationHub {
	fn notify(&self, notification: Notification) {
		{
			let mut active = self.active.lock();
			let now = notification.issued_at;

			active.retain(|existing| !existing.is_expired_at(now));
			active.push(notification.clone());
		}

		self.listeners.emit(&notification);
	}
}
