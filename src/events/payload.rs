//! # Payloads, values, and the opaque scene carrier.
//!
//! A [`Payload`] is an ordered, immutable mapping from string keys to
//! [`Value`]s. It travels inside every [`Event`](crate::Event) and is shared
//! between cells during fan-out, so the map lives behind an `Arc` and is
//! never mutated: [`Payload::apply`] returns a new payload with overrides.
//!
//! Two keys are reserved by convention:
//! - [`DEFAULT_KEY`] holds the seed value of a payload built from a scalar;
//! - [`RESPONSE_KEY`] carries the one-shot [`ReplySender`] of a request.
//!
//! ## Rules
//! - A payload is safe to read from any task without synchronization.
//! - `apply` never mutates the receiver; overrides win on key collisions.
//! - The runtime never inspects a [`Scene`]; it is carried along verbatim.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::CellError;

/// Key under which a scalar seed value is stored.
pub const DEFAULT_KEY: &str = "default";

/// Reserved key carrying the reply channel of a request.
pub const RESPONSE_KEY: &str = "response";

/// What travels back over a reply channel.
pub type Reply = Result<Value, CellError>;

/// Sending half of a request's one-shot reply channel.
///
/// The responding behavior extracts this from the request payload (see
/// [`Payload::reply`]) and sends exactly one value. The channel has capacity
/// one; a second send fails with `QueueFull`, a send after the requester gave
/// up fails with `QueueStopped`.
#[derive(Clone)]
pub struct ReplySender {
    tx: mpsc::Sender<Reply>,
}

impl ReplySender {
    pub(crate) fn new(tx: mpsc::Sender<Reply>) -> Self {
        Self { tx }
    }

    /// Sends the reply value.
    pub fn send(&self, value: impl Into<Value>) -> Result<(), CellError> {
        self.deliver(Ok(value.into()))
    }

    /// Reports a failure to the requester, surfaced as the request's error.
    pub fn fail(&self, err: CellError) -> Result<(), CellError> {
        self.deliver(Err(err))
    }

    fn deliver(&self, reply: Reply) -> Result<(), CellError> {
        self.tx.try_send(reply).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => CellError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => CellError::QueueStopped,
        })
    }

    fn same_channel(&self, other: &ReplySender) -> bool {
        self.tx.same_channel(&other.tx)
    }
}

impl fmt::Debug for ReplySender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ReplySender")
    }
}

/// A single payload value.
///
/// Scalar variants cover the common cases; [`Value::Opaque`] carries anything
/// else by shared reference, and [`Value::Reply`] is the request/reply
/// channel.
#[derive(Clone)]
pub enum Value {
    /// No value.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point.
    Float(f64),
    /// UTF-8 text.
    Text(String),
    /// Reply channel of a request.
    Reply(ReplySender),
    /// Any other shared value.
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl Value {
    /// Wraps an arbitrary value as an opaque shared payload entry.
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Value::Opaque(Arc::new(value))
    }

    /// Returns the integer value, if this is an [`Value::Int`].
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the boolean value, if this is a [`Value::Bool`].
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the float value, if this is a [`Value::Float`].
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the text value, if this is a [`Value::Text`].
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the reply channel, if this is a [`Value::Reply`].
    pub fn as_reply(&self) -> Option<&ReplySender> {
        match self {
            Value::Reply(r) => Some(r),
            _ => None,
        }
    }

    /// Downcasts an opaque value to a concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Opaque(any) => any.downcast_ref(),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            // Channels and opaque values compare by identity.
            (Value::Reply(a), Value::Reply(b)) => a.same_channel(b),
            (Value::Opaque(a), Value::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(n) => write!(f, "Int({n})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Text(s) => write!(f, "Text({s:?})"),
            Value::Reply(_) => f.write_str("Reply"),
            Value::Opaque(_) => f.write_str("Opaque"),
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<ReplySender> for Value {
    fn from(r: ReplySender) -> Self {
        Value::Reply(r)
    }
}

/// Ordered, immutable key/value bag carried by events.
#[derive(Clone, Debug, PartialEq)]
pub struct Payload {
    values: Arc<BTreeMap<String, Value>>,
}

impl Payload {
    /// Creates a payload with a single entry under [`DEFAULT_KEY`].
    pub fn new(seed: impl Into<Value>) -> Self {
        let mut values = BTreeMap::new();
        values.insert(DEFAULT_KEY.to_string(), seed.into());
        Self {
            values: Arc::new(values),
        }
    }

    /// Creates a payload with no entries.
    pub fn empty() -> Self {
        Self {
            values: Arc::new(BTreeMap::new()),
        }
    }

    /// Creates a payload from key/value entries.
    pub fn from_entries<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let values = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            values: Arc::new(values),
        }
    }

    /// Returns a new payload with the given overrides applied.
    ///
    /// The result contains the union of both key sets; override values win.
    /// The receiver is unchanged.
    pub fn apply<K, V, I>(&self, overrides: I) -> Payload
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut values = (*self.values).clone();
        for (k, v) in overrides {
            values.insert(k.into(), v.into());
        }
        Payload {
            values: Arc::new(values),
        }
    }

    /// Looks up a value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns the value stored under [`DEFAULT_KEY`].
    pub fn default_value(&self) -> Option<&Value> {
        self.get(DEFAULT_KEY)
    }

    /// Extracts the reply channel of a request payload.
    pub fn reply(&self) -> Option<ReplySender> {
        match self.get(RESPONSE_KEY) {
            Some(Value::Reply(r)) => Some(r.clone()),
            _ => None,
        }
    }

    /// Iterates the keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if the payload has no entries.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::new(value)
    }
}

macro_rules! payload_from_scalar {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Payload {
            fn from(value: $ty) -> Self {
                Payload::new(Value::from(value))
            }
        })*
    };
}

payload_from_scalar!((), bool, i32, i64, f64, &str, String);

/// Opaque request-scope carrier.
///
/// The runtime moves a scene along with every event and never looks inside.
/// User code can stash a request context with [`Scene::new`] and read it back
/// with [`Scene::get`].
#[derive(Clone, Default)]
pub struct Scene {
    inner: Option<Arc<dyn Any + Send + Sync>>,
}

impl Scene {
    /// The empty scene.
    pub fn none() -> Self {
        Self::default()
    }

    /// Wraps a value as a scene.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Some(Arc::new(value)),
        }
    }

    /// True if no value is carried.
    pub fn is_none(&self) -> bool {
        self.inner.is_none()
    }

    /// Downcasts the carried value.
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.inner.as_deref().and_then(|v| v.downcast_ref())
    }
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner {
            Some(_) => f.write_str("Scene(..)"),
            None => f.write_str("Scene(none)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_wraps_seed_under_default_key() {
        let payload = Payload::new(7);
        assert_eq!(payload.default_value(), Some(&Value::Int(7)));
        assert_eq!(payload.len(), 1);
    }

    #[test]
    fn apply_is_copy_on_write() {
        let original = Payload::from_entries([("a", 1), ("b", 2)]);
        let derived = original.apply([("b", 20), ("c", 30)]);

        assert_eq!(original.get("b"), Some(&Value::Int(2)));
        assert!(original.get("c").is_none());
        assert_eq!(derived.get("a"), Some(&Value::Int(1)));
        assert_eq!(derived.get("b"), Some(&Value::Int(20)));
        assert_eq!(derived.get("c"), Some(&Value::Int(30)));
    }

    #[test]
    fn apply_nothing_preserves_content() {
        let original = Payload::from_entries([("a", 1)]);
        let derived = original.apply(std::iter::empty::<(String, Value)>());
        assert_eq!(original, derived);
    }

    #[test]
    fn keys_are_ordered() {
        let payload = Payload::from_entries([("b", 2), ("a", 1)]);
        let keys: Vec<&str> = payload.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn reply_round_trips_through_the_reserved_key() {
        let (tx, mut rx) = mpsc::channel(1);
        let sender = ReplySender::new(tx);
        let payload = Payload::new(7).apply([(RESPONSE_KEY, Value::Reply(sender))]);

        let reply = payload.reply().expect("reply channel present");
        reply.send(49).unwrap();
        assert_eq!(rx.try_recv().unwrap().unwrap(), Value::Int(49));
    }

    #[test]
    fn reply_channel_accepts_exactly_one_value() {
        let (tx, _rx) = mpsc::channel(1);
        let sender = ReplySender::new(tx);
        sender.send(1).unwrap();
        assert!(matches!(sender.send(2), Err(CellError::QueueFull)));
    }

    #[test]
    fn values_compare_by_content_and_channels_by_identity() {
        assert_eq!(Value::from("x"), Value::from("x"));
        assert_ne!(Value::from(1), Value::from(2));

        let (tx, _rx) = mpsc::channel(1);
        let a = ReplySender::new(tx);
        let b = a.clone();
        assert_eq!(Value::Reply(a), Value::Reply(b));

        let shared = Arc::new(5u8) as Arc<dyn Any + Send + Sync>;
        assert_eq!(Value::Opaque(shared.clone()), Value::Opaque(shared.clone()));
        assert_ne!(Value::Opaque(shared), Value::opaque(5u8));
    }

    #[test]
    fn scene_is_an_opaque_typed_carrier() {
        #[derive(Debug, PartialEq)]
        struct RequestContext {
            user: &'static str,
        }

        let scene = Scene::new(RequestContext { user: "ada" });
        assert_eq!(scene.get::<RequestContext>().unwrap().user, "ada");
        assert!(scene.get::<String>().is_none());
        assert!(Scene::none().is_none());
    }
}
