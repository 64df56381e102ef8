use std::fmt;

use serde::{Deserialize, Serialize};

/// Transport assumed when an address carries no `transport:` prefix.
pub const DEFAULT_TRANSPORT: &str = "internal";

/// A single delivery destination: which transport carries it, and to whom.
///
/// Routes are immutable values. A route with neither field set is the
/// "no route" result of parsing an empty address; callers check
/// [`Route::is_valid`] rather than treating it as an error.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Route {
    transport: Option<String>,
    recipient: Option<String>,
}

impl Route {
    /// Create a route for an explicit transport and recipient.
    pub fn new(transport: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self {
            transport: Some(transport.into()),
            recipient: Some(recipient.into()),
        }
    }

    /// Create a route on the default `internal` transport.
    pub fn internal(recipient: impl Into<String>) -> Self {
        Self::new(DEFAULT_TRANSPORT, recipient)
    }

    /// The empty route produced by parsing an empty address.
    pub const fn none() -> Self {
        Self {
            transport: None,
            recipient: None,
        }
    }

    pub fn transport(&self) -> Option<&str> {
        self.transport.as_deref()
    }

    pub fn recipient(&self) -> Option<&str> {
        self.recipient.as_deref()
    }

    /// Returns `true` if both transport and recipient are present.
    pub fn is_valid(&self) -> bool {
        self.transport.is_some() && self.recipient.is_some()
    }

    /// Returns `true` if this route is handled by the internal transport,
    /// including routes whose transport was never set.
    pub fn is_internal(&self) -> bool {
        match self.transport.as_deref() {
            None => true,
            Some(t) => t == DEFAULT_TRANSPORT,
        }
    }

    /// Returns `true` if this route belongs to the given transport type.
    pub fn is_for(&self, transport: &str) -> bool {
        self.transport.as_deref() == Some(transport)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.transport, &self.recipient) {
            (Some(t), Some(r)) => write!(f, "{t}:{r}"),
            (Some(t), None) => write!(f, "{t}:"),
            (None, Some(r)) => write!(f, "{r}"),
            (None, None) => write!(f, "<none>"),
        }
    }
}

/// Parse a raw destination address into a [`Route`].
///
/// The address grammar is `<transport>:<recipient>` or a bare `<recipient>`,
/// split on the first colon. Parsing never fails:
///
/// - `"smtp:a@b.com"` becomes `smtp` / `a@b.com`
/// - `"johndoe"` becomes `internal` / `johndoe`
/// - `""` (or whitespace) becomes [`Route::none`]
///
/// An empty transport prefix (`":bob"`) falls back to `internal`; an empty
/// recipient (`"smtp:"`) leaves the recipient unset so the route is invalid.
///
/// ```
/// use fanout_types::{parse_address, Route};
///
/// assert_eq!(parse_address("smtp:a@b.com"), Route::new("smtp", "a@b.com"));
/// assert_eq!(parse_address("johndoe"), Route::internal("johndoe"));
/// assert!(!parse_address("").is_valid());
/// ```
pub fn parse_address(raw: &str) -> Route {
    let raw = raw.trim();
    if raw.is_empty() {
        return Route::none();
    }
    match raw.split_once(':') {
        Some((transport, recipient)) => {
            let transport = transport.trim();
            let recipient = recipient.trim();
            Route {
                transport: Some(if transport.is_empty() {
                    DEFAULT_TRANSPORT.to_string()
                } else {
                    transport.to_string()
                }),
                recipient: (!recipient.is_empty()).then(|| recipient.to_string()),
            }
        }
        None => Route::internal(raw),
    }
}
