//! Outbound request targets
//!
//! Every operation the client performs maps to one `GET` against the
//! server's DACP port. The builders here are pure: they only format paths
//! and query strings.

use std::fmt;

use super::commands::{CTRL_INT_PREFIX, DacpCommand};
use crate::error::RemoteError;
use crate::protocol::pairing::PairingCredential;

/// Highest rating and volume value the server accepts
pub const MAX_PERCENT: u8 = 100;

/// Revision that makes the server answer a status poll immediately
pub const REFRESH_REVISION: u32 = 1;

/// Fully resolved request: server address plus path and query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget {
    host: String,
    port: u16,
    path_and_query: String,
    long_poll: bool,
}

impl RequestTarget {
    /// Server host name or address
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Server port
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Path plus query, as sent on the request line
    #[must_use]
    pub fn path_and_query(&self) -> &str {
        &self.path_and_query
    }

    /// Path without the query
    #[must_use]
    pub fn path(&self) -> &str {
        self.path_and_query
            .split_once('?')
            .map_or(self.path_and_query.as_str(), |(path, _)| path)
    }

    /// Whether the server may hold this request open until state changes
    #[must_use]
    pub fn is_long_poll(&self) -> bool {
        self.long_poll
    }

    /// Absolute `http://` URL
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, self.path_and_query)
    }
}

impl fmt::Display for RequestTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

/// Fields a search predicate can match on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    /// `dmap.itemname`
    Title,
    /// `daap.songartist`
    Artist,
    /// `daap.songalbum`
    Album,
    /// `daap.songgenre`
    Genre,
}

impl SearchField {
    /// Dotted field name used in query predicates
    #[must_use]
    pub fn field_name(self) -> &'static str {
        match self {
            Self::Title => "dmap.itemname",
            Self::Artist => "daap.songartist",
            Self::Album => "daap.songalbum",
            Self::Genre => "daap.songgenre",
        }
    }
}

/// One `('field:value')` term of a search query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPredicate {
    field: SearchField,
    value: String,
    contains: bool,
}

impl SearchPredicate {
    /// Match the field exactly
    #[must_use]
    pub fn equals(field: SearchField, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
            contains: false,
        }
    }

    /// Match the value anywhere in the field
    #[must_use]
    pub fn contains(field: SearchField, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
            contains: true,
        }
    }

    /// Render as a query term, escaping the value
    #[must_use]
    pub fn render(&self) -> String {
        let value = escape_query_value(&self.value);
        if self.contains {
            format!("('{}:*{value}*')", self.field.field_name())
        } else {
            format!("('{}:{value}')", self.field.field_name())
        }
    }
}

/// Join predicates into one conjunctive query
///
/// The server's grammar uses a literal `+` for AND.
#[must_use]
pub fn render_query(predicates: &[SearchPredicate]) -> String {
    predicates
        .iter()
        .map(SearchPredicate::render)
        .collect::<Vec<_>>()
        .join("+")
}

/// Percent-encode a value for use inside a quoted query term
///
/// Form encoding turns spaces into `+`, which the query grammar reads as
/// AND, so they become `%20`. Apostrophes delimit terms and must reach the
/// server backslash-escaped. The substitutions run in that order.
///
/// The result keeps a raw `'` in the target. The HTTP client's URL parser
/// percent-encodes it in the query, so an escaped apostrophe goes out as
/// `%5C%27` and the term delimiters as `%27`; the server decodes both.
#[must_use]
pub fn escape_query_value(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
        .replace("%27", "%5C'")
}

/// Builds request targets for one server
#[derive(Debug, Clone)]
pub struct RequestEncoder {
    host: String,
    port: u16,
}

impl RequestEncoder {
    /// Encoder for the server at `host:port`
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Server host
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Server port
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    fn target(&self, path_and_query: String) -> RequestTarget {
        RequestTarget {
            host: self.host.clone(),
            port: self.port,
            path_and_query,
            long_poll: false,
        }
    }

    /// `/server-info`
    #[must_use]
    pub fn server_info(&self) -> RequestTarget {
        self.target("/server-info".to_string())
    }

    /// `/login` with a pairing credential
    #[must_use]
    pub fn login(&self, credential: PairingCredential) -> RequestTarget {
        self.target(format!("/login?pairing-guid={}", credential.to_guid()))
    }

    /// `/logout`
    #[must_use]
    pub fn logout(&self, session_id: &str) -> RequestTarget {
        self.target(format!("/logout?session-id={session_id}"))
    }

    /// `/databases`, used to find the main library
    #[must_use]
    pub fn databases(&self, session_id: &str) -> RequestTarget {
        self.target(format!("/databases?session-id={session_id}"))
    }

    /// Long-poll play status at `revision`
    #[must_use]
    pub fn play_status(&self, revision: u32, session_id: &str) -> RequestTarget {
        let mut target = self.status_target(revision, session_id);
        target.long_poll = true;
        target
    }

    /// Immediate play status with ordinary timeouts
    #[must_use]
    pub fn play_status_refresh(&self, session_id: &str) -> RequestTarget {
        self.status_target(REFRESH_REVISION, session_id)
    }

    fn status_target(&self, revision: u32, session_id: &str) -> RequestTarget {
        self.target(format!(
            "{CTRL_INT_PREFIX}playstatusupdate?revision-number={revision}&session-id={session_id}"
        ))
    }

    /// Transport command
    #[must_use]
    pub fn command(&self, command: DacpCommand, session_id: &str) -> RequestTarget {
        self.target(format!("{}?session-id={session_id}", command.path()))
    }

    /// Set the rating (0..=100) of an item
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::InvalidRequest` if `rating` exceeds 100.
    pub fn set_rating(
        &self,
        rating: u8,
        database_persistent_id: u64,
        item_id: u64,
        session_id: &str,
    ) -> Result<RequestTarget, RemoteError> {
        check_percent("rating", rating)?;
        Ok(self.target(format!(
            "{CTRL_INT_PREFIX}setproperty?dacp.userrating={rating}\
             &database-spec='dmap.persistentid:0x{database_persistent_id:X}'\
             &item-spec='dmap.itemid:0x{item_id:X}'&session-id={session_id}"
        )))
    }

    /// Metadata of one item
    #[must_use]
    pub fn item_metadata(
        &self,
        database_id: u64,
        item_id: u64,
        meta: &[&str],
        session_id: &str,
    ) -> RequestTarget {
        self.items(
            database_id,
            meta,
            &format!("'dmap.itemid:{item_id}'"),
            session_id,
        )
    }

    /// Items matching every predicate
    #[must_use]
    pub fn search(
        &self,
        database_id: u64,
        predicates: &[SearchPredicate],
        meta: &[&str],
        session_id: &str,
    ) -> RequestTarget {
        self.items(database_id, meta, &render_query(predicates), session_id)
    }

    fn items(&self, database_id: u64, meta: &[&str], query: &str, session_id: &str) -> RequestTarget {
        self.target(format!(
            "/databases/{database_id}/items?session-id={session_id}&meta={}&type=music&query={query}",
            meta.join(",")
        ))
    }

    /// Current volume
    #[must_use]
    pub fn volume(&self, session_id: &str) -> RequestTarget {
        self.target(format!(
            "{CTRL_INT_PREFIX}getproperty?properties=dmcp.volume&session-id={session_id}"
        ))
    }

    /// Set volume (0..=100)
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::InvalidRequest` if `level` exceeds 100.
    pub fn set_volume(&self, level: u8, session_id: &str) -> Result<RequestTarget, RemoteError> {
        check_percent("volume", level)?;
        Ok(self.target(format!(
            "{CTRL_INT_PREFIX}setproperty?dmcp.volume={level}&session-id={session_id}"
        )))
    }

    /// Artwork of the playing item, scaled to fit `width` x `height`
    #[must_use]
    pub fn now_playing_artwork(&self, width: u32, height: u32, session_id: &str) -> RequestTarget {
        self.target(format!(
            "{CTRL_INT_PREFIX}nowplayingartwork?mw={width}&mh={height}&session-id={session_id}"
        ))
    }
}

fn check_percent(name: &str, value: u8) -> Result<(), RemoteError> {
    if value > MAX_PERCENT {
        return Err(RemoteError::InvalidRequest {
            name: name.to_string(),
            message: format!("{value} is outside 0..={MAX_PERCENT}"),
        });
    }
    Ok(())
}
