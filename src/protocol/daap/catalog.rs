//! DMAP content-code catalog
//!
//! Every field on the wire is named by a four-byte content code. The catalog
//! maps those codes to a [`FieldDescriptor`] describing how the payload bytes
//! are interpreted. The built-in table is plain data: adding a field means
//! adding a row to [`BUILTIN_FIELDS`], the decoder itself never changes.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::LazyLock;

/// Four-byte DMAP content code (e.g. `mlit`, `cmst`)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentCode(pub [u8; 4]);

impl ContentCode {
    /// Create a code from its four ASCII bytes
    #[must_use]
    pub const fn new(code: &[u8; 4]) -> Self {
        Self(*code)
    }

    /// Raw bytes as sent on the wire
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for ContentCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ContentCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentCode({self})")
    }
}

impl From<[u8; 4]> for ContentCode {
    fn from(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }
}

/// How a field's payload is laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Container appearing at most once per scope
    List,
    /// Container that repeats inside its parent (e.g. `mlit`)
    MultiList,
    /// UTF-8 text
    String,
    /// Seconds since the Unix epoch, 32-bit
    Date,
    /// Unsigned 8-bit integer
    U8,
    /// Signed 8-bit integer
    I8,
    /// Unsigned 16-bit integer
    U16,
    /// Signed 16-bit integer
    I16,
    /// Unsigned 32-bit integer
    U32,
    /// Signed 32-bit integer
    I32,
    /// Unsigned 64-bit integer
    U64,
    /// Signed 64-bit integer
    I64,
    /// Single byte flag
    Boolean,
    /// Protocol version, two 16-bit halves
    Version,
    /// Field with its own packed layout
    Special,
}

impl ValueKind {
    /// Container kinds decode recursively
    #[must_use]
    pub fn is_nested(self) -> bool {
        matches!(self, Self::List | Self::MultiList)
    }

    /// Integer kinds decode as big-endian numbers sized by the wire length
    #[must_use]
    pub fn is_integer_family(self) -> bool {
        matches!(
            self,
            Self::U8
                | Self::I8
                | Self::U16
                | Self::I16
                | Self::U32
                | Self::I32
                | Self::U64
                | Self::I64
        )
    }

    /// Whether an integer kind is signed
    #[must_use]
    pub fn is_signed(self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }

    /// Natural byte width of fixed-size kinds
    #[must_use]
    pub fn natural_width(self) -> Option<usize> {
        match self {
            Self::U8 | Self::I8 | Self::Boolean => Some(1),
            Self::U16 | Self::I16 => Some(2),
            Self::U32 | Self::I32 | Self::Date | Self::Version => Some(4),
            Self::U64 | Self::I64 => Some(8),
            Self::List | Self::MultiList | Self::String | Self::Special => None,
        }
    }
}

/// Static description of one content code
#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    code: ContentCode,
    name: Option<&'static str>,
    kind: ValueKind,
}

impl FieldDescriptor {
    /// Descriptor with a dotted protocol name
    #[must_use]
    pub const fn named(code: &[u8; 4], name: &'static str, kind: ValueKind) -> Self {
        Self {
            code: ContentCode::new(code),
            name: Some(name),
            kind,
        }
    }

    /// Descriptor for a code the protocol defines but the client does not name
    #[must_use]
    pub const fn unnamed(code: &[u8; 4], kind: ValueKind) -> Self {
        Self {
            code: ContentCode::new(code),
            name: None,
            kind,
        }
    }

    /// Wire identifier
    #[must_use]
    pub fn code(&self) -> ContentCode {
        self.code
    }

    /// Dotted name such as `dmap.itemname`, if the field has one
    #[must_use]
    pub fn name(&self) -> Option<&'static str> {
        self.name
    }

    /// Payload layout
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Field holds UTF-8 text
    #[must_use]
    pub fn is_string(&self) -> bool {
        self.kind == ValueKind::String
    }

    /// Field is a container stored in the single-child slot
    #[must_use]
    pub fn is_nested_single(&self) -> bool {
        self.kind == ValueKind::List
    }

    /// Field is a container stored in the repeated-children slot
    #[must_use]
    pub fn is_nested_multi(&self) -> bool {
        self.kind == ValueKind::MultiList
    }

    /// Field holds an integer
    #[must_use]
    pub fn is_integer_family(&self) -> bool {
        self.kind.is_integer_family()
    }

    /// Field has a packed, field-specific layout
    #[must_use]
    pub fn is_special(&self) -> bool {
        self.kind == ValueKind::Special
    }

    /// Field lands in the leaf map of a tree
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        !self.kind.is_nested()
    }
}

impl fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name {
            Some(name) => write!(f, "{} ({name})", self.code),
            None => write!(f, "{}", self.code),
        }
    }
}

// Identity is the content code alone, so maps keyed by descriptor can be
// queried with a bare `ContentCode`.
impl PartialEq for FieldDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for FieldDescriptor {}

impl Hash for FieldDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.code.hash(state);
    }
}

impl std::borrow::Borrow<ContentCode> for FieldDescriptor {
    fn borrow(&self) -> &ContentCode {
        &self.code
    }
}

/// Catalog construction errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Two rows share a content code
    #[error("duplicate content code {code}: {first} and {second}")]
    DuplicateCode {
        /// The repeated code
        code: ContentCode,
        /// Name of the first row
        first: String,
        /// Name of the conflicting row
        second: String,
    },
}

/// Lookup table from content code to descriptor
#[derive(Debug, Clone)]
pub struct FieldCatalog {
    by_code: HashMap<ContentCode, FieldDescriptor>,
}

static BUILTIN: LazyLock<FieldCatalog> = LazyLock::new(|| {
    FieldCatalog::from_descriptors(BUILTIN_FIELDS)
        .unwrap_or_else(|e| panic!("built-in DMAP field table is invalid: {e}"))
});

impl FieldCatalog {
    /// Build a catalog from descriptor rows
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::DuplicateCode` if two rows share a content code.
    pub fn from_descriptors(rows: &[FieldDescriptor]) -> Result<Self, CatalogError> {
        let mut by_code = HashMap::with_capacity(rows.len());
        for row in rows {
            if let Some(existing) = by_code.insert(row.code, *row) {
                return Err(CatalogError::DuplicateCode {
                    code: row.code,
                    first: existing.to_string(),
                    second: row.to_string(),
                });
            }
        }
        Ok(Self { by_code })
    }

    /// Process-wide catalog built from [`BUILTIN_FIELDS`]
    #[must_use]
    pub fn builtin() -> &'static FieldCatalog {
        &BUILTIN
    }

    /// Find the descriptor for a content code
    #[must_use]
    pub fn lookup(&self, code: ContentCode) -> Option<&FieldDescriptor> {
        self.by_code.get(&code)
    }

    /// Find a descriptor by its dotted name
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_code.values().find(|d| d.name == Some(name))
    }

    /// Number of known codes
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    /// Whether the catalog has no rows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }

    /// Iterate over all descriptors
    pub fn iter(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.by_code.values()
    }
}

/// Content codes referenced by name elsewhere in the crate
pub mod codes {
    use super::ContentCode;

    /// `dmap.status`
    pub const MSTT: ContentCode = ContentCode::new(b"mstt");
    /// `dmap.loginresponse`
    pub const MLOG: ContentCode = ContentCode::new(b"mlog");
    /// `dmap.sessionid`
    pub const MLID: ContentCode = ContentCode::new(b"mlid");
    /// `dmap.serverinforesponse`
    pub const MSRV: ContentCode = ContentCode::new(b"msrv");
    /// `dmap.itemname`
    pub const MINM: ContentCode = ContentCode::new(b"minm");
    /// `dmap.itemid`
    pub const MIID: ContentCode = ContentCode::new(b"miid");
    /// `dmap.persistentid`
    pub const MPER: ContentCode = ContentCode::new(b"mper");
    /// `dmap.listing`
    pub const MLCL: ContentCode = ContentCode::new(b"mlcl");
    /// `dmap.listingitem`
    pub const MLIT: ContentCode = ContentCode::new(b"mlit");
    /// `dmap.returnedcount`
    pub const MRCO: ContentCode = ContentCode::new(b"mrco");
    /// `daap.serverdatabases`
    pub const AVDB: ContentCode = ContentCode::new(b"avdb");
    /// `daap.databasesongs`
    pub const ADBS: ContentCode = ContentCode::new(b"adbs");
    /// `daap.songartist`
    pub const ASAR: ContentCode = ContentCode::new(b"asar");
    /// `daap.songalbum`
    pub const ASAL: ContentCode = ContentCode::new(b"asal");
    /// `daap.songgenre`
    pub const ASGN: ContentCode = ContentCode::new(b"asgn");
    /// `daap.songalbumid`
    pub const ASAI: ContentCode = ContentCode::new(b"asai");
    /// `daap.songuserrating`
    pub const ASUR: ContentCode = ContentCode::new(b"asur");
    /// `daap.songtime`
    pub const ASTM: ContentCode = ContentCode::new(b"astm");
    /// `dmcp.playstatus`
    pub const CMST: ContentCode = ContentCode::new(b"cmst");
    /// `dmcp.serverrevision`
    pub const CMSR: ContentCode = ContentCode::new(b"cmsr");
    /// `dmcp.getpropertyresponse`
    pub const CMGT: ContentCode = ContentCode::new(b"cmgt");
    /// `dmcp.volume`
    pub const CMVO: ContentCode = ContentCode::new(b"cmvo");
    /// `dacp.playerstate`
    pub const CAPS: ContentCode = ContentCode::new(b"caps");
    /// `dacp.shufflestate`
    pub const CASH: ContentCode = ContentCode::new(b"cash");
    /// `dacp.repeatstate`
    pub const CARP: ContentCode = ContentCode::new(b"carp");
    /// `dacp.nowplaying`
    pub const CANP: ContentCode = ContentCode::new(b"canp");
    /// `dacp.nowplayingname`
    pub const CANN: ContentCode = ContentCode::new(b"cann");
    /// `dacp.nowplayingartist`
    pub const CANA: ContentCode = ContentCode::new(b"cana");
    /// `dacp.nowplayingalbum`
    pub const CANL: ContentCode = ContentCode::new(b"canl");
    /// `dacp.nowplayinggenre`
    pub const CANG: ContentCode = ContentCode::new(b"cang");
    /// `dacp.remainingtime`
    pub const CANT: ContentCode = ContentCode::new(b"cant");
    /// `dacp.tracklength`
    pub const CAST: ContentCode = ContentCode::new(b"cast");
    /// `dacp.pairinganswer`
    pub const CMPA: ContentCode = ContentCode::new(b"cmpa");
    /// `dacp.pairingguid`
    pub const CMPG: ContentCode = ContentCode::new(b"cmpg");
    /// `dacp.devicename`
    pub const CMNM: ContentCode = ContentCode::new(b"cmnm");
    /// `dacp.devicetype`
    pub const CMTY: ContentCode = ContentCode::new(b"cmty");
}

use ValueKind::{
    Boolean, Date, I32, List, MultiList, Special, String as Text, U8, U16, U32, U64, Version,
};

/// Built-in field table
pub const BUILTIN_FIELDS: &[FieldDescriptor] = &[
    // dmap containers
    FieldDescriptor::named(b"mlog", "dmap.loginresponse", List),
    FieldDescriptor::named(b"msrv", "dmap.serverinforesponse", List),
    FieldDescriptor::named(b"mccr", "dmap.contentcodesresponse", List),
    FieldDescriptor::named(b"mdcl", "dmap.dictionary", MultiList),
    FieldDescriptor::named(b"mlcl", "dmap.listing", List),
    FieldDescriptor::named(b"mlit", "dmap.listingitem", MultiList),
    FieldDescriptor::named(b"mupd", "dmap.updateresponse", List),
    FieldDescriptor::named(b"mshl", "dmap.sortingheaderlisting", List),
    // dmap scalars
    FieldDescriptor::named(b"mstt", "dmap.status", U32),
    FieldDescriptor::named(b"msts", "dmap.statusstring", Text),
    FieldDescriptor::named(b"mlid", "dmap.sessionid", U32),
    FieldDescriptor::named(b"miid", "dmap.itemid", U32),
    FieldDescriptor::named(b"minm", "dmap.itemname", Text),
    FieldDescriptor::named(b"mikd", "dmap.itemkind", U8),
    FieldDescriptor::named(b"mper", "dmap.persistentid", U64),
    FieldDescriptor::named(b"mpco", "dmap.parentcontainerid", U32),
    FieldDescriptor::named(b"mcti", "dmap.containeritemid", U32),
    FieldDescriptor::named(b"mimc", "dmap.itemcount", U32),
    FieldDescriptor::named(b"mctc", "dmap.containercount", U32),
    FieldDescriptor::named(b"mrco", "dmap.returnedcount", U32),
    FieldDescriptor::named(b"mtco", "dmap.specifiedtotalcount", U32),
    FieldDescriptor::named(b"muty", "dmap.updatetype", U8),
    FieldDescriptor::named(b"musr", "dmap.serverrevision", U32),
    FieldDescriptor::named(b"mcnm", "dmap.contentcodesnumber", U32),
    FieldDescriptor::named(b"mcna", "dmap.contentcodesname", Text),
    FieldDescriptor::named(b"mcty", "dmap.contentcodestype", U16),
    FieldDescriptor::named(b"mpro", "dmap.protocolversion", Version),
    FieldDescriptor::named(b"mslr", "dmap.loginrequired", Boolean),
    FieldDescriptor::named(b"mstm", "dmap.timeoutinterval", U32),
    FieldDescriptor::named(b"msal", "dmap.supportsautologout", Boolean),
    FieldDescriptor::named(b"msau", "dmap.authenticationmethod", U8),
    FieldDescriptor::named(b"mspi", "dmap.supportspersistentids", Boolean),
    FieldDescriptor::named(b"msqy", "dmap.supportsquery", Boolean),
    FieldDescriptor::named(b"msdc", "dmap.databasescount", U32),
    // daap containers
    FieldDescriptor::named(b"avdb", "daap.serverdatabases", List),
    FieldDescriptor::named(b"adbs", "daap.databasesongs", List),
    FieldDescriptor::named(b"aply", "daap.databaseplaylists", List),
    FieldDescriptor::named(b"apso", "daap.playlistsongs", List),
    FieldDescriptor::named(b"agal", "daap.albumgrouping", List),
    FieldDescriptor::named(b"abro", "daap.databasebrowse", List),
    FieldDescriptor::named(b"abar", "daap.browseartistlisting", List),
    // daap scalars
    FieldDescriptor::named(b"apro", "daap.protocolversion", Version),
    FieldDescriptor::named(b"abpl", "daap.baseplaylist", U8),
    FieldDescriptor::named(b"asal", "daap.songalbum", Text),
    FieldDescriptor::named(b"asaa", "daap.songalbumartist", Text),
    FieldDescriptor::named(b"asar", "daap.songartist", Text),
    FieldDescriptor::named(b"asgn", "daap.songgenre", Text),
    FieldDescriptor::named(b"ascm", "daap.songcomment", Text),
    FieldDescriptor::named(b"ascp", "daap.songcomposer", Text),
    FieldDescriptor::named(b"asfm", "daap.songformat", Text),
    FieldDescriptor::named(b"asul", "daap.songdataurl", Text),
    FieldDescriptor::named(b"asai", "daap.songalbumid", U64),
    FieldDescriptor::named(b"asri", "daap.songartistid", U64),
    FieldDescriptor::named(b"asur", "daap.songuserrating", U8),
    FieldDescriptor::named(b"astm", "daap.songtime", U32),
    FieldDescriptor::named(b"astn", "daap.songtracknumber", U16),
    FieldDescriptor::named(b"astc", "daap.songtrackcount", U16),
    FieldDescriptor::named(b"asdn", "daap.songdiscnumber", U16),
    FieldDescriptor::named(b"asyr", "daap.songyear", U16),
    FieldDescriptor::named(b"asbr", "daap.songbitrate", U16),
    FieldDescriptor::named(b"assr", "daap.songsamplerate", U32),
    FieldDescriptor::named(b"assz", "daap.songsize", U32),
    FieldDescriptor::named(b"asda", "daap.songdateadded", Date),
    FieldDescriptor::named(b"asdm", "daap.songdatemodified", Date),
    FieldDescriptor::named(b"aeSP", "com.apple.itunes.smart-playlist", U8),
    // dacp / dmcp
    FieldDescriptor::named(b"cmst", "dmcp.playstatus", List),
    FieldDescriptor::named(b"cmgt", "dmcp.getpropertyresponse", List),
    FieldDescriptor::named(b"casp", "dacp.speakers", List),
    FieldDescriptor::named(b"cmpa", "dacp.pairinganswer", List),
    FieldDescriptor::named(b"cmsr", "dmcp.serverrevision", U32),
    FieldDescriptor::named(b"cmvo", "dmcp.volume", U32),
    FieldDescriptor::named(b"cmmk", "dmcp.mediakind", U32),
    FieldDescriptor::named(b"caps", "dacp.playerstate", U8),
    FieldDescriptor::named(b"cash", "dacp.shufflestate", U8),
    FieldDescriptor::named(b"carp", "dacp.repeatstate", U8),
    FieldDescriptor::named(b"cavc", "dacp.volumecontrollable", Boolean),
    FieldDescriptor::named(b"caas", "dacp.albumshuffle", U32),
    FieldDescriptor::named(b"caar", "dacp.albumrepeat", U32),
    FieldDescriptor::named(b"cafs", "dacp.fullscreen", U8),
    FieldDescriptor::named(b"cavs", "dacp.visualizer", U8),
    FieldDescriptor::named(b"ceGS", "dacp.geniusselectable", U8),
    FieldDescriptor::named(b"canp", "dacp.nowplaying", Special),
    FieldDescriptor::named(b"cann", "dacp.nowplayingname", Text),
    FieldDescriptor::named(b"cana", "dacp.nowplayingartist", Text),
    FieldDescriptor::named(b"canl", "dacp.nowplayingalbum", Text),
    FieldDescriptor::named(b"cang", "dacp.nowplayinggenre", Text),
    FieldDescriptor::named(b"cant", "dacp.remainingtime", U32),
    FieldDescriptor::named(b"cast", "dacp.tracklength", U32),
    FieldDescriptor::named(b"cmpg", "dacp.pairingguid", U64),
    FieldDescriptor::named(b"cmnm", "dacp.devicename", Text),
    FieldDescriptor::named(b"cmty", "dacp.devicetype", Text),
    FieldDescriptor::named(b"caia", "dacp.isactive", Boolean),
    FieldDescriptor::named(b"msma", "dmap.speakermachineaddress", U64),
    FieldDescriptor::named(b"cmik", "dmcp.itemkind", U8),
    // Defined by the protocol, not interpreted by the client
    FieldDescriptor::unnamed(b"cafe", U8),
    FieldDescriptor::unnamed(b"cave", U8),
    FieldDescriptor::unnamed(b"cavd", U8),
    FieldDescriptor::unnamed(b"casu", U8),
    FieldDescriptor::unnamed(b"ceQu", U8),
    FieldDescriptor::unnamed(b"cmrl", U8),
    FieldDescriptor::unnamed(b"caks", U8),
    FieldDescriptor::unnamed(b"casc", U8),
    FieldDescriptor::unnamed(b"cmsv", U8),
    FieldDescriptor::unnamed(b"cmsp", U8),
    FieldDescriptor::unnamed(b"ceSD", Text),
    FieldDescriptor::unnamed(b"aeAI", U32),
    FieldDescriptor::unnamed(b"aeGs", U8),
    FieldDescriptor::unnamed(b"mscu", I32),
];
