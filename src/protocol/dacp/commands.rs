//! Transport commands under `/ctrl-int/1/`

use std::fmt;

/// Prefix shared by every control-interface path
pub const CTRL_INT_PREFIX: &str = "/ctrl-int/1/";

/// Transport command a remote can send
///
/// Each command is a bare `GET` on its path; the server answers 204 and the
/// effect shows up in the next play-status response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DacpCommand {
    /// `play`
    Play,
    /// `pause`
    Pause,
    /// `playpause`, toggles between the two
    PlayPause,
    /// `stop`
    Stop,
    /// `nextitem`
    NextItem,
    /// `previtem`
    PrevItem,
    /// `beginff`, held until [`PlayResume`](Self::PlayResume)
    BeginFastForward,
    /// `beginrew`, held until [`PlayResume`](Self::PlayResume)
    BeginRewind,
    /// `playresume`, ends seeking
    PlayResume,
}

/// Command name and full path, one row per variant in declaration order
static TABLE: [(DacpCommand, &str, &str); 9] = [
    (DacpCommand::Play, "play", "/ctrl-int/1/play"),
    (DacpCommand::Pause, "pause", "/ctrl-int/1/pause"),
    (DacpCommand::PlayPause, "playpause", "/ctrl-int/1/playpause"),
    (DacpCommand::Stop, "stop", "/ctrl-int/1/stop"),
    (DacpCommand::NextItem, "nextitem", "/ctrl-int/1/nextitem"),
    (DacpCommand::PrevItem, "previtem", "/ctrl-int/1/previtem"),
    (DacpCommand::BeginFastForward, "beginff", "/ctrl-int/1/beginff"),
    (DacpCommand::BeginRewind, "beginrew", "/ctrl-int/1/beginrew"),
    (DacpCommand::PlayResume, "playresume", "/ctrl-int/1/playresume"),
];

impl DacpCommand {
    /// Every command
    pub fn all() -> impl Iterator<Item = DacpCommand> {
        TABLE.iter().map(|(command, _, _)| *command)
    }

    /// Look up the command a request path names; the query string is ignored
    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.split_once('?').map_or(path, |(p, _)| p);
        let name = path.strip_prefix(CTRL_INT_PREFIX)?;
        TABLE
            .iter()
            .find(|(_, n, _)| *n == name)
            .map(|(command, _, _)| *command)
    }

    fn row(self) -> &'static (DacpCommand, &'static str, &'static str) {
        // Rows are in declaration order
        &TABLE[self as usize]
    }

    /// Segment after [`CTRL_INT_PREFIX`]
    #[must_use]
    pub fn name(self) -> &'static str {
        self.row().1
    }

    /// Full request path without the query
    #[must_use]
    pub fn path(self) -> &'static str {
        self.row().2
    }
}

impl fmt::Display for DacpCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
