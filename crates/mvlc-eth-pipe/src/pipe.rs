use std::fmt;

use serde::Serialize;

/// Number of physical pipes.
pub const PIPE_COUNT: usize = 2;

/// One of the two independent UDP links to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Pipe {
    /// Command requests and responses.
    Command = 0,
    /// Readout data.
    Data = 1,
}

impl Pipe {
    pub const ALL: [Pipe; PIPE_COUNT] = [Pipe::Command, Pipe::Data];

    /// Index into per-pipe arrays.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Pipe::Command => "command",
            Pipe::Data => "data",
        }
    }
}

impl fmt::Display for Pipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
