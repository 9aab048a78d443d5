use std::path::Path;

use crate::error::Error;

/// A deferred, describable unit of file-mutating work.
///
/// Commands are built during discovery and only executed once the operator
/// confirmed the whole batch, so everything needed to perform the change is
/// captured at construction time.
pub trait Command {
    /// One line describing the effect, naming the target file and the
    /// before/after values.
    fn description(&self) -> String;

    /// Performs the described change.
    ///
    /// Running an already applied command again must not fail because of the
    /// previous run.
    fn execute(&self) -> Result<(), Error>;
}

/// Maps a single file to zero or one pending [`Command`].
pub trait CommandGetter {
    type Command: Command;

    /// Inspects `file` and returns the command fixing it, or `None` when the
    /// file already satisfies the policy. Inspection must not modify the file.
    fn get_command(&self, file: &Path) -> Result<Option<Self::Command>, Error>;
}
