pub mod dump;
pub mod list;
pub mod render;

/// Represents a command in the Momiji application.
pub trait Command {
    /// Consumes a command object and executes the handler actions
    /// associated with it.
    ///
    /// On failure, an error will be reported.
    fn handle(self) -> eyre::Result<()>;
}
