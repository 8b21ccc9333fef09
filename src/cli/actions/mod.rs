pub mod worker;

#[derive(Debug)]
pub enum Action {
    Worker(worker::Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails to start.
    pub async fn execute(self) -> anyhow::Result<()> {
        match self {
            Self::Worker(args) => worker::execute(args).await,
        }
    }
}
