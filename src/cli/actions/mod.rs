pub mod broker;
pub mod legacy;

// Internal "interpreter" for `Action`.
mod run;

mod banner;

#[derive(Debug)]
pub enum Action {
    Broker(broker::Args),
    Legacy(legacy::Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
