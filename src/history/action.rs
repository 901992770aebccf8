use anyhow::Result;

/// A reversible operation. Anything that can do and undo itself qualifies.
pub trait Action: Send {
    fn name(&self) -> &str;
    fn execute(&mut self) -> Result<()>;
    fn undo(&mut self) -> Result<()>;
}

/// An [`Action`] assembled from a pair of closures.
pub struct FnAction<E, U> {
    name: String,
    execute: E,
    undo: U,
}

impl<E, U> FnAction<E, U>
where
    E: FnMut() -> Result<()> + Send,
    U: FnMut() -> Result<()> + Send,
{
    pub fn new(name: impl Into<String>, execute: E, undo: U) -> Self {
        Self {
            name: name.into(),
            execute,
            undo,
        }
    }
}

impl<E, U> Action for FnAction<E, U>
where
    E: FnMut() -> Result<()> + Send,
    U: FnMut() -> Result<()> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self) -> Result<()> {
        (self.execute)()
    }

    fn undo(&mut self) -> Result<()> {
        (self.undo)()
    }
}
