//! Lazy directory listings

use blobio_core::{Error, Result};
use std::fmt;
use std::sync::Arc;

type EntryIter = Box<dyn Iterator<Item = Result<String>> + Send>;
type Restart = Arc<dyn Fn() -> Result<EntryIter> + Send + Sync>;

/// Iterator over entry names below a prefix.
///
/// Listings backed by a stateless source can be restarted; paginated remote
/// listings hold a cursor and cannot.
pub struct Listing {
    entries: EntryIter,
    restart: Option<Restart>,
}

impl Listing {
    /// A listing that can be rewound by re-running `source`
    pub fn restartable<F>(source: F) -> Result<Self>
    where
        F: Fn() -> Result<EntryIter> + Send + Sync + 'static,
    {
        let restart: Restart = Arc::new(source);
        Ok(Self {
            entries: restart()?,
            restart: Some(restart),
        })
    }

    /// A one-shot listing
    pub fn once(entries: EntryIter) -> Self {
        Self {
            entries,
            restart: None,
        }
    }

    pub fn is_restartable(&self) -> bool {
        self.restart.is_some()
    }

    /// Rewind to the first entry
    pub fn restart(&mut self) -> Result<()> {
        match &self.restart {
            Some(restart) => {
                self.entries = restart()?;
                Ok(())
            }
            None => Err(Error::unsupported(
                "listing",
                "restart",
                "listing is backed by a stateful cursor",
            )),
        }
    }
}

impl Iterator for Listing {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }
}

impl fmt::Debug for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listing")
            .field("restartable", &self.is_restartable())
            .finish()
    }
}
