use crate::catalog::identity::TechniqueId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Who triggered a reload (a user name, `"filesystem-watcher"`, ...).
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventActor(pub String);

impl fmt::Display for EventActor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Observer of catalog reloads.
///
/// Called synchronously, once per reload that replaced the snapshot, after the
/// new snapshot is visible to readers. An error or panic is logged by the
/// catalog and does not affect other subscribers.
pub trait TechniquesLibraryUpdateNotification: Send + Sync {
    /// Identity used in diagnostics.
    fn name(&self) -> &str;

    fn updated_techniques(
        &self,
        modified: &BTreeSet<TechniqueId>,
        actor: &EventActor,
        reason: Option<&str>,
    ) -> anyhow::Result<()>;
}
