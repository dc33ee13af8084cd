use serde::{Deserialize, Serialize};

/// Breadth of a permission grant.
///
/// Scopes are totally ordered: `Own < Team < All`. A grant at a wider scope
/// satisfies a request for a narrower one (an `All` grant authorizes an `Own`
/// request), never the other way around.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// The actor's own records.
    Own,
    /// Records owned by the actor's team.
    Team,
    /// Every record of the resource.
    All,
}

impl Scope {
    /// Whether a grant at `self` satisfies a request at `requested`.
    pub fn satisfies(self, requested: Scope) -> bool {
        self >= requested
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Own => "own",
            Scope::Team => "team",
            Scope::All => "all",
        }
    }
}

impl core::fmt::Display for Scope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
