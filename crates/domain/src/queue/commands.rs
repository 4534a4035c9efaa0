use serde::{Deserialize, Serialize};

use super::aggregate::{Priority, Stage};

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub enum Command {
    /// Enter the pipeline at NEW when the prescription activates
    Enqueue {
        id: String,
        prescription_id: String,
        priority: Priority,
    },

    /// Move between stages. `from` is the stage the caller last saw; a
    /// mismatch means the caller is stale and must refresh.
    RequestMove {
        from: Stage,
        to: Stage,
    },

    /// Claim the entry for a staff member
    Assign {
        user_id: String,
    },
}
