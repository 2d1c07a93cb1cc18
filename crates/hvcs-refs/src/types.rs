use hvcs_types::ObjectId;
use serde::{Deserialize, Serialize};

/// Summary of one branch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchInfo {
    /// Short branch name (e.g. "main", "feature/crawl").
    pub name: String,
    /// Tip commit, `None` while the branch is unborn.
    pub head: Option<ObjectId>,
    /// Whether HEAD names this branch.
    pub is_current: bool,
}
