use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use fanout_types::{ContentItem, Route};

use crate::directory::Directory;
use crate::error::{DirectoryError, RoutingError, RoutingResult};
use crate::router::Router;
use crate::table::{RouteTable, Rewrite};

/// Expands internal routes addressed to a group into one internal route per
/// member.
///
/// Only recipients carrying the group prefix (`g-` by default) are looked
/// up. Nested groups are expanded recursively; members already present in
/// the table, or produced twice by overlapping groups, are added once. A
/// group the directory does not know is left as it is.
pub struct GroupExpansionRouter {
    directory: Arc<dyn Directory>,
    prefix: String,
    max_depth: usize,
}

impl GroupExpansionRouter {
    pub const NAME: &'static str = "group-expansion";
    pub const DEFAULT_PREFIX: &'static str = "g-";
    pub const DEFAULT_MAX_DEPTH: usize = 8;

    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self {
            directory,
            prefix: Self::DEFAULT_PREFIX.to_string(),
            max_depth: Self::DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn is_group(&self, recipient: &str) -> bool {
        recipient.starts_with(&self.prefix)
    }

    /// Collect the users reachable from `group`, depth-first, in directory
    /// order. Returns `None` if the top-level group is unknown.
    fn expand(&self, group: &str) -> Result<Option<Vec<String>>, DirectoryError> {
        let Some(direct) = self.directory.group_members(group)? else {
            return Ok(None);
        };
        let mut visited = HashSet::from([group.to_string()]);
        let mut users = Vec::new();
        self.collect(group, direct, 1, &mut visited, &mut users)?;
        Ok(Some(users))
    }

    fn collect(
        &self,
        group: &str,
        members: Vec<String>,
        depth: usize,
        visited: &mut HashSet<String>,
        users: &mut Vec<String>,
    ) -> Result<(), DirectoryError> {
        if depth > self.max_depth {
            return Err(DirectoryError::NestingTooDeep {
                group: group.to_string(),
                limit: self.max_depth,
            });
        }
        for member in members {
            if self.is_group(&member) {
                if !visited.insert(member.clone()) {
                    continue;
                }
                match self.directory.group_members(&member)? {
                    Some(nested) => self.collect(&member, nested, depth + 1, visited, users)?,
                    None => warn!(group = %member, "unknown nested group skipped"),
                }
            } else if !users.contains(&member) {
                users.push(member);
            }
        }
        Ok(())
    }
}

impl Router for GroupExpansionRouter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn priority(&self) -> i32 {
        100
    }

    fn route(&self, item: &ContentItem, table: &mut RouteTable) -> RoutingResult<()> {
        let mut present: HashSet<Route> = table.iter().cloned().collect();

        table.try_rewrite(|route| {
            let Some(recipient) = route.recipient() else {
                return Ok(Rewrite::Keep);
            };
            if !route.is_internal() || !self.is_group(recipient) {
                return Ok(Rewrite::Keep);
            }
            let members = self
                .expand(recipient)
                .map_err(|e| RoutingError::lookup(Self::NAME, e))?;
            let Some(members) = members else {
                debug!(path = item.path(), group = recipient, "not a known group");
                return Ok(Rewrite::Keep);
            };

            let replacements: Vec<Route> = members
                .into_iter()
                .map(Route::internal)
                .filter(|r| present.insert(r.clone()))
                .collect();
            debug!(
                path = item.path(),
                group = recipient,
                members = replacements.len(),
                "expanded group"
            );
            Ok(Rewrite::Replace(replacements))
        })
    }
}
