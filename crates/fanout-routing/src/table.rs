use std::collections::HashSet;
use std::convert::Infallible;

use fanout_types::Route;

/// What a router wants done with one route during a rewrite pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rewrite {
    /// Leave the route where it is.
    Keep,
    /// Remove the route and append the given replacements (possibly none).
    Replace(Vec<Route>),
}

/// The ordered, mutable set of routes for one delivery attempt.
///
/// Routers see the table exactly as the previous router left it. Mutation
/// while traversing is done through [`RouteTable::rewrite`], which walks a
/// snapshot of the current entries so removals and appends never disturb
/// the traversal.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, route: Route) {
        self.routes.push(route);
    }

    pub fn add_all(&mut self, routes: impl IntoIterator<Item = Route>) {
        self.routes.extend(routes);
    }

    /// Append `route` unless an equal route is already present.
    ///
    /// Returns `true` if the route was added.
    pub fn add_unique(&mut self, route: Route) -> bool {
        if self.contains(&route) {
            return false;
        }
        self.routes.push(route);
        true
    }

    /// Remove the first route equal to `route`. Returns `true` if found.
    pub fn remove(&mut self, route: &Route) -> bool {
        match self.routes.iter().position(|r| r == route) {
            Some(idx) => {
                self.routes.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, route: &Route) -> bool {
        self.routes.contains(route)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    pub fn to_vec(&self) -> Vec<Route> {
        self.routes.clone()
    }

    /// Routes belonging to the given transport type, in table order.
    pub fn routes_for(&self, transport: &str) -> Vec<Route> {
        self.routes
            .iter()
            .filter(|r| r.is_for(transport))
            .cloned()
            .collect()
    }

    /// Visit every route present when the pass starts, applying the
    /// decision `f` returns for it.
    ///
    /// Replacements are appended at the end of the table and are not
    /// visited by the same pass.
    pub fn rewrite<F>(&mut self, mut f: F)
    where
        F: FnMut(&Route) -> Rewrite,
    {
        let result: Result<(), Infallible> = self.try_rewrite(|route| Ok(f(route)));
        match result {
            Ok(()) => {}
            Err(never) => match never {},
        }
    }

    /// Fallible [`RouteTable::rewrite`]. Stops at the first error; routes
    /// already rewritten stay rewritten.
    pub fn try_rewrite<F, E>(&mut self, mut f: F) -> Result<(), E>
    where
        F: FnMut(&Route) -> Result<Rewrite, E>,
    {
        for route in self.to_vec() {
            if let Rewrite::Replace(replacements) = f(&route)? {
                self.remove(&route);
                self.add_all(replacements);
            }
        }
        Ok(())
    }

    /// Drop duplicate routes, keeping the first occurrence of each.
    ///
    /// Returns the number of routes removed.
    pub fn dedup(&mut self) -> usize {
        let before = self.routes.len();
        let mut seen = HashSet::with_capacity(before);
        self.routes.retain(|r| seen.insert(r.clone()));
        before - self.routes.len()
    }
}

impl FromIterator<Route> for RouteTable {
    fn from_iter<I: IntoIterator<Item = Route>>(iter: I) -> Self {
        Self {
            routes: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a RouteTable {
    type Item = &'a Route;
    type IntoIter = std::slice::Iter<'a, Route>;

    fn into_iter(self) -> Self::IntoIter {
        self.routes.iter()
    }
}
