//! Lanes of a navigation path
//!
//! A [`Navigator`] keeps the chain of nodes from an archive root along a key
//! path. Navigating to a new path reuses the longest common prefix; edits
//! that change definitions or structure drop the affected lanes so they are
//! recomputed.

use crate::adaptor::Adaptor;
use crate::error::{NavError, NavResult};
use nav_metainfo::SectionDef;
use tracing::debug;

/// Node chain for a key path; lane 0 is the root
#[derive(Debug, Clone)]
pub struct Navigator {
    keys: Vec<String>,
    lanes: Vec<Adaptor>,
}

impl Navigator {
    #[must_use]
    pub fn new(root: Adaptor) -> Self {
        Self {
            keys: Vec::new(),
            lanes: vec![root],
        }
    }

    /// Keys of the current path
    #[inline]
    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Materialized lanes, root first
    #[inline]
    #[must_use]
    pub fn lanes(&self) -> &[Adaptor] {
        &self.lanes
    }

    #[must_use]
    pub fn lane(&self, depth: usize) -> Option<&Adaptor> {
        self.lanes.get(depth)
    }

    /// Deepest lane
    #[must_use]
    pub fn current(&self) -> &Adaptor {
        // lane 0 is never invalidated
        &self.lanes[self.lanes.len() - 1]
    }

    /// Resolve `keys` from the root, reusing lanes of the common prefix
    ///
    /// # Errors
    /// The first resolution error; lanes resolved before it are kept and the
    /// path is cut there.
    pub async fn navigate<I, S>(&mut self, keys: I) -> NavResult<&Adaptor>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        let reusable = self
            .keys
            .iter()
            .zip(&keys)
            .take(self.lanes.len() - 1)
            .take_while(|(old, new)| old == new)
            .count();
        self.lanes.truncate(reusable + 1);
        self.keys = keys;
        debug!(reused = reusable, depth = self.keys.len(), "Navigating");

        while self.lanes.len() <= self.keys.len() {
            let depth = self.lanes.len();
            let resolved = self.current().resolve_child(&self.keys[depth - 1]).await;
            match resolved {
                Ok(node) => self.lanes.push(node),
                Err(e) => {
                    self.keys.truncate(depth - 1);
                    return Err(e);
                }
            }
        }
        Ok(self.current())
    }

    /// Drop lanes from `depth` on; the root is kept
    pub fn invalidate_from(&mut self, depth: usize) {
        self.lanes.truncate(depth.max(1));
    }

    /// Recompute dropped lanes along the current keys
    ///
    /// # Errors
    /// As [`Navigator::navigate`].
    pub async fn refresh(&mut self) -> NavResult<&Adaptor> {
        let keys = self.keys.clone();
        self.navigate(keys).await
    }

    fn lane_at(&self, depth: usize) -> NavResult<&Adaptor> {
        self.lanes
            .get(depth)
            .ok_or_else(|| NavError::unknown_key(format!("lane {depth}"), self.current().address()))
    }

    /// Switch the section at `depth` to `candidate` and recompute the lanes
    /// from there
    ///
    /// # Errors
    /// As [`Adaptor::select_section`].
    pub async fn select_section(&mut self, depth: usize, candidate: &SectionDef) -> NavResult<&Adaptor> {
        let lane = self.lane_at(depth)?;
        lane.select_section(candidate).await?;
        if depth == 0 {
            let root = lane.session().open_root(lane.address()).await?;
            self.lanes = vec![root];
        } else {
            self.invalidate_from(depth);
        }
        self.refresh().await
    }

    /// Remove the subsection entry at `depth` and navigate to its parent
    ///
    /// # Errors
    /// As [`Adaptor::remove_sub_section`].
    pub async fn remove_sub_section(&mut self, depth: usize) -> NavResult<&Adaptor> {
        self.lane_at(depth)?.remove_sub_section()?;
        self.invalidate_from(depth);
        self.keys.truncate(depth.saturating_sub(1));
        Ok(self.current())
    }
}
