//! Bootstrap: the root and its 8 children are generated before any
//! camera-driven refinement starts.
//!
//! Every bootstrap request is essential and ignores visibility, so the
//! coarsest cover of the planet exists no matter where the camera looks.

use super::{ChunkManager, Frame, RequestKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BootstrapPhase {
  /// Waiting for the root.
  #[default]
  Root,
  /// Root has geometry; waiting for its 8 children.
  Children,
  Complete,
}

const BOOTSTRAP: RequestKind = RequestKind {
  visible: true,
  essential: true,
  speculative: false,
};

impl ChunkManager {
  pub(super) fn bootstrap_step(&mut self, frame: &mut Frame) {
    let root = self.octree.root();
    self.observe(root, frame);

    if self.bootstrap == BootstrapPhase::Root {
      let Some(node) = self.octree.get(root) else {
        return;
      };
      if !node.is_settled() {
        if node.pending.is_none() && !self.prefilter(root, frame) {
          self.request_generation(root, BOOTSTRAP, frame);
        }
        return;
      }
      if !node.has_geometry {
        tracing::info!("bootstrap complete: planet has no surface inside the root");
        self.bootstrap = BootstrapPhase::Complete;
        return;
      }
      let existing = node.children;
      let children = match existing {
        Some(children) => children,
        None => match self.octree.create_children(root, &self.config) {
          Some(children) => children,
          None => return,
        },
      };
      tracing::debug!("bootstrap: root ready, requesting children");
      self.bootstrap = BootstrapPhase::Children;
      for child in children {
        self.observe(child, frame);
      }
    }

    let Some(children) = self.octree.get(root).and_then(|n| n.children) else {
      self.bootstrap = BootstrapPhase::Root;
      return;
    };
    let mut settled = 0;
    for child in children {
      let Some(node) = self.octree.get(child) else {
        continue;
      };
      if node.is_settled() {
        settled += 1;
      } else if node.pending.is_none() {
        if self.prefilter(child, frame) {
          settled += 1;
        } else {
          self.request_generation(child, BOOTSTRAP, frame);
        }
      }
    }

    if settled == children.len() {
      tracing::info!(
        resident = self.octree.resident_chunks(),
        frame = self.frame_id,
        "bootstrap complete"
      );
      self.bootstrap = BootstrapPhase::Complete;
    }
  }
}
