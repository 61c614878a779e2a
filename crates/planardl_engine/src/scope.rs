//! Scope arena for match execution.
//!
//! Every capture binding and every `let` pushes a frame that points at its
//! parent. A frame is never mutated after it is pushed, so sibling scopes
//! sharing a parent never observe each other's bindings.

use std::sync::Arc;

use planardl_foundation::{NodeRef, Value};
use tracing::trace;

/// Index of a frame in a [`ScopeArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameId(usize);

#[derive(Clone, Debug)]
enum Binding {
    Root,
    Capture { name: Arc<str>, node: NodeRef },
    Let { name: Arc<str>, value: Value },
}

#[derive(Clone, Debug)]
struct Frame {
    parent: Option<FrameId>,
    binding: Binding,
}

/// Arena of scope frames for one match result.
#[derive(Clone, Debug)]
pub struct ScopeArena {
    frames: Vec<Frame>,
}

impl Default for ScopeArena {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeArena {
    /// Creates an arena holding only the root frame.
    #[must_use]
    pub fn new() -> Self {
        Self {
            frames: vec![Frame {
                parent: None,
                binding: Binding::Root,
            }],
        }
    }

    /// The root frame.
    #[must_use]
    pub const fn root(&self) -> FrameId {
        FrameId(0)
    }

    /// Number of frames, including the root.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns true if only the root frame exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.len() == 1
    }

    /// Drops every frame but the root.
    pub fn reset(&mut self) {
        self.frames.truncate(1);
    }

    /// Pushes a frame binding capture `name` to `node`.
    pub fn bind_capture(&mut self, parent: FrameId, name: &str, node: NodeRef) -> FrameId {
        trace!(capture = name, node = %node, "capture bound");
        self.push(parent, Binding::Capture {
            name: name.into(),
            node,
        })
    }

    /// Pushes a frame binding `let` name `name` to `value`.
    pub fn bind_let(&mut self, parent: FrameId, name: &str, value: Value) -> FrameId {
        trace!(binding = name, value = %value, "let bound");
        self.push(parent, Binding::Let {
            name: name.into(),
            value,
        })
    }

    fn push(&mut self, parent: FrameId, binding: Binding) -> FrameId {
        let id = FrameId(self.frames.len());
        self.frames.push(Frame {
            parent: Some(parent),
            binding,
        });
        id
    }

    /// Walks from `frame` to the root.
    fn ancestry(&self, frame: FrameId) -> impl Iterator<Item = &Frame> {
        let mut next = Some(frame);
        std::iter::from_fn(move || {
            let frame = self.frames.get(next?.0)?;
            next = frame.parent;
            Some(frame)
        })
    }

    /// The node bound to capture `name`, innermost binding first.
    #[must_use]
    pub fn capture(&self, frame: FrameId, name: &str) -> Option<NodeRef> {
        self.ancestry(frame).find_map(|f| match &f.binding {
            Binding::Capture { name: n, node } if &**n == name => Some(*node),
            _ => None,
        })
    }

    /// The value of `let` name `name`, innermost binding first.
    #[must_use]
    pub fn local(&self, frame: FrameId, name: &str) -> Option<&Value> {
        self.ancestry(frame).find_map(|f| match &f.binding {
            Binding::Let { name: n, value } if &**n == name => Some(value),
            _ => None,
        })
    }

    /// The node of the innermost enclosing capture.
    #[must_use]
    pub fn innermost_node(&self, frame: FrameId) -> Option<NodeRef> {
        self.ancestry(frame).find_map(|f| match &f.binding {
            Binding::Capture { node, .. } => Some(*node),
            _ => None,
        })
    }
}
