//! The per-request resolution chain used for cycle detection.
//!
//! Each generator run pushes a frame holding every output it is about to fill.
//! Frames live on the stack of the resolving call and link to their caller, so
//! the chain belongs to exactly one top-level request and is never shared
//! between concurrent requests.

use crate::key::TypeKey;

/// One frame per running generator, linked back to the request root.
pub(crate) struct CycleChain<'a> {
    parent: Option<&'a CycleChain<'a>>,
    layer: u64,
    requested: TypeKey,
    outputs: &'a [TypeKey],
    depth: usize,
}

impl CycleChain<'static> {
    /// The empty chain a top-level request starts with.
    pub(crate) fn root() -> Self {
        CycleChain {
            parent: None,
            layer: 0,
            requested: TypeKey::of::<()>(),
            outputs: &[],
            depth: 0,
        }
    }
}

impl<'a> CycleChain<'a> {
    /// Pushes the frame for a generator of `layer` about to fill `outputs`.
    pub(crate) fn push<'b>(
        &'b self,
        layer: u64,
        requested: TypeKey,
        outputs: &'b [TypeKey],
    ) -> CycleChain<'b> {
        CycleChain {
            parent: Some(self),
            layer,
            requested,
            outputs,
            depth: self.depth + 1,
        }
    }

    /// Number of generator frames on the chain.
    pub(crate) fn depth(&self) -> usize {
        self.depth
    }

    /// True when `key` of `layer` is being produced further up this chain.
    pub(crate) fn contains(&self, layer: u64, key: TypeKey) -> bool {
        self.frames().any(|frame| frame.layer == layer && frame.outputs.contains(&key))
    }

    /// The requested types from the frame that first claimed `key` down to
    /// this one, closed with `key`.
    pub(crate) fn path_to(&self, layer: u64, key: TypeKey) -> Vec<TypeKey> {
        let mut frames: Vec<&CycleChain<'_>> = self.frames().collect();
        frames.reverse();
        let start = frames
            .iter()
            .position(|frame| frame.layer == layer && frame.outputs.contains(&key))
            .unwrap_or(0);
        let mut path: Vec<TypeKey> = frames[start..].iter().map(|frame| frame.requested).collect();
        path.push(key);
        path
    }

    fn frames(&self) -> impl Iterator<Item = &CycleChain<'a>> + '_ {
        std::iter::successors(Some(self), |frame| frame.parent)
            .filter(|frame| frame.depth > 0)
    }
}
