//! Opaque provider and host objects.

use crate::ids::HandleId;
use crate::request::AdKind;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A loaded, displayable ad owned by the provider.
///
/// The cache never looks inside; providers downcast their own payload back
/// out with [`AdHandle::downcast_ref`].
#[derive(Clone)]
pub struct AdHandle {
    id: HandleId,
    placement_id: String,
    kind: AdKind,
    inner: Arc<dyn Any + Send + Sync>,
}

impl AdHandle {
    pub fn new<T>(placement_id: impl Into<String>, kind: AdKind, inner: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            id: HandleId::new(),
            placement_id: placement_id.into(),
            kind,
            inner: Arc::new(inner),
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn placement_id(&self) -> &str {
        &self.placement_id
    }

    pub fn kind(&self) -> AdKind {
        self.kind
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl fmt::Debug for AdHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdHandle")
            .field("id", &self.id)
            .field("placement_id", &self.placement_id)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Where the UI host wants an ad displayed (an activity, window or view).
#[derive(Clone)]
pub struct DisplaySurface {
    label: String,
    inner: Arc<dyn Any + Send + Sync>,
}

impl DisplaySurface {
    pub fn new<T>(label: impl Into<String>, inner: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            label: label.into(),
            inner: Arc::new(inner),
        }
    }

    /// A surface carrying no host object, for providers that render on their own.
    pub fn detached(label: impl Into<String>) -> Self {
        Self::new(label, ())
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl fmt::Debug for DisplaySurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplaySurface")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}
