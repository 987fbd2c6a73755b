//! A wire-id keyed table of registered transforms.
//!
//! Shared by the compressor (which resolves nodes to transforms) and the
//! decompression context (which resolves frame records to decoders).

use hashbrown::HashMap;
use std::sync::Arc;

use crate::error::{ErrorKind, Result, TambakError};
use crate::graph::TransformId;
use crate::transform::standard::standard_transforms;
use crate::transform::{Transform, TransformDescriptor};

/// A transform together with its validated declaration.
#[derive(Debug, Clone)]
pub struct RegisteredTransform {
    pub descriptor: Arc<TransformDescriptor>,
    pub transform: Transform,
}

#[derive(Debug, Clone, Default)]
pub struct TransformSet {
    entries: HashMap<TransformId, RegisteredTransform>,
}

impl TransformSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard transforms.
    pub fn standard() -> Self {
        let mut set = Self::new();
        for (descriptor, transform) in standard_transforms() {
            set.entries.insert(
                descriptor.id,
                RegisteredTransform {
                    descriptor: Arc::new(descriptor),
                    transform,
                },
            );
        }
        set
    }

    /// Validates `descriptor` against the shape of `transform` and adds it.
    /// A wire id already in the set is rejected.
    pub fn register(
        &mut self,
        descriptor: TransformDescriptor,
        transform: Transform,
    ) -> Result<Arc<TransformDescriptor>> {
        descriptor.validate(transform.kind())?;
        if self.entries.contains_key(&descriptor.id) {
            return Err(TambakError::new(
                ErrorKind::NodeDefinitionInvalid,
                format!("transform id {} is already registered", descriptor.id.0),
            ));
        }
        let descriptor = Arc::new(descriptor);
        self.entries.insert(
            descriptor.id,
            RegisteredTransform {
                descriptor: Arc::clone(&descriptor),
                transform,
            },
        );
        Ok(descriptor)
    }

    pub fn get(&self, id: TransformId) -> Option<&RegisteredTransform> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: TransformId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Registered transforms in wire-id order.
    pub fn sorted(&self) -> Vec<&RegisteredTransform> {
        let mut all: Vec<_> = self.entries.values().collect();
        all.sort_by_key(|r| r.descriptor.id);
        all
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
