//! In-memory registry of layers and containers.
//!
//! The registry is the store of record: id-keyed maps, insert-only. Layers
//! are immutable once created; a container's only mutable state is its
//! running flag, guarded by an atomic check-then-set so that at most one
//! execution per container is in flight at any time.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use gantry_common::{GantryError, GantryResult, fresh_id};

use crate::estimate::ChangeEstimator;

/// A named, sized artifact record with provenance.
///
/// Not a real filesystem diff in this design tier: size and content are
/// placeholders, identity and provenance are what matter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    /// Opaque unique identifier, the primary key.
    pub id: String,
    /// Caller-supplied label. Not unique; lookup by name is a convenience.
    pub name: String,
    /// Size in bytes, caller-supplied or estimator-synthesized.
    pub size: u64,
    /// Free-text provenance tag (`"download"`, `"upload"`, `"export:<id>"`).
    pub source: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A registered process definition plus its execution state.
#[derive(Debug, Clone)]
pub struct Container {
    /// Opaque unique identifier, the primary key.
    pub id: String,
    /// The program to execute.
    pub command: String,
    /// Arguments passed to the program.
    pub arguments: Vec<String>,
    /// Ordered layer sequence. Layers are shared by value; the registry
    /// remains their owner of record.
    pub layers: Vec<Layer>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Placeholder count of files changed by this container.
    pub files_changed: u64,
    /// Placeholder count of bytes changed by this container.
    pub bytes_changed: u64,
    running: Arc<AtomicBool>,
}

impl Container {
    /// The full command line as one string.
    #[must_use]
    pub fn command_line(&self) -> String {
        let mut line = self.command.clone();
        for arg in &self.arguments {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    /// Whether an execution of this container is currently in flight.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Attempt the idle-to-running transition.
    ///
    /// Returns a token that releases the flag when dropped, or `None` if an
    /// execution is already in flight. The compare-and-set makes the guard
    /// atomic across concurrent callers and across cloned handles (clones
    /// share the flag).
    #[must_use]
    pub fn try_begin_run(&self) -> Option<RunningToken> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
            .then(|| RunningToken {
                flag: Arc::clone(&self.running),
            })
    }
}

/// Releases a container's running flag on drop.
///
/// The single release site: every exit path out of a run — completion,
/// process failure, copy failure — goes through this drop.
#[derive(Debug)]
pub struct RunningToken {
    flag: Arc<AtomicBool>,
}

impl Drop for RunningToken {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// The in-memory store of layers and containers.
pub struct Registry {
    layers: HashMap<String, Layer>,
    containers: HashMap<String, Container>,
    estimator: Box<dyn ChangeEstimator>,
}

impl Registry {
    /// Create an empty registry around a size estimator.
    #[must_use]
    pub fn new(estimator: Box<dyn ChangeEstimator>) -> Self {
        Self {
            layers: HashMap::new(),
            containers: HashMap::new(),
            estimator,
        }
    }

    /// Create and store a layer.
    ///
    /// A missing or zero `size` is synthesized by the estimator.
    pub fn add_layer(&mut self, name: &str, source: &str, size: Option<u64>) -> Layer {
        let size = match size {
            Some(size) if size > 0 => size,
            _ => self.estimator.layer_size(),
        };
        let layer = Layer {
            id: fresh_id(),
            name: name.to_string(),
            size,
            source: source.to_string(),
            created_at: Utc::now(),
        };
        tracing::debug!(layer_id = %layer.id, name, source, size, "layer added");
        self.layers.insert(layer.id.clone(), layer.clone());
        layer
    }

    /// Look up a layer by id.
    #[must_use]
    pub fn layer(&self, id: &str) -> Option<&Layer> {
        self.layers.get(id)
    }

    /// Look up a container by id.
    #[must_use]
    pub fn container(&self, id: &str) -> Option<&Container> {
        self.containers.get(id)
    }

    /// First layer with the given name, in unspecified iteration order.
    ///
    /// When names collide, which entry wins is deliberately left open;
    /// names are labels, ids are identity.
    #[must_use]
    pub fn find_layer_by_name(&self, name: &str) -> Option<&Layer> {
        self.layers.values().find(|layer| layer.name == name)
    }

    /// All layers, in unspecified order.
    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.values()
    }

    /// All containers, in unspecified order.
    pub fn containers(&self) -> impl Iterator<Item = &Container> {
        self.containers.values()
    }

    /// Number of registered containers.
    #[must_use]
    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    /// Resolve layer references, then create and store a container.
    ///
    /// Each reference is tried against, in order: the layer id space, the
    /// layer name space, the container id space. A container reference
    /// splices that container's layers in, preserving their order.
    ///
    /// # Errors
    ///
    /// [`GantryError::UnresolvedReference`] if a reference matches nothing,
    /// [`GantryError::NoLayersSpecified`] if no layer was resolved. Nothing
    /// is committed on failure.
    pub fn add_container(
        &mut self,
        command: &str,
        arguments: &[String],
        layer_refs: &[String],
    ) -> GantryResult<Container> {
        let mut layers = Vec::new();
        for reference in layer_refs {
            if let Some(layer) = self
                .layers
                .get(reference)
                .or_else(|| self.find_layer_by_name(reference))
            {
                layers.push(layer.clone());
            } else if let Some(source) = self.containers.get(reference) {
                layers.extend(source.layers.iter().cloned());
            } else {
                return Err(GantryError::UnresolvedReference {
                    reference: reference.clone(),
                });
            }
        }
        if layers.is_empty() {
            return Err(GantryError::NoLayersSpecified);
        }

        let container = Container {
            id: fresh_id(),
            command: command.to_string(),
            arguments: arguments.to_vec(),
            layers,
            created_at: Utc::now(),
            files_changed: self.estimator.files_changed(),
            bytes_changed: self.estimator.bytes_changed(),
            running: Arc::new(AtomicBool::new(false)),
        };
        tracing::debug!(
            container_id = %container.id,
            command = %container.command_line(),
            layers = container.layers.len(),
            "container added"
        );
        self.containers
            .insert(container.id.clone(), container.clone());
        Ok(container)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimate::FixedEstimator;

    fn test_registry() -> Registry {
        Registry::new(Box::new(FixedEstimator {
            layer_size: 10 * 1024 * 1024,
            files_changed: 7,
            bytes_changed: 2 * 1024 * 1024,
        }))
    }

    #[test]
    fn add_layer_uses_estimator_when_size_missing() {
        let mut registry = test_registry();
        let estimated = registry.add_layer("base", "download", None);
        assert_eq!(estimated.size, 10 * 1024 * 1024);

        let zero = registry.add_layer("base", "download", Some(0));
        assert_eq!(zero.size, 10 * 1024 * 1024);

        let explicit = registry.add_layer("base", "upload", Some(42));
        assert_eq!(explicit.size, 42);
    }

    #[test]
    fn layer_ids_are_unique_across_a_large_batch() {
        let mut registry = test_registry();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..10_000 {
            let layer = registry.add_layer("base", "download", Some(1));
            assert!(seen.insert(layer.id));
        }
    }

    #[test]
    fn layer_lookup_by_id_and_name() {
        let mut registry = test_registry();
        let layer = registry.add_layer("base", "download", None);
        assert_eq!(registry.layer(&layer.id), Some(&layer));
        assert_eq!(registry.find_layer_by_name("base"), Some(&layer));
        assert!(registry.find_layer_by_name("missing").is_none());
    }

    #[test]
    fn container_resolves_layers_by_id_and_name() {
        let mut registry = test_registry();
        let first = registry.add_layer("base", "download", None);
        let second = registry.add_layer("tools", "upload", None);

        let container = registry
            .add_container("echo", &["hi".to_string()], &[first.id.clone(), "tools".to_string()])
            .unwrap();
        assert_eq!(container.layers, vec![first, second]);
        assert_eq!(container.command_line(), "echo hi");
        assert!(!container.is_running());
    }

    #[test]
    fn container_reference_splices_layers_in_order() {
        let mut registry = test_registry();
        let first = registry.add_layer("base", "download", None);
        let second = registry.add_layer("tools", "upload", None);
        let source = registry
            .add_container("true", &[], &[first.id.clone(), second.id.clone()])
            .unwrap();

        let clone = registry
            .add_container("true", &[], &[source.id.clone()])
            .unwrap();
        assert_eq!(clone.layers, vec![first, second]);
    }

    #[test]
    fn unresolved_reference_commits_nothing() {
        let mut registry = test_registry();
        registry.add_layer("base", "download", None);

        let err = registry
            .add_container("true", &[], &["nope".to_string()])
            .unwrap_err();
        assert!(matches!(err, GantryError::UnresolvedReference { .. }));
        assert_eq!(registry.container_count(), 0);
    }

    #[test]
    fn empty_layer_list_is_rejected() {
        let mut registry = test_registry();
        let err = registry.add_container("true", &[], &[]).unwrap_err();
        assert!(matches!(err, GantryError::NoLayersSpecified));
        assert_eq!(registry.container_count(), 0);
    }

    #[test]
    fn running_guard_admits_one_execution() {
        let mut registry = test_registry();
        registry.add_layer("base", "download", None);
        let container = registry
            .add_container("true", &[], &["base".to_string()])
            .unwrap();

        let token = container.try_begin_run().unwrap();
        assert!(container.is_running());
        assert!(container.try_begin_run().is_none());

        // clones share the flag
        let handle = container.clone();
        assert!(handle.try_begin_run().is_none());

        drop(token);
        assert!(!container.is_running());
        assert!(container.try_begin_run().is_some());
    }
}
