//! Transformer registry.
//!
//! The registry is the only owner of transformer values. It indexes them by
//! id and by name, keeps registration order, and hands out [`TransformerRef`]s
//! whose equality is the registry handle rather than the transformer's
//! contents. Entries are never removed or replaced.
//!
//! The process-wide registry is built once from an ordered list of family
//! factories (see [`RegistryBuilder`]), either explicitly through [`init`] or
//! lazily on the first call to [`global`].

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::collab::Environment;
use crate::config::PersistedSettings;
use crate::converter;
use crate::error::{SettingsError, TransformerError, TransformerResult};
use crate::transformer::{Transformer, TransformerType};
use crate::viewers;

static NEXT_REGISTRY_ID: AtomicU32 = AtomicU32::new(0);

static GLOBAL: OnceLock<TransformerRegistry> = OnceLock::new();

/// Opaque identity of a registered transformer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransformerHandle {
    registry: u32,
    index: u32,
}

impl TransformerHandle {
    /// Registration position within the owning registry.
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

/// A shared reference to a registered transformer.
///
/// Two refs are equal iff they point at the same registry slot.
#[derive(Clone)]
pub struct TransformerRef {
    handle: TransformerHandle,
    transformer: Arc<dyn Transformer>,
}

impl TransformerRef {
    pub fn handle(&self) -> TransformerHandle {
        self.handle
    }

    /// The underlying shared value.
    pub fn as_arc(&self) -> &Arc<dyn Transformer> {
        &self.transformer
    }
}

impl Deref for TransformerRef {
    type Target = dyn Transformer;

    fn deref(&self) -> &Self::Target {
        self.transformer.as_ref()
    }
}

impl PartialEq for TransformerRef {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for TransformerRef {}

impl Hash for TransformerRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.handle.hash(state);
    }
}

impl fmt::Debug for TransformerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformerRef")
            .field("id", &self.transformer.id())
            .field("name", &self.transformer.name())
            .field("handle", &self.handle)
            .finish()
    }
}

#[derive(Default)]
struct RegistryInner {
    entries: Vec<Arc<dyn Transformer>>,
    by_id: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

/// Bidirectional index of transformer singletons.
pub struct TransformerRegistry {
    id: u32,
    inner: RwLock<RegistryInner>,
}

impl TransformerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    /// Creates a registry holding every built-in family.
    pub fn with_builtins(env: &Arc<Environment>) -> TransformerResult<Self> {
        RegistryBuilder::with_builtins().build(env)
    }

    /// Inserts `transformer`. Both uniqueness checks and both index updates
    /// happen under one write lock, so a failed insert leaves no trace.
    pub(crate) fn insert(&self, transformer: Arc<dyn Transformer>) -> TransformerResult<TransformerRef> {
        let mut inner = self.inner.write();

        if inner.by_id.contains_key(transformer.id()) {
            return Err(TransformerError::DuplicateIdentifier {
                id: transformer.id().to_string(),
            });
        }
        if inner.by_name.contains_key(transformer.name()) {
            return Err(TransformerError::DuplicateName {
                name: transformer.name().to_string(),
            });
        }

        let index = inner.entries.len();
        inner.entries.push(Arc::clone(&transformer));
        inner.by_id.insert(transformer.id().to_string(), index);
        inner.by_name.insert(transformer.name().to_string(), index);
        drop(inner);

        tracing::debug!(
            id = transformer.id(),
            name = transformer.name(),
            index,
            "registered transformer"
        );

        Ok(self.make_ref(index, transformer))
    }

    fn make_ref(&self, index: usize, transformer: Arc<dyn Transformer>) -> TransformerRef {
        TransformerRef {
            handle: TransformerHandle {
                registry: self.id,
                index: index as u32,
            },
            transformer,
        }
    }

    fn ref_at(&self, inner: &RegistryInner, index: usize) -> Option<TransformerRef> {
        inner
            .entries
            .get(index)
            .map(|t| self.make_ref(index, Arc::clone(t)))
    }

    /// Looks up a transformer by id.
    pub fn get_by_id(&self, id: &str) -> Option<TransformerRef> {
        let inner = self.inner.read();
        let index = *inner.by_id.get(id)?;
        self.ref_at(&inner, index)
    }

    /// Looks up a transformer by display name.
    pub fn get_by_name(&self, name: &str) -> Option<TransformerRef> {
        let inner = self.inner.read();
        let index = *inner.by_name.get(name)?;
        self.ref_at(&inner, index)
    }

    /// Resolves a handle issued by this registry.
    pub fn get(&self, handle: TransformerHandle) -> Option<TransformerRef> {
        if handle.registry != self.id {
            return None;
        }
        self.ref_at(&self.inner.read(), handle.index())
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.inner.read().by_id.contains_key(id)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.inner.read().by_name.contains_key(name)
    }

    /// Every transformer, in registration order.
    pub fn all(&self) -> Vec<TransformerRef> {
        self.all_matching(|_| true)
    }

    /// Transformers accepted by `filter`, in registration order.
    pub fn all_matching<F>(&self, mut filter: F) -> Vec<TransformerRef>
    where
        F: FnMut(&dyn Transformer) -> bool,
    {
        // Snapshot first so `filter` runs without the lock held.
        let entries: Vec<Arc<dyn Transformer>> = self.inner.read().entries.clone();
        entries
            .into_iter()
            .enumerate()
            .filter(|(_, t)| filter(t.as_ref()))
            .map(|(index, t)| self.make_ref(index, t))
            .collect()
    }

    /// Transformers of the given type, in registration order.
    pub fn of_type(&self, ty: TransformerType) -> Vec<TransformerRef> {
        self.all_matching(|t| t.transformer_type() == ty)
    }

    /// Transformers that accept `classifying_name`, in registration order.
    pub fn applicable_to(&self, classifying_name: &str) -> Vec<TransformerRef> {
        self.all_matching(|t| t.is_applicable(classifying_name))
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current settings of every transformer that declares any.
    pub fn export_settings(&self) -> PersistedSettings {
        self.all_matching(|t| t.has_settings())
            .into_iter()
            .map(|t| (t.id().to_string(), t.settings().snapshot()))
            .collect()
    }

    /// Applies persisted settings. Unknown transformer ids are skipped;
    /// values that cannot be applied are returned with their transformer id.
    pub fn import_settings(&self, persisted: &PersistedSettings) -> Vec<(String, SettingsError)> {
        let mut problems = Vec::new();
        for (id, values) in persisted {
            let Some(transformer) = self.get_by_id(id) else {
                tracing::warn!(id = %id, "ignoring settings for unknown transformer");
                continue;
            };
            for err in transformer.settings().apply(values) {
                tracing::warn!(id = %id, %err, "ignoring persisted setting");
                problems.push((id.clone(), err));
            }
        }
        problems
    }
}

impl Default for TransformerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TransformerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("TransformerRegistry")
            .field("id", &self.id)
            .field(
                "transformers",
                &inner.entries.iter().map(|t| t.id()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Registers one family of transformers.
pub type Family = fn(&TransformerRegistry, &Arc<Environment>) -> TransformerResult<()>;

/// Ordered list of families used to build a registry.
#[derive(Debug, Clone, Default)]
pub struct RegistryBuilder {
    families: Vec<(&'static str, Family)>,
}

impl RegistryBuilder {
    /// Creates a builder with no families.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder with the built-in families: viewers, then converters.
    pub fn with_builtins() -> Self {
        Self::new()
            .family("viewers", viewers::register_family)
            .family("converters", converter::register_family)
    }

    /// Appends a family. Families run in the order they were added.
    pub fn family(mut self, name: &'static str, family: Family) -> Self {
        self.families.push((name, family));
        self
    }

    /// Names of the families, in run order.
    pub fn family_names(&self) -> Vec<&'static str> {
        self.families.iter().map(|(name, _)| *name).collect()
    }

    /// Runs every family against a fresh registry, then applies the
    /// environment's persisted settings.
    pub fn build(&self, env: &Arc<Environment>) -> TransformerResult<TransformerRegistry> {
        let registry = TransformerRegistry::new();
        for (name, family) in &self.families {
            tracing::debug!(family = name, "registering transformer family");
            family(&registry, env)?;
        }
        registry.import_settings(&env.config.settings);
        Ok(registry)
    }
}

/// Builds the process-wide registry from the built-in families.
///
/// Fails with [`TransformerError::AlreadyInitialized`] once the registry
/// exists, including when [`global`] created it first.
pub fn init(env: Arc<Environment>) -> TransformerResult<&'static TransformerRegistry> {
    init_with(RegistryBuilder::with_builtins(), env)
}

/// Builds the process-wide registry from `builder`.
pub fn init_with(
    builder: RegistryBuilder,
    env: Arc<Environment>,
) -> TransformerResult<&'static TransformerRegistry> {
    if GLOBAL.get().is_some() {
        return Err(TransformerError::AlreadyInitialized);
    }
    let registry = builder.build(&env)?;
    GLOBAL
        .set(registry)
        .map_err(|_| TransformerError::AlreadyInitialized)?;
    Ok(global())
}

/// The process-wide registry. Built from the built-in families and the
/// default config on first use unless [`init`] ran before.
pub fn global() -> &'static TransformerRegistry {
    GLOBAL.get_or_init(|| {
        let env = Arc::new(Environment::from_default_config());
        RegistryBuilder::with_builtins()
            .build(&env)
            .expect("built-in transformer families must register cleanly")
    })
}

/// Convenience lookup in the process-wide registry.
pub fn get_by_id(id: &str) -> Option<TransformerRef> {
    global().get_by_id(id)
}

/// Convenience lookup in the process-wide registry.
pub fn get_by_name(name: &str) -> Option<TransformerRef> {
    global().get_by_name(name)
}

/// Every transformer in the process-wide registry.
pub fn all_transformers() -> Vec<TransformerRef> {
    global().all()
}
