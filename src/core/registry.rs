//! Method Registry - engine-wide table of block methods
//!
//! Every mounted block instance owns a `name → Method` table inside this
//! registry, addressed by its [`BlockId`]. The registry supports:
//! - Attaching and detaching a block instance (mount/unmount)
//! - Registering and replacing methods by name
//! - Invoking a method by `(block_id, name)` with shape-checked arguments
//! - Detecting invocations against unmounted instances

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

use super::block::BlockError;
use super::{BlockId, InstanceId};

/// Unmounted block ids a registry remembers unless told otherwise
pub const DEFAULT_RETIRED_LIMIT: usize = 1024;

type MethodFn = dyn Fn(Value) -> Result<Value, BlockError> + Send + Sync;

/// Accepted argument shape of a method, checked before every call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgShape {
    /// Any JSON value, including null
    Any,
    /// An integer position, given bare (`2`) or as `{"index": 2}`
    Index,
    /// An options object whose recognised fields are all optional; null means defaults
    Options,
}

impl ArgShape {
    /// Check `args` against the shape
    pub fn check(&self, args: &Value) -> Result<(), BlockError> {
        match self {
            ArgShape::Any => Ok(()),
            ArgShape::Index => index_arg(args).map(|_| ()),
            ArgShape::Options => match args {
                Value::Null | Value::Object(_) => Ok(()),
                other => Err(BlockError::InvalidArguments(format!(
                    "expected an options object, got {}",
                    other
                ))),
            },
        }
    }
}

/// Read an integer position from method arguments
pub fn index_arg(args: &Value) -> Result<i64, BlockError> {
    let raw = match args {
        Value::Object(map) => map.get("index").unwrap_or(&Value::Null),
        other => other,
    };
    raw.as_i64().ok_or_else(|| {
        BlockError::InvalidArguments(format!("expected an integer index, got {}", raw))
    })
}

/// A registered callable together with its argument shape
#[derive(Clone)]
pub struct Method {
    shape: ArgShape,
    call: Arc<MethodFn>,
}

impl Method {
    pub fn new<F>(shape: ArgShape, call: F) -> Self
    where
        F: Fn(Value) -> Result<Value, BlockError> + Send + Sync + 'static,
    {
        Self {
            shape,
            call: Arc::new(call),
        }
    }

    pub fn shape(&self) -> ArgShape {
        self.shape
    }

    /// Check the arguments, then call
    pub fn call(&self, args: Value) -> Result<Value, BlockError> {
        self.shape.check(&args)?;
        (self.call)(args)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method").field("shape", &self.shape).finish()
    }
}

/// Outcome of a registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The name was new for this instance
    Added,
    /// An existing binding was replaced
    Replaced,
}

struct InstanceMethods {
    instance: InstanceId,
    methods: HashMap<String, Method>,
}

/// Block ids whose instance was detached and not mounted again
///
/// Holds at most `limit` ids; the oldest retirement is forgotten first and
/// afterwards reads as a plain missing method.
struct RetiredIds {
    order: VecDeque<BlockId>,
    ids: HashSet<BlockId>,
    limit: usize,
}

impl RetiredIds {
    fn new(limit: usize) -> Self {
        Self {
            order: VecDeque::new(),
            ids: HashSet::new(),
            limit,
        }
    }

    fn contains(&self, block_id: &BlockId) -> bool {
        self.ids.contains(block_id)
    }

    fn insert(&mut self, block_id: BlockId) {
        if self.limit == 0 || !self.ids.insert(block_id.clone()) {
            return;
        }
        self.order.push_back(block_id);
        while self.order.len() > self.limit {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
    }

    fn remove(&mut self, block_id: &BlockId) {
        if self.ids.remove(block_id) {
            self.order.retain(|id| id != block_id);
        }
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}

struct RegistryInner {
    instances: HashMap<BlockId, InstanceMethods>,
    retired: RetiredIds,
}

/// Method registry shared by the runtime and every block façade
///
/// Uses `Arc<RwLock<..>>` from parking_lot; cloning shares the same table.
/// No lock is held while a method runs, so callables may invoke other
/// methods (including on the same block) without deadlocking.
#[derive(Clone)]
pub struct MethodRegistry {
    inner: Arc<RwLock<RegistryInner>>,
    strict_lifecycle: bool,
}

impl MethodRegistry {
    /// Create a registry reporting invocations on unmounted blocks as
    /// [`RegistryError::StaleRegistration`]
    pub fn new() -> Self {
        Self::with_strict_lifecycle(true)
    }

    /// Create a registry; with `strict_lifecycle` off, invocations on
    /// unmounted blocks report [`RegistryError::MethodNotFound`] instead
    pub fn with_strict_lifecycle(strict_lifecycle: bool) -> Self {
        Self::with_options(strict_lifecycle, DEFAULT_RETIRED_LIMIT)
    }

    /// Create a registry remembering at most `retired_limit` unmounted block ids
    pub fn with_options(strict_lifecycle: bool, retired_limit: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(RegistryInner {
                instances: HashMap::new(),
                retired: RetiredIds::new(retired_limit),
            })),
            strict_lifecycle,
        }
    }

    /// Number of unmounted block ids currently remembered
    pub fn retired_count(&self) -> usize {
        self.inner.read().retired.len()
    }

    /// Open an empty method table for a freshly mounted instance
    ///
    /// Any table left by an earlier instance of the same block id is dropped.
    pub fn attach(&self, block_id: &BlockId, instance: InstanceId) {
        let mut inner = self.inner.write();
        inner.retired.remove(block_id);
        inner.instances.insert(
            block_id.clone(),
            InstanceMethods {
                instance,
                methods: HashMap::new(),
            },
        );
        trace!(block_id = %block_id, "registry attached");
    }

    /// Remove every method of an instance
    ///
    /// # Returns
    /// The number of methods dropped; zero when `instance` is not the current one
    pub fn detach(&self, block_id: &BlockId, instance: InstanceId) -> usize {
        let mut inner = self.inner.write();
        let current = inner
            .instances
            .get(block_id)
            .map(|entry| entry.instance == instance)
            .unwrap_or(false);
        if !current {
            return 0;
        }
        let removed = inner
            .instances
            .remove(block_id)
            .map(|entry| entry.methods.len())
            .unwrap_or(0);
        inner.retired.insert(block_id.clone());
        debug!(block_id = %block_id, removed, "registry detached");
        removed
    }

    /// Store or replace the callable for `name` on the given instance
    ///
    /// # Returns
    /// * `Ok(Registration)` telling whether the name was new
    /// * `Err(RegistryError::StaleRegistration)` when `instance` is not the mounted one
    pub fn register(
        &self,
        block_id: &BlockId,
        instance: InstanceId,
        name: &str,
        method: Method,
    ) -> Result<Registration, RegistryError> {
        if name.is_empty() {
            return Err(RegistryError::ValidationError(format!(
                "Method name cannot be empty (block {})",
                block_id
            )));
        }

        let mut inner = self.inner.write();
        let entry = match inner.instances.get_mut(block_id) {
            Some(entry) if entry.instance == instance => entry,
            _ => {
                return Err(RegistryError::StaleRegistration {
                    block_id: block_id.clone(),
                    method: name.to_string(),
                })
            }
        };

        let outcome = match entry.methods.insert(name.to_string(), method) {
            Some(_) => Registration::Replaced,
            None => Registration::Added,
        };
        trace!(block_id = %block_id, method = name, ?outcome, "method registered");
        Ok(outcome)
    }

    /// Look up the current callable
    pub fn lookup(&self, block_id: &BlockId, name: &str) -> Result<Method, RegistryError> {
        let inner = self.inner.read();
        match inner.instances.get(block_id) {
            Some(entry) => entry
                .methods
                .get(name)
                .cloned()
                .ok_or_else(|| RegistryError::MethodNotFound {
                    block_id: block_id.clone(),
                    method: name.to_string(),
                }),
            None if self.strict_lifecycle && inner.retired.contains(block_id) => {
                Err(RegistryError::StaleRegistration {
                    block_id: block_id.clone(),
                    method: name.to_string(),
                })
            }
            None => Err(RegistryError::MethodNotFound {
                block_id: block_id.clone(),
                method: name.to_string(),
            }),
        }
    }

    /// Invoke a method by name
    ///
    /// The callable is cloned out of the table and the lock released before
    /// the call, so the latest registration at lookup time always wins.
    pub fn invoke(
        &self,
        block_id: &BlockId,
        name: &str,
        args: Value,
    ) -> Result<Value, RegistryError> {
        let method = self.lookup(block_id, name)?;
        debug!(block_id = %block_id, method = name, "invoking method");
        method.call(args).map_err(RegistryError::from)
    }

    /// Names registered for a block, sorted
    pub fn method_names(&self, block_id: &BlockId) -> Vec<String> {
        let inner = self.inner.read();
        let mut names: Vec<String> = inner
            .instances
            .get(block_id)
            .map(|entry| entry.methods.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Number of methods registered for a block
    pub fn method_count(&self, block_id: &BlockId) -> usize {
        let inner = self.inner.read();
        inner
            .instances
            .get(block_id)
            .map(|entry| entry.methods.len())
            .unwrap_or(0)
    }

    /// Number of attached instances
    pub fn instance_count(&self) -> usize {
        self.inner.read().instances.len()
    }

    /// Check if a block instance is attached
    pub fn is_attached(&self, block_id: &BlockId) -> bool {
        self.inner.read().instances.contains_key(block_id)
    }

    /// The instance currently attached for a block id
    pub fn current_instance(&self, block_id: &BlockId) -> Option<InstanceId> {
        self.inner
            .read()
            .instances
            .get(block_id)
            .map(|entry| entry.instance)
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry and runtime error types
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No method of that name on that block
    #[error("Method '{method}' not found on block '{block_id}'")]
    MethodNotFound { block_id: BlockId, method: String },

    /// The block instance addressed has been unmounted
    #[error("Method '{method}' addressed to unmounted block '{block_id}'")]
    StaleRegistration { block_id: BlockId, method: String },

    /// Block with given ID is not mounted
    #[error("Block not found: {0}")]
    BlockNotFound(BlockId),

    /// Attempted to mount a block id that is already mounted
    #[error("Duplicate block ID: {0}")]
    DuplicateBlock(BlockId),

    /// Attempted to register a block type twice in a catalog
    #[error("Duplicate block type: {0}")]
    DuplicateBlockType(String),

    /// No factory for the block type
    #[error("Unknown block type: {0}")]
    UnknownBlockType(String),

    /// Tree or registration validation failed
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The invoked method or block hook failed
    #[error(transparent)]
    Block(#[from] BlockError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: &Arc<AtomicUsize>, result: Value) -> Method {
        let counter = Arc::clone(counter);
        Method::new(ArgShape::Any, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(result.clone())
        })
    }

    fn attached(id: &str) -> (MethodRegistry, BlockId, InstanceId) {
        let registry = MethodRegistry::new();
        let block_id = BlockId::from(id);
        let instance = InstanceId::new();
        registry.attach(&block_id, instance);
        (registry, block_id, instance)
    }

    #[test]
    fn test_register_and_invoke() {
        let (registry, id, instance) = attached("list");
        let hits = Arc::new(AtomicUsize::new(0));

        let outcome = registry
            .register(&id, instance, "pushItem", counting(&hits, json!(1)))
            .unwrap();
        assert_eq!(outcome, Registration::Added);

        let result = registry.invoke(&id, "pushItem", json!("a")).unwrap();
        assert_eq!(result, json!(1));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reregistration_replaces() {
        let (registry, id, instance) = attached("list");
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        registry
            .register(&id, instance, "pushItem", counting(&first, json!("first")))
            .unwrap();
        let outcome = registry
            .register(&id, instance, "pushItem", counting(&second, json!("second")))
            .unwrap();
        assert_eq!(outcome, Registration::Replaced);
        assert_eq!(registry.method_count(&id), 1);

        let result = registry.invoke(&id, "pushItem", Value::Null).unwrap();
        assert_eq!(result, json!("second"));
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_repeated_registration_does_not_grow() {
        let (registry, id, instance) = attached("modal");
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..50 {
            registry
                .register(&id, instance, "open", counting(&hits, Value::Null))
                .unwrap();
        }
        assert_eq!(registry.method_count(&id), 1);
        assert_eq!(registry.method_names(&id), vec!["open"]);
    }

    #[test]
    fn test_method_not_found() {
        let (registry, id, _) = attached("list");
        let err = registry.invoke(&id, "explode", Value::Null).unwrap_err();
        assert!(matches!(err, RegistryError::MethodNotFound { .. }));

        let err = registry
            .invoke(&BlockId::from("nobody"), "open", Value::Null)
            .unwrap_err();
        assert!(matches!(err, RegistryError::MethodNotFound { .. }));
    }

    #[test]
    fn test_detach_drops_methods_and_reports_stale() {
        let (registry, id, instance) = attached("modal");
        let hits = Arc::new(AtomicUsize::new(0));
        registry
            .register(&id, instance, "open", counting(&hits, Value::Null))
            .unwrap();

        assert_eq!(registry.detach(&id, instance), 1);
        assert!(!registry.is_attached(&id));

        let err = registry.invoke(&id, "open", Value::Null).unwrap_err();
        assert!(matches!(err, RegistryError::StaleRegistration { .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_lenient_lifecycle_reports_not_found() {
        let registry = MethodRegistry::with_strict_lifecycle(false);
        let id = BlockId::from("modal");
        let instance = InstanceId::new();
        registry.attach(&id, instance);
        registry.detach(&id, instance);

        let err = registry.invoke(&id, "open", Value::Null).unwrap_err();
        assert!(matches!(err, RegistryError::MethodNotFound { .. }));
        assert_eq!(registry.retired_count(), 0);
    }

    #[test]
    fn test_retired_ids_are_bounded() {
        let registry = MethodRegistry::with_options(true, 3);
        for n in 0..10 {
            let id = BlockId::from(format!("todos.{}.title", n));
            let instance = InstanceId::new();
            registry.attach(&id, instance);
            registry.detach(&id, instance);
        }
        assert_eq!(registry.retired_count(), 3);

        // only the most recent retirements are still reported as stale
        let err = registry.invoke(&BlockId::from("todos.9.title"), "focus", Value::Null).unwrap_err();
        assert!(matches!(err, RegistryError::StaleRegistration { .. }));
        let err = registry.invoke(&BlockId::from("todos.0.title"), "focus", Value::Null).unwrap_err();
        assert!(matches!(err, RegistryError::MethodNotFound { .. }));

        // remounting forgets the retirement
        let id = BlockId::from("todos.8.title");
        registry.attach(&id, InstanceId::new());
        assert_eq!(registry.retired_count(), 2);
    }

    #[test]
    fn test_stale_instance_cannot_register() {
        let (registry, id, old) = attached("list");
        let fresh = InstanceId::new();
        registry.attach(&id, fresh);

        let hits = Arc::new(AtomicUsize::new(0));
        let err = registry
            .register(&id, old, "pushItem", counting(&hits, Value::Null))
            .unwrap_err();
        assert!(matches!(err, RegistryError::StaleRegistration { .. }));

        // detaching with the old token leaves the fresh table alone
        assert_eq!(registry.detach(&id, old), 0);
        assert!(registry.is_attached(&id));
        assert_eq!(registry.current_instance(&id), Some(fresh));
    }

    #[test]
    fn test_empty_name_rejected() {
        let (registry, id, instance) = attached("list");
        let hits = Arc::new(AtomicUsize::new(0));
        let err = registry
            .register(&id, instance, "", counting(&hits, Value::Null))
            .unwrap_err();
        assert!(matches!(err, RegistryError::ValidationError(_)));
    }

    #[test]
    fn test_arg_shape_checked_before_call() {
        let (registry, id, instance) = attached("list");
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        registry
            .register(
                &id,
                instance,
                "removeItem",
                Method::new(ArgShape::Index, move |args| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(json!(index_arg(&args)?))
                }),
            )
            .unwrap();

        assert_eq!(registry.invoke(&id, "removeItem", json!(2)).unwrap(), json!(2));
        assert_eq!(
            registry.invoke(&id, "removeItem", json!({ "index": -1 })).unwrap(),
            json!(-1)
        );

        let err = registry.invoke(&id, "removeItem", json!("two")).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Block(BlockError::InvalidArguments(_))
        ));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_options_shape() {
        assert!(ArgShape::Options.check(&Value::Null).is_ok());
        assert!(ArgShape::Options.check(&json!({ "status": "info" })).is_ok());
        assert!(ArgShape::Options.check(&json!([1])).is_err());
    }

    #[test]
    fn test_method_may_reenter_registry() {
        let (registry, id, instance) = attached("list");
        let inner_registry = registry.clone();
        let inner_id = id.clone();
        registry
            .register(&id, instance, "ping", Method::new(ArgShape::Any, |_| Ok(json!("pong"))))
            .unwrap();
        registry
            .register(
                &id,
                instance,
                "relay",
                Method::new(ArgShape::Any, move |args| {
                    inner_registry
                        .invoke(&inner_id, "ping", args)
                        .map_err(|e| BlockError::InvalidArguments(e.to_string()))
                }),
            )
            .unwrap();

        assert_eq!(registry.invoke(&id, "relay", Value::Null).unwrap(), json!("pong"));
    }

    #[test]
    fn test_thread_safety() {
        use std::thread;

        let registry = MethodRegistry::new();
        let mut handles = vec![];

        for i in 0..10 {
            let registry = registry.clone();
            handles.push(thread::spawn(move || {
                let id = BlockId::new(format!("block{}", i));
                let instance = InstanceId::new();
                registry.attach(&id, instance);
                registry
                    .register(&id, instance, "open", Method::new(ArgShape::Any, |_| Ok(Value::Null)))
                    .unwrap();
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.instance_count(), 10);
    }
}
