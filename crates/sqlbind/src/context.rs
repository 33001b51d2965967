//! Services shared by configuration resolution, schema building and queries.
//!
//! A [`BindContext`] is constructed once and passed explicitly; nothing in
//! this crate reaches for a global it was not handed, apart from the
//! process-wide defaults [`BindContext::new`] installs.

use std::fmt;
use std::sync::Arc;

use crate::accessor::{TargetType, ValueAccessorProvider};
use crate::core::traits::{BaseElement, ConnectionNotifier};
use crate::resource::ResourceLocator;
use crate::schema::SqliteForeignKeys;
use crate::script::DdlRegistry;
use crate::typemap::TypeMap;

#[derive(Clone)]
pub struct BindContext {
    accessors: Arc<ValueAccessorProvider>,
    ddl_registry: Arc<DdlRegistry>,
    resources: Arc<dyn ResourceLocator>,
    type_map: Arc<TypeMap>,
    notifiers: Vec<Arc<dyn ConnectionNotifier>>,
}

impl BindContext {
    /// Context over `resources` with the process-wide accessor provider and
    /// DDL registry, an empty type map and the built-in connection notifiers.
    pub fn new(resources: Arc<dyn ResourceLocator>) -> Self {
        Self {
            accessors: ValueAccessorProvider::shared(),
            ddl_registry: DdlRegistry::global(),
            resources,
            type_map: Arc::new(TypeMap::new()),
            notifiers: vec![Arc::new(SqliteForeignKeys)],
        }
    }

    pub fn with_accessors(mut self, accessors: Arc<ValueAccessorProvider>) -> Self {
        self.accessors = accessors;
        self
    }

    pub fn with_ddl_registry(mut self, registry: Arc<DdlRegistry>) -> Self {
        self.ddl_registry = registry;
        self
    }

    pub fn with_type_map(mut self, type_map: TypeMap) -> Self {
        self.type_map = Arc::new(type_map);
        self
    }

    /// Add a hook run on each new schema-build connection.
    pub fn with_notifier(mut self, notifier: impl ConnectionNotifier + 'static) -> Self {
        self.notifiers.push(Arc::new(notifier));
        self
    }

    pub fn without_notifiers(mut self) -> Self {
        self.notifiers.clear();
        self
    }

    pub fn accessors(&self) -> &Arc<ValueAccessorProvider> {
        &self.accessors
    }

    pub fn ddl_registry(&self) -> &Arc<DdlRegistry> {
        &self.ddl_registry
    }

    pub fn resources(&self) -> &Arc<dyn ResourceLocator> {
        &self.resources
    }

    pub fn type_map(&self) -> &TypeMap {
        &self.type_map
    }

    pub fn notifiers(&self) -> &[Arc<dyn ConnectionNotifier>] {
        &self.notifiers
    }

    /// Target type of a column: the type map's override when one matches,
    /// else the default of the column's accessor.
    pub fn target_type(&self, elem: &dyn BaseElement) -> TargetType {
        let accessor = self.accessors.get(elem.jdbc_type());
        self.type_map.target_type(accessor, elem)
    }
}

impl fmt::Debug for BindContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let notifiers: Vec<&str> = self.notifiers.iter().map(|n| n.name()).collect();
        f.debug_struct("BindContext")
            .field("ddl_registry", &self.ddl_registry)
            .field("type_map", &self.type_map)
            .field("notifiers", &notifiers)
            .finish_non_exhaustive()
    }
}
