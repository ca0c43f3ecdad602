//! Registry of view definitions to synchronize.

use std::any::{TypeId, type_name};

use couch_store::ViewDefinition;
use indexmap::IndexMap;
use mapping::DocumentModel;

#[derive(Debug, Clone)]
struct ModelViews {
    model: &'static str,
    views: Vec<ViewDefinition>,
}

/// Collects view definitions from document models and standalone sources.
///
/// Iteration order is fixed: standalone definitions first, in the order they
/// were added, then each model's views in model-registration order.
/// Registering a model again replaces its views but keeps its position.
#[derive(Debug, Clone, Default)]
pub struct ViewRegistry {
    standalone: Vec<ViewDefinition>,
    models: IndexMap<TypeId, ModelViews>,
}

impl ViewRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every view the model declares, replacing any views
    /// registered earlier for the same model.
    ///
    /// A model without views leaves the registry untouched.
    pub fn add_document<M: DocumentModel>(&mut self) -> &mut Self {
        let views = M::view_definitions();
        if views.is_empty() {
            return self;
        }
        tracing::debug!(model = type_name::<M>(), views = views.len(), "registered model views");
        self.models.insert(
            TypeId::of::<M>(),
            ModelViews {
                model: type_name::<M>(),
                views,
            },
        );
        self
    }

    /// Appends a standalone view definition. Duplicates are kept.
    pub fn add_view_definition(&mut self, view: ViewDefinition) -> &mut Self {
        self.standalone.push(view);
        self
    }

    /// Appends several standalone view definitions, preserving their order.
    pub fn add_view_definitions(
        &mut self,
        views: impl IntoIterator<Item = ViewDefinition>,
    ) -> &mut Self {
        self.standalone.extend(views);
        self
    }

    /// Iterates over every registered definition.
    ///
    /// The iterator reflects the registry's state when it is created; call
    /// again to walk it afresh.
    pub fn all_view_definitions(&self) -> impl Iterator<Item = &ViewDefinition> + '_ {
        self.standalone
            .iter()
            .chain(self.models.values().flat_map(|entry| entry.views.iter()))
    }

    /// Returns the names of the registered models, in registration order.
    pub fn models(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.models.values().map(|entry| entry.model)
    }

    /// Returns the total number of registered definitions.
    pub fn len(&self) -> usize {
        self.standalone.len() + self.models.values().map(|e| e.views.len()).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
