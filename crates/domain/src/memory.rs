use std::{collections::HashMap, marker::PhantomData, sync::RwLock};

use async_trait::async_trait;
use cqrs_es::{
    persist::{PersistenceError, ViewContext, ViewRepository},
    Aggregate, View,
};

/// In-memory view repository backing tests and the demo API surface.
/// A durable deployment substitutes a persisted implementation behind the
/// same `ViewRepository` trait.
pub struct InMemoryViewRepository<V, A> {
    views: RwLock<HashMap<String, (V, i64)>>,
    _aggregate: PhantomData<A>,
}

impl<V, A> InMemoryViewRepository<V, A> {
    pub fn new() -> Self {
        Self {
            views: RwLock::new(HashMap::new()),
            _aggregate: PhantomData,
        }
    }
}

impl<V, A> Default for InMemoryViewRepository<V, A> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<V, A> ViewRepository<V, A> for InMemoryViewRepository<V, A>
where
    V: View<A> + Clone,
    A: Aggregate,
{
    async fn load(&self, view_id: &str) -> Result<Option<V>, PersistenceError> {
        let views = self
            .views
            .read()
            .map_err(|_| PersistenceError::UnknownError("view lock poisoned".into()))?;
        Ok(views.get(view_id).map(|(view, _)| view.clone()))
    }

    async fn load_with_context(
        &self,
        view_id: &str,
    ) -> Result<Option<(V, ViewContext)>, PersistenceError> {
        let views = self
            .views
            .read()
            .map_err(|_| PersistenceError::UnknownError("view lock poisoned".into()))?;
        Ok(views.get(view_id).map(|(view, version)| {
            (
                view.clone(),
                ViewContext::new(view_id.to_string(), *version),
            )
        }))
    }

    async fn update_view(&self, view: V, context: ViewContext) -> Result<(), PersistenceError> {
        let mut views = self
            .views
            .write()
            .map_err(|_| PersistenceError::UnknownError("view lock poisoned".into()))?;
        views.insert(
            context.view_instance_id.clone(),
            (view, context.version + 1),
        );
        Ok(())
    }
}
