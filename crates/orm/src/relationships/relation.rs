//! Relations bound to one owner entity
//!
//! A [`Relation`] is what [`Orm::related`](crate::orm::Orm::related) hands
//! out: the resolved descriptor plus the owner it reads keys from and writes
//! results back to.

use serde_json::{Map, Value};

use super::descriptor::RelationDescriptor;
use super::pivot::{PivotSynchronizer, PivotTarget};
use super::resolver::{build_related, RelationResolver};
use crate::error::{ModelError, ModelResult};
use crate::loading::{EagerLoader, EagerTree};
use crate::model::{Entity, KeyValue, Related};
use crate::orm::{FetchOptions, Orm};

/// One relation of one owner
pub struct Relation<'a> {
    orm: &'a Orm,
    owner: &'a mut Entity,
    descriptor: RelationDescriptor,
}

impl<'a> Relation<'a> {
    pub(crate) fn new(orm: &'a Orm, owner: &'a mut Entity, descriptor: RelationDescriptor) -> Self {
        Self {
            orm,
            owner,
            descriptor,
        }
    }

    pub fn descriptor(&self) -> &RelationDescriptor {
        &self.descriptor
    }

    pub fn owner(&self) -> &Entity {
        self.owner
    }

    /// Fetch the related entities, store them on the owner and return them.
    ///
    /// `with_related` paths are loaded relative to the fetched entities.
    pub async fn fetch(&mut self, options: FetchOptions) -> ModelResult<Related> {
        let resolve_options = self.orm.resolve_options(&options);
        let resolver = RelationResolver::new(
            self.orm.executor(),
            self.orm.registry(),
            self.orm.config(),
            resolve_options,
        );

        let fetched = resolver.fetch(&self.descriptor, &[&*self.owner]).await?;
        resolver.associate(&self.descriptor, fetched, &mut [&mut *self.owner]);

        let name = self.descriptor.name.clone();
        let mut related = self.owner.take_related(&name).unwrap_or_else(|| {
            build_related(
                self.descriptor.kind,
                self.descriptor.target.as_ref(),
                std::iter::empty(),
            )
        });

        let nested = if options.with_related.is_empty() {
            Ok(())
        } else {
            let loader = EagerLoader::new(
                self.orm.executor(),
                self.orm.registry(),
                self.orm.config(),
                resolve_options,
            );
            match EagerTree::parse(options.with_related.iter()) {
                Ok(tree) => loader.load(related.entities_mut(), &tree).await.map(|_| ()),
                Err(err) => Err(err),
            }
        };
        self.owner.set_related(&name, related.clone());
        nested?;

        if options.require && related.is_empty() {
            return Err(ModelError::NotFound(
                self.descriptor
                    .target_table()
                    .unwrap_or(name.as_str())
                    .to_string(),
            ));
        }
        Ok(related)
    }

    /// Link targets to the owner through the pivot table
    pub async fn attach<T: Into<PivotTarget>>(
        &mut self,
        targets: Vec<T>,
        extra: Option<Map<String, Value>>,
    ) -> ModelResult<usize> {
        let sync = PivotSynchronizer::new(self.orm.executor(), &self.descriptor)?
            .with_timeout(self.orm.config().query_timeout());
        sync.attach(
            self.owner,
            targets.into_iter().map(Into::into).collect(),
            extra.unwrap_or_default(),
        )
        .await
    }

    /// Unlink targets, or every target when `None`
    pub async fn detach(&mut self, targets: Option<Vec<KeyValue>>) -> ModelResult<u64> {
        let sync = PivotSynchronizer::new(self.orm.executor(), &self.descriptor)?
            .with_timeout(self.orm.config().query_timeout());
        sync.detach(self.owner, targets).await
    }

    /// Update extra pivot columns for some or all targets
    pub async fn update_pivot(
        &mut self,
        attributes: Map<String, Value>,
        targets: Option<Vec<KeyValue>>,
    ) -> ModelResult<u64> {
        let sync = PivotSynchronizer::new(self.orm.executor(), &self.descriptor)?
            .with_timeout(self.orm.config().query_timeout());
        sync.update_pivot(self.owner, attributes, targets).await
    }
}
