//! Model System - Definitions, entities and entity sets
//!
//! - `definition`: model/collection definitions and resolved targets
//! - `key`: hashable key values extracted from JSON attributes
//! - `entity`: single records and their loaded relations
//! - `collection`: ordered, id-indexed entity sets
//! - `persist`: insert/update of entities through an executor

pub mod collection;
pub mod definition;
pub mod entity;
pub mod key;
pub mod persist;

pub use collection::{AddPolicy, EntitySet};
pub use definition::{singularize, CollectionDef, ModelDef, ModelDefBuilder, Target};
pub use entity::{Entity, Related};
pub use key::KeyValue;
