// Registry module - task definitions, the active selection and persistence
//
// - definition: one `{id, body}` record plus its validity flag
// - storage: JSON file store with atomic writes
// - transform_registry: ordered collection, cursor and active program

pub mod definition;
pub mod storage;
pub mod transform_registry;

pub use definition::TransformDefinition;
pub use storage::{parse_definitions, serialize_definitions, TransformStore};
pub use transform_registry::{ActiveTransform, TransformRegistry};
