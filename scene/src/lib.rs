//! In-memory scene graph used as the host collaborator of the sync bridge.
//!
//! The scene owns typed objects, their kind-specific data, string
//! attributes, and named references between objects. Every mutation is
//! tagged with a [`Provenance`] and recorded as a [`SceneEvent`] that the
//! owner drains on the scene thread.
//!
//! | Module   | Responsibility                                        |
//! |----------|-------------------------------------------------------|
//! | `object` | Object kinds, kind-specific data, display styles      |
//! | `store`  | `Scene` store, lookups, mutations, change events      |

pub mod object;
pub mod store;

pub use object::{
    Annotation, DisplayStyle, Geometry, IDENTITY, Matrix4, ObjectData, ObjectId, ObjectKind, Provenance,
    Representation, SceneObject,
};
pub use store::{ChangeKind, Scene, SceneEvent};
