//! Grouping handlers by method on a single path.
//!
//! - [`MethodView`]: one type implementing a handler per HTTP method
//! - [`CompositionView`]: independent handlers assembled per method
//!
//! Both are flattened into ordinary router items when registered.

mod composition_view;
mod method_view;

pub use composition_view::CompositionView;
pub use method_view::MethodView;
pub(crate) use method_view::view_items;
