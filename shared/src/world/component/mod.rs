pub mod component;
pub mod error;
pub mod field_value;
pub mod hook;
pub mod lifecycle;
pub mod member;
pub mod mutator;
pub mod observer;
pub mod registry;
pub mod resource;
pub mod sync_field;
pub mod sync_list;
pub mod sync_ref;
pub mod sync_ref_list;
