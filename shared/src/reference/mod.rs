pub mod error;
pub mod reference_id;
pub mod resolver;

pub use error::{ReferenceIdError, ResolverError};
pub use reference_id::{ReferenceAllocator, ReferenceId};
pub use resolver::{ObjectKind, ObjectRecord, ReferenceResolver};
