pub mod filter;
pub mod record;

pub use filter::{Clause, CompareOp, FilterError, FilterOperator, FilterSpec, Predicate, Scalar};
pub use record::{FieldDef, FieldKind, FieldValue, SearchableRecord};
