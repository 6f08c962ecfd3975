//! Executable side of search: compiled operation trees, sort orders and
//! the hits an executor yields.

pub mod hit;
pub mod operation;
pub mod sort;

pub use hit::Hit;
pub use operation::{DbQueryOperation, QueryOperation, TextField, TextOperation};
pub use sort::{SortBy, SortKey};
