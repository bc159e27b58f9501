// Query Result Module
//
// Column metadata and the forward-only row iterator over an engine cursor.

pub mod column;
pub mod iterator;

pub use self::column::Column;
pub use self::iterator::RowIterator;
