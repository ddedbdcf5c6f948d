/// Resource module - handles, per-frame slots, CPU-side data and the
/// named resource table

// Module declarations
pub mod handle;
pub mod framed;
pub mod geometry;
pub mod material;
pub mod resource_table;

// Re-exports
pub use handle::*;
pub use framed::*;
pub use geometry::*;
pub use material::*;
pub use resource_table::*;
