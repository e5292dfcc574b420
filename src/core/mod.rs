//! Core record types, file loading, timestamps and coordinates.

pub mod geo;
pub mod loaders;
pub mod records;
pub mod temporal;

pub use geo::{Coordinate, Crs};
pub use loaders::{load_table, LoaderError, Table};
pub use records::{LocationPoint, PaiRecord, PaiRow, SoilRecord, SoilRow};
pub use temporal::{Period, PeriodKind, TemporalError, Timed};
