pub mod contacts;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod registry;
pub mod sql;
pub mod traits;
pub mod unit_of_work;

pub use contacts::ContactRepository;
pub use error::DataError;
pub use memory::MemoryPool;
pub use postgres::PgConnectionPool;
pub use registry::{Repository, RepositoryRegistry};
pub use traits::*;
pub use unit_of_work::{UnitOfWork, UnitStatus};
