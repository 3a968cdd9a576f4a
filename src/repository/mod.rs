//! Persistence-layer queries, grounded in the teacher's
//! `repository::user_repo::UserRepository` shape (local `FromRow` row
//! structs mapped through `from_db_row`/`to_db_values`, never deriving
//! `FromRow` on the domain struct itself).

pub mod user_repo;

pub use user_repo::UserRepository;
