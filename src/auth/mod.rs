//! Credential verification primitives and the opaque-token `AuthService`
//! (spec.md §4.2). Password hashing and legacy MD5 salt handling live here
//! as `AuthService`'s dependency, per spec.md §1's "Out of scope" list
//! ("Credential verification primitives... treated as an `AuthService`
//! dependency").

pub mod credentials;
pub mod token_service;

pub use credentials::Credentials;
pub use token_service::AuthService;
