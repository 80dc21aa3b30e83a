pub mod accounts;
pub mod authn;
