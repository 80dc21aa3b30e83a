pub mod authn;
pub mod reconcile;
