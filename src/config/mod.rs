mod paths;
mod store;

pub use paths::{ambient_kubeconfig, Paths};
pub use store::{RegistryDocument, RegistryStore};
