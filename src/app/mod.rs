mod directory;
mod registry;
mod run;

pub use directory::ClusterDirectory;
pub use registry::EnvironmentRegistry;
pub use run::run;
