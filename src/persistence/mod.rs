pub mod findings;
pub mod model;
pub mod projects;
pub mod repo;
pub mod runs;
