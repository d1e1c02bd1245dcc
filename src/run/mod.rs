pub mod api;
pub mod dispatch;
pub mod model;
pub mod reconcile;
