pub mod apply;
pub mod context;
pub mod session;
