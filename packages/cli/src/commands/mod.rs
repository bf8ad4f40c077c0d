pub mod delete;
pub mod deploy;
pub mod invoke;
pub mod prepare;
