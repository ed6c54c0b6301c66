pub mod health;
pub mod projects;
pub mod teams;
pub mod users;
