pub mod health;
pub mod invoke;
pub mod oauth;
pub mod resume;
