pub mod engine;
pub mod example;
pub mod logging;
pub mod model;
pub mod run;
pub mod schema;
pub mod sim;
pub mod simulate;
pub mod validate;
