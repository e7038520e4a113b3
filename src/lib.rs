pub mod config;
pub mod machine;
pub mod probe;
pub mod routes;
pub mod site;
pub mod upstream;
