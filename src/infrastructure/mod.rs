pub mod aws;
pub mod connector;
pub mod database;

pub use connector::AwsConnector;
