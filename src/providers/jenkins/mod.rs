mod client;
mod tests;
mod types;

pub use client::JenkinsClient;
