mod client;

pub use client::{SessionClient, SessionHandle, StatusCallback, TaskCallback};
