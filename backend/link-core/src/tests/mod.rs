mod bridge;
mod classify;
mod config;
mod machine;
mod phone;
mod reconnect;
mod runtime;
mod selector;
mod session_store;
mod supervisor;
