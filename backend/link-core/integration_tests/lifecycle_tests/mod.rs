pub mod helpers;
mod lifecycle;
