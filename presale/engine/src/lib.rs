pub mod accounting;
pub mod engine_state;
