pub mod player;
pub mod toast;
