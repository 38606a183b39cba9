pub mod projection;
pub mod stage;
pub mod surface;
pub mod tween;
