pub mod ai;
pub mod hit;
pub mod mask;
pub mod shapes;
pub mod text;
