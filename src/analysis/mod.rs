pub mod copy_move;
pub mod ela;
pub mod frequency;
pub mod jpeg_analysis;
pub mod noise;
