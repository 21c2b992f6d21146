pub mod clock;
pub mod track;
