//! Canaux de transmission vers les contrôleurs de LED

pub mod serial;
pub mod simulator;
