pub mod adjustments;
pub mod dialogs;
