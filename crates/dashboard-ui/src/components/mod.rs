//! Small reusable line builders shared by the views.

pub mod header;
pub mod status;
