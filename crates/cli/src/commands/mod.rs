pub mod backup;
pub mod categories;
pub mod photos;
pub mod restore;
pub mod settings;
pub mod status;
