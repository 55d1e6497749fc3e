pub mod freezer;
