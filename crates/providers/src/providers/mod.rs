pub mod kinoray;
pub mod vibix;
pub mod vidara;
